//! PassReport - summary of one tracking pass.

use crate::{FiberNavError, Result};
use serde::{Deserialize, Serialize};

/// Counters collected while running a tracking pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    /// Integration strategy ("tensor" or "hardi")
    pub strategy: String,
    /// Seed source ("regions", "mask", "points" or "surface")
    pub source: String,
    pub seeds: usize,
    /// Seeds actually processed (below `seeds` only when cancelled)
    pub processed: usize,
    pub accepted: usize,
    pub rejected_length: usize,
    pub rejected_filter: usize,
    pub lines: usize,
    pub points: usize,
    pub cancelled: bool,
}

impl PassReport {
    pub fn new(strategy: &str, source: &str, seeds: usize) -> Self {
        Self {
            strategy: strategy.to_string(),
            source: source.to_string(),
            seeds,
            ..Self::default()
        }
    }

    /// Accepted streamlines per processed seed.
    pub fn acceptance_rate(&self) -> f32 {
        if self.processed == 0 {
            0.0
        } else {
            self.accepted as f32 / self.processed as f32
        }
    }

    /// Export report to JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            FiberNavError::Other(format!("Failed to serialize report to JSON: {}", e))
        })
    }

    /// Import report from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            FiberNavError::Other(format!("Failed to deserialize report from JSON: {}", e))
        })
    }
}
