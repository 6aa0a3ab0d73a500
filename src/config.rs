//! Engine configuration.
//!
//! [`TrackingConfig`] drives a seeding pass and [`RestingStateConfig`] drives
//! correlation and clustering. Both are plain serde structs so callers can
//! keep them next to their own settings and round-trip them through JSON or
//! a compact bincode blob.
//!
//! # Example
//!
//! ```
//! use fibernav::TrackingConfig;
//!
//! let config = TrackingConfig {
//!     angle_threshold: 45.0,
//!     ..TrackingConfig::default()
//! };
//! config.validate().unwrap();
//!
//! let json = config.to_json().unwrap();
//! let restored = TrackingConfig::from_json(&json).unwrap();
//! assert_eq!(restored, config);
//! ```

use crate::geometry::Vec3;
use crate::{FiberNavError, Result};
use serde::{Deserialize, Serialize};

/// Parameters of a streamline seeding pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Integration step in millimetres
    pub step: f32,
    /// Minimum anisotropy (tensor FA, or mask value) for a walk to continue
    pub fa_threshold: f32,
    /// Maximum turn between consecutive directions, in degrees
    pub angle_threshold: f32,
    /// Streamlines must be strictly longer than this (mm)
    pub min_fiber_length: f32,
    /// Streamlines must be strictly shorter than this (mm); also caps each half-walk
    pub max_fiber_length: f32,
    /// Lattice samples per axis for box, voxel and point seeding (>= 2)
    pub seeds_per_axis: usize,
    /// Tensor advection weight between incoming and deflected direction
    pub puncture: f32,
    /// HARDI weight between incoming direction and best-matching stick
    pub vin_vout: f32,
    /// Weight of a magnet's field once a walk is inside it
    pub magnet_strength: f32,
    /// Alpha written into every color
    pub alpha: f32,
    /// Consecutive gray-matter steps allowed before a walk stops
    pub gm_max_steps: u32,
    /// Replace lattice samples with uniform random points in the same box
    pub random_init: bool,
    /// Trilinearly interpolate tensors instead of nearest voxel lookup
    pub interpolate_tensors: bool,
    /// HARDI only: pick the seed stick closest to this vector instead of a weighted draw
    pub init_direction: Option<Vec3>,
    pub exclusion_enabled: bool,
    pub inclusion_enabled: bool,
    pub gray_matter_enabled: bool,
    /// Seed for random initialization and stick drafting
    pub seed: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            step: 1.0,
            fa_threshold: 0.20,
            angle_threshold: 35.0,
            min_fiber_length: 60.0,
            max_fiber_length: 200.0,
            seeds_per_axis: 10,
            puncture: 0.2,
            vin_vout: 0.6,
            magnet_strength: 0.5,
            alpha: 1.0,
            gm_max_steps: 5,
            random_init: false,
            interpolate_tensors: false,
            init_direction: None,
            exclusion_enabled: true,
            inclusion_enabled: true,
            gray_matter_enabled: true,
            seed: 0,
        }
    }
}

fn check_unit_interval(name: &str, v: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&v) {
        return Err(FiberNavError::InvalidParameter(format!(
            "{} must be in [0, 1], got {}",
            name, v
        )));
    }
    Ok(())
}

impl TrackingConfig {
    /// Reject parameter combinations a pass cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.step > 0.0) {
            return Err(FiberNavError::InvalidParameter(format!(
                "step must be positive, got {}",
                self.step
            )));
        }
        if self.seeds_per_axis < 2 {
            return Err(FiberNavError::InvalidParameter(format!(
                "seeds_per_axis must be at least 2, got {}",
                self.seeds_per_axis
            )));
        }
        if !(0.0..=180.0).contains(&self.angle_threshold) {
            return Err(FiberNavError::InvalidParameter(format!(
                "angle_threshold must be in [0, 180], got {}",
                self.angle_threshold
            )));
        }
        if !(self.min_fiber_length < self.max_fiber_length) {
            return Err(FiberNavError::InvalidParameter(format!(
                "min_fiber_length ({}) must be below max_fiber_length ({})",
                self.min_fiber_length, self.max_fiber_length
            )));
        }
        check_unit_interval("puncture", self.puncture)?;
        check_unit_interval("vin_vout", self.vin_vout)?;
        check_unit_interval("magnet_strength", self.magnet_strength)?;
        check_unit_interval("alpha", self.alpha)?;
        if let Some(dir) = self.init_direction {
            if dir.is_degenerate() {
                return Err(FiberNavError::InvalidParameter(
                    "init_direction must be a non-zero vector".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Whether a combined point count forms an acceptable streamline length.
    #[inline]
    pub fn accepts_length(&self, points: usize) -> bool {
        let len = points as f32 * self.step;
        len > self.min_fiber_length && len < self.max_fiber_length
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to binary (bincode).
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from binary (bincode).
    pub fn from_binary(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }
}

/// Which correlations define the mean and sigma used for z-scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZScoreReference {
    /// Every voxel with non-flat signal contributes
    AllParticipating,
    /// Only voxels with positive correlation contribute; negative ones are never retained
    PositiveOnly,
}

/// Parameters of the resting-state correlation and clustering engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestingStateConfig {
    /// Voxels with z above this are retained; 0 retains every correlated voxel with z tagged 0
    pub z_threshold: f32,
    /// Connected components smaller than this are eroded away
    pub min_cluster_size: usize,
    pub z_reference: ZScoreReference,
}

impl Default for RestingStateConfig {
    fn default() -> Self {
        Self {
            z_threshold: 1.65,
            min_cluster_size: 10,
            z_reference: ZScoreReference::AllParticipating,
        }
    }
}

impl RestingStateConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.z_threshold.is_finite() || self.z_threshold < 0.0 {
            return Err(FiberNavError::InvalidParameter(format!(
                "z_threshold must be a finite non-negative value, got {}",
                self.z_threshold
            )));
        }
        if self.min_cluster_size == 0 {
            return Err(FiberNavError::InvalidParameter(
                "min_cluster_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to binary (bincode).
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from binary (bincode).
    pub fn from_binary(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }
}
