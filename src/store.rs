//! StreamlineStore - flat storage for the streamlines of one pass.
//!
//! Points and colors are kept as flat `f32` buffers (3 and 4 floats per
//! point) so they can be handed to a renderer or writer without copying.
//! Per-line counts and offsets index into them. Offsets start at 0 and carry
//! one more entry than there are lines, so line `i` spans
//! `offsets[i]..offsets[i + 1]`. A pairing flag per line records whether the
//! line is one half of a two-sided streamline.
//!
//! # Example
//!
//! ```
//! use fibernav::StreamlineStore;
//! use fibernav::geometry::Vec3;
//!
//! let mut store = StreamlineStore::new();
//! store.push_line(&[Vec3::ZERO, Vec3::X], &[[1.0, 0.0, 0.0, 1.0]; 2], false);
//! assert_eq!(store.num_lines(), 1);
//! assert_eq!(store.line_offsets(), &[0, 2]);
//! assert_eq!(store.total_points(), 2);
//! ```

use crate::geometry::Vec3;
use crate::tracking::HalfWalk;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamlineStore {
    points: Vec<f32>,
    colors: Vec<f32>,
    counts: Vec<usize>,
    offsets: Vec<usize>,
    paired: Vec<bool>,
}

impl Default for StreamlineStore {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            colors: Vec::new(),
            counts: Vec::new(),
            offsets: vec![0],
            paired: Vec::new(),
        }
    }
}

impl StreamlineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every stored line.
    pub fn clear(&mut self) {
        self.points.clear();
        self.colors.clear();
        self.counts.clear();
        self.offsets.clear();
        self.offsets.push(0);
        self.paired.clear();
    }

    /// Append one line. Empty lines are ignored.
    pub fn push_line(&mut self, points: &[Vec3], colors: &[[f32; 4]], paired: bool) {
        debug_assert_eq!(points.len(), colors.len());
        if points.is_empty() {
            return;
        }
        self.counts.push(points.len());
        self.paired.push(paired);
        for p in points {
            self.points.extend_from_slice(&p.to_array());
        }
        for c in colors {
            self.colors.extend_from_slice(c);
        }
        self.offsets.push(self.total_points());
    }

    /// Append both halves of a streamline.
    ///
    /// When both halves carry points they are stored as two paired lines,
    /// forward first. A lone non-empty half is stored unpaired. Returns the
    /// number of lines added.
    pub fn push_pair(&mut self, forward: &HalfWalk, backward: &HalfWalk) -> usize {
        let paired = !forward.is_empty() && !backward.is_empty();
        let before = self.num_lines();
        self.push_line(&forward.points, &forward.colors, paired);
        self.push_line(&backward.points, &backward.colors, paired);
        self.num_lines() - before
    }

    #[inline]
    pub fn num_lines(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    #[inline]
    pub fn total_points(&self) -> usize {
        self.points.len() / 3
    }

    /// Flat xyz buffer.
    pub fn points(&self) -> &[f32] {
        &self.points
    }

    /// Flat rgba buffer.
    pub fn colors(&self) -> &[f32] {
        &self.colors
    }

    pub fn line_counts(&self) -> &[usize] {
        &self.counts
    }

    /// Line boundaries in points: `[0, end_0, end_1, ...]`.
    pub fn line_offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn pairing(&self) -> &[bool] {
        &self.paired
    }

    /// Points of line `i` as vectors.
    pub fn line(&self, i: usize) -> Option<Vec<Vec3>> {
        let count = *self.counts.get(i)?;
        let start = self.offsets[i];
        Some(
            self.points[start * 3..(start + count) * 3]
                .chunks_exact(3)
                .map(|c| Vec3::new(c[0], c[1], c[2]))
                .collect(),
        )
    }

    /// Overwrite the alpha channel of every color.
    pub fn set_alpha(&mut self, alpha: f32) {
        for c in self.colors.chunks_exact_mut(4) {
            c[3] = alpha;
        }
    }

    /// The last `n` points of every line holding at least `n` points, each
    /// line's points listed from its end inward.
    ///
    /// These are the points farthest from the seed, used to start a
    /// follow-up pass from where tracts terminate.
    pub fn tract_endpoints(&self, n: usize) -> Vec<Vec3> {
        if n == 0 {
            return Vec::new();
        }
        let mut out = Vec::new();
        for (&start, &count) in self.offsets.iter().zip(self.counts.iter()) {
            if count < n {
                continue;
            }
            let end = start + count;
            for p in (end - n..end).rev() {
                let c = &self.points[p * 3..p * 3 + 3];
                out.push(Vec3::new(c[0], c[1], c[2]));
            }
        }
        out
    }
}
