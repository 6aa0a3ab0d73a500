//! Streamline tracking engine.
//!
//! A seeding pass is organised as:
//!
//! - [`seeding::SeedGenerator`] turns a [`seeding::SeedSource`] into seed points.
//! - An [`Integrator`] (tensor or HARDI) grows one half-walk per direction.
//! - [`filter::RegionFilter`] decides, voxel by voxel, whether a walk may go on.
//! - [`tracker::Tracker`] pairs the two halves, applies the length window and
//!   appends accepted streamlines to a [`StreamlineStore`](crate::StreamlineStore).
//!
//! Per-walk latches live in a [`filter::WalkState`] value created fresh for
//! every half-walk; per-seed state lives in a [`SeedContext`]. Nothing is
//! shared between seeds.

pub mod filter;
pub mod hardi;
pub mod magnet;
pub mod seeding;
pub mod tensor;
pub mod tracker;

pub use filter::{RegionFilter, TrackingMaps, Verdict, WalkState};
pub use hardi::HardiIntegrator;
pub use magnet::{Deflection, MagneticDeflector};
pub use seeding::{Seed, SeedGenerator, SeedSource, SurfaceMesh, SurfaceVertices};
pub use tensor::TensorIntegrator;
pub use tracker::Tracker;

use crate::geometry::Vec3;
use crate::region::RegionId;
use rand::rngs::StdRng;

/// Which way a half-walk leaves its seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }
}

/// State shared by the forward and backward walks of one seed.
pub struct SeedContext<'r> {
    /// Seed box the seed was drawn from, if any
    pub seed_box: Option<RegionId>,
    /// First direction chosen by a forward HARDI walk, replayed by its backward walk
    pub initial_direction: Option<Vec3>,
    pub rng: &'r mut StdRng,
}

impl<'r> SeedContext<'r> {
    pub fn new(seed_box: Option<RegionId>, rng: &'r mut StdRng) -> Self {
        Self {
            seed_box,
            initial_direction: None,
            rng,
        }
    }
}

/// Result of one direction of integration from a seed.
#[derive(Clone, Debug)]
pub struct HalfWalk {
    pub points: Vec<Vec3>,
    /// RGBA per point: absolute direction components and alpha
    pub colors: Vec<[f32; 4]>,
    /// Filter latches at the moment the walk stopped
    pub state: WalkState,
}

impl HalfWalk {
    pub fn new(state: WalkState) -> Self {
        Self {
            points: Vec::new(),
            colors: Vec::new(),
            state,
        }
    }

    #[inline]
    pub fn push(&mut self, point: Vec3, direction: Vec3, alpha: f32) {
        let c = direction.abs();
        self.points.push(point);
        self.colors.push([c.x, c.y, c.z, alpha]);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A streamline integration strategy.
pub trait Integrator {
    /// Short strategy name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Grow one half-walk from `seed` until a stopping condition fires.
    ///
    /// Leaving the grid is a normal stop. The returned walk owns the filter
    /// state it ended with so the caller can apply render/AND acceptance.
    fn track(
        &self,
        seed: Vec3,
        direction: Direction,
        filter: &RegionFilter<'_>,
        ctx: &mut SeedContext<'_>,
    ) -> HalfWalk;
}

/// Unit stick with the smallest angle to `reference`, each stick first
/// flipped to agree with it. Degenerate sticks are skipped.
pub fn closest_stick(reference: Vec3, sticks: &[Vec3]) -> Option<Vec3> {
    let mut best: Option<(f32, Vec3)> = None;
    for s in sticks {
        let u = s.normalized();
        if u.is_degenerate() {
            continue;
        }
        let u = u.aligned_with(reference);
        let angle = reference.angle_deg(u);
        if best.map_or(true, |(a, _)| angle < a) {
            best = Some((angle, u));
        }
    }
    best.map(|(_, u)| u)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_stick_skips_degenerate_and_flips() {
        let sticks = [Vec3::ZERO, Vec3::new(-2.0, 0.1, 0.0), Vec3::new(0.0, 1.0, 0.0)];
        let best = closest_stick(Vec3::X, &sticks).unwrap();
        assert!(best.x > 0.99);
        assert!(closest_stick(Vec3::X, &[Vec3::ZERO; 3]).is_none());
    }

    #[test]
    fn test_direction_sign() {
        assert_eq!(Direction::Forward.sign(), 1.0);
        assert_eq!(Direction::Backward.sign(), -1.0);
    }
}
