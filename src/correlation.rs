//! CorrelationEngine - seed-based correlation and z-scoring over a [`SignalStore`].
//!
//! For a seed voxel set the engine averages the seeds' normalized series,
//! correlates every participating voxel against that mean and standardizes
//! the correlations:
//!
//! ```text
//! corr_v = Σ_b (m_b - μ_m)(s_vb - μ_v) / (σ_m σ_v) / (bands - 1)
//! z_v    = (corr_v - mean) / sigma
//! ```
//!
//! `mean` and `sigma` are taken over the reference population chosen by
//! [`ZScoreReference`]. The computation runs in voxel order with no
//! randomness, so identical inputs give bit-identical maps.

use crate::config::{RestingStateConfig, ZScoreReference};
use crate::geometry::Vec3;
use crate::grid::VoxelGrid;
use crate::mapping::SpaceMapping;
use crate::region::RegionTree;
use crate::signal::SignalStore;
use crate::voxel_mask::VoxelMask;
use crate::volume::ScalarVolume;
use crate::{FiberNavError, Result};
use tracing::{debug, info, warn};

/// A voxel retained by the z-threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SuprathresholdPoint {
    pub voxel: usize,
    /// z-score, or 0 when retained with a zero threshold
    pub z: f32,
}

/// Output of one correlation query.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationMap {
    grid: VoxelGrid,
    correlation: Vec<f32>,
    z_scores: Vec<f32>,
    points: Vec<SuprathresholdPoint>,
    z_range: Option<(f32, f32)>,
    reference_mean: f32,
    reference_sigma: f32,
    seed_count: usize,
}

impl CorrelationMap {
    #[inline]
    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// Raw correlation per voxel; 0 for voxels that do not participate.
    pub fn correlation(&self) -> &[f32] {
        &self.correlation
    }

    /// z-score per voxel; 0 for voxels outside the reference population.
    pub fn z_scores(&self) -> &[f32] {
        &self.z_scores
    }

    /// Retained voxels in index order.
    pub fn points(&self) -> &[SuprathresholdPoint] {
        &self.points
    }

    /// Smallest positive and largest observed z-score.
    pub fn z_range(&self) -> Option<(f32, f32)> {
        self.z_range
    }

    /// Mean and sigma of the correlations used for z-scoring.
    pub fn reference(&self) -> (f32, f32) {
        (self.reference_mean, self.reference_sigma)
    }

    /// Valid seed voxels the map was computed from.
    pub fn seed_count(&self) -> usize {
        self.seed_count
    }

    /// Membership of the retained voxels.
    pub fn retained_mask(&self) -> VoxelMask {
        let mut mask = VoxelMask::new(self.grid.num_voxels());
        for p in &self.points {
            mask.insert(p.voxel);
        }
        mask
    }

    /// z-score of retained voxels, 0 elsewhere.
    pub fn suprathreshold_volume(&self) -> ScalarVolume {
        let mut vol = ScalarVolume::filled(self.grid, 0.0);
        for p in &self.points {
            vol.set(p.voxel, p.z);
        }
        vol
    }

    /// Retained voxels as anatomy voxel coordinates paired with their z-score.
    pub fn anatomy_points(&self, mapping: &SpaceMapping) -> Vec<(Vec3, f32)> {
        self.points
            .iter()
            .map(|p| (mapping.functional_to_anatomy(p.voxel), p.z))
            .collect()
    }
}

pub struct CorrelationEngine<'a> {
    signals: &'a SignalStore,
    config: RestingStateConfig,
}

impl<'a> CorrelationEngine<'a> {
    pub fn new(signals: &'a SignalStore, config: RestingStateConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { signals, config })
    }

    pub fn config(&self) -> &RestingStateConfig {
        &self.config
    }

    /// Correlate the whole volume against the mean series of `seeds`.
    ///
    /// Out-of-range seed indices are skipped with a warning. An empty
    /// (or entirely invalid) seed set is an error.
    pub fn correlate(&self, seeds: &[usize]) -> Result<CorrelationMap> {
        let n = self.signals.num_voxels();
        let valid: Vec<usize> = seeds.iter().copied().filter(|&s| s < n).collect();
        if valid.len() < seeds.len() {
            warn!(
                target: "fibernav::correlation",
                "Skipping {} seed voxels outside the grid",
                seeds.len() - valid.len()
            );
        }
        if valid.is_empty() {
            return Err(FiberNavError::InvalidParameter(
                "correlation needs at least one seed voxel inside the grid".to_string(),
            ));
        }

        let mean_series = self.signals.mean_series(&valid);
        let (ref_mean, ref_sigma) = crate::signal::mean_and_sigma(&mean_series);
        let norm = (self.signals.bands() - 1) as f32;

        let mut correlation = vec![0.0f32; n];
        if ref_sigma > 0.0 {
            for (v, corr) in correlation.iter_mut().enumerate() {
                if !self.signals.participates(v) {
                    continue;
                }
                let mu = self.signals.mean(v);
                let num: f32 = mean_series
                    .iter()
                    .zip(self.signals.series(v))
                    .map(|(m, s)| (m - ref_mean) * (s - mu))
                    .sum();
                *corr = num / (ref_sigma * self.signals.sigma(v)) / norm;
            }
        } else {
            debug!(target: "fibernav::correlation", "Seed mean series is flat; all correlations are 0");
        }

        let in_reference = |v: usize, c: f32| -> bool {
            self.signals.participates(v)
                && match self.config.z_reference {
                    ZScoreReference::AllParticipating => true,
                    ZScoreReference::PositiveOnly => c > 0.0,
                }
        };

        let mut count = 0usize;
        let mut sum = 0.0f32;
        for (v, &c) in correlation.iter().enumerate() {
            if ref_sigma > 0.0 && in_reference(v, c) {
                sum += c;
                count += 1;
            }
        }
        let (mean, sigma) = if count > 0 {
            let mean = sum / count as f32;
            let var = correlation
                .iter()
                .enumerate()
                .filter(|&(v, &c)| ref_sigma > 0.0 && in_reference(v, c))
                .map(|(_, &c)| (c - mean) * (c - mean))
                .sum::<f32>()
                / count as f32;
            (mean, var.sqrt())
        } else {
            (0.0, 0.0)
        };

        let threshold = self.config.z_threshold;
        let mut z_scores = vec![0.0f32; n];
        let mut points = Vec::new();
        let mut z_min = f32::INFINITY;
        let mut z_max = f32::NEG_INFINITY;
        for (v, &c) in correlation.iter().enumerate() {
            let scored = ref_sigma > 0.0 && in_reference(v, c);
            if scored {
                let z = if sigma > 0.0 { (c - mean) / sigma } else { 0.0 };
                z_scores[v] = z;
                if z > 0.0 && z < z_min {
                    z_min = z;
                }
                if z > z_max {
                    z_max = z;
                }
            }
            if threshold == 0.0 {
                if scored && c != 0.0 {
                    points.push(SuprathresholdPoint { voxel: v, z: 0.0 });
                }
            } else if scored && z_scores[v] > threshold {
                points.push(SuprathresholdPoint {
                    voxel: v,
                    z: z_scores[v],
                });
            }
        }
        let z_range = (z_min.is_finite() && z_max.is_finite()).then_some((z_min, z_max));

        info!(
            target: "fibernav::correlation",
            "Correlated {} voxels against {} seeds: {} retained (mean {:.4}, sigma {:.4})",
            count,
            valid.len(),
            points.len(),
            mean,
            sigma
        );

        Ok(CorrelationMap {
            grid: *self.signals.grid(),
            correlation,
            z_scores,
            points,
            z_range,
            reference_mean: mean,
            reference_sigma: sigma,
            seed_count: valid.len(),
        })
    }
}

fn dedup_in_order(voxels: impl Iterator<Item = usize>, n: usize) -> Vec<usize> {
    let mut seen = VoxelMask::new(n);
    let mut out = Vec::new();
    for v in voxels {
        if !seen.contains(v) {
            seen.insert(v);
            out.push(v);
        }
    }
    out
}

/// Functional voxels covered by the active, non-NOT regions of `tree`.
///
/// Each region's anatomy voxels are mapped through `mapping`; duplicates are
/// dropped and first-seen order is kept.
pub fn seed_voxels_from_regions(tree: &RegionTree, mapping: &SpaceMapping) -> Vec<usize> {
    let anatomy = mapping.anatomy();
    let vs = anatomy.voxel_size();
    let dims = [anatomy.columns(), anatomy.rows(), anatomy.frames()];
    let mut mapped = Vec::new();
    for (_, region) in tree.iter().filter(|(_, r)| r.active && !r.not) {
        let b = region.bounds(anatomy);
        let mut lo = [0usize; 3];
        let mut hi = [0usize; 3];
        let mut empty = false;
        for axis in 0..3 {
            let min = (b.min[axis] / vs[axis]).floor().max(0.0);
            let max = (b.max[axis] / vs[axis]).floor();
            if max < 0.0 || min >= dims[axis] as f32 {
                empty = true;
                break;
            }
            lo[axis] = min as usize;
            hi[axis] = (max as usize).min(dims[axis] - 1);
        }
        if empty {
            continue;
        }
        for x in lo[0]..=hi[0] {
            for y in lo[1]..=hi[1] {
                for z in lo[2]..=hi[2] {
                    if let Some(f) = mapping.anatomy_to_functional(x, y, z) {
                        mapped.push(f);
                    }
                }
            }
        }
    }
    dedup_in_order(mapped.into_iter(), mapping.functional().num_voxels())
}

/// Functional voxels holding anatomy-space world points, e.g. streamline endpoints.
pub fn voxels_from_points(points: &[Vec3], mapping: &SpaceMapping) -> Vec<usize> {
    dedup_in_order(
        points.iter().filter_map(|&p| mapping.world_to_functional(p)),
        mapping.functional().num_voxels(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;
    use approx::assert_relative_eq;

    /// Voxels 0..4 share a sine-like course, voxel 4 is anti-correlated, the rest are flat.
    fn store() -> SignalStore {
        let grid = VoxelGrid::unit(3, 3, 1).unwrap();
        let up = vec![0.0, 1.0, 2.0, 3.0, 2.0, 1.0];
        let down: Vec<f32> = up.iter().map(|v| 3.0 - v).collect();
        let mut series = vec![up.clone(); 4];
        series.push(down);
        series.extend(vec![vec![5.0; 6]; 4]);
        SignalStore::from_voxel_series(grid, &series).unwrap()
    }

    fn config(z: f32) -> RestingStateConfig {
        RestingStateConfig {
            z_threshold: z,
            ..RestingStateConfig::default()
        }
    }

    #[test]
    fn test_self_correlation_scaled_by_bands() {
        let signals = store();
        let engine = CorrelationEngine::new(&signals, config(1.0)).unwrap();
        let map = engine.correlate(&[0]).unwrap();
        // Population sigma with (bands - 1) normalization: r * bands / (bands - 1)
        assert_relative_eq!(map.correlation()[1], 6.0 / 5.0, epsilon = 1e-5);
        assert_relative_eq!(map.correlation()[4], -6.0 / 5.0, epsilon = 1e-5);
        assert_eq!(map.correlation()[5], 0.0);
    }

    #[test]
    fn test_all_participating_reference() {
        let signals = store();
        let engine = CorrelationEngine::new(&signals, config(0.4)).unwrap();
        let map = engine.correlate(&[0, 1]).unwrap();
        // Four voxels at +1.2 and one at -1.2
        let (mean, sigma) = map.reference();
        assert_relative_eq!(mean, 0.72, epsilon = 1e-5);
        assert_relative_eq!(sigma, 0.96, epsilon = 1e-5);
        assert_eq!(map.points().len(), 4);
        assert!(map.points().iter().all(|p| p.voxel < 4));
        let (z_min, z_max) = map.z_range().unwrap();
        assert_relative_eq!(z_min, 0.5, epsilon = 1e-5);
        assert_relative_eq!(z_max, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_positive_only_reference() {
        let signals = store();
        let cfg = RestingStateConfig {
            z_threshold: 0.0,
            z_reference: ZScoreReference::PositiveOnly,
            ..RestingStateConfig::default()
        };
        let engine = CorrelationEngine::new(&signals, cfg).unwrap();
        let map = engine.correlate(&[0]).unwrap();
        let (mean, sigma) = map.reference();
        assert_relative_eq!(mean, 1.2, epsilon = 1e-5);
        assert_relative_eq!(sigma, 0.0, epsilon = 1e-5);
        // Zero threshold keeps every scored voxel, tagged 0
        assert_eq!(map.points().len(), 4);
        assert!(map.points().iter().all(|p| p.z == 0.0));
    }

    #[test]
    fn test_invalid_seeds() {
        let signals = store();
        let engine = CorrelationEngine::new(&signals, config(1.0)).unwrap();
        assert!(matches!(
            engine.correlate(&[]),
            Err(FiberNavError::InvalidParameter(_))
        ));
        assert!(engine.correlate(&[100]).is_err());
        let map = engine.correlate(&[0, 100]).unwrap();
        assert_eq!(map.seed_count(), 1);
    }

    #[test]
    fn test_flat_seed_gives_zero_map() {
        let signals = store();
        let engine = CorrelationEngine::new(&signals, config(1.0)).unwrap();
        let map = engine.correlate(&[6]).unwrap();
        assert!(map.correlation().iter().all(|&c| c == 0.0));
        assert!(map.points().is_empty());
        assert!(map.z_range().is_none());
    }

    #[test]
    fn test_seed_voxels_from_regions() {
        let anatomy = VoxelGrid::unit(6, 6, 6).unwrap();
        let functional = VoxelGrid::new(3, 3, 3, Vec3::new(2.0, 2.0, 2.0)).unwrap();
        let mapping = SpaceMapping::new(anatomy, Vec3::ZERO, functional, Vec3::ZERO);
        let mut tree = RegionTree::new();
        tree.add_root(Region::new_box(Vec3::new(1.0, 1.0, 1.0), Vec3::new(1.0, 1.0, 1.0)));
        tree.add_root(Region::new_box(Vec3::new(5.0, 5.0, 5.0), Vec3::new(1.0, 1.0, 1.0)).with_not(false));
        let voxels = seed_voxels_from_regions(&tree, &mapping);
        // Anatomy voxels 0..=1 on each axis collapse into functional voxel 0
        assert_eq!(voxels, vec![0]);

        let pts = [Vec3::new(0.5, 0.5, 0.5), Vec3::new(5.5, 0.5, 0.5), Vec3::new(9.0, 0.0, 0.0)];
        assert_eq!(voxels_from_points(&pts, &mapping), vec![0, 2]);
    }
}
