//! fibernav - Streamline Tractography and Resting-State Network Engine
//!
//! fibernav is the computational core of a neuro-imaging viewer. It
//! reconstructs white-matter fiber pathways from per-voxel diffusion data and
//! detects functional networks in resting-state fMRI through seed-based
//! correlation and spatial clustering. Both engines share one voxel-grid
//! addressing scheme and one region-of-interest hierarchy.
//!
//! # Key Characteristics
//!
//! - Tensor (DTI) and multi-fiber (HARDI) streamline integration
//! - Seed boxes with inclusion, NOT-prune and NOT-remove children
//! - Exclusion, inclusion ("AND") and gray-matter maps
//! - Magnet regions that bend walks toward a field vector
//! - Seed-based correlation with z-scoring and cluster erosion
//!
//! # Architecture
//!
//! - **VoxelGrid / ScalarVolume**: flattened `z*cols*rows + y*cols + x` voxel data
//! - **DirectionField**: tensor field or maxima (stick) field
//! - **RegionTree**: seed boxes, their children and magnets
//! - **Tracker**: seeds, integrates and filters one pass into a **StreamlineStore**
//! - **SignalStore / CorrelationEngine / ClusterEngine**: resting-state pipeline
//!
//! # Examples
//!
//! ## Tracking a Straight Tensor Field
//!
//! ```
//! use fibernav::{
//!     DirectionField, Mat3, Region, RegionTree, SeedSource, StreamlineStore, TensorField,
//!     Tracker, TrackingConfig, Vec3, VoxelGrid,
//! };
//!
//! let grid = VoxelGrid::unit(20, 10, 10).unwrap();
//! let n = grid.num_voxels();
//! let field: DirectionField =
//!     TensorField::new(grid, vec![Mat3::diagonal(1.0, 0.1, 0.1); n], vec![0.7; n])
//!         .unwrap()
//!         .into();
//!
//! let mut regions = RegionTree::new();
//! regions.add_root(Region::new_box(Vec3::new(10.0, 5.0, 5.0), Vec3::new(2.0, 2.0, 2.0)));
//!
//! let config = TrackingConfig {
//!     min_fiber_length: 10.0,
//!     seeds_per_axis: 2,
//!     ..TrackingConfig::default()
//! };
//! let mut store = StreamlineStore::new();
//! let report = Tracker::new(&grid, &regions, &config)
//!     .with_field(&field)
//!     .run(&SeedSource::Regions, &mut store)
//!     .unwrap();
//!
//! assert_eq!(report.accepted, 8);
//! assert_eq!(store.num_lines(), 16);
//! ```
//!
//! ## Correlation and Clustering
//!
//! ```
//! use fibernav::{ClusterEngine, CorrelationEngine, RestingStateConfig, SignalStore, VoxelGrid};
//!
//! let grid = VoxelGrid::unit(4, 1, 1).unwrap();
//! let series = vec![
//!     vec![0.0, 1.0, 2.0, 1.0],
//!     vec![0.0, 1.0, 2.0, 1.0],
//!     vec![2.0, 1.0, 0.0, 1.0],
//!     vec![1.0, 1.0, 1.0, 1.0],
//! ];
//! let signals = SignalStore::from_voxel_series(grid, &series).unwrap();
//! let config = RestingStateConfig {
//!     z_threshold: 0.5,
//!     min_cluster_size: 2,
//!     ..RestingStateConfig::default()
//! };
//!
//! let map = CorrelationEngine::new(&signals, config.clone())
//!     .unwrap()
//!     .correlate(&[0])
//!     .unwrap();
//! let clusters = ClusterEngine::new(&config)
//!     .unwrap()
//!     .find_clusters(&map.suprathreshold_volume());
//!
//! assert_eq!(map.points().len(), 2);
//! assert_eq!(clusters.len(), 1);
//! ```
//!
//! # Logging
//!
//! Progress and summaries are emitted through `tracing` under the
//! `fibernav::*` targets. The library never installs a subscriber.

pub mod cluster;
pub mod config;
pub mod correlation;
pub mod error;
pub mod field;
pub mod geometry;
pub mod grid;
pub mod mapping;
pub mod region;
pub mod report;
pub mod signal;
pub mod store;
pub mod tracking;
pub mod volume;
pub mod voxel_mask;

// Re-exports for convenient access
pub use cluster::{Cluster, ClusterEngine, ClusterSet};
pub use config::{RestingStateConfig, TrackingConfig, ZScoreReference};
pub use correlation::{
    seed_voxels_from_regions, voxels_from_points, CorrelationEngine, CorrelationMap,
    SuprathresholdPoint,
};
pub use error::{FiberNavError, Result};
pub use field::{DirectionField, MaximaField, TensorField};
pub use geometry::{Aabb, Mat3, Vec3};
pub use grid::VoxelGrid;
pub use mapping::SpaceMapping;
pub use region::{Region, RegionId, RegionShape, RegionTree};
pub use report::PassReport;
pub use signal::SignalStore;
pub use store::StreamlineStore;
pub use tracking::{SeedSource, SurfaceMesh, Tracker, TrackingMaps};
pub use volume::ScalarVolume;
pub use voxel_mask::VoxelMask;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = "fibernav";

/// Get version string
pub fn version() -> String {
    format!("{} v{}", NAME, VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(ver.contains("fibernav"));
        assert!(ver.contains(VERSION));
    }

    #[test]
    fn test_re_exports() {
        let _grid = VoxelGrid::unit(2, 2, 2).unwrap();
        let _result: Result<()> = Ok(());
        let _store = StreamlineStore::new();
        assert_eq!(TrackingConfig::default().seeds_per_axis, 10);
    }
}
