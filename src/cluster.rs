//! ClusterEngine - 6-connected components of a z-score map with size erosion.
//!
//! Components are grown with an explicit stack from every unvisited nonzero
//! voxel. A component becomes a [`Cluster`] only once it is complete and at
//! least `min_cluster_size` voxels large; smaller components are dropped
//! whole, never partially committed.

use crate::config::RestingStateConfig;
use crate::geometry::Vec3;
use crate::grid::VoxelGrid;
use crate::volume::ScalarVolume;
use crate::voxel_mask::VoxelMask;
use crate::Result;
use tracing::debug;

/// One accepted connected component.
#[derive(Clone, Debug, PartialEq)]
pub struct Cluster {
    pub mask: VoxelMask,
    /// Member voxels in discovery order
    pub voxels: Vec<usize>,
    /// Largest value inside the cluster
    pub peak: f32,
    /// Mean voxel coordinate
    pub centroid: Vec3,
}

impl Cluster {
    #[inline]
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    #[inline]
    pub fn contains(&self, voxel: usize) -> bool {
        self.mask.contains(voxel)
    }
}

/// Clusters found in one map, ordered by first voxel index.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterSet {
    grid: VoxelGrid,
    clusters: Vec<Cluster>,
    eroded: usize,
}

impl ClusterSet {
    #[inline]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Cluster> {
        self.clusters.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cluster> {
        self.clusters.iter()
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Components discarded for being too small.
    pub fn eroded(&self) -> usize {
        self.eroded
    }

    /// Volume holding `i + 1` on voxels of cluster `i`, 0 elsewhere.
    pub fn label_volume(&self) -> ScalarVolume {
        let mut labels = ScalarVolume::filled(self.grid, 0.0);
        for (i, c) in self.clusters.iter().enumerate() {
            for &v in &c.voxels {
                labels.set(v, (i + 1) as f32);
            }
        }
        labels
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ClusterEngine {
    min_cluster_size: usize,
}

impl ClusterEngine {
    pub fn new(config: &RestingStateConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            min_cluster_size: config.min_cluster_size,
        })
    }

    pub fn min_cluster_size(&self) -> usize {
        self.min_cluster_size
    }

    /// Cluster the nonzero voxels of `map`.
    pub fn find_clusters(&self, map: &ScalarVolume) -> ClusterSet {
        let grid = *map.grid();
        let mut mask = VoxelMask::new(grid.num_voxels());
        for (i, &v) in map.data().iter().enumerate() {
            if v != 0.0 {
                mask.insert(i);
            }
        }
        self.find_clusters_in_mask(&grid, &mask, Some(map))
    }

    /// Cluster the voxels set in `mask`; `values` supplies cluster peaks.
    pub fn find_clusters_in_mask(
        &self,
        grid: &VoxelGrid,
        mask: &VoxelMask,
        values: Option<&ScalarVolume>,
    ) -> ClusterSet {
        let n = grid.num_voxels();
        let mut visited = VoxelMask::new(n);
        let mut stack = Vec::new();
        let mut clusters = Vec::new();
        let mut eroded = 0;

        for start in mask.indices() {
            if start >= n || visited.contains(start) {
                continue;
            }
            visited.insert(start);
            stack.push(start);
            let mut component = Vec::new();
            while let Some(v) = stack.pop() {
                component.push(v);
                for nb in grid.neighbors6(v) {
                    if mask.contains(nb) && !visited.contains(nb) {
                        visited.insert(nb);
                        stack.push(nb);
                    }
                }
            }

            if component.len() < self.min_cluster_size {
                eroded += 1;
                continue;
            }
            clusters.push(build_cluster(grid, component, values));
        }

        debug!(
            target: "fibernav::cluster",
            "Found {} clusters, eroded {} components below {} voxels",
            clusters.len(),
            eroded,
            self.min_cluster_size
        );
        ClusterSet {
            grid: *grid,
            clusters,
            eroded,
        }
    }
}

fn build_cluster(grid: &VoxelGrid, voxels: Vec<usize>, values: Option<&ScalarVolume>) -> Cluster {
    let mask = VoxelMask::from_indices(grid.num_voxels(), &voxels);
    let mut sum = Vec3::ZERO;
    let mut peak = f32::NEG_INFINITY;
    for &v in &voxels {
        let (x, y, z) = grid.coords(v);
        sum += Vec3::new(x as f32, y as f32, z as f32);
        peak = peak.max(values.map_or(1.0, |vol| vol.at(v)));
    }
    Cluster {
        mask,
        centroid: sum * (1.0 / voxels.len() as f32),
        peak,
        voxels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(min: usize) -> ClusterEngine {
        ClusterEngine::new(&RestingStateConfig {
            min_cluster_size: min,
            ..RestingStateConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_six_connectivity() {
        let grid = VoxelGrid::unit(3, 3, 1).unwrap();
        // Diagonal neighbours are not connected
        let mut map = ScalarVolume::filled(grid, 0.0);
        map.set(grid.index(0, 0, 0), 2.0);
        map.set(grid.index(1, 1, 0), 3.0);
        let set = engine(1).find_clusters(&map);
        assert_eq!(set.len(), 2);
        assert_eq!(set.eroded(), 0);
    }

    #[test]
    fn test_erosion_drops_small_components() {
        let grid = VoxelGrid::unit(5, 5, 1).unwrap();
        let mut map = ScalarVolume::filled(grid, 0.0);
        for x in 0..5 {
            map.set(grid.index(x, 0, 0), 1.0);
        }
        map.set(grid.index(2, 3, 0), 4.0);
        let set = engine(3).find_clusters(&map);
        assert_eq!(set.len(), 1);
        assert_eq!(set.eroded(), 1);
        let c = set.get(0).unwrap();
        assert_eq!(c.len(), 5);
        assert_eq!(c.centroid, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(c.peak, 1.0);
        assert!(!c.contains(grid.index(2, 3, 0)));
    }

    #[test]
    fn test_label_volume() {
        let grid = VoxelGrid::unit(4, 1, 1).unwrap();
        let map = ScalarVolume::new(grid, vec![1.0, 0.0, 2.0, 2.0]).unwrap();
        let set = engine(1).find_clusters(&map);
        assert_eq!(set.label_volume().data(), &[1.0, 0.0, 2.0, 2.0]);
    }

    #[test]
    fn test_negative_values_cluster_too() {
        let grid = VoxelGrid::unit(2, 1, 1).unwrap();
        let map = ScalarVolume::new(grid, vec![-1.0, -3.0]).unwrap();
        let set = engine(2).find_clusters(&map);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(0).unwrap().peak, -1.0);
    }
}
