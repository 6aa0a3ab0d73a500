//! Seed generation for a tracking pass.
//!
//! Box, voxel and point sources expand into an N x N x N lattice per box
//! (x outermost, z innermost) with N = `seeds_per_axis`. Samples sit on
//! `min + i * extent / (N - 1)`, so both faces of the box are included.
//! With random initialization each lattice sample is replaced by a uniform
//! draw inside the same box. Surface sources seed once per vertex.

use crate::config::TrackingConfig;
use crate::geometry::{Aabb, Vec3};
use crate::grid::VoxelGrid;
use crate::region::{RegionId, RegionTree};
use crate::volume::ScalarVolume;
use crate::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Anything that can enumerate surface vertices in world coordinates.
pub trait SurfaceVertices {
    fn vertices(&self) -> &[Vec3];
}

/// Minimal triangle mesh.
#[derive(Clone, Debug, Default)]
pub struct SurfaceMesh {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
}

impl SurfaceVertices for SurfaceMesh {
    fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }
}

impl SurfaceVertices for Vec<Vec3> {
    fn vertices(&self) -> &[Vec3] {
        self
    }
}

/// Where seeds come from.
pub enum SeedSource<'a> {
    /// Every eligible seed box of the region tree
    Regions,
    /// Every voxel with a positive value
    Mask(&'a ScalarVolume),
    /// A voxel-sized box around each point
    Points(&'a [Vec3]),
    /// One seed per surface vertex
    Surface(&'a dyn SurfaceVertices),
}

impl SeedSource<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            SeedSource::Regions => "regions",
            SeedSource::Mask(_) => "mask",
            SeedSource::Points(_) => "points",
            SeedSource::Surface(_) => "surface",
        }
    }
}

/// A single seed point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Seed {
    pub position: Vec3,
    /// Seed box this seed was drawn from; its children filter the walk
    pub seed_box: Option<RegionId>,
}

pub struct SeedGenerator<'a> {
    grid: &'a VoxelGrid,
    regions: &'a RegionTree,
    seeds_per_axis: usize,
    random_init: bool,
    rng: StdRng,
}

impl<'a> SeedGenerator<'a> {
    pub fn new(grid: &'a VoxelGrid, regions: &'a RegionTree, config: &TrackingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            grid,
            regions,
            seeds_per_axis: config.seeds_per_axis,
            random_init: config.random_init,
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    /// Number of seeds `generate` will produce for `source`.
    pub fn expected_count(&self, source: &SeedSource<'_>) -> usize {
        let per_box = self.seeds_per_axis.pow(3);
        match source {
            SeedSource::Regions => self.regions.seed_boxes().count() * per_box,
            SeedSource::Mask(mask) => mask.positive_indices().len() * per_box,
            SeedSource::Points(points) => points.len() * per_box,
            SeedSource::Surface(surface) => surface.vertices().len(),
        }
    }

    /// Expand `source` into seeds.
    pub fn generate(&mut self, source: &SeedSource<'_>) -> Vec<Seed> {
        let mut seeds = Vec::with_capacity(self.expected_count(source));
        match source {
            SeedSource::Regions => {
                let boxes: Vec<(RegionId, Aabb)> = self
                    .regions
                    .seed_boxes()
                    .map(|(id, r)| (id, r.bounds(self.grid)))
                    .collect();
                for (id, bounds) in boxes {
                    self.lattice(bounds, Some(id), &mut seeds);
                }
            }
            SeedSource::Mask(mask) => {
                for index in mask.positive_indices() {
                    let bounds = self.grid.voxel_box(index);
                    self.lattice(bounds, None, &mut seeds);
                }
            }
            SeedSource::Points(points) => {
                let half = self.grid.voxel_size();
                for &p in points.iter() {
                    self.lattice(Aabb::new(p - half, p + half), None, &mut seeds);
                }
            }
            SeedSource::Surface(surface) => {
                seeds.extend(surface.vertices().iter().map(|&position| Seed {
                    position,
                    seed_box: None,
                }));
            }
        }
        seeds
    }

    fn lattice(&mut self, bounds: Aabb, seed_box: Option<RegionId>, out: &mut Vec<Seed>) {
        let n = self.seeds_per_axis;
        let e = bounds.extent();
        let denom = (n - 1) as f32;
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    let position = if self.random_init {
                        bounds.sample(&mut self.rng)
                    } else {
                        bounds.min
                            + Vec3::new(
                                e.x * i as f32 / denom,
                                e.y * j as f32 / denom,
                                e.z * k as f32 / denom,
                            )
                    };
                    out.push(Seed { position, seed_box });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;

    fn config(n: usize) -> TrackingConfig {
        TrackingConfig {
            seeds_per_axis: n,
            ..TrackingConfig::default()
        }
    }

    #[test]
    fn test_lattice_includes_both_faces() {
        let grid = VoxelGrid::unit(10, 10, 10).unwrap();
        let mut tree = RegionTree::new();
        let id = tree.add_root(Region::new_box(Vec3::new(5.0, 5.0, 5.0), Vec3::new(2.0, 2.0, 2.0)));
        let cfg = config(3);
        let mut gen = SeedGenerator::new(&grid, &tree, &cfg).unwrap();
        let seeds = gen.generate(&SeedSource::Regions);
        assert_eq!(seeds.len(), 27);
        assert_eq!(seeds[0].position, Vec3::new(4.0, 4.0, 4.0));
        assert_eq!(seeds[1].position, Vec3::new(4.0, 4.0, 5.0));
        assert_eq!(seeds[26].position, Vec3::new(6.0, 6.0, 6.0));
        assert!(seeds.iter().all(|s| s.seed_box == Some(id)));
    }

    #[test]
    fn test_random_init_stays_in_box() {
        let grid = VoxelGrid::unit(10, 10, 10).unwrap();
        let tree = RegionTree::new();
        let cfg = TrackingConfig {
            random_init: true,
            ..config(4)
        };
        let points = [Vec3::new(3.0, 3.0, 3.0)];
        let mut gen = SeedGenerator::new(&grid, &tree, &cfg).unwrap();
        let seeds = gen.generate(&SeedSource::Points(&points));
        assert_eq!(seeds.len(), 64);
        let b = Aabb::new(Vec3::new(2.0, 2.0, 2.0), Vec3::new(4.0, 4.0, 4.0));
        assert!(seeds.iter().all(|s| b.contains(s.position)));
    }

    #[test]
    fn test_mask_and_surface_counts() {
        let grid = VoxelGrid::unit(4, 4, 4).unwrap();
        let tree = RegionTree::new();
        let mut mask = ScalarVolume::filled(grid, 0.0);
        mask.set(0, 1.0);
        mask.set(5, 0.3);
        let cfg = config(2);
        let mut gen = SeedGenerator::new(&grid, &tree, &cfg).unwrap();
        let source = SeedSource::Mask(&mask);
        assert_eq!(gen.expected_count(&source), 16);
        assert_eq!(gen.generate(&source).len(), 16);

        let mesh = SurfaceMesh {
            vertices: vec![Vec3::new(1.0, 1.0, 1.0), Vec3::new(2.0, 2.0, 2.0)],
            triangles: Vec::new(),
        };
        let seeds = gen.generate(&SeedSource::Surface(&mesh));
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[1].position, Vec3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn test_no_seed_boxes_yields_nothing() {
        let grid = VoxelGrid::unit(4, 4, 4).unwrap();
        let mut tree = RegionTree::new();
        tree.add_root(Region::new_box(Vec3::ZERO, Vec3::new(1.0, 1.0, 1.0)).with_not(false));
        let cfg = config(2);
        let mut gen = SeedGenerator::new(&grid, &tree, &cfg).unwrap();
        assert!(gen.generate(&SeedSource::Regions).is_empty());
    }
}
