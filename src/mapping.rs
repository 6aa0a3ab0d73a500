//! SpaceMapping - voxel correspondence between an anatomical and a functional grid.
//!
//! Regions, streamlines and maps live in anatomy space while resting-state
//! signals live on a coarser functional grid. Each grid has a voxel origin
//! (the voxel index of the shared reference point), and a voxel maps by
//!
//! ```text
//! f = (a - origin_a) * voxel_a / voxel_f + origin_f
//! ```
//!
//! per axis, with an optional mirror of any functional axis for datasets
//! stored in flipped orientation. A flip mirrors whole functional voxels
//! (`i -> dims - 1 - i`), so a flipped mapping is the unflipped one read
//! back to front.

use crate::geometry::Vec3;
use crate::grid::VoxelGrid;
use crate::volume::ScalarVolume;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpaceMapping {
    anatomy: VoxelGrid,
    functional: VoxelGrid,
    anatomy_origin: Vec3,
    functional_origin: Vec3,
    flip: [bool; 3],
}

impl SpaceMapping {
    pub fn new(
        anatomy: VoxelGrid,
        anatomy_origin: Vec3,
        functional: VoxelGrid,
        functional_origin: Vec3,
    ) -> Self {
        Self {
            anatomy,
            functional,
            anatomy_origin,
            functional_origin,
            flip: [false; 3],
        }
    }

    /// Both spaces share one grid and origin.
    pub fn identity(grid: VoxelGrid) -> Self {
        Self::new(grid, Vec3::ZERO, grid, Vec3::ZERO)
    }

    pub fn with_flip(mut self, flip: [bool; 3]) -> Self {
        self.flip = flip;
        self
    }

    #[inline]
    pub fn anatomy(&self) -> &VoxelGrid {
        &self.anatomy
    }

    #[inline]
    pub fn functional(&self) -> &VoxelGrid {
        &self.functional
    }

    fn dims(grid: &VoxelGrid) -> [usize; 3] {
        [grid.columns(), grid.rows(), grid.frames()]
    }

    /// Continuous functional voxel coordinates of an anatomy voxel coordinate.
    ///
    /// Axis flips are not applied here; they mirror whole voxels once the
    /// coordinate has been binned.
    pub fn to_functional_coords(&self, a: Vec3) -> Vec3 {
        let va = self.anatomy.voxel_size();
        let vf = self.functional.voxel_size();
        let mut f = [0.0f32; 3];
        for axis in 0..3 {
            f[axis] = (a[axis] - self.anatomy_origin[axis]) * va[axis] / vf[axis]
                + self.functional_origin[axis];
        }
        Vec3::from_array(f)
    }

    /// Continuous anatomy voxel coordinates of an unflipped functional voxel coordinate.
    pub fn to_anatomy_coords(&self, f: Vec3) -> Vec3 {
        let va = self.anatomy.voxel_size();
        let vf = self.functional.voxel_size();
        let mut a = [0.0f32; 3];
        for axis in 0..3 {
            a[axis] = (f[axis] - self.functional_origin[axis]) * vf[axis] / va[axis]
                + self.anatomy_origin[axis];
        }
        Vec3::from_array(a)
    }

    /// Mirror functional voxel coordinates along the flipped axes.
    fn mirror(&self, coords: [i64; 3]) -> [i64; 3] {
        let dims = Self::dims(&self.functional);
        let mut out = coords;
        for axis in 0..3 {
            if self.flip[axis] {
                out[axis] = dims[axis] as i64 - 1 - coords[axis];
            }
        }
        out
    }

    /// Functional voxel holding anatomy voxel `(x, y, z)`; `None` outside the functional grid.
    pub fn anatomy_to_functional(&self, x: usize, y: usize, z: usize) -> Option<usize> {
        let f = self.to_functional_coords(Vec3::new(x as f32, y as f32, z as f32));
        let plain = [f.x.floor() as i64, f.y.floor() as i64, f.z.floor() as i64];
        // Bounds are checked on the unflipped bin; the mirror stays inside the grid
        self.functional.checked_index(plain[0], plain[1], plain[2])?;
        let [fx, fy, fz] = self.mirror(plain);
        self.functional.checked_index(fx, fy, fz)
    }

    /// Functional voxel holding an anatomy-space world position (mm).
    pub fn world_to_functional(&self, pos: Vec3) -> Option<usize> {
        let a = self.anatomy.voxel_of(pos)?;
        let (x, y, z) = self.anatomy.coords(a);
        self.anatomy_to_functional(x, y, z)
    }

    /// Anatomy voxel coordinates of a functional voxel index.
    pub fn functional_to_anatomy(&self, index: usize) -> Vec3 {
        let (x, y, z) = self.functional.coords(index);
        let [ux, uy, uz] = self.mirror([x as i64, y as i64, z as i64]);
        self.to_anatomy_coords(Vec3::new(ux as f32, uy as f32, uz as f32))
    }

    /// Sample a functional-space volume onto the anatomy grid.
    ///
    /// Anatomy voxels that fall outside the functional grid read 0.
    pub fn resample_to_anatomy(&self, functional: &ScalarVolume) -> ScalarVolume {
        ScalarVolume::from_fn(self.anatomy, |x, y, z| {
            self.anatomy_to_functional(x, y, z)
                .map_or(0.0, |i| functional.at(i))
        })
    }
}
