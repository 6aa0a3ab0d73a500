//! VoxelGrid - lattice geometry shared by the tracking and resting-state engines.
//!
//! Every flattened volume in the crate uses the same addressing:
//! `index = z * columns * rows + y * columns + x`.
//!
//! World coordinates are in millimetres. Voxel `(x, y, z)` covers
//! `[x * vx, (x + 1) * vx)` on the first axis, and likewise for the others.
//!
//! # Examples
//!
//! ```
//! use fibernav::{VoxelGrid, Vec3};
//!
//! let grid = VoxelGrid::new(10, 10, 10, Vec3::new(2.0, 2.0, 2.0)).unwrap();
//! assert_eq!(grid.num_voxels(), 1000);
//! assert_eq!(grid.voxel_of(Vec3::new(3.0, 1.0, 0.5)), Some(1));
//! assert_eq!(grid.voxel_of(Vec3::new(-0.1, 1.0, 0.5)), None);
//! ```

use crate::geometry::{Aabb, Vec3};
use crate::{FiberNavError, Result};
use serde::{Deserialize, Serialize};

/// Dimensions and physical spacing of a 3D voxel lattice.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoxelGrid {
    columns: usize,
    rows: usize,
    frames: usize,
    voxel_size: Vec3,
}

impl VoxelGrid {
    /// Create a grid. All dimensions and spacings must be positive.
    pub fn new(columns: usize, rows: usize, frames: usize, voxel_size: Vec3) -> Result<Self> {
        if columns == 0 || rows == 0 || frames == 0 {
            return Err(FiberNavError::InvalidParameter(format!(
                "grid dimensions must be positive, got {}x{}x{}",
                columns, rows, frames
            )));
        }
        if voxel_size.x <= 0.0 || voxel_size.y <= 0.0 || voxel_size.z <= 0.0 {
            return Err(FiberNavError::InvalidParameter(format!(
                "voxel size must be positive, got {:?}",
                voxel_size
            )));
        }
        Ok(Self {
            columns,
            rows,
            frames,
            voxel_size,
        })
    }

    /// Isotropic grid with 1mm voxels, convenient for synthetic data.
    pub fn unit(columns: usize, rows: usize, frames: usize) -> Result<Self> {
        Self::new(columns, rows, frames, Vec3::new(1.0, 1.0, 1.0))
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn voxel_size(&self) -> Vec3 {
        self.voxel_size
    }

    #[inline]
    pub fn num_voxels(&self) -> usize {
        self.columns * self.rows * self.frames
    }

    /// Flat index of voxel `(x, y, z)`. Caller guarantees the coordinates are in range.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < self.columns && y < self.rows && z < self.frames);
        z * self.columns * self.rows + y * self.columns + x
    }

    /// Flat index for signed coordinates, `None` when outside the lattice.
    #[inline]
    pub fn checked_index(&self, x: i64, y: i64, z: i64) -> Option<usize> {
        if x < 0 || y < 0 || z < 0 {
            return None;
        }
        let (x, y, z) = (x as usize, y as usize, z as usize);
        if x >= self.columns || y >= self.rows || z >= self.frames {
            return None;
        }
        Some(self.index(x, y, z))
    }

    /// Voxel coordinates of a flat index.
    #[inline]
    pub fn coords(&self, index: usize) -> (usize, usize, usize) {
        let slice = self.columns * self.rows;
        let z = index / slice;
        let rem = index % slice;
        (rem % self.columns, rem / self.columns, z)
    }

    /// Voxel containing a world position, `None` once the position leaves the grid.
    #[inline]
    pub fn voxel_of(&self, pos: Vec3) -> Option<usize> {
        let x = (pos.x / self.voxel_size.x).floor();
        let y = (pos.y / self.voxel_size.y).floor();
        let z = (pos.z / self.voxel_size.z).floor();
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return None;
        }
        self.checked_index(x as i64, y as i64, z as i64)
    }

    /// Continuous voxel coordinates of a world position.
    #[inline]
    pub fn to_voxel_space(&self, pos: Vec3) -> Vec3 {
        Vec3::new(
            pos.x / self.voxel_size.x,
            pos.y / self.voxel_size.y,
            pos.z / self.voxel_size.z,
        )
    }

    /// World position of the lower corner of voxel `index`.
    pub fn voxel_origin(&self, index: usize) -> Vec3 {
        let (x, y, z) = self.coords(index);
        Vec3::new(x as f32, y as f32, z as f32).scale(self.voxel_size)
    }

    /// Physical extent of voxel `index`.
    pub fn voxel_box(&self, index: usize) -> Aabb {
        let min = self.voxel_origin(index);
        Aabb::new(min, min + self.voxel_size)
    }

    /// Physical extent of the whole grid.
    pub fn bounds(&self) -> Aabb {
        Aabb::new(
            Vec3::ZERO,
            Vec3::new(
                self.columns as f32 * self.voxel_size.x,
                self.rows as f32 * self.voxel_size.y,
                self.frames as f32 * self.voxel_size.z,
            ),
        )
    }

    /// Face neighbours (east/west, north/south, front/back) of a voxel.
    pub fn neighbors6(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        const OFFSETS: [(i64, i64, i64); 6] = [
            (1, 0, 0),
            (-1, 0, 0),
            (0, 1, 0),
            (0, -1, 0),
            (0, 0, 1),
            (0, 0, -1),
        ];
        let (x, y, z) = self.coords(index);
        OFFSETS.iter().filter_map(move |&(dx, dy, dz)| {
            self.checked_index(x as i64 + dx, y as i64 + dy, z as i64 + dz)
        })
    }

    /// Ensure a flattened per-voxel buffer matches this grid.
    pub fn check_len(&self, len: usize) -> Result<()> {
        if len != self.num_voxels() {
            return Err(FiberNavError::InvalidInputSize {
                expected: self.num_voxels(),
                actual: len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        let grid = VoxelGrid::unit(4, 5, 6).unwrap();
        let idx = grid.index(3, 2, 1);
        assert_eq!(idx, 1 * 20 + 2 * 4 + 3);
        assert_eq!(grid.coords(idx), (3, 2, 1));
    }

    #[test]
    fn test_voxel_of_anisotropic() {
        let grid = VoxelGrid::new(4, 4, 4, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(grid.voxel_of(Vec3::new(1.5, 3.9, 6.1)), Some(grid.index(1, 1, 2)));
        // Per-axis test: x overflow must not wrap into the next row
        assert_eq!(grid.voxel_of(Vec3::new(4.0, 0.0, 0.0)), None);
        assert_eq!(grid.voxel_of(Vec3::new(0.0, 0.0, 12.0)), None);
    }

    #[test]
    fn test_neighbors6_edges() {
        let grid = VoxelGrid::unit(3, 3, 3).unwrap();
        assert_eq!(grid.neighbors6(grid.index(0, 0, 0)).count(), 3);
        assert_eq!(grid.neighbors6(grid.index(1, 1, 1)).count(), 6);
    }

    #[test]
    fn test_invalid_grid() {
        assert!(VoxelGrid::unit(0, 3, 3).is_err());
        assert!(VoxelGrid::new(2, 2, 2, Vec3::new(1.0, 0.0, 1.0)).is_err());
    }

    #[test]
    fn test_check_len() {
        let grid = VoxelGrid::unit(2, 2, 2).unwrap();
        assert!(grid.check_len(8).is_ok());
        assert!(matches!(
            grid.check_len(7),
            Err(FiberNavError::InvalidInputSize { expected: 8, actual: 7 })
        ));
    }
}
