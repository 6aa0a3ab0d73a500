//! Scalar per-voxel maps: white-matter mask, exclusion, inclusion and gray-matter volumes.

use crate::grid::VoxelGrid;
use crate::Result;

/// A scalar value per voxel of a [`VoxelGrid`].
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarVolume {
    grid: VoxelGrid,
    data: Vec<f32>,
}

impl ScalarVolume {
    /// Wrap existing data. Fails when the length does not match the grid.
    pub fn new(grid: VoxelGrid, data: Vec<f32>) -> Result<Self> {
        grid.check_len(data.len())?;
        Ok(Self { grid, data })
    }

    /// Volume with every voxel set to `value`.
    pub fn filled(grid: VoxelGrid, value: f32) -> Self {
        Self {
            data: vec![value; grid.num_voxels()],
            grid,
        }
    }

    /// Volume whose value is computed from voxel coordinates.
    pub fn from_fn<F>(grid: VoxelGrid, mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> f32,
    {
        let mut data = Vec::with_capacity(grid.num_voxels());
        for z in 0..grid.frames() {
            for y in 0..grid.rows() {
                for x in 0..grid.columns() {
                    data.push(f(x, y, z));
                }
            }
        }
        Self { grid, data }
    }

    #[inline]
    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// Value at flat index, 0 for indices outside the volume.
    #[inline]
    pub fn at(&self, index: usize) -> f32 {
        self.data.get(index).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: f32) {
        self.data[index] = value;
    }

    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Indices of voxels with a strictly positive value, in index order.
    pub fn positive_indices(&self) -> Vec<usize> {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > 0.0)
            .map(|(i, _)| i)
            .collect()
    }
}
