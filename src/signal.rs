//! SignalStore - normalized per-voxel time series for resting-state analysis.
//!
//! Raw samples are rescaled per voxel to `[0, 1]` with that voxel's min and
//! max. A flat series (max == min) becomes all zeros, so it has zero sigma
//! and never participates in correlation. Normalized series are stored
//! voxel-major (`series[v * bands + b]`) so a voxel's time course is one
//! contiguous slice.

use crate::grid::VoxelGrid;
use crate::volume::ScalarVolume;
use crate::{FiberNavError, Result};

/// Population mean and standard deviation of a series.
pub fn mean_and_sigma(series: &[f32]) -> (f32, f32) {
    if series.is_empty() {
        return (0.0, 0.0);
    }
    let n = series.len() as f32;
    let mean = series.iter().sum::<f32>() / n;
    let var = series.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
    (mean, var.sqrt())
}

#[derive(Clone, Debug)]
pub struct SignalStore {
    grid: VoxelGrid,
    bands: usize,
    series: Vec<f32>,
    stats: Vec<(f32, f32)>,
}

impl SignalStore {
    /// Build from band-major raw data, `raw[b * V + v]`, as stored in 4D images.
    pub fn from_band_major(grid: VoxelGrid, bands: usize, raw: &[f32]) -> Result<Self> {
        check_bands(bands)?;
        let n = grid.num_voxels();
        if raw.len() != n * bands {
            return Err(FiberNavError::InvalidInputSize {
                expected: n * bands,
                actual: raw.len(),
            });
        }
        let mut series = vec![0.0; n * bands];
        for b in 0..bands {
            for v in 0..n {
                series[v * bands + b] = raw[b * n + v];
            }
        }
        Ok(Self::normalized(grid, bands, series))
    }

    /// Build from one raw series per voxel. All series must share a length.
    pub fn from_voxel_series(grid: VoxelGrid, voxel_series: &[Vec<f32>]) -> Result<Self> {
        grid.check_len(voxel_series.len())?;
        let bands = voxel_series.first().map_or(0, |s| s.len());
        check_bands(bands)?;
        let mut series = Vec::with_capacity(voxel_series.len() * bands);
        for s in voxel_series {
            if s.len() != bands {
                return Err(FiberNavError::InvalidInputSize {
                    expected: bands,
                    actual: s.len(),
                });
            }
            series.extend_from_slice(s);
        }
        Ok(Self::normalized(grid, bands, series))
    }

    fn normalized(grid: VoxelGrid, bands: usize, mut series: Vec<f32>) -> Self {
        let mut stats = Vec::with_capacity(grid.num_voxels());
        for s in series.chunks_exact_mut(bands) {
            let (min, max) = s
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            let range = max - min;
            if range > 0.0 {
                for v in s.iter_mut() {
                    *v = (*v - min) / range;
                }
            } else {
                s.fill(0.0);
            }
            stats.push(mean_and_sigma(s));
        }
        Self {
            grid,
            bands,
            series,
            stats,
        }
    }

    #[inline]
    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    #[inline]
    pub fn bands(&self) -> usize {
        self.bands
    }

    #[inline]
    pub fn num_voxels(&self) -> usize {
        self.stats.len()
    }

    /// Normalized time course of voxel `v`.
    #[inline]
    pub fn series(&self, v: usize) -> &[f32] {
        &self.series[v * self.bands..(v + 1) * self.bands]
    }

    #[inline]
    pub fn mean(&self, v: usize) -> f32 {
        self.stats[v].0
    }

    #[inline]
    pub fn sigma(&self, v: usize) -> f32 {
        self.stats[v].1
    }

    /// A voxel participates in correlation when its signal varies.
    #[inline]
    pub fn participates(&self, v: usize) -> bool {
        self.stats[v].1 > 0.0
    }

    /// Mean normalized series over `voxels`. Indices are assumed valid.
    pub fn mean_series(&self, voxels: &[usize]) -> Vec<f32> {
        let mut mean = vec![0.0f32; self.bands];
        if voxels.is_empty() {
            return mean;
        }
        for &v in voxels {
            for (m, s) in mean.iter_mut().zip(self.series(v)) {
                *m += s;
            }
        }
        let n = voxels.len() as f32;
        for m in mean.iter_mut() {
            *m /= n;
        }
        mean
    }

    /// One normalized time point across the whole grid.
    pub fn band_volume(&self, band: usize) -> Result<ScalarVolume> {
        if band >= self.bands {
            return Err(FiberNavError::IndexOutOfBounds {
                index: band,
                length: self.bands,
            });
        }
        let data = (0..self.num_voxels())
            .map(|v| self.series[v * self.bands + band])
            .collect();
        ScalarVolume::new(self.grid, data)
    }
}

fn check_bands(bands: usize) -> Result<()> {
    if bands < 2 {
        return Err(FiberNavError::InvalidParameter(format!(
            "a time series needs at least 2 bands, got {}",
            bands
        )));
    }
    Ok(())
}
