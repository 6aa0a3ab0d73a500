//! DirectionField - per-voxel diffusion descriptions consumed by the integrators.
//!
//! Two variants exist and exactly one is active for a tracking pass:
//!
//! - [`TensorField`]: one 3x3 diffusion tensor per voxel plus fractional
//!   anisotropy (and optionally eigenvalues). Tracked with the tensor strategy.
//! - [`MaximaField`]: up to three fiber directions ("sticks") per voxel, as
//!   produced by HARDI peak extraction. Tracked with the HARDI strategy.
//!
//! Both carry per-axis flip flags that correct for datasets stored in a
//! mirrored orientation.

use crate::geometry::{Mat3, Vec3};
use crate::grid::VoxelGrid;
use crate::{FiberNavError, Result};

/// Number of direction slots per voxel in a maxima field.
pub const MAX_STICKS: usize = 3;

/// Convert flip flags into a per-axis sign vector.
#[inline]
pub fn flip_signs(flip: [bool; 3]) -> Vec3 {
    Vec3::new(
        if flip[0] { -1.0 } else { 1.0 },
        if flip[1] { -1.0 } else { 1.0 },
        if flip[2] { -1.0 } else { 1.0 },
    )
}

/// Axis-aligned local frame of a tensor, ranked by column magnitude.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PrincipalAxes {
    /// Unit axis vectors e1, e2, e3
    pub axes: [Vec3; 3],
    /// Axis indices (0 = x, 1 = y, 2 = z) in rank order
    pub order: [usize; 3],
    /// Column magnitudes `lv` in rank order
    pub magnitudes: [f32; 3],
}

/// Rank the coordinate axes of a tensor by the squared norm of the matching column.
///
/// Ordering is strictly by magnitude; equal magnitudes keep the axis priority
/// x > y > z, so the assignment is total and `lv(e1) >= lv(e2) >= lv(e3)`.
pub fn principal_axes(tensor: &Mat3) -> PrincipalAxes {
    let lv = [
        tensor.column_norm_sq(0),
        tensor.column_norm_sq(1),
        tensor.column_norm_sq(2),
    ];
    let mut order = [0usize, 1, 2];
    // Stable sort keeps x before y before z on ties. NaN sorts last.
    order.sort_by(|&a, &b| {
        lv[b]
            .partial_cmp(&lv[a])
            .unwrap_or_else(|| lv[a].is_nan().cmp(&lv[b].is_nan()))
    });

    let unit = [Vec3::X, Vec3::Y, Vec3::Z];
    PrincipalAxes {
        axes: [unit[order[0]], unit[order[1]], unit[order[2]]],
        order,
        magnitudes: [lv[order[0]], lv[order[1]], lv[order[2]]],
    }
}

/// Tensor-per-voxel diffusion field.
#[derive(Clone, Debug)]
pub struct TensorField {
    grid: VoxelGrid,
    tensors: Vec<Mat3>,
    fa: Vec<f32>,
    eigenvalues: Option<Vec<[f32; 3]>>,
    axis_flip: [bool; 3],
}

impl TensorField {
    /// Build a tensor field. `tensors` and `fa` must both match the grid.
    pub fn new(grid: VoxelGrid, tensors: Vec<Mat3>, fa: Vec<f32>) -> Result<Self> {
        grid.check_len(tensors.len())?;
        grid.check_len(fa.len())?;
        Ok(Self {
            grid,
            tensors,
            fa,
            eigenvalues: None,
            axis_flip: [false; 3],
        })
    }

    /// Attach per-voxel eigenvalues. Each triple is sorted descending on insert.
    pub fn with_eigenvalues(mut self, mut eigenvalues: Vec<[f32; 3]>) -> Result<Self> {
        self.grid.check_len(eigenvalues.len())?;
        for ev in eigenvalues.iter_mut() {
            ev.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        }
        self.eigenvalues = Some(eigenvalues);
        Ok(self)
    }

    pub fn with_axis_flip(mut self, flip: [bool; 3]) -> Self {
        self.axis_flip = flip;
        self
    }

    #[inline]
    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    #[inline]
    pub fn tensor(&self, index: usize) -> &Mat3 {
        &self.tensors[index]
    }

    #[inline]
    pub fn fa(&self, index: usize) -> f32 {
        self.fa[index]
    }

    #[inline]
    pub fn flip(&self) -> Vec3 {
        flip_signs(self.axis_flip)
    }

    /// Eigenvalues λ1 >= λ2 >= λ3 at a voxel.
    ///
    /// Without supplied eigenvalues the ranked column magnitudes of `tensor`
    /// stand in for them.
    pub fn eigenvalues(&self, index: usize, axes: &PrincipalAxes) -> [f32; 3] {
        match &self.eigenvalues {
            Some(ev) => ev[index],
            None => [
                axes.magnitudes[0].sqrt(),
                axes.magnitudes[1].sqrt(),
                axes.magnitudes[2].sqrt(),
            ],
        }
    }

    /// Trilinear interpolation of the tensor at a world position.
    ///
    /// Samples sit on voxel lower corners; neighbours past the last voxel are
    /// clamped to the border.
    pub fn interpolate(&self, pos: Vec3) -> Mat3 {
        let g = &self.grid;
        let p = g.to_voxel_space(pos);
        let clamp = |v: f32, n: usize| -> usize { (v.floor().max(0.0) as usize).min(n - 1) };

        let x = clamp(p.x, g.columns());
        let y = clamp(p.y, g.rows());
        let z = clamp(p.z, g.frames());

        let dx = p.x - x as f32;
        let dy = p.y - y as f32;
        let dz = p.z - z as f32;

        let nx = if dx > 0.0 { (x + 1).min(g.columns() - 1) } else { x };
        let ny = if dy > 0.0 { (y + 1).min(g.rows() - 1) } else { y };
        let nz = if dz > 0.0 { (z + 1).min(g.frames() - 1) } else { z };

        let t = |x: usize, y: usize, z: usize| self.tensors[g.index(x, y, z)];

        let x0 = (1.0 - dx) * t(x, y, z) + dx * t(nx, y, z);
        let x1 = (1.0 - dx) * t(x, ny, z) + dx * t(nx, ny, z);
        let y0 = (1.0 - dy) * x0 + dy * x1;

        let x0 = (1.0 - dx) * t(x, y, nz) + dx * t(nx, y, nz);
        let x1 = (1.0 - dx) * t(x, ny, nz) + dx * t(nx, ny, nz);
        let y1 = (1.0 - dy) * x0 + dy * x1;

        (1.0 - dz) * y0 + dz * y1
    }
}

/// Up-to-three fiber directions per voxel.
///
/// Unused slots are zero vectors. Stick length encodes peak amplitude.
#[derive(Clone, Debug)]
pub struct MaximaField {
    grid: VoxelGrid,
    sticks: Vec<[Vec3; MAX_STICKS]>,
    axis_flip: [bool; 3],
}

impl MaximaField {
    pub fn new(grid: VoxelGrid, sticks: Vec<[Vec3; MAX_STICKS]>) -> Result<Self> {
        grid.check_len(sticks.len())?;
        Ok(Self {
            grid,
            sticks,
            axis_flip: [false; 3],
        })
    }

    /// Build from a flat buffer holding nine floats per voxel (three sticks of xyz).
    pub fn from_flat(grid: VoxelGrid, data: &[f32]) -> Result<Self> {
        let expected = grid.num_voxels() * MAX_STICKS * 3;
        if data.len() != expected {
            return Err(FiberNavError::InvalidInputSize {
                expected,
                actual: data.len(),
            });
        }
        let sticks = data
            .chunks_exact(MAX_STICKS * 3)
            .map(|c| {
                [
                    Vec3::new(c[0], c[1], c[2]),
                    Vec3::new(c[3], c[4], c[5]),
                    Vec3::new(c[6], c[7], c[8]),
                ]
            })
            .collect();
        Self::new(grid, sticks)
    }

    pub fn with_axis_flip(mut self, flip: [bool; 3]) -> Self {
        self.axis_flip = flip;
        self
    }

    #[inline]
    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sticks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sticks.is_empty()
    }

    #[inline]
    pub fn flip(&self) -> Vec3 {
        flip_signs(self.axis_flip)
    }

    /// Raw sticks at a voxel, without orientation correction.
    #[inline]
    pub fn raw_sticks(&self, index: usize) -> &[Vec3; MAX_STICKS] {
        &self.sticks[index]
    }

    /// Sticks at a voxel with the axis flips applied.
    pub fn sticks(&self, index: usize) -> [Vec3; MAX_STICKS] {
        let f = self.flip();
        let s = &self.sticks[index];
        [s[0].scale(f), s[1].scale(f), s[2].scale(f)]
    }

    /// Summed stick length at a voxel. Zero means no fiber population.
    pub fn peak_magnitude(&self, index: usize) -> f32 {
        self.sticks[index].iter().map(|s| s.length()).sum()
    }
}

/// The diffusion description a tracking pass integrates over.
#[derive(Clone, Debug)]
pub enum DirectionField {
    Tensor(TensorField),
    Maxima(MaximaField),
}

impl DirectionField {
    pub fn grid(&self) -> &VoxelGrid {
        match self {
            DirectionField::Tensor(f) => f.grid(),
            DirectionField::Maxima(f) => f.grid(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DirectionField::Tensor(f) => f.len(),
            DirectionField::Maxima(f) => f.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the integration strategy this field selects.
    pub fn strategy_name(&self) -> &'static str {
        match self {
            DirectionField::Tensor(_) => "tensor",
            DirectionField::Maxima(_) => "hardi",
        }
    }
}

impl From<TensorField> for DirectionField {
    fn from(f: TensorField) -> Self {
        DirectionField::Tensor(f)
    }
}

impl From<MaximaField> for DirectionField {
    fn from(f: MaximaField) -> Self {
        DirectionField::Maxima(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_principal_axes_basic() {
        let axes = principal_axes(&Mat3::diagonal(0.2, 1.0, 0.5));
        assert_eq!(axes.order, [1, 2, 0]);
        assert_eq!(axes.axes[0], Vec3::Y);
    }

    #[test]
    fn test_principal_axes_tie_priority() {
        // x and y tie above z: x wins the tie
        let axes = principal_axes(&Mat3::diagonal(1.0, 1.0, 0.1));
        assert_eq!(axes.order, [0, 1, 2]);
        // All equal: x, y, z
        let axes = principal_axes(&Mat3::diagonal(0.3, 0.3, 0.3));
        assert_eq!(axes.order, [0, 1, 2]);
        // y and z tie above x
        let axes = principal_axes(&Mat3::diagonal(0.1, 0.7, 0.7));
        assert_eq!(axes.order, [1, 2, 0]);
    }

    #[test]
    fn test_interpolation_midpoint() {
        let grid = VoxelGrid::unit(2, 1, 1).unwrap();
        let field = TensorField::new(
            grid,
            vec![Mat3::diagonal(1.0, 0.0, 0.0), Mat3::diagonal(0.0, 1.0, 0.0)],
            vec![1.0, 1.0],
        )
        .unwrap();
        let t = field.interpolate(Vec3::new(0.5, 0.0, 0.0));
        assert_relative_eq!(t.get(0, 0), 0.5);
        assert_relative_eq!(t.get(1, 1), 0.5);
        // On a sample exactly, no blending
        let t = field.interpolate(Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(t.get(1, 1), 1.0);
    }

    #[test]
    fn test_eigenvalues_fallback_and_supplied() {
        let grid = VoxelGrid::unit(1, 1, 1).unwrap();
        let tensor = Mat3::diagonal(0.5, 2.0, 1.0);
        let field = TensorField::new(grid, vec![tensor], vec![0.8]).unwrap();
        let axes = principal_axes(&tensor);
        assert_eq!(field.eigenvalues(0, &axes), [2.0, 1.0, 0.5]);

        let field = field.with_eigenvalues(vec![[0.1, 0.9, 0.4]]).unwrap();
        assert_eq!(field.eigenvalues(0, &axes), [0.9, 0.4, 0.1]);
    }

    #[test]
    fn test_maxima_flat_and_flip() {
        let grid = VoxelGrid::unit(1, 1, 1).unwrap();
        let data = [1.0, 0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 0.0];
        let field = MaximaField::from_flat(grid, &data)
            .unwrap()
            .with_axis_flip([true, false, false]);
        assert_eq!(field.sticks(0)[0], Vec3::new(-1.0, 0.0, 0.0));
        assert_relative_eq!(field.peak_magnitude(0), 1.5);
        assert!(MaximaField::from_flat(grid, &data[..8]).is_err());
    }
}
