//! Tensor-deflection integration over a [`TensorField`].
//!
//! Each step deflects the incoming direction through the local tensor and
//! mixes it with the principal axis, weighted by fractional anisotropy:
//!
//! ```text
//! v_out = normalize(Σ_k (v_in · e_k) λ_k e_k)
//! next  = normalize(FA * e1 + (1 - FA) * ((1 - p) * v_in + p * v_out))
//! ```
//!
//! where `p` is the puncture weight. A walk stops when FA drops below the
//! threshold, the turn exceeds the angle threshold, the filter vetoes the
//! voxel, the walk leaves the grid or it exceeds the maximum length.

use super::{Direction, HalfWalk, Integrator, RegionFilter, SeedContext};
use crate::config::TrackingConfig;
use crate::field::{principal_axes, TensorField};
use crate::geometry::{Mat3, Vec3};

pub struct TensorIntegrator<'a> {
    field: &'a TensorField,
    config: &'a TrackingConfig,
}

impl<'a> TensorIntegrator<'a> {
    pub fn new(field: &'a TensorField, config: &'a TrackingConfig) -> Self {
        Self { field, config }
    }

    fn tensor_at(&self, voxel: usize, pos: Vec3) -> Mat3 {
        if self.config.interpolate_tensors {
            self.field.interpolate(pos)
        } else {
            *self.field.tensor(voxel)
        }
    }

    /// Unit principal direction of a tensor, axis flips applied.
    pub fn principal_direction(&self, tensor: &Mat3) -> Vec3 {
        let axes = principal_axes(tensor);
        tensor
            .mul_vec(axes.axes[0])
            .scale(self.field.flip())
            .normalized()
    }

    /// One advection step from `v_in` through `tensor` at `voxel`.
    pub fn advect(&self, v_in: Vec3, tensor: &Mat3, voxel: usize) -> Vec3 {
        let axes = principal_axes(tensor);
        let flip = self.field.flip();
        let e = axes
            .axes
            .map(|axis| tensor.mul_vec(axis).scale(flip).normalized());
        let lambda = self.field.eigenvalues(voxel, &axes);

        let v_in = v_in.normalized();
        let e1 = e[0].aligned_with(v_in);
        let v_out = (v_in.dot(e1) * lambda[0] * e1
            + v_in.dot(e[1]) * lambda[1] * e[1]
            + v_in.dot(e[2]) * lambda[2] * e[2])
            .normalized();

        let fa = self.field.fa(voxel);
        let p = self.config.puncture;
        (fa * e1 + (1.0 - fa) * ((1.0 - p) * v_in + p * v_out))
            .normalized()
            .aligned_with(v_in)
    }
}

/// Turn between two unit directions, folded into [0, 90] since tensors are sign-free.
#[inline]
fn folded_angle(a: Vec3, b: Vec3) -> f32 {
    let angle = a.angle_deg(b);
    angle.min(180.0 - angle)
}

impl Integrator for TensorIntegrator<'_> {
    fn name(&self) -> &'static str {
        "tensor"
    }

    fn track(
        &self,
        seed: Vec3,
        direction: Direction,
        filter: &RegionFilter<'_>,
        ctx: &mut SeedContext<'_>,
    ) -> HalfWalk {
        let grid = self.field.grid();
        let step = self.config.step;
        let mut state = filter.start(ctx.seed_box);
        let mut walk = HalfWalk::new(state);

        let Some(voxel) = grid.voxel_of(seed) else {
            return walk;
        };
        let (candidate, verdict) = filter.evaluate(state, voxel, seed);
        if !verdict.proceed {
            walk.state = state.reject(candidate);
            return walk;
        }
        state = candidate;
        walk.state = state;

        let tensor = self.tensor_at(voxel, seed);
        let mut curr_dir = self.principal_direction(&tensor) * direction.sign();
        if curr_dir.is_degenerate() {
            return walk;
        }

        let mut curr = seed;
        let mut next = curr + curr_dir * step;
        let mut iterations = 1u32;
        loop {
            let Some(v) = grid.voxel_of(next) else { break };
            if step * iterations as f32 > self.config.max_fiber_length {
                break;
            }
            let (candidate, verdict) = filter.evaluate(state, v, next);

            let tensor = self.tensor_at(v, next);
            let next_dir = self.advect(curr_dir, &tensor, v);
            if next_dir.is_degenerate()
                || !verdict.proceed
                || self.field.fa(v) < self.config.fa_threshold
                || folded_angle(curr_dir, next_dir) > self.config.angle_threshold
            {
                state = state.reject(candidate);
                break;
            }
            state = candidate;

            walk.push(curr, curr_dir, self.config.alpha);
            curr = next;
            curr_dir = next_dir;
            next = curr + curr_dir * step;
            iterations += 1;
        }
        walk.state = state;
        walk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::VoxelGrid;
    use crate::region::RegionTree;
    use crate::tracking::TrackingMaps;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn field(tensor: Mat3, fa: f32) -> TensorField {
        let grid = VoxelGrid::unit(10, 10, 10).unwrap();
        let n = grid.num_voxels();
        TensorField::new(grid, vec![tensor; n], vec![fa; n]).unwrap()
    }

    #[test]
    fn test_advect_follows_principal_axis() {
        let f = field(Mat3::diagonal(1.0, 0.1, 0.1), 0.8);
        let config = TrackingConfig::default();
        let integrator = TensorIntegrator::new(&f, &config);
        let out = integrator.advect(Vec3::X, f.tensor(0), 0);
        assert_relative_eq!(out.x, 1.0, epsilon = 1e-5);
        // Incoming direction is respected in sign
        let back = integrator.advect(-Vec3::X, f.tensor(0), 0);
        assert_relative_eq!(back.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_principal_direction_with_flip() {
        let f = field(Mat3::diagonal(0.1, 1.0, 0.1), 0.8).with_axis_flip([false, true, false]);
        let config = TrackingConfig::default();
        let integrator = TensorIntegrator::new(&f, &config);
        let d = integrator.principal_direction(f.tensor(0));
        assert_relative_eq!(d.y, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_straight_walk_counts() {
        let f = field(Mat3::diagonal(1.0, 0.1, 0.1), 0.8);
        let config = TrackingConfig::default();
        let integrator = TensorIntegrator::new(&f, &config);
        let tree = RegionTree::new();
        let filter = RegionFilter::new(f.grid(), &tree, TrackingMaps::default(), &config);
        let mut rng = StdRng::seed_from_u64(0);
        let mut ctx = SeedContext::new(None, &mut rng);

        let seed = Vec3::new(5.5, 5.5, 5.5);
        let fwd = integrator.track(seed, Direction::Forward, &filter, &mut ctx);
        let bwd = integrator.track(seed, Direction::Backward, &filter, &mut ctx);
        assert_eq!(fwd.len(), 4);
        assert_eq!(bwd.len(), 5);
        assert_eq!(fwd.points[0], seed);
        assert_relative_eq!(fwd.points[3].x, 8.5);
        assert_relative_eq!(bwd.points[4].x, 1.5);
        // The backward walk re-derives its direction from the tensor
        assert!(ctx.initial_direction.is_none());
    }

    #[test]
    fn test_low_fa_stops_immediately() {
        let f = field(Mat3::diagonal(1.0, 1.0, 1.0), 0.05);
        let config = TrackingConfig::default();
        let integrator = TensorIntegrator::new(&f, &config);
        let tree = RegionTree::new();
        let filter = RegionFilter::new(f.grid(), &tree, TrackingMaps::default(), &config);
        let mut rng = StdRng::seed_from_u64(0);
        let mut ctx = SeedContext::new(None, &mut rng);
        let walk = integrator.track(Vec3::new(5.5, 5.5, 5.5), Direction::Forward, &filter, &mut ctx);
        assert!(walk.is_empty());
    }
}
