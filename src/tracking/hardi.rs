//! HARDI integration over a [`MaximaField`].
//!
//! The walk starts on one of the seed voxel's sticks, either drawn with
//! probability proportional to stick length or picked as the stick closest
//! to a configured initial direction. The backward walk replays the forward
//! walk's first direction, negated. Every later step blends the incoming
//! direction with the best-matching stick:
//!
//! ```text
//! next = normalize((1 - F) * ((1 - g) * v_in + g * v_out) + F * v_magnet)
//! ```
//!
//! with `g = vin_vout` and `F` the magnet weight (zero outside magnets).

use super::magnet::MagneticDeflector;
use super::{closest_stick, Direction, HalfWalk, Integrator, RegionFilter, SeedContext};
use crate::config::TrackingConfig;
use crate::field::MaximaField;
use crate::geometry::Vec3;
use crate::region::RegionTree;
use rand::rngs::StdRng;
use rand::Rng;

pub struct HardiIntegrator<'a> {
    field: &'a MaximaField,
    config: &'a TrackingConfig,
    deflector: MagneticDeflector<'a>,
}

/// Draw a stick with probability proportional to its length.
pub fn weighted_draft(sticks: &[Vec3], rng: &mut StdRng) -> Option<Vec3> {
    let total: f32 = sticks.iter().map(|s| s.length()).sum();
    if !(total > 0.0) {
        return None;
    }
    let mut r = rng.gen::<f32>() * total;
    let mut last = None;
    for s in sticks {
        let len = s.length();
        if len <= 0.0 {
            continue;
        }
        last = Some(*s);
        if r < len {
            return Some(*s);
        }
        r -= len;
    }
    last
}

impl<'a> HardiIntegrator<'a> {
    pub fn new(field: &'a MaximaField, regions: &'a RegionTree, config: &'a TrackingConfig) -> Self {
        Self {
            field,
            config,
            deflector: MagneticDeflector::new(field.grid(), regions, config.magnet_strength),
        }
    }

    /// First direction of a walk at `voxel`, orientation-corrected and normalized.
    fn seed_direction(&self, voxel: usize, rng: &mut StdRng) -> Option<Vec3> {
        let raw = self.field.raw_sticks(voxel);
        let picked = match self.config.init_direction {
            Some(init) => closest_stick(init.normalized(), raw),
            None => weighted_draft(raw, rng),
        }?;
        let dir = picked.scale(self.field.flip()).normalized();
        (!dir.is_degenerate()).then_some(dir)
    }

    /// Direction after stepping into `voxel` at `pos` with incoming `v_in`.
    pub fn next_direction(&self, v_in: Vec3, voxel: usize, pos: Vec3) -> Vec3 {
        let sticks = self.field.sticks(voxel);
        let deflection = self.deflector.deflect(v_in, &sticks, pos);
        deflection
            .blend(v_in, self.config.vin_vout)
            .normalized()
            .aligned_with(v_in)
    }
}

impl Integrator for HardiIntegrator<'_> {
    fn name(&self) -> &'static str {
        "hardi"
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
        if self.field.peak_magnitude(voxel) <= 0.0 {
            return walk;
        }
        let (candidate, verdict) = filter.evaluate(state, voxel, seed);
        if !verdict.proceed {
            walk.state = state.reject(candidate);
            return walk;
        }
        state = candidate;
        walk.state = state;

        let initial = match (direction, ctx.initial_direction) {
            (Direction::Backward, Some(replay)) => Some(replay),
            _ => self.seed_direction(voxel, ctx.rng),
        };
        let Some(initial) = initial else {
            return walk;
        };
        if direction == Direction::Forward {
            ctx.initial_direction = Some(initial);
        }

        let mut curr = seed;
        let mut curr_dir = initial * direction.sign();
        let mut next = curr + curr_dir * step;
        let mut iterations = 1u32;
        loop {
            let Some(v) = grid.voxel_of(next) else { break };
            if self.field.peak_magnitude(v) <= 0.0
                || step * iterations as f32 > self.config.max_fiber_length
            {
                break;
            }
            let (candidate, verdict) = filter.evaluate(state, v, next);

            let next_dir = self.next_direction(curr_dir, v, next);
            if next_dir.is_degenerate()
                || !verdict.proceed
                || curr_dir.angle_deg(next_dir) > self.config.angle_threshold
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
