//! RegionFilter - per-step acceptance rules shared by both integrators.
//!
//! Each visited voxel is checked against, in order:
//!
//! 1. the gray-matter run counter (too many consecutive gray-matter steps stop the walk),
//! 2. the direct children of the walk's seed box (render latch, NOT pruning/removal),
//! 3. the exclusion map (hard veto, latched as `stopped`),
//! 4. the inclusion ("AND") map (latches `and_satisfied` on the first entered
//!    voxel that also passes the base threshold and is not excluded),
//! 5. the base threshold on the mask or gray-matter value.
//!
//! All checks combine by AND. Latches live in [`WalkState`], a `Copy` value
//! threaded through `evaluate` and discarded at the end of the half-walk.
//! Integrators commit the returned state only for accepted steps; a step
//! they stop on goes through [`WalkState::reject`] instead.

use crate::config::TrackingConfig;
use crate::geometry::Vec3;
use crate::grid::VoxelGrid;
use crate::region::{RegionId, RegionTree};
use crate::volume::ScalarVolume;

/// Optional anatomical maps consulted while tracking.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrackingMaps<'a> {
    /// Anisotropy / white-matter map for the base threshold
    pub mask: Option<&'a ScalarVolume>,
    /// Any nonzero voxel stops a walk
    pub exclusion: Option<&'a ScalarVolume>,
    /// Walks must touch a nonzero voxel to be kept
    pub inclusion: Option<&'a ScalarVolume>,
    pub gray_matter: Option<&'a ScalarVolume>,
}

impl<'a> TrackingMaps<'a> {
    /// Present maps, paired with a name for error reporting.
    pub fn present(&self) -> impl Iterator<Item = (&'static str, &'a ScalarVolume)> {
        [
            ("mask", self.mask),
            ("exclusion", self.exclusion),
            ("inclusion", self.inclusion),
            ("gray_matter", self.gray_matter),
        ]
        .into_iter()
        .filter_map(|(name, map)| map.map(|m| (name, m)))
    }
}

/// Latches of one forward-or-backward walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WalkState {
    pub seed_box: Option<RegionId>,
    /// Current render decision driven by child regions
    pub render: bool,
    /// The walk has entered at least one active child region
    pub stepped_inside_child: bool,
    /// The walk has touched the inclusion map (or there is none)
    pub and_satisfied: bool,
    /// Consecutive gray-matter voxels visited
    pub gm_run: u32,
    /// An exclusion voxel was hit
    pub stopped: bool,
}

impl WalkState {
    /// Whether a walk ending in this state may be kept.
    #[inline]
    pub fn accepted(&self) -> bool {
        self.render && self.and_satisfied
    }

    /// Latches kept when the walk stops on the voxel that produced `candidate`.
    ///
    /// Nothing is latched from a voxel the walk never occupies, but a
    /// remove-mode NOT region reached there still hides the walk.
    #[inline]
    pub fn reject(self, candidate: WalkState) -> WalkState {
        WalkState {
            render: self.render && candidate.render,
            ..self
        }
    }
}

/// Outcome of evaluating one voxel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub proceed: bool,
    pub render: bool,
}

/// Region and map filtering for one tracking pass.
#[derive(Clone, Copy, Debug)]
pub struct RegionFilter<'a> {
    grid: &'a VoxelGrid,
    regions: &'a RegionTree,
    maps: TrackingMaps<'a>,
    threshold: f32,
    gm_max_steps: u32,
}

impl<'a> RegionFilter<'a> {
    /// Build the filter, dropping maps the configuration disables.
    pub fn new(
        grid: &'a VoxelGrid,
        regions: &'a RegionTree,
        maps: TrackingMaps<'a>,
        config: &TrackingConfig,
    ) -> Self {
        let maps = TrackingMaps {
            mask: maps.mask,
            exclusion: maps.exclusion.filter(|_| config.exclusion_enabled),
            inclusion: maps.inclusion.filter(|_| config.inclusion_enabled),
            gray_matter: maps.gray_matter.filter(|_| config.gray_matter_enabled),
        };
        Self {
            grid,
            regions,
            maps,
            threshold: config.fa_threshold,
            gm_max_steps: config.gm_max_steps,
        }
    }

    /// Fresh latches for a walk started from `seed_box`.
    pub fn start(&self, seed_box: Option<RegionId>) -> WalkState {
        WalkState {
            seed_box,
            render: true,
            stepped_inside_child: false,
            and_satisfied: self.maps.inclusion.is_none(),
            gm_run: 0,
            stopped: false,
        }
    }

    /// Evaluate voxel `voxel` at world position `pos`.
    pub fn evaluate(&self, mut state: WalkState, voxel: usize, pos: Vec3) -> (WalkState, Verdict) {
        let mut gm_value = 0.0;
        if let Some(gm) = self.maps.gray_matter {
            gm_value = gm.at(voxel);
            if gm_value > 0.0 {
                state.gm_run += 1;
            } else {
                state.gm_run = 0;
            }
        }

        let mut inside_not = false;
        if let Some(seed_box) = state.seed_box {
            for (_, child) in self.regions.children(seed_box) {
                if !child.active {
                    state.render = true;
                    continue;
                }
                if !state.stepped_inside_child {
                    state.render = false;
                }
                let inside = child.contains(pos, self.grid);
                if inside && !state.stepped_inside_child {
                    state.stepped_inside_child = true;
                    state.render = true;
                }
                if child.not {
                    inside_not |= inside;
                    if !child.remove {
                        state.render = true;
                    } else if inside && state.stepped_inside_child {
                        state.render = false;
                    }
                }
            }
        }

        let excluded = self
            .maps
            .exclusion
            .map(|m| m.at(voxel) != 0.0)
            .unwrap_or(false);
        if excluded {
            state.stopped = true;
        }

        let above_threshold = match self.maps.mask {
            Some(mask) => mask.at(voxel) > self.threshold || gm_value > self.threshold,
            None => true,
        };

        // The AND map only counts on a voxel the walk may actually occupy
        if above_threshold && !excluded {
            if let Some(inclusion) = self.maps.inclusion {
                if inclusion.at(voxel) != 0.0 {
                    state.and_satisfied = true;
                }
            }
        }

        let proceed = above_threshold
            && !state.stopped
            && state.gm_run <= self.gm_max_steps
            && !inside_not;

        let verdict = Verdict {
            proceed,
            render: state.render,
        };
        (state, verdict)
    }
}
