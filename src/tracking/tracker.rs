//! Tracker - runs a full seeding pass.
//!
//! For every seed the forward and backward half-walks are integrated, their
//! combined length is checked against the `(min, max)` window, and the pair
//! is kept when either half passes render/AND acceptance:
//!
//! ```text
//! keep = length_ok && (forward.render && forward.and || backward.render && backward.and)
//! ```
//!
//! Seeds are processed sequentially in generation order, so a pass is fully
//! reproducible for a given configuration seed.

use super::hardi::HardiIntegrator;
use super::seeding::{SeedGenerator, SeedSource};
use super::tensor::TensorIntegrator;
use super::{Direction, Integrator, RegionFilter, SeedContext, TrackingMaps};
use crate::config::TrackingConfig;
use crate::field::DirectionField;
use crate::grid::VoxelGrid;
use crate::region::RegionTree;
use crate::report::PassReport;
use crate::store::StreamlineStore;
use crate::{FiberNavError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Offset mixed into the configuration seed for the stick-drafting stream,
/// so it never replays the seed generator's stream.
const DRAFT_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;

/// Owns nothing; borrows the inputs of a pass.
pub struct Tracker<'a> {
    grid: &'a VoxelGrid,
    regions: &'a RegionTree,
    config: &'a TrackingConfig,
    field: Option<&'a DirectionField>,
    maps: TrackingMaps<'a>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Tracker<'a> {
    pub fn new(grid: &'a VoxelGrid, regions: &'a RegionTree, config: &'a TrackingConfig) -> Self {
        Self {
            grid,
            regions,
            config,
            field: None,
            maps: TrackingMaps::default(),
            cancel: None,
        }
    }

    pub fn with_field(mut self, field: &'a DirectionField) -> Self {
        self.field = Some(field);
        self
    }

    pub fn with_maps(mut self, maps: TrackingMaps<'a>) -> Self {
        self.maps = maps;
        self
    }

    /// Stop between seeds once `flag` is set; the store keeps what was accepted so far.
    pub fn with_cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn check_inputs(&self) -> Result<&'a DirectionField> {
        let field = self.field.ok_or(FiberNavError::MissingField)?;
        self.config.validate()?;
        if field.grid().num_voxels() != self.grid.num_voxels() {
            return Err(FiberNavError::InvalidInputSize {
                expected: self.grid.num_voxels(),
                actual: field.grid().num_voxels(),
            });
        }
        for (name, map) in self.maps.present() {
            if map.data().len() != self.grid.num_voxels() {
                warn!(target: "fibernav::tracking", "{} map does not match the grid", name);
                return Err(FiberNavError::InvalidInputSize {
                    expected: self.grid.num_voxels(),
                    actual: map.data().len(),
                });
            }
        }
        Ok(field)
    }

    /// Run one pass over `source`, replacing the contents of `store`.
    pub fn run(&self, source: &SeedSource<'_>, store: &mut StreamlineStore) -> Result<PassReport> {
        let field = self.check_inputs()?;
        store.clear();
        let filter = RegionFilter::new(self.grid, self.regions, self.maps, self.config);
        match field {
            DirectionField::Tensor(f) => {
                self.run_with(&TensorIntegrator::new(f, self.config), &filter, source, store)
            }
            DirectionField::Maxima(f) => self.run_with(
                &HardiIntegrator::new(f, self.regions, self.config),
                &filter,
                source,
                store,
            ),
        }
    }

    fn run_with<I: Integrator>(
        &self,
        integrator: &I,
        filter: &RegionFilter<'_>,
        source: &SeedSource<'_>,
        store: &mut StreamlineStore,
    ) -> Result<PassReport> {
        let mut generator = SeedGenerator::new(self.grid, self.regions, self.config)?;
        let seeds = generator.generate(source);
        let mut report = PassReport::new(integrator.name(), source.name(), seeds.len());
        info!(
            target: "fibernav::tracking",
            "Starting {} pass: {} seeds from {}",
            integrator.name(),
            seeds.len(),
            source.name()
        );

        let mut rng = StdRng::seed_from_u64(self.config.seed ^ DRAFT_STREAM);
        for seed in &seeds {
            if self.cancel.map_or(false, |c| c.load(Ordering::Relaxed)) {
                report.cancelled = true;
                info!(
                    target: "fibernav::tracking",
                    "Pass cancelled after {} of {} seeds",
                    report.processed,
                    seeds.len()
                );
                break;
            }
            report.processed += 1;

            let mut ctx = SeedContext::new(seed.seed_box, &mut rng);
            let forward = integrator.track(seed.position, Direction::Forward, filter, &mut ctx);
            let backward = integrator.track(seed.position, Direction::Backward, filter, &mut ctx);

            if !self.config.accepts_length(forward.len() + backward.len()) {
                report.rejected_length += 1;
                continue;
            }
            if !(forward.state.accepted() || backward.state.accepted()) {
                report.rejected_filter += 1;
                continue;
            }
            store.push_pair(&forward, &backward);
            report.accepted += 1;
        }

        report.lines = store.num_lines();
        report.points = store.total_points();
        debug!(
            target: "fibernav::tracking",
            "Rejected {} by length, {} by region filter",
            report.rejected_length,
            report.rejected_filter
        );
        info!(
            target: "fibernav::tracking",
            "Pass complete: {} streamlines, {} lines, {} points",
            report.accepted,
            report.lines,
            report.points
        );
        Ok(report)
    }
}
