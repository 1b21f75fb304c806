//! DRC test providers
//!
//! Each provider checks one family of constraints. Candidate violations are
//! computed in parallel with Rayon, each worker collecting into its own
//! vector, and then reported to the engine sequentially so counts, limits and
//! the host callback see a deterministic order.
//!
//! # Submodules
//! - `clearance` - Copper-to-copper and copper-to-hole clearance
//! - `track_width` - Track width range
//! - `via` - Via diameter and annular ring
//! - `hole_size` - Via and pad drill size
//! - `hole_to_hole` - Spacing between drilled holes
//! - `zones` - Copper zone intersections
//! - `courtyard` - Footprint courtyards
//! - `keepout` - Disallow rules and keepout zones

mod clearance;
mod courtyard;
mod hole_size;
mod hole_to_hole;
mod keepout;
mod track_width;
mod via;
mod zones;

pub use clearance::CopperClearanceProvider;
pub use courtyard::CourtyardProvider;
pub use hole_size::HoleSizeProvider;
pub use hole_to_hole::HoleToHoleProvider;
pub use keepout::KeepoutProvider;
pub use track_width::TrackWidthProvider;
pub use via::ViaProvider;
pub use zones::ZoneProvider;

use super::engine::{DrcEngine, RunOptions};
use super::types::{format_mm, Constraint, ConstraintType, DrcItem};
use crate::board::Board;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Items between two progress reports
pub const PROGRESS_DELTA: usize = 250;

/// Tolerance for comparing measured lengths against constraints
pub(crate) const EPSILON: f64 = 1e-6;

/// A pluggable DRC check
pub trait TestProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Constraint types the provider resolves
    fn constraint_types(&self) -> &'static [ConstraintType];

    /// Whether the provider runs at all; by default when any of its
    /// constraint types has rules
    fn is_enabled(&self, engine: &DrcEngine, _board: &Board, _options: &RunOptions) -> bool {
        self.constraint_types()
            .iter()
            .any(|kind| engine.has_rules_for_constraint_type(*kind))
    }

    /// Run the check; returns false when the run was cancelled
    fn run(&self, engine: &DrcEngine, board: &Board, options: &RunOptions) -> bool;
}

/// Providers in the order they run
pub fn all() -> Vec<Box<dyn TestProvider>> {
    vec![
        Box::new(CopperClearanceProvider),
        Box::new(TrackWidthProvider),
        Box::new(ViaProvider),
        Box::new(HoleSizeProvider),
        Box::new(HoleToHoleProvider),
        Box::new(ZoneProvider),
        Box::new(CourtyardProvider),
        Box::new(KeepoutProvider),
    ]
}

/// Counts items checked by Rayon workers and reports progress every
/// [`PROGRESS_DELTA`] of them
pub(crate) struct ProgressCounter<'a> {
    engine: &'a DrcEngine,
    done: AtomicUsize,
    total: usize,
}

impl<'a> ProgressCounter<'a> {
    pub(crate) fn new(engine: &'a DrcEngine, total: usize) -> Self {
        Self { engine, done: AtomicUsize::new(0), total }
    }

    /// Count one checked item; false once the run is cancelled
    pub(crate) fn tick(&self) -> bool {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        self.engine.report_progress(done, self.total, PROGRESS_DELTA)
    }
}

/// Mark the stage's checking done, then hand collected violations to the
/// engine in order; false once cancelled
pub(crate) fn report_all(engine: &DrcEngine, violations: Vec<DrcItem>) -> bool {
    if !engine.report_progress(1, 1, 1) {
        return false;
    }
    for violation in violations {
        if engine.is_cancelled() {
            return false;
        }
        engine.report_violation(violation);
    }
    !engine.is_cancelled()
}

/// Detail text such as "(clearance-power clearance 0.5000 mm; actual 0.3000 mm)"
pub(crate) fn constraint_message(
    constraint: &Constraint,
    label: &str,
    required: f64,
    actual: f64,
) -> String {
    format!(
        "({} {} {}; actual {})",
        constraint.source,
        label,
        format_mm(required),
        format_mm(actual)
    )
}

/// Min/max range check shared by the single-item providers: returns the
/// violated label and limit
pub(crate) fn check_range(constraint: &Constraint, actual: f64) -> Option<(&'static str, f64)> {
    if let Some(min) = constraint.value.min {
        if actual < min - EPSILON {
            return Some(("min", min));
        }
    }
    if let Some(max) = constraint.value.max {
        if actual > max + EPSILON {
            return Some(("max", max));
        }
    }
    None
}
