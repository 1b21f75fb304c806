//! Copper clearance provider
//!
//! Pairs of copper items on different nets sharing a copper layer are
//! checked against the `clearance` constraint; copper against the drilled
//! holes of other items against `hole_clearance`.

use super::{constraint_message, report_all, ProgressCounter, TestProvider, EPSILON};
use crate::board::{build_index, candidate_pairs, Board, BoardItem, ItemKind};
use crate::drc::compiler::RuleSet;
use crate::drc::engine::{DrcEngine, RunOptions};
use crate::drc::geometry::{copper_shape, hole_shape, shape_distance};
use crate::drc::types::{ConstraintType, DrcItem, ErrorCode};
use rayon::prelude::*;
use tracing::debug;

pub struct CopperClearanceProvider;

impl TestProvider for CopperClearanceProvider {
    fn name(&self) -> &'static str {
        "copper clearance"
    }

    fn constraint_types(&self) -> &'static [ConstraintType] {
        &[ConstraintType::Clearance, ConstraintType::HoleClearance]
    }

    fn run(&self, engine: &DrcEngine, board: &Board, options: &RunOptions) -> bool {
        let rules = engine.rule_set();
        let worst = [ConstraintType::Clearance, ConstraintType::HoleClearance]
            .iter()
            .filter_map(|kind| rules.worst_constraint(*kind))
            .map(|c| c.min_or_zero())
            .fold(0.0_f64, f64::max);

        let items = &board.items;
        let index = build_index(items, |i| i.is_copper() || i.hole().is_some());
        let pairs = candidate_pairs(items, &index, worst);
        debug!("[DRC] Clearance: {} candidate pairs within {:.4}mm", pairs.len(), worst);

        let counter = ProgressCounter::new(engine, pairs.len());
        let violations: Vec<DrcItem> = pairs
            .par_iter()
            .flat_map(|&(i, j)| {
                if !counter.tick() {
                    return Vec::new();
                }
                let (a, b) = (&items[i], &items[j]);
                if !should_check_pair(a, b, options) {
                    return Vec::new();
                }
                let mut found = Vec::new();
                check_copper_pair(&rules, a, b, options, &mut found);
                check_hole_clearance(&rules, a, b, &mut found);
                check_hole_clearance(&rules, b, a, &mut found);
                found
            })
            .collect();

        report_all(engine, violations)
    }
}

/// Same-net pairs never violate; zone pairs belong to the zone provider
fn should_check_pair(a: &BoardItem, b: &BoardItem, options: &RunOptions) -> bool {
    if a.same_net(b) {
        return false;
    }
    match (a.kind(), b.kind()) {
        (ItemKind::Zone, ItemKind::Zone) => false,
        (ItemKind::Zone, _) | (_, ItemKind::Zone) => options.test_tracks_against_zones,
        _ => true,
    }
}

fn check_copper_pair(
    rules: &RuleSet,
    a: &BoardItem,
    b: &BoardItem,
    options: &RunOptions,
    out: &mut Vec<DrcItem>,
) {
    if !a.is_copper() || !b.is_copper() {
        return;
    }
    let shared = a.layers.copper().intersection(&b.layers.copper());
    if shared.is_empty() {
        return;
    }
    let (Some(shape_a), Some(shape_b)) = (copper_shape(a), copper_shape(b)) else {
        return;
    };
    let (actual, position) = shape_distance(&shape_a, &shape_b);

    for layer in shared.iter() {
        let constraint = rules.resolve(ConstraintType::Clearance, a, Some(b), Some(layer), None);
        let required = constraint.min_or_zero();
        if actual < required - EPSILON {
            out.push(
                DrcItem::new(ErrorCode::Clearance, vec![a.id, b.id], position)
                    .on_layer(Some(layer))
                    .with_message(constraint_message(&constraint, "clearance", required, actual))
                    .with_rule(&constraint),
            );
            // One marker per pair unless every layer is wanted
            if !options.report_all_track_errors {
                break;
            }
        }
    }
}

/// Copper of `copper` against the drilled hole of `drilled`
fn check_hole_clearance(
    rules: &RuleSet,
    copper: &BoardItem,
    drilled: &BoardItem,
    out: &mut Vec<DrcItem>,
) {
    if !copper.is_copper() || copper.kind() == ItemKind::Zone {
        return;
    }
    let Some(hole) = hole_shape(drilled) else {
        return;
    };
    let Some(shape) = copper_shape(copper) else {
        return;
    };
    let (actual, position) = shape_distance(&shape, &hole);
    let constraint =
        rules.resolve(ConstraintType::HoleClearance, copper, Some(drilled), copper.layer(), None);
    let required = constraint.min_or_zero();
    if actual < required - EPSILON {
        out.push(
            DrcItem::new(ErrorCode::HoleClearance, vec![copper.id, drilled.id], position)
                .on_layer(copper.layer())
                .with_message(constraint_message(&constraint, "hole clearance", required, actual))
                .with_rule(&constraint),
        );
    }
}
