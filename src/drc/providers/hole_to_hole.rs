//! Hole to hole spacing provider

use super::{constraint_message, report_all, ProgressCounter, TestProvider, EPSILON};
use crate::board::{build_index, candidate_pairs, Board};
use crate::drc::engine::{DrcEngine, RunOptions};
use crate::drc::types::{ConstraintType, DrcItem, ErrorCode};
use rayon::prelude::*;

pub struct HoleToHoleProvider;

impl TestProvider for HoleToHoleProvider {
    fn name(&self) -> &'static str {
        "hole to hole"
    }

    fn constraint_types(&self) -> &'static [ConstraintType] {
        &[ConstraintType::HoleToHole]
    }

    fn run(&self, engine: &DrcEngine, board: &Board, _options: &RunOptions) -> bool {
        let rules = engine.rule_set();
        let margin = rules
            .worst_constraint(ConstraintType::HoleToHole)
            .map(|c| c.min_or_zero())
            .unwrap_or(0.0);

        let items = &board.items;
        let index = build_index(items, |i| i.hole().is_some());
        let pairs = candidate_pairs(items, &index, margin);

        let counter = ProgressCounter::new(engine, pairs.len());
        let violations: Vec<DrcItem> = pairs
            .par_iter()
            .filter_map(|&(i, j)| {
                if !counter.tick() {
                    return None;
                }
                let (a, b) = (&items[i], &items[j]);
                let ((pa, da), (pb, db)) = (a.hole()?, b.hole()?);
                let actual = (pa.distance(&pb) - da / 2.0 - db / 2.0).max(0.0);
                // Resolve on a shared copper layer so `L` conditions apply
                let layer = a.layers.copper().intersection(&b.layers.copper()).first();
                let constraint = rules.resolve(ConstraintType::HoleToHole, a, Some(b), layer, None);
                let required = constraint.min_or_zero();
                if actual >= required - EPSILON {
                    return None;
                }
                Some(
                    DrcItem::new(ErrorCode::DrilledHolesTooClose, vec![a.id, b.id], pa.midpoint(&pb))
                        .on_layer(layer)
                        .with_message(constraint_message(
                            &constraint,
                            "hole to hole",
                            required,
                            actual,
                        ))
                        .with_rule(&constraint),
                )
            })
            .collect();

        report_all(engine, violations)
    }
}
