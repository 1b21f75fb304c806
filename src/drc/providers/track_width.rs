//! Track width provider

use super::{check_range, constraint_message, report_all, ProgressCounter, TestProvider};
use crate::board::{Board, ItemGeometry};
use crate::drc::engine::{DrcEngine, RunOptions};
use crate::drc::types::{ConstraintType, DrcItem, ErrorCode};
use rayon::prelude::*;

pub struct TrackWidthProvider;

impl TestProvider for TrackWidthProvider {
    fn name(&self) -> &'static str {
        "track width"
    }

    fn constraint_types(&self) -> &'static [ConstraintType] {
        &[ConstraintType::TrackWidth]
    }

    fn run(&self, engine: &DrcEngine, board: &Board, _options: &RunOptions) -> bool {
        let rules = engine.rule_set();
        let counter = ProgressCounter::new(engine, board.items.len());
        let violations: Vec<DrcItem> = board
            .items
            .par_iter()
            .filter_map(|item| {
                if !counter.tick() {
                    return None;
                }
                let ItemGeometry::Track { width, .. } = item.geometry else {
                    return None;
                };
                let constraint =
                    rules.resolve(ConstraintType::TrackWidth, item, None, item.layer(), None);
                let (label, limit) = check_range(&constraint, width)?;
                Some(
                    DrcItem::new(ErrorCode::TrackWidth, vec![item.id], item.position())
                        .on_layer(item.layer())
                        .with_message(constraint_message(
                            &constraint,
                            &format!("{} width", label),
                            limit,
                            width,
                        ))
                        .with_rule(&constraint),
                )
            })
            .collect();

        report_all(engine, violations)
    }
}
