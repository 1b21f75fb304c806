//! Drill size provider for vias and drilled pads

use super::{check_range, constraint_message, report_all, ProgressCounter, TestProvider};
use crate::board::{Board, ItemGeometry, ViaType};
use crate::drc::engine::{DrcEngine, RunOptions};
use crate::drc::types::{ConstraintType, DrcItem, ErrorCode};
use rayon::prelude::*;

pub struct HoleSizeProvider;

impl TestProvider for HoleSizeProvider {
    fn name(&self) -> &'static str {
        "hole sizes"
    }

    fn constraint_types(&self) -> &'static [ConstraintType] {
        &[ConstraintType::HoleSize]
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
                let (at, drill) = item.hole()?;
                let code = match item.geometry {
                    ItemGeometry::Via { via_type: ViaType::Micro, .. } => {
                        ErrorCode::TooSmallMicroviaDrill
                    }
                    _ => ErrorCode::TooSmallDrill,
                };
                let constraint =
                    rules.resolve(ConstraintType::HoleSize, item, None, item.layer(), None);
                let (label, limit) = check_range(&constraint, drill)?;
                Some(
                    DrcItem::new(code, vec![item.id], at)
                        .on_layer(item.layer())
                        .with_message(constraint_message(
                            &constraint,
                            &format!("{} hole", label),
                            limit,
                            drill,
                        ))
                        .with_rule(&constraint),
                )
            })
            .collect();

        report_all(engine, violations)
    }
}
