//! Via diameter and annular ring provider

use super::{check_range, constraint_message, report_all, ProgressCounter, TestProvider, EPSILON};
use crate::board::{Board, BoardItem, ItemGeometry, ViaType};
use crate::drc::compiler::RuleSet;
use crate::drc::engine::{DrcEngine, RunOptions};
use crate::drc::types::{format_mm, ConstraintType, DrcItem, ErrorCode};
use rayon::prelude::*;

pub struct ViaProvider;

impl TestProvider for ViaProvider {
    fn name(&self) -> &'static str {
        "via sizes"
    }

    fn constraint_types(&self) -> &'static [ConstraintType] {
        &[ConstraintType::ViaDiameter, ConstraintType::AnnularWidth]
    }

    fn run(&self, engine: &DrcEngine, board: &Board, _options: &RunOptions) -> bool {
        let rules = engine.rule_set();
        let counter = ProgressCounter::new(engine, board.items.len());
        let violations: Vec<DrcItem> = board
            .items
            .par_iter()
            .flat_map_iter(|item| {
                if !counter.tick() {
                    return Vec::new();
                }
                check_via(&rules, item)
            })
            .collect();

        report_all(engine, violations)
    }
}

fn check_via(rules: &RuleSet, item: &BoardItem) -> Vec<DrcItem> {
    let ItemGeometry::Via { at, diameter, drill, via_type } = item.geometry else {
        return Vec::new();
    };
    let mut found = Vec::new();
    let layer = item.layer();

    if drill >= diameter - EPSILON {
        found.push(
            DrcItem::new(ErrorCode::ViaHoleBigger, vec![item.id], at)
                .on_layer(layer)
                .with_message(format!(
                    "(diameter {}; drill {})",
                    format_mm(diameter),
                    format_mm(drill)
                )),
        );
        // Annular ring is meaningless without copper around the hole
        return found;
    }

    let constraint = rules.resolve(ConstraintType::ViaDiameter, item, None, layer, None);
    if let Some((label, limit)) = check_range(&constraint, diameter) {
        let code = if via_type == ViaType::Micro {
            ErrorCode::TooSmallMicrovia
        } else {
            ErrorCode::TooSmallVia
        };
        found.push(
            DrcItem::new(code, vec![item.id], at)
                .on_layer(layer)
                .with_message(constraint_message(
                    &constraint,
                    &format!("{} diameter", label),
                    limit,
                    diameter,
                ))
                .with_rule(&constraint),
        );
    }

    let annulus = (diameter - drill) / 2.0;
    let constraint = rules.resolve(ConstraintType::AnnularWidth, item, None, layer, None);
    if let Some((label, limit)) = check_range(&constraint, annulus) {
        found.push(
            DrcItem::new(ErrorCode::ViaAnnulus, vec![item.id], at)
                .on_layer(layer)
                .with_message(constraint_message(
                    &constraint,
                    &format!("{} annular width", label),
                    limit,
                    annulus,
                ))
                .with_rule(&constraint),
        );
    }

    found
}
