//! Keepout provider
//!
//! Items matched by an authored `disallow` constraint are reported as
//! `AllowedItems`; items of a forbidden kind touching a keepout zone on a
//! shared layer are reported as `Keepout`.

use super::{report_all, ProgressCounter, TestProvider};
use crate::board::{build_index, search_envelope, Board, BoardItem, ItemGeometry, ItemKind, Point};
use crate::drc::compiler::RuleSet;
use crate::drc::distance::{point_in_polygon, polygon_distance};
use crate::drc::engine::{DrcEngine, RunOptions};
use crate::drc::geometry::{copper_shape, shape_distance, Shape};
use crate::drc::types::{ConstraintType, DrcItem, ErrorCode};
use rayon::prelude::*;

pub struct KeepoutProvider;

impl TestProvider for KeepoutProvider {
    fn name(&self) -> &'static str {
        "keepouts"
    }

    fn constraint_types(&self) -> &'static [ConstraintType] {
        &[ConstraintType::Keepout]
    }

    fn is_enabled(&self, engine: &DrcEngine, board: &Board, _options: &RunOptions) -> bool {
        engine.has_rules_for_constraint_type(ConstraintType::Keepout)
            || board.items.iter().any(BoardItem::is_keepout)
    }

    fn run(&self, engine: &DrcEngine, board: &Board, _options: &RunOptions) -> bool {
        let rules = engine.rule_set();
        let items = &board.items;
        let counter = ProgressCounter::new(engine, items.len());

        let mut violations: Vec<DrcItem> = if rules.has_rules(ConstraintType::Keepout) {
            items
                .par_iter()
                .filter(|item| !item.is_keepout())
                .filter_map(|item| {
                    if !counter.tick() {
                        return None;
                    }
                    check_disallow(&rules, item)
                })
                .collect()
        } else {
            Vec::new()
        };

        let index = build_index(items, |i| !i.is_keepout());
        let zone_hits: Vec<DrcItem> = items
            .par_iter()
            .filter(|zone| zone.is_keepout())
            .flat_map_iter(|zone| {
                let hits: Vec<DrcItem> = if !counter.tick() {
                    Vec::new()
                } else {
                    index
                        .locate_in_envelope_intersecting(&search_envelope(zone, 0.0))
                        .filter_map(|entry| check_keepout_zone(zone, &items[entry.index]))
                        .collect()
                };
                hits
            })
            .collect();
        violations.extend(zone_hits);

        report_all(engine, violations)
    }
}

fn check_disallow(rules: &RuleSet, item: &BoardItem) -> Option<DrcItem> {
    let constraint = rules.resolve(ConstraintType::Keepout, item, None, item.layer(), None);
    let kind = constraint.disallow.first_match(item)?;
    Some(
        DrcItem::new(ErrorCode::AllowedItems, vec![item.id], item.position())
            .on_layer(item.layer())
            .with_message(format!("({} disallows {})", constraint.source, kind.keyword()))
            .with_rule(&constraint),
    )
}

fn check_keepout_zone(zone: &BoardItem, item: &BoardItem) -> Option<DrcItem> {
    let ItemGeometry::Zone { outline, keepout: Some(flags) } = &zone.geometry else {
        return None;
    };
    let layer = zone.layers.intersection(&item.layers).first().or_else(|| {
        // Footprints live on courtyard layers; test them against any copper keepout
        (item.kind() == ItemKind::Footprint).then(|| zone.layer()).flatten()
    })?;
    let kind = flags.first_match(item)?;
    if outline.len() < 3 || !touches(outline, item) {
        return None;
    }
    Some(
        DrcItem::new(ErrorCode::Keepout, vec![item.id, zone.id], item.position())
            .on_layer(Some(layer))
            .with_message(format!("(keepout zone disallows {})", kind.keyword())),
    )
}

fn touches(outline: &[Point], item: &BoardItem) -> bool {
    if let ItemGeometry::Footprint { at, courtyard } = &item.geometry {
        return if courtyard.len() >= 3 {
            polygon_distance(outline, courtyard).0 <= 0.0
        } else {
            point_in_polygon(*at, outline)
        };
    }
    match copper_shape(item) {
        Some(shape) => shape_distance(&shape, &Shape::Polygon(outline.to_vec())).0 <= 0.0,
        None => false,
    }
}
