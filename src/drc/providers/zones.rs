//! Copper zone provider
//!
//! Zones of different nets sharing a copper layer must neither overlap nor
//! come closer than their clearance. Zones whose net has no pads are flagged.

use super::{constraint_message, report_all, ProgressCounter, TestProvider, EPSILON};
use crate::board::{build_index, candidate_pairs, Board, BoardItem, ItemGeometry, ItemKind};
use crate::drc::compiler::RuleSet;
use crate::drc::distance::polygon_distance;
use crate::drc::engine::{DrcEngine, RunOptions};
use crate::drc::types::{ConstraintType, DrcItem, ErrorCode};
use rayon::prelude::*;
use std::collections::HashSet;

pub struct ZoneProvider;

fn is_copper_zone(item: &BoardItem) -> bool {
    item.kind() == ItemKind::Zone && item.is_copper()
}

impl TestProvider for ZoneProvider {
    fn name(&self) -> &'static str {
        "zones"
    }

    fn constraint_types(&self) -> &'static [ConstraintType] {
        &[ConstraintType::Clearance]
    }

    fn is_enabled(&self, engine: &DrcEngine, board: &Board, options: &RunOptions) -> bool {
        options.test_tracks_against_zones
            && board.items.iter().any(is_copper_zone)
            && engine.has_rules_for_constraint_type(ConstraintType::Clearance)
    }

    fn run(&self, engine: &DrcEngine, board: &Board, _options: &RunOptions) -> bool {
        let rules = engine.rule_set();
        let margin = rules
            .worst_constraint(ConstraintType::Clearance)
            .map(|c| c.min_or_zero())
            .unwrap_or(0.0);

        let items = &board.items;
        let index = build_index(items, is_copper_zone);
        let pairs = candidate_pairs(items, &index, margin);

        let counter = ProgressCounter::new(engine, pairs.len());
        let mut violations: Vec<DrcItem> = pairs
            .par_iter()
            .filter_map(|&(i, j)| {
                if !counter.tick() {
                    return None;
                }
                check_zone_pair(&rules, &items[i], &items[j])
            })
            .collect();

        let pad_nets: HashSet<&str> = items
            .iter()
            .filter(|i| i.kind() == ItemKind::Pad)
            .filter_map(|i| i.net.as_deref())
            .collect();
        violations.extend(
            items
                .iter()
                .filter(|z| is_copper_zone(z))
                .filter_map(|z| {
                    let net = z.net.as_deref().filter(|n| !n.is_empty())?;
                    if pad_nets.contains(net) {
                        return None;
                    }
                    Some(
                        DrcItem::new(ErrorCode::ZoneHasEmptyNet, vec![z.id], z.position())
                            .on_layer(z.layer())
                            .with_message(format!("(net {})", net)),
                    )
                }),
        );

        report_all(engine, violations)
    }
}

fn check_zone_pair(rules: &RuleSet, a: &BoardItem, b: &BoardItem) -> Option<DrcItem> {
    if a.same_net(b) {
        return None;
    }
    let shared = a.layers.copper().intersection(&b.layers.copper());
    let layer = shared.first()?;
    let (ItemGeometry::Zone { outline: pa, .. }, ItemGeometry::Zone { outline: pb, .. }) =
        (&a.geometry, &b.geometry)
    else {
        return None;
    };
    if pa.len() < 3 || pb.len() < 3 {
        return None;
    }

    let (actual, position) = polygon_distance(pa, pb);
    if actual <= 0.0 {
        return Some(
            DrcItem::new(ErrorCode::ZonesIntersect, vec![a.id, b.id], position).on_layer(Some(layer)),
        );
    }

    let constraint = rules.resolve(ConstraintType::Clearance, a, Some(b), Some(layer), None);
    let required = constraint.min_or_zero();
    if actual < required - EPSILON {
        return Some(
            DrcItem::new(ErrorCode::Clearance, vec![a.id, b.id], position)
                .on_layer(Some(layer))
                .with_message(constraint_message(&constraint, "clearance", required, actual))
                .with_rule(&constraint),
        );
    }
    None
}
