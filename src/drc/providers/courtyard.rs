//! Footprint courtyard provider
//!
//! Flags missing and malformed courtyards, courtyards on the same side that
//! overlap or violate `courtyard_clearance`, and drilled holes of one
//! footprint inside the courtyard of another.

use super::{constraint_message, report_all, ProgressCounter, TestProvider, EPSILON};
use crate::board::{Board, BoardItem, ItemGeometry, Layer, Point};
use crate::drc::compiler::RuleSet;
use crate::drc::distance::{point_in_polygon, polygon_distance, polygon_self_intersects};
use crate::drc::engine::{DrcEngine, RunOptions};
use crate::drc::types::{ConstraintType, DrcItem, ErrorCode};
use rayon::prelude::*;

pub struct CourtyardProvider;

/// A footprint with a usable courtyard
struct Courtyard<'a> {
    footprint: &'a BoardItem,
    outline: &'a [Point],
    side: Layer,
}

impl Courtyard<'_> {
    fn reference(&self) -> Option<&str> {
        self.footprint.footprint.as_deref()
    }
}

fn courtyard_side(item: &BoardItem) -> Layer {
    if item.layers.contains(Layer::B_CRTYD) && !item.layers.contains(Layer::F_CRTYD) {
        Layer::B_CRTYD
    } else {
        Layer::F_CRTYD
    }
}

impl TestProvider for CourtyardProvider {
    fn name(&self) -> &'static str {
        "courtyards"
    }

    fn constraint_types(&self) -> &'static [ConstraintType] {
        &[ConstraintType::CourtyardClearance]
    }

    fn is_enabled(&self, _engine: &DrcEngine, board: &Board, options: &RunOptions) -> bool {
        options.test_footprints && board.footprints().next().is_some()
    }

    fn run(&self, engine: &DrcEngine, board: &Board, _options: &RunOptions) -> bool {
        let rules = engine.rule_set();
        let mut violations = Vec::new();
        let mut courtyards = Vec::new();

        for fp in board.footprints() {
            let ItemGeometry::Footprint { at, courtyard } = &fp.geometry else {
                continue;
            };
            if courtyard.is_empty() {
                violations.push(DrcItem::new(ErrorCode::MissingCourtyard, vec![fp.id], *at));
            } else if courtyard.len() < 3 || polygon_self_intersects(courtyard) {
                violations.push(DrcItem::new(ErrorCode::MalformedCourtyard, vec![fp.id], *at));
            } else {
                courtyards.push(Courtyard { footprint: fp, outline: courtyard, side: courtyard_side(fp) });
            }
        }

        let pairs: Vec<(usize, usize)> = (0..courtyards.len())
            .flat_map(|i| ((i + 1)..courtyards.len()).map(move |j| (i, j)))
            .collect();
        let counter = ProgressCounter::new(engine, pairs.len() + courtyards.len());
        violations.extend(
            pairs
                .par_iter()
                .filter_map(|&(i, j)| {
                    if !counter.tick() {
                        return None;
                    }
                    check_overlap(&rules, &courtyards[i], &courtyards[j])
                })
                .collect::<Vec<_>>(),
        );

        violations.extend(
            courtyards
                .par_iter()
                .flat_map_iter(|c| {
                    if !counter.tick() {
                        return Vec::new();
                    }
                    holes_in_courtyard(c, &board.items).collect::<Vec<DrcItem>>()
                })
                .collect::<Vec<_>>(),
        );

        report_all(engine, violations)
    }
}

fn check_overlap(rules: &RuleSet, a: &Courtyard<'_>, b: &Courtyard<'_>) -> Option<DrcItem> {
    if a.side != b.side {
        return None;
    }
    let (actual, position) = polygon_distance(a.outline, b.outline);
    let ids = vec![a.footprint.id, b.footprint.id];
    if actual <= 0.0 {
        return Some(DrcItem::new(ErrorCode::OverlappingFootprints, ids, position).on_layer(Some(a.side)));
    }

    let constraint = rules.resolve(
        ConstraintType::CourtyardClearance,
        a.footprint,
        Some(b.footprint),
        Some(a.side),
        None,
    );
    let required = constraint.min_or_zero();
    if actual < required - EPSILON {
        return Some(
            DrcItem::new(ErrorCode::OverlappingFootprints, ids, position)
                .on_layer(Some(a.side))
                .with_message(constraint_message(&constraint, "courtyard clearance", required, actual))
                .with_rule(&constraint),
        );
    }
    None
}

fn holes_in_courtyard<'a>(
    courtyard: &'a Courtyard<'a>,
    items: &'a [BoardItem],
) -> impl Iterator<Item = DrcItem> + 'a {
    items.iter().filter_map(move |item| {
        let (at, _) = item.hole()?;
        // Holes of the footprint itself belong there
        if item.footprint.is_some() && item.footprint.as_deref() == courtyard.reference() {
            return None;
        }
        if !point_in_polygon(at, courtyard.outline) {
            return None;
        }
        let code = if item.is_plated() {
            ErrorCode::PthInCourtyard
        } else {
            ErrorCode::NpthInCourtyard
        };
        Some(DrcItem::new(code, vec![item.id, courtyard.footprint.id], at).on_layer(Some(courtyard.side)))
    })
}
