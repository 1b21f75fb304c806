//! Rule compiler and compiled rule set
//!
//! Compilation parses the rule text, orders authored rules by specificity and
//! appends implicit rules synthesized from the legacy design settings. The
//! result is indexed per constraint type so resolution is a linear scan over
//! the rules that can possibly apply.

use super::condition::{CmpOp, Condition, Expr, ItemRef, Method, Property};
use super::error::ParseError;
use super::reporter::Reporter;
use super::rule::{parse_rules, Rule, RuleId};
use super::settings::{DesignSettings, NetClass};
use super::types::{format_mm, Constraint, ConstraintOrigin, ConstraintType, MinOptMax};
use crate::board::{BoardItem, ItemKind, Layer, LayerSet};
use indexmap::IndexMap;

/// One constraint of one rule, as stored in the per-type index
#[derive(Debug, Clone, PartialEq)]
pub struct RuleEntry {
    pub rule: RuleId,
    pub constraint: Constraint,
    pub layer_mask: LayerSet,
}

/// Compiled, immutable rule set
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    index: IndexMap<ConstraintType, Vec<RuleEntry>>,
    settings: DesignSettings,
    warnings: Vec<String>,
}

impl RuleSet {
    fn push(&mut self, rule: Rule) {
        let id = RuleId(self.rules.len());
        for constraint in &rule.constraints {
            self.index.entry(constraint.kind).or_default().push(RuleEntry {
                rule: id,
                constraint: constraint.clone(),
                layer_mask: rule.layer_mask,
            });
        }
        self.rules.push(rule);
    }

    /// All rules in resolution order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id.0)
    }

    pub fn entries(&self, kind: ConstraintType) -> &[RuleEntry] {
        self.index.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_rules(&self, kind: ConstraintType) -> bool {
        !self.entries(kind).is_empty()
    }

    /// Every constraint of `kind`, in priority order
    pub fn constraints(&self, kind: ConstraintType) -> Vec<Constraint> {
        self.entries(kind).iter().map(|e| e.constraint.clone()).collect()
    }

    /// Constraint with the largest minimum; sizes spatial searches
    pub fn worst_constraint(&self, kind: ConstraintType) -> Option<Constraint> {
        self.entries(kind)
            .iter()
            .filter(|e| e.constraint.value.min.is_some())
            .max_by(|a, b| a.constraint.min_or_zero().total_cmp(&b.constraint.min_or_zero()))
            .map(|e| e.constraint.clone())
    }

    pub fn settings(&self) -> &DesignSettings {
        &self.settings
    }

    /// Compile-time diagnostics that did not abort compilation
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn count_by_origin(&self, origin: ConstraintOrigin) -> usize {
        self.rules.iter().filter(|r| r.origin == origin).count()
    }

    /// First matching constraint of `kind` for the item pair, or the fallback.
    /// When `trace` is given every rule considered is explained there.
    pub fn resolve(
        &self,
        kind: ConstraintType,
        a: &BoardItem,
        b: Option<&BoardItem>,
        layer: Option<Layer>,
        trace: Option<&dyn Reporter>,
    ) -> Constraint {
        for entry in self.entries(kind) {
            let Some(rule) = self.rule(entry.rule) else {
                continue;
            };
            if let Some(t) = trace {
                t.report(&format!("Checking rule '{}'.", rule.name));
            }

            let on_layer = match layer {
                Some(l) => entry.layer_mask.contains(l),
                None => {
                    entry.layer_mask.intersects(&a.layers)
                        || b.is_some_and(|b| entry.layer_mask.intersects(&b.layers))
                }
            };
            if !on_layer {
                if let Some(t) = trace {
                    t.report("Rule layer does not match; rule ignored.");
                }
                continue;
            }

            let matched = match &rule.condition {
                None => true,
                Some(condition) => {
                    let matched = condition.matches_in(&self.settings, a, b, layer);
                    if let Some(t) = trace {
                        t.report(&format!(
                            "Checking rule condition \"{}\": {}.",
                            condition.text(),
                            if matched { "true" } else { "false" }
                        ));
                    }
                    matched
                }
            };

            if matched {
                if let Some(t) = trace {
                    t.report(&describe_applied(&entry.constraint));
                }
                return entry.constraint.clone();
            }
        }

        if let Some(t) = trace {
            t.report(&format!("No rule matched; using default {} constraint.", kind));
        }
        Constraint::fallback(kind)
    }
}

fn describe_applied(constraint: &Constraint) -> String {
    match constraint.value.min {
        Some(min) => format!(
            "Rule '{}' applied: {} min {}.",
            constraint.source,
            constraint.kind,
            format_mm(min)
        ),
        None => format!("Rule '{}' applied: {}.", constraint.source, constraint.kind),
    }
}

/// Compile rule text against `settings`
pub fn compile(text: &str, settings: &DesignSettings) -> Result<RuleSet, ParseError> {
    let mut authored = parse_rules(text)?;
    // Stable sort keeps the ordering deterministic for equal keys
    authored.sort_by_key(|r| r.specificity_key());

    let mut set = RuleSet { settings: settings.clone(), ..Default::default() };
    for rule in &authored {
        let Some(condition) = &rule.condition else {
            continue;
        };
        for name in condition.expr().referenced_net_classes() {
            let is_pattern = name.contains('*') || name.contains('?');
            if !is_pattern && !settings.has_net_class(&name) {
                set.warnings.push(format!(
                    "Rule '{}' refers to net class '{}', which is not defined in the design settings; comparisons against it are false.",
                    rule.name, name
                ));
            }
        }
    }

    for rule in authored.into_iter().chain(implicit_rules(settings)) {
        set.push(rule);
    }
    Ok(set)
}

// ---------------------------------------------------------------------------
// Implicit rules

fn prop(p: Property) -> Box<Expr> {
    Box::new(Expr::Property(ItemRef::A, p))
}

fn eq(lhs: Box<Expr>, value: &str) -> Expr {
    Expr::Compare(CmpOp::Eq, lhs, Box::new(Expr::Str(value.to_string())))
}

fn and(lhs: Expr, rhs: Expr) -> Expr {
    Expr::And(Box::new(lhs), Box::new(rhs))
}

fn is_micro_via() -> Expr {
    Expr::Method(ItemRef::A, Method::IsMicroVia)
}

fn implicit_constraint(kind: ConstraintType, value: MinOptMax, source: &str) -> Constraint {
    let mut c = Constraint::new(kind, value, source);
    c.origin = ConstraintOrigin::Implicit;
    c
}

struct ImplicitBuilder {
    rules: Vec<Rule>,
}

impl ImplicitBuilder {
    fn add(&mut self, name: String, condition: Option<Condition>, constraints: Vec<(ConstraintType, MinOptMax)>) {
        let mut rule = Rule::new(&name, self.rules.len(), ConstraintOrigin::Implicit);
        rule.condition = condition;
        rule.constraints = constraints
            .into_iter()
            .map(|(kind, value)| implicit_constraint(kind, value, &name))
            .collect();
        self.rules.push(rule);
    }
}

/// Rules synthesized from the legacy settings, already in resolution order:
/// net classes by descending clearance, then micro-via minimums, then the
/// unconditional board minimums.
fn implicit_rules(settings: &DesignSettings) -> Vec<Rule> {
    let mut classes: Vec<&NetClass> = settings.net_classes.iter().collect();
    classes.sort_by(|a, b| b.clearance.total_cmp(&a.clearance));

    let mut builder = ImplicitBuilder { rules: Vec::new() };

    for nc in &classes {
        let class_expr = eq(prop(Property::NetClass), &nc.name);
        builder.add(
            format!("netclass '{}'", nc.name),
            Some(Condition::from_expr(format!("A.NetClass == '{}'", nc.name), class_expr)),
            vec![
                (ConstraintType::Clearance, MinOptMax::min(nc.clearance)),
                (
                    ConstraintType::TrackWidth,
                    MinOptMax { min: Some(settings.min_track_width), opt: Some(nc.track_width), max: None },
                ),
            ],
        );
    }

    for nc in &classes {
        let via_expr = and(
            and(eq(prop(Property::Type), ItemKind::Via.type_name()), eq(prop(Property::NetClass), &nc.name)),
            Expr::Not(Box::new(is_micro_via())),
        );
        builder.add(
            format!("netclass '{}' (vias)", nc.name),
            Some(Condition::from_expr(
                format!("A.Type == 'Via' && A.NetClass == '{}' && !A.isMicroVia()", nc.name),
                via_expr,
            )),
            vec![
                (
                    ConstraintType::ViaDiameter,
                    MinOptMax { min: Some(settings.min_via_diameter), opt: Some(nc.via_diameter), max: None },
                ),
                (
                    ConstraintType::HoleSize,
                    MinOptMax { min: Some(settings.min_through_hole), opt: Some(nc.via_drill), max: None },
                ),
            ],
        );

        let uvia_expr = and(eq(prop(Property::NetClass), &nc.name), is_micro_via());
        builder.add(
            format!("netclass '{}' (micro vias)", nc.name),
            Some(Condition::from_expr(
                format!("A.NetClass == '{}' && A.isMicroVia()", nc.name),
                uvia_expr,
            )),
            vec![
                (
                    ConstraintType::ViaDiameter,
                    MinOptMax {
                        min: Some(settings.min_microvia_diameter),
                        opt: Some(nc.microvia_diameter),
                        max: None,
                    },
                ),
                (
                    ConstraintType::HoleSize,
                    MinOptMax { min: Some(settings.min_microvia_drill), opt: Some(nc.microvia_drill), max: None },
                ),
            ],
        );
    }

    builder.add(
        "board setup micro-via constraints".to_string(),
        Some(Condition::from_expr("A.isMicroVia()".to_string(), is_micro_via())),
        vec![
            (ConstraintType::ViaDiameter, MinOptMax::min(settings.min_microvia_diameter)),
            (ConstraintType::HoleSize, MinOptMax::min(settings.min_microvia_drill)),
        ],
    );

    builder.add(
        "board setup constraints".to_string(),
        None,
        vec![
            (ConstraintType::Clearance, MinOptMax::min(settings.min_clearance)),
            (ConstraintType::HoleClearance, MinOptMax::min(settings.min_hole_clearance)),
            (ConstraintType::HoleToHole, MinOptMax::min(settings.min_hole_to_hole)),
            (ConstraintType::TrackWidth, MinOptMax::min(settings.min_track_width)),
            (ConstraintType::ViaDiameter, MinOptMax::min(settings.min_via_diameter)),
            (ConstraintType::AnnularWidth, MinOptMax::min(settings.min_via_annular_width)),
            (ConstraintType::HoleSize, MinOptMax::min(settings.min_through_hole)),
            (ConstraintType::CourtyardClearance, MinOptMax::min(settings.min_courtyard_clearance)),
        ],
    );

    builder.rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{ItemGeometry, Point, ViaType};
    use crate::drc::reporter::CollectingReporter;

    fn via(id: u64, class: &str, via_type: ViaType) -> BoardItem {
        BoardItem::new(
            id,
            LayerSet::outer_copper(),
            ItemGeometry::Via { at: Point::new(0.0, 0.0), diameter: 0.6, drill: 0.3, via_type },
        )
        .with_net(&format!("N{}", id), class)
    }

    fn settings() -> DesignSettings {
        let mut s = DesignSettings::default();
        s.min_clearance = 0.1;
        s.net_classes.push(NetClass::named("Power", 0.4));
        s.net_classes.push(NetClass::named("HV", 1.0));
        s
    }

    #[test]
    fn test_authored_rules_sorted_by_specificity() {
        let text = r#"
            (rule "generic" (constraint clearance (min 0.3)))
            (rule "front" (layer "F.Cu") (constraint clearance (min 0.35)))
            (rule "power" (condition "A.NetClass == 'Power'") (constraint clearance (min 0.5)))
            (rule "power front" (condition "A.NetClass == 'Power' && L == 'F.Cu'")
                (constraint clearance (min 0.6)))
        "#;
        let set = compile(text, &settings()).expect("compiles");
        let names: Vec<&str> = set
            .entries(ConstraintType::Clearance)
            .iter()
            .filter(|e| e.constraint.origin == ConstraintOrigin::Authored)
            .map(|e| e.constraint.source.as_str())
            .collect();
        assert_eq!(names, vec!["power front", "power", "front", "generic"]);
        assert_eq!(set.count_by_origin(ConstraintOrigin::Authored), 4);
    }

    #[test]
    fn test_implicit_net_class_clearance_takes_larger() {
        let set = compile("", &settings()).expect("compiles");
        let a = via(1, "Power", ViaType::Through);
        let b = via(2, "HV", ViaType::Through);
        let c = set.resolve(ConstraintType::Clearance, &a, Some(&b), None, None);
        assert_eq!(c.value.min, Some(1.0));
        assert_eq!(c.origin, ConstraintOrigin::Implicit);

        let d = via(3, "Default", ViaType::Through);
        let c = set.resolve(ConstraintType::Clearance, &a, Some(&d), None, None);
        assert_eq!(c.value.min, Some(0.4));
        assert_eq!(c.source, "netclass 'Power'");
    }

    #[test]
    fn test_implicit_via_rules() {
        let set = compile("", &settings()).expect("compiles");
        let through = via(1, "Power", ViaType::Through);
        let micro = via(2, "Power", ViaType::Micro);

        let c = set.resolve(ConstraintType::ViaDiameter, &through, None, None, None);
        assert_eq!(c.value.min, Some(0.4));
        assert_eq!(c.value.opt, Some(0.8));

        let c = set.resolve(ConstraintType::ViaDiameter, &micro, None, None, None);
        assert_eq!(c.value.min, Some(0.2));
        assert_eq!(c.value.opt, Some(0.3));
        assert_eq!(c.source, "netclass 'Power' (micro vias)");
    }

    #[test]
    fn test_unknown_net_class_warns_and_never_matches() {
        let text = r#"(rule "ghost" (condition "A.NetClass == 'Ghost'") (constraint clearance (min 2)))"#;
        let set = compile(text, &settings()).expect("compiles");
        assert_eq!(set.warnings().len(), 1);
        assert!(set.warnings()[0].contains("Ghost"));
        assert!(set.warnings()[0].contains("not defined"));

        let a = via(1, "Power", ViaType::Through);
        let c = set.resolve(ConstraintType::Clearance, &a, None, None, None);
        assert_eq!(c.source, "netclass 'Power'");

        // An item tagged with the undefined class reads as the default class
        let ghost = via(2, "Ghost", ViaType::Through);
        let c = set.resolve(ConstraintType::Clearance, &ghost, None, None, None);
        assert_eq!(c.source, "netclass 'Default'");
    }

    #[test]
    fn test_cleared_net_classes_do_not_match_authored_rules() {
        let text = r#"(rule "clearance-power" (condition "A.NetClass == 'Power'") (constraint clearance (min 0.5)))"#;
        let mut bare = settings();
        bare.net_classes.clear();
        let set = compile(text, &bare).expect("compiles");
        assert_eq!(set.warnings().len(), 1);

        let a = via(1, "Power", ViaType::Through);
        let c = set.resolve(ConstraintType::Clearance, &a, None, None, None);
        assert_eq!(c.source, "board setup constraints");
        assert_eq!(c.value.min, Some(0.1));
    }

    #[test]
    fn test_keepout_falls_back_and_traces() {
        let set = compile("", &settings()).expect("compiles");
        assert!(!set.has_rules(ConstraintType::Keepout));
        let a = via(1, "Power", ViaType::Through);
        let trace = CollectingReporter::new();
        let c = set.resolve(ConstraintType::Keepout, &a, None, None, Some(&trace));
        assert_eq!(c.origin, ConstraintOrigin::Default);
        assert!(trace.lines().iter().any(|l| l.contains("No rule matched")));
    }

    #[test]
    fn test_worst_constraint() {
        let text = r#"(rule "big" (condition "A.NetClass == 'Power'") (constraint clearance (min 3)))"#;
        let set = compile(text, &settings()).expect("compiles");
        let worst = set.worst_constraint(ConstraintType::Clearance).expect("has clearance");
        assert_eq!(worst.value.min, Some(3.0));
        assert_eq!(worst.source, "big");
    }
}
