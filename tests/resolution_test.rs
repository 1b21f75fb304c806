// Constraint resolution through the public engine API
use drc_engine::board::{ItemGeometry, PadShape, Point, ViaType};
use drc_engine::drc::{ConstraintOrigin, DesignSettings, NetClass};
use drc_engine::{Board, BoardItem, ConstraintType, DrcEngine, Layer, LayerSet};

#[cfg(test)]
mod tests {
    use super::*;

    fn pad(id: u64, x: f64, net: &str, class: &str) -> BoardItem {
        BoardItem::new(
            id,
            LayerSet::outer_copper(),
            ItemGeometry::Pad {
                at: Point::new(x, 0.0),
                shape: PadShape::Circle { diameter: 1.0 },
                drill: None,
                plated: true,
            },
        )
        .with_net(net, class)
    }

    fn via(id: u64, class: &str, via_type: ViaType) -> BoardItem {
        BoardItem::new(
            id,
            LayerSet::outer_copper(),
            ItemGeometry::Via { at: Point::new(0.0, 0.0), diameter: 0.6, drill: 0.3, via_type },
        )
        .with_net("N", class)
    }

    fn settings() -> DesignSettings {
        let mut settings = DesignSettings::default();
        settings.net_classes.push(NetClass::named("Power", 0.5));
        settings.net_classes.push(NetClass::named("Signal", 0.2));
        settings
    }

    fn ready_engine(rules: &str) -> DrcEngine {
        let engine = DrcEngine::new();
        engine.compile_rules(rules, &settings()).expect("rules compile");
        engine
    }

    #[test]
    fn test_no_rules_uses_net_class_clearance() {
        let engine = ready_engine("");
        let a = pad(1, 0.0, "VCC", "Power");
        let b = pad(2, 1.3, "SDA", "Signal");

        let c = engine.eval_rules_for_items(ConstraintType::Clearance, &a, Some(&b), None);
        assert_eq!(c.value.min, Some(0.5));
        assert_eq!(c.origin, ConstraintOrigin::Implicit);
        assert_eq!(c.source, "netclass 'Power'");

        // Order of the pair does not matter
        let swapped = engine.eval_rules_for_items(ConstraintType::Clearance, &b, Some(&a), None);
        assert_eq!(swapped, c);
        println!("✓ Implicit clearance: {} from {}", c.min_or_zero(), c.source);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let engine = ready_engine(
            r#"(rule "a" (condition "A.NetClass == 'Power'") (constraint clearance (min 0.7)))
               (rule "b" (condition "A.NetClass == 'Power'") (constraint clearance (min 0.9)))"#,
        );
        let a = pad(1, 0.0, "VCC", "Power");
        let b = pad(2, 1.3, "SDA", "Signal");
        let first = engine.eval_rules_for_items(ConstraintType::Clearance, &a, Some(&b), Some(Layer::F_CU));
        for _ in 0..50 {
            let again = engine.eval_rules_for_items(ConstraintType::Clearance, &a, Some(&b), Some(Layer::F_CU));
            assert_eq!(again, first);
        }
        // Equal specificity: the later declaration wins
        assert_eq!(first.source, "b");
        assert_eq!(first.value.min, Some(0.9));
    }

    #[test]
    fn test_more_specific_rule_wins_over_declaration_order() {
        let engine = ready_engine(
            r#"(rule "power signal" (condition "A.NetClass == 'Power' && B.NetClass == 'Signal'")
                   (constraint clearance (min 0.4)))
               (rule "power" (condition "A.NetClass == 'Power'") (constraint clearance (min 0.8)))"#,
        );
        let a = pad(1, 0.0, "VCC", "Power");
        let b = pad(2, 1.3, "SDA", "Signal");
        let d = pad(3, 2.6, "GND", "Default");

        let c = engine.eval_rules_for_items(ConstraintType::Clearance, &a, Some(&b), None);
        assert_eq!(c.source, "power signal");
        assert_eq!(c.value.min, Some(0.4));

        let c = engine.eval_rules_for_items(ConstraintType::Clearance, &a, Some(&d), None);
        assert_eq!(c.source, "power");
    }

    #[test]
    fn test_layer_restricted_rule() {
        let engine = ready_engine(
            r#"(rule "inner signals" (layer inner) (condition "A.NetClass == 'Signal'")
                   (constraint clearance (min 0.1)))"#,
        );
        let a = pad(1, 0.0, "SDA", "Signal");
        let b = pad(2, 1.3, "SCL", "Signal");

        let outer = engine.eval_rules_for_items(ConstraintType::Clearance, &a, Some(&b), Some(Layer::F_CU));
        assert_eq!(outer.source, "netclass 'Signal'");

        let in1 = Layer::from_name("In1.Cu").expect("inner layer");
        let inner = engine.eval_rules_for_items(ConstraintType::Clearance, &a, Some(&b), Some(in1));
        assert_eq!(inner.source, "inner signals");
        assert_eq!(inner.value.min, Some(0.1));
    }

    #[test]
    fn test_layer_condition_with_net_class() {
        let engine = ready_engine(
            r#"(rule "front" (condition "L == 'F.Cu'") (constraint clearance (min 0.3)))
               (rule "front power" (condition "L == 'F.Cu' && A.NetClass == 'Power'")
                   (constraint clearance (min 0.6)))"#,
        );
        let power = pad(1, 0.0, "VCC", "Power");
        let signal = pad(2, 1.3, "SDA", "Signal");
        let other = pad(3, 2.6, "SCL", "Signal");

        let c = engine.eval_rules_for_items(ConstraintType::Clearance, &power, Some(&signal), Some(Layer::F_CU));
        assert_eq!(c.source, "front power");
        assert_eq!(c.value.min, Some(0.6));

        let c = engine.eval_rules_for_items(ConstraintType::Clearance, &signal, Some(&other), Some(Layer::F_CU));
        assert_eq!(c.source, "front");
        assert_eq!(c.value.min, Some(0.3));

        // Neither rule holds on the back layer
        let c = engine.eval_rules_for_items(ConstraintType::Clearance, &power, Some(&signal), Some(Layer::B_CU));
        assert_eq!(c.origin, ConstraintOrigin::Implicit);
        assert_eq!(c.source, "netclass 'Power'");
    }

    #[test]
    fn test_recompile_same_text_is_idempotent() {
        let text = r#"(rule "power" (condition "A.NetClass == 'Power'") (constraint clearance (min 0.8)))"#;
        let engine = ready_engine(text);
        let before = engine.query_constraints_by_id(ConstraintType::Clearance);
        let rule_count = engine.rule_set().rules().len();
        engine.compile_rules(text, &settings()).expect("recompiles");
        assert_eq!(engine.query_constraints_by_id(ConstraintType::Clearance), before);
        assert_eq!(engine.rule_set().rules().len(), rule_count);
    }

    #[test]
    fn test_micro_via_settings() {
        let engine = ready_engine("");
        let micro = via(1, "Signal", ViaType::Micro);
        let through = via(2, "Signal", ViaType::Through);

        let c = engine.eval_rules_for_items(ConstraintType::HoleSize, &micro, None, None);
        assert_eq!(c.value.min, Some(0.1));
        assert_eq!(c.source, "netclass 'Signal' (micro vias)");

        let c = engine.eval_rules_for_items(ConstraintType::HoleSize, &through, None, None);
        assert_eq!(c.value.min, Some(0.3));
        assert_eq!(c.source, "netclass 'Signal' (vias)");
    }

    #[test]
    fn test_unmatched_constraint_falls_back() {
        let engine = ready_engine("");
        let a = pad(1, 0.0, "VCC", "Power");
        assert!(!engine.has_rules_for_constraint_type(ConstraintType::Keepout));
        let c = engine.eval_rules_for_items(ConstraintType::Keepout, &a, None, None);
        assert_eq!(c.origin, ConstraintOrigin::Default);
        assert_eq!(c.source, "default");
    }

    #[test]
    fn test_board_json_fixture_loads() {
        let board = Board::from_json_file("tests/fixtures/power_signal.json").expect("fixture loads");
        assert_eq!(board.items.len(), 4);
        assert!(board.design_settings.has_net_class("power"));
        assert_eq!(board.item(2).map(|i| i.net_class_name()), Some("Signal"));
    }
}
