// Full DRC runs over the fixture board
use drc_engine::board::{ItemGeometry, PadShape, Point};
use drc_engine::drc::{DesignSettings, NetClass, ProgressReporter, RunStatus, Severity};
use drc_engine::{Board, BoardItem, DrcEngine, DrcItem, ErrorCode, Layer, LayerSet, RunOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD: &str = "tests/fixtures/power_signal.json";
    const RULES: &str = "tests/fixtures/board.rules";

    fn load_board() -> Board {
        Board::from_json_file(BOARD).expect("fixture board loads")
    }

    fn collect(engine: &DrcEngine) -> Arc<Mutex<Vec<DrcItem>>> {
        let found = Arc::new(Mutex::new(Vec::new()));
        let sink = found.clone();
        engine.set_violation_handler(Some(Arc::new(move |item: DrcItem, _: Point| {
            sink.lock().unwrap().push(item);
        })));
        found
    }

    #[test]
    fn test_net_class_clearance_without_rules() {
        let board = load_board();
        let engine = DrcEngine::new();
        engine.compile_rules("", &board.design_settings).expect("compiles");
        let found = collect(&engine);

        let summary = engine.run_tests(&board, RunOptions::default()).expect("run succeeds");
        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.stages_completed, summary.stages_total);

        let found = found.lock().unwrap();
        assert_eq!(found.len(), 1, "violations: {:?}", *found);
        let v = &found[0];
        assert_eq!(v.error_code, ErrorCode::Clearance);
        assert_eq!(v.items, vec![1, 2]);
        assert_eq!(v.rule_name.as_deref(), Some("netclass 'Power'"));
        assert!(v.message.contains("0.5000 mm"), "message: {}", v.message);
        assert!(v.message.contains("actual 0.3000 mm"), "message: {}", v.message);
        println!("✓ {}", v.error_text());
    }

    #[test]
    fn test_authored_rules_from_file() {
        let board = load_board();
        let rules = std::fs::read_to_string(RULES).expect("rules file");
        let engine = DrcEngine::new();
        engine.compile_rules(&rules, &board.design_settings).expect("compiles");
        let found = collect(&engine);

        let summary = engine.run_tests(&board, RunOptions::default()).expect("run succeeds");
        assert_eq!(summary.violations_reported, 2);

        let found = found.lock().unwrap();
        let clearance = found
            .iter()
            .find(|v| v.error_code == ErrorCode::Clearance)
            .expect("clearance violation");
        assert_eq!(clearance.rule_name.as_deref(), Some("power keepaway"));

        let width = found
            .iter()
            .find(|v| v.error_code == ErrorCode::TrackWidth)
            .expect("track width violation");
        assert_eq!(width.items, vec![4]);
        assert_eq!(width.rule_name.as_deref(), Some("min track"));
    }

    #[test]
    fn test_ignored_severity_is_counted_not_reported() {
        let mut board = load_board();
        board.design_settings.severities.insert(ErrorCode::Clearance, Severity::Ignore);
        let engine = DrcEngine::new();
        engine.compile_rules("", &board.design_settings).expect("compiles");
        let found = collect(&engine);

        let summary = engine.run_tests(&board, RunOptions::default()).expect("run succeeds");
        assert!(found.lock().unwrap().is_empty());
        assert_eq!(summary.violations_reported, 0);
        assert_eq!(engine.error_count(ErrorCode::Clearance), 1);
    }

    #[test]
    fn test_error_limit_from_settings() {
        let mut board = load_board();
        board.design_settings.error_limit = 0;
        let engine = DrcEngine::new();
        engine.compile_rules("", &board.design_settings).expect("compiles");
        let found = collect(&engine);

        engine.run_tests(&board, RunOptions::default()).expect("run succeeds");
        assert!(found.lock().unwrap().is_empty());
        assert!(engine.is_error_limit_exceeded(ErrorCode::Clearance));
    }

    struct CancelOnFirstStage {
        flag: Arc<AtomicBool>,
        stages: Mutex<Vec<String>>,
    }

    impl ProgressReporter for CancelOnFirstStage {
        fn report_stage(&self, name: &str, _index: usize, _total: usize) {
            self.stages.lock().unwrap().push(name.to_string());
            self.flag.store(true, Ordering::Release);
        }
    }

    #[test]
    fn test_cancel_stops_after_first_stage() {
        let board = load_board();
        let engine = DrcEngine::new();
        engine.compile_rules("", &board.design_settings).expect("compiles");
        let found = collect(&engine);
        let reporter = Arc::new(CancelOnFirstStage {
            flag: engine.cancel_flag(),
            stages: Mutex::new(Vec::new()),
        });
        engine.set_progress_reporter(Some(reporter.clone()));

        let summary = engine.run_tests(&board, RunOptions::default()).expect("run returns");
        assert_eq!(summary.status, RunStatus::Cancelled);
        assert_eq!(summary.stages_completed, 0);
        assert_eq!(reporter.stages.lock().unwrap().len(), 1);
        assert!(found.lock().unwrap().is_empty());

        // The engine is usable again afterwards
        engine.set_progress_reporter(None);
        let summary = engine.run_tests(&board, RunOptions::default()).expect("second run");
        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(found.lock().unwrap().len(), 1);
    }

    struct CancelOnStage {
        flag: Arc<AtomicBool>,
        at: usize,
    }

    impl ProgressReporter for CancelOnStage {
        fn report_stage(&self, _name: &str, index: usize, _total: usize) {
            if index == self.at {
                self.flag.store(true, Ordering::Release);
            }
        }
    }

    #[test]
    fn test_cancel_keeps_earlier_stage_violations() {
        let board = load_board();
        let rules = std::fs::read_to_string(RULES).expect("rules file");
        let engine = DrcEngine::new();
        engine.compile_rules(&rules, &board.design_settings).expect("compiles");
        let found = collect(&engine);
        engine.set_progress_reporter(Some(Arc::new(CancelOnStage { flag: engine.cancel_flag(), at: 1 })));

        let summary = engine.run_tests(&board, RunOptions::default()).expect("run returns");
        assert_eq!(summary.status, RunStatus::Cancelled);
        assert_eq!(summary.stages_completed, 1);

        // Clearance ran first; the track width stage was stopped
        let found = found.lock().unwrap();
        assert_eq!(found.len(), 1, "violations: {:?}", *found);
        assert_eq!(found[0].error_code, ErrorCode::Clearance);
        assert_eq!(found[0].items, vec![1, 2]);
    }

    fn pad(id: u64, x: f64, y: f64, net: &str, class: &str) -> BoardItem {
        BoardItem::new(
            id,
            LayerSet::from_layers(&[Layer::F_CU]),
            ItemGeometry::Pad {
                at: Point::new(x, y),
                shape: PadShape::Circle { diameter: 1.0 },
                drill: None,
                plated: false,
            },
        )
        .with_net(net, class)
    }

    #[test]
    fn test_power_rule_applies_only_to_power_pairs() {
        let mut settings = DesignSettings::default();
        settings.min_clearance = 0.2;
        settings.net_classes = vec![
            NetClass::named("Default", 0.2),
            NetClass::named("Power", 0.2),
            NetClass::named("Signal", 0.2),
        ];
        // Both pairs have 0.3mm between pad edges
        let board = Board::new(
            vec![
                pad(1, 0.0, 0.0, "VCC", "Power"),
                pad(2, 1.3, 0.0, "VBAT", "Power"),
                pad(3, 0.0, 10.0, "SDA", "Signal"),
                pad(4, 1.3, 10.0, "SCL", "Signal"),
            ],
            settings,
        );
        let engine = DrcEngine::new();
        engine
            .compile_rules(
                r#"(rule "clearance-power"
                       (condition "A.NetClass == 'Power' && B.NetClass == 'Power'")
                       (constraint clearance (min 0.5mm)))"#,
                &board.design_settings,
            )
            .expect("compiles");
        let found = collect(&engine);

        let summary = engine.run_tests(&board, RunOptions::default()).expect("run succeeds");
        assert_eq!(summary.status, RunStatus::Completed);

        let found = found.lock().unwrap();
        assert_eq!(found.len(), 1, "violations: {:?}", *found);
        assert_eq!(found[0].error_code, ErrorCode::Clearance);
        assert_eq!(found[0].items, vec![1, 2]);
        assert_eq!(found[0].rule_name.as_deref(), Some("clearance-power"));
        println!("✓ {}", found[0].error_text());
    }

    #[test]
    fn test_footprint_option_removes_courtyard_stage() {
        let mut board = load_board();
        let outline = vec![
            Point::new(10.0, 10.0),
            Point::new(12.0, 10.0),
            Point::new(12.0, 12.0),
            Point::new(10.0, 12.0),
        ];
        board.items.push(BoardItem::new(
            5,
            LayerSet::from_layers(&[Layer::F_CRTYD]),
            ItemGeometry::Footprint { at: Point::new(11.0, 11.0), courtyard: outline },
        ));
        let engine = DrcEngine::new();
        engine.compile_rules("", &board.design_settings).expect("compiles");

        let with_footprints = engine.run_tests(&board, RunOptions::default()).expect("run");
        let without = engine
            .run_tests(&board, RunOptions { test_footprints: false, ..Default::default() })
            .expect("run");
        assert_eq!(with_footprints.stages_total, without.stages_total + 1);
        assert_eq!(with_footprints.status, RunStatus::Completed);
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Event {
        Stage(usize),
        Progress(f64),
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<Event>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn report_progress(&self, fraction: f64) {
            self.events.lock().unwrap().push(Event::Progress(fraction));
        }

        fn report_stage(&self, _name: &str, index: usize, _total: usize) {
            self.events.lock().unwrap().push(Event::Stage(index));
        }
    }

    #[test]
    fn test_progress_reported_on_clean_board() {
        // 2000 pads on a 5mm grid, nothing close enough to violate
        let items: Vec<BoardItem> = (0..2000u64)
            .map(|i| pad(i + 1, (i % 50) as f64 * 5.0, (i / 50) as f64 * 5.0, "N", "Default"))
            .collect();
        let mut settings = DesignSettings::default();
        settings.min_clearance = 0.2;
        let board = Board::new(items, settings);

        let engine = DrcEngine::new();
        engine.compile_rules("", &board.design_settings).expect("compiles");
        let found = collect(&engine);
        let recorder = Arc::new(RecordingProgress::default());
        engine.set_progress_reporter(Some(recorder.clone()));

        let summary = engine.run_tests(&board, RunOptions::default()).expect("run succeeds");
        assert_eq!(summary.status, RunStatus::Completed);
        assert!(found.lock().unwrap().is_empty());

        let events = recorder.events.lock().unwrap();
        let stages: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                Event::Stage(i) => Some(*i),
                Event::Progress(_) => None,
            })
            .collect();
        assert_eq!(stages.len(), summary.stages_total);

        // Every stage reports at least once before the next one starts
        let mut seen_progress = vec![false; summary.stages_total];
        let mut current = None;
        let mut values = Vec::new();
        for event in events.iter() {
            match event {
                Event::Stage(i) => current = Some(*i),
                Event::Progress(f) => {
                    let stage = current.expect("progress inside a stage");
                    seen_progress[stage] = true;
                    values.push(*f);
                }
            }
        }
        assert!(seen_progress.iter().all(|s| *s), "stages without progress: {:?}", seen_progress);
        assert!(values.iter().all(|f| (0.0..=1.0).contains(f)));
        assert!(values.iter().any(|f| *f > 0.0 && *f < 1.0));
        let last = values.last().copied().unwrap_or(0.0);
        assert!((last - 1.0).abs() < 1e-9, "last progress {}", last);
        println!("✓ {} progress reports over {} stages", values.len(), stages.len());
    }
}
