//! DRC engine: constraint resolution and test orchestration
//!
//! The engine owns the compiled [`RuleSet`] behind an `RwLock<Arc<_>>` so a
//! recompile swaps the pointer while in-flight queries keep their snapshot.
//! Runs move the engine through `Ready -> Running -> Ready`; cancellation is a
//! shared flag checked by providers and after every stage.

use super::compiler::{compile, RuleSet};
use super::error::{DrcError, DrcResult};
use super::providers::{self, TestProvider};
use super::reporter::{ProgressReporter, Reporter, ViolationHandler};
use super::settings::{DesignSettings, DEFAULT_ERROR_LIMIT};
use super::types::{Constraint, ConstraintOrigin, ConstraintType, DrcItem, ErrorCode, Severity};
use crate::board::{Board, BoardItem, Layer};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Uninitialized,
    Compiling,
    Ready,
    Running,
    TornDown,
}

impl EngineState {
    fn from_u8(v: u8) -> EngineState {
        match v {
            0 => EngineState::Uninitialized,
            1 => EngineState::Compiling,
            2 => EngineState::Ready,
            3 => EngineState::Running,
            _ => EngineState::TornDown,
        }
    }
}

/// Flags selecting which optional checks a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Run the zone intersection provider
    pub test_tracks_against_zones: bool,
    /// Report every clearance violation of a track instead of the first
    pub report_all_track_errors: bool,
    /// Run the courtyard provider
    pub test_footprints: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            test_tracks_against_zones: true,
            report_all_track_errors: false,
            test_footprints: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Cancelled,
}

/// Outcome of `run_tests`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub status: RunStatus,
    /// Providers that ran to completion
    pub stages_completed: usize,
    pub stages_total: usize,
    /// Violations handed to the violation handler
    pub violations_reported: usize,
    /// Per-code counts including ignored and over-limit violations
    pub error_counts: Vec<(ErrorCode, usize)>,
    pub elapsed_ms: f64,
}

/// Puts a running engine back to `Ready` however the run ends, and clears
/// the cancel flag and stage counters
struct RunGuard<'a> {
    state: &'a AtomicU8,
    cancel: &'a AtomicBool,
    stage: &'a AtomicUsize,
    stage_total: &'a AtomicUsize,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.cancel.store(false, Ordering::Release);
        self.stage.store(0, Ordering::Relaxed);
        self.stage_total.store(0, Ordering::Relaxed);
        let _ = self.state.compare_exchange(
            EngineState::Running as u8,
            EngineState::Ready as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// Design rule check engine
pub struct DrcEngine {
    rules: RwLock<Arc<RuleSet>>,
    state: AtomicU8,
    cancel: Arc<AtomicBool>,
    error_counts: Vec<AtomicUsize>,
    error_limit: AtomicUsize,
    violations_reported: AtomicUsize,
    /// Index and count of provider stages in the current run
    stage: AtomicUsize,
    stage_total: AtomicUsize,
    log_reporter: RwLock<Option<Arc<dyn Reporter>>>,
    progress_reporter: RwLock<Option<Arc<dyn ProgressReporter>>>,
    violation_handler: RwLock<Option<ViolationHandler>>,
}

impl Default for DrcEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DrcEngine {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(Arc::new(RuleSet::default())),
            state: AtomicU8::new(EngineState::Uninitialized as u8),
            cancel: Arc::new(AtomicBool::new(false)),
            error_counts: ErrorCode::ALL.iter().map(|_| AtomicUsize::new(0)).collect(),
            error_limit: AtomicUsize::new(DEFAULT_ERROR_LIMIT),
            violations_reported: AtomicUsize::new(0),
            stage: AtomicUsize::new(0),
            stage_total: AtomicUsize::new(0),
            log_reporter: RwLock::new(None),
            progress_reporter: RwLock::new(None),
            violation_handler: RwLock::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Host wiring

    pub fn set_log_reporter(&self, reporter: Option<Arc<dyn Reporter>>) {
        *self.log_reporter.write().unwrap_or_else(PoisonError::into_inner) = reporter;
    }

    pub fn set_progress_reporter(&self, reporter: Option<Arc<dyn ProgressReporter>>) {
        *self.progress_reporter.write().unwrap_or_else(PoisonError::into_inner) = reporter;
    }

    pub fn set_violation_handler(&self, handler: Option<ViolationHandler>) {
        *self.violation_handler.write().unwrap_or_else(PoisonError::into_inner) = handler;
    }

    fn log(&self, message: &str) {
        let reporter = self.log_reporter.read().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(reporter) = reporter {
            reporter.report(message);
        }
    }

    fn progress(&self) -> Option<Arc<dyn ProgressReporter>> {
        self.progress_reporter.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Snapshot of the active rule set
    pub fn rule_set(&self) -> Arc<RuleSet> {
        self.rules.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    // -----------------------------------------------------------------------
    // Compilation

    /// Compile `text` against `settings` and make it the active rule set.
    /// On failure the previous rule set and state are kept.
    pub fn compile_rules(&self, text: &str, settings: &DesignSettings) -> DrcResult<()> {
        let previous = loop {
            let current = self.state();
            match current {
                EngineState::TornDown => return Err(DrcError::TornDown),
                EngineState::Running | EngineState::Compiling => return Err(DrcError::EngineBusy),
                EngineState::Uninitialized | EngineState::Ready => {}
            }
            if self
                .state
                .compare_exchange(
                    current as u8,
                    EngineState::Compiling as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                break current;
            }
        };

        let start = Instant::now();
        match compile(text, settings) {
            Ok(set) => {
                for warning in set.warnings() {
                    warn!("[DRC] {}", warning);
                    self.log(warning);
                }
                info!(
                    "[DRC] Compiled {} authored and {} implicit rules in {:?}",
                    set.count_by_origin(ConstraintOrigin::Authored),
                    set.count_by_origin(ConstraintOrigin::Implicit),
                    start.elapsed()
                );
                self.error_limit.store(settings.error_limit, Ordering::Relaxed);
                *self.rules.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(set);
                self.state.store(EngineState::Ready as u8, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                warn!("[DRC] Rule compilation failed: {}", e);
                self.log(&format!("Rule compilation failed: {}", e));
                self.state.store(previous as u8, Ordering::Release);
                Err(DrcError::Parse(e))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Resolution

    /// Resolve the constraint of `kind` for one item or an item pair
    pub fn eval_rules_for_items(
        &self,
        kind: ConstraintType,
        a: &BoardItem,
        b: Option<&BoardItem>,
        layer: Option<Layer>,
    ) -> Constraint {
        self.rule_set().resolve(kind, a, b, layer, None)
    }

    /// Like [`eval_rules_for_items`](Self::eval_rules_for_items), explaining
    /// each rule considered to `trace`
    pub fn eval_rules_for_items_traced(
        &self,
        kind: ConstraintType,
        a: &BoardItem,
        b: Option<&BoardItem>,
        layer: Option<Layer>,
        trace: &dyn Reporter,
    ) -> Constraint {
        self.rule_set().resolve(kind, a, b, layer, Some(trace))
    }

    pub fn query_constraints_by_id(&self, kind: ConstraintType) -> Vec<Constraint> {
        self.rule_set().constraints(kind)
    }

    pub fn has_rules_for_constraint_type(&self, kind: ConstraintType) -> bool {
        self.rule_set().has_rules(kind)
    }

    /// Constraint of `kind` with the largest minimum across all rules
    pub fn query_worst_constraint(&self, kind: ConstraintType) -> Option<Constraint> {
        self.rule_set().worst_constraint(kind)
    }

    // -----------------------------------------------------------------------
    // Violation reporting

    pub fn set_error_limit(&self, limit: usize) {
        self.error_limit.store(limit, Ordering::Relaxed);
    }

    pub fn error_limit(&self) -> usize {
        self.error_limit.load(Ordering::Relaxed)
    }

    pub fn error_count(&self, code: ErrorCode) -> usize {
        self.error_counts[code.index()].load(Ordering::Relaxed)
    }

    pub fn is_error_limit_exceeded(&self, code: ErrorCode) -> bool {
        self.error_count(code) >= self.error_limit()
    }

    pub fn severity(&self, code: ErrorCode) -> Severity {
        self.rule_set().settings().severity(code)
    }

    /// Count a violation and pass it to the handler unless its severity is
    /// `Ignore` or its code is over the error limit
    pub fn report_violation(&self, mut item: DrcItem) {
        let code = item.error_code;
        let previous = self.error_counts[code.index()].fetch_add(1, Ordering::Relaxed);
        if previous >= self.error_limit() {
            return;
        }

        item.severity = self.severity(code);
        if item.severity == Severity::Ignore {
            return;
        }

        let handler = self.violation_handler.read().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(handler) = handler {
            let position = item.position;
            self.violations_reported.fetch_add(1, Ordering::Relaxed);
            handler(item, position);
        }
    }

    // -----------------------------------------------------------------------
    // Progress and cancellation

    /// Shared cancellation flag; setting it stops the current run at the next
    /// progress check or stage boundary. A flag set before a run starts stops
    /// that run before its first stage. It is cleared when a run ends.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Report progress every `delta` items; returns false once cancelled.
    /// During a run the fraction is scaled into the current stage's share
    /// of the whole run.
    pub fn report_progress(&self, done: usize, total: usize, delta: usize) -> bool {
        if self.is_cancelled() {
            return false;
        }
        if total > 0 && delta > 0 && done % delta == 0 {
            if let Some(progress) = self.progress() {
                let fraction = (done as f64 / total as f64).min(1.0);
                let stages = self.stage_total.load(Ordering::Relaxed);
                let overall = if stages > 0 {
                    (self.stage.load(Ordering::Relaxed) as f64 + fraction) / stages as f64
                } else {
                    fraction
                };
                progress.report_progress(overall);
            }
        }
        true
    }

    pub fn report_aux(&self, message: &str) {
        debug!("[DRC] {}", message);
        if let Some(progress) = self.progress() {
            progress.report_aux(message);
        }
    }

    // -----------------------------------------------------------------------
    // Running

    /// Run every enabled provider over `board`
    pub fn run_tests(&self, board: &Board, options: RunOptions) -> DrcResult<RunSummary> {
        match self.state() {
            EngineState::Uninitialized => return Err(DrcError::NotReady),
            EngineState::Compiling => return Err(DrcError::EngineBusy),
            EngineState::Running => return Err(DrcError::AlreadyRunning),
            EngineState::TornDown => return Err(DrcError::TornDown),
            EngineState::Ready => {}
        }
        if self
            .state
            .compare_exchange(
                EngineState::Ready as u8,
                EngineState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(DrcError::AlreadyRunning);
        }
        let _guard = RunGuard {
            state: &self.state,
            cancel: self.cancel.as_ref(),
            stage: &self.stage,
            stage_total: &self.stage_total,
        };

        let start = Instant::now();
        self.violations_reported.store(0, Ordering::Relaxed);
        for count in &self.error_counts {
            count.store(0, Ordering::Relaxed);
        }

        let enabled: Vec<Box<dyn TestProvider>> = providers::all()
            .into_iter()
            .filter(|p| p.is_enabled(self, board, &options))
            .collect();
        let total = enabled.len();
        info!(
            "[DRC] Running {} of {} providers on {} items",
            total,
            providers::all().len(),
            board.items.len()
        );

        let progress = self.progress();
        let mut status = RunStatus::Completed;
        let mut completed = 0;

        self.stage_total.store(total, Ordering::Relaxed);
        for (index, provider) in enabled.iter().enumerate() {
            if self.is_cancelled() {
                status = RunStatus::Cancelled;
                break;
            }
            self.stage.store(index, Ordering::Relaxed);
            if let Some(progress) = &progress {
                progress.report_stage(provider.name(), index, total);
            }
            let stage_start = Instant::now();
            let keep_going = provider.run(self, board, &options);
            self.report_aux(&format!("{} took {:?}", provider.name(), stage_start.elapsed()));

            if !keep_going || self.is_cancelled() {
                status = RunStatus::Cancelled;
                break;
            }
            completed += 1;
        }

        let error_counts: Vec<(ErrorCode, usize)> = ErrorCode::ALL
            .iter()
            .map(|code| (*code, self.error_count(*code)))
            .filter(|(_, n)| *n > 0)
            .collect();
        let summary = RunSummary {
            status,
            stages_completed: completed,
            stages_total: total,
            violations_reported: self.violations_reported.load(Ordering::Relaxed),
            error_counts,
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        };

        info!(
            "[DRC] Run {:?}: {}/{} stages, {} violations reported in {:.1}ms",
            summary.status,
            summary.stages_completed,
            summary.stages_total,
            summary.violations_reported,
            summary.elapsed_ms
        );
        Ok(summary)
    }

    /// Stop any run and refuse further work
    pub fn teardown(&self) {
        self.cancel();
        self.state.store(EngineState::TornDown as u8, Ordering::Release);
        self.set_violation_handler(None);
        self.set_progress_reporter(None);
        self.set_log_reporter(None);
        info!("[DRC] Engine torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drc::reporter::CollectingReporter;

    #[test]
    fn test_lifecycle() {
        let engine = DrcEngine::new();
        assert_eq!(engine.state(), EngineState::Uninitialized);
        let board = Board::default();
        assert_eq!(engine.run_tests(&board, RunOptions::default()), Err(DrcError::NotReady));

        // Failed first compile stays uninitialized
        let log = Arc::new(CollectingReporter::new());
        engine.set_log_reporter(Some(log.clone()));
        assert!(engine.compile_rules("(rule", &DesignSettings::default()).is_err());
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert_eq!(log.lines().len(), 1);

        engine.compile_rules("", &DesignSettings::default()).expect("compiles");
        assert_eq!(engine.state(), EngineState::Ready);

        let summary = engine.run_tests(&board, RunOptions::default()).expect("runs");
        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(engine.state(), EngineState::Ready);

        engine.teardown();
        assert_eq!(engine.state(), EngineState::TornDown);
        assert_eq!(
            engine.compile_rules("", &DesignSettings::default()),
            Err(DrcError::TornDown)
        );
    }

    #[test]
    fn test_failed_recompile_keeps_previous_rules() {
        let engine = DrcEngine::new();
        let rules = r#"(rule "wide" (constraint track_width (min 1mm)))"#;
        engine.compile_rules(rules, &DesignSettings::default()).expect("compiles");
        let err = engine.compile_rules("(rule \"broken\"", &DesignSettings::default());
        assert!(matches!(err, Err(DrcError::Parse(_))));
        assert_eq!(engine.state(), EngineState::Ready);
        let worst = engine.query_worst_constraint(ConstraintType::TrackWidth).expect("rule kept");
        assert_eq!(worst.source, "wide");
    }

    #[test]
    fn test_error_limit_counts_past_cap() {
        let engine = DrcEngine::new();
        engine.compile_rules("", &DesignSettings::default()).expect("compiles");
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        engine.set_violation_handler(Some(Arc::new(move |_: DrcItem, _: crate::board::Point| {
            counter.fetch_add(1, Ordering::Relaxed);
        })));
        engine.set_error_limit(2);

        for _ in 0..5 {
            engine.report_violation(DrcItem::new(ErrorCode::Clearance, vec![1, 2], Default::default()));
        }
        assert_eq!(seen.load(Ordering::Relaxed), 2);
        assert_eq!(engine.error_count(ErrorCode::Clearance), 5);
        assert!(engine.is_error_limit_exceeded(ErrorCode::Clearance));
        assert!(!engine.is_error_limit_exceeded(ErrorCode::TrackWidth));
    }

    #[test]
    fn test_cancel_before_start_is_kept() {
        let engine = DrcEngine::new();
        engine.compile_rules("", &DesignSettings::default()).expect("compiles");
        let board = Board::default();

        engine.cancel();
        let summary = engine.run_tests(&board, RunOptions::default()).expect("runs");
        assert_eq!(summary.status, RunStatus::Cancelled);
        assert_eq!(summary.stages_completed, 0);
        assert!(!engine.is_cancelled());

        let summary = engine.run_tests(&board, RunOptions::default()).expect("runs again");
        assert_eq!(summary.status, RunStatus::Completed);
    }
}
