//! Server state management for the DRC server

use crate::board::Board;
use crate::drc::{CollectingReporter, DrcEngine, DrcError, DrcItem, RunSummary};
use std::sync::Arc;

/// In-memory state: the loaded board, the engine and the last run's results
pub struct ServerState {
    pub board_path: Option<String>,
    pub board: Option<Arc<Board>>,
    pub engine: Arc<DrcEngine>,
    /// Compile diagnostics from the last `CompileRules`
    pub compile_log: Arc<CollectingReporter>,
    pub violations: Vec<DrcItem>,
    pub last_summary: Option<RunSummary>,
    pub run_in_progress: bool,
}

impl ServerState {
    pub fn new() -> Self {
        let engine = Arc::new(DrcEngine::new());
        let compile_log = Arc::new(CollectingReporter::new());
        engine.set_log_reporter(Some(compile_log.clone()));
        Self {
            board_path: None,
            board: None,
            engine,
            compile_log,
            violations: Vec::new(),
            last_summary: None,
            run_in_progress: false,
        }
    }

    /// Check if a board is loaded
    pub fn is_board_loaded(&self) -> bool {
        self.board.is_some()
    }

    /// Store the outcome of a background run
    pub fn apply_result(&mut self, result: DrcAsyncResult) {
        self.run_in_progress = false;
        self.violations = result.violations;
        if let Ok(summary) = result.summary {
            self.last_summary = Some(summary);
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Result from a background DRC run
pub struct DrcAsyncResult {
    pub summary: Result<RunSummary, DrcError>,
    pub violations: Vec<DrcItem>,
}
