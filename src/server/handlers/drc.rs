//! DRC handlers: RunDRC, CancelDRC, GetViolations

use super::super::parse_params;
use crate::board::Point;
use crate::drc::{DrcItem, EngineState, RunOptions, RunSummary};
use crate::server::protocol::{error_codes, Response};
use crate::server::state::{DrcAsyncResult, ServerState};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tracing::info;

/// Handle RunDRC request - runs every enabled provider in the background.
/// The result arrives on `tx` and is announced with a `drcComplete` notification.
pub fn handle_run_drc_async(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
    tx: &Sender<DrcAsyncResult>,
) -> Response {
    let options: RunOptions = match parse_params(params) {
        Ok(p) => p,
        Err(message) => return Response::error(id, error_codes::INVALID_PARAMS, message),
    };

    let board = match &state.board {
        Some(board) => board.clone(),
        None => {
            return Response::error(id, error_codes::NO_BOARD_LOADED,
                "No board loaded. Call LoadBoard first.".to_string())
        }
    };
    if state.run_in_progress {
        return Response::error(id, error_codes::DRC_RUNNING, "DRC is already running".to_string());
    }
    if state.engine.state() != EngineState::Ready {
        return Response::error(id, error_codes::ENGINE_NOT_READY,
            "No rules compiled. Call CompileRules first.".to_string());
    }

    // Violations are collected per run and shipped back with the summary
    let collected: Arc<Mutex<Vec<DrcItem>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = collected.clone();
    state.engine.set_violation_handler(Some(Arc::new(move |item: DrcItem, _at: Point| {
        sink.lock().unwrap_or_else(PoisonError::into_inner).push(item);
    })));

    info!("[DRC Server] Starting DRC on {} items ({:?})", board.items.len(), options);

    let engine = state.engine.clone();
    let tx = tx.clone();
    thread::spawn(move || {
        let summary = engine.run_tests(&board, options);
        let violations = std::mem::take(&mut *collected.lock().unwrap_or_else(PoisonError::into_inner));
        let _ = tx.send(DrcAsyncResult { summary, violations });
    });
    state.run_in_progress = true;

    Response::success(id, serde_json::json!({
        "status": "started",
        "message": "DRC running in background"
    }))
}

/// Handle CancelDRC request - stops the running DRC at its next check
pub fn handle_cancel_drc(state: &ServerState, id: Option<serde_json::Value>) -> Response {
    if !state.run_in_progress {
        return Response::success(id, serde_json::json!({ "status": "idle" }));
    }
    state.engine.cancel();
    info!("[DRC Server] Cancellation requested");
    Response::success(id, serde_json::json!({ "status": "cancelling" }))
}

/// Handle GetViolations request - returns violations of the last finished run
pub fn handle_get_violations(state: &ServerState, id: Option<serde_json::Value>) -> Response {
    Response::success(id, serde_json::json!({
        "running": state.run_in_progress,
        "summary": &state.last_summary,
        "violations": &state.violations
    }))
}

/// Notification sent when a background run finishes
pub fn drc_complete_notification(result: &DrcAsyncResult) -> serde_json::Value {
    match &result.summary {
        Ok(summary) => serde_json::json!({
            "id": null,
            "method": "drcComplete",
            "result": {
                "status": summary.status,
                "summary": summary,
                "violation_count": result.violations.len()
            }
        }),
        Err(e) => serde_json::json!({
            "id": null,
            "method": "drcComplete",
            "error": { "code": error_codes::for_engine_error(e), "message": e.to_string() }
        }),
    }
}

/// One-line description of a finished run, for logging
pub fn summary_line(summary: &RunSummary) -> String {
    format!(
        "{:?}: {} violations, {}/{} stages in {:.2}ms",
        summary.status,
        summary.violations_reported,
        summary.stages_completed,
        summary.stages_total,
        summary.elapsed_ms
    )
}
