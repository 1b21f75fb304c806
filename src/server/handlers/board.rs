//! Board and rule handlers: LoadBoard, CompileRules

use super::super::parse_params;
use crate::board::Board;
use crate::drc::DesignSettings;
use crate::server::protocol::{error_codes, Response};
use crate::server::state::ServerState;
use anyhow::Context;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Handle LoadBoard request - load a board from a JSON file or inline JSON
pub fn handle_load_board(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct LoadBoardParams {
        #[serde(default)]
        file_path: Option<String>,
        #[serde(default)]
        board: Option<Board>,
    }

    let params: LoadBoardParams = match parse_params(params) {
        Ok(p) => p,
        Err(message) => return Response::error(id, error_codes::INVALID_PARAMS, message),
    };

    if state.run_in_progress {
        return Response::error(id, error_codes::DRC_RUNNING, "DRC is running. Cancel it first.".to_string());
    }

    let board = match (params.board, &params.file_path) {
        (Some(board), _) => board,
        (None, Some(path)) => match Board::from_json_file(path) {
            Ok(board) => board,
            Err(e) => return Response::error(id, error_codes::LOAD_FAILED, format!("{:#}", e)),
        },
        (None, None) => {
            return Response::error(
                id,
                error_codes::INVALID_PARAMS,
                "Either file_path or board is required".to_string(),
            )
        }
    };

    let item_count = board.items.len();
    let net_classes = board.design_settings.net_classes.len();
    info!("[DRC Server] Loaded board with {} items, {} net classes", item_count, net_classes);

    state.board_path = params.file_path;
    state.board = Some(Arc::new(board));
    state.violations.clear();
    state.last_summary = None;

    Response::success(id, serde_json::json!({
        "status": "ok",
        "item_count": item_count,
        "net_class_count": net_classes
    }))
}

/// Handle CompileRules request - compile rule text against the board settings
pub fn handle_compile_rules(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct CompileRulesParams {
        #[serde(default)]
        rules: Option<String>,
        #[serde(default)]
        file_path: Option<String>,
        #[serde(default)]
        settings: Option<DesignSettings>,
    }

    let params: CompileRulesParams = match parse_params(params) {
        Ok(p) => p,
        Err(message) => return Response::error(id, error_codes::INVALID_PARAMS, message),
    };

    let text = match (params.rules, params.file_path) {
        (Some(text), _) => text,
        (None, Some(path)) => {
            match std::fs::read_to_string(&path).with_context(|| format!("Failed to open rules file {}", path)) {
                Ok(text) => text,
                Err(e) => return Response::error(id, error_codes::LOAD_FAILED, format!("{:#}", e)),
            }
        }
        // No rules: implicit rules from the design settings only
        (None, None) => String::new(),
    };

    let settings = params
        .settings
        .or_else(|| state.board.as_ref().map(|b| b.design_settings.clone()))
        .unwrap_or_default();

    state.compile_log.clear();
    match state.engine.compile_rules(&text, &settings) {
        Ok(()) => {
            let rule_count = state.engine.rule_set().rules().len();
            Response::success(id, serde_json::json!({
                "status": "ok",
                "rule_count": rule_count,
                "warnings": state.compile_log.lines()
            }))
        }
        Err(e) => Response::engine_error(id, &e),
    }
}
