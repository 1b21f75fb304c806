//! Constraint query handlers: EvalConstraint, QueryConstraints

use super::super::parse_params;
use crate::board::Layer;
use crate::drc::{CollectingReporter, ConstraintType};
use crate::server::protocol::{error_codes, Response};
use crate::server::state::ServerState;
use serde::Deserialize;

/// Handle EvalConstraint request - resolve the effective constraint for an item
/// or item pair, optionally with a trace of every rule considered
pub fn handle_eval_constraint(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct EvalParams {
        constraint: ConstraintType,
        a: u64,
        #[serde(default)]
        b: Option<u64>,
        #[serde(default)]
        layer: Option<Layer>,
        #[serde(default)]
        trace: bool,
    }

    let params: EvalParams = match parse_params(params) {
        Ok(p) => p,
        Err(message) => return Response::error(id, error_codes::INVALID_PARAMS, message),
    };

    let board = match &state.board {
        Some(board) => board,
        None => {
            return Response::error(id, error_codes::NO_BOARD_LOADED,
                "No board loaded. Call LoadBoard first.".to_string())
        }
    };

    let a = match board.item(params.a) {
        Some(item) => item,
        None => return Response::error(id, error_codes::ITEM_NOT_FOUND, format!("Item not found: {}", params.a)),
    };
    let b = match params.b {
        Some(b_id) => match board.item(b_id) {
            Some(item) => Some(item),
            None => return Response::error(id, error_codes::ITEM_NOT_FOUND, format!("Item not found: {}", b_id)),
        },
        None => None,
    };

    let (constraint, trace) = if params.trace {
        let reporter = CollectingReporter::new();
        let c = state.engine.eval_rules_for_items_traced(params.constraint, a, b, params.layer, &reporter);
        (c, reporter.lines())
    } else {
        (state.engine.eval_rules_for_items(params.constraint, a, b, params.layer), Vec::new())
    };

    Response::success(id, serde_json::json!({
        "constraint": constraint,
        "trace": trace
    }))
}

/// Handle QueryConstraints request - every constraint of one type, in precedence order
pub fn handle_query_constraints(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct QueryParams {
        constraint: ConstraintType,
    }

    let params: QueryParams = match parse_params(params) {
        Ok(p) => p,
        Err(message) => return Response::error(id, error_codes::INVALID_PARAMS, message),
    };

    let engine = &state.engine;
    Response::success(id, serde_json::json!({
        "has_rules": engine.has_rules_for_constraint_type(params.constraint),
        "worst": engine.query_worst_constraint(params.constraint),
        "constraints": engine.query_constraints_by_id(params.constraint)
    }))
}

/// Handle GetStatus request - engine state and error counters
pub fn handle_get_status(state: &ServerState, id: Option<serde_json::Value>) -> Response {
    let rule_set = state.engine.rule_set();
    Response::success(id, serde_json::json!({
        "engine_state": state.engine.state(),
        "board_loaded": state.is_board_loaded(),
        "board_path": &state.board_path,
        "rule_count": rule_set.rules().len(),
        "error_limit": state.engine.error_limit(),
        "run_in_progress": state.run_in_progress
    }))
}
