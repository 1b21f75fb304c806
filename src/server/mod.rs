//! Line-delimited JSON-RPC host for the DRC engine
//!
//! One request per line on stdin, one response per line on stdout. DRC runs
//! happen on a background thread; completion is pushed as a `drcComplete`
//! notification.

pub mod handlers;
pub mod protocol;
pub mod state;

pub use protocol::{error_codes, Request, Response};
pub use state::{DrcAsyncResult, ServerState};

use serde::de::DeserializeOwned;
use std::sync::mpsc::Sender;

/// Deserialize request params; missing params read as an empty object
pub(crate) fn parse_params<T: DeserializeOwned>(params: Option<serde_json::Value>) -> Result<T, String> {
    let value = params.unwrap_or_else(|| serde_json::json!({}));
    serde_json::from_value(value).map_err(|e| format!("Invalid params: {}", e))
}

/// Route a request to its handler
pub fn dispatch(state: &mut ServerState, request: Request, tx: &Sender<DrcAsyncResult>) -> Response {
    let Request { id, method, params } = request;
    match method.as_str() {
        "LoadBoard" => handlers::handle_load_board(state, id, params),
        "CompileRules" => handlers::handle_compile_rules(state, id, params),
        "RunDRC" => handlers::handle_run_drc_async(state, id, params, tx),
        "CancelDRC" => handlers::handle_cancel_drc(state, id),
        "GetViolations" => handlers::handle_get_violations(state, id),
        "EvalConstraint" => handlers::handle_eval_constraint(state, id, params),
        "QueryConstraints" => handlers::handle_query_constraints(state, id, params),
        "GetStatus" => handlers::handle_get_status(state, id),
        _ => Response::error(id, error_codes::METHOD_NOT_FOUND, format!("Method not found: {}", method)),
    }
}
