// JSON-RPC dispatch against an in-process server state
use drc_engine::server::{dispatch, error_codes, DrcAsyncResult, Request, Response, ServerState};
use serde_json::json;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, params: serde_json::Value) -> Request {
        serde_json::from_value(json!({ "id": 1, "method": method, "params": params }))
            .expect("valid request")
    }

    fn call(state: &mut ServerState, tx: &Sender<DrcAsyncResult>, method: &str, params: serde_json::Value) -> Response {
        dispatch(state, request(method, params), tx)
    }

    fn result(response: &Response) -> &serde_json::Value {
        assert!(response.error.is_none(), "unexpected error: {:?}", response.error);
        response.result.as_ref().expect("result present")
    }

    fn loaded_state() -> (ServerState, Sender<DrcAsyncResult>, Receiver<DrcAsyncResult>) {
        let (tx, rx) = mpsc::channel();
        let mut state = ServerState::new();
        let response = call(&mut state, &tx, "LoadBoard", json!({ "file_path": "tests/fixtures/power_signal.json" }));
        assert_eq!(result(&response)["item_count"], 4);
        (state, tx, rx)
    }

    #[test]
    fn test_unknown_method() {
        let (tx, _rx) = mpsc::channel();
        let mut state = ServerState::new();
        let response = call(&mut state, &tx, "Frobnicate", json!({}));
        assert_eq!(response.error.as_ref().map(|e| e.code), Some(error_codes::METHOD_NOT_FOUND));
    }

    #[test]
    fn test_run_requires_board_and_rules() {
        let (tx, _rx) = mpsc::channel();
        let mut state = ServerState::new();
        let response = call(&mut state, &tx, "RunDRC", json!({}));
        assert_eq!(response.error.as_ref().map(|e| e.code), Some(error_codes::NO_BOARD_LOADED));

        let (mut state, tx, _rx) = loaded_state();
        let response = call(&mut state, &tx, "RunDRC", json!({}));
        assert_eq!(response.error.as_ref().map(|e| e.code), Some(error_codes::ENGINE_NOT_READY));
    }

    #[test]
    fn test_compile_error_reports_position() {
        let (mut state, tx, _rx) = loaded_state();
        let response = call(
            &mut state,
            &tx,
            "CompileRules",
            json!({ "rules": "(rule \"x\"\n    (condition \"A.Bogus == 1\")\n    (constraint clearance (min 1)))" }),
        );
        let error = response.error.as_ref().expect("compile fails");
        assert_eq!(error.code, error_codes::RULE_PARSE_FAILED);
        assert!(error.message.contains("line 2"), "message: {}", error.message);
    }

    #[test]
    fn test_compile_warns_about_unknown_net_class() {
        let (mut state, tx, _rx) = loaded_state();
        let response = call(
            &mut state,
            &tx,
            "CompileRules",
            json!({ "rules": "(rule \"ghost\" (condition \"A.NetClass == 'Ghost'\") (constraint clearance (min 1)))" }),
        );
        let warnings = result(&response)["warnings"].as_array().expect("warnings array").clone();
        assert!(warnings.iter().any(|w| w.as_str().unwrap_or("").contains("Ghost")));
    }

    #[test]
    fn test_eval_constraint_with_trace() {
        let (mut state, tx, _rx) = loaded_state();
        result(&call(&mut state, &tx, "CompileRules", json!({ "file_path": "tests/fixtures/board.rules" })));

        let response = call(
            &mut state,
            &tx,
            "EvalConstraint",
            json!({ "constraint": "clearance", "a": 2, "b": 3, "layer": "F.Cu", "trace": true }),
        );
        let value = result(&response);
        assert_eq!(value["constraint"]["source"], "tight signals");
        assert_eq!(value["constraint"]["value"]["min"], 0.25);
        assert!(!value["trace"].as_array().expect("trace lines").is_empty());

        let response = call(&mut state, &tx, "EvalConstraint", json!({ "constraint": "clearance", "a": 99 }));
        assert_eq!(response.error.as_ref().map(|e| e.code), Some(error_codes::ITEM_NOT_FOUND));

        let response = call(&mut state, &tx, "QueryConstraints", json!({ "constraint": "clearance" }));
        let value = result(&response);
        assert_eq!(value["has_rules"], true);
        assert_eq!(value["worst"]["value"]["min"], 0.6);
    }

    #[test]
    fn test_async_run_delivers_violations() {
        let (mut state, tx, rx) = loaded_state();
        result(&call(&mut state, &tx, "CompileRules", json!({})));

        let response = call(&mut state, &tx, "RunDRC", json!({ "test_footprints": false }));
        assert_eq!(result(&response)["status"], "started");
        assert!(state.run_in_progress);

        let second = call(&mut state, &tx, "RunDRC", json!({}));
        assert_eq!(second.error.as_ref().map(|e| e.code), Some(error_codes::DRC_RUNNING));

        let finished = rx.recv_timeout(Duration::from_secs(30)).expect("run finishes");
        state.apply_result(finished);
        assert!(!state.run_in_progress);

        let response = call(&mut state, &tx, "GetViolations", json!({}));
        let value = result(&response);
        let violations = value["violations"].as_array().expect("violations array");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0]["error_code"], "clearance");
        assert_eq!(value["summary"]["status"], "completed");
    }
}
