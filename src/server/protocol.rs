//! Wire types for the DRC server: one JSON object per line in each direction

use crate::drc::DrcError;
use serde::{Deserialize, Serialize};

/// Host request. `params` may be omitted for methods without arguments.
#[derive(Debug, Deserialize)]
pub struct Request {
    pub id: Option<serde_json::Value>,
    pub method: String,
    pub params: Option<serde_json::Value>,
}

/// Reply to a request; exactly one of `result` and `error` is set
#[derive(Debug, Serialize)]
pub struct Response {
    pub id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: i32,
    pub message: String,
}

impl Response {
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Response { id, result: Some(result), error: None }
    }

    pub fn error(id: Option<serde_json::Value>, code: i32, message: String) -> Self {
        Response { id, result: None, error: Some(ErrorResponse { code, message }) }
    }

    /// Error reply for an engine failure, coded by its kind
    pub fn engine_error(id: Option<serde_json::Value>, error: &DrcError) -> Self {
        Self::error(id, error_codes::for_engine_error(error), error.to_string())
    }
}

pub mod error_codes {
    use crate::drc::DrcError;

    // JSON-RPC reserved codes
    pub const PARSE_ERROR: i32 = -32700;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub const NO_BOARD_LOADED: i32 = 2;
    pub const ITEM_NOT_FOUND: i32 = 3;
    pub const LOAD_FAILED: i32 = 4;
    pub const RULE_PARSE_FAILED: i32 = 5;
    pub const ENGINE_NOT_READY: i32 = 6;
    pub const DRC_RUNNING: i32 = 7;

    pub fn for_engine_error(error: &DrcError) -> i32 {
        match error {
            DrcError::Parse(_) => RULE_PARSE_FAILED,
            DrcError::NotReady => ENGINE_NOT_READY,
            DrcError::AlreadyRunning | DrcError::EngineBusy => DRC_RUNNING,
            DrcError::TornDown => INTERNAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_codes() {
        let busy = Response::engine_error(Some(serde_json::json!(4)), &DrcError::EngineBusy);
        let error = busy.error.as_ref().expect("error set");
        assert_eq!(error.code, error_codes::DRC_RUNNING);
        assert!(busy.result.is_none());

        let json = serde_json::to_value(&Response::engine_error(None, &DrcError::NotReady)).expect("serializes");
        assert_eq!(json["error"]["code"], error_codes::ENGINE_NOT_READY);
        assert!(json.get("result").is_none());
    }
}
