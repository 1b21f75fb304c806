//! Request handlers for the DRC server
//!
//! Organized by functionality:
//! - `board` - LoadBoard, CompileRules
//! - `drc` - RunDRC, CancelDRC, GetViolations
//! - `query` - EvalConstraint, QueryConstraints, GetStatus

mod board;
mod drc;
mod query;

pub use board::{handle_compile_rules, handle_load_board};
pub use drc::{
    drc_complete_notification, handle_cancel_drc, handle_get_violations, handle_run_drc_async,
    summary_line,
};
pub use query::{handle_eval_constraint, handle_get_status, handle_query_constraints};
