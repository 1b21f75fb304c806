//! Rule-based design rule check engine for printed circuit boards
//!
//! # Module Structure
//! - `board` - Board items, layers and spatial indexing
//! - `drc` - Rule language, constraint resolution and test providers
//! - `server` - Line-delimited JSON-RPC host around a single engine
//!
//! # Example
//! ```ignore
//! let engine = DrcEngine::new();
//! engine.compile_rules(&std::fs::read_to_string("board.rules")?, &board.design_settings)?;
//! let clearance = engine.eval_rules_for_items(ConstraintType::Clearance, &a, Some(&b), None);
//! println!("{} from {}", clearance.min_or_zero(), clearance.source);
//! ```

pub mod board;
pub mod drc;
pub mod server;

pub use board::{Board, BoardItem, Layer, LayerSet};
pub use drc::{ConstraintType, DrcEngine, DrcItem, ErrorCode, RunOptions};
