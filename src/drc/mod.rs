//! Design Rule Check (DRC) constraint engine
//!
//! Rules written in a small s-expression language are compiled into a
//! per-constraint-type index ordered by specificity. The engine resolves the
//! effective constraint for any item or item pair and runs test providers
//! that compare actual geometry against it.
//!
//! # Submodules
//! - `types` - Constraint types, values, error codes and violations
//! - `error` - Parse and engine errors
//! - `settings` - Legacy design settings and net classes
//! - `sexpr` - S-expression reader
//! - `condition` - Rule condition expressions
//! - `rule` - Rule model and rule file parsing
//! - `compiler` - Rule compilation and resolution
//! - `reporter` - Host reporting interfaces
//! - `distance` / `geometry` - Distance algorithms and item shapes
//! - `providers` - The individual checks
//! - `engine` - Lifecycle, resolution API and test orchestration

pub mod compiler;
pub mod condition;
pub mod distance;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod providers;
pub mod reporter;
pub mod rule;
pub mod settings;
pub mod sexpr;
pub mod types;

pub use compiler::{compile, RuleEntry, RuleSet};
pub use condition::Condition;
pub use engine::{DrcEngine, EngineState, RunOptions, RunStatus, RunSummary};
pub use error::{DrcError, DrcResult, ParseError};
pub use reporter::{CollectingReporter, ProgressReporter, Reporter, ViolationHandler};
pub use rule::{Rule, RuleId};
pub use settings::{DesignSettings, NetClass};
pub use types::{
    Constraint, ConstraintOrigin, ConstraintType, DrcItem, ErrorCode, MinOptMax, Severity,
};
