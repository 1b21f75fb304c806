//! DRC error types

use thiserror::Error;

/// Malformed rule text, with the 1-based position it was found at
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self { line, column, message: message.into() }
    }
}

/// Engine-level failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DrcError {
    #[error("rule compilation failed: {0}")]
    Parse(#[from] ParseError),
    #[error("DRC engine has no compiled rules")]
    NotReady,
    #[error("DRC run already in progress")]
    AlreadyRunning,
    #[error("cannot recompile rules while a DRC run is in progress")]
    EngineBusy,
    #[error("DRC engine has been torn down")]
    TornDown,
}

pub type DrcResult<T> = Result<T, DrcError>;
