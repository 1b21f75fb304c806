//! Host-facing reporting interfaces
//!
//! The engine never owns UI: progress, stage changes, log lines and
//! violations are pushed through these traits to whatever the host installs.

use super::types::DrcItem;
use crate::board::Point;
use std::sync::{Arc, Mutex, PoisonError};

/// Receives progress of a DRC run; all methods are optional
pub trait ProgressReporter: Send + Sync {
    /// Overall completion of the run, 0.0 to 1.0
    fn report_progress(&self, _fraction: f64) {}

    /// A provider stage is starting
    fn report_stage(&self, _name: &str, _index: usize, _total: usize) {}

    /// Auxiliary log line, e.g. per-provider timings
    fn report_aux(&self, _message: &str) {}
}

/// Sink for compile diagnostics and resolution traces
pub trait Reporter: Send + Sync {
    fn report(&self, message: &str);
}

/// Called once per reported violation with its marker position
pub type ViolationHandler = Arc<dyn Fn(DrcItem, Point) + Send + Sync>;

/// Reporter that keeps every line, for hosts that display them later
#[derive(Debug, Default)]
pub struct CollectingReporter {
    lines: Mutex<Vec<String>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Reporter for CollectingReporter {
    fn report(&self, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}
