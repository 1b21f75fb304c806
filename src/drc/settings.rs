//! Legacy design settings
//!
//! Flat board minimums and per net-class values, stored with older projects.
//! The rule compiler turns these into implicit rules; severities decide which
//! violations reach the host.

use super::types::{ErrorCode, Severity};
use crate::board::DEFAULT_NET_CLASS;
use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-code violation cap used when settings do not override it
pub const DEFAULT_ERROR_LIMIT: usize = 199;

/// Per net-class routing values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetClass {
    pub name: String,
    pub clearance: f64,
    pub track_width: f64,
    pub via_diameter: f64,
    pub via_drill: f64,
    pub microvia_diameter: f64,
    pub microvia_drill: f64,
}

impl Default for NetClass {
    fn default() -> Self {
        Self {
            name: DEFAULT_NET_CLASS.to_string(),
            clearance: 0.2,
            track_width: 0.25,
            via_diameter: 0.8,
            via_drill: 0.4,
            microvia_diameter: 0.3,
            microvia_drill: 0.1,
        }
    }
}

impl NetClass {
    pub fn named(name: &str, clearance: f64) -> Self {
        Self { name: name.to_string(), clearance, ..Default::default() }
    }
}

/// Board design settings: baseline minimums, net classes and severities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignSettings {
    pub min_clearance: f64,
    pub min_track_width: f64,
    pub min_via_diameter: f64,
    pub min_via_annular_width: f64,
    pub min_through_hole: f64,
    pub min_microvia_diameter: f64,
    pub min_microvia_drill: f64,
    pub min_hole_to_hole: f64,
    pub min_hole_clearance: f64,
    pub min_courtyard_clearance: f64,
    pub net_classes: Vec<NetClass>,
    /// Violations reported per error code before further ones are dropped
    pub error_limit: usize,
    /// Overrides of the per-code default severity
    pub severities: IndexMap<ErrorCode, Severity>,
}

impl Default for DesignSettings {
    fn default() -> Self {
        Self {
            min_clearance: 0.0,
            min_track_width: 0.0,
            min_via_diameter: 0.4,
            min_via_annular_width: 0.05,
            min_through_hole: 0.3,
            min_microvia_diameter: 0.2,
            min_microvia_drill: 0.1,
            min_hole_to_hole: 0.25,
            min_hole_clearance: 0.25,
            min_courtyard_clearance: 0.0,
            net_classes: vec![NetClass::default()],
            error_limit: DEFAULT_ERROR_LIMIT,
            severities: IndexMap::new(),
        }
    }
}

impl DesignSettings {
    /// Load settings from a JSON file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<DesignSettings> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to open settings file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    pub fn severity(&self, code: ErrorCode) -> Severity {
        self.severities
            .get(&code)
            .copied()
            .unwrap_or_else(|| code.default_severity())
    }

    pub fn set_severity(&mut self, code: ErrorCode, severity: Severity) {
        self.severities.insert(code, severity);
    }

    pub fn net_class(&self, name: &str) -> Option<&NetClass> {
        self.net_classes.iter().find(|nc| nc.name.eq_ignore_ascii_case(name))
    }

    pub fn has_net_class(&self, name: &str) -> bool {
        self.net_class(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "min_clearance": 0.15,
            "net_classes": [ { "name": "Power", "clearance": 0.4 } ],
            "severities": { "courtyards_overlap": "ignore", "track_width": "warning" }
        }"#;
        let parsed: Result<DesignSettings, _> = serde_json::from_str(json);
        // Unknown error code keys are rejected
        assert!(parsed.is_err());

        let json = r#"{
            "min_clearance": 0.15,
            "net_classes": [ { "name": "Power", "clearance": 0.4 } ],
            "severities": { "track_width": "warning" }
        }"#;
        let settings: DesignSettings = serde_json::from_str(json).expect("valid settings");
        assert_eq!(settings.min_clearance, 0.15);
        assert_eq!(settings.min_through_hole, 0.3);
        assert_eq!(settings.error_limit, DEFAULT_ERROR_LIMIT);
        let power = settings.net_class("power").expect("power class");
        assert_eq!(power.clearance, 0.4);
        assert_eq!(power.track_width, 0.25);
        assert_eq!(settings.severity(ErrorCode::TrackWidth), Severity::Warning);
        assert_eq!(settings.severity(ErrorCode::Clearance), Severity::Error);
    }
}
