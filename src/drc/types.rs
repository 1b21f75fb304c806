//! DRC data types and structures
//!
//! Constraint types, constraint values, error codes, severities and the
//! violation record handed to the host.

use crate::board::{DisallowFlags, Layer, Point};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of design rule, queried independently of the others
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    Clearance,
    HoleClearance,
    HoleToHole,
    TrackWidth,
    ViaDiameter,
    AnnularWidth,
    HoleSize,
    CourtyardClearance,
    Keepout,
}

impl ConstraintType {
    pub const ALL: [ConstraintType; 9] = [
        ConstraintType::Clearance,
        ConstraintType::HoleClearance,
        ConstraintType::HoleToHole,
        ConstraintType::TrackWidth,
        ConstraintType::ViaDiameter,
        ConstraintType::AnnularWidth,
        ConstraintType::HoleSize,
        ConstraintType::CourtyardClearance,
        ConstraintType::Keepout,
    ];

    /// Keyword used in rule text
    pub fn keyword(&self) -> &'static str {
        match self {
            ConstraintType::Clearance => "clearance",
            ConstraintType::HoleClearance => "hole_clearance",
            ConstraintType::HoleToHole => "hole_to_hole",
            ConstraintType::TrackWidth => "track_width",
            ConstraintType::ViaDiameter => "via_diameter",
            ConstraintType::AnnularWidth => "annular_width",
            ConstraintType::HoleSize => "hole_size",
            ConstraintType::CourtyardClearance => "courtyard_clearance",
            ConstraintType::Keepout => "disallow",
        }
    }

    pub fn from_keyword(word: &str) -> Option<ConstraintType> {
        match word {
            "hole" => Some(ConstraintType::HoleSize),
            "keepout" => Some(ConstraintType::Keepout),
            _ => Self::ALL.iter().copied().find(|t| t.keyword() == word),
        }
    }

    /// Constraints whose minimum is a spacing and must not be negative
    pub fn is_spacing(&self) -> bool {
        matches!(
            self,
            ConstraintType::Clearance
                | ConstraintType::HoleClearance
                | ConstraintType::HoleToHole
                | ConstraintType::CourtyardClearance
        )
    }
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Min / opt / max range; any bound may be unset
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MinOptMax {
    pub min: Option<f64>,
    pub opt: Option<f64>,
    pub max: Option<f64>,
}

impl MinOptMax {
    pub fn min(value: f64) -> Self {
        Self { min: Some(value), ..Default::default() }
    }

    pub fn has_any(&self) -> bool {
        self.min.is_some() || self.opt.is_some() || self.max.is_some()
    }
}

/// Where a constraint came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintOrigin {
    /// Rule text written by the user
    Authored,
    /// Synthesized from legacy design settings
    Implicit,
    /// Hard-coded fallback when nothing else matched
    Default,
}

/// A typed constraint with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub kind: ConstraintType,
    pub value: MinOptMax,
    /// Disallowed item kinds (keepout constraints only)
    #[serde(default)]
    pub disallow: DisallowFlags,
    /// Name of the rule this constraint belongs to
    pub source: String,
    pub origin: ConstraintOrigin,
}

impl Constraint {
    pub fn new(kind: ConstraintType, value: MinOptMax, source: &str) -> Self {
        Self {
            kind,
            value,
            disallow: DisallowFlags::default(),
            source: source.to_string(),
            origin: ConstraintOrigin::Authored,
        }
    }

    /// Final fallback used when no rule matches
    pub fn fallback(kind: ConstraintType) -> Self {
        let value = if kind == ConstraintType::Keepout {
            MinOptMax::default()
        } else {
            MinOptMax::min(0.0)
        };
        Self {
            kind,
            value,
            disallow: DisallowFlags::default(),
            source: "default".to_string(),
            origin: ConstraintOrigin::Default,
        }
    }

    /// Check the value invariants for this constraint type
    pub fn validate(&self) -> Result<(), String> {
        if self.kind == ConstraintType::Keepout {
            if self.disallow.is_empty() {
                return Err("disallow constraint needs at least one item type".to_string());
            }
            return Ok(());
        }
        if !self.value.has_any() {
            return Err(format!("{} constraint needs a min, opt or max value", self.kind));
        }
        if self.kind.is_spacing() {
            match self.value.min {
                Some(min) if min < 0.0 => {
                    return Err(format!("{} minimum cannot be negative", self.kind))
                }
                None => return Err(format!("{} constraint needs a min value", self.kind)),
                _ => {}
            }
        }
        if let (Some(min), Some(max)) = (self.value.min, self.value.max) {
            if min > max {
                return Err(format!("{} minimum is larger than its maximum", self.kind));
            }
        }
        Ok(())
    }

    pub fn min_or_zero(&self) -> f64 {
        self.value.min.unwrap_or(0.0)
    }
}

/// Violation severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Ignore,
}

/// DRC error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    UnconnectedItems,
    ShortingItems,
    AllowedItems,
    Clearance,
    TracksCrossing,
    CopperEdgeClearance,
    ZonesIntersect,
    ZoneHasEmptyNet,
    DanglingVia,
    DanglingTrack,
    HoleClearance,
    DrilledHolesTooClose,
    TrackWidth,
    TooSmallVia,
    ViaAnnulus,
    TooSmallDrill,
    ViaHoleBigger,
    Padstack,
    TooSmallMicrovia,
    TooSmallMicroviaDrill,
    Keepout,
    OverlappingFootprints,
    MissingCourtyard,
    MalformedCourtyard,
    PthInCourtyard,
    NpthInCourtyard,
    DisabledLayerItem,
    InvalidOutline,
    MissingFootprint,
    DuplicateFootprint,
    ExtraFootprint,
    UnresolvedVariable,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 32] = [
        ErrorCode::UnconnectedItems,
        ErrorCode::ShortingItems,
        ErrorCode::AllowedItems,
        ErrorCode::Clearance,
        ErrorCode::TracksCrossing,
        ErrorCode::CopperEdgeClearance,
        ErrorCode::ZonesIntersect,
        ErrorCode::ZoneHasEmptyNet,
        ErrorCode::DanglingVia,
        ErrorCode::DanglingTrack,
        ErrorCode::HoleClearance,
        ErrorCode::DrilledHolesTooClose,
        ErrorCode::TrackWidth,
        ErrorCode::TooSmallVia,
        ErrorCode::ViaAnnulus,
        ErrorCode::TooSmallDrill,
        ErrorCode::ViaHoleBigger,
        ErrorCode::Padstack,
        ErrorCode::TooSmallMicrovia,
        ErrorCode::TooSmallMicroviaDrill,
        ErrorCode::Keepout,
        ErrorCode::OverlappingFootprints,
        ErrorCode::MissingCourtyard,
        ErrorCode::MalformedCourtyard,
        ErrorCode::PthInCourtyard,
        ErrorCode::NpthInCourtyard,
        ErrorCode::DisabledLayerItem,
        ErrorCode::InvalidOutline,
        ErrorCode::MissingFootprint,
        ErrorCode::DuplicateFootprint,
        ErrorCode::ExtraFootprint,
        ErrorCode::UnresolvedVariable,
    ];

    /// Dense index, used for per-code counters
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn title(&self) -> &'static str {
        match self {
            ErrorCode::UnconnectedItems => "Missing connection between items",
            ErrorCode::ShortingItems => "Items shorting two nets",
            ErrorCode::AllowedItems => "Items not allowed",
            ErrorCode::Clearance => "Clearance violation",
            ErrorCode::TracksCrossing => "Tracks crossing",
            ErrorCode::CopperEdgeClearance => "Board edge clearance violation",
            ErrorCode::ZonesIntersect => "Copper areas intersect",
            ErrorCode::ZoneHasEmptyNet => "Copper zone net has no pads",
            ErrorCode::DanglingVia => "Via is not connected",
            ErrorCode::DanglingTrack => "Track has unconnected end",
            ErrorCode::HoleClearance => "Hole clearance violation",
            ErrorCode::DrilledHolesTooClose => "Drilled holes too close together",
            ErrorCode::TrackWidth => "Track width",
            ErrorCode::TooSmallVia => "Via size too small",
            ErrorCode::ViaAnnulus => "Via annulus",
            ErrorCode::TooSmallDrill => "Drill too small",
            ErrorCode::ViaHoleBigger => "Via hole larger than diameter",
            ErrorCode::Padstack => "Padstack is not valid",
            ErrorCode::TooSmallMicrovia => "Micro via size too small",
            ErrorCode::TooSmallMicroviaDrill => "Micro via drill too small",
            ErrorCode::Keepout => "Keepout violation",
            ErrorCode::OverlappingFootprints => "Courtyards overlap",
            ErrorCode::MissingCourtyard => "Footprint has no courtyard defined",
            ErrorCode::MalformedCourtyard => "Footprint has malformed courtyard",
            ErrorCode::PthInCourtyard => "PTH inside courtyard",
            ErrorCode::NpthInCourtyard => "NPTH inside courtyard",
            ErrorCode::DisabledLayerItem => "Item on a disabled layer",
            ErrorCode::InvalidOutline => "Board has malformed outline",
            ErrorCode::MissingFootprint => "Missing footprint",
            ErrorCode::DuplicateFootprint => "Duplicate footprints",
            ErrorCode::ExtraFootprint => "Extra footprint",
            ErrorCode::UnresolvedVariable => "Unresolved text variable",
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            ErrorCode::ZoneHasEmptyNet
            | ErrorCode::DanglingVia
            | ErrorCode::DanglingTrack
            | ErrorCode::MissingCourtyard
            | ErrorCode::PthInCourtyard
            | ErrorCode::NpthInCourtyard
            | ErrorCode::ExtraFootprint
            | ErrorCode::UnresolvedVariable => Severity::Warning,
            ErrorCode::MissingFootprint | ErrorCode::DuplicateFootprint => Severity::Ignore,
            _ => Severity::Error,
        }
    }
}

/// A reported design rule violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrcItem {
    pub error_code: ErrorCode,
    /// One or two offending item ids
    pub items: Vec<u64>,
    pub position: Point,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<Layer>,
    /// Extra detail, e.g. "(clearance-power clearance 0.5000 mm; actual 0.3000 mm)"
    pub message: String,
    /// Rule whose constraint was violated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
}

impl DrcItem {
    pub fn new(error_code: ErrorCode, items: Vec<u64>, position: Point) -> Self {
        Self {
            error_code,
            items,
            position,
            severity: error_code.default_severity(),
            layer: None,
            message: String::new(),
            rule_name: None,
        }
    }

    pub fn on_layer(mut self, layer: Option<Layer>) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_message(mut self, message: String) -> Self {
        self.message = message;
        self
    }

    pub fn with_rule(mut self, constraint: &Constraint) -> Self {
        self.rule_name = Some(constraint.source.clone());
        self
    }

    /// Title plus detail, as shown to the user
    pub fn error_text(&self) -> String {
        if self.message.is_empty() {
            self.error_code.title().to_string()
        } else {
            format!("{} {}", self.error_code.title(), self.message)
        }
    }
}

/// Format a length for violation messages
pub fn format_mm(value: f64) -> String {
    format!("{:.4} mm", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::DisallowKind;

    #[test]
    fn test_constraint_keywords() {
        for kind in ConstraintType::ALL {
            assert_eq!(ConstraintType::from_keyword(kind.keyword()), Some(kind));
        }
        assert_eq!(ConstraintType::from_keyword("hole"), Some(ConstraintType::HoleSize));
        assert_eq!(ConstraintType::from_keyword("keepout"), Some(ConstraintType::Keepout));
        assert_eq!(ConstraintType::from_keyword("length"), None);
    }

    #[test]
    fn test_constraint_validation() {
        let ok = Constraint::new(ConstraintType::Clearance, MinOptMax::min(0.2), "r");
        assert!(ok.validate().is_ok());

        let negative = Constraint::new(ConstraintType::Clearance, MinOptMax::min(-0.1), "r");
        assert!(negative.validate().is_err());

        let no_min = Constraint::new(
            ConstraintType::HoleClearance,
            MinOptMax { max: Some(1.0), ..Default::default() },
            "r",
        );
        assert!(no_min.validate().is_err());

        let empty = Constraint::new(ConstraintType::TrackWidth, MinOptMax::default(), "r");
        assert!(empty.validate().is_err());

        let mut keepout = Constraint::new(ConstraintType::Keepout, MinOptMax::default(), "r");
        assert!(keepout.validate().is_err());
        keepout.disallow = keepout.disallow.with(DisallowKind::Via);
        assert!(keepout.validate().is_ok());
    }

    #[test]
    fn test_error_code_indices_are_dense() {
        for (i, code) in ErrorCode::ALL.iter().enumerate() {
            assert_eq!(code.index(), i);
        }
    }
}
