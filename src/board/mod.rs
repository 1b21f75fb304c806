//! Board model consumed by the DRC engine
//!
//! # Module Structure
//! - `types` - Layers, layer sets, item kinds and item geometry
//! - `spatial` - R-tree indexing over item bounds

pub mod spatial;
pub mod types;

pub use spatial::{build_index, candidate_pairs, search_envelope, IndexedItem};
pub use types::{
    BoardItem, DisallowFlags, DisallowKind, ItemGeometry, ItemKind, Layer, LayerSet, PadShape,
    Point, ViaType, DEFAULT_NET_CLASS,
};

use crate::drc::DesignSettings;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A board: its items plus the legacy design settings stored with it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Board {
    pub items: Vec<BoardItem>,
    #[serde(default)]
    pub design_settings: DesignSettings,
}

impl Board {
    pub fn new(items: Vec<BoardItem>, design_settings: DesignSettings) -> Self {
        Self { items, design_settings }
    }

    /// Parse a board from its JSON representation
    pub fn from_json_str(json: &str) -> anyhow::Result<Board> {
        serde_json::from_str(json).context("Failed to parse board JSON")
    }

    /// Load a board from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Board> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to open board file {}", path.display()))?;
        Self::from_json_str(&text)
    }

    pub fn item(&self, id: u64) -> Option<&BoardItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn footprints(&self) -> impl Iterator<Item = &BoardItem> {
        self.items.iter().filter(|i| i.kind() == ItemKind::Footprint)
    }
}
