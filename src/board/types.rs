//! Core board types consumed by the DRC engine
//!
//! Layers, layer sets, points and the closed set of board item kinds the
//! rule engine knows how to query.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the net class that items without an explicit class belong to
pub const DEFAULT_NET_CLASS: &str = "Default";

/// Canonical layer names, indexed by layer id
const LAYER_NAMES: [&str; 50] = [
    "F.Cu", "In1.Cu", "In2.Cu", "In3.Cu", "In4.Cu", "In5.Cu", "In6.Cu", "In7.Cu",
    "In8.Cu", "In9.Cu", "In10.Cu", "In11.Cu", "In12.Cu", "In13.Cu", "In14.Cu", "In15.Cu",
    "In16.Cu", "In17.Cu", "In18.Cu", "In19.Cu", "In20.Cu", "In21.Cu", "In22.Cu", "In23.Cu",
    "In24.Cu", "In25.Cu", "In26.Cu", "In27.Cu", "In28.Cu", "In29.Cu", "In30.Cu", "B.Cu",
    "B.Adhes", "F.Adhes", "B.Paste", "F.Paste", "B.SilkS", "F.SilkS", "B.Mask", "F.Mask",
    "Dwgs.User", "Cmts.User", "Eco1.User", "Eco2.User", "Edge.Cuts", "Margin", "B.CrtYd",
    "F.CrtYd", "B.Fab", "F.Fab",
];

/// A 2D point in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// A single board layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Layer(u8);

impl Layer {
    pub const F_CU: Layer = Layer(0);
    pub const B_CU: Layer = Layer(31);
    pub const EDGE_CUTS: Layer = Layer(44);
    pub const B_CRTYD: Layer = Layer(46);
    pub const F_CRTYD: Layer = Layer(47);

    /// Total number of layer ids
    pub const COUNT: usize = LAYER_NAMES.len();

    pub fn from_id(id: u8) -> Option<Layer> {
        ((id as usize) < Self::COUNT).then_some(Layer(id))
    }

    /// Look up a layer by canonical name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Layer> {
        LAYER_NAMES
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .map(|i| Layer(i as u8))
    }

    pub fn id(&self) -> u8 {
        self.0
    }

    pub fn name(&self) -> &'static str {
        LAYER_NAMES[self.0 as usize]
    }

    pub fn is_copper(&self) -> bool {
        self.0 <= Self::B_CU.0
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for Layer {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Layer::from_name(&value).ok_or_else(|| format!("unknown layer '{}'", value))
    }
}

impl From<Layer> for String {
    fn from(layer: Layer) -> Self {
        layer.name().to_string()
    }
}

/// Bit mask over layer ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LayerSet(u64);

impl LayerSet {
    pub const fn empty() -> Self {
        LayerSet(0)
    }

    pub fn all() -> Self {
        LayerSet((1u64 << Layer::COUNT) - 1)
    }

    /// All copper layers, F.Cu through B.Cu
    pub fn all_copper() -> Self {
        LayerSet((1u64 << (Layer::B_CU.0 + 1)) - 1)
    }

    /// F.Cu and B.Cu
    pub fn outer_copper() -> Self {
        LayerSet::from_layers(&[Layer::F_CU, Layer::B_CU])
    }

    /// In1.Cu through In30.Cu
    pub fn inner_copper() -> Self {
        LayerSet(Self::all_copper().0 & !Self::outer_copper().0)
    }

    pub fn from_layers(layers: &[Layer]) -> Self {
        layers.iter().fold(LayerSet::empty(), |set, l| set.with(*l))
    }

    pub fn with(self, layer: Layer) -> Self {
        LayerSet(self.0 | (1u64 << layer.0))
    }

    pub fn contains(&self, layer: Layer) -> bool {
        self.0 & (1u64 << layer.0) != 0
    }

    pub fn intersects(&self, other: &LayerSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn intersection(&self, other: &LayerSet) -> LayerSet {
        LayerSet(self.0 & other.0)
    }

    pub fn copper(&self) -> LayerSet {
        self.intersection(&Self::all_copper())
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }

    /// Layers in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = Layer> + '_ {
        (0..Layer::COUNT as u8).filter(|i| self.0 & (1u64 << i) != 0).map(Layer)
    }

    /// Lowest layer id in the set
    pub fn first(&self) -> Option<Layer> {
        (self.0 != 0).then(|| Layer(self.0.trailing_zeros() as u8))
    }
}

impl TryFrom<Vec<String>> for LayerSet {
    type Error = String;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        let mut set = LayerSet::empty();
        for name in names {
            set = set.with(Layer::try_from(name)?);
        }
        Ok(set)
    }
}

impl From<LayerSet> for Vec<String> {
    fn from(set: LayerSet) -> Self {
        set.iter().map(String::from).collect()
    }
}

/// Closed set of board item kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Track,
    Via,
    Pad,
    Zone,
    Footprint,
}

impl ItemKind {
    /// Name used by the `Type` property in rule conditions
    pub fn type_name(&self) -> &'static str {
        match self {
            ItemKind::Track => "Track",
            ItemKind::Via => "Via",
            ItemKind::Pad => "Pad",
            ItemKind::Zone => "Zone",
            ItemKind::Footprint => "Footprint",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViaType {
    #[default]
    Through,
    BlindBuried,
    Micro,
}

/// Pad copper shape, axis aligned and centred on the pad position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PadShape {
    Circle { diameter: f64 },
    Rect { width: f64, height: f64 },
    Oval { width: f64, height: f64 },
}

/// Item kinds a keepout can forbid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisallowKind {
    Track,
    Via,
    MicroVia,
    BuriedVia,
    Pad,
    Zone,
    Footprint,
    Hole,
}

impl DisallowKind {
    pub const ALL: [DisallowKind; 8] = [
        DisallowKind::Track,
        DisallowKind::Via,
        DisallowKind::MicroVia,
        DisallowKind::BuriedVia,
        DisallowKind::Pad,
        DisallowKind::Zone,
        DisallowKind::Footprint,
        DisallowKind::Hole,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            DisallowKind::Track => "track",
            DisallowKind::Via => "via",
            DisallowKind::MicroVia => "micro_via",
            DisallowKind::BuriedVia => "buried_via",
            DisallowKind::Pad => "pad",
            DisallowKind::Zone => "zone",
            DisallowKind::Footprint => "footprint",
            DisallowKind::Hole => "hole",
        }
    }

    pub fn from_keyword(word: &str) -> Option<DisallowKind> {
        Self::ALL.iter().copied().find(|k| k.keyword() == word)
    }

    fn bit(&self) -> u16 {
        1 << (*self as u16)
    }
}

/// Set of disallowed item kinds (keepout zones and `disallow` constraints)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct DisallowFlags(u16);

impl DisallowFlags {
    pub fn with(self, kind: DisallowKind) -> Self {
        DisallowFlags(self.0 | kind.bit())
    }

    pub fn contains(&self, kind: DisallowKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = DisallowKind> + '_ {
        DisallowKind::ALL.into_iter().filter(|k| self.contains(*k))
    }

    /// First disallowed kind that applies to `item`, if any
    pub fn first_match(&self, item: &BoardItem) -> Option<DisallowKind> {
        item.disallow_kinds().into_iter().find(|k| self.contains(*k))
    }
}

impl TryFrom<Vec<String>> for DisallowFlags {
    type Error = String;

    fn try_from(words: Vec<String>) -> Result<Self, Self::Error> {
        words.iter().try_fold(DisallowFlags::default(), |flags, w| {
            DisallowKind::from_keyword(w)
                .map(|k| flags.with(k))
                .ok_or_else(|| format!("unknown item kind '{}'", w))
        })
    }
}

impl From<DisallowFlags> for Vec<String> {
    fn from(flags: DisallowFlags) -> Self {
        flags.iter().map(|k| k.keyword().to_string()).collect()
    }
}

/// Item geometry, one variant per item kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemGeometry {
    Track {
        start: Point,
        end: Point,
        width: f64,
    },
    Via {
        at: Point,
        diameter: f64,
        drill: f64,
        #[serde(default)]
        via_type: ViaType,
    },
    Pad {
        at: Point,
        shape: PadShape,
        #[serde(default)]
        drill: Option<f64>,
        #[serde(default = "default_plated")]
        plated: bool,
    },
    Zone {
        outline: Vec<Point>,
        #[serde(default)]
        keepout: Option<DisallowFlags>,
    },
    Footprint {
        at: Point,
        #[serde(default)]
        courtyard: Vec<Point>,
    },
}

fn default_plated() -> bool {
    true
}

/// A board item as seen by the rule engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardItem {
    pub id: u64,
    pub layers: LayerSet,
    #[serde(default)]
    pub net: Option<String>,
    #[serde(default)]
    pub net_class: Option<String>,
    /// Parent footprint reference (the footprint's own reference for footprints)
    #[serde(default)]
    pub footprint: Option<String>,
    /// Text variables available to `Var('NAME')` in rule conditions
    #[serde(default)]
    pub variables: IndexMap<String, String>,
    pub geometry: ItemGeometry,
}

impl BoardItem {
    pub fn new(id: u64, layers: LayerSet, geometry: ItemGeometry) -> Self {
        Self {
            id,
            layers,
            net: None,
            net_class: None,
            footprint: None,
            variables: IndexMap::new(),
            geometry,
        }
    }

    pub fn with_net(mut self, net: &str, net_class: &str) -> Self {
        self.net = Some(net.to_string());
        self.net_class = Some(net_class.to_string());
        self
    }

    pub fn with_footprint(mut self, reference: &str) -> Self {
        self.footprint = Some(reference.to_string());
        self
    }

    pub fn with_variable(mut self, name: &str, value: &str) -> Self {
        self.variables.insert(name.to_string(), value.to_string());
        self
    }

    pub fn kind(&self) -> ItemKind {
        match self.geometry {
            ItemGeometry::Track { .. } => ItemKind::Track,
            ItemGeometry::Via { .. } => ItemKind::Via,
            ItemGeometry::Pad { .. } => ItemKind::Pad,
            ItemGeometry::Zone { .. } => ItemKind::Zone,
            ItemGeometry::Footprint { .. } => ItemKind::Footprint,
        }
    }

    pub fn net_class_name(&self) -> &str {
        self.net_class.as_deref().unwrap_or(DEFAULT_NET_CLASS)
    }

    /// Primary layer: the lowest layer id the item lives on
    pub fn layer(&self) -> Option<Layer> {
        self.layers.first()
    }

    /// Track width
    pub fn width(&self) -> Option<f64> {
        match self.geometry {
            ItemGeometry::Track { width, .. } => Some(width),
            _ => None,
        }
    }

    /// Via or circular pad diameter
    pub fn diameter(&self) -> Option<f64> {
        match self.geometry {
            ItemGeometry::Via { diameter, .. } => Some(diameter),
            ItemGeometry::Pad { shape: PadShape::Circle { diameter }, .. } => Some(diameter),
            _ => None,
        }
    }

    pub fn drill(&self) -> Option<f64> {
        match self.geometry {
            ItemGeometry::Via { drill, .. } => Some(drill),
            ItemGeometry::Pad { drill, .. } => drill,
            _ => None,
        }
    }

    /// Drilled hole centre and diameter
    pub fn hole(&self) -> Option<(Point, f64)> {
        match self.geometry {
            ItemGeometry::Via { at, drill, .. } => Some((at, drill)),
            ItemGeometry::Pad { at, drill: Some(drill), .. } => Some((at, drill)),
            _ => None,
        }
    }

    pub fn is_plated(&self) -> bool {
        match self.geometry {
            ItemGeometry::Via { .. } => true,
            ItemGeometry::Pad { drill: Some(_), plated, .. } => plated,
            _ => false,
        }
    }

    pub fn is_keepout(&self) -> bool {
        matches!(self.geometry, ItemGeometry::Zone { keepout: Some(_), .. })
    }

    /// Items that carry copper on at least one copper layer
    pub fn is_copper(&self) -> bool {
        match self.kind() {
            ItemKind::Footprint => false,
            ItemKind::Zone => !self.is_keepout() && !self.layers.copper().is_empty(),
            _ => !self.layers.copper().is_empty(),
        }
    }

    /// Two items share a net when both carry the same, non-empty net name
    pub fn same_net(&self, other: &BoardItem) -> bool {
        match (&self.net, &other.net) {
            (Some(a), Some(b)) => !a.is_empty() && a == b,
            _ => false,
        }
    }

    /// Keepout categories this item falls under
    pub fn disallow_kinds(&self) -> Vec<DisallowKind> {
        match &self.geometry {
            ItemGeometry::Track { .. } => vec![DisallowKind::Track],
            ItemGeometry::Via { via_type, .. } => match via_type {
                ViaType::Through => vec![DisallowKind::Via, DisallowKind::Hole],
                ViaType::BlindBuried => vec![DisallowKind::BuriedVia, DisallowKind::Hole],
                ViaType::Micro => vec![DisallowKind::MicroVia, DisallowKind::Hole],
            },
            ItemGeometry::Pad { drill, .. } => {
                let mut kinds = vec![DisallowKind::Pad];
                if drill.is_some() {
                    kinds.push(DisallowKind::Hole);
                }
                kinds
            }
            ItemGeometry::Zone { .. } => vec![DisallowKind::Zone],
            ItemGeometry::Footprint { .. } => vec![DisallowKind::Footprint],
        }
    }

    /// Representative position used for violation markers
    pub fn position(&self) -> Point {
        match &self.geometry {
            ItemGeometry::Track { start, end, .. } => start.midpoint(end),
            ItemGeometry::Via { at, .. } | ItemGeometry::Pad { at, .. } => *at,
            ItemGeometry::Footprint { at, .. } => *at,
            ItemGeometry::Zone { outline, .. } => outline.first().copied().unwrap_or_default(),
        }
    }

    /// Bounding box [min_x, min_y, max_x, max_y]
    pub fn bounds(&self) -> [f64; 4] {
        match &self.geometry {
            ItemGeometry::Track { start, end, width } => {
                let r = width / 2.0;
                [
                    start.x.min(end.x) - r,
                    start.y.min(end.y) - r,
                    start.x.max(end.x) + r,
                    start.y.max(end.y) + r,
                ]
            }
            ItemGeometry::Via { at, diameter, .. } => square_bounds(at, diameter / 2.0),
            ItemGeometry::Pad { at, shape, .. } => {
                let (w, h) = match shape {
                    PadShape::Circle { diameter } => (*diameter, *diameter),
                    PadShape::Rect { width, height } | PadShape::Oval { width, height } => {
                        (*width, *height)
                    }
                };
                [at.x - w / 2.0, at.y - h / 2.0, at.x + w / 2.0, at.y + h / 2.0]
            }
            ItemGeometry::Zone { outline, .. } => polygon_bounds(outline),
            ItemGeometry::Footprint { at, courtyard } => {
                if courtyard.is_empty() {
                    [at.x, at.y, at.x, at.y]
                } else {
                    polygon_bounds(courtyard)
                }
            }
        }
    }
}

fn square_bounds(at: &Point, r: f64) -> [f64; 4] {
    [at.x - r, at.y - r, at.x + r, at.y + r]
}

fn polygon_bounds(points: &[Point]) -> [f64; 4] {
    points.iter().fold(
        [f64::MAX, f64::MAX, f64::MIN, f64::MIN],
        |b, p| [b[0].min(p.x), b[1].min(p.y), b[2].max(p.x), b[3].max(p.y)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_names_round_trip() {
        assert_eq!(Layer::from_name("f.cu"), Some(Layer::F_CU));
        assert_eq!(Layer::from_name("In4.Cu").map(|l| l.id()), Some(4));
        assert_eq!(Layer::B_CU.name(), "B.Cu");
        assert!(Layer::from_name("Nope.Cu").is_none());
        assert!(Layer::B_CU.is_copper());
        assert!(!Layer::F_CRTYD.is_copper());
    }

    #[test]
    fn test_layer_set_helpers() {
        let outer = LayerSet::outer_copper();
        assert_eq!(outer.count(), 2);
        assert_eq!(LayerSet::inner_copper().count(), 30);
        assert!(!LayerSet::inner_copper().contains(Layer::F_CU));
        assert_eq!(LayerSet::all_copper().count(), 32);
        assert_eq!(outer.first(), Some(Layer::F_CU));

        let mixed = LayerSet::from_layers(&[Layer::F_CU, Layer::F_CRTYD]);
        assert_eq!(mixed.copper(), LayerSet::from_layers(&[Layer::F_CU]));
    }

    #[test]
    fn test_item_json_shape() {
        let json = r#"{
            "id": 7,
            "layers": ["F.Cu", "B.Cu"],
            "net": "GND",
            "geometry": { "type": "pad", "at": { "x": 1.0, "y": 2.0 },
                          "shape": { "kind": "rect", "width": 1.0, "height": 0.5 },
                          "drill": 0.3 }
        }"#;
        let item: BoardItem = serde_json::from_str(json).expect("valid item json");
        assert_eq!(item.kind(), ItemKind::Pad);
        assert_eq!(item.net_class_name(), DEFAULT_NET_CLASS);
        assert!(item.is_plated());
        assert_eq!(item.bounds(), [0.5, 1.75, 1.5, 2.25]);
        assert_eq!(item.disallow_kinds(), vec![DisallowKind::Pad, DisallowKind::Hole]);
    }
}
