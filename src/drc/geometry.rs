//! Geometry extraction for DRC
//!
//! Reduces board items to capsules and polygons so copper, hole and courtyard
//! checks can share one distance routine.

use super::distance::{polygon_distance, segment_distance, segment_polygon_distance};
use crate::board::{BoardItem, ItemGeometry, PadShape, Point};

/// Copper or hole outline used for distance checks
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Segment swept by a disc; a circle when both ends coincide
    Capsule { a: Point, b: Point, radius: f64 },
    Polygon(Vec<Point>),
}

impl Shape {
    pub fn circle(center: Point, diameter: f64) -> Shape {
        Shape::Capsule { a: center, b: center, radius: diameter / 2.0 }
    }
}

/// Copper outline of an item; footprints have none
pub fn copper_shape(item: &BoardItem) -> Option<Shape> {
    match &item.geometry {
        ItemGeometry::Track { start, end, width } => {
            Some(Shape::Capsule { a: *start, b: *end, radius: width / 2.0 })
        }
        ItemGeometry::Via { at, diameter, .. } => Some(Shape::circle(*at, *diameter)),
        ItemGeometry::Pad { at, shape, .. } => Some(pad_shape(*at, shape)),
        ItemGeometry::Zone { outline, .. } if outline.len() >= 3 => {
            Some(Shape::Polygon(outline.clone()))
        }
        ItemGeometry::Zone { .. } | ItemGeometry::Footprint { .. } => None,
    }
}

fn pad_shape(at: Point, shape: &PadShape) -> Shape {
    match *shape {
        PadShape::Circle { diameter } => Shape::circle(at, diameter),
        PadShape::Rect { width, height } => {
            let (hw, hh) = (width / 2.0, height / 2.0);
            Shape::Polygon(vec![
                Point::new(at.x - hw, at.y - hh),
                Point::new(at.x + hw, at.y - hh),
                Point::new(at.x + hw, at.y + hh),
                Point::new(at.x - hw, at.y + hh),
            ])
        }
        PadShape::Oval { width, height } => {
            // Stadium along the long axis
            if width >= height {
                let d = (width - height) / 2.0;
                Shape::Capsule {
                    a: Point::new(at.x - d, at.y),
                    b: Point::new(at.x + d, at.y),
                    radius: height / 2.0,
                }
            } else {
                let d = (height - width) / 2.0;
                Shape::Capsule {
                    a: Point::new(at.x, at.y - d),
                    b: Point::new(at.x, at.y + d),
                    radius: width / 2.0,
                }
            }
        }
    }
}

/// Drilled hole of an item as a circle
pub fn hole_shape(item: &BoardItem) -> Option<Shape> {
    item.hole().map(|(at, drill)| Shape::circle(at, drill))
}

/// Edge-to-edge distance between two shapes (zero when they touch or overlap)
/// and a marker position between them
pub fn shape_distance(s1: &Shape, s2: &Shape) -> (f64, Point) {
    let (d, p) = match (s1, s2) {
        (
            Shape::Capsule { a: a1, b: b1, radius: r1 },
            Shape::Capsule { a: a2, b: b2, radius: r2 },
        ) => {
            let (d, p) = segment_distance(*a1, *b1, *a2, *b2);
            (d - r1 - r2, p)
        }
        (Shape::Capsule { a, b, radius }, Shape::Polygon(poly))
        | (Shape::Polygon(poly), Shape::Capsule { a, b, radius }) => {
            let (d, p) = segment_polygon_distance(*a, *b, poly);
            (d - radius, p)
        }
        (Shape::Polygon(p1), Shape::Polygon(p2)) => polygon_distance(p1, p2),
    };
    (d.max(0.0), p)
}
