//! Distance calculation algorithms for DRC
//!
//! Point, segment and polygon distances in board millimetres.

use crate::board::Point;

/// Point-to-segment minimum distance and the closest point on the segment
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> (f64, Point) {
    let ab = (b.x - a.x, b.y - a.y);
    let ap = (p.x - a.x, p.y - a.y);
    let ab_len2 = ab.0 * ab.0 + ab.1 * ab.1;

    if ab_len2 < 1e-12 {
        // Degenerate segment
        return (p.distance(&a), a);
    }

    let t = ((ap.0 * ab.0 + ap.1 * ab.1) / ab_len2).clamp(0.0, 1.0);
    let closest = Point::new(a.x + t * ab.0, a.y + t * ab.1);
    (p.distance(&closest), closest)
}

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Proper or touching intersection of segments a1-a2 and b1-b2
pub fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let d1 = cross(b1, b2, a1);
    let d2 = cross(b1, b2, a2);
    let d3 = cross(a1, a2, b1);
    let d4 = cross(a1, a2, b2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    // Collinear and touching cases
    let on_segment = |p: Point, q: Point, r: Point| {
        r.x >= p.x.min(q.x) - 1e-12
            && r.x <= p.x.max(q.x) + 1e-12
            && r.y >= p.y.min(q.y) - 1e-12
            && r.y <= p.y.max(q.y) + 1e-12
    };
    (d1.abs() < 1e-12 && on_segment(b1, b2, a1))
        || (d2.abs() < 1e-12 && on_segment(b1, b2, a2))
        || (d3.abs() < 1e-12 && on_segment(a1, a2, b1))
        || (d4.abs() < 1e-12 && on_segment(a1, a2, b2))
}

/// Segment-to-segment minimum distance and a marker point between the two
pub fn segment_distance(a1: Point, a2: Point, b1: Point, b2: Point) -> (f64, Point) {
    if segments_intersect(a1, a2, b1, b2) {
        let (_, p) = point_segment_distance(a1, b1, b2);
        return (0.0, p);
    }

    let mut min_d = f64::MAX;
    let mut closest = a1;

    for (p, s1, s2) in [(a1, b1, b2), (a2, b1, b2), (b1, a1, a2), (b2, a1, a2)] {
        let (d, q) = point_segment_distance(p, s1, s2);
        if d < min_d {
            min_d = d;
            closest = p.midpoint(&q);
        }
    }

    (min_d, closest)
}

/// Even-odd point in polygon test; the outline is implicitly closed
pub fn point_in_polygon(p: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > p.y) != (pj.y > p.y) {
            let x = (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x;
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Closed-outline edges as (start, end) pairs
pub fn polygon_edges(polygon: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = polygon.len();
    (0..n).map(move |i| (polygon[i], polygon[(i + 1) % n]))
}

/// Segment-to-polygon distance; zero when the segment touches or enters it
pub fn segment_polygon_distance(a: Point, b: Point, polygon: &[Point]) -> (f64, Point) {
    if point_in_polygon(a, polygon) {
        return (0.0, a);
    }
    if point_in_polygon(b, polygon) {
        return (0.0, b);
    }
    polygon_edges(polygon)
        .map(|(e1, e2)| segment_distance(a, b, e1, e2))
        .fold((f64::MAX, a), |best, cur| if cur.0 < best.0 { cur } else { best })
}

/// Polygon-to-polygon distance; zero when they overlap or one contains the other
pub fn polygon_distance(p: &[Point], q: &[Point]) -> (f64, Point) {
    if let Some(v) = p.iter().find(|v| point_in_polygon(**v, q)) {
        return (0.0, *v);
    }
    if let Some(v) = q.iter().find(|v| point_in_polygon(**v, p)) {
        return (0.0, *v);
    }
    let mut best = (f64::MAX, p.first().copied().unwrap_or_default());
    for (a1, a2) in polygon_edges(p) {
        for (b1, b2) in polygon_edges(q) {
            let cur = segment_distance(a1, a2, b1, b2);
            if cur.0 < best.0 {
                best = cur;
            }
        }
    }
    best
}

/// True when any two non-adjacent edges of the outline cross
pub fn polygon_self_intersects(polygon: &[Point]) -> bool {
    let n = polygon.len();
    if n < 4 {
        return false;
    }
    for i in 0..n {
        for j in (i + 2)..n {
            // First and last edges share a vertex
            if i == 0 && j == n - 1 {
                continue;
            }
            let (a1, a2) = (polygon[i], polygon[(i + 1) % n]);
            let (b1, b2) = (polygon[j], polygon[(j + 1) % n]);
            if segments_intersect(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    false
}
