//! Spatial indexing for DRC candidate pair filtering
//!
//! Board items are indexed by their bounding boxes in an R-tree so providers
//! only test pairs whose boxes come within the worst-case constraint distance.

use super::types::BoardItem;
use rstar::{RTree, RTreeObject, AABB};

/// Item wrapper for R-tree spatial indexing
#[derive(Clone, Debug)]
pub struct IndexedItem {
    /// Position of the item in `Board::items`
    pub index: usize,
    pub id: u64,
    pub bounds: AABB<[f64; 2]>,
}

impl IndexedItem {
    pub fn new(index: usize, item: &BoardItem) -> Self {
        let b = item.bounds();
        Self {
            index,
            id: item.id,
            bounds: AABB::from_corners([b[0], b[1]], [b[2], b[3]]),
        }
    }
}

impl RTreeObject for IndexedItem {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.bounds
    }
}

impl rstar::PointDistance for IndexedItem {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.bounds.distance_2(point)
    }
}

/// Build an R-tree over the items accepted by `filter`
pub fn build_index<F>(items: &[BoardItem], filter: F) -> RTree<IndexedItem>
where
    F: Fn(&BoardItem) -> bool,
{
    let entries: Vec<IndexedItem> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| filter(item))
        .map(|(i, item)| IndexedItem::new(i, item))
        .collect();
    RTree::bulk_load(entries)
}

/// Search envelope: item bounds grown by `margin` on every side
pub fn search_envelope(item: &BoardItem, margin: f64) -> AABB<[f64; 2]> {
    let b = item.bounds();
    AABB::from_corners([b[0] - margin, b[1] - margin], [b[2] + margin, b[3] + margin])
}

/// Candidate pairs (i < j, by item index) whose boxes are within `margin`
pub fn candidate_pairs(
    items: &[BoardItem],
    index: &RTree<IndexedItem>,
    margin: f64,
) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for entry in index.iter() {
        let envelope = search_envelope(&items[entry.index], margin);
        for neighbor in index.locate_in_envelope_intersecting(&envelope) {
            // Only check each pair once
            if entry.index < neighbor.index {
                pairs.push((entry.index, neighbor.index));
            }
        }
    }
    pairs.sort_unstable();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::types::{ItemGeometry, LayerSet, Point};

    fn via(id: u64, x: f64) -> BoardItem {
        BoardItem::new(
            id,
            LayerSet::outer_copper(),
            ItemGeometry::Via {
                at: Point::new(x, 0.0),
                diameter: 0.6,
                drill: 0.3,
                via_type: Default::default(),
            },
        )
    }

    #[test]
    fn test_candidate_pairs_respect_margin() {
        let items = vec![via(1, 0.0), via(2, 1.0), via(3, 10.0)];
        let index = build_index(&items, |_| true);

        // 0.4mm gap between the first two vias
        assert_eq!(candidate_pairs(&items, &index, 0.5), vec![(0, 1)]);
        assert!(candidate_pairs(&items, &index, 0.1).is_empty());
    }
}
