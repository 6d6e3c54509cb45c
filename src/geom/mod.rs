pub(crate) mod ops;
mod proj;
pub(crate) mod split;

pub use proj::ProjectionSet;

use geo::Rect;
use rstar::{RTree, RTreeObject, AABB};

/// Bounding box of an indexed geometry, for R-tree pre-filtering.
#[derive(Debug, Clone)]
pub struct BoundingBox {
    pub idx: usize,
    pub bbox: Rect<f64>,
}

impl RTreeObject for BoundingBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// Bulk-load an R-tree over indexed bounding rectangles.
pub fn rtree_of(rects: impl Iterator<Item = (usize, Rect<f64>)>) -> RTree<BoundingBox> {
    RTree::bulk_load(rects.map(|(idx, bbox)| BoundingBox { idx, bbox }).collect())
}

/// Indices whose boxes intersect the query rectangle.
pub fn rtree_candidates(tree: &RTree<BoundingBox>, query: &Rect<f64>) -> Vec<usize> {
    let envelope = AABB::from_corners(query.min().into(), query.max().into());
    tree.locate_in_envelope_intersecting(&envelope).map(|b| b.idx).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;

    #[test]
    fn rtree_prefilter_keeps_overlapping_boxes() {
        let rects = vec![
            (0, Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 2.0, y: 2.0 })),
            (1, Rect::new(Coord { x: 10.0, y: 10.0 }, Coord { x: 12.0, y: 12.0 })),
            (2, Rect::new(Coord { x: 1.0, y: 1.0 }, Coord { x: 3.0, y: 3.0 })),
        ];
        let tree = rtree_of(rects.into_iter());
        let query = Rect::new(Coord { x: 0.5, y: 0.5 }, Coord { x: 1.5, y: 1.5 });
        let mut hits = rtree_candidates(&tree, &query);
        hits.sort();
        assert_eq!(hits, vec![0, 2]);
    }
}
