use super::rect::Rect;
use rstar::{AABB, RTree};

/// Box index over an arbitrary payload. Entries are compared by
/// `(rect, payload)` on removal, so duplicate inserts need duplicate removes.
pub struct SpatialIndex<T: Clone + PartialEq> {
    tree: RTree<IndexedRect<T>>,
}

#[derive(Clone, PartialEq)]
struct IndexedRect<T> {
    rect: Rect,
    item: T,
}

impl<T: Clone + PartialEq> rstar::RTreeObject for IndexedRect<T> {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.rect.min.x, self.rect.min.y],
            [self.rect.max.x, self.rect.max.y],
        )
    }
}

impl<T: Clone + PartialEq> Default for SpatialIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq> SpatialIndex<T> {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    pub fn bulk_load(items: Vec<(Rect, T)>) -> Self {
        let objs = items
            .into_iter()
            .map(|(rect, item)| IndexedRect { rect, item })
            .collect();
        Self {
            tree: RTree::bulk_load(objs),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    pub fn clear(&mut self) {
        self.tree = RTree::new();
    }

    pub fn insert(&mut self, rect: Rect, item: T) {
        self.tree.insert(IndexedRect { rect, item });
    }

    pub fn remove(&mut self, rect: Rect, item: &T) -> bool {
        self.tree
            .remove(&IndexedRect {
                rect,
                item: item.clone(),
            })
            .is_some()
    }

    /// Every entry whose closed box intersects `rect`.
    pub fn query(&self, rect: Rect) -> Vec<(Rect, T)> {
        let aabb = AABB::from_corners([rect.min.x, rect.min.y], [rect.max.x, rect.max.y]);
        self.tree
            .locate_in_envelope_intersecting(&aabb)
            .map(|e| (e.rect, e.item.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_only_drops_matching_payload() {
        let mut idx = SpatialIndex::new();
        let r = Rect::from_coords(0, 0, 10, 10);
        idx.insert(r, 1u32);
        idx.insert(r, 2u32);
        assert!(idx.remove(r, &1));
        assert!(!idx.remove(r, &1));
        let hits = idx.query(Rect::from_coords(5, 5, 6, 6));
        assert_eq!(hits, vec![(r, 2)]);
    }
}
