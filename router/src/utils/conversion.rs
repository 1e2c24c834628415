use crate::algo::maze::GuideOracle;
use drt_common::db::design::GCellPattern;
use drt_common::db::indices::NetId;
use drt_common::geom::{Dbu, GridCoord, Point};

/// Fine lattice index -> GCell index lookup, precomputed per axis.
#[derive(Clone, Debug)]
pub struct GCellMap {
    x_map: Vec<u32>,
    y_map: Vec<u32>,
    count_x: u32,
    count_y: u32,
}

impl GCellMap {
    pub fn new(pattern: &GCellPattern, x_coords: &[Dbu], y_coords: &[Dbu]) -> Self {
        let x_map = x_coords
            .iter()
            .map(|&x| pattern.index_of(Point::new(x, pattern.origin.y)).0)
            .collect();
        let y_map = y_coords
            .iter()
            .map(|&y| pattern.index_of(Point::new(pattern.origin.x, y)).1)
            .collect();
        Self {
            x_map,
            y_map,
            count_x: pattern.count_x.max(1),
            count_y: pattern.count_y.max(1),
        }
    }

    #[inline(always)]
    pub fn gcell(&self, c: GridCoord) -> (u32, u32) {
        (self.x_map[c.x as usize], self.y_map[c.y as usize])
    }

    pub fn count(&self) -> (u32, u32) {
        (self.count_x, self.count_y)
    }
}

/// Per-net guide membership over GCells. Cells are stamped with the current
/// net's tag so switching nets never clears the mask.
#[derive(Clone)]
pub struct GuideMask {
    map: GCellMap,
    stamp: Vec<u32>,
    current: u32,
    allow_all: bool,
}

impl GuideMask {
    pub fn new(map: GCellMap) -> Self {
        let (w, h) = map.count();
        Self {
            map,
            stamp: vec![0; (w * h) as usize],
            current: 0,
            allow_all: true,
        }
    }

    /// An empty guide admits every node.
    pub fn prepare(&mut self, net: NetId, guide: &[(u32, u32)]) {
        if guide.is_empty() {
            self.allow_all = true;
            return;
        }
        self.allow_all = false;
        self.current = net.0.wrapping_add(1);
        if self.current == 0 {
            self.stamp.fill(0);
            self.current = 1;
        }
        let (w, h) = self.map.count();
        for &(gx, gy) in guide {
            if gx < w && gy < h {
                self.stamp[(gy * w + gx) as usize] = self.current;
            }
        }
    }
}

impl GuideOracle for GuideMask {
    #[inline(always)]
    fn is_in_guide(&self, c: GridCoord) -> bool {
        if self.allow_all {
            return true;
        }
        let (gx, gy) = self.map.gcell(c);
        let (w, _) = self.map.count();
        self.stamp
            .get((gy * w + gx) as usize)
            .is_some_and(|&s| s == self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drt_common::geom::Rect;

    #[test]
    fn fine_nodes_map_to_their_gcell() {
        let pattern = GCellPattern::from_die(&Rect::from_coords(0, 0, 3000, 2000), 1000);
        let map = GCellMap::new(&pattern, &[100, 1100, 2900], &[500, 1500]);
        assert_eq!(map.gcell(GridCoord::new(1, 1, 0)), (1, 1));
        assert_eq!(map.gcell(GridCoord::new(2, 0, 3)), (2, 0));
        let mut mask = GuideMask::new(map);
        mask.prepare(NetId(5), &[(0, 0), (1, 0)]);
        assert!(mask.is_in_guide(GridCoord::new(1, 0, 0)));
        assert!(!mask.is_in_guide(GridCoord::new(2, 0, 0)));
        mask.prepare(NetId(6), &[]);
        assert!(mask.is_in_guide(GridCoord::new(2, 1, 0)));
    }
}
