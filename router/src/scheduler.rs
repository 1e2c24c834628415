//! Splits the die into worker regions and orders them into conflict-free
//! batches.

use crate::gc::GcWorker;
use crate::global_router::Guide;
use crate::worker::extension_box;
use drt_common::db::design::Design;
use drt_common::db::indices::NetId;
use drt_common::geom::{Point, Rect};
use drt_common::util::config::Config;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    /// Tile edge in GCells is `tile_gcells << level`.
    pub level: u32,
    pub route_box: Rect,
    pub nets: Vec<NetId>,
    /// GCell span `(x0, y0, x1, y1)` a worker on this tile may touch,
    /// including rule reach.
    guard: (u32, u32, u32, u32),
}

/// GCell-binned occupancy, stamped per batch.
struct SpatialSet {
    grid: Vec<u32>,
    w: u32,
    h: u32,
    current_batch: u32,
}

impl SpatialSet {
    fn new(w: u32, h: u32) -> Self {
        Self {
            grid: vec![0; (w.max(1) * h.max(1)) as usize],
            w: w.max(1),
            h: h.max(1),
            current_batch: 0,
        }
    }

    fn reset(&mut self) {
        self.current_batch += 1;
        if self.current_batch == 0 {
            self.grid.fill(0);
            self.current_batch = 1;
        }
    }

    fn try_insert(&mut self, (x0, y0, x1, y1): (u32, u32, u32, u32)) -> bool {
        let (x1, y1) = (x1.min(self.w - 1), y1.min(self.h - 1));
        for y in y0..=y1 {
            for x in x0..=x1 {
                if self.grid[(y * self.w + x) as usize] == self.current_batch {
                    return false;
                }
            }
        }
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.grid[(y * self.w + x) as usize] = self.current_batch;
            }
        }
        true
    }
}

fn gcell_span(design: &Design, r: &Rect) -> (u32, u32, u32, u32) {
    let (x0, y0) = design.gcell.index_of(r.min);
    let (x1, y1) = design.gcell.index_of(Point::new(r.max.x - 1, r.max.y - 1));
    (x0, y0, x1, y1)
}

/// Assigns each multi-pin net to the smallest tile holding its pins and
/// guide. Tiles come back ordered by level, then row, then column.
pub fn plan_tiles(design: &Design, config: &Config, guides: &[Guide]) -> Vec<Tile> {
    let g = &design.gcell;
    let base = config.detailed_routing.tile_gcells.max(1);
    let top = g.count_x.max(g.count_y).max(1);
    let mut assigned: BTreeMap<(u32, u32, u32), Vec<NetId>> = BTreeMap::new();

    for (i, net) in design.nets.iter().enumerate() {
        if net.pins.len() < 2 {
            continue;
        }
        let id = NetId::new(i);
        let Some(bbox) = design.net_bbox(id) else {
            continue;
        };
        let (mut x0, mut y0, mut x1, mut y1) = gcell_span(design, &bbox);
        for &(x, y) in guides.get(i).map_or(&[][..], |v| v.as_slice()) {
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }
        let mut level: u32 = 0;
        loop {
            let size = base.saturating_mul(1 << level.min(31));
            if size >= top || (x0 / size == x1 / size && y0 / size == y1 / size) {
                let key = if size >= top { (level, 0, 0) } else { (level, y0 / size, x0 / size) };
                assigned.entry(key).or_default().push(id);
                break;
            }
            level += 1;
        }
    }

    let reach = GcWorker::max_reach(&design.tech);
    assigned
        .into_iter()
        .map(|((level, ty, tx), nets)| {
            let size = base.saturating_mul(1 << level.min(31));
            let (x0, y0) = (tx * size, ty * size);
            let x1 = (x0 + size - 1).min(g.count_x.saturating_sub(1));
            let y1 = (y0 + size - 1).min(g.count_y.saturating_sub(1));
            let b = g.gcell_box(x0, y0).merge(&g.gcell_box(x1, y1));
            let route_box = b.intersection(&design.die_area).unwrap_or(b);
            let guard_box = extension_box(design, config, route_box).bloat(reach);
            Tile {
                level,
                route_box,
                nets,
                guard: gcell_span(design, &guard_box),
            }
        })
        .collect()
}

/// Groups tiles into batches whose workers cannot see each other. Levels
/// never share a batch; a tile that conflicts with an earlier tile of the
/// batch waits for the next one.
pub fn batch_tiles(design: &Design, tiles: Vec<Tile>) -> Vec<Vec<Tile>> {
    let mut set = SpatialSet::new(design.gcell.count_x, design.gcell.count_y);
    let mut batches = Vec::new();
    let mut pending = tiles;
    while !pending.is_empty() {
        set.reset();
        let level = pending[0].level;
        let (batch, rest): (Vec<Tile>, Vec<Tile>) = pending
            .into_iter()
            .partition(|t| t.level == level && set.try_insert(t.guard));
        batches.push(batch);
        pending = rest;
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use drt_common::db::design::GCellPattern;
    use drt_common::db::tech::{LayerDirection, RoutingLayer, Tech};

    fn design() -> Design {
        let mut tech = Tech::new(1000);
        tech.add_layer(RoutingLayer::new("M1".into(), 0, LayerDirection::Horizontal, 200, 100));
        tech.finalize();
        let mut d = Design::new(tech);
        d.die_area = Rect::from_coords(0, 0, 8000, 8000);
        d.gcell = GCellPattern::from_die(&d.die_area, 1000);
        d
    }

    fn two_pin(d: &mut Design, name: &str, a: (i64, i64), b: (i64, i64)) {
        let n = d.add_net(name.into());
        for (x, y) in [a, b] {
            d.add_pin(n, format!("{name}_{x}"), None, vec![(0, Rect::from_coords(x, y, x + 100, y + 100))]);
        }
    }

    #[test]
    fn nets_go_to_smallest_enclosing_tile() {
        let mut d = design();
        two_pin(&mut d, "local", (100, 100), (1500, 1500));
        two_pin(&mut d, "cross", (1500, 100), (2500, 100));
        two_pin(&mut d, "far", (6500, 6500), (7500, 7500));
        let mut cfg = Config::default();
        cfg.detailed_routing.tile_gcells = 2;
        let tiles = plan_tiles(&d, &cfg, &[]);
        let summary: Vec<(u32, Rect, Vec<NetId>)> =
            tiles.iter().map(|t| (t.level, t.route_box, t.nets.clone())).collect();
        assert_eq!(
            summary,
            vec![
                (0, Rect::from_coords(0, 0, 2000, 2000), vec![NetId(0)]),
                (0, Rect::from_coords(6000, 6000, 8000, 8000), vec![NetId(2)]),
                (1, Rect::from_coords(0, 0, 4000, 4000), vec![NetId(1)]),
            ]
        );
    }

    #[test]
    fn batches_separate_levels_and_neighbours() {
        let mut d = design();
        two_pin(&mut d, "a", (100, 100), (1500, 1500));
        two_pin(&mut d, "b", (2100, 100), (3500, 1500));
        two_pin(&mut d, "c", (6500, 6500), (7500, 7500));
        two_pin(&mut d, "wide", (100, 100), (7500, 7500));
        let mut cfg = Config::default();
        cfg.detailed_routing.tile_gcells = 2;
        cfg.detailed_routing.halo = 1;
        let batches = batch_tiles(&d, plan_tiles(&d, &cfg, &[]));
        let nets: Vec<Vec<NetId>> = batches
            .iter()
            .map(|b| b.iter().flat_map(|t| t.nets.clone()).collect())
            .collect();
        assert_eq!(nets, vec![vec![NetId(0), NetId(2)], vec![NetId(1)], vec![NetId(3)]]);
    }
}
