//! Regular 3-D routing lattice.
//!
//! Every node owns the edges towards its +x (E), +y (N) and +z (U)
//! neighbours; W/S/D queries are answered from the neighbour's record, so
//! each physical edge has exactly one storage slot.

use super::array3::Array3;
use drt_common::db::tech::LayerDirection;
use drt_common::error::{DrtError, DrtResult};
use drt_common::geom::{Dbu, GridCoord, Point, Rect};
use drt_common::util::logger::Tool;
use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dir {
    E,
    N,
    U,
    W,
    S,
    D,
}

impl Dir {
    /// Neighbour expansion order of the maze search.
    pub const ALL: [Dir; 6] = [Dir::E, Dir::N, Dir::U, Dir::W, Dir::S, Dir::D];

    pub fn reverse(self) -> Dir {
        match self {
            Dir::E => Dir::W,
            Dir::N => Dir::S,
            Dir::U => Dir::D,
            Dir::W => Dir::E,
            Dir::S => Dir::N,
            Dir::D => Dir::U,
        }
    }

    pub fn is_via(self) -> bool {
        matches!(self, Dir::U | Dir::D)
    }

    fn class(self) -> usize {
        match self {
            Dir::E | Dir::W => 0,
            Dir::N | Dir::S => 1,
            Dir::U | Dir::D => 2,
        }
    }

    fn is_forward(self) -> bool {
        matches!(self, Dir::E | Dir::N | Dir::U)
    }

    fn to_bits(self) -> u8 {
        self as u8 + 1
    }

    fn from_bits(v: u8) -> Option<Dir> {
        Dir::ALL.get(v.checked_sub(1)? as usize).copied()
    }
}

const EDGE: [u8; 3] = [1 << 0, 1 << 1, 1 << 2];
const BLOCKED: [u8; 3] = [1 << 3, 1 << 4, 1 << 5];
const SRC: u8 = 1 << 6;
const DST: u8 = 1 << 7;

/// Per-edge bookkeeping. `capacity`/`usage` serve the coarse grid; `shape`,
/// `marker` and `history` are search cost annotations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EdgeData {
    pub capacity: u16,
    pub usage: u16,
    pub shape: u16,
    pub marker: u32,
    pub history: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct GridLayer {
    pub direction: LayerDirection,
    pub pitch: Dbu,
    pub tech_layer: u8,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CostParams {
    /// Added once per foreign shape covering the edge.
    pub shape_cost: u64,
    /// Added per unit of usage at or above capacity. Zero disables
    /// congestion costing.
    pub overflow_penalty: u64,
}

pub struct GridGraph {
    x_coords: Vec<Dbu>,
    y_coords: Vec<Dbu>,
    z_heights: Vec<Dbu>,
    z_dirs: Vec<LayerDirection>,
    z_layers: Vec<u8>,
    two_d: bool,
    bits: Array3<u8>,
    prev_dir: Array3<u8>,
    edges: Array3<[EdgeData; 3]>,
}

fn strictly_increasing(v: &[Dbu]) -> bool {
    v.windows(2).all(|w| w[0] < w[1])
}

impl GridGraph {
    /// Allocates the lattice. Edges are added separately by
    /// [`GridGraph::init_edges`].
    ///
    /// In 2-D mode all layers collapse into one plane with no preferred
    /// direction and no via edges.
    pub fn new(
        x_coords: Vec<Dbu>,
        y_coords: Vec<Dbu>,
        layers: &[GridLayer],
        two_d: bool,
        via_cost_factor: Dbu,
    ) -> DrtResult<Self> {
        if x_coords.is_empty() || y_coords.is_empty() {
            return Err(DrtError::config(Tool::Drt, 10, "empty gcell pattern"));
        }
        if !strictly_increasing(&x_coords) || !strictly_increasing(&y_coords) {
            return Err(DrtError::config(
                Tool::Drt,
                11,
                "grid coordinates are not strictly increasing",
            ));
        }
        let Some(first) = layers.first() else {
            return Err(DrtError::config(Tool::Drt, 1, "no routing layers defined"));
        };
        if !two_d
            && let Some(z) = layers
                .iter()
                .position(|l| l.direction == LayerDirection::Unknown)
        {
            return Err(DrtError::config(
                Tool::Drt,
                2,
                format!("layer {} has no preferred direction", layers[z].tech_layer),
            ));
        }

        let (z_heights, z_dirs, z_layers) = if two_d {
            (vec![0], vec![LayerDirection::Unknown], vec![first.tech_layer])
        } else {
            let factor = via_cost_factor.max(1);
            let mut heights = Vec::with_capacity(layers.len());
            let mut h = 0;
            for (z, l) in layers.iter().enumerate() {
                if z > 0 {
                    h += l.pitch.max(1) * factor;
                }
                heights.push(h);
            }
            (
                heights,
                layers.iter().map(|l| l.direction).collect(),
                layers.iter().map(|l| l.tech_layer).collect(),
            )
        };

        let (nx, ny, nz) = (x_coords.len(), y_coords.len(), z_heights.len());
        log::debug!(target: "drt", "grid graph {}x{}x{}", nx, ny, nz);
        Ok(Self {
            x_coords,
            y_coords,
            z_heights,
            z_dirs,
            z_layers,
            two_d,
            bits: Array3::new(nx, ny, nz, 0),
            prev_dir: Array3::new(nx, ny, nz, 0),
            edges: Array3::new(nx, ny, nz, [EdgeData::default(); 3]),
        })
    }

    /// Lattice edges from position and layer direction alone.
    pub fn init_edges(&mut self) {
        let (nx, ny, nz) = self.dims();
        for z in 0..nz {
            let dir = self.z_dirs[z as usize];
            for y in 0..ny {
                for x in 0..nx {
                    let c = GridCoord::new(x, y, z);
                    if x + 1 < nx && dir.allows_horizontal() {
                        self.add_edge(c, Dir::E);
                    }
                    if y + 1 < ny && dir.allows_vertical() {
                        self.add_edge(c, Dir::N);
                    }
                    if z + 1 < nz && !self.two_d {
                        self.add_edge(c, Dir::U);
                    }
                }
            }
        }
    }

    pub fn dims(&self) -> (u32, u32, u8) {
        (
            self.x_coords.len() as u32,
            self.y_coords.len() as u32,
            self.z_heights.len() as u8,
        )
    }

    pub fn num_nodes(&self) -> usize {
        self.bits.len()
    }

    pub fn is_two_d(&self) -> bool {
        self.two_d
    }

    pub fn in_bounds(&self, c: GridCoord) -> bool {
        self.bits.in_bounds(c)
    }

    #[inline(always)]
    pub fn index(&self, c: GridCoord) -> usize {
        self.bits.index(c)
    }

    #[inline(always)]
    pub fn coord(&self, idx: usize) -> GridCoord {
        self.bits.coord(idx)
    }

    pub fn neighbor(&self, c: GridCoord, d: Dir) -> Option<GridCoord> {
        let (nx, ny, nz) = self.dims();
        let n = match d {
            Dir::E if c.x + 1 < nx => GridCoord::new(c.x + 1, c.y, c.z),
            Dir::N if c.y + 1 < ny => GridCoord::new(c.x, c.y + 1, c.z),
            Dir::U if c.z + 1 < nz => GridCoord::new(c.x, c.y, c.z + 1),
            Dir::W if c.x > 0 => GridCoord::new(c.x - 1, c.y, c.z),
            Dir::S if c.y > 0 => GridCoord::new(c.x, c.y - 1, c.z),
            Dir::D if c.z > 0 => GridCoord::new(c.x, c.y, c.z - 1),
            _ => return None,
        };
        Some(n)
    }

    /// Storage node and class of the edge leaving `c` towards `d`.
    fn edge_slot(&self, c: GridCoord, d: Dir) -> Option<(GridCoord, usize)> {
        if !self.in_bounds(c) {
            return None;
        }
        let n = self.neighbor(c, d)?;
        Some(if d.is_forward() { (c, d.class()) } else { (n, d.class()) })
    }

    /// Returns false when the edge already existed or has no neighbour.
    pub fn add_edge(&mut self, c: GridCoord, d: Dir) -> bool {
        let Some((n, k)) = self.edge_slot(c, d) else {
            return false;
        };
        let bits = self.bits.get_mut(n);
        if *bits & EDGE[k] != 0 {
            log::debug!(target: "drt", "duplicate edge {:?} {:?}", c, d);
            return false;
        }
        *bits |= EDGE[k];
        true
    }

    pub fn remove_edge(&mut self, c: GridCoord, d: Dir) {
        if let Some((n, k)) = self.edge_slot(c, d) {
            *self.bits.get_mut(n) &= !EDGE[k];
        }
    }

    #[inline]
    pub fn has_edge(&self, c: GridCoord, d: Dir) -> bool {
        self.edge_slot(c, d)
            .is_some_and(|(n, k)| *self.bits.get(n) & EDGE[k] != 0)
    }

    pub fn set_blocked(&mut self, c: GridCoord, d: Dir, blocked: bool) {
        if let Some((n, k)) = self.edge_slot(c, d) {
            let bits = self.bits.get_mut(n);
            if blocked {
                *bits |= BLOCKED[k];
            } else {
                *bits &= !BLOCKED[k];
            }
        }
    }

    #[inline]
    pub fn is_blocked(&self, c: GridCoord, d: Dir) -> bool {
        self.edge_slot(c, d)
            .is_some_and(|(n, k)| *self.bits.get(n) & BLOCKED[k] != 0)
    }

    /// Usable by the search: present and not blocked.
    #[inline]
    pub fn is_open(&self, c: GridCoord, d: Dir) -> bool {
        self.edge_slot(c, d).is_some_and(|(n, k)| {
            let b = *self.bits.get(n);
            b & EDGE[k] != 0 && b & BLOCKED[k] == 0
        })
    }

    fn set_flag(&mut self, c: GridCoord, flag: u8, on: bool) {
        let bits = self.bits.get_mut(c);
        if on {
            *bits |= flag;
        } else {
            *bits &= !flag;
        }
    }

    pub fn set_src(&mut self, c: GridCoord, on: bool) {
        self.set_flag(c, SRC, on);
    }

    pub fn set_dst(&mut self, c: GridCoord, on: bool) {
        self.set_flag(c, DST, on);
    }

    #[inline]
    pub fn is_src(&self, c: GridCoord) -> bool {
        *self.bits.get(c) & SRC != 0
    }

    #[inline]
    pub fn is_dst(&self, c: GridCoord) -> bool {
        *self.bits.get(c) & DST != 0
    }

    pub fn prev_dir(&self, c: GridCoord) -> Option<Dir> {
        Dir::from_bits(*self.prev_dir.get(c))
    }

    pub fn set_prev_dir(&mut self, c: GridCoord, d: Option<Dir>) {
        *self.prev_dir.get_mut(c) = d.map_or(0, Dir::to_bits);
    }

    pub fn reset_src(&mut self) {
        self.bits.iter_mut().for_each(|b| *b &= !SRC);
    }

    pub fn reset_dst(&mut self) {
        self.bits.iter_mut().for_each(|b| *b &= !DST);
    }

    pub fn reset_prev_dir(&mut self) {
        self.prev_dir.fill(0);
    }

    fn for_box(&self, lo: GridCoord, hi: GridCoord, mut f: impl FnMut(GridCoord)) {
        let (nx, ny, nz) = self.dims();
        for z in lo.z..=hi.z.min(nz.saturating_sub(1)) {
            for y in lo.y..=hi.y.min(ny.saturating_sub(1)) {
                for x in lo.x..=hi.x.min(nx.saturating_sub(1)) {
                    f(GridCoord::new(x, y, z));
                }
            }
        }
    }

    /// Box-scoped variants for use inside per-net loops.
    pub fn reset_src_in(&mut self, lo: GridCoord, hi: GridCoord) {
        let mut nodes = Vec::new();
        self.for_box(lo, hi, |c| nodes.push(c));
        for c in nodes {
            self.set_src(c, false);
        }
    }

    pub fn reset_dst_in(&mut self, lo: GridCoord, hi: GridCoord) {
        let mut nodes = Vec::new();
        self.for_box(lo, hi, |c| nodes.push(c));
        for c in nodes {
            self.set_dst(c, false);
        }
    }

    pub fn reset_prev_dir_in(&mut self, lo: GridCoord, hi: GridCoord) {
        let mut nodes = Vec::new();
        self.for_box(lo, hi, |c| nodes.push(c));
        for c in nodes {
            self.set_prev_dir(c, None);
        }
    }

    pub fn edge(&self, c: GridCoord, d: Dir) -> Option<&EdgeData> {
        self.edge_slot(c, d).map(|(n, k)| &self.edges.get(n)[k])
    }

    fn edge_mut(&mut self, c: GridCoord, d: Dir) -> Option<&mut EdgeData> {
        let (n, k) = self.edge_slot(c, d)?;
        Some(&mut self.edges.get_mut(n)[k])
    }

    pub fn capacity(&self, c: GridCoord, d: Dir) -> u16 {
        self.edge(c, d).map_or(0, |e| e.capacity)
    }

    pub fn usage(&self, c: GridCoord, d: Dir) -> u16 {
        self.edge(c, d).map_or(0, |e| e.usage)
    }

    pub fn set_capacity(&mut self, c: GridCoord, d: Dir, capacity: u16) {
        if let Some(e) = self.edge_mut(c, d) {
            e.capacity = capacity;
        }
    }

    /// Returns true when the new usage exceeds capacity; the caller owns
    /// reporting the overflow.
    pub fn set_usage(&mut self, c: GridCoord, d: Dir, usage: u16) -> bool {
        match self.edge_mut(c, d) {
            Some(e) => {
                e.usage = usage;
                e.usage > e.capacity
            }
            None => false,
        }
    }

    pub fn overflow(&self, c: GridCoord, d: Dir) -> u16 {
        self.edge(c, d)
            .map_or(0, |e| e.usage.saturating_sub(e.capacity))
    }

    pub fn total_overflow(&self) -> u64 {
        self.edges
            .iter()
            .flat_map(|slots| slots.iter())
            .map(|e| e.usage.saturating_sub(e.capacity) as u64)
            .sum()
    }

    pub fn add_shape_cost(&mut self, c: GridCoord, d: Dir, delta: i32) {
        if let Some(e) = self.edge_mut(c, d) {
            e.shape = (e.shape as i32 + delta).clamp(0, u16::MAX as i32) as u16;
        }
    }

    pub fn add_marker_cost(&mut self, c: GridCoord, d: Dir, amount: u32) {
        if let Some(e) = self.edge_mut(c, d) {
            e.marker = e.marker.saturating_add(amount);
        }
    }

    pub fn decay_marker_cost(&mut self, factor: f64) {
        for slots in self.edges.iter_mut() {
            for e in slots.iter_mut() {
                e.marker = (e.marker as f64 * factor) as u32;
            }
        }
    }

    pub fn add_history(&mut self, c: GridCoord, d: Dir, amount: u32) {
        if let Some(e) = self.edge_mut(c, d) {
            e.history = e.history.saturating_add(amount);
        }
    }

    /// Wire length for planar edges, accumulated via height for via edges.
    pub fn edge_length(&self, c: GridCoord, d: Dir) -> Dbu {
        let Some((n, k)) = self.edge_slot(c, d) else {
            return 0;
        };
        let (x, y, z) = (n.x as usize, n.y as usize, n.z as usize);
        match k {
            0 => self.x_coords[x + 1] - self.x_coords[x],
            1 => self.y_coords[y + 1] - self.y_coords[y],
            _ => self.z_heights[z + 1] - self.z_heights[z],
        }
    }

    pub fn edge_cost(&self, c: GridCoord, d: Dir, p: &CostParams) -> u64 {
        let Some(e) = self.edge(c, d) else {
            return u64::MAX;
        };
        let mut cost = self.edge_length(c, d) as u64
            + e.shape as u64 * p.shape_cost
            + e.marker as u64
            + e.history as u64;
        if p.overflow_penalty > 0 && e.usage >= e.capacity {
            cost += p.overflow_penalty * (e.usage - e.capacity + 1) as u64;
        }
        cost
    }

    pub fn x_coords(&self) -> &[Dbu] {
        &self.x_coords
    }

    pub fn y_coords(&self) -> &[Dbu] {
        &self.y_coords
    }

    pub fn z_height(&self, z: u8) -> Dbu {
        self.z_heights[z as usize]
    }

    pub fn z_dir(&self, z: u8) -> LayerDirection {
        self.z_dirs[z as usize]
    }

    /// Technology routing layer drawn at grid layer `z`.
    pub fn tech_layer(&self, z: u8) -> u8 {
        self.z_layers[z as usize]
    }

    pub fn z_of_layer(&self, tech_layer: u8) -> Option<u8> {
        if self.two_d {
            return Some(0);
        }
        self.z_layers
            .iter()
            .position(|&l| l == tech_layer)
            .map(|z| z as u8)
    }

    pub fn point(&self, c: GridCoord) -> Point {
        Point::new(self.x_coords[c.x as usize], self.y_coords[c.y as usize])
    }

    pub fn bbox(&self) -> Rect {
        let (nx, ny, _) = self.dims();
        Rect::new(
            self.point(GridCoord::new(0, 0, 0)),
            self.point(GridCoord::new(nx - 1, ny - 1, 0)),
        )
    }

    fn nearest(coords: &[Dbu], v: Dbu) -> u32 {
        match coords.binary_search(&v) {
            Ok(i) => i as u32,
            Err(0) => 0,
            Err(i) if i >= coords.len() => coords.len() as u32 - 1,
            Err(i) => {
                if v - coords[i - 1] <= coords[i] - v {
                    i as u32 - 1
                } else {
                    i as u32
                }
            }
        }
    }

    fn range(coords: &[Dbu], lo: Dbu, hi: Dbu) -> Range<u32> {
        let start = coords.partition_point(|&c| c < lo);
        let end = coords.partition_point(|&c| c <= hi);
        start as u32..end.max(start) as u32
    }

    pub fn nearest_node(&self, p: Point, z: u8) -> GridCoord {
        GridCoord::new(
            Self::nearest(&self.x_coords, p.x),
            Self::nearest(&self.y_coords, p.y),
            z,
        )
    }

    /// Nodes on layer `z` whose point lies inside the closed box.
    pub fn nodes_in(&self, z: u8, r: &Rect) -> Vec<GridCoord> {
        let mut out = Vec::new();
        for y in Self::range(&self.y_coords, r.min.y, r.max.y) {
            for x in Self::range(&self.x_coords, r.min.x, r.max.x) {
                out.push(GridCoord::new(x, y, z));
            }
        }
        out
    }

    /// Existing edges on layer `z` whose segment meets the closed box, plus
    /// the via edges of every node inside it.
    pub fn edges_touching(&self, z: u8, r: &Rect) -> Vec<(GridCoord, Dir)> {
        let mut out = Vec::new();
        let (nx, ny, _) = self.dims();
        let xs = Self::range(&self.x_coords, r.min.x, r.max.x);
        let ys = Self::range(&self.y_coords, r.min.y, r.max.y);
        // A planar edge meets the box when either end is inside or the box
        // sits between its ends.
        let x_lo = xs.start.saturating_sub(1);
        let y_lo = ys.start.saturating_sub(1);
        for y in ys.clone() {
            for x in x_lo..xs.end.min(nx) {
                let c = GridCoord::new(x, y, z);
                if x + 1 < nx
                    && self.x_coords[x as usize] <= r.max.x
                    && self.x_coords[x as usize + 1] >= r.min.x
                    && self.has_edge(c, Dir::E)
                {
                    out.push((c, Dir::E));
                }
            }
        }
        for x in xs.clone() {
            for y in y_lo..ys.end.min(ny) {
                let c = GridCoord::new(x, y, z);
                if y + 1 < ny
                    && self.y_coords[y as usize] <= r.max.y
                    && self.y_coords[y as usize + 1] >= r.min.y
                    && self.has_edge(c, Dir::N)
                {
                    out.push((c, Dir::N));
                }
            }
        }
        for y in ys {
            for x in xs.clone() {
                let c = GridCoord::new(x, y, z);
                for d in [Dir::U, Dir::D] {
                    if self.has_edge(c, d) {
                        out.push((c, d));
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layers(dirs: &[LayerDirection]) -> Vec<GridLayer> {
        dirs.iter()
            .enumerate()
            .map(|(i, &direction)| GridLayer {
                direction,
                pitch: 100,
                tech_layer: i as u8,
            })
            .collect()
    }

    fn coords(n: i64) -> Vec<Dbu> {
        (0..n).map(|i| i * 100).collect()
    }

    fn hv_graph() -> GridGraph {
        let mut g = GridGraph::new(
            coords(4),
            coords(3),
            &layers(&[LayerDirection::Horizontal, LayerDirection::Vertical]),
            false,
            2,
        )
        .unwrap();
        g.init_edges();
        g
    }

    #[test]
    fn init_edges_follows_layer_direction() {
        let g = hv_graph();
        let c = GridCoord::new(1, 1, 0);
        assert!(g.has_edge(c, Dir::E) && g.has_edge(c, Dir::W));
        assert!(!g.has_edge(c, Dir::N) && !g.has_edge(c, Dir::S));
        assert!(g.has_edge(c, Dir::U) && !g.has_edge(c, Dir::D));
        let up = GridCoord::new(1, 1, 1);
        assert!(g.has_edge(up, Dir::N) && !g.has_edge(up, Dir::E));
        assert!(!g.has_edge(GridCoord::new(3, 0, 0), Dir::E));
    }

    #[test]
    fn duplicate_add_is_a_no_op() {
        let mut g = hv_graph();
        assert!(!g.add_edge(GridCoord::new(0, 0, 0), Dir::E));
        assert!(!g.add_edge(GridCoord::new(1, 0, 0), Dir::W));
        g.remove_edge(GridCoord::new(1, 0, 0), Dir::W);
        assert!(!g.has_edge(GridCoord::new(0, 0, 0), Dir::E));
        assert!(g.add_edge(GridCoord::new(0, 0, 0), Dir::E));
    }

    #[test]
    fn construction_rejects_bad_input() {
        let l = layers(&[LayerDirection::Unknown]);
        assert_eq!(
            GridGraph::new(Vec::new(), coords(2), &l, true, 1).err().map(|e| e.id),
            Some(10)
        );
        assert_eq!(
            GridGraph::new(coords(2), coords(2), &l, false, 1).err().map(|e| e.id),
            Some(2)
        );
        assert!(GridGraph::new(coords(2), coords(2), &l, true, 1).is_ok());
        assert!(GridGraph::new(vec![0, 0], coords(2), &l, true, 1).is_err());
    }

    #[test]
    fn two_d_mode_has_no_vias() {
        let mut g = GridGraph::new(
            coords(3),
            coords(3),
            &layers(&[LayerDirection::Horizontal, LayerDirection::Vertical]),
            true,
            2,
        )
        .unwrap();
        g.init_edges();
        assert_eq!(g.dims(), (3, 3, 1));
        let c = GridCoord::new(1, 1, 0);
        assert!(g.has_edge(c, Dir::E) && g.has_edge(c, Dir::N));
        assert!(!g.has_edge(c, Dir::U));
        assert_eq!(g.z_of_layer(1), Some(0));
    }

    #[test]
    fn via_heights_increase_with_layer() {
        let g = GridGraph::new(
            coords(2),
            coords(2),
            &layers(&[
                LayerDirection::Horizontal,
                LayerDirection::Vertical,
                LayerDirection::Horizontal,
            ]),
            false,
            3,
        )
        .unwrap();
        assert_eq!(g.z_height(0), 0);
        assert!(g.z_height(1) < g.z_height(2));
        assert_eq!(g.z_height(2) - g.z_height(1), 300);
    }

    #[test]
    fn usage_reports_overflow() {
        let mut g = hv_graph();
        let c = GridCoord::new(0, 0, 0);
        g.set_capacity(c, Dir::E, 1);
        assert!(!g.set_usage(c, Dir::E, 1));
        assert!(g.set_usage(GridCoord::new(1, 0, 0), Dir::W, 3));
        assert_eq!(g.overflow(c, Dir::E), 2);
        assert_eq!(g.total_overflow(), 2);
    }

    #[test]
    fn scoped_reset_leaves_other_nodes() {
        let mut g = hv_graph();
        let a = GridCoord::new(0, 0, 0);
        let b = GridCoord::new(3, 2, 1);
        g.set_src(a, true);
        g.set_src(b, true);
        g.set_prev_dir(b, Some(Dir::N));
        g.reset_src_in(a, GridCoord::new(1, 1, 0));
        assert!(!g.is_src(a) && g.is_src(b));
        assert_eq!(g.prev_dir(b), Some(Dir::N));
        g.reset_prev_dir();
        assert_eq!(g.prev_dir(b), None);
    }

    #[test]
    fn edges_touching_finds_crossing_segments() {
        let g = hv_graph();
        // Box between x=100 and x=200 on row y=100 touches no node.
        let hits = g.edges_touching(0, &Rect::from_coords(140, 90, 160, 110));
        assert_eq!(hits, vec![(GridCoord::new(1, 1, 0), Dir::E)]);
    }
}
