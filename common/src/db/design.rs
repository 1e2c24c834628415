use crate::db::indices::*;
use crate::db::tech::{LayerRef, Tech};
use crate::geom::{Dbu, Orientation, Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Uniform GCell tiling anchored at `origin`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GCellPattern {
    pub origin: Point,
    pub step_x: Dbu,
    pub step_y: Dbu,
    pub count_x: u32,
    pub count_y: u32,
}

impl GCellPattern {
    /// Tiles `die` with square cells of `step`, the last row/column absorbing
    /// the remainder.
    pub fn from_die(die: &Rect, step: Dbu) -> Self {
        if step <= 0 || die.width() <= 0 || die.height() <= 0 {
            return Self::default();
        }
        Self {
            origin: die.min,
            step_x: step,
            step_y: step,
            count_x: ((die.width() + step - 1) / step) as u32,
            count_y: ((die.height() + step - 1) / step) as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count_x == 0 || self.count_y == 0 || self.step_x <= 0 || self.step_y <= 0
    }

    pub fn gcell_box(&self, ix: u32, iy: u32) -> Rect {
        let x0 = self.origin.x + ix as Dbu * self.step_x;
        let y0 = self.origin.y + iy as Dbu * self.step_y;
        Rect::from_coords(x0, y0, x0 + self.step_x, y0 + self.step_y)
    }

    /// GCell holding `p`, clamped into the pattern. An empty pattern maps
    /// everything to (0, 0).
    pub fn index_of(&self, p: Point) -> (u32, u32) {
        if self.is_empty() {
            return (0, 0);
        }
        let ix = ((p.x - self.origin.x) / self.step_x).clamp(0, self.count_x as Dbu - 1);
        let iy = ((p.y - self.origin.y) / self.step_y).clamp(0, self.count_y as Dbu - 1);
        (ix as u32, iy as u32)
    }
}

/// DEF `TRACKS X` lays vertical tracks at x coordinates; `TRACKS Y` lays
/// horizontal tracks at y coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackAxis {
    X,
    Y,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackPattern {
    pub layer: u8,
    pub axis: TrackAxis,
    pub start: Dbu,
    pub num: u32,
    pub step: Dbu,
}

impl TrackPattern {
    pub fn coords_in(&self, lo: Dbu, hi: Dbu) -> impl Iterator<Item = Dbu> + '_ {
        (0..self.num as Dbu)
            .map(move |i| self.start + i * self.step)
            .filter(move |&c| c >= lo && c <= hi)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathSeg {
    pub layer: u8,
    pub begin: Point,
    pub end: Point,
    pub width: Dbu,
}

impl PathSeg {
    /// Wire rectangle with half-width extension past both end points.
    pub fn rect(&self) -> Rect {
        Rect::new(self.begin, self.end).bloat(self.width / 2)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViaInst {
    pub def: ViaDefId,
    pub origin: Point,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteShape {
    Wire(PathSeg),
    Via(ViaInst),
}

#[derive(Clone, Debug)]
pub struct PinData {
    pub name: String,
    pub net: NetId,
    /// Owning instance; `None` for IO pins.
    pub cell: Option<CellId>,
    pub shapes: Vec<(u8, Rect)>,
}

impl PinData {
    pub fn bbox(&self) -> Option<Rect> {
        self.shapes.iter().map(|(_, r)| *r).reduce(|a, b| a.merge(&b))
    }
}

#[derive(Clone, Debug)]
pub struct NetData {
    pub name: String,
    pub pins: Vec<PinId>,
    pub route: Vec<RouteShape>,
}

#[derive(Clone, Debug)]
pub struct CellData {
    pub name: String,
    pub lib_name: String,
    pub width: Dbu,
    pub height: Dbu,
    pub is_fixed: bool,
    pub pos: Point,
    pub orient: Orientation,
}

/// Placement row of `num_sites` sites starting at `origin`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    pub name: String,
    pub origin: Point,
    pub num_sites: u32,
    pub site_width: Dbu,
    pub height: Dbu,
}

impl Row {
    pub fn bbox(&self) -> Rect {
        Rect::from_coords(
            self.origin.x,
            self.origin.y,
            self.origin.x + self.num_sites as Dbu * self.site_width,
            self.origin.y + self.height,
        )
    }
}

#[derive(Clone, Debug)]
pub struct Obstruction {
    pub layer: LayerRef,
    pub rect: Rect,
}

#[derive(Clone, Debug, Default)]
pub struct MacroDef {
    pub width: Dbu,
    pub height: Dbu,
    pub pins: HashMap<String, Vec<(LayerRef, Rect)>>,
    pub obs: Vec<(LayerRef, Rect)>,
}

pub struct Design {
    pub name: String,
    pub tech: Tech,
    pub die_area: Rect,
    pub gcell: GCellPattern,
    pub tracks: Vec<TrackPattern>,
    pub rows: Vec<Row>,

    pub cells: Vec<CellData>,
    pub nets: Vec<NetData>,
    pub pins: Vec<PinData>,
    pub obstructions: Vec<Obstruction>,
    pub macros: HashMap<String, MacroDef>,

    pub cell_name_map: HashMap<String, CellId>,
    pub net_name_map: HashMap<String, NetId>,
}

impl Design {
    pub fn new(tech: Tech) -> Self {
        Self {
            name: String::new(),
            tech,
            die_area: Rect::default(),
            gcell: GCellPattern::default(),
            tracks: Vec::new(),
            rows: Vec::new(),
            cells: Vec::with_capacity(1000),
            nets: Vec::with_capacity(1000),
            pins: Vec::with_capacity(5000),
            obstructions: Vec::new(),
            macros: HashMap::new(),
            cell_name_map: HashMap::new(),
            net_name_map: HashMap::new(),
        }
    }

    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    pub fn add_net(&mut self, name: String) -> NetId {
        if let Some(&id) = self.net_name_map.get(&name) {
            return id;
        }
        let id = NetId::new(self.nets.len());
        self.nets.push(NetData {
            name: name.clone(),
            pins: Vec::new(),
            route: Vec::new(),
        });
        self.net_name_map.insert(name, id);
        id
    }

    pub fn add_pin(
        &mut self,
        net: NetId,
        name: String,
        cell: Option<CellId>,
        shapes: Vec<(u8, Rect)>,
    ) -> PinId {
        let id = PinId::new(self.pins.len());
        self.pins.push(PinData {
            name,
            net,
            cell,
            shapes,
        });
        self.nets[net.index()].pins.push(id);
        id
    }

    pub fn add_cell(&mut self, cell: CellData) -> CellId {
        let id = CellId::new(self.cells.len());
        self.cell_name_map.insert(cell.name.clone(), id);
        self.cells.push(cell);
        id
    }

    pub fn add_obstruction(&mut self, layer: LayerRef, rect: Rect) -> ObsId {
        let id = ObsId::new(self.obstructions.len());
        self.obstructions.push(Obstruction { layer, rect });
        id
    }

    pub fn pin(&self, id: PinId) -> &PinData {
        &self.pins[id.index()]
    }

    pub fn net_bbox(&self, net: NetId) -> Option<Rect> {
        self.nets[net.index()]
            .pins
            .iter()
            .filter_map(|&p| self.pins[p.index()].bbox())
            .reduce(|a, b| a.merge(&b))
    }

    /// Falls back to a die-sized tiling when DEF carried no GCELLGRID.
    pub fn ensure_gcell_pattern(&mut self, default_tracks: Dbu) {
        if !self.gcell.is_empty() {
            return;
        }
        let pitch = self
            .tech
            .layers
            .iter()
            .map(|l| l.pitch)
            .filter(|&p| p > 0)
            .max()
            .unwrap_or(0);
        self.gcell = GCellPattern::from_die(&self.die_area, pitch * default_tracks);
    }

    /// Synthesizes one track pattern per layer from pitch/offset when DEF
    /// carried no TRACKS.
    pub fn ensure_tracks(&mut self) {
        for layer in &self.tech.layers {
            if self.tracks.iter().any(|t| t.layer == layer.index) || layer.pitch <= 0 {
                continue;
            }
            let (axis, lo, span) = if layer.direction.allows_horizontal()
                && !layer.direction.allows_vertical()
            {
                (TrackAxis::Y, self.die_area.min.y, self.die_area.height())
            } else {
                (TrackAxis::X, self.die_area.min.x, self.die_area.width())
            };
            let start = lo + if layer.offset > 0 { layer.offset } else { layer.pitch / 2 };
            let num = if span > start - lo {
                ((span - (start - lo)) / layer.pitch + 1) as u32
            } else {
                0
            };
            self.tracks.push(TrackPattern {
                layer: layer.index,
                axis,
                start,
                num,
                step: layer.pitch,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tech::{LayerDirection, RoutingLayer};

    #[test]
    fn gcell_pattern_covers_die() {
        let die = Rect::from_coords(0, 0, 1050, 1000);
        let g = GCellPattern::from_die(&die, 100);
        assert_eq!((g.count_x, g.count_y), (11, 10));
        assert_eq!(g.index_of(Point::new(1049, 999)), (10, 9));
        assert_eq!(g.gcell_box(1, 2), Rect::from_coords(100, 200, 200, 300));
        assert!(GCellPattern::from_die(&die, 0).is_empty());
    }

    #[test]
    fn empty_gcell_pattern_indexes_to_origin() {
        let g = GCellPattern::default();
        assert!(g.is_empty());
        assert_eq!(g.index_of(Point::new(500, -20)), (0, 0));
    }

    #[test]
    fn net_bbox_spans_pins() {
        let mut d = Design::new(Tech::default());
        let n = d.add_net("a".into());
        assert_eq!(d.add_net("a".into()), n);
        d.add_pin(n, "p0".into(), None, vec![(0, Rect::from_coords(0, 0, 10, 10))]);
        d.add_pin(n, "p1".into(), None, vec![(0, Rect::from_coords(90, 40, 100, 50))]);
        assert_eq!(d.net_bbox(n), Some(Rect::from_coords(0, 0, 100, 50)));
    }

    #[test]
    fn synthesized_tracks_follow_layer_direction() {
        let mut tech = Tech::default();
        tech.add_layer(RoutingLayer::new("M1".into(), 0, LayerDirection::Horizontal, 100, 50));
        let mut d = Design::new(tech);
        d.die_area = Rect::from_coords(0, 0, 1000, 1000);
        d.ensure_tracks();
        let t = &d.tracks[0];
        assert_eq!(t.axis, TrackAxis::Y);
        assert_eq!(t.start, 50);
        assert_eq!(t.coords_in(0, 1000).count(), 10);
    }
}
