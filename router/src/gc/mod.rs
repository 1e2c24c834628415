//! Geometry checker: design-rule violations inside one region.

pub mod marker;
mod rules;

pub use marker::{Constraint, Marker, MarkerKey};

use crate::region_query::{Owner, RegionQuery};
use drt_common::db::design::Design;
use drt_common::db::indices::NetId;
use drt_common::db::tech::{LayerRef, Tech};
use drt_common::geom::rtree::SpatialIndex;
use drt_common::geom::{Dbu, Rect};
use drt_common::util::config::DrcConfig;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct GcShape {
    pub layer: LayerRef,
    pub rect: Rect,
    pub owner: Owner,
    /// `None` for obstructions.
    pub net: Option<NetId>,
}

impl GcShape {
    fn is_fixed(&self) -> bool {
        self.owner.is_fixed()
    }
}

pub struct GcWorker<'a> {
    tech: &'a Tech,
    ignore: DrcConfig,
    target_net: Option<NetId>,
    region: Rect,
    /// `region` bloated by the furthest rule reach; shapes were gathered
    /// from here, so polygons crossing it are only partly seen.
    context: Rect,
    shapes: Vec<GcShape>,
    index: Vec<SpatialIndex<usize>>,
    markers: BTreeMap<MarkerKey, Marker>,
}

impl<'a> GcWorker<'a> {
    pub fn new(tech: &'a Tech, config: &DrcConfig) -> Self {
        Self {
            tech,
            ignore: config.clone(),
            target_net: None,
            region: Rect::default(),
            context: Rect::default(),
            shapes: Vec::new(),
            index: Vec::new(),
            markers: BTreeMap::new(),
        }
    }

    /// Restricts checking to pairs involving `net`.
    pub fn set_target_net(&mut self, net: Option<NetId>) {
        self.target_net = net;
    }

    pub fn set_ignore_min_area(&mut self, on: bool) {
        self.ignore.ignore_min_area = on;
    }

    pub fn set_ignore_min_step(&mut self, on: bool) {
        self.ignore.ignore_min_step = on;
    }

    pub fn set_ignore_eol(&mut self, on: bool) {
        self.ignore.ignore_eol = on;
    }

    pub fn set_ignore_corner(&mut self, on: bool) {
        self.ignore.ignore_corner = on;
    }

    pub fn set_ignore_cut_spacing(&mut self, on: bool) {
        self.ignore.ignore_cut_spacing = on;
    }

    /// Skip pairs of two fixed shapes.
    pub fn set_ignore_db(&mut self, on: bool) {
        self.ignore.ignore_db = on;
    }

    /// Furthest distance any rule of the technology looks.
    pub fn max_reach(tech: &Tech) -> Dbu {
        let metal = tech.layers.iter().map(|l| l.max_reach()).max().unwrap_or(0);
        let cut = tech.cut_layers.iter().map(|c| c.spacing).max().unwrap_or(0);
        metal.max(cut)
    }

    /// Snapshots every shape of `rq` within reach of `region` and resolves
    /// each owner to its net.
    pub fn init(&mut self, design: &Design, rq: &RegionQuery, region: Rect) {
        let context = region.bloat(Self::max_reach(self.tech));
        let mut shapes = Vec::new();
        for slot in 0..rq.num_slots() {
            let layer = LayerRef::from_slot(slot);
            for (rect, owner) in rq.query_shapes(&context, layer) {
                let net = match owner {
                    Owner::Net(n) => Some(n),
                    Owner::Pin(p) => Some(design.pin(p).net),
                    Owner::Obstruction(_) => None,
                };
                shapes.push(GcShape {
                    layer,
                    rect,
                    owner,
                    net,
                });
            }
        }
        self.load(shapes, region);
    }

    pub(crate) fn load(&mut self, shapes: Vec<GcShape>, region: Rect) {
        self.region = region;
        self.context = region.bloat(Self::max_reach(self.tech));
        self.markers.clear();
        let slots = 2 * self.tech.num_layers().max(1);
        let mut per_slot: Vec<Vec<(Rect, usize)>> = vec![Vec::new(); slots];
        for (i, s) in shapes.iter().enumerate() {
            if let Some(v) = per_slot.get_mut(s.layer.slot()) {
                v.push((s.rect, i));
            }
        }
        self.index = per_slot.into_iter().map(SpatialIndex::bulk_load).collect();
        self.shapes = shapes;
        log::debug!(target: "drt", "gc loaded {} shapes over {:?}", self.shapes.len(), region);
    }

    pub fn num_shapes(&self) -> usize {
        self.shapes.len()
    }

    /// Runs every enabled rule and returns the distinct markers meeting the
    /// region, ordered by key.
    pub fn main(&mut self) -> Vec<Marker> {
        self.markers.clear();
        for i in 0..self.shapes.len() {
            match self.shapes[i].layer {
                LayerRef::Routing(_) => {
                    self.check_metal(i);
                    if !self.ignore.ignore_eol {
                        self.check_eol(i);
                    }
                    self.check_min_width(i);
                }
                LayerRef::Cut(_) => {
                    if !self.ignore.ignore_cut_spacing {
                        self.check_cut(i);
                    }
                }
            }
        }
        if !self.ignore.ignore_min_area || !self.ignore.ignore_min_step {
            self.check_polygons();
        }
        let region = self.region;
        self.markers
            .values()
            .filter(|m| m.bbox.intersects(&region))
            .cloned()
            .collect()
    }

    fn add_marker(&mut self, m: Marker) {
        self.markers.entry(m.key()).or_insert(m);
    }

    /// Neighbour candidates of shape `i` on its own layer within `reach`,
    /// in index order.
    fn neighbours(&self, i: usize, reach: Dbu) -> Vec<usize> {
        let s = &self.shapes[i];
        let Some(index) = self.index.get(s.layer.slot()) else {
            return Vec::new();
        };
        let mut out: Vec<usize> = index
            .query(s.rect.bloat(reach))
            .into_iter()
            .map(|(_, j)| j)
            .filter(|&j| j != i)
            .collect();
        out.sort_unstable();
        out
    }

    /// Target-net filter and the fixed-pair filter, shared by pair rules.
    fn pair_enabled(&self, a: &GcShape, b: &GcShape) -> bool {
        if self.ignore.ignore_db && a.is_fixed() && b.is_fixed() {
            return false;
        }
        match self.target_net {
            Some(t) => a.net == Some(t) || b.net == Some(t),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drt_common::db::indices::{ObsId, PinId};
    use drt_common::db::tech::{LayerDirection, RoutingLayer};

    fn tech() -> Tech {
        let mut t = Tech::new(1000);
        let mut m1 = RoutingLayer::new("M1".into(), 0, LayerDirection::Horizontal, 200, 100);
        m1.spacing = drt_common::db::tech::SpacingTable::simple(100);
        t.add_layer(m1);
        t.finalize();
        t
    }

    fn wire(net: u32, r: Rect) -> GcShape {
        GcShape {
            layer: LayerRef::Routing(0),
            rect: r,
            owner: Owner::Net(NetId(net)),
            net: Some(NetId(net)),
        }
    }

    #[test]
    fn short_between_nets() {
        let t = tech();
        let mut gc = GcWorker::new(&t, &DrcConfig::default());
        gc.load(
            vec![
                wire(0, Rect::from_coords(0, 0, 1000, 100)),
                wire(1, Rect::from_coords(500, 50, 1500, 150)),
            ],
            Rect::from_coords(0, 0, 2000, 2000),
        );
        let markers = gc.main();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].constraint, Constraint::Short);
        assert_eq!(markers[0].bbox, Rect::from_coords(500, 50, 1000, 100));
    }

    #[test]
    fn same_net_overlap_is_clean() {
        let t = tech();
        let mut gc = GcWorker::new(&t, &DrcConfig::default());
        gc.load(
            vec![
                wire(3, Rect::from_coords(0, 0, 1000, 100)),
                wire(3, Rect::from_coords(900, 0, 1000, 1000)),
            ],
            Rect::from_coords(0, 0, 2000, 2000),
        );
        assert!(gc.main().is_empty());
    }

    #[test]
    fn ignore_db_skips_fixed_pairs() {
        let t = tech();
        let fixed = |owner, net| GcShape {
            layer: LayerRef::Routing(0),
            rect: Rect::from_coords(0, 0, 100, 100),
            owner,
            net,
        };
        let shapes = vec![
            fixed(Owner::Pin(PinId(0)), Some(NetId(0))),
            GcShape {
                rect: Rect::from_coords(150, 0, 250, 100),
                ..fixed(Owner::Obstruction(ObsId(0)), None)
            },
        ];
        let region = Rect::from_coords(0, 0, 1000, 1000);
        let mut gc = GcWorker::new(&t, &DrcConfig::default());
        gc.load(shapes.clone(), region);
        assert_eq!(gc.main().len(), 1);
        gc.set_ignore_db(true);
        gc.load(shapes, region);
        assert!(gc.main().is_empty());
    }

    #[test]
    fn target_net_filters_pairs() {
        let t = tech();
        let mut gc = GcWorker::new(&t, &DrcConfig::default());
        gc.set_target_net(Some(NetId(7)));
        gc.load(
            vec![
                wire(0, Rect::from_coords(0, 0, 1000, 100)),
                wire(1, Rect::from_coords(0, 150, 1000, 250)),
            ],
            Rect::from_coords(0, 0, 2000, 2000),
        );
        assert!(gc.main().is_empty());
    }
}
