//! Detailed routing of one bounded region.
//!
//! A worker owns a private lattice and region query over its extension box.
//! Obstructions, pins of other nets and routes outside the worker's net set
//! block edges; the worker's own pins and committed wires add shape cost so
//! that rip-up can trade them off.

use crate::algo::maze::{self, MazeSearch, SearchParams};
use crate::gc::{GcWorker, Marker};
use crate::grid::{CostParams, Dir, GridGraph, GridLayer};
use crate::region_query::{Owner, RegionQuery, ShapeSet};
use crate::utils::conversion::{GCellMap, GuideMask};
use drt_common::db::design::{Design, PathSeg, RouteShape, TrackAxis, ViaInst};
use drt_common::db::indices::NetId;
use drt_common::db::tech::{LayerRef, Tech};
use drt_common::error::{DrtError, DrtResult, ErrorKind};
use drt_common::geom::{Dbu, GridCoord, Point, Rect};
use drt_common::util::config::Config;
use drt_common::util::logger::Tool;
use drt_common::{report_info, report_warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetFailure {
    pub net: NetId,
    pub code: String,
    pub message: String,
}

impl NetFailure {
    pub fn from_error(net: NetId, e: &DrtError) -> Self {
        Self {
            net,
            code: e.code(),
            message: e.kind.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct WorkerOutcome {
    /// Every net of the worker, ascending, with its full new route.
    pub routes: Vec<(NetId, Vec<RouteShape>)>,
    pub markers: Vec<Marker>,
    pub failures: Vec<NetFailure>,
    pub iterations: usize,
}

impl WorkerOutcome {
    /// Ordering key of an outcome: unrouted nets first, then markers.
    pub fn badness(&self) -> (usize, usize) {
        (self.failures.len(), self.markers.len())
    }
}

#[derive(Clone, Debug, Default)]
struct NetAccess {
    clusters: Vec<Vec<GridCoord>>,
    /// Off-grid pins are reached by a short wire from their nearest node.
    stubs: Vec<RouteShape>,
}

/// Edges a shape on `layer` interferes with: every edge whose centre line
/// passes within spacing plus half a wire width.
fn touched(graph: &GridGraph, tech: &Tech, layer: LayerRef, rect: &Rect) -> Vec<(GridCoord, Dir)> {
    match layer {
        LayerRef::Routing(z) => {
            let (Some(gz), Some(l)) = (graph.z_of_layer(z), tech.layer(z)) else {
                return Vec::new();
            };
            graph.edges_touching(gz, &rect.bloat(l.spacing.min_spacing() + l.width / 2 - 1))
        }
        LayerRef::Cut(below) => {
            if graph.is_two_d() {
                return Vec::new();
            }
            let (Some(gz), Some(cut)) = (graph.z_of_layer(below), tech.cut_layer(below)) else {
                return Vec::new();
            };
            graph
                .nodes_in(gz, &rect.bloat(cut.spacing + cut.width / 2 - 1))
                .into_iter()
                .filter(|&n| graph.has_edge(n, Dir::U))
                .map(|n| (n, Dir::U))
                .collect()
        }
    }
}

fn track_coords(design: &Design, axis: TrackAxis, lo: Dbu, hi: Dbu) -> Vec<Dbu> {
    let layers = design.tech.num_layers();
    let mut v: Vec<Dbu> = design
        .tracks
        .iter()
        .filter(|t| t.axis == axis && (t.layer as usize) < layers)
        .flat_map(|t| t.coords_in(lo, hi))
        .collect();
    v.sort_unstable();
    v.dedup();
    v
}

fn clamp_into(p: Point, r: &Rect) -> Point {
    Point::new(p.x.clamp(r.min.x, r.max.x), p.y.clamp(r.min.y, r.max.y))
}

/// Route box grown by the configured halo and clipped to the die. A worker
/// searches only inside this box.
pub fn extension_box(design: &Design, config: &Config, route_box: Rect) -> Rect {
    let g = &design.gcell;
    let halo = config.detailed_routing.halo as Dbu * g.step_x.max(g.step_y);
    route_box
        .bloat(halo)
        .intersection(&design.die_area)
        .unwrap_or(route_box)
}

pub struct DrWorker<'a> {
    design: &'a Design,
    config: &'a Config,
    route_box: Rect,
    ext_box: Rect,
    drc_box: Rect,
    nets: Vec<NetId>,
    guides: BTreeMap<NetId, Vec<(u32, u32)>>,
    graph: GridGraph,
    rq: RegionQuery,
    guide_mask: GuideMask,
    access: BTreeMap<NetId, NetAccess>,
    routes: BTreeMap<NetId, Vec<RouteShape>>,
    failures: BTreeMap<NetId, NetFailure>,
    params: SearchParams,
    marker_cost: u32,
}

impl<'a> DrWorker<'a> {
    pub fn new(
        design: &'a Design,
        config: &'a Config,
        route_box: Rect,
        mut nets: Vec<NetId>,
        guides: BTreeMap<NetId, Vec<(u32, u32)>>,
    ) -> DrtResult<Self> {
        if design.gcell.is_empty() {
            return Err(DrtError::config(Tool::Drt, 10, "empty gcell pattern"));
        }
        nets.sort_unstable();
        nets.dedup();
        let tech = &design.tech;
        let dr = &config.detailed_routing;

        let g = &design.gcell;
        let ext_box = extension_box(design, config, route_box);
        let reach = GcWorker::max_reach(tech);
        let drc_box = route_box
            .bloat(reach)
            .intersection(&ext_box)
            .unwrap_or(route_box);

        let xs = track_coords(design, TrackAxis::X, ext_box.min.x, ext_box.max.x);
        let ys = track_coords(design, TrackAxis::Y, ext_box.min.y, ext_box.max.y);
        let layers: Vec<GridLayer> = tech
            .layers
            .iter()
            .map(|l| GridLayer {
                direction: l.direction,
                pitch: l.pitch,
                tech_layer: l.index,
            })
            .collect();
        let gcell_map = GCellMap::new(g, &xs, &ys);
        let mut graph = GridGraph::new(xs, ys, &layers, config.grid.two_d, config.grid.via_cost_factor)?;
        graph.init_edges();

        let pitch = tech.layers.iter().map(|l| l.pitch).max().unwrap_or(1).max(1) as u64;
        let params = SearchParams {
            cost: CostParams {
                shape_cost: dr.shape_cost as u64 * pitch,
                overflow_penalty: 0,
            },
            guide_penalty: dr.guide_penalty as u64 * pitch,
            max_expansions: dr.max_expansions,
        };
        let marker_cost = (dr.marker_cost as u64 * pitch).min(u32::MAX as u64) as u32;

        let mut rq = RegionQuery::new(tech.num_layers());
        let context = ext_box.bloat(reach);
        rq.init(design, &nets, context, true)?;
        // The worker replaces its nets' routes wholesale.
        for &net in &nets {
            for shape in &design.nets[net.index()].route {
                rq.remove(&ShapeSet::expand(shape, Owner::Net(net), tech)?)?;
            }
        }

        let mut worker = Self {
            design,
            config,
            route_box,
            ext_box,
            drc_box,
            nets,
            guides,
            graph,
            rq,
            guide_mask: GuideMask::new(gcell_map),
            access: BTreeMap::new(),
            routes: BTreeMap::new(),
            failures: BTreeMap::new(),
            params,
            marker_cost,
        };
        worker.init_costs(context);
        worker.init_access();
        log::debug!(
            target: "drt",
            "worker {:?}: {} nets, grid {:?}",
            route_box,
            worker.nets.len(),
            worker.graph.dims()
        );
        Ok(worker)
    }

    fn is_own(&self, net: NetId) -> bool {
        self.nets.binary_search(&net).is_ok()
    }

    fn own_net(&self, owner: Owner) -> Option<NetId> {
        let net = match owner {
            Owner::Net(n) => n,
            Owner::Pin(p) => self.design.pin(p).net,
            Owner::Obstruction(_) => return None,
        };
        self.is_own(net).then_some(net)
    }

    fn init_costs(&mut self, context: Rect) {
        let tech = &self.design.tech;
        for slot in 0..self.rq.num_slots() {
            let layer = LayerRef::from_slot(slot);
            for (rect, owner) in self.rq.query_shapes(&context, layer) {
                if self.own_net(owner).is_some() {
                    continue;
                }
                for (c, d) in touched(&self.graph, tech, layer, &rect) {
                    self.graph.set_blocked(c, d, true);
                }
            }
        }
        for net in self.nets.clone() {
            self.add_pin_cost(net, 1);
        }
    }

    fn add_pin_cost(&mut self, net: NetId, delta: i32) {
        let tech = &self.design.tech;
        for &pin in &self.design.nets[net.index()].pins {
            for (z, rect) in &self.design.pin(pin).shapes {
                for (c, d) in touched(&self.graph, tech, LayerRef::Routing(*z), rect) {
                    self.graph.add_shape_cost(c, d, delta);
                }
            }
        }
    }

    fn init_access(&mut self) {
        let tech = &self.design.tech;
        for &net in &self.nets {
            let mut access = NetAccess::default();
            for &pin in &self.design.nets[net.index()].pins {
                let shapes = &self.design.pin(pin).shapes;
                let mut nodes = Vec::new();
                for (z, rect) in shapes {
                    if let Some(gz) = self.graph.z_of_layer(*z) {
                        nodes.extend(self.graph.nodes_in(gz, rect));
                    }
                }
                nodes.sort_unstable();
                nodes.dedup();
                if nodes.is_empty() {
                    let Some(&(z, rect)) = shapes.first() else {
                        continue;
                    };
                    let Some(gz) = self.graph.z_of_layer(z) else {
                        continue;
                    };
                    let node = self.graph.nearest_node(rect.center(), gz);
                    let p = self.graph.point(node);
                    let q = clamp_into(p, &rect);
                    let layer = self.graph.tech_layer(gz);
                    let width = tech.layer(layer).map_or(0, |l| l.width);
                    let corner = Point::new(q.x, p.y);
                    for (begin, end) in [(p, corner), (corner, q)] {
                        if begin != end {
                            access.stubs.push(RouteShape::Wire(PathSeg {
                                layer,
                                begin,
                                end,
                                width,
                            }));
                        }
                    }
                    nodes.push(node);
                }
                access.clusters.push(nodes);
            }
            self.access.insert(net, access);
        }
    }

    pub fn graph(&self) -> &GridGraph {
        &self.graph
    }

    pub fn route_box(&self) -> Rect {
        self.route_box
    }

    pub fn ext_box(&self) -> Rect {
        self.ext_box
    }

    pub fn drc_box(&self) -> Rect {
        self.drc_box
    }

    fn apply_cost(&mut self, set: &ShapeSet, delta: i32) {
        let tech = &self.design.tech;
        for (layer, rect) in &set.rects {
            for (c, d) in touched(&self.graph, tech, *layer, rect) {
                self.graph.add_shape_cost(c, d, delta);
            }
        }
    }

    fn commit(&mut self, net: NetId, shapes: Vec<RouteShape>) -> DrtResult<()> {
        for shape in &shapes {
            let set = ShapeSet::expand(shape, Owner::Net(net), &self.design.tech)?;
            self.rq.add(&set)?;
            self.apply_cost(&set, 1);
        }
        self.routes.insert(net, shapes);
        Ok(())
    }

    fn ripup(&mut self, net: NetId) -> DrtResult<()> {
        let Some(shapes) = self.routes.remove(&net) else {
            return Ok(());
        };
        for shape in &shapes {
            let set = ShapeSet::expand(shape, Owner::Net(net), &self.design.tech)?;
            self.rq.remove(&set)?;
            self.apply_cost(&set, -1);
        }
        Ok(())
    }

    fn push_wires(&self, run: &[GridCoord], out: &mut Vec<RouteShape>) {
        let layer = self.graph.tech_layer(run[0].z);
        let width = self.design.tech.layer(layer).map_or(0, |l| l.width);
        let mut begin = run[0];
        for k in 1..run.len() {
            let last = k + 1 == run.len();
            let turns = !last && (run[k].x != run[k - 1].x) != (run[k + 1].x != run[k].x);
            if last || turns {
                out.push(RouteShape::Wire(PathSeg {
                    layer,
                    begin: self.graph.point(begin),
                    end: self.graph.point(run[k]),
                    width,
                }));
                begin = run[k];
            }
        }
    }

    /// Straight wire runs between turns, plus one default via per layer
    /// change.
    fn path_shapes(&self, path: &[GridCoord]) -> DrtResult<Vec<RouteShape>> {
        let mut out = Vec::new();
        let mut start = 0;
        for i in 1..path.len() {
            let (a, b) = (path[i - 1], path[i]);
            if a.z == b.z {
                continue;
            }
            if i - 1 > start {
                self.push_wires(&path[start..i], &mut out);
            }
            let bottom = self.graph.tech_layer(a.z.min(b.z));
            let def = self.design.tech.default_via(bottom).ok_or_else(|| {
                DrtError::config(Tool::Drt, 12, format!("no via above routing layer {}", bottom))
            })?;
            out.push(RouteShape::Via(ViaInst {
                def,
                origin: self.graph.point(a),
            }));
            start = i;
        }
        if path.len() > start + 1 {
            self.push_wires(&path[start..], &mut out);
        }
        Ok(out)
    }

    fn route_net(&mut self, search: &mut MazeSearch, net: NetId) -> DrtResult<()> {
        let Some(access) = self.access.get(&net) else {
            return Ok(());
        };
        if access.clusters.len() < 2 {
            return Ok(());
        }
        let clusters = access.clusters.clone();
        let stubs = access.stubs.clone();
        self.failures.remove(&net);

        self.add_pin_cost(net, -1);
        let guide = self.guides.get(&net).map_or(&[][..], |g| g.as_slice());
        self.guide_mask.prepare(net, guide);
        let mut result = maze::connect(search, &mut self.graph, net, &clusters, &self.params, &self.guide_mask);
        if let Err(e) = &result
            && matches!(e.kind, ErrorKind::CorruptSearchState(_))
        {
            report_warn!(Tool::Drt, 35, "net {:?}: searching again from a clean grid after {}", net, e);
            self.graph.reset_src();
            self.graph.reset_dst();
            self.graph.reset_prev_dir();
            result = maze::connect(search, &mut self.graph, net, &clusters, &self.params, &self.guide_mask);
        }
        self.add_pin_cost(net, 1);

        let route = result?;
        if let Some(e) = &route.failure {
            self.failures.insert(net, NetFailure::from_error(net, e));
        }
        let mut shapes = stubs;
        for path in &route.paths {
            shapes.extend(self.path_shapes(path)?);
        }
        self.commit(net, shapes)
    }

    /// Design-rule check of the current result over the drc box.
    pub fn check(&self) -> Vec<Marker> {
        let mut gc = GcWorker::new(&self.design.tech, &self.config.drc);
        gc.init(self.design, &self.rq, self.drc_box);
        gc.main()
    }

    fn snapshot(&self, markers: Vec<Marker>) -> WorkerOutcome {
        WorkerOutcome {
            routes: self
                .nets
                .iter()
                .map(|n| (*n, self.routes.get(n).cloned().unwrap_or_default()))
                .collect(),
            markers,
            failures: self.failures.values().cloned().collect(),
            iterations: 0,
        }
    }

    /// Initial routing of every net in id order, then marker-driven rip-up
    /// and reroute. The iteration with the fewest failed nets wins, ties
    /// going to fewer markers.
    pub fn run(mut self) -> DrtResult<WorkerOutcome> {
        let mut search = MazeSearch::new();
        for net in self.nets.clone() {
            self.route_net(&mut search, net)?;
        }
        let mut markers = self.check();
        let mut best = self.snapshot(markers.clone());
        let dr = &self.config.detailed_routing;
        let (max_iterations, decay) = (dr.max_iterations, dr.marker_decay);

        let mut iterations = 1;
        while iterations < max_iterations && !markers.is_empty() {
            self.graph.decay_marker_cost(decay);
            let mut dirty = BTreeSet::new();
            for m in &markers {
                for (c, d) in touched(&self.graph, &self.design.tech, m.layer, &m.bbox) {
                    self.graph.add_marker_cost(c, d, self.marker_cost);
                }
                dirty.extend(m.sources.iter().filter_map(|&o| self.own_net(o)));
            }
            if dirty.is_empty() {
                break;
            }
            for &net in &dirty {
                self.ripup(net)?;
            }
            for &net in &dirty {
                self.route_net(&mut search, net)?;
            }
            markers = self.check();
            iterations += 1;
            log::debug!(
                target: "drt",
                "worker {:?} iteration {}: rerouted {} nets, {} markers",
                self.route_box,
                iterations,
                dirty.len(),
                markers.len()
            );
            if (self.failures.len(), markers.len()) < best.badness() {
                best = self.snapshot(markers.clone());
            }
        }

        best.iterations = iterations;
        report_info!(
            Tool::Drt,
            40,
            "worker {:?}: {} nets, {} markers, {} failures",
            self.route_box,
            self.nets.len(),
            best.markers.len(),
            best.failures.len()
        );
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drt_common::db::design::{GCellPattern, TrackPattern};
    use drt_common::db::tech::{LayerDirection, RoutingLayer};

    /// Two-layer 2000 x 2000 block with tracks every 200.
    fn design() -> Design {
        let mut tech = Tech::new(1000);
        tech.add_layer(RoutingLayer::new("M1".into(), 0, LayerDirection::Horizontal, 200, 100));
        tech.add_cut_layer("V1".into(), 80, 100);
        tech.add_layer(RoutingLayer::new("M2".into(), 0, LayerDirection::Vertical, 200, 100));
        tech.finalize();
        let mut d = Design::new(tech);
        d.die_area = Rect::from_coords(0, 0, 2000, 2000);
        d.gcell = GCellPattern::from_die(&d.die_area, 1000);
        for (layer, axis) in [(0, TrackAxis::Y), (1, TrackAxis::X)] {
            d.tracks.push(TrackPattern {
                layer,
                axis,
                start: 100,
                num: 10,
                step: 200,
            });
        }
        d
    }

    fn pin_at(d: &mut Design, net: NetId, x: Dbu, y: Dbu) {
        let r = Rect::from_coords(x - 50, y - 50, x + 50, y + 50);
        d.add_pin(net, format!("p{}_{}", x, y), None, vec![(0, r)]);
    }

    #[test]
    fn routes_two_pin_net_cleanly() {
        let mut d = design();
        let n = d.add_net("n".into());
        pin_at(&mut d, n, 100, 100);
        pin_at(&mut d, n, 1700, 1300);
        let cfg = Config::default();
        let w = DrWorker::new(&d, &cfg, d.die_area, vec![n], BTreeMap::new()).unwrap();
        let out = w.run().unwrap();
        assert!(out.failures.is_empty());
        let (net, shapes) = &out.routes[0];
        assert_eq!(*net, n);
        assert!(shapes.iter().any(|s| matches!(s, RouteShape::Via(_))));
        assert!(out.markers.is_empty(), "{:?}", out.markers);
    }

    #[test]
    fn obstruction_blocks_edges() {
        let mut d = design();
        d.add_obstruction(LayerRef::Routing(0), Rect::from_coords(0, 500, 2000, 700));
        let n = d.add_net("n".into());
        pin_at(&mut d, n, 100, 100);
        let cfg = Config::default();
        let w = DrWorker::new(&d, &cfg, d.die_area, vec![n], BTreeMap::new()).unwrap();
        let g = w.graph();
        let row = g.y_coords().iter().position(|&y| y == 500).unwrap() as u32;
        assert!(g.is_blocked(GridCoord::new(0, row, 0), Dir::E));
        assert!(!g.is_blocked(GridCoord::new(0, row, 1), Dir::N));
        assert!(!g.is_blocked(GridCoord::new(0, 0, 0), Dir::E));
    }

    #[test]
    fn ext_box_stays_inside_die() {
        let d = design();
        let cfg = Config::default();
        let w = DrWorker::new(&d, &cfg, Rect::from_coords(0, 0, 1000, 1000), Vec::new(), BTreeMap::new())
            .unwrap();
        assert_eq!(w.ext_box(), d.die_area);
        assert!(w.drc_box().contains_rect(&w.route_box()));
    }

    #[test]
    fn failed_nets_outweigh_markers() {
        let marker = Marker::new(
            crate::gc::Constraint::Short,
            LayerRef::Routing(0),
            Rect::from_coords(0, 0, 10, 10),
            vec![Owner::Net(NetId(0))],
            0,
            0,
        );
        let failure = NetFailure {
            net: NetId(1),
            code: "DRT-0020".into(),
            message: "no path".into(),
        };
        let dirty = WorkerOutcome {
            markers: vec![marker.clone(), marker],
            ..Default::default()
        };
        let broken = WorkerOutcome {
            failures: vec![failure],
            ..Default::default()
        };
        assert!(dirty.badness() < broken.badness());
        assert!(WorkerOutcome::default().badness() < dirty.badness());
    }

    #[test]
    fn persistent_marker_drives_every_iteration() {
        let mut d = design();
        let n = d.add_net("n".into());
        pin_at(&mut d, n, 100, 100);
        pin_at(&mut d, n, 1700, 1300);
        // 50 from the first pin: a spacing marker no reroute can clear.
        d.add_obstruction(LayerRef::Routing(0), Rect::from_coords(200, 0, 300, 100));
        for (max_iterations, expected) in [(1, 1), (3, 3)] {
            let mut cfg = Config::default();
            cfg.detailed_routing.max_iterations = max_iterations;
            let out = DrWorker::new(&d, &cfg, d.die_area, vec![n], BTreeMap::new())
                .unwrap()
                .run()
                .unwrap();
            assert_eq!(out.iterations, expected);
            assert!(out.failures.is_empty(), "{:?}", out.failures);
            assert!(out.markers.iter().any(|m| m.constraint == crate::gc::Constraint::MetalSpacing
                && m.sources.contains(&Owner::Obstruction(drt_common::db::indices::ObsId(0)))));
        }
    }

    #[test]
    fn empty_gcell_pattern_is_rejected() {
        let mut d = design();
        d.gcell = GCellPattern::default();
        let cfg = Config::default();
        let err = DrWorker::new(&d, &cfg, d.die_area, Vec::new(), BTreeMap::new())
            .err()
            .unwrap();
        assert_eq!(err.code(), "DRT-0010");
        assert!(err.is_fatal());
    }
}
