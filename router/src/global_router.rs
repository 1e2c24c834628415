use crate::algo::maze::{self, MazeSearch, NoGuide, SearchParams};
use crate::grid::{CostParams, Dir, GridGraph, GridLayer};
use drt_common::db::design::{Design, TrackAxis};
use drt_common::db::indices::NetId;
use drt_common::db::tech::LayerDirection;
use drt_common::error::DrtResult;
use drt_common::geom::{Dbu, GridCoord};
use drt_common::util::config::Config;
use drt_common::util::logger::Tool;
use drt_common::util::profiler::ScopedTimer;
use drt_common::{report_info, report_warn};
use std::collections::BTreeSet;

/// GCells, as `(ix, iy)`, a net's detailed route should stay within.
pub type Guide = Vec<(u32, u32)>;

fn step_dir(a: GridCoord, b: GridCoord) -> Option<Dir> {
    Dir::ALL
        .into_iter()
        .find(|&d| match d {
            Dir::E => b.x == a.x + 1 && b.y == a.y && b.z == a.z,
            Dir::N => b.y == a.y + 1 && b.x == a.x && b.z == a.z,
            Dir::U => b.z == a.z + 1 && b.x == a.x && b.y == a.y,
            Dir::W => a.x == b.x + 1 && b.y == a.y && b.z == a.z,
            Dir::S => a.y == b.y + 1 && b.x == a.x && b.z == a.z,
            Dir::D => a.z == b.z + 1 && b.x == a.x && b.y == a.y,
        })
}

/// Coarse lattice over GCell centres. Planar capacity is the number of
/// tracks crossing the GCell boundary; vias are uncapacitated.
fn build_graph(design: &Design, config: &Config) -> DrtResult<GridGraph> {
    let g = &design.gcell;
    let xs: Vec<Dbu> = (0..g.count_x).map(|ix| g.gcell_box(ix, 0).center().x).collect();
    let ys: Vec<Dbu> = (0..g.count_y).map(|iy| g.gcell_box(0, iy).center().y).collect();
    let layers: Vec<GridLayer> = design
        .tech
        .layers
        .iter()
        .map(|l| GridLayer {
            direction: l.direction,
            pitch: l.pitch,
            tech_layer: l.index,
        })
        .collect();
    let mut graph = GridGraph::new(xs, ys, &layers, config.grid.two_d, config.grid.via_cost_factor)?;
    graph.init_edges();

    let tracks_in = |layer: Option<u8>, axis: TrackAxis, lo: Dbu, hi: Dbu| -> u16 {
        design
            .tracks
            .iter()
            .filter(|t| t.axis == axis && layer.is_none_or(|l| t.layer == l))
            .map(|t| t.coords_in(lo, hi - 1).count())
            .sum::<usize>()
            .min(u16::MAX as usize) as u16
    };
    let (nx, ny, nz) = graph.dims();
    for z in 0..nz {
        let layer = (!graph.is_two_d()).then(|| graph.tech_layer(z));
        for y in 0..ny {
            for x in 0..nx {
                let c = GridCoord::new(x, y, z);
                let b = g.gcell_box(x, y);
                if graph.has_edge(c, Dir::E) {
                    graph.set_capacity(c, Dir::E, tracks_in(layer, TrackAxis::Y, b.min.y, b.max.y));
                }
                if graph.has_edge(c, Dir::N) {
                    graph.set_capacity(c, Dir::N, tracks_in(layer, TrackAxis::X, b.min.x, b.max.x));
                }
                if graph.has_edge(c, Dir::U) {
                    graph.set_capacity(c, Dir::U, u16::MAX);
                }
            }
        }
    }
    Ok(graph)
}

/// Pin GCells of a net, one node per distinct GCell and layer.
fn pin_nodes(design: &Design, graph: &GridGraph, net: NetId) -> Vec<GridCoord> {
    let mut nodes: Vec<GridCoord> = design.nets[net.index()]
        .pins
        .iter()
        .filter_map(|&p| {
            let pin = design.pin(p);
            let (z, rect) = pin.shapes.first()?;
            let gz = graph.z_of_layer(*z)?;
            let (ix, iy) = design.gcell.index_of(rect.center());
            Some(GridCoord::new(ix, iy, gz))
        })
        .collect();
    // First pin stays first so the route grows from it.
    let first = nodes.first().copied();
    nodes.sort_unstable();
    nodes.dedup();
    if let Some(f) = first
        && let Some(k) = nodes.iter().position(|&n| n == f)
    {
        nodes.swap(0, k);
    }
    nodes
}

struct Negotiator {
    graph: GridGraph,
    search: MazeSearch,
    params: SearchParams,
    paths: Vec<Vec<Vec<GridCoord>>>,
}

impl Negotiator {
    fn apply(&mut self, net: usize, delta: i32) {
        for path in &self.paths[net] {
            for w in path.windows(2) {
                let Some(d) = step_dir(w[0], w[1]) else {
                    continue;
                };
                let usage = (self.graph.usage(w[0], d) as i32 + delta).max(0) as u16;
                self.graph.set_usage(w[0], d, usage);
            }
        }
    }

    fn route(&mut self, net: NetId, pins: &[GridCoord]) -> DrtResult<()> {
        let clusters: Vec<Vec<GridCoord>> = pins.iter().map(|&p| vec![p]).collect();
        let route = maze::connect(&mut self.search, &mut self.graph, net, &clusters, &self.params, &NoGuide)?;
        if let Some(e) = &route.failure {
            report_warn!(Tool::Grt, 4, "net {:?} partially routed: {}", net, e);
        }
        self.paths[net.index()] = route.paths;
        self.apply(net.index(), 1);
        Ok(())
    }

    fn is_congested(&self, net: usize) -> bool {
        self.paths[net].iter().any(|path| {
            path.windows(2).any(|w| {
                step_dir(w[0], w[1]).is_some_and(|d| !d.is_via() && self.graph.overflow(w[0], d) > 0)
            })
        })
    }

    fn add_history(&mut self, amount: u32) {
        let (nx, ny, nz) = self.graph.dims();
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let c = GridCoord::new(x, y, z);
                    for d in [Dir::E, Dir::N] {
                        if self.graph.overflow(c, d) > 0 {
                            self.graph.add_history(c, d, amount);
                        }
                    }
                }
            }
        }
    }
}

/// Negotiated-congestion routing on the GCell grid. Returns one guide per
/// net, indexed by net id; nets the coarse search cannot finish get the
/// partial guide found so far.
pub fn run(design: &Design, config: &Config) -> DrtResult<Vec<Guide>> {
    let _timer = ScopedTimer::new(Tool::Grt, "global routing");
    let gr = &config.global_routing;
    let graph = build_graph(design, config)?;
    let step = design.gcell.step_x.max(design.gcell.step_y).max(1) as u64;
    let params = SearchParams {
        cost: CostParams {
            shape_cost: 0,
            overflow_penalty: gr.overflow_penalty as u64 * step,
        },
        guide_penalty: 0,
        max_expansions: config.detailed_routing.max_expansions,
    };
    let num_nets = design.num_nets();
    report_info!(Tool::Grt, 1, "routing {} nets on a {:?} gcell grid", num_nets, graph.dims());

    let mut neg = Negotiator {
        graph,
        search: MazeSearch::new(),
        params,
        paths: vec![Vec::new(); num_nets],
    };
    let pins: Vec<Vec<GridCoord>> = (0..num_nets)
        .map(|n| pin_nodes(design, &neg.graph, NetId::new(n)))
        .collect();

    for (n, p) in pins.iter().enumerate() {
        neg.route(NetId::new(n), p)?;
    }

    let history = (gr.history_increment as u64 * step).min(u32::MAX as u64) as u32;
    for iter in 0..gr.max_iterations {
        let overflow = neg.graph.total_overflow();
        if overflow == 0 {
            report_info!(Tool::Grt, 2, "converged after {} iterations", iter);
            break;
        }
        neg.add_history(history);
        let congested: BTreeSet<usize> = (0..num_nets).filter(|&n| neg.is_congested(n)).collect();
        log::info!(
            target: "grt",
            "iteration {}: overflow {}, rerouting {} nets",
            iter,
            overflow,
            congested.len()
        );
        if congested.is_empty() {
            break;
        }
        for &n in &congested {
            neg.apply(n, -1);
        }
        for &n in &congested {
            neg.route(NetId::new(n), &pins[n])?;
        }
    }
    let overflow = neg.graph.total_overflow();
    if overflow > 0 {
        report_warn!(Tool::Grt, 3, "{} units of overflow remain after {} iterations", overflow, gr.max_iterations);
    }

    let (nx, ny, _) = neg.graph.dims();
    let bloat = gr.guide_bloat;
    let guides = (0..num_nets)
        .map(|n| {
            let mut cells = BTreeSet::new();
            let nodes = neg.paths[n].iter().flatten().chain(pins[n].iter());
            for c in nodes {
                for y in c.y.saturating_sub(bloat)..=(c.y + bloat).min(ny - 1) {
                    for x in c.x.saturating_sub(bloat)..=(c.x + bloat).min(nx - 1) {
                        cells.insert((x, y));
                    }
                }
            }
            cells.into_iter().collect()
        })
        .collect();
    Ok(guides)
}
