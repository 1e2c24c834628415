use crate::grid::{CostParams, Dir, GridGraph};
use drt_common::db::indices::NetId;
use drt_common::error::{DrtError, DrtResult, ErrorKind};
use drt_common::geom::{Dbu, GridCoord, Rect};
use drt_common::util::logger::Tool;
use drt_common::{report_error, report_warn};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Frontier entry. The heap pops the lowest `f`; among equal `f` the
/// deeper node (higher `g`) first, then the earliest pushed.
#[derive(Copy, Clone, Eq, PartialEq)]
struct State {
    f: u64,
    g: u64,
    seq: u64,
    idx: u32,
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .cmp(&self.f)
            .then_with(|| self.g.cmp(&other.g))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub trait GuideOracle {
    fn is_in_guide(&self, c: GridCoord) -> bool;
}

pub struct NoGuide;
impl GuideOracle for NoGuide {
    fn is_in_guide(&self, _c: GridCoord) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SearchParams {
    pub cost: CostParams,
    /// Added for every step into a node outside the net's guide.
    pub guide_penalty: u64,
    pub max_expansions: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            cost: CostParams::default(),
            guide_penalty: 0,
            max_expansions: u32::MAX,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoundPath {
    /// Source node first, reached destination last.
    pub nodes: Vec<GridCoord>,
    pub cost: u64,
}

/// Outcome of connecting one net. A recoverable failure leaves the paths
/// found so far in place.
#[derive(Debug, Default)]
pub struct NetRoute {
    pub paths: Vec<Vec<GridCoord>>,
    pub failure: Option<DrtError>,
}

/// Bounding box in lattice indices, inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct IndexBox {
    lo: GridCoord,
    hi: GridCoord,
}

impl IndexBox {
    fn new(c: GridCoord) -> Self {
        Self { lo: c, hi: c }
    }

    fn add(&mut self, c: GridCoord) {
        self.lo = GridCoord::new(self.lo.x.min(c.x), self.lo.y.min(c.y), self.lo.z.min(c.z));
        self.hi = GridCoord::new(self.hi.x.max(c.x), self.hi.y.max(c.y), self.hi.z.max(c.z));
    }

    fn of(nodes: &[GridCoord]) -> Option<Self> {
        let (&first, rest) = nodes.split_first()?;
        let mut b = Self::new(first);
        rest.iter().for_each(|&c| b.add(c));
        Some(b)
    }
}

/// Reusable search scratch. Per-node arrays are versioned by `tag` so a new
/// search never clears them.
pub struct MazeSearch {
    g_score: Vec<u64>,
    seen_tag: Vec<u32>,
    closed_tag: Vec<u32>,
    current_tag: u32,
    heap: BinaryHeap<State>,
    seq: u64,
}

impl Default for MazeSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl MazeSearch {
    pub fn new() -> Self {
        Self {
            g_score: Vec::new(),
            seen_tag: Vec::new(),
            closed_tag: Vec::new(),
            current_tag: 0,
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    fn begin(&mut self, size: usize) {
        if self.g_score.len() < size {
            self.g_score.resize(size, u64::MAX);
            self.seen_tag.resize(size, 0);
            self.closed_tag.resize(size, 0);
        }
        self.current_tag = self.current_tag.wrapping_add(1);
        if self.current_tag == 0 {
            self.seen_tag.fill(0);
            self.closed_tag.fill(0);
            self.current_tag = 1;
        }
        self.heap.clear();
        self.seq = 0;
    }

    fn push(&mut self, idx: usize, g: u64, h: u64) {
        self.heap.push(State {
            f: g.saturating_add(h),
            g,
            seq: self.seq,
            idx: idx as u32,
        });
        self.seq += 1;
    }

    /// Lower bound on the cost from `c` to any node of `target`.
    fn heuristic(graph: &GridGraph, c: GridCoord, target: &IndexBox) -> u64 {
        let p = graph.point(c);
        let lo = graph.point(target.lo);
        let hi = graph.point(target.hi);
        let gap = |v: Dbu, a: Dbu, b: Dbu| (a - v).max(v - b).max(0);
        let z = graph.z_height(c.z);
        let dz = gap(z, graph.z_height(target.lo.z), graph.z_height(target.hi.z));
        (gap(p.x, lo.x, hi.x) + gap(p.y, lo.y, hi.y) + dz) as u64
    }

    /// Best-first search from `srcs` until any destination-flagged node is
    /// popped. `target` steers the heuristic; it need not contain every
    /// destination.
    ///
    /// The graph's prev-direction record is cleared over the visited box
    /// before returning, whatever the outcome.
    pub fn search<O: GuideOracle>(
        &mut self,
        graph: &mut GridGraph,
        net: NetId,
        srcs: &[GridCoord],
        target: &[GridCoord],
        params: &SearchParams,
        oracle: &O,
    ) -> DrtResult<FoundPath> {
        let (Some(mut visited), Some(target_box)) = (IndexBox::of(srcs), IndexBox::of(target))
        else {
            return Err(DrtError::new(Tool::Drt, 30, ErrorKind::NoPath { net }));
        };
        self.begin(graph.num_nodes());

        for &s in srcs {
            let idx = graph.index(s);
            if self.seen_tag[idx] == self.current_tag {
                continue;
            }
            self.seen_tag[idx] = self.current_tag;
            self.g_score[idx] = 0;
            graph.set_prev_dir(s, None);
            self.push(idx, 0, Self::heuristic(graph, s, &target_box));
        }

        let result = self.expand(graph, net, params, oracle, &target_box, &mut visited);
        let result = result.and_then(|(end, cost)| {
            Self::backtrack(graph, end).map(|nodes| FoundPath { nodes, cost })
        });
        graph.reset_prev_dir_in(visited.lo, visited.hi);
        result
    }

    fn expand<O: GuideOracle>(
        &mut self,
        graph: &mut GridGraph,
        net: NetId,
        params: &SearchParams,
        oracle: &O,
        target: &IndexBox,
        visited: &mut IndexBox,
    ) -> DrtResult<(GridCoord, u64)> {
        let mut expansions: u32 = 0;
        while let Some(State { g, idx, .. }) = self.heap.pop() {
            let idx = idx as usize;
            if self.closed_tag[idx] == self.current_tag || g > self.g_score[idx] {
                continue;
            }
            self.closed_tag[idx] = self.current_tag;
            let c = graph.coord(idx);
            if graph.is_dst(c) {
                return Ok((c, g));
            }

            expansions += 1;
            if expansions > params.max_expansions {
                report_warn!(
                    Tool::Drt,
                    31,
                    "net {:?} stopped after {} expansions",
                    net,
                    params.max_expansions
                );
                return Err(DrtError::new(
                    Tool::Drt,
                    31,
                    ErrorKind::ExpansionLimit {
                        net,
                        limit: params.max_expansions,
                    },
                ));
            }

            for d in Dir::ALL {
                if !graph.is_open(c, d) {
                    continue;
                }
                let Some(n) = graph.neighbor(c, d) else {
                    continue;
                };
                let n_idx = graph.index(n);
                if self.closed_tag[n_idx] == self.current_tag {
                    continue;
                }
                let mut step = graph.edge_cost(c, d, &params.cost);
                if !graph.is_dst(n) && !oracle.is_in_guide(n) {
                    step = step.saturating_add(params.guide_penalty);
                }
                let ng = g.saturating_add(step);
                if self.seen_tag[n_idx] != self.current_tag || ng < self.g_score[n_idx] {
                    self.seen_tag[n_idx] = self.current_tag;
                    self.g_score[n_idx] = ng;
                    graph.set_prev_dir(n, Some(d));
                    visited.add(n);
                    self.push(n_idx, ng, Self::heuristic(graph, n, target));
                }
            }
        }
        Err(DrtError::new(Tool::Drt, 30, ErrorKind::NoPath { net }))
    }

    fn backtrack(graph: &GridGraph, end: GridCoord) -> DrtResult<Vec<GridCoord>> {
        let mut nodes = vec![end];
        let mut c = end;
        while !graph.is_src(c) {
            let corrupt = |msg: String| {
                report_error!(Tool::Drt, 32, "{}", msg);
                DrtError::new(Tool::Drt, 32, ErrorKind::CorruptSearchState(msg))
            };
            let Some(d) = graph.prev_dir(c) else {
                return Err(corrupt(format!("no parent recorded at {:?}", c)));
            };
            let Some(prev) = graph.neighbor(c, d.reverse()) else {
                return Err(corrupt(format!("parent of {:?} lies off the grid", c)));
            };
            if nodes.len() > graph.num_nodes() {
                return Err(corrupt(format!("parent chain from {:?} loops", end)));
            }
            nodes.push(prev);
            c = prev;
        }
        nodes.reverse();
        Ok(nodes)
    }
}

fn cluster_rect(graph: &GridGraph, nodes: &[GridCoord]) -> Option<Rect> {
    nodes
        .iter()
        .map(|&c| {
            let p = graph.point(c);
            Rect::new(p, p)
        })
        .reduce(|a, b| a.merge(&b))
}

/// Connects every access-node cluster of `net`, starting from the first
/// one. Clusters are joined nearest-first by bounding-box distance, ties
/// going to the lower index.
pub fn connect<O: GuideOracle>(
    search: &mut MazeSearch,
    graph: &mut GridGraph,
    net: NetId,
    clusters: &[Vec<GridCoord>],
    params: &SearchParams,
    oracle: &O,
) -> DrtResult<NetRoute> {
    let mut route = NetRoute::default();
    let mut clusters: Vec<&Vec<GridCoord>> = clusters.iter().filter(|c| !c.is_empty()).collect();
    if clusters.len() < 2 {
        return Ok(route);
    }
    let mut connected: Vec<GridCoord> = clusters.remove(0).clone();
    let mut remaining = clusters;
    for &c in &connected {
        graph.set_src(c, true);
    }

    let outcome = loop {
        if remaining.is_empty() {
            break Ok(());
        }
        let Some(comp) = cluster_rect(graph, &connected) else {
            break Ok(());
        };
        let mut best = 0;
        let mut best_dist = Dbu::MAX;
        for (k, nodes) in remaining.iter().enumerate() {
            let Some(r) = cluster_rect(graph, nodes) else {
                continue;
            };
            let dist = comp.gap_x(&r) + comp.gap_y(&r);
            if dist < best_dist {
                best_dist = dist;
                best = k;
            }
        }

        for nodes in &remaining {
            nodes.iter().for_each(|&c| graph.set_dst(c, true));
        }
        let found = search.search(graph, net, &connected, remaining[best], params, oracle);
        for nodes in &remaining {
            nodes.iter().for_each(|&c| graph.set_dst(c, false));
        }

        match found {
            Ok(path) => {
                let Some(&end) = path.nodes.last() else {
                    break Ok(());
                };
                // The lowest-index cluster owning the reached node joins.
                let Some(k) = remaining.iter().position(|nodes| nodes.contains(&end)) else {
                    break Ok(());
                };
                let joined = remaining.remove(k);
                for &c in path.nodes.iter().chain(joined.iter()) {
                    if !graph.is_src(c) {
                        graph.set_src(c, true);
                        connected.push(c);
                    }
                }
                if path.nodes.len() > 1 {
                    route.paths.push(path.nodes);
                }
            }
            Err(e) if !e.is_fatal() => {
                report_warn!(
                    Tool::Drt,
                    33,
                    "net {:?} left with {} unconnected pin groups: {}",
                    net,
                    remaining.len(),
                    e
                );
                route.failure = Some(e);
                break Ok(());
            }
            Err(e) => break Err(e),
        }
    };

    for &c in &connected {
        graph.set_src(c, false);
    }
    outcome.map(|_| route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridLayer;
    use drt_common::db::tech::LayerDirection;

    fn open_plane(n: i64) -> GridGraph {
        let coords: Vec<Dbu> = (0..n).map(|i| i * 10).collect();
        let mut g = GridGraph::new(
            coords.clone(),
            coords,
            &[GridLayer {
                direction: LayerDirection::Unknown,
                pitch: 10,
                tech_layer: 0,
            }],
            true,
            1,
        )
        .unwrap();
        g.init_edges();
        g
    }

    #[test]
    fn frontier_prefers_lower_f_then_deeper_g() {
        let mut heap = BinaryHeap::new();
        heap.push(State { f: 5, g: 1, seq: 0, idx: 0 });
        heap.push(State { f: 5, g: 3, seq: 1, idx: 1 });
        heap.push(State { f: 4, g: 0, seq: 2, idx: 2 });
        heap.push(State { f: 5, g: 3, seq: 3, idx: 3 });
        let order: Vec<u32> = std::iter::from_fn(|| heap.pop().map(|s| s.idx)).collect();
        assert_eq!(order, vec![2, 1, 3, 0]);
    }

    #[test]
    fn search_clears_parent_records() {
        let mut g = open_plane(4);
        let src = GridCoord::new(0, 0, 0);
        let dst = GridCoord::new(3, 3, 0);
        g.set_src(src, true);
        g.set_dst(dst, true);
        let mut ms = MazeSearch::new();
        let path = ms.search(&mut g, NetId(0), &[src], &[dst], &SearchParams::default(), &NoGuide).unwrap();
        assert_eq!(path.cost, 60);
        assert_eq!(path.nodes.first(), Some(&src));
        assert_eq!(path.nodes.last(), Some(&dst));
        assert!((0..g.num_nodes()).all(|i| g.prev_dir(g.coord(i)).is_none()));
    }

    #[test]
    fn expansion_limit_is_recoverable() {
        let mut g = open_plane(6);
        let src = GridCoord::new(0, 0, 0);
        let dst = GridCoord::new(5, 5, 0);
        g.set_src(src, true);
        g.set_dst(dst, true);
        let params = SearchParams {
            max_expansions: 3,
            ..SearchParams::default()
        };
        let err = MazeSearch::new()
            .search(&mut g, NetId(4), &[src], &[dst], &params, &NoGuide)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExpansionLimit { net: NetId(4), limit: 3 });
        assert!(!err.is_fatal());
    }

    #[test]
    fn connect_joins_all_clusters_and_clears_flags() {
        let mut g = open_plane(5);
        let clusters = vec![
            vec![GridCoord::new(0, 0, 0)],
            vec![GridCoord::new(4, 0, 0)],
            vec![GridCoord::new(0, 4, 0), GridCoord::new(1, 4, 0)],
        ];
        let route = connect(
            &mut MazeSearch::new(),
            &mut g,
            NetId(1),
            &clusters,
            &SearchParams::default(),
            &NoGuide,
        )
        .unwrap();
        assert!(route.failure.is_none());
        assert_eq!(route.paths.len(), 2);
        assert!((0..g.num_nodes()).all(|i| {
            let c = g.coord(i);
            !g.is_src(c) && !g.is_dst(c)
        }));
    }

    #[test]
    fn unreachable_cluster_is_reported_not_dropped() {
        let mut g = open_plane(3);
        let island = GridCoord::new(2, 2, 0);
        for d in Dir::ALL {
            g.set_blocked(island, d, true);
        }
        let clusters = vec![vec![GridCoord::new(0, 0, 0)], vec![island]];
        let route = connect(
            &mut MazeSearch::new(),
            &mut g,
            NetId(2),
            &clusters,
            &SearchParams::default(),
            &NoGuide,
        )
        .unwrap();
        assert!(route.paths.is_empty());
        assert_eq!(
            route.failure.map(|e| e.kind),
            Some(ErrorKind::NoPath { net: NetId(2) })
        );
    }

    fn assert_corrupt(g: &GridGraph, end: GridCoord, needle: &str) {
        let err = MazeSearch::backtrack(g, end).unwrap_err();
        match &err.kind {
            ErrorKind::CorruptSearchState(msg) => assert!(msg.contains(needle), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(err.code(), "DRT-0032");
        assert!(err.is_fatal());
    }

    #[test]
    fn backtrack_rejects_missing_parent() {
        let mut g = open_plane(4);
        g.set_src(GridCoord::new(0, 0, 0), true);
        g.set_prev_dir(GridCoord::new(2, 0, 0), Some(Dir::E));
        // (1, 0) was never reached.
        assert_corrupt(&g, GridCoord::new(2, 0, 0), "no parent");
    }

    #[test]
    fn backtrack_rejects_parent_off_grid() {
        let mut g = open_plane(4);
        g.set_src(GridCoord::new(3, 3, 0), true);
        // Entered (0, 0) heading east, so the parent would sit at x = -1.
        g.set_prev_dir(GridCoord::new(0, 0, 0), Some(Dir::E));
        assert_corrupt(&g, GridCoord::new(0, 0, 0), "off the grid");
    }

    #[test]
    fn backtrack_rejects_parent_cycle() {
        let mut g = open_plane(4);
        g.set_src(GridCoord::new(3, 3, 0), true);
        g.set_prev_dir(GridCoord::new(1, 0, 0), Some(Dir::E));
        g.set_prev_dir(GridCoord::new(0, 0, 0), Some(Dir::W));
        assert_corrupt(&g, GridCoord::new(1, 0, 0), "loops");
    }
}
