use drt_common::db::design::{Design, PathSeg, RouteShape};
use drt_common::db::indices::NetId;
use drt_common::db::tech::{LayerDirection, LayerRef, RoutingLayer, Tech};
use drt_common::geom::{Dbu, GridCoord, Point, Rect};
use drt_common::util::config::DrcConfig;
use drt_router::algo::maze::{FoundPath, MazeSearch, NoGuide, SearchParams};
use drt_router::gc::{Constraint, GcWorker};
use drt_router::grid::{Dir, GridGraph, GridLayer};
use drt_router::region_query::{Owner, RegionQuery, ShapeSet};

const PITCH: Dbu = 10;

/// `n` x `n` lattice with `layers` layers, every planar and via edge present.
fn full_grid(n: usize, layers: usize) -> GridGraph {
    let coords: Vec<Dbu> = (0..n as Dbu).map(|i| i * PITCH).collect();
    let dirs = [LayerDirection::Horizontal, LayerDirection::Vertical];
    let layers: Vec<GridLayer> = (0..layers)
        .map(|z| GridLayer {
            direction: dirs[z % 2],
            pitch: PITCH,
            tech_layer: z as u8,
        })
        .collect();
    let mut g = GridGraph::new(coords.clone(), coords, &layers, false, 1).unwrap();
    g.init_edges();
    let (nx, ny, nz) = g.dims();
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let c = GridCoord::new(x, y, z);
                if x + 1 < nx {
                    g.add_edge(c, Dir::E);
                }
                if y + 1 < ny {
                    g.add_edge(c, Dir::N);
                }
            }
        }
    }
    g
}

fn find(g: &mut GridGraph, src: GridCoord, dst: GridCoord) -> FoundPath {
    g.set_src(src, true);
    g.set_dst(dst, true);
    let path = MazeSearch::new()
        .search(g, NetId(0), &[src], &[dst], &SearchParams::default(), &NoGuide)
        .unwrap();
    g.set_src(src, false);
    g.set_dst(dst, false);
    path
}

fn step(a: GridCoord, b: GridCoord) -> Dir {
    Dir::ALL
        .into_iter()
        .find(|&d| {
            let (x, y, z) = (a.x as i64, a.y as i64, a.z as i64);
            let (dx, dy, dz) = match d {
                Dir::E => (1, 0, 0),
                Dir::W => (-1, 0, 0),
                Dir::N => (0, 1, 0),
                Dir::S => (0, -1, 0),
                Dir::U => (0, 0, 1),
                Dir::D => (0, 0, -1),
            };
            (x + dx, y + dy, z + dz) == (b.x as i64, b.y as i64, b.z as i64)
        })
        .unwrap()
}

#[test]
fn two_terminal_net_costs_manhattan_distance() {
    let mut g = full_grid(5, 2);
    let path = find(&mut g, GridCoord::new(0, 0, 0), GridCoord::new(4, 4, 0));
    assert_eq!(path.cost, 8 * PITCH as u64);
    assert!(path.nodes.iter().all(|c| c.z == 0));
    assert_eq!(path.nodes.len(), 9);
}

#[test]
fn blocked_row_forces_a_detour() {
    let mut g = full_grid(5, 2);
    for x in 0..5 {
        let c = GridCoord::new(x, 2, 0);
        for d in Dir::ALL {
            g.set_blocked(c, d, true);
        }
    }
    let path = find(&mut g, GridCoord::new(0, 0, 0), GridCoord::new(4, 4, 0));
    assert!(path.cost > 8 * PITCH as u64);
    for w in path.nodes.windows(2) {
        let d = step(w[0], w[1]);
        assert!(g.is_open(w[0], d), "blocked edge {:?} {:?}", w[0], d);
    }
}

#[test]
fn layer_change_costs_at_least_one_via_more() {
    let mut g = full_grid(5, 3);
    let via = (g.z_height(1) - g.z_height(0)) as u64;
    let flat = find(&mut g, GridCoord::new(0, 0, 0), GridCoord::new(4, 0, 0));
    let up = find(&mut g, GridCoord::new(0, 0, 0), GridCoord::new(4, 0, 2));
    assert!(up.cost >= flat.cost + via);
    assert_eq!(up.nodes.last().map(|c| c.z), Some(2));
}

#[test]
fn edges_are_symmetric() {
    let mut g = full_grid(4, 3);
    g.remove_edge(GridCoord::new(1, 1, 1), Dir::W);
    g.remove_edge(GridCoord::new(2, 2, 2), Dir::D);
    let (nx, ny, nz) = g.dims();
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let c = GridCoord::new(x, y, z);
                for d in Dir::ALL {
                    let back = g.neighbor(c, d).is_some_and(|n| g.has_edge(n, d.reverse()));
                    assert_eq!(g.has_edge(c, d), back, "{:?} {:?}", c, d);
                }
            }
        }
    }
    assert!(!g.has_edge(GridCoord::new(0, 1, 1), Dir::E));
    assert!(!g.has_edge(GridCoord::new(2, 2, 1), Dir::U));
}

#[test]
fn search_is_deterministic() {
    let run = || {
        let mut g = full_grid(8, 2);
        for y in 1..7 {
            g.set_blocked(GridCoord::new(4, y, 0), Dir::E, true);
        }
        find(&mut g, GridCoord::new(0, 3, 0), GridCoord::new(7, 4, 0))
    };
    let first = run();
    for _ in 0..4 {
        assert_eq!(run(), first);
    }
}

fn drc_design() -> Design {
    let mut tech = Tech::new(1000);
    tech.add_layer(RoutingLayer::new("M1".into(), 0, LayerDirection::Horizontal, 200, 100));
    tech.finalize();
    let mut d = Design::new(tech);
    d.die_area = Rect::from_coords(-1000, -1000, 3000, 3000);
    d
}

fn add_wire(d: &mut Design, name: &str, y: Dbu) -> NetId {
    let n = d.add_net(name.into());
    d.nets[n.index()].route.push(RouteShape::Wire(PathSeg {
        layer: 0,
        begin: Point::new(0, y),
        end: Point::new(1000, y),
        width: 100,
    }));
    n
}

fn markers_of(d: &Design, target: Option<NetId>) -> Vec<drt_router::gc::Marker> {
    let nets: Vec<NetId> = (0..d.num_nets()).map(NetId::new).collect();
    let mut rq = RegionQuery::new(d.tech.num_layers());
    rq.init(d, &nets, d.die_area, true).unwrap();
    let mut gc = GcWorker::new(&d.tech, &DrcConfig::default());
    gc.set_target_net(target);
    gc.init(d, &rq, d.die_area);
    gc.main()
}

#[test]
fn parallel_wires_under_min_spacing_give_one_marker() {
    let mut d = drc_design();
    add_wire(&mut d, "a", 50);
    add_wire(&mut d, "b", 240);
    let markers = markers_of(&d, None);
    assert_eq!(markers.len(), 1);
    let m = &markers[0];
    assert_eq!(m.constraint, Constraint::MetalSpacing);
    assert_eq!(m.layer, LayerRef::Routing(0));
    assert_eq!(m.bbox, Rect::from_coords(-50, 100, 1050, 190));
    assert_eq!((m.required, m.actual), (100, 90));
}

#[test]
fn parallel_wires_at_exact_spacing_are_clean() {
    let mut d = drc_design();
    add_wire(&mut d, "a", 50);
    add_wire(&mut d, "b", 250);
    assert!(markers_of(&d, None).is_empty());
}

#[test]
fn marker_does_not_depend_on_visit_order() {
    let mut d = drc_design();
    let a = add_wire(&mut d, "a", 50);
    let b = add_wire(&mut d, "b", 120);
    let all = markers_of(&d, None);
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].constraint, Constraint::Short);
    assert_eq!(all[0].sources, vec![Owner::Net(a), Owner::Net(b)]);
    assert_eq!(markers_of(&d, Some(a)), all);
    assert_eq!(markers_of(&d, Some(b)), all);
}

#[test]
fn region_query_add_then_remove_is_identity() {
    let d = drc_design();
    let mut rq = RegionQuery::new(d.tech.num_layers());
    let probe = Rect::from_coords(0, 0, 500, 500);
    let base = ShapeSet {
        owner: Owner::Net(NetId(1)),
        rects: vec![(LayerRef::Routing(0), Rect::from_coords(100, 100, 200, 200))],
    };
    rq.add(&base).unwrap();
    let before = rq.query_shapes(&probe, LayerRef::Routing(0));

    let shape = ShapeSet {
        owner: Owner::Net(NetId(2)),
        rects: vec![
            (LayerRef::Routing(0), Rect::from_coords(150, 150, 400, 250)),
            (LayerRef::Cut(0), Rect::from_coords(300, 150, 380, 230)),
        ],
    };
    rq.add(&shape).unwrap();
    assert_eq!(
        rq.query(&probe, LayerRef::Routing(0)),
        vec![Owner::Net(NetId(1)), Owner::Net(NetId(2))]
    );
    rq.remove(&shape).unwrap();
    assert_eq!(rq.query_shapes(&probe, LayerRef::Routing(0)), before);
    assert!(rq.query(&probe, LayerRef::Cut(0)).is_empty());
}
