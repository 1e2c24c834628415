use drt_common::db::design::{Design, GCellPattern, RouteShape};
use drt_common::db::indices::NetId;
use drt_common::db::tech::{LayerDirection, RoutingLayer, Tech};
use drt_common::geom::{Dbu, Point, Rect};
use drt_common::util::config::Config;

/// Two layers over a 4000 x 4000 die. No tracks or gcells: `prepare`
/// synthesizes them.
fn block() -> Design {
    let mut tech = Tech::new(1000);
    tech.add_layer(RoutingLayer::new("M1".into(), 0, LayerDirection::Horizontal, 200, 100));
    tech.add_cut_layer("V1".into(), 80, 100);
    tech.add_layer(RoutingLayer::new("M2".into(), 0, LayerDirection::Vertical, 200, 100));
    tech.finalize();
    let mut d = Design::new(tech);
    d.die_area = Rect::from_coords(0, 0, 4000, 4000);
    d
}

fn io_pin(d: &mut Design, net: NetId, x: Dbu, y: Dbu) {
    let r = Rect::from_coords(x - 50, y - 50, x + 50, y + 50);
    d.add_pin(net, format!("p{x}_{y}"), None, vec![(0, r)]);
}

fn touches(shape: &RouteShape, p: Point) -> bool {
    match shape {
        RouteShape::Wire(seg) => seg.begin == p || seg.end == p,
        RouteShape::Via(via) => via.origin == p,
    }
}

#[test]
fn prepare_fills_missing_gcells_and_tracks() {
    let mut d = block();
    assert!(d.gcell.is_empty());
    drt_router::prepare(&mut d, &Config::default()).unwrap();
    assert!(!d.gcell.is_empty());
    assert_eq!(d.tracks.len(), 2);
}

#[test]
fn route_connects_separate_nets_cleanly() {
    let mut d = block();
    let low = d.add_net("low".into());
    io_pin(&mut d, low, 100, 100);
    io_pin(&mut d, low, 3700, 1300);
    let high = d.add_net("high".into());
    io_pin(&mut d, high, 300, 3700);
    io_pin(&mut d, high, 3500, 2900);

    let mut config = Config::default();
    config.detailed_routing.tile_gcells = 1;
    assert!(drt_router::check_design(&d, &config).unwrap().is_empty());

    let report = drt_router::route(&mut d, &config).unwrap();
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert!(report.workers >= 1);
    assert!(report.markers.is_empty(), "{:?}", report.markers);

    for (net, ends) in [(low, [(100, 100), (3700, 1300)]), (high, [(300, 3700), (3500, 2900)])] {
        let route = &d.nets[net.index()].route;
        assert!(!route.is_empty());
        for (x, y) in ends {
            assert!(route.iter().any(|s| touches(s, Point::new(x, y))), "{net:?} misses ({x}, {y})");
        }
    }

    // The final report is a plain full-die check of the committed routes.
    assert_eq!(drt_router::check_design(&d, &config).unwrap(), report.markers);
}

#[test]
fn route_rejects_degenerate_die() {
    let mut d = block();
    d.die_area = Rect::default();
    d.gcell = GCellPattern::default();
    let err = drt_router::route(&mut d, &Config::default()).unwrap_err();
    assert_eq!(err.code(), "DRT-0010");
}
