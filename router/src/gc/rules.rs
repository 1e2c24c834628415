use super::marker::{Constraint, Marker};
use super::{GcShape, GcWorker};
use crate::region_query::Owner;
use drt_common::db::indices::NetId;
use drt_common::db::tech::LayerRef;
use drt_common::geom::{Dbu, Rect};
use std::collections::BTreeMap;

fn isqrt(v: Dbu) -> Dbu {
    (v as f64).sqrt() as Dbu
}

/// Area covered by the union of `rects`.
pub(crate) fn union_area(rects: &[Rect]) -> Dbu {
    let mut xs: Vec<Dbu> = rects.iter().flat_map(|r| [r.min.x, r.max.x]).collect();
    let mut ys: Vec<Dbu> = rects.iter().flat_map(|r| [r.min.y, r.max.y]).collect();
    xs.sort_unstable();
    xs.dedup();
    ys.sort_unstable();
    ys.dedup();
    let mut area = 0;
    for wx in xs.windows(2) {
        for wy in ys.windows(2) {
            let cell = Rect::from_coords(wx[0], wy[0], wx[1], wy[1]);
            if rects.iter().any(|r| r.contains_rect(&cell)) {
                area += cell.area();
            }
        }
    }
    area
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

impl GcWorker<'_> {
    fn same_net(a: &GcShape, b: &GcShape) -> bool {
        a.net.is_some() && a.net == b.net
    }

    /// Short, spacing and corner spacing against every neighbour.
    pub(super) fn check_metal(&mut self, i: usize) {
        let LayerRef::Routing(z) = self.shapes[i].layer else {
            return;
        };
        let Some(layer) = self.tech.layer(z) else {
            return;
        };
        let reach = layer.max_reach();
        let table = layer.spacing.clone();
        let corner = layer.corner_spacing;
        let a = self.shapes[i];
        for j in self.neighbours(i, reach) {
            let b = self.shapes[j];
            if a.owner == b.owner && a.rect == b.rect {
                continue;
            }
            if Self::same_net(&a, &b) || !self.pair_enabled(&a, &b) {
                continue;
            }
            let sources = vec![a.owner, b.owner];
            if let Some(overlap) = a.rect.intersection(&b.rect) {
                self.add_marker(Marker::new(Constraint::Short, a.layer, overlap, sources, 0, 0));
                continue;
            }
            let (gx, gy) = (a.rect.gap_x(&b.rect), a.rect.gap_y(&b.rect));
            let width = a.rect.min_dim().max(b.rect.min_dim());
            let bbox = a.rect.span_between(&b.rect);
            if gx > 0 && gy > 0 {
                let (constraint, required) = match corner {
                    Some(c) if !self.ignore.ignore_corner => (Constraint::CornerSpacing, c),
                    Some(_) => continue,
                    None => (Constraint::MetalSpacing, table.lookup(width, 0)),
                };
                let dist2 = gx * gx + gy * gy;
                if dist2 < required * required {
                    self.add_marker(Marker::new(
                        constraint,
                        a.layer,
                        bbox,
                        sources,
                        required,
                        isqrt(dist2),
                    ));
                }
            } else {
                let (dist, prl) = if gx > 0 {
                    (gx, a.rect.prl_y(&b.rect))
                } else {
                    (gy, a.rect.prl_x(&b.rect))
                };
                let required = table.lookup(width, prl.max(0));
                if dist < required {
                    self.add_marker(Marker::new(
                        Constraint::MetalSpacing,
                        a.layer,
                        bbox,
                        sources,
                        required,
                        dist,
                    ));
                }
            }
        }
    }

    /// End-of-line space in front of every short edge of a routed shape.
    pub(super) fn check_eol(&mut self, i: usize) {
        let a = self.shapes[i];
        let (LayerRef::Routing(z), Owner::Net(_)) = (a.layer, a.owner) else {
            return;
        };
        let Some(eol) = self.tech.layer(z).and_then(|l| l.eol) else {
            return;
        };
        let r = a.rect;
        let mut regions = Vec::with_capacity(4);
        if r.width() < eol.width {
            regions.push(Rect::from_coords(
                r.min.x - eol.within,
                r.max.y,
                r.max.x + eol.within,
                r.max.y + eol.space,
            ));
            regions.push(Rect::from_coords(
                r.min.x - eol.within,
                r.min.y - eol.space,
                r.max.x + eol.within,
                r.min.y,
            ));
        }
        if r.height() < eol.width {
            regions.push(Rect::from_coords(
                r.max.x,
                r.min.y - eol.within,
                r.max.x + eol.space,
                r.max.y + eol.within,
            ));
            regions.push(Rect::from_coords(
                r.min.x - eol.space,
                r.min.y - eol.within,
                r.min.x,
                r.max.y + eol.within,
            ));
        }
        if regions.is_empty() {
            return;
        }
        for j in self.neighbours(i, eol.space.max(eol.within)) {
            let b = self.shapes[j];
            if Self::same_net(&a, &b) || !self.pair_enabled(&a, &b) || a.rect.intersects(&b.rect) {
                continue;
            }
            if regions.iter().any(|reg| reg.overlaps(&b.rect)) {
                let actual = a.rect.gap_x(&b.rect).max(a.rect.gap_y(&b.rect));
                self.add_marker(Marker::new(
                    Constraint::EndOfLine,
                    a.layer,
                    a.rect.span_between(&b.rect),
                    vec![a.owner, b.owner],
                    eol.space,
                    actual,
                ));
            }
        }
    }

    pub(super) fn check_min_width(&mut self, i: usize) {
        let a = self.shapes[i];
        let (LayerRef::Routing(z), Owner::Net(_)) = (a.layer, a.owner) else {
            return;
        };
        if self.target_net.is_some_and(|t| a.net != Some(t)) {
            return;
        }
        let Some(width) = self.tech.layer(z).map(|l| l.width) else {
            return;
        };
        if a.rect.min_dim() < width {
            self.add_marker(Marker::new(
                Constraint::MinWidth,
                a.layer,
                a.rect,
                vec![a.owner],
                width,
                a.rect.min_dim(),
            ));
        }
    }

    /// Spacing between distinct cuts on one cut layer.
    pub(super) fn check_cut(&mut self, i: usize) {
        let a = self.shapes[i];
        let LayerRef::Cut(below) = a.layer else {
            return;
        };
        let Some(spacing) = self.tech.cut_layer(below).map(|c| c.spacing) else {
            return;
        };
        for j in self.neighbours(i, spacing) {
            let b = self.shapes[j];
            if (a.owner == b.owner && a.rect == b.rect) || !self.pair_enabled(&a, &b) {
                continue;
            }
            let sources = vec![a.owner, b.owner];
            if let Some(overlap) = a.rect.intersection(&b.rect) {
                if !Self::same_net(&a, &b) {
                    self.add_marker(Marker::new(Constraint::Short, a.layer, overlap, sources, 0, 0));
                }
                continue;
            }
            let (gx, gy) = (a.rect.gap_x(&b.rect), a.rect.gap_y(&b.rect));
            let dist2 = gx * gx + gy * gy;
            if dist2 < spacing * spacing {
                self.add_marker(Marker::new(
                    Constraint::CutSpacing,
                    a.layer,
                    a.rect.span_between(&b.rect),
                    sources,
                    spacing,
                    isqrt(dist2),
                ));
            }
        }
    }

    /// Min-area and min-step over the connected same-net shapes of each
    /// layer. Components without routed geometry are left alone.
    pub(super) fn check_polygons(&mut self) {
        let mut groups: BTreeMap<(usize, NetId), Vec<usize>> = BTreeMap::new();
        for (i, s) in self.shapes.iter().enumerate() {
            if let (LayerRef::Routing(_), Some(net)) = (s.layer, s.net) {
                if self.target_net.is_some_and(|t| t != net) {
                    continue;
                }
                groups.entry((s.layer.slot(), net)).or_default().push(i);
            }
        }
        for ((slot, _), members) in groups {
            let LayerRef::Routing(z) = LayerRef::from_slot(slot) else {
                continue;
            };
            let Some(layer) = self.tech.layer(z) else {
                continue;
            };
            let (min_area, min_step) = (layer.min_area, layer.min_step);

            let mut parent: Vec<usize> = (0..members.len()).collect();
            for a in 0..members.len() {
                for b in a + 1..members.len() {
                    if self.shapes[members[a]].rect.intersects(&self.shapes[members[b]].rect) {
                        let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
                        parent[ra.max(rb)] = ra.min(rb);
                    }
                }
            }
            let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for k in 0..members.len() {
                let root = find(&mut parent, k);
                components.entry(root).or_default().push(members[k]);
            }

            for comp in components.values() {
                if !comp.iter().any(|&i| !self.shapes[i].is_fixed()) {
                    continue;
                }
                let rects: Vec<Rect> = comp.iter().map(|&i| self.shapes[i].rect).collect();
                let mut owners: Vec<Owner> = comp.iter().map(|&i| self.shapes[i].owner).collect();
                owners.sort();
                owners.dedup();
                let clipped = rects.iter().any(|r| !self.inside_context(r));
                if !self.ignore.ignore_min_area && min_area > 0 && !clipped {
                    let area = union_area(&rects);
                    if area < min_area {
                        let bbox = rects.iter().copied().reduce(|a, b| a.merge(&b)).unwrap_or_default();
                        self.add_marker(Marker::new(
                            Constraint::MinArea,
                            LayerRef::Routing(z),
                            bbox,
                            owners.clone(),
                            min_area,
                            area,
                        ));
                    }
                }
                if let Some(step) = min_step.filter(|_| !self.ignore.ignore_min_step) {
                    self.check_steps(z, comp, step);
                }
            }
        }
    }

    /// Strictly inside the gathered context, not touching its boundary.
    fn inside_context(&self, r: &Rect) -> bool {
        let c = &self.context;
        r.min.x > c.min.x && r.min.y > c.min.y && r.max.x < c.max.x && r.max.y < c.max.y
    }

    /// A pair of touching shapes whose parallel edges are offset by less
    /// than `step` leaves a notch edge that is too short.
    fn check_steps(&mut self, z: u8, comp: &[usize], step: Dbu) {
        for (k, &i) in comp.iter().enumerate() {
            for &j in &comp[k + 1..] {
                let (a, b) = (self.shapes[i], self.shapes[j]);
                if a.is_fixed() && b.is_fixed() {
                    continue;
                }
                let (ra, rb) = (a.rect, b.rect);
                if !ra.intersects(&rb) || ra.contains_rect(&rb) || rb.contains_rect(&ra) {
                    continue;
                }
                let xs = (ra.min.x.max(rb.min.x), ra.max.x.min(rb.max.x));
                let ys = (ra.min.y.max(rb.min.y), ra.max.y.min(rb.max.y));
                let sides = [
                    (ra.min.y, rb.min.y, false),
                    (ra.max.y, rb.max.y, false),
                    (ra.min.x, rb.min.x, true),
                    (ra.max.x, rb.max.x, true),
                ];
                for (p, q, vertical) in sides {
                    let delta = (p - q).abs();
                    if delta == 0 || delta >= step {
                        continue;
                    }
                    let bbox = if vertical {
                        Rect::from_coords(p.min(q), ys.0, p.max(q), ys.1)
                    } else {
                        Rect::from_coords(xs.0, p.min(q), xs.1, p.max(q))
                    };
                    self.add_marker(Marker::new(
                        Constraint::MinStep,
                        LayerRef::Routing(z),
                        bbox,
                        vec![a.owner, b.owner],
                        step,
                        delta,
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drt_common::db::indices::ObsId;
    use drt_common::db::tech::{EolRule, LayerDirection, RoutingLayer, SpacingTable, Tech};
    use drt_common::util::config::DrcConfig;

    fn tech() -> Tech {
        let mut t = Tech::new(1000);
        let mut m1 = RoutingLayer::new("M1".into(), 0, LayerDirection::Horizontal, 200, 100);
        m1.spacing = SpacingTable::simple(100);
        m1.min_area = 40_000;
        m1.min_step = Some(50);
        m1.eol = Some(EolRule {
            space: 120,
            width: 110,
            within: 20,
        });
        t.add_layer(m1);
        t.add_cut_layer("V1".into(), 80, 100);
        t.add_layer(RoutingLayer::new("M2".into(), 0, LayerDirection::Vertical, 200, 100));
        t.finalize();
        t
    }

    fn shape(layer: LayerRef, net: u32, r: Rect) -> GcShape {
        GcShape {
            layer,
            rect: r,
            owner: Owner::Net(NetId(net)),
            net: Some(NetId(net)),
        }
    }

    fn run(t: &Tech, cfg: &DrcConfig, shapes: Vec<GcShape>) -> Vec<Marker> {
        let mut gc = GcWorker::new(t, cfg);
        gc.load(shapes, Rect::from_coords(-5000, -5000, 5000, 5000));
        gc.main()
    }

    fn quiet() -> DrcConfig {
        DrcConfig {
            ignore_min_area: true,
            ignore_min_step: true,
            ignore_eol: true,
            ..DrcConfig::default()
        }
    }

    #[test]
    fn union_area_counts_overlap_once() {
        let rects = [Rect::from_coords(0, 0, 10, 10), Rect::from_coords(5, 0, 15, 10)];
        assert_eq!(union_area(&rects), 150);
    }

    #[test]
    fn corner_spacing_is_euclidean() {
        let t = tech();
        let m1 = LayerRef::Routing(0);
        // 60 x 60 diagonal offset is ~84 < 100.
        let near = run(
            &t,
            &quiet(),
            vec![
                shape(m1, 0, Rect::from_coords(0, 0, 1000, 100)),
                shape(m1, 1, Rect::from_coords(1060, 160, 2000, 260)),
            ],
        );
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].constraint, Constraint::MetalSpacing);
        assert_eq!(near[0].actual, 84);
        // 80 x 80 is ~113.
        let far = run(
            &t,
            &quiet(),
            vec![
                shape(m1, 0, Rect::from_coords(0, 0, 1000, 100)),
                shape(m1, 1, Rect::from_coords(1080, 180, 2000, 280)),
            ],
        );
        assert!(far.is_empty());
    }

    #[test]
    fn small_routed_island_violates_min_area() {
        let t = tech();
        let cfg = DrcConfig::default();
        let markers = run(&t, &cfg, vec![shape(LayerRef::Routing(0), 0, Rect::from_coords(0, 0, 100, 100))]);
        let kinds: Vec<Constraint> = markers.iter().map(|m| m.constraint).collect();
        assert_eq!(kinds, vec![Constraint::MinArea]);
        assert_eq!(markers[0].actual, 10_000);
    }

    #[test]
    fn min_step_flags_short_jog() {
        let t = tech();
        let cfg = DrcConfig {
            ignore_min_area: true,
            ignore_eol: true,
            ..DrcConfig::default()
        };
        let m1 = LayerRef::Routing(0);
        let markers = run(
            &t,
            &cfg,
            vec![
                shape(m1, 0, Rect::from_coords(0, 0, 1000, 100)),
                shape(m1, 0, Rect::from_coords(900, 20, 2000, 120)),
            ],
        );
        assert!(!markers.is_empty());
        assert!(markers.iter().all(|m| m.constraint == Constraint::MinStep));
        assert!(markers.iter().all(|m| m.actual == 20));
    }

    #[test]
    fn eol_needs_space_in_front_of_line_end() {
        let t = tech();
        let cfg = DrcConfig {
            ignore_min_area: true,
            ignore_min_step: true,
            ..DrcConfig::default()
        };
        let m1 = LayerRef::Routing(0);
        // Line end of net 0 at x=1000 faces net 1 at x=1110: 110 apart,
        // clean for spacing (100) but short of the 120 EOL space.
        let markers = run(
            &t,
            &cfg,
            vec![
                shape(m1, 0, Rect::from_coords(0, 0, 1000, 100)),
                shape(m1, 1, Rect::from_coords(1110, -500, 1210, 600)),
            ],
        );
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].constraint, Constraint::EndOfLine);
        assert_eq!(markers[0].actual, 110);
    }

    #[test]
    fn cut_spacing_between_vias() {
        let t = tech();
        let v1 = LayerRef::Cut(0);
        let markers = run(
            &t,
            &quiet(),
            vec![
                shape(v1, 0, Rect::from_coords(0, 0, 80, 80)),
                shape(v1, 1, Rect::from_coords(150, 0, 230, 80)),
            ],
        );
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].constraint, Constraint::CutSpacing);
        assert_eq!(markers[0].bbox, Rect::from_coords(80, 0, 150, 80));
    }

    #[test]
    fn via_cut_on_identical_obstruction_cut_is_a_short() {
        let t = tech();
        let v1 = LayerRef::Cut(0);
        let rect = Rect::from_coords(960, 960, 1040, 1040);
        let blockage = GcShape {
            layer: v1,
            rect,
            owner: Owner::Obstruction(ObsId(0)),
            net: None,
        };
        let markers = run(&t, &quiet(), vec![shape(v1, 0, rect), blockage]);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].constraint, Constraint::Short);
        assert_eq!(markers[0].bbox, rect);
        assert_eq!(markers[0].sources, vec![Owner::Net(NetId(0)), Owner::Obstruction(ObsId(0))]);
    }

    #[test]
    fn min_area_skips_polygons_cut_by_the_context() {
        let t = tech();
        let cfg = DrcConfig {
            ignore_min_step: true,
            ignore_eol: true,
            ..DrcConfig::default()
        };
        let m1 = LayerRef::Routing(0);
        let region = Rect::from_coords(0, 0, 1000, 1000);
        let context = region.bloat(GcWorker::max_reach(&t));
        let mut gc = GcWorker::new(&t, &cfg);

        // Sticks out of the context: only part of the polygon was gathered.
        let crossing = Rect::from_coords(900, 500, context.max.x + 50, 600);
        gc.load(vec![shape(m1, 0, crossing)], region);
        assert!(gc.main().is_empty());

        let inside = Rect::from_coords(800, 500, 1100, 600);
        gc.load(vec![shape(m1, 0, inside)], region);
        let markers = gc.main();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].constraint, Constraint::MinArea);
        assert_eq!(markers[0].actual, 30_000);
    }
}
