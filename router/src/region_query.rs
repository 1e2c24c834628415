//! Per-layer box index over committed geometry.

use crate::gc::marker::Constraint;
use drt_common::db::design::{Design, RouteShape};
use drt_common::db::indices::{NetId, ObsId, PinId};
use drt_common::db::tech::{LayerRef, Tech};
use drt_common::error::{DrtError, DrtResult, ErrorKind};
use drt_common::geom::Rect;
use drt_common::geom::rtree::SpatialIndex;
use drt_common::report_error;
use drt_common::util::logger::Tool;
use serde::{Deserialize, Serialize};

/// What a rectangle in the index belongs to. Wires and vias are owned by
/// their net.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Owner {
    Net(NetId),
    Pin(PinId),
    Obstruction(ObsId),
}

impl Owner {
    /// Design geometry the router never moves.
    pub fn is_fixed(&self) -> bool {
        !matches!(self, Owner::Net(_))
    }
}

/// All rectangles one shape occupies. A via expands to its bottom, cut and
/// top rectangles, which are always inserted and removed together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapeSet {
    pub owner: Owner,
    pub rects: Vec<(LayerRef, Rect)>,
}

fn unsupported(id: u32, msg: String) -> DrtError {
    report_error!(Tool::Drt, id, "{}", msg);
    DrtError::new(Tool::Drt, id, ErrorKind::UnsupportedShape(msg))
}

impl ShapeSet {
    pub fn expand(shape: &RouteShape, owner: Owner, tech: &Tech) -> DrtResult<Self> {
        let rects = match shape {
            RouteShape::Wire(seg) => {
                if tech.layer(seg.layer).is_none() {
                    return Err(unsupported(
                        20,
                        format!("wire on unknown layer {}", seg.layer),
                    ));
                }
                if seg.width <= 0 {
                    return Err(unsupported(21, format!("wire of width {}", seg.width)));
                }
                vec![(LayerRef::Routing(seg.layer), seg.rect())]
            }
            RouteShape::Via(via) => {
                let Some(def) = tech.via(via.def) else {
                    return Err(unsupported(22, format!("unknown via definition {:?}", via.def)));
                };
                let at = |r: &Rect| Rect::new(r.min + via.origin, r.max + via.origin);
                let mut rects = Vec::with_capacity(
                    def.bottom_rects.len() + def.cut_rects.len() + def.top_rects.len(),
                );
                rects.extend(def.bottom_rects.iter().map(|r| (LayerRef::Routing(def.bottom), at(r))));
                rects.extend(def.cut_rects.iter().map(|r| (LayerRef::Cut(def.bottom), at(r))));
                rects.extend(def.top_rects.iter().map(|r| (LayerRef::Routing(def.top()), at(r))));
                rects
            }
        };
        Ok(Self { owner, rects })
    }

    pub fn pin(design: &Design, pin: PinId) -> Self {
        Self {
            owner: Owner::Pin(pin),
            rects: design
                .pin(pin)
                .shapes
                .iter()
                .map(|(z, r)| (LayerRef::Routing(*z), *r))
                .collect(),
        }
    }

    pub fn intersects(&self, r: &Rect) -> bool {
        self.rects.iter().any(|(_, s)| s.intersects(r))
    }
}

pub struct RegionQuery {
    shapes: Vec<SpatialIndex<Owner>>,
    costs: Vec<SpatialIndex<(Owner, Constraint)>>,
}

impl RegionQuery {
    /// One index per routing layer and per cut layer.
    pub fn new(num_layers: usize) -> Self {
        let slots = 2 * num_layers.max(1);
        Self {
            shapes: (0..slots).map(|_| SpatialIndex::new()).collect(),
            costs: (0..slots).map(|_| SpatialIndex::new()).collect(),
        }
    }

    pub fn clear(&mut self) {
        self.shapes.iter_mut().for_each(SpatialIndex::clear);
        self.costs.iter_mut().for_each(SpatialIndex::clear);
    }

    pub fn num_slots(&self) -> usize {
        self.shapes.len()
    }

    pub fn len(&self) -> usize {
        self.shapes.iter().map(SpatialIndex::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_slots(&self, set: &ShapeSet) -> DrtResult<()> {
        match set.rects.iter().find(|(l, _)| l.slot() >= self.shapes.len()) {
            Some((l, _)) => Err(unsupported(
                23,
                format!("{:?} shape on {:?} outside the indexed layers", set.owner, l),
            )),
            None => Ok(()),
        }
    }

    pub fn add(&mut self, set: &ShapeSet) -> DrtResult<()> {
        self.check_slots(set)?;
        for (l, r) in &set.rects {
            self.shapes[l.slot()].insert(*r, set.owner);
        }
        Ok(())
    }

    /// Removes every rectangle of `set` or none of them.
    pub fn remove(&mut self, set: &ShapeSet) -> DrtResult<()> {
        self.check_slots(set)?;
        for (i, (l, r)) in set.rects.iter().enumerate() {
            if !self.shapes[l.slot()].remove(*r, &set.owner) {
                for (l, r) in &set.rects[..i] {
                    self.shapes[l.slot()].insert(*r, set.owner);
                }
                let msg = format!("{:?} has no shape {:?} on {:?}", set.owner, r, l);
                report_error!(Tool::Drt, 24, "{}", msg);
                return Err(DrtError::new(Tool::Drt, 24, ErrorKind::IndexInconsistency(msg)));
            }
        }
        Ok(())
    }

    /// Distinct owners with a rectangle meeting `rect` on `layer`, sorted.
    pub fn query(&self, rect: &Rect, layer: LayerRef) -> Vec<Owner> {
        let mut owners: Vec<Owner> = self
            .query_shapes(rect, layer)
            .into_iter()
            .map(|(_, o)| o)
            .collect();
        owners.dedup();
        owners
    }

    /// Matching `(rect, owner)` entries ordered by owner then rect.
    pub fn query_shapes(&self, rect: &Rect, layer: LayerRef) -> Vec<(Rect, Owner)> {
        let Some(index) = self.shapes.get(layer.slot()) else {
            return Vec::new();
        };
        let mut hits = index.query(*rect);
        hits.sort_by(|a, b| (a.1, a.0).cmp(&(b.1, b.0)));
        hits
    }

    pub fn add_cost(&mut self, rect: Rect, layer: LayerRef, owner: Owner, constraint: Constraint) {
        if let Some(index) = self.costs.get_mut(layer.slot()) {
            index.insert(rect, (owner, constraint));
        }
    }

    pub fn remove_cost(&mut self, rect: Rect, layer: LayerRef, owner: Owner, constraint: Constraint) -> bool {
        self.costs
            .get_mut(layer.slot())
            .is_some_and(|index| index.remove(rect, &(owner, constraint)))
    }

    pub fn query_cost(&self, rect: &Rect, layer: LayerRef) -> Vec<(Owner, Constraint)> {
        let Some(index) = self.costs.get(layer.slot()) else {
            return Vec::new();
        };
        let mut hits: Vec<(Owner, Constraint)> = index.query(*rect).into_iter().map(|(_, c)| c).collect();
        hits.sort();
        hits.dedup();
        hits
    }

    /// Rebuilds the index for a worker owning `nets` (sorted). With
    /// `include_external`, fixed geometry and other nets' routes meeting
    /// `context` are loaded too.
    pub fn init(
        &mut self,
        design: &Design,
        nets: &[NetId],
        context: Rect,
        include_external: bool,
    ) -> DrtResult<()> {
        self.clear();
        let tech = &design.tech;
        for &net in nets {
            let data = &design.nets[net.index()];
            for &pin in &data.pins {
                self.add(&ShapeSet::pin(design, pin))?;
            }
            for shape in &data.route {
                self.add(&ShapeSet::expand(shape, Owner::Net(net), tech)?)?;
            }
        }
        if !include_external {
            return Ok(());
        }
        for (i, obs) in design.obstructions.iter().enumerate() {
            if obs.rect.intersects(&context) {
                self.add(&ShapeSet {
                    owner: Owner::Obstruction(ObsId::new(i)),
                    rects: vec![(obs.layer, obs.rect)],
                })?;
            }
        }
        for (i, data) in design.nets.iter().enumerate() {
            let net = NetId::new(i);
            if nets.binary_search(&net).is_ok() {
                continue;
            }
            for &pin in &data.pins {
                let set = ShapeSet::pin(design, pin);
                if set.intersects(&context) {
                    self.add(&set)?;
                }
            }
            for shape in &data.route {
                let set = ShapeSet::expand(shape, Owner::Net(net), tech)?;
                if set.intersects(&context) {
                    self.add(&set)?;
                }
            }
        }
        log::debug!(target: "drt", "region query loaded {} rects", self.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drt_common::db::design::{PathSeg, ViaInst};
    use drt_common::db::tech::{LayerDirection, RoutingLayer};
    use drt_common::geom::Point;

    fn tech() -> Tech {
        let mut t = Tech::new(1000);
        t.add_layer(RoutingLayer::new("M1".into(), 0, LayerDirection::Horizontal, 200, 100));
        t.add_cut_layer("V1".into(), 80, 100);
        t.add_layer(RoutingLayer::new("M2".into(), 0, LayerDirection::Vertical, 200, 100));
        t.finalize();
        t
    }

    #[test]
    fn via_expands_to_three_layers() {
        let t = tech();
        let via = RouteShape::Via(ViaInst {
            def: t.default_via(0).unwrap(),
            origin: Point::new(1000, 1000),
        });
        let set = ShapeSet::expand(&via, Owner::Net(NetId(0)), &t).unwrap();
        let layers: Vec<LayerRef> = set.rects.iter().map(|(l, _)| *l).collect();
        assert_eq!(layers, vec![LayerRef::Routing(0), LayerRef::Cut(0), LayerRef::Routing(1)]);
        assert!(set.rects.iter().all(|(_, r)| r.contains(Point::new(1000, 1000))));
    }

    #[test]
    fn unknown_via_is_rejected() {
        let t = tech();
        let via = RouteShape::Via(ViaInst {
            def: drt_common::db::indices::ViaDefId(99),
            origin: Point::new(0, 0),
        });
        let err = ShapeSet::expand(&via, Owner::Net(NetId(0)), &t).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnsupportedShape(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn failed_remove_leaves_index_untouched() {
        let t = tech();
        let mut rq = RegionQuery::new(t.num_layers());
        let wire = RouteShape::Wire(PathSeg {
            layer: 0,
            begin: Point::new(0, 100),
            end: Point::new(1000, 100),
            width: 100,
        });
        let set = ShapeSet::expand(&wire, Owner::Net(NetId(1)), &t).unwrap();
        rq.add(&set).unwrap();
        let mut bogus = set.clone();
        bogus.rects.push((LayerRef::Routing(1), Rect::from_coords(0, 0, 5, 5)));
        assert!(rq.remove(&bogus).is_err());
        assert_eq!(rq.len(), 1);
        rq.remove(&set).unwrap();
        assert!(rq.is_empty());
    }

    #[test]
    fn query_cost_returns_annotations() {
        let mut rq = RegionQuery::new(1);
        let r = Rect::from_coords(0, 0, 10, 10);
        rq.add_cost(r, LayerRef::Routing(0), Owner::Net(NetId(2)), Constraint::MetalSpacing);
        assert_eq!(
            rq.query_cost(&Rect::from_coords(5, 5, 20, 20), LayerRef::Routing(0)),
            vec![(Owner::Net(NetId(2)), Constraint::MetalSpacing)]
        );
        assert!(rq.remove_cost(r, LayerRef::Routing(0), Owner::Net(NetId(2)), Constraint::MetalSpacing));
        assert!(rq.query_cost(&r, LayerRef::Routing(0)).is_empty());
    }
}
