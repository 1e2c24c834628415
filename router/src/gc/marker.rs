use crate::region_query::Owner;
use drt_common::db::tech::LayerRef;
use drt_common::geom::{Dbu, Rect};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Constraint {
    Short,
    MetalSpacing,
    CornerSpacing,
    EndOfLine,
    MinWidth,
    MinArea,
    MinStep,
    CutSpacing,
}

/// One rule violation. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub constraint: Constraint,
    pub layer: LayerRef,
    pub bbox: Rect,
    /// Offending objects, sorted and distinct.
    pub sources: Vec<Owner>,
    pub required: Dbu,
    pub actual: Dbu,
}

/// Identity of a marker. Sources are order-normalized so that (A, B) and
/// (B, A) collapse to the same key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerKey {
    pub constraint: Constraint,
    pub layer: LayerRef,
    pub bbox: Rect,
    pub sources: Vec<Owner>,
}

impl Marker {
    pub fn new(
        constraint: Constraint,
        layer: LayerRef,
        bbox: Rect,
        mut sources: Vec<Owner>,
        required: Dbu,
        actual: Dbu,
    ) -> Self {
        sources.sort();
        sources.dedup();
        Self {
            constraint,
            layer,
            bbox,
            sources,
            required,
            actual,
        }
    }

    pub fn key(&self) -> MarkerKey {
        MarkerKey {
            constraint: self.constraint,
            layer: self.layer,
            bbox: self.bbox,
            sources: self.sources.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drt_common::db::indices::{NetId, ObsId};

    #[test]
    fn key_ignores_source_order() {
        let r = Rect::from_coords(0, 0, 10, 10);
        let a = Owner::Net(NetId(1));
        let b = Owner::Obstruction(ObsId(0));
        let m1 = Marker::new(Constraint::Short, LayerRef::Routing(0), r, vec![a, b], 0, 0);
        let m2 = Marker::new(Constraint::Short, LayerRef::Routing(0), r, vec![b, a, b], 0, 0);
        assert_eq!(m1.key(), m2.key());
        assert_eq!(m2.sources.len(), 2);
    }
}
