//! Read-only technology snapshot consumed by the router.
//!
//! Routing layers are indexed bottom-up by `z`. The cut layer between
//! routing layers `z` and `z + 1` is addressed as `LayerRef::Cut(z)`.

use crate::db::indices::ViaDefId;
use crate::error::{DrtError, DrtResult};
use crate::geom::{Dbu, Rect};
use crate::util::logger::Tool;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerDirection {
    Vertical,
    Horizontal,
    Unknown,
}

impl LayerDirection {
    pub fn allows_horizontal(&self) -> bool {
        !matches!(self, LayerDirection::Vertical)
    }

    pub fn allows_vertical(&self) -> bool {
        !matches!(self, LayerDirection::Horizontal)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerRef {
    Routing(u8),
    Cut(u8),
}

impl LayerRef {
    /// Interleaved slot: routing `z` -> `2z`, cut above `z` -> `2z + 1`.
    pub fn slot(&self) -> usize {
        match *self {
            LayerRef::Routing(z) => 2 * z as usize,
            LayerRef::Cut(z) => 2 * z as usize + 1,
        }
    }

    pub fn from_slot(slot: usize) -> Self {
        if slot % 2 == 0 {
            LayerRef::Routing((slot / 2) as u8)
        } else {
            LayerRef::Cut((slot / 2) as u8)
        }
    }
}

/// PARALLELRUNLENGTH spacing table. `spacing[row][col]` applies when the
/// wider shape is wider than `widths[row]` and the run length exceeds
/// `prls[col]`; the first row/column is the fallback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpacingTable {
    pub prls: Vec<Dbu>,
    pub widths: Vec<Dbu>,
    pub spacing: Vec<Vec<Dbu>>,
}

impl SpacingTable {
    pub fn simple(spacing: Dbu) -> Self {
        Self {
            prls: vec![0],
            widths: vec![0],
            spacing: vec![vec![spacing]],
        }
    }

    pub fn lookup(&self, width: Dbu, prl: Dbu) -> Dbu {
        let row = self
            .widths
            .iter()
            .rposition(|&w| width > w)
            .unwrap_or(0);
        let col = self.prls.iter().rposition(|&p| prl > p).unwrap_or(0);
        self.spacing
            .get(row)
            .and_then(|r| r.get(col).or(r.last()))
            .copied()
            .unwrap_or(0)
    }

    pub fn min_spacing(&self) -> Dbu {
        self.spacing
            .first()
            .and_then(|r| r.first())
            .copied()
            .unwrap_or(0)
    }

    pub fn max_spacing(&self) -> Dbu {
        self.spacing
            .iter()
            .flat_map(|r| r.iter())
            .copied()
            .max()
            .unwrap_or(0)
    }
}

/// End-of-line rule: an edge shorter than `width` needs `space` in front of
/// it, looking `within` to either side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EolRule {
    pub space: Dbu,
    pub width: Dbu,
    pub within: Dbu,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoutingLayer {
    pub name: String,
    pub index: u8,
    pub direction: LayerDirection,
    pub pitch: Dbu,
    pub offset: Dbu,
    pub width: Dbu,
    pub spacing: SpacingTable,
    pub min_area: Dbu,
    pub min_step: Option<Dbu>,
    pub eol: Option<EolRule>,
    pub corner_spacing: Option<Dbu>,
}

impl RoutingLayer {
    pub fn new(name: String, index: u8, direction: LayerDirection, pitch: Dbu, width: Dbu) -> Self {
        Self {
            name,
            index,
            direction,
            pitch,
            offset: 0,
            width,
            spacing: SpacingTable::simple((pitch - width).max(0)),
            min_area: 0,
            min_step: None,
            eol: None,
            corner_spacing: None,
        }
    }

    /// Furthest distance at which any rule on this layer can fire.
    pub fn max_reach(&self) -> Dbu {
        let eol = self.eol.map(|e| e.space.max(e.within)).unwrap_or(0);
        self.spacing
            .max_spacing()
            .max(eol)
            .max(self.corner_spacing.unwrap_or(0))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CutLayer {
    pub name: String,
    /// Routing layer directly below.
    pub below: u8,
    pub width: Dbu,
    pub spacing: Dbu,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViaDef {
    pub name: String,
    /// Routing layer of the bottom enclosure; the top is `bottom + 1`.
    pub bottom: u8,
    pub bottom_rects: Vec<Rect>,
    pub cut_rects: Vec<Rect>,
    pub top_rects: Vec<Rect>,
    pub is_default: bool,
}

impl ViaDef {
    pub fn top(&self) -> u8 {
        self.bottom + 1
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    pub width: Dbu,
    pub height: Dbu,
}

#[derive(Clone, Debug)]
pub struct Tech {
    pub dbu_per_micron: Dbu,
    pub layers: Vec<RoutingLayer>,
    pub cut_layers: Vec<CutLayer>,
    pub vias: Vec<ViaDef>,
    pub site: Option<Site>,
    pub layer_name_map: HashMap<String, LayerRef>,
    pub via_name_map: HashMap<String, ViaDefId>,
    default_vias: Vec<Option<ViaDefId>>,
}

impl Default for Tech {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl Tech {
    pub fn new(dbu_per_micron: Dbu) -> Self {
        Self {
            dbu_per_micron,
            layers: Vec::new(),
            cut_layers: Vec::new(),
            vias: Vec::new(),
            site: None,
            layer_name_map: HashMap::new(),
            via_name_map: HashMap::new(),
            default_vias: Vec::new(),
        }
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, z: u8) -> Option<&RoutingLayer> {
        self.layers.get(z as usize)
    }

    pub fn cut_layer(&self, below: u8) -> Option<&CutLayer> {
        self.cut_layers.iter().find(|c| c.below == below)
    }

    pub fn find_layer(&self, name: &str) -> Option<LayerRef> {
        self.layer_name_map.get(name).copied()
    }

    pub fn add_layer(&mut self, mut layer: RoutingLayer) -> u8 {
        let z = self.layers.len() as u8;
        layer.index = z;
        self.layer_name_map
            .insert(layer.name.clone(), LayerRef::Routing(z));
        self.layers.push(layer);
        z
    }

    /// Cut layers are declared between routing layers, so the cut sits
    /// above the most recently added routing layer.
    pub fn add_cut_layer(&mut self, name: String, width: Dbu, spacing: Dbu) {
        let below = self.layers.len().saturating_sub(1) as u8;
        self.layer_name_map
            .insert(name.clone(), LayerRef::Cut(below));
        self.cut_layers.push(CutLayer {
            name,
            below,
            width,
            spacing,
        });
    }

    pub fn add_via(&mut self, via: ViaDef) -> ViaDefId {
        let id = ViaDefId::new(self.vias.len());
        self.via_name_map.insert(via.name.clone(), id);
        self.vias.push(via);
        id
    }

    pub fn via(&self, id: ViaDefId) -> Option<&ViaDef> {
        self.vias.get(id.index())
    }

    pub fn default_via(&self, bottom: u8) -> Option<ViaDefId> {
        self.default_vias.get(bottom as usize).copied().flatten()
    }

    /// Picks one default via per adjacent layer pair, synthesizing a square
    /// one from the layer widths when the library declares none.
    pub fn finalize(&mut self) {
        let pairs = self.layers.len().saturating_sub(1);
        let mut defaults = vec![None; pairs];
        for z in 0..pairs {
            let declared = self
                .vias
                .iter()
                .enumerate()
                .filter(|(_, v)| v.bottom as usize == z)
                .min_by_key(|(i, v)| (!v.is_default, *i))
                .map(|(i, _)| ViaDefId::new(i));
            defaults[z] = match declared {
                Some(id) => Some(id),
                None => {
                    let bot_w = self.layers[z].width;
                    let top_w = self.layers[z + 1].width;
                    let name = format!("{}_{}_DEFAULT", self.layers[z].name, self.layers[z + 1].name);
                    let cut_w = self
                        .cut_layer(z as u8)
                        .map(|c| c.width)
                        .filter(|&w| w > 0)
                        .unwrap_or(bot_w.min(top_w) / 2)
                        .max(1);
                    let square = |w: Dbu| Rect::from_coords(-w / 2, -w / 2, w - w / 2, w - w / 2);
                    Some(self.add_via(ViaDef {
                        name,
                        bottom: z as u8,
                        bottom_rects: vec![square(bot_w)],
                        cut_rects: vec![square(cut_w)],
                        top_rects: vec![square(top_w)],
                        is_default: true,
                    }))
                }
            };
        }
        self.default_vias = defaults;
    }

    /// Checked before grid construction; 3-D routing needs a preferred
    /// direction on every layer.
    pub fn validate(&self, three_d: bool) -> DrtResult<()> {
        if self.layers.is_empty() {
            return Err(DrtError::config(Tool::Drt, 1, "no routing layers defined"));
        }
        if three_d {
            if let Some(l) = self
                .layers
                .iter()
                .find(|l| l.direction == LayerDirection::Unknown)
            {
                return Err(DrtError::config(
                    Tool::Drt,
                    2,
                    format!("layer {} has no preferred direction", l.name),
                ));
            }
        }
        if let Some(l) = self.layers.iter().find(|l| l.pitch <= 0) {
            return Err(DrtError::config(
                Tool::Drt,
                3,
                format!("layer {} has non-positive pitch {}", l.name, l.pitch),
            ));
        }
        Ok(())
    }
}
