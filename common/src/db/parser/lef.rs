use crate::db::design::MacroDef;
use crate::db::tech::{EolRule, LayerDirection, LayerRef, RoutingLayer, Site, SpacingTable, Tech, ViaDef};
use crate::geom::{Dbu, Rect};
use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::fs;

/// Parsed library: technology plus macro abstracts.
pub struct Library {
    pub tech: Tech,
    pub macros: HashMap<String, MacroDef>,
}

pub fn parse(filename: &str) -> Result<Library> {
    let text = fs::read_to_string(filename).with_context(|| format!("reading {}", filename))?;
    parse_str(&text)
}

#[derive(Default)]
struct LayerState {
    name: String,
    kind: String,
    direction: Option<LayerDirection>,
    pitch: f64,
    offset: f64,
    width: f64,
    spacing: Option<f64>,
    eol: Option<(f64, f64, f64)>,
    area: f64,
    min_step: Option<f64>,
    table_tokens: Option<Vec<String>>,
    table: Option<SpacingTable>,
}

enum Block {
    None,
    Skip(String),
    Layer(Box<LayerState>),
    Via {
        name: String,
        is_default: bool,
        layer: Option<LayerRef>,
        rects: Vec<(LayerRef, Rect)>,
    },
    Site {
        name: String,
    },
    Macro {
        name: String,
        def: MacroDef,
        pin: Option<String>,
        in_obs: bool,
        layer: Option<LayerRef>,
    },
}

pub fn parse_str(text: &str) -> Result<Library> {
    let mut tech = Tech::new(1000);
    let mut macros = HashMap::new();
    let mut block = Block::None;

    for (line_no, line) in text.lines().enumerate() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() || parts[0].starts_with('#') {
            continue;
        }
        let dbu = tech.dbu_per_micron as f64;
        let to_dbu = |v: f64| -> Dbu { (v * dbu).round() as Dbu };
        let num = |i: usize| -> Result<f64> {
            parts
                .get(i)
                .ok_or_else(|| anyhow!("line {}: missing value", line_no + 1))?
                .trim_end_matches(';')
                .parse::<f64>()
                .with_context(|| format!("line {}: bad number", line_no + 1))
        };

        if let Block::Layer(state) = &mut block
            && let Some(tokens) = state.table_tokens.as_mut()
        {
            tokens.extend(parts.iter().map(|s| s.to_string()));
            if parts.last().is_some_and(|p| p.ends_with(';')) {
                let tokens = state.table_tokens.take().unwrap_or_default();
                state.table = Some(parse_spacing_table(&tokens, &to_dbu)?);
            }
            continue;
        }

        match parts[0] {
            "UNITS" | "END" if parts.get(1) == Some(&"UNITS") => {}
            "DATABASE" if parts.get(1) == Some(&"MICRONS") => {
                tech.dbu_per_micron = num(2)? as Dbu;
            }
            "PROPERTYDEFINITIONS" | "NONDEFAULTRULE" | "VIARULE" if matches!(block, Block::None) => {
                block = Block::Skip(parts.get(1).unwrap_or(&parts[0]).to_string());
            }
            "LAYER" if matches!(block, Block::None) => {
                block = Block::Layer(Box::new(LayerState {
                    name: parts[1].to_string(),
                    ..Default::default()
                }));
            }
            "VIA" if matches!(block, Block::None) => {
                block = Block::Via {
                    name: parts[1].to_string(),
                    is_default: parts.get(2) == Some(&"DEFAULT"),
                    layer: None,
                    rects: Vec::new(),
                };
            }
            "SITE" if matches!(block, Block::None) => {
                block = Block::Site {
                    name: parts[1].to_string(),
                };
            }
            "MACRO" => {
                block = Block::Macro {
                    name: parts[1].to_string(),
                    def: MacroDef::default(),
                    pin: None,
                    in_obs: false,
                    layer: None,
                };
            }
            "END" => {
                let closing = parts.get(1).copied();
                match std::mem::replace(&mut block, Block::None) {
                    Block::Layer(state) if closing == Some(state.name.as_str()) => {
                        finish_layer(&mut tech, *state, &to_dbu);
                    }
                    Block::Via {
                        name,
                        is_default,
                        rects,
                        ..
                    } if closing == Some(name.as_str()) => {
                        add_via(&mut tech, name, is_default, rects, line_no)?;
                    }
                    Block::Site { name } if closing == Some(name.as_str()) => {}
                    Block::Skip(name) if closing == Some(name.as_str()) => {}
                    Block::Macro {
                        name,
                        def,
                        pin,
                        in_obs,
                        layer,
                    } => {
                        if closing == Some(name.as_str()) {
                            macros.insert(name, def);
                        } else {
                            let pin = if closing.is_some() && closing == pin.as_deref() {
                                None
                            } else {
                                pin
                            };
                            let in_obs = in_obs && closing.is_some();
                            block = Block::Macro {
                                name,
                                def,
                                pin,
                                in_obs,
                                layer,
                            };
                        }
                    }
                    other => block = other,
                }
            }
            key => match &mut block {
                Block::Layer(state) => match key {
                    "TYPE" => state.kind = parts[1].trim_end_matches(';').to_string(),
                    "DIRECTION" => {
                        state.direction = Some(match parts[1] {
                            "VERTICAL" => LayerDirection::Vertical,
                            "HORIZONTAL" => LayerDirection::Horizontal,
                            _ => LayerDirection::Unknown,
                        })
                    }
                    "PITCH" => state.pitch = num(1)?,
                    "OFFSET" => state.offset = num(1)?,
                    "WIDTH" => state.width = num(1)?,
                    "AREA" => state.area = num(1)?,
                    "MINSTEP" => state.min_step = Some(num(1)?),
                    "SPACING" => {
                        let s = num(1)?;
                        if let Some(i) = parts.iter().position(|&p| p == "ENDOFLINE") {
                            let w = num(i + 1)?;
                            let within = parts
                                .iter()
                                .position(|&p| p == "WITHIN")
                                .map(|j| num(j + 1))
                                .transpose()?
                                .unwrap_or(0.0);
                            state.eol = Some((s, w, within));
                        } else {
                            state.spacing = Some(state.spacing.map_or(s, |prev| prev.min(s)));
                        }
                    }
                    "SPACINGTABLE" => {
                        let tokens: Vec<String> = parts[1..].iter().map(|s| s.to_string()).collect();
                        if parts.last().is_some_and(|p| p.ends_with(';')) {
                            state.table = Some(parse_spacing_table(&tokens, &to_dbu)?);
                        } else {
                            state.table_tokens = Some(tokens);
                        }
                    }
                    _ => {}
                },
                Block::Via { layer, rects, .. } => match key {
                    "LAYER" => {
                        *layer = Some(tech.find_layer(parts[1]).ok_or_else(|| {
                            anyhow!("line {}: unknown layer {}", line_no + 1, parts[1])
                        })?);
                    }
                    "RECT" => {
                        let l = layer.ok_or_else(|| anyhow!("line {}: RECT before LAYER", line_no + 1))?;
                        rects.push((l, rect_of(&num, &to_dbu)?));
                    }
                    _ => {}
                },
                Block::Site { name } => {
                    if key == "SIZE" {
                        tech.site = Some(Site {
                            name: name.clone(),
                            width: to_dbu(num(1)?),
                            height: to_dbu(num(3)?),
                        });
                    }
                }
                Block::Macro {
                    def,
                    pin,
                    in_obs,
                    layer,
                    ..
                } => match key {
                    "SIZE" => {
                        def.width = to_dbu(num(1)?);
                        def.height = to_dbu(num(3)?);
                    }
                    "PIN" => *pin = Some(parts[1].to_string()),
                    "OBS" => *in_obs = true,
                    "LAYER" => *layer = tech.find_layer(parts[1]),
                    "RECT" => {
                        let Some(l) = *layer else { continue };
                        let r = rect_of(&num, &to_dbu)?;
                        if *in_obs {
                            def.obs.push((l, r));
                        } else if let Some(p) = pin {
                            def.pins.entry(p.clone()).or_default().push((l, r));
                        }
                    }
                    _ => {}
                },
                Block::None | Block::Skip(_) => {}
            },
        }
    }

    if tech.layers.is_empty() {
        log::warn!("No routing layers found in LEF. Adding default 6 layers.");
        for i in 0..6u8 {
            let dir = if i % 2 == 0 {
                LayerDirection::Horizontal
            } else {
                LayerDirection::Vertical
            };
            let pitch = tech.dbu_per_micron / 5;
            tech.add_layer(RoutingLayer::new(format!("M{}", i + 1), i, dir, pitch, pitch / 2));
        }
    }
    tech.finalize();

    Ok(Library { tech, macros })
}

fn rect_of(num: &dyn Fn(usize) -> Result<f64>, to_dbu: &dyn Fn(f64) -> Dbu) -> Result<Rect> {
    Ok(Rect::from_coords(
        to_dbu(num(1)?),
        to_dbu(num(2)?),
        to_dbu(num(3)?),
        to_dbu(num(4)?),
    ))
}

fn parse_spacing_table(tokens: &[String], to_dbu: &dyn Fn(f64) -> Dbu) -> Result<SpacingTable> {
    let mut prls = Vec::new();
    let mut widths = Vec::new();
    let mut spacing: Vec<Vec<Dbu>> = Vec::new();
    let mut in_width = false;
    for tok in tokens {
        let tok = tok.trim_end_matches(';');
        match tok {
            "PARALLELRUNLENGTH" | "" => {}
            "WIDTH" => {
                in_width = true;
                spacing.push(Vec::new());
                widths.push(None);
            }
            t => {
                let v = to_dbu(t.parse::<f64>().with_context(|| format!("bad spacing table value {}", t))?);
                if !in_width {
                    prls.push(v);
                } else if let Some(w) = widths.last_mut().filter(|w| w.is_none()) {
                    *w = Some(v);
                } else if let Some(row) = spacing.last_mut() {
                    row.push(v);
                }
            }
        }
    }
    if prls.is_empty() || spacing.is_empty() {
        return Err(anyhow!("empty SPACINGTABLE"));
    }
    Ok(SpacingTable {
        prls,
        widths: widths.into_iter().map(|w| w.unwrap_or(0)).collect(),
        spacing,
    })
}

fn finish_layer(tech: &mut Tech, state: LayerState, to_dbu: &dyn Fn(f64) -> Dbu) {
    let dbu = tech.dbu_per_micron as f64;
    match state.kind.as_str() {
        "ROUTING" => {
            let mut layer = RoutingLayer::new(
                state.name.clone(),
                0,
                state.direction.unwrap_or(LayerDirection::Unknown),
                to_dbu(state.pitch),
                to_dbu(state.width),
            );
            layer.offset = to_dbu(state.offset);
            layer.min_area = (state.area * dbu * dbu).round() as Dbu;
            if let Some(table) = state.table {
                layer.spacing = table;
            } else if let Some(s) = state.spacing {
                layer.spacing = SpacingTable::simple(to_dbu(s));
            }
            layer.min_step = state.min_step.map(to_dbu);
            layer.eol = state.eol.map(|(s, w, within)| EolRule {
                space: to_dbu(s),
                width: to_dbu(w),
                within: to_dbu(within),
            });
            tech.add_layer(layer);
        }
        "CUT" => {
            tech.add_cut_layer(
                state.name,
                to_dbu(state.width),
                state.spacing.map(to_dbu).unwrap_or(0),
            );
        }
        _ => {}
    }
}

fn add_via(
    tech: &mut Tech,
    name: String,
    is_default: bool,
    rects: Vec<(LayerRef, Rect)>,
    line_no: usize,
) -> Result<()> {
    let bottom = rects
        .iter()
        .filter_map(|(l, _)| match l {
            LayerRef::Routing(z) => Some(*z),
            LayerRef::Cut(_) => None,
        })
        .min()
        .ok_or_else(|| anyhow!("line {}: via {} has no routing layer rects", line_no + 1, name))?;
    let pick = |want: LayerRef| -> Vec<Rect> {
        rects
            .iter()
            .filter(|(l, _)| *l == want)
            .map(|(_, r)| *r)
            .collect()
    };
    tech.add_via(ViaDef {
        bottom_rects: pick(LayerRef::Routing(bottom)),
        cut_rects: pick(LayerRef::Cut(bottom)),
        top_rects: pick(LayerRef::Routing(bottom + 1)),
        name,
        bottom,
        is_default,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEF: &str = "\
UNITS
  DATABASE MICRONS 2000 ;
END UNITS
PROPERTYDEFINITIONS
  LAYER LEF58_TYPE STRING ;
END PROPERTYDEFINITIONS
SITE core
  SIZE 0.2 BY 1.6 ;
END core
LAYER M1
  TYPE ROUTING ;
  DIRECTION HORIZONTAL ;
  PITCH 0.2 ;
  WIDTH 0.1 ;
  AREA 0.02 ;
  SPACINGTABLE
    PARALLELRUNLENGTH 0.0 0.5
    WIDTH 0.0 0.1 0.12
    WIDTH 0.3 0.15 0.2 ;
  SPACING 0.1 ENDOFLINE 0.12 WITHIN 0.03 ;
END M1
LAYER V1
  TYPE CUT ;
  WIDTH 0.08 ;
  SPACING 0.1 ;
END V1
LAYER M2
  TYPE ROUTING ;
  DIRECTION VERTICAL ;
  PITCH 0.2 ;
  WIDTH 0.1 ;
END M2
VIA V12 DEFAULT
  LAYER M1 ;
    RECT -0.06 -0.05 0.06 0.05 ;
  LAYER V1 ;
    RECT -0.04 -0.04 0.04 0.04 ;
  LAYER M2 ;
    RECT -0.05 -0.06 0.05 0.06 ;
END V12
MACRO INV
  SIZE 0.6 BY 1.6 ;
  PIN A
    PORT
      LAYER M1 ;
        RECT 0.1 0.2 0.2 0.4 ;
    END
  END A
  OBS
    LAYER M1 ;
      RECT 0.3 0.0 0.5 1.6 ;
  END
END INV
";

    #[test]
    fn parses_layers_rules_and_vias() {
        let lib = parse_str(LEF).unwrap();
        let tech = &lib.tech;
        assert_eq!(tech.dbu_per_micron, 2000);
        assert_eq!(tech.num_layers(), 2);
        let m1 = tech.layer(0).unwrap();
        assert_eq!(m1.pitch, 400);
        assert_eq!(m1.width, 200);
        assert_eq!(m1.min_area, 80_000);
        assert_eq!(m1.spacing.lookup(200, 0), 200);
        assert_eq!(m1.spacing.lookup(800, 2000), 400);
        assert_eq!(m1.eol.unwrap().width, 240);
        assert_eq!(tech.cut_layer(0).unwrap().spacing, 200);
        let via = tech.via(tech.default_via(0).unwrap()).unwrap();
        assert_eq!(via.name, "V12");
        assert_eq!(via.cut_rects.len(), 1);
        assert_eq!(tech.site.as_ref().unwrap().height, 3200);
    }

    #[test]
    fn parses_macro_pins_and_obstructions() {
        let lib = parse_str(LEF).unwrap();
        let inv = &lib.macros["INV"];
        assert_eq!((inv.width, inv.height), (1200, 3200));
        assert_eq!(inv.pins["A"], vec![(LayerRef::Routing(0), Rect::from_coords(200, 400, 400, 800))]);
        assert_eq!(inv.obs.len(), 1);
    }
}
