use crate::db::design::{CellData, Design, GCellPattern, PathSeg, RouteShape, Row, TrackAxis, TrackPattern, ViaInst};
use crate::db::parser::lef::Library;
use crate::db::tech::{LayerRef, Tech};
use crate::geom::{Dbu, Orientation, Point, Rect, Transform};
use anyhow::{Context, Result, anyhow};
use std::collections::{HashMap, HashSet};
use std::fs;

pub fn parse(lib: Library, filename: &str) -> Result<Design> {
    let text = fs::read_to_string(filename).with_context(|| format!("reading {}", filename))?;
    parse_str(lib, &text)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Components,
    Pins,
    Nets,
    SpecialNets,
    Blockages,
    Skip,
}

/// DEF statements end at `;`, except `END <section>` which stands alone.
fn statements(text: &str) -> Vec<Vec<&str>> {
    let mut out = Vec::new();
    let mut cur: Vec<&str> = Vec::new();
    let mut pending_end = false;
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or("");
        for tok in line.split_whitespace() {
            if pending_end {
                out.push(vec!["END", tok]);
                pending_end = false;
                continue;
            }
            if cur.is_empty() && tok == "END" {
                pending_end = true;
                continue;
            }
            let body = tok.trim_end_matches(';');
            if !body.is_empty() {
                cur.push(body);
            }
            if tok.ends_with(';') {
                out.push(std::mem::take(&mut cur));
            }
        }
    }
    if pending_end {
        out.push(vec!["END"]);
    }
    out
}

fn coord(s: &str, prev: Dbu, scale: f64) -> Result<Dbu> {
    if s == "*" {
        return Ok(prev);
    }
    let v: f64 = s.parse().with_context(|| format!("bad coordinate {}", s))?;
    Ok((v * scale).round() as Dbu)
}

/// Every `( x y )` pair in a statement, `*` repeating the previous value.
fn points(parts: &[&str], scale: f64) -> Result<Vec<Point>> {
    let mut pts: Vec<Point> = Vec::new();
    let mut i = 0;
    while i < parts.len() {
        if parts[i] == "(" && i + 3 < parts.len() && parts[i + 3] == ")" {
            let prev = pts.last().copied().unwrap_or_default();
            pts.push(Point::new(
                coord(parts[i + 1], prev.x, scale)?,
                coord(parts[i + 2], prev.y, scale)?,
            ));
            i += 4;
        } else {
            i += 1;
        }
    }
    Ok(pts)
}

/// Wiring of a net statement: `+ ROUTED layer ( x y ) ( x y ) [via] NEW ...`.
/// Special wiring carries a width after the layer name; regular wiring
/// uses the layer's default width. A via switches the path to its other
/// layer. Point extensions, masks and `RECT` patches are skipped.
fn wiring(tech: &Tech, parts: &[&str], scale: f64, special: bool) -> Result<Vec<RouteShape>> {
    let mut shapes = Vec::new();
    let mut in_wiring = false;
    let mut layer: Option<u8> = None;
    let mut width: Dbu = 0;
    let mut last: Option<Point> = None;
    let mut i = 0;
    while i < parts.len() {
        let tok = parts[i];
        let starts_path = match tok {
            "+" => match parts.get(i + 1).copied() {
                Some("ROUTED" | "FIXED" | "COVER" | "NOSHIELD") => {
                    i += 2;
                    true
                }
                Some("SHAPE" | "STYLE" | "MASK") if in_wiring => {
                    i += 3;
                    continue;
                }
                _ => {
                    in_wiring = false;
                    i += 1;
                    continue;
                }
            },
            "NEW" if in_wiring => {
                i += 1;
                true
            }
            _ => false,
        };
        if starts_path {
            in_wiring = true;
            last = None;
            let name = parts.get(i).copied().unwrap_or("");
            layer = match tech.find_layer(name) {
                Some(LayerRef::Routing(z)) => Some(z),
                _ => {
                    log::warn!("Wiring on unknown routing layer {}", name);
                    None
                }
            };
            width = layer.and_then(|z| tech.layer(z)).map_or(0, |l| l.width);
            i += 1;
            if special && let Some(w) = parts.get(i).and_then(|t| t.parse::<f64>().ok()) {
                width = (w * scale).round() as Dbu;
                i += 1;
            }
            continue;
        }
        if !in_wiring {
            i += 1;
            continue;
        }
        match tok {
            "(" => {
                let Some(close) = parts[i..].iter().position(|&t| t == ")").map(|k| i + k) else {
                    break;
                };
                if close >= i + 3 {
                    let prev = last.unwrap_or_default();
                    let p = Point::new(coord(parts[i + 1], prev.x, scale)?, coord(parts[i + 2], prev.y, scale)?);
                    if let (Some(z), Some(q)) = (layer, last)
                        && q != p
                    {
                        shapes.push(RouteShape::Wire(PathSeg {
                            layer: z,
                            begin: q,
                            end: p,
                            width,
                        }));
                    }
                    last = Some(p);
                }
                i = close + 1;
            }
            "RECT" => i += 6,
            _ => {
                if let (Some(&id), Some(p)) = (tech.via_name_map.get(tok), last)
                    && let Some(def) = tech.via(id)
                {
                    shapes.push(RouteShape::Via(ViaInst { def: id, origin: p }));
                    layer = Some(if layer == Some(def.bottom) { def.top() } else { def.bottom });
                }
                i += 1;
            }
        }
    }
    Ok(shapes)
}

fn keyword_value<'a>(parts: &[&'a str], key: &str) -> Option<&'a str> {
    parts
        .iter()
        .position(|&p| p == key)
        .and_then(|i| parts.get(i + 1).copied())
}

struct IoPin {
    net: String,
    shapes: Vec<(u8, Rect)>,
}

/// Builds a design over `lib`. DEF coordinates are rescaled to the LEF
/// database resolution.
pub fn parse_str(lib: Library, text: &str) -> Result<Design> {
    let mut design = Design::new(lib.tech);
    design.macros = lib.macros;

    let mut section = Section::None;
    let mut scale = 1.0;
    let mut gcell_x: Option<(Dbu, u32, Dbu)> = None;
    let mut gcell_y: Option<(Dbu, u32, Dbu)> = None;
    let mut io_pins: HashMap<String, IoPin> = HashMap::new();
    let mut io_order: Vec<String> = Vec::new();
    let mut io_used: HashSet<String> = HashSet::new();

    for parts in statements(text) {
        if parts.is_empty() {
            continue;
        }
        match parts[0] {
            "END" => {
                section = Section::None;
                continue;
            }
            "COMPONENTS" => {
                section = Section::Components;
                continue;
            }
            "PINS" => {
                section = Section::Pins;
                continue;
            }
            "NETS" => {
                section = Section::Nets;
                continue;
            }
            "BLOCKAGES" => {
                section = Section::Blockages;
                continue;
            }
            "SPECIALNETS" => {
                section = Section::SpecialNets;
                continue;
            }
            "VIAS" | "REGIONS" | "GROUPS" | "PROPERTYDEFINITIONS" | "NONDEFAULTRULES" => {
                section = Section::Skip;
                continue;
            }
            _ => {}
        }

        match (section, parts[0]) {
            (Section::None, "DESIGN") => {
                design.name = parts.get(1).unwrap_or(&"").to_string();
            }
            (Section::None, "UNITS") => {
                let def_units: f64 = keyword_value(&parts, "MICRONS")
                    .ok_or_else(|| anyhow!("UNITS without MICRONS"))?
                    .parse()?;
                scale = design.tech.dbu_per_micron as f64 / def_units;
                if scale != 1.0 {
                    log::info!(
                        "DEF units {} rescaled to LEF database units {}",
                        def_units,
                        design.tech.dbu_per_micron
                    );
                }
            }
            (Section::None, "DIEAREA") => {
                let pts = points(&parts, scale)?;
                let first = pts.first().ok_or_else(|| anyhow!("DIEAREA without points"))?;
                design.die_area = pts
                    .iter()
                    .fold(Rect::new(*first, *first), |r, p| r.merge(&Rect::new(*p, *p)));
            }
            (Section::None, "ROW") => {
                // ROW name site x y orient DO nx BY ny STEP sx sy
                let site = parts.get(2).copied().unwrap_or("");
                let x: f64 = parts.get(3).ok_or_else(|| anyhow!("ROW x"))?.parse()?;
                let y: f64 = parts.get(4).ok_or_else(|| anyhow!("ROW y"))?.parse()?;
                let num: u32 = keyword_value(&parts, "DO").unwrap_or("1").parse()?;
                let (site_width, height) = match design.tech.site.as_ref() {
                    Some(s) if s.name == site || site.is_empty() => (s.width, s.height),
                    Some(s) => {
                        log::warn!("Row {} uses site {}, library defines {}", parts[1], site, s.name);
                        (s.width, s.height)
                    }
                    None => {
                        let step: f64 = parts
                            .iter()
                            .position(|&p| p == "STEP")
                            .and_then(|i| parts.get(i + 1))
                            .map_or(Ok(0.0), |s| s.parse())?;
                        ((step * scale).round() as Dbu, 0)
                    }
                };
                design.rows.push(Row {
                    name: parts.get(1).unwrap_or(&"").to_string(),
                    origin: Point::new((x * scale).round() as Dbu, (y * scale).round() as Dbu),
                    num_sites: num,
                    site_width,
                    height,
                });
            }
            (Section::None, "TRACKS") => {
                let axis = match parts.get(1) {
                    Some(&"X") => TrackAxis::X,
                    Some(&"Y") => TrackAxis::Y,
                    other => return Err(anyhow!("bad TRACKS axis {:?}", other)),
                };
                let start: f64 = parts.get(2).ok_or_else(|| anyhow!("TRACKS start"))?.parse()?;
                let num: u32 = keyword_value(&parts, "DO")
                    .ok_or_else(|| anyhow!("TRACKS without DO"))?
                    .parse()?;
                let step: f64 = keyword_value(&parts, "STEP")
                    .ok_or_else(|| anyhow!("TRACKS without STEP"))?
                    .parse()?;
                let layers_at = parts.iter().position(|&p| p == "LAYER").map_or(parts.len(), |i| i + 1);
                for name in &parts[layers_at..] {
                    if let Some(LayerRef::Routing(z)) = design.tech.find_layer(name) {
                        design.tracks.push(TrackPattern {
                            layer: z,
                            axis,
                            start: (start * scale).round() as Dbu,
                            num,
                            step: (step * scale).round() as Dbu,
                        });
                    }
                }
            }
            (Section::None, "GCELLGRID") => {
                let start: f64 = parts.get(2).ok_or_else(|| anyhow!("GCELLGRID start"))?.parse()?;
                let num: u32 = keyword_value(&parts, "DO")
                    .ok_or_else(|| anyhow!("GCELLGRID without DO"))?
                    .parse()?;
                let step: f64 = keyword_value(&parts, "STEP")
                    .ok_or_else(|| anyhow!("GCELLGRID without STEP"))?
                    .parse()?;
                let entry = (
                    (start * scale).round() as Dbu,
                    num,
                    (step * scale).round() as Dbu,
                );
                // The widest entry is the regular pattern; trailing ones cover the remainder.
                let slot = if parts.get(1) == Some(&"X") {
                    &mut gcell_x
                } else {
                    &mut gcell_y
                };
                if slot.is_none_or(|(_, n, _)| num > n) {
                    *slot = Some(entry);
                }
            }
            (Section::Components, "-") => {
                let name = parts.get(1).ok_or_else(|| anyhow!("component without name"))?;
                let lib_name = parts.get(2).ok_or_else(|| anyhow!("component {} without macro", name))?;
                let is_fixed = parts.contains(&"FIXED") || parts.contains(&"COVER");
                let pos = points(&parts, scale)?.first().copied().unwrap_or_default();
                let orient = parts
                    .iter()
                    .rposition(|&p| p == ")")
                    .and_then(|i| parts.get(i + 1))
                    .and_then(|s| Orientation::parse(s))
                    .unwrap_or_default();
                let (width, height) = match design.macros.get(*lib_name) {
                    Some(m) => (m.width, m.height),
                    None => {
                        log::warn!("Unknown macro {} for component {}", lib_name, name);
                        (0, 0)
                    }
                };
                let tf = Transform::from_placement(pos, orient, width, height);
                let obs: Vec<(LayerRef, Rect)> = design
                    .macros
                    .get(*lib_name)
                    .map(|m| m.obs.iter().map(|(l, r)| (*l, tf.apply_rect(r))).collect())
                    .unwrap_or_default();
                for (layer, rect) in obs {
                    design.add_obstruction(layer, rect);
                }
                design.add_cell(CellData {
                    name: name.to_string(),
                    lib_name: lib_name.to_string(),
                    width,
                    height,
                    is_fixed,
                    pos,
                    orient,
                });
            }
            (Section::Pins, "-") => {
                let name = parts.get(1).ok_or_else(|| anyhow!("pin without name"))?.to_string();
                let net = keyword_value(&parts, "NET").unwrap_or("").to_string();
                // Shape corners come first, the placement point follows PLACED/FIXED.
                let placed_at = parts
                    .iter()
                    .position(|&p| p == "PLACED" || p == "FIXED" || p == "COVER")
                    .unwrap_or(parts.len());
                let loc = points(&parts[placed_at..], scale)?.first().copied().unwrap_or_default();
                let orient = parts
                    .get(placed_at..)
                    .and_then(|tail| tail.iter().rposition(|&p| p == ")").and_then(|i| tail.get(i + 1)))
                    .and_then(|s| Orientation::parse(s))
                    .unwrap_or_default();
                let tf = Transform::new(loc, orient);
                let mut shapes = Vec::new();
                let mut i = 0;
                while i < placed_at {
                    if parts[i] == "LAYER"
                        && let Some(LayerRef::Routing(z)) = parts.get(i + 1).and_then(|n| design.tech.find_layer(n))
                    {
                        let end = (i + 10).min(placed_at);
                        let pts = points(&parts[i + 2..end], scale)?;
                        if pts.len() >= 2 {
                            shapes.push((z, tf.apply_rect(&Rect::new(pts[0], pts[1]))));
                        }
                    }
                    i += 1;
                }
                if shapes.is_empty() {
                    let z = design.tech.layers.first().map_or(0, |l| l.index);
                    shapes.push((z, Rect::new(loc, loc)));
                }
                if !net.is_empty() {
                    io_order.push(name.clone());
                    io_pins.insert(name, IoPin { net, shapes });
                }
            }
            (Section::Nets, "-") => {
                let net_name = parts.get(1).ok_or_else(|| anyhow!("net without name"))?;
                let net = design.add_net(net_name.to_string());
                // Connections precede the first `+` attribute.
                let conn_end = parts.iter().position(|&p| p == "+").unwrap_or(parts.len());
                let mut i = 2;
                while i + 2 < conn_end {
                    if parts[i] != "(" {
                        i += 1;
                        continue;
                    }
                    let (inst, pin_name) = (parts[i + 1], parts[i + 2]);
                    i += 3;
                    if inst == "PIN" {
                        if let Some(io) = io_pins.get(pin_name)
                            && io_used.insert(pin_name.to_string())
                        {
                            design.add_pin(net, pin_name.to_string(), None, io.shapes.clone());
                        }
                        continue;
                    }
                    let Some(&cell_id) = design.cell_name_map.get(inst) else {
                        log::warn!("Net {} references unknown component {}", net_name, inst);
                        continue;
                    };
                    let shapes = cell_pin_shapes(&design, cell_id.index(), pin_name);
                    design.add_pin(net, format!("{}/{}", inst, pin_name), Some(cell_id), shapes);
                }
                let route = wiring(&design.tech, &parts[conn_end..], scale, false)?;
                design.nets[net.index()].route.extend(route);
            }
            // Power and ground wiring is not rerouted; it blocks like an OBS.
            (Section::SpecialNets, "-") => {
                for shape in wiring(&design.tech, &parts, scale, true)? {
                    match shape {
                        RouteShape::Wire(seg) => {
                            design.add_obstruction(LayerRef::Routing(seg.layer), seg.rect());
                        }
                        RouteShape::Via(via) => {
                            let Some(def) = design.tech.via(via.def) else {
                                continue;
                            };
                            let at = |r: &Rect| Rect::new(r.min + via.origin, r.max + via.origin);
                            let rects: Vec<(LayerRef, Rect)> = def
                                .bottom_rects
                                .iter()
                                .map(|r| (LayerRef::Routing(def.bottom), at(r)))
                                .chain(def.cut_rects.iter().map(|r| (LayerRef::Cut(def.bottom), at(r))))
                                .chain(def.top_rects.iter().map(|r| (LayerRef::Routing(def.top()), at(r))))
                                .collect();
                            for (layer, rect) in rects {
                                design.add_obstruction(layer, rect);
                            }
                        }
                    }
                }
            }
            (Section::Blockages, "-") => {
                let layer = keyword_value(&parts, "LAYER").and_then(|n| design.tech.find_layer(n));
                if let Some(layer) = layer {
                    let pts = points(&parts, scale)?;
                    for pair in pts.chunks_exact(2) {
                        design.add_obstruction(layer, Rect::new(pair[0], pair[1]));
                    }
                }
            }
            _ => {}
        }
    }

    // IO pins no NETS statement mentioned still connect to the net they declare.
    for name in io_order {
        if io_used.contains(&name) {
            continue;
        }
        if let Some(io) = io_pins.remove(&name) {
            let net = design.add_net(io.net);
            design.add_pin(net, name, None, io.shapes);
        }
    }

    if let (Some((x0, nx, sx)), Some((y0, ny, sy))) = (gcell_x, gcell_y) {
        design.gcell = GCellPattern {
            origin: Point::new(x0, y0),
            step_x: sx,
            step_y: sy,
            count_x: nx.saturating_sub(1).max(1),
            count_y: ny.saturating_sub(1).max(1),
        };
    }

    log::info!(
        "DEF {}: {} components, {} nets, {} pins, {} obstructions",
        design.name,
        design.cells.len(),
        design.nets.len(),
        design.pins.len(),
        design.obstructions.len()
    );
    Ok(design)
}

/// Macro pin geometry placed by the instance transform. Pins missing from
/// the library fall back to a point at the instance center on the lowest
/// routing layer.
fn cell_pin_shapes(design: &Design, cell: usize, pin: &str) -> Vec<(u8, Rect)> {
    let c = &design.cells[cell];
    let tf = Transform::from_placement(c.pos, c.orient, c.width, c.height);
    let shapes: Vec<(u8, Rect)> = design
        .macros
        .get(&c.lib_name)
        .and_then(|m| m.pins.get(pin))
        .map(|rects| {
            rects
                .iter()
                .filter_map(|(l, r)| match l {
                    LayerRef::Routing(z) => Some((*z, tf.apply_rect(r))),
                    LayerRef::Cut(_) => None,
                })
                .collect()
        })
        .unwrap_or_default();
    if shapes.is_empty() {
        log::warn!("No geometry for pin {}/{}; using instance center", c.name, pin);
        let center = tf.apply_rect(&Rect::from_coords(0, 0, c.width, c.height)).center();
        let z = design.tech.layers.first().map_or(0, |l| l.index);
        return vec![(z, Rect::new(center, center))];
    }
    shapes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::parser::lef;

    const LEF: &str = "\
UNITS
  DATABASE MICRONS 1000 ;
END UNITS
LAYER M1
  TYPE ROUTING ;
  DIRECTION HORIZONTAL ;
  PITCH 0.2 ;
  WIDTH 0.1 ;
END M1
LAYER M2
  TYPE ROUTING ;
  DIRECTION VERTICAL ;
  PITCH 0.2 ;
  WIDTH 0.1 ;
END M2
MACRO BUF
  SIZE 1.0 BY 2.0 ;
  PIN A
    PORT
      LAYER M1 ;
        RECT 0.1 0.1 0.2 0.2 ;
    END
  END A
  OBS
    LAYER M2 ;
      RECT 0.4 0.0 0.6 2.0 ;
  END
END BUF
";

    const DEF: &str = "\
VERSION 5.8 ;
DESIGN top ;
UNITS DISTANCE MICRONS 2000 ;
DIEAREA ( 0 0 ) ( 20000 20000 ) ;
GCELLGRID X 0 DO 11 STEP 2000 ;
GCELLGRID Y 0 DO 11 STEP 2000 ;
TRACKS Y 200 DO 50 STEP 400 LAYER M1 ;
COMPONENTS 1 ;
- u1 BUF + PLACED ( 2000 4000 ) S ;
END COMPONENTS
PINS 1 ;
- in + NET n1 + DIRECTION INPUT
  + LAYER M2 ( -100 0 ) ( 100 200 )
  + PLACED ( 10000 0 ) N ;
END PINS
NETS 1 ;
- n1 ( PIN in ) ( u1 A )
  + USE SIGNAL ;
END NETS
END DESIGN
";

    #[test]
    fn rescales_and_places_macro_geometry() {
        let design = parse_str(lef::parse_str(LEF).unwrap(), DEF).unwrap();
        assert_eq!(design.name, "top");
        assert_eq!(design.die_area, Rect::from_coords(0, 0, 10000, 10000));
        assert_eq!((design.gcell.count_x, design.gcell.step_x), (10, 1000));
        assert_eq!(design.tracks[0].start, 100);
        assert_eq!(design.tracks[0].step, 200);

        // u1 at (1000, 2000) rotated 180 degrees: A lands near the top-right corner.
        let cell = &design.cells[0];
        assert_eq!(cell.pos, Point::new(1000, 2000));
        let pins = &design.nets[0].pins;
        assert_eq!(pins.len(), 2);
        let a = design.pin(pins[1]);
        assert_eq!(a.cell, Some(cell_id(&design, "u1")));
        assert_eq!(a.shapes, vec![(0, Rect::from_coords(1800, 3800, 1900, 3900))]);

        let io = design.pin(pins[0]);
        assert_eq!(io.shapes, vec![(1, Rect::from_coords(4950, 0, 5050, 100))]);

        assert_eq!(design.obstructions.len(), 1);
        assert_eq!(design.obstructions[0].rect, Rect::from_coords(1400, 2000, 1600, 4000));
    }

    fn cell_id(design: &Design, name: &str) -> crate::db::indices::CellId {
        design.cell_name_map[name]
    }

    #[test]
    fn statements_split_on_semicolons() {
        let st = statements("A b ;\n- x\n  + Y ;\nEND NETS\n");
        assert_eq!(st, vec![vec!["A", "b"], vec!["-", "x", "+", "Y"], vec!["END", "NETS"]]);
    }

    const ROUTED_DEF: &str = "\
DESIGN top ;
UNITS DISTANCE MICRONS 2000 ;
DIEAREA ( 0 0 ) ( 20000 20000 ) ;
PINS 1 ;
- in + NET n1 + LAYER M1 ( -100 -100 ) ( 100 100 ) + PLACED ( 2000 400 ) N ;
END PINS
NETS 1 ;
- n1 ( PIN in )
  + ROUTED M1 ( 2000 400 ) ( 6000 * ) M1_M2_DEFAULT
  NEW M2 ( 6000 400 ) ( * 3000 )
  + USE SIGNAL ;
END NETS
SPECIALNETS 1 ;
- VDD ( * VDD )
  + ROUTED M2 400 + SHAPE STRIPE ( 10000 0 ) ( 10000 20000 )
  NEW M1 200 ( 0 0 ) ( 20000 0 ) M1_M2_DEFAULT
  + USE POWER ;
END SPECIALNETS
END DESIGN
";

    #[test]
    fn routed_wiring_becomes_net_route() {
        let design = parse_str(lef::parse_str(LEF).unwrap(), ROUTED_DEF).unwrap();
        let via = design.tech.via_name_map["M1_M2_DEFAULT"];
        let wire = |layer, a: (Dbu, Dbu), b: (Dbu, Dbu)| {
            RouteShape::Wire(PathSeg {
                layer,
                begin: Point::new(a.0, a.1),
                end: Point::new(b.0, b.1),
                width: 100,
            })
        };
        assert_eq!(
            design.nets[0].route,
            vec![
                wire(0, (1000, 200), (3000, 200)),
                RouteShape::Via(ViaInst {
                    def: via,
                    origin: Point::new(3000, 200),
                }),
                wire(1, (3000, 200), (3000, 1500)),
            ]
        );
    }

    #[test]
    fn special_wiring_blocks_as_obstructions() {
        let design = parse_str(lef::parse_str(LEF).unwrap(), ROUTED_DEF).unwrap();
        assert_eq!(design.num_nets(), 1);
        let obs: Vec<(LayerRef, Rect)> = design.obstructions.iter().map(|o| (o.layer, o.rect)).collect();
        assert_eq!(
            obs,
            vec![
                (LayerRef::Routing(1), Rect::from_coords(4900, -100, 5100, 10100)),
                (LayerRef::Routing(0), Rect::from_coords(-50, -50, 10050, 50)),
                (LayerRef::Routing(0), Rect::from_coords(9950, -50, 10050, 50)),
                (LayerRef::Cut(0), Rect::from_coords(9975, -25, 10025, 25)),
                (LayerRef::Routing(1), Rect::from_coords(9950, -50, 10050, 50)),
            ]
        );
    }
}
