use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufWriter, Write};

/// Shape of a synthetic benchmark.
#[derive(Debug, Clone)]
pub struct BenchmarkSpec {
    pub num_cells: usize,
    pub num_nets: usize,
    pub max_pins_per_net: usize,
    pub target_utilization: f64,
    pub num_layers: usize,
    pub seed: u64,
}

impl Default for BenchmarkSpec {
    fn default() -> Self {
        Self {
            num_cells: 200,
            num_nets: 150,
            max_pins_per_net: 4,
            target_utilization: 0.5,
            num_layers: 4,
            seed: 1,
        }
    }
}

const DBU: i64 = 1000;
const PITCH: i64 = 200;
const SITE_W: i64 = 200;
const ROW_H: i64 = 2000;
const CELL_SITES: i64 = 4;

/// Writes a technology LEF with `num_layers` alternating routing layers and
/// one standard cell.
pub fn write_lef(filename: &str, num_layers: usize) -> std::io::Result<()> {
    let mut f = BufWriter::new(File::create(filename)?);
    let um = |v: i64| v as f64 / DBU as f64;

    writeln!(f, "VERSION 5.8 ;")?;
    writeln!(f, "UNITS\n  DATABASE MICRONS {} ;\nEND UNITS", DBU)?;
    writeln!(f, "SITE core\n  CLASS CORE ;\n  SIZE {} BY {} ;\nEND core", um(SITE_W), um(ROW_H))?;
    for z in 0..num_layers.max(1) {
        let dir = if z % 2 == 0 { "HORIZONTAL" } else { "VERTICAL" };
        writeln!(f, "LAYER M{}", z + 1)?;
        writeln!(f, "  TYPE ROUTING ;")?;
        writeln!(f, "  DIRECTION {} ;", dir)?;
        writeln!(f, "  PITCH {} ;", um(PITCH))?;
        writeln!(f, "  OFFSET {} ;", um(PITCH / 2))?;
        writeln!(f, "  WIDTH {} ;", um(PITCH / 2))?;
        writeln!(f, "  SPACING {} ;", um(PITCH / 2))?;
        writeln!(f, "  AREA {} ;", um(PITCH) * um(PITCH) / 2.0)?;
        writeln!(f, "END M{}", z + 1)?;
        if z + 1 < num_layers {
            writeln!(f, "LAYER V{}", z + 1)?;
            writeln!(f, "  TYPE CUT ;")?;
            writeln!(f, "  WIDTH {} ;", um(PITCH * 2 / 5))?;
            writeln!(f, "  SPACING {} ;", um(PITCH / 2))?;
            writeln!(f, "END V{}", z + 1)?;
        }
    }
    for z in 0..num_layers.saturating_sub(1) {
        let (h, c) = (um(PITCH / 4), um(PITCH / 5));
        writeln!(f, "VIA V{}{} DEFAULT", z + 1, z + 2)?;
        writeln!(f, "  LAYER M{} ;\n    RECT {} {} {} {} ;", z + 1, -h, -h, h, h)?;
        writeln!(f, "  LAYER V{} ;\n    RECT {} {} {} {} ;", z + 1, -c, -c, c, c)?;
        writeln!(f, "  LAYER M{} ;\n    RECT {} {} {} {} ;", z + 2, -h, -h, h, h)?;
        writeln!(f, "END V{}{}", z + 1, z + 2)?;
    }

    // Pins sit on M1 track centers.
    writeln!(f, "MACRO CELL")?;
    writeln!(f, "  CLASS CORE ;\n  SIZE {} BY {} ;", um(SITE_W * CELL_SITES), um(ROW_H))?;
    for (i, pin) in ["A", "B", "Z"].iter().enumerate() {
        let x = PITCH / 2 + i as i64 * PITCH;
        let y = PITCH / 2 + (2 + 2 * i as i64) * PITCH;
        let (hw, hh) = (PITCH / 4, PITCH / 4);
        writeln!(f, "  PIN {}\n    PORT\n      LAYER M1 ;", pin)?;
        writeln!(
            f,
            "        RECT {} {} {} {} ;",
            um(x - hw),
            um(y - hh),
            um(x + hw),
            um(y + hh)
        )?;
        writeln!(f, "    END\n  END {}", pin)?;
    }
    writeln!(f, "END CELL")?;
    writeln!(f, "END LIBRARY")?;
    f.flush()
}

/// Writes a placed DEF over the library from [`write_lef`]: legal,
/// overlap-free cells and random multi-pin nets.
pub fn write_def(filename: &str, spec: &BenchmarkSpec) -> std::io::Result<()> {
    let mut f = BufWriter::new(File::create(filename)?);
    let mut rng = StdRng::seed_from_u64(spec.seed);

    let cell_w = SITE_W * CELL_SITES;
    let util = spec.target_utilization.clamp(0.05, 0.95);
    let total = spec.num_cells.max(1) as f64 * (cell_w * ROW_H) as f64;
    let side = (total / util).sqrt() as i64;
    let num_rows = (side / ROW_H).max(2);
    let sites_per_row = ((side / SITE_W).max(CELL_SITES * 2) / CELL_SITES) * CELL_SITES;
    let (die_w, die_h) = (sites_per_row * SITE_W, num_rows * ROW_H);

    log::info!(
        "Generating benchmark: {} cells, {} nets, die {}x{} (target util {:.1}%)",
        spec.num_cells,
        spec.num_nets,
        die_w,
        die_h,
        util * 100.0
    );

    writeln!(f, "VERSION 5.8 ;")?;
    writeln!(f, "DIVIDERCHAR \"/\" ;")?;
    writeln!(f, "BUSBITCHARS \"[]\" ;")?;
    writeln!(f, "DESIGN bench_{} ;", spec.seed)?;
    writeln!(f, "UNITS DISTANCE MICRONS {} ;", DBU)?;
    writeln!(f, "DIEAREA ( 0 0 ) ( {} {} ) ;", die_w, die_h)?;
    for r in 0..num_rows {
        let orient = if r % 2 == 0 { "N" } else { "FS" };
        writeln!(
            f,
            "ROW row{} core 0 {} {} DO {} BY 1 STEP {} 0 ;",
            r,
            r * ROW_H,
            orient,
            sites_per_row,
            SITE_W
        )?;
    }
    for z in 0..spec.num_layers.max(1) {
        let (axis, span) = if z % 2 == 0 { ("Y", die_h) } else { ("X", die_w) };
        writeln!(
            f,
            "TRACKS {} {} DO {} STEP {} LAYER M{} ;",
            axis,
            PITCH / 2,
            span / PITCH,
            PITCH,
            z + 1
        )?;
    }

    let slots_per_row = sites_per_row / CELL_SITES;
    let mut slots: Vec<(i64, i64)> = (0..num_rows)
        .flat_map(|r| (0..slots_per_row).map(move |s| (s * cell_w, r * ROW_H)))
        .collect();
    slots.shuffle(&mut rng);
    let num_cells = spec.num_cells.min(slots.len());

    writeln!(f, "COMPONENTS {} ;", num_cells)?;
    for (i, (x, y)) in slots.iter().take(num_cells).enumerate() {
        writeln!(f, "- inst{} CELL + PLACED ( {} {} ) N ;", i, x, y)?;
    }
    writeln!(f, "END COMPONENTS")?;

    writeln!(f, "PINS 1 ;")?;
    writeln!(
        f,
        "- in0 + NET net0 + DIRECTION INPUT + USE SIGNAL + LAYER M2 ( -{} 0 ) ( {} {} ) + PLACED ( {} 0 ) N ;",
        PITCH / 4,
        PITCH / 4,
        PITCH / 2,
        PITCH / 2
    )?;
    writeln!(f, "END PINS")?;

    writeln!(f, "NETS {} ;", spec.num_nets)?;
    let pins = ["A", "B", "Z"];
    let mut next_pin = vec![0usize; num_cells];
    for n in 0..spec.num_nets {
        write!(f, "- net{}", n)?;
        if n == 0 {
            write!(f, " ( PIN in0 )")?;
        }
        if num_cells > 0 {
            let fanout = rng.gen_range(2..=spec.max_pins_per_net.max(2));
            let anchor = rng.gen_range(0..num_cells);
            let mut used = Vec::with_capacity(fanout);
            for _ in 0..fanout * 4 {
                if used.len() == fanout {
                    break;
                }
                // Nets stay local so workers see realistic fan-in.
                let lo = anchor.saturating_sub(slots_per_row as usize * 2);
                let hi = (anchor + slots_per_row as usize * 2).min(num_cells - 1);
                let c = rng.gen_range(lo..=hi);
                if used.contains(&c) || next_pin[c] >= pins.len() {
                    continue;
                }
                used.push(c);
                write!(f, " ( inst{} {} )", c, pins[next_pin[c]])?;
                next_pin[c] += 1;
            }
        }
        writeln!(f, " + USE SIGNAL ;")?;
    }
    writeln!(f, "END NETS")?;
    writeln!(f, "END DESIGN")?;
    f.flush()
}
