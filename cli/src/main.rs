use anyhow::Context;
use clap::{Parser, Subcommand};
use drt_common::db::design::{Design, RouteShape, TrackAxis};
use drt_common::db::parser::{def, lef};
use drt_common::util::config::Config;
use drt_common::util::generator::{self, BenchmarkSpec};
use drt_common::util::logger;
use drt_router::dispatch;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Global plus detailed routing of the input DEF.
    Route,
    /// Reads one JSON job per stdin line and answers one result per line.
    Worker,
    /// Journaled detailed-placement improvement of the input DEF.
    Improve,
    Generate {
        #[arg(long, default_value_t = 200)]
        cells: usize,
        #[arg(long, default_value_t = 150)]
        nets: usize,
        #[arg(long, default_value_t = 0.50)]
        utilization: f64,
        #[arg(long, default_value_t = 4)]
        layers: usize,
        #[arg(long, default_value_t = 1)]
        seed: u64,
        #[arg(long, default_value = "inputs/bench.lef")]
        lef: String,
        #[arg(long, default_value = "inputs/bench.def")]
        def: String,
    },
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let config = if args.config.exists() {
        log::info!("Loading configuration from {:?}", args.config);
        let text = std::fs::read_to_string(&args.config)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        Config::from_toml(&text).map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?
    } else {
        log::warn!(
            "Configuration file {:?} not found. Using internal defaults.",
            args.config
        );
        Config::default()
    };

    match args.command.unwrap_or(Commands::Route) {
        Commands::Generate {
            cells,
            nets,
            utilization,
            layers,
            seed,
            lef,
            def,
        } => {
            let spec = BenchmarkSpec {
                num_cells: cells,
                num_nets: nets,
                target_utilization: utilization,
                num_layers: layers,
                seed,
                ..Default::default()
            };
            prepare_output_dir(&lef)?;
            prepare_output_dir(&def)?;
            generator::write_lef(&lef, spec.num_layers)?;
            generator::write_def(&def, &spec)?;
            log::info!("Generated: {} {}", lef, def);
        }
        Commands::Route => {
            let mut design = load_design(&config)?;
            let report = drt_router::route(&mut design, &config).map_err(|e| anyhow::anyhow!(e))?;
            for m in report.markers.iter().take(20) {
                log::warn!("{:?} on {:?} at {:?}", m.constraint, m.layer, m.bbox);
            }
            for f in &report.failures {
                log::warn!("{} {}: {}", f.code, design.nets[f.net.index()].name, f.message);
            }
            write_output(&design, &config)?;
        }
        Commands::Worker => {
            let mut design = load_design(&config)?;
            drt_router::prepare(&mut design, &config).map_err(|e| anyhow::anyhow!(e))?;
            serve_jobs(&design, &config)?;
        }
        Commands::Improve => {
            let mut design = load_design(&config)?;
            let stats =
                drt_placer::improve(&mut design, &config.placement).map_err(|e| anyhow::anyhow!(e))?;
            log::info!(
                "HPWL {} -> {} ({} of {} trials accepted in {} passes)",
                stats.hpwl_before,
                stats.hpwl_after,
                stats.accepted,
                stats.trials,
                stats.passes
            );
            write_output(&design, &config)?;
        }
    }

    Ok(())
}

fn prepare_output_dir(path_str: &str) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(path_str).parent()
        && !parent.exists()
        && !parent.as_os_str().is_empty()
    {
        log::info!("Creating output directory: {:?}", parent);
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Every configured LEF is read as one library; the DEF is placed over it.
fn load_design(config: &Config) -> anyhow::Result<Design> {
    let mut text = String::new();
    for path in &config.input.lef_files {
        log::info!("Parsing LEF: {}", path);
        text.push_str(&std::fs::read_to_string(path).with_context(|| format!("Input LEF file missing: {}", path))?);
        text.push('\n');
    }
    let lib = lef::parse_str(&text).context("Invalid LEF syntax")?;

    let def_file = &config.input.def_file;
    log::info!("Parsing DEF: {}", def_file);
    let design = def::parse(lib, def_file).with_context(|| format!("Invalid DEF syntax in '{}'", def_file))?;
    log::info!(
        "Loaded {}: {} cells, {} nets, {} routing layers",
        design.name,
        design.cells.len(),
        design.num_nets(),
        design.tech.num_layers()
    );
    Ok(design)
}

fn serve_jobs(design: &Design, config: &Config) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut out = io::stdout().lock();
    let mut served = 0usize;
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        writeln!(out, "{}", dispatch::run_job(design, &line, config))?;
        out.flush()?;
        served += 1;
    }
    log::info!("Worker served {} jobs", served);
    Ok(())
}

fn write_output(design: &Design, config: &Config) -> anyhow::Result<()> {
    let path = &config.input.output_def;
    prepare_output_dir(path)?;
    log::info!("Writing DEF to {}", path);
    save_def(design, path).with_context(|| format!("writing {}", path))
}

fn layer_name(design: &Design, z: u8) -> &str {
    design.tech.layer(z).map_or("?", |l| l.name.as_str())
}

fn save_def(design: &Design, filename: &str) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(filename)?);
    let name = if design.name.is_empty() { "top" } else { design.name.as_str() };

    writeln!(file, "VERSION 5.8 ;")?;
    writeln!(file, "DIVIDERCHAR \"/\" ;")?;
    writeln!(file, "BUSBITCHARS \"[]\" ;")?;
    writeln!(file, "DESIGN {} ;", name)?;
    writeln!(file, "UNITS DISTANCE MICRONS {} ;", design.tech.dbu_per_micron)?;
    let die = design.die_area;
    writeln!(file, "DIEAREA ( {} {} ) ( {} {} ) ;", die.min.x, die.min.y, die.max.x, die.max.y)?;

    let site = design.tech.site.as_ref().map_or("core", |s| s.name.as_str());
    for row in &design.rows {
        writeln!(
            file,
            "ROW {} {} {} {} N DO {} BY 1 STEP {} 0 ;",
            row.name, site, row.origin.x, row.origin.y, row.num_sites, row.site_width
        )?;
    }
    for t in &design.tracks {
        let axis = match t.axis {
            TrackAxis::X => "X",
            TrackAxis::Y => "Y",
        };
        writeln!(
            file,
            "TRACKS {} {} DO {} STEP {} LAYER {} ;",
            axis,
            t.start,
            t.num,
            t.step,
            layer_name(design, t.layer)
        )?;
    }

    writeln!(file, "COMPONENTS {} ;", design.cells.len())?;
    for cell in &design.cells {
        writeln!(
            file,
            "- {} {} + {} ( {} {} ) {:?} ;",
            cell.name,
            cell.lib_name,
            if cell.is_fixed { "FIXED" } else { "PLACED" },
            cell.pos.x,
            cell.pos.y,
            cell.orient
        )?;
    }
    writeln!(file, "END COMPONENTS")?;

    let io_pins: Vec<_> = design.pins.iter().filter(|p| p.cell.is_none()).collect();
    if !io_pins.is_empty() {
        writeln!(file, "PINS {} ;", io_pins.len())?;
        for pin in io_pins {
            write!(
                file,
                "- {} + NET {} + DIRECTION INOUT + USE SIGNAL",
                pin.name,
                design.nets[pin.net.index()].name
            )?;
            for (z, r) in &pin.shapes {
                write!(
                    file,
                    " + LAYER {} ( {} {} ) ( {} {} )",
                    layer_name(design, *z),
                    r.min.x,
                    r.min.y,
                    r.max.x,
                    r.max.y
                )?;
            }
            writeln!(file, " + PLACED ( 0 0 ) N ;")?;
        }
        writeln!(file, "END PINS")?;
    }

    writeln!(file, "NETS {} ;", design.num_nets())?;
    for net in &design.nets {
        write!(file, "- {}", net.name)?;
        for &pin_id in &net.pins {
            let pin = design.pin(pin_id);
            match pin.cell {
                Some(_) => {
                    let (inst, term) = pin.name.split_once('/').unwrap_or((pin.name.as_str(), ""));
                    write!(file, " ( {} {} )", inst, term)?;
                }
                None => write!(file, " ( PIN {} )", pin.name)?,
            }
        }
        writeln!(file)?;

        for (i, shape) in net.route.iter().enumerate() {
            let lead = if i == 0 { "+ ROUTED" } else { "NEW" };
            match shape {
                RouteShape::Wire(seg) => writeln!(
                    file,
                    "  {} {} ( {} {} ) ( {} {} )",
                    lead,
                    layer_name(design, seg.layer),
                    seg.begin.x,
                    seg.begin.y,
                    seg.end.x,
                    seg.end.y
                )?,
                RouteShape::Via(via) => {
                    let Some(def) = design.tech.via(via.def) else {
                        continue;
                    };
                    writeln!(
                        file,
                        "  {} {} ( {} {} ) {}",
                        lead,
                        layer_name(design, def.bottom),
                        via.origin.x,
                        via.origin.y,
                        def.name
                    )?
                }
            }
        }
        writeln!(file, "  ;")?;
    }
    writeln!(file, "END NETS")?;
    writeln!(file, "END DESIGN")?;
    file.flush()
}
