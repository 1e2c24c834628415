pub mod algo;
pub mod dispatch;
pub mod gc;
pub mod global_router;
pub mod grid;
pub mod region_query;
pub mod scheduler;
pub mod utils;
pub mod worker;

use drt_common::db::design::Design;
use drt_common::db::indices::NetId;
use drt_common::error::{DrtError, DrtResult};
use drt_common::util::config::Config;
use drt_common::util::logger::Tool;
use drt_common::util::profiler::ScopedTimer;
use drt_common::{report_info, report_warn};
use gc::{GcWorker, Marker};
use rayon::prelude::*;
use region_query::RegionQuery;
use worker::{DrWorker, NetFailure, WorkerOutcome};

#[derive(Debug, Default)]
pub struct RouteReport {
    pub batches: usize,
    pub workers: usize,
    /// Full-die check after every worker has committed.
    pub markers: Vec<Marker>,
    pub failures: Vec<NetFailure>,
}

/// Global routing, then detailed routing tile by tile. Workers of one batch
/// run in parallel against the same design snapshot; their routes are
/// written back in tile order before the next batch starts.
pub fn route(design: &mut Design, config: &Config) -> DrtResult<RouteReport> {
    let _timer = ScopedTimer::new(Tool::Drt, "routing");
    prepare(design, config)?;

    let guides = global_router::run(design, config)?;
    let batches = scheduler::batch_tiles(design, scheduler::plan_tiles(design, config, &guides));
    let mut report = RouteReport {
        batches: batches.len(),
        ..Default::default()
    };

    for (i, batch) in batches.iter().enumerate() {
        let snapshot: &Design = design;
        let outcomes: Vec<DrtResult<WorkerOutcome>> = batch
            .par_iter()
            .map(|tile| {
                let tile_guides = tile
                    .nets
                    .iter()
                    .map(|&n| (n, guides.get(n.index()).cloned().unwrap_or_default()))
                    .collect();
                DrWorker::new(snapshot, config, tile.route_box, tile.nets.clone(), tile_guides)?.run()
            })
            .collect();
        log::debug!(target: "drt", "batch {}: {} workers", i, batch.len());
        for outcome in outcomes {
            let out = outcome?;
            for (net, shapes) in out.routes {
                design.nets[net.index()].route = shapes;
            }
            report.failures.extend(out.failures);
            report.workers += 1;
        }
    }

    report.markers = check_design(design, config)?;
    report_info!(
        Tool::Drt,
        41,
        "{} workers in {} batches, {} markers",
        report.workers,
        report.batches,
        report.markers.len()
    );
    if !report.failures.is_empty() {
        report_warn!(Tool::Drt, 42, "{} nets left unconnected", report.failures.len());
    }
    Ok(report)
}

/// Validates the technology and fills in a missing gcell grid or track
/// set. Jobs run through [`dispatch::run_job`] expect a prepared design.
pub fn prepare(design: &mut Design, config: &Config) -> DrtResult<()> {
    design.tech.validate(!config.grid.two_d)?;
    design.ensure_gcell_pattern(config.grid.gcell_tracks);
    if design.gcell.is_empty() {
        return Err(DrtError::config(Tool::Drt, 10, "empty gcell pattern"));
    }
    design.ensure_tracks();
    Ok(())
}

/// Checks every committed shape of the design.
pub fn check_design(design: &Design, config: &Config) -> DrtResult<Vec<Marker>> {
    let nets: Vec<NetId> = (0..design.num_nets()).map(NetId::new).collect();
    let mut rq = RegionQuery::new(design.tech.num_layers());
    rq.init(design, &nets, design.die_area, true)?;
    let mut gc = GcWorker::new(&design.tech, &config.drc);
    gc.init(design, &rq, design.die_area);
    Ok(gc.main())
}
