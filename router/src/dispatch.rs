//! Sub-region job entry point for out-of-process workers.
//!
//! A job and its result are each one line of JSON, so a line-oriented
//! balancer can forward them verbatim.

use crate::gc::Marker;
use crate::worker::{DrWorker, NetFailure};
use drt_common::db::design::{Design, RouteShape};
use drt_common::db::indices::NetId;
use drt_common::error::{DrtError, DrtResult, ErrorKind};
use drt_common::geom::Rect;
use drt_common::report_error;
use drt_common::util::config::Config;
use drt_common::util::logger::Tool;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerJob {
    pub id: u64,
    pub route_box: Rect,
    pub nets: Vec<NetId>,
    #[serde(default)]
    pub guides: Vec<(NetId, Vec<(u32, u32)>)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Ok,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub id: u64,
    pub status: JobStatus,
    #[serde(default)]
    pub routes: Vec<(NetId, Vec<RouteShape>)>,
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub failures: Vec<NetFailure>,
    /// `TOOL-NNNN` code and message of a fatal error.
    #[serde(default)]
    pub error: Option<(String, String)>,
}

impl WorkerResult {
    fn failed(id: u64, e: &DrtError) -> Self {
        Self {
            id,
            status: JobStatus::Error,
            routes: Vec::new(),
            markers: Vec::new(),
            failures: Vec::new(),
            error: Some((e.code(), e.kind.to_string())),
        }
    }
}

fn job_error(msg: impl Into<String>) -> DrtError {
    DrtError::new(Tool::Drt, 300, ErrorKind::Job(msg.into()))
}

pub fn parse_job(line: &str) -> DrtResult<WorkerJob> {
    serde_json::from_str(line.trim()).map_err(|e| job_error(e.to_string()))
}

pub fn encode_job(job: &WorkerJob) -> DrtResult<String> {
    serde_json::to_string(job).map_err(|e| job_error(e.to_string()))
}

pub fn parse_result(line: &str) -> DrtResult<WorkerResult> {
    serde_json::from_str(line.trim()).map_err(|e| job_error(e.to_string()))
}

/// Runs `job` against the shared read-only design.
pub fn execute(design: &Design, job: WorkerJob, config: &Config) -> DrtResult<WorkerResult> {
    if let Some(bad) = job.nets.iter().find(|n| n.index() >= design.num_nets()) {
        return Err(job_error(format!("job {} names unknown net {:?}", job.id, bad)));
    }
    let worker = DrWorker::new(
        design,
        config,
        job.route_box,
        job.nets,
        job.guides.into_iter().collect(),
    )?;
    let out = worker.run()?;
    Ok(WorkerResult {
        id: job.id,
        status: JobStatus::Ok,
        routes: out.routes,
        markers: out.markers,
        failures: out.failures,
        error: None,
    })
}

/// Parses one job line, runs it and returns one result line without a
/// trailing newline. Errors come back inside the result.
pub fn run_job(design: &Design, line: &str, config: &Config) -> String {
    let result = match parse_job(line) {
        Ok(job) => {
            let id = job.id;
            execute(design, job, config).unwrap_or_else(|e| {
                report_error!(Tool::Drt, 301, "job {} failed: {}", id, e);
                WorkerResult::failed(id, &e)
            })
        }
        Err(e) => {
            report_error!(Tool::Drt, 300, "{}", e);
            WorkerResult::failed(0, &e)
        }
    };
    serde_json::to_string(&result).unwrap_or_else(|e| {
        format!(
            "{{\"id\":{},\"status\":\"error\",\"error\":[\"DRT-0300\",{:?}]}}",
            result.id,
            e.to_string()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use drt_common::db::design::{GCellPattern, TrackAxis, TrackPattern};
    use drt_common::db::tech::{LayerDirection, RoutingLayer, Tech};

    fn design() -> Design {
        let mut tech = Tech::new(1000);
        tech.add_layer(RoutingLayer::new("M1".into(), 0, LayerDirection::Horizontal, 200, 100));
        tech.add_cut_layer("V1".into(), 80, 100);
        tech.add_layer(RoutingLayer::new("M2".into(), 0, LayerDirection::Vertical, 200, 100));
        tech.finalize();
        let mut d = Design::new(tech);
        d.die_area = Rect::from_coords(0, 0, 2000, 2000);
        d.gcell = GCellPattern::from_die(&d.die_area, 1000);
        for (layer, axis) in [(0, TrackAxis::Y), (1, TrackAxis::X)] {
            d.tracks.push(TrackPattern {
                layer,
                axis,
                start: 100,
                num: 10,
                step: 200,
            });
        }
        let n = d.add_net("a".into());
        d.add_pin(n, "p0".into(), None, vec![(0, Rect::from_coords(50, 50, 150, 150))]);
        d.add_pin(n, "p1".into(), None, vec![(0, Rect::from_coords(1250, 50, 1350, 150))]);
        d
    }

    #[test]
    fn job_line_round_trips_through_worker() {
        let d = design();
        let job = WorkerJob {
            id: 9,
            route_box: d.die_area,
            nets: vec![NetId(0)],
            guides: Vec::new(),
        };
        let line = encode_job(&job).unwrap();
        assert!(!line.contains('\n'));
        let out = run_job(&d, &line, &Config::default());
        let result = parse_result(&out).unwrap();
        assert_eq!(result.id, 9);
        assert_eq!(result.status, JobStatus::Ok);
        assert_eq!(result.routes.len(), 1);
        assert!(!result.routes[0].1.is_empty());
    }

    #[test]
    fn malformed_job_reports_code() {
        let d = design();
        let result = parse_result(&run_job(&d, "{not json", &Config::default())).unwrap();
        assert_eq!(result.status, JobStatus::Error);
        assert_eq!(result.error.unwrap().0, "DRT-0300");
    }

    #[test]
    fn unknown_net_is_rejected() {
        let d = design();
        let line = r#"{"id":1,"route_box":{"min":{"x":0,"y":0},"max":{"x":10,"y":10}},"nets":[5]}"#;
        let result = parse_result(&run_job(&d, line, &Config::default())).unwrap();
        assert_eq!(result.status, JobStatus::Error);
        assert_eq!(result.id, 1);
    }

    #[test]
    fn unprepared_design_is_an_error_result() {
        let mut d = design();
        d.gcell = GCellPattern::default();
        let job = WorkerJob {
            id: 4,
            route_box: d.die_area,
            nets: vec![NetId(0)],
            guides: Vec::new(),
        };
        let out = run_job(&d, &encode_job(&job).unwrap(), &Config::default());
        let result = parse_result(&out).unwrap();
        assert_eq!(result.status, JobStatus::Error);
        assert_eq!(result.id, 4);
        assert_eq!(result.error.unwrap().0, "DRT-0010");
    }
}
