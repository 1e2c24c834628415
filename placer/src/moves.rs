//! Greedy local improvement. Each cell tries a handful of slots around the
//! median of its nets; a trial is kept only if it shortens the nets it
//! touches and is undone through the journal otherwise.

use crate::grid::DetailedMgr;
use crate::journal::Slot;
use drt_common::db::indices::{CellId, NetId};
use drt_common::error::DrtResult;
use drt_common::geom::{Dbu, Point};
use drt_common::report_info;
use drt_common::util::config::PlacementConfig;
use drt_common::util::logger::Tool;
use drt_common::util::profiler::ScopedTimer;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImproveStats {
    pub passes: usize,
    pub trials: usize,
    pub accepted: usize,
    pub hpwl_before: Dbu,
    pub hpwl_after: Dbu,
}

fn median(v: &mut [Dbu]) -> Dbu {
    v.sort_unstable();
    v[v.len() / 2]
}

/// Median of the bounding-box edges of every net of `cell`, the cell itself
/// excluded.
fn optimal_point(mgr: &DetailedMgr, cell: CellId) -> Option<Point> {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for &net in mgr.cell_nets(cell) {
        let others: Vec<Point> = mgr
            .net_pins(net)
            .iter()
            .filter(|&&p| mgr.pin_cell(p) != Some(cell))
            .map(|&p| mgr.pin_position(p))
            .collect();
        let (Some(x0), Some(x1)) = (others.iter().map(|p| p.x).min(), others.iter().map(|p| p.x).max())
        else {
            continue;
        };
        let (y0, y1) = (
            others.iter().map(|p| p.y).min().unwrap_or(0),
            others.iter().map(|p| p.y).max().unwrap_or(0),
        );
        xs.extend([x0, x1]);
        ys.extend([y0, y1]);
    }
    if xs.is_empty() {
        return None;
    }
    Some(Point::new(median(&mut xs), median(&mut ys)))
}

fn candidates(mgr: &DetailedMgr, cell: CellId, target: Point, radius: Dbu, rng: &mut StdRng) -> Vec<Slot> {
    let rows = mgr.num_rows() as u32;
    let Some(r0) = (0..rows).min_by_key(|&r| (mgr.row(r).origin.y - target.y).abs()) else {
        return Vec::new();
    };
    let width = mgr.width_sites(cell) as Dbu;
    let sw = mgr.site_width();
    let mut out = Vec::new();
    for r in [Some(r0), r0.checked_sub(1), (r0 + 1 < rows).then_some(r0 + 1)]
        .into_iter()
        .flatten()
    {
        let row = mgr.row(r);
        let last = row.num_sites as Dbu - width;
        if last < 0 {
            continue;
        }
        let ideal = ((target.x - row.origin.x) / sw - width / 2).clamp(0, last);
        out.push((r, ideal as u32));
        for _ in 0..2 {
            let s = (ideal + rng.gen_range(-radius..=radius)).clamp(0, last);
            out.push((r, s as u32));
        }
    }
    let mut seen = BTreeSet::new();
    out.retain(|s| seen.insert(*s));
    out
}

fn nets_hpwl(mgr: &DetailedMgr, nets: &BTreeSet<NetId>) -> Dbu {
    nets.iter().map(|&n| mgr.net_hpwl(n)).sum()
}

/// One trial of `cell` at `slot`: a plain move into free sites, or a swap
/// with the equal-width cell sitting there.
fn try_slot(mgr: &mut DetailedMgr, cell: CellId, slot: Slot) -> DrtResult<Option<bool>> {
    let other = mgr.cell_at(slot).filter(|&o| o != cell);
    let swap = match other {
        Some(o) => {
            if !mgr.is_movable(o) || mgr.slot(o) != Some(slot) || mgr.width_sites(o) != mgr.width_sites(cell) {
                return Ok(None);
            }
            Some(o)
        }
        None if mgr.can_place(cell, slot) => None,
        None => return Ok(None),
    };
    let mut nets: BTreeSet<NetId> = mgr.cell_nets(cell).iter().copied().collect();
    if let Some(o) = swap {
        nets.extend(mgr.cell_nets(o).iter().copied());
    }
    let before = nets_hpwl(mgr, &nets);
    mgr.begin_trial();
    let applied = match swap {
        Some(o) => mgr.swap(cell, o),
        None => mgr.move_cell(cell, slot),
    };
    match applied {
        Err(e) if e.is_fatal() => return Err(e),
        Err(_) => {
            mgr.undo_trial()?;
            return Ok(None);
        }
        Ok(()) => {}
    }
    if nets_hpwl(mgr, &nets) < before {
        mgr.accept_trial();
        Ok(Some(true))
    } else {
        mgr.undo_trial()?;
        Ok(Some(false))
    }
}

/// Runs passes until one accepts nothing or `max_passes` is reached.
pub fn improve(mgr: &mut DetailedMgr, config: &PlacementConfig) -> DrtResult<ImproveStats> {
    let _timer = ScopedTimer::new(Tool::Dpl, "detailed placement");
    let mut rng = StdRng::seed_from_u64(config.seed);
    let radius = config.search_radius.max(0);
    let mut stats = ImproveStats {
        hpwl_before: mgr.hpwl(),
        ..Default::default()
    };
    let mut order: Vec<CellId> = (0..mgr.num_cells())
        .map(CellId::new)
        .filter(|&c| mgr.is_movable(c) && mgr.slot(c).is_some())
        .collect();

    for pass in 0..config.max_passes {
        order.shuffle(&mut rng);
        let (mut trials, mut accepted) = (0, 0);
        for &cell in &order {
            let Some(target) = optimal_point(mgr, cell) else {
                continue;
            };
            for slot in candidates(mgr, cell, target, radius, &mut rng) {
                if mgr.slot(cell) == Some(slot) {
                    continue;
                }
                match try_slot(mgr, cell, slot)? {
                    Some(true) => {
                        trials += 1;
                        accepted += 1;
                        break;
                    }
                    Some(false) => trials += 1,
                    None => {}
                }
            }
        }
        stats.passes = pass + 1;
        stats.trials += trials;
        stats.accepted += accepted;
        report_info!(
            Tool::Dpl,
            10,
            "pass {}: {} of {} trials accepted, hpwl {}",
            pass,
            accepted,
            trials,
            mgr.hpwl()
        );
        if accepted == 0 {
            break;
        }
    }
    stats.hpwl_after = mgr.hpwl();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_takes_upper_middle() {
        assert_eq!(median(&mut [5, 1, 3, 9]), 5);
        assert_eq!(median(&mut [2]), 2);
    }
}
