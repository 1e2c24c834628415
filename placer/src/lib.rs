pub mod grid;
pub mod journal;
pub mod moves;

pub use grid::{DetailedMgr, Segment};
pub use journal::{Journal, JournalAction, Slot};
pub use moves::ImproveStats;

use drt_common::db::design::Design;
use drt_common::error::DrtResult;
use drt_common::util::config::PlacementConfig;

/// Legalizes onto sites, improves wirelength and writes the result back.
pub fn improve(design: &mut Design, config: &PlacementConfig) -> DrtResult<ImproveStats> {
    let mut mgr = DetailedMgr::new(design)?;
    let stats = moves::improve(&mut mgr, config)?;
    mgr.commit(design);
    Ok(stats)
}
