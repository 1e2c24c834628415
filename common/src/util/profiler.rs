use crate::util::logger::Tool;
use std::time::{Duration, Instant};

/// Logs the wall time of a routing stage when dropped.
pub struct ScopedTimer {
    tool: Tool,
    name: &'static str,
    start: Instant,
}

impl ScopedTimer {
    pub fn new(tool: Tool, name: &'static str) -> Self {
        Self {
            tool,
            name,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        log::info!(target: self.tool.target(), "{} took {:?}", self.name, self.start.elapsed());
    }
}
