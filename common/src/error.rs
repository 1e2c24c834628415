//! Error type shared by the routing core.
//!
//! Every error carries the reporting tool and a numeric message id so an
//! embedding shell can surface it as `DRT-0042` style diagnostics.

use crate::db::indices::NetId;
use crate::util::logger::Tool;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("no path found for net {net:?}")]
    NoPath { net: NetId },
    #[error("search for net {net:?} exceeded {limit} expansions")]
    ExpansionLimit { net: NetId, limit: u32 },
    #[error("corrupted search state: {0}")]
    CorruptSearchState(String),
    #[error("unsupported shape: {0}")]
    UnsupportedShape(String),
    #[error("region query inconsistency: {0}")]
    IndexInconsistency(String),
    #[error("journal inconsistency: {0}")]
    JournalInconsistency(String),
    #[error("illegal placement: {0}")]
    IllegalPlacement(String),
    #[error("malformed job: {0}")]
    Job(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{tool}-{id:04}] {kind}")]
pub struct DrtError {
    pub tool: Tool,
    pub id: u32,
    pub kind: ErrorKind,
}

pub type DrtResult<T> = std::result::Result<T, DrtError>;

impl DrtError {
    pub fn new(tool: Tool, id: u32, kind: ErrorKind) -> Self {
        Self { tool, id, kind }
    }

    pub fn config(tool: Tool, id: u32, msg: impl Into<String>) -> Self {
        Self::new(tool, id, ErrorKind::Config(msg.into()))
    }

    pub fn code(&self) -> String {
        format!("{}-{:04}", self.tool, self.id)
    }

    /// Configuration and internal-consistency errors abort the run; per-net
    /// search failures and rejected placements go back to the caller.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self.kind,
            ErrorKind::NoPath { .. }
                | ErrorKind::ExpansionLimit { .. }
                | ErrorKind::IllegalPlacement(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_tool_and_id() {
        let e = DrtError::config(Tool::Drt, 42, "empty gcell pattern");
        assert_eq!(e.code(), "DRT-0042");
        assert_eq!(
            e.to_string(),
            "[DRT-0042] configuration error: empty gcell pattern"
        );
        assert!(e.is_fatal());
        let e = DrtError::new(Tool::Drt, 7, ErrorKind::NoPath { net: NetId(3) });
        assert!(!e.is_fatal());
    }
}
