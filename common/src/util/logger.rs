use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Reporting tool. Used as the log target and as the message-id prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tool {
    Drt,
    Grt,
    Dpl,
    Odb,
}

impl Tool {
    pub fn target(&self) -> &'static str {
        match self {
            Tool::Drt => "drt",
            Tool::Grt => "grt",
            Tool::Dpl => "dpl",
            Tool::Odb => "odb",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tool::Drt => "DRT",
            Tool::Grt => "GRT",
            Tool::Dpl => "DPL",
            Tool::Odb => "ODB",
        };
        f.write_str(s)
    }
}

pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{:<5} {}",
                record.level(),
                record.args()
            )
        })
        .init();
}

#[macro_export]
macro_rules! report_info {
    ($tool:expr, $id:expr, $($arg:tt)+) => {
        $crate::log::info!(target: $tool.target(), "[{}-{:04}] {}", $tool, $id, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! report_warn {
    ($tool:expr, $id:expr, $($arg:tt)+) => {
        $crate::log::warn!(target: $tool.target(), "[{}-{:04}] {}", $tool, $id, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! report_error {
    ($tool:expr, $id:expr, $($arg:tt)+) => {
        $crate::log::error!(target: $tool.target(), "[{}-{:04}] {}", $tool, $id, format_args!($($arg)+))
    };
}
