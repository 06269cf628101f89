//! Shared identifier aliases and small enums used across crates.

use serde::{Deserialize, Serialize};

/// Identifier of a workspace (one project context)
pub type WorkspaceId = String;

/// Identifier of a terminal tab inside a workspace
pub type TerminalTabId = String;

/// Identifier of a pane tree node (leaf or split)
pub type PaneId = String;

/// Live process-channel handle issued by the backend.
///
/// Only valid for the lifetime of the process that issued it.
pub type HandleId = String;

/// Log level for the debug log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No logging (log file not created)
    #[default]
    Off,
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Most verbose
    Trace,
}

impl LogLevel {
    /// Convert to `log::LevelFilter`
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }

    /// Whether this level counts as debug mode (diagnostics recording)
    pub fn is_debug(self) -> bool {
        matches!(self, LogLevel::Debug | LogLevel::Trace)
    }

    /// Parse a level name as accepted on the command line
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "off" => Some(LogLevel::Off),
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}
