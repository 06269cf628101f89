//! Configuration system for agent-deck.
//!
//! This crate provides configuration loading, saving, and default values
//! shared by the workspace shell. It includes:
//!
//! - Identifier aliases shared across crates (workspace, tab, pane, handle)
//! - Session lifecycle timings (stale input detection, recovery, focus retry)
//! - Incident diagnostics settings
//! - YAML config file I/O with validation

pub mod config;
pub mod defaults;
mod error;
mod types;

pub use config::{Config, DiagnosticsConfig, SessionTimings};
pub use error::ConfigError;
pub use types::{HandleId, LogLevel, PaneId, TerminalTabId, WorkspaceId};
