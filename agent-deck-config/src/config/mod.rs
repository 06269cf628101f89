//! Core `Config` struct definition.
//!
//! Sub-structs are grouped by concern:
//!
//! - [`SessionTimings`]: stale input detection, recovery and focus timers
//! - [`DiagnosticsConfig`]: incident ring buffer and capture settings

mod persistence;

use crate::types::LogLevel;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Timing knobs for the terminal session lifecycle controller.
///
/// All values are milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTimings {
    /// Time since the last input attempt after which a silent session is stale
    #[serde(default = "crate::defaults::stale_input_threshold_ms")]
    pub stale_input_threshold_ms: u64,

    /// Minimum time between two stale-input recovery attempts
    #[serde(default = "crate::defaults::recovery_cooldown_ms")]
    pub recovery_cooldown_ms: u64,

    /// Grace period after a focus/resize recovery before escalating
    #[serde(default = "crate::defaults::recovery_grace_ms")]
    pub recovery_grace_ms: u64,

    /// Interval of the stale-input poll
    #[serde(default = "crate::defaults::stale_poll_interval_ms")]
    pub stale_poll_interval_ms: u64,

    /// Interval of the liveness probe (empty write)
    #[serde(default = "crate::defaults::liveness_probe_interval_ms")]
    pub liveness_probe_interval_ms: u64,

    /// Delay before the automatic restart after an unexpected exit
    #[serde(default = "crate::defaults::auto_recover_delay_ms")]
    pub auto_recover_delay_ms: u64,

    /// Automatic restarts allowed per mount
    #[serde(default = "crate::defaults::max_auto_recover_attempts")]
    pub max_auto_recover_attempts: u32,

    /// Delay before a soft reattach restarts the startup sequence
    #[serde(default = "crate::defaults::soft_reattach_delay_ms")]
    pub soft_reattach_delay_ms: u64,

    /// Offsets (from the first attempt) of the auto-focus retries
    #[serde(default = "crate::defaults::focus_retry_delays_ms")]
    pub focus_retry_delays_ms: Vec<u64>,

    /// How long an error banner stays visible
    #[serde(default = "crate::defaults::error_banner_ttl_ms")]
    pub error_banner_ttl_ms: u64,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            stale_input_threshold_ms: crate::defaults::stale_input_threshold_ms(),
            recovery_cooldown_ms: crate::defaults::recovery_cooldown_ms(),
            recovery_grace_ms: crate::defaults::recovery_grace_ms(),
            stale_poll_interval_ms: crate::defaults::stale_poll_interval_ms(),
            liveness_probe_interval_ms: crate::defaults::liveness_probe_interval_ms(),
            auto_recover_delay_ms: crate::defaults::auto_recover_delay_ms(),
            max_auto_recover_attempts: crate::defaults::max_auto_recover_attempts(),
            soft_reattach_delay_ms: crate::defaults::soft_reattach_delay_ms(),
            focus_retry_delays_ms: crate::defaults::focus_retry_delays_ms(),
            error_banner_ttl_ms: crate::defaults::error_banner_ttl_ms(),
        }
    }
}

impl SessionTimings {
    pub fn stale_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stale_poll_interval_ms)
    }

    pub fn liveness_probe_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_probe_interval_ms)
    }

    pub fn recovery_grace(&self) -> Duration {
        Duration::from_millis(self.recovery_grace_ms)
    }

    pub fn auto_recover_delay(&self) -> Duration {
        Duration::from_millis(self.auto_recover_delay_ms)
    }

    pub fn soft_reattach_delay(&self) -> Duration {
        Duration::from_millis(self.soft_reattach_delay_ms)
    }
}

/// Incident diagnostics settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Record lifecycle events even when the log level is not debug
    #[serde(default)]
    pub enabled: bool,

    /// Ring buffer capacity
    #[serde(default = "crate::defaults::diagnostics_capacity")]
    pub capacity: usize,

    /// Minimum time between two captures for the same pane key
    #[serde(default = "crate::defaults::capture_debounce_ms")]
    pub capture_debounce_ms: u64,

    /// Directory incident bundles are written to (None = keep in memory only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_dir: Option<PathBuf>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: crate::defaults::diagnostics_capacity(),
            capture_debounce_ms: crate::defaults::capture_debounce_ms(),
            incident_dir: None,
        }
    }
}

/// Configuration for the workspace shell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Session lifecycle timings
    #[serde(default)]
    pub session: SessionTimings,

    /// Incident diagnostics
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    /// Debug log level (debug and trace also enable diagnostics)
    #[serde(default = "crate::defaults::log_level")]
    pub log_level: LogLevel,

    /// Override for the workspace snapshot location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,

    /// Provider used for new terminal tabs when none is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider_id: Option<String>,

    /// Columns used before the surface reports a geometry
    #[serde(default = "crate::defaults::cols")]
    pub cols: u16,

    /// Rows used before the surface reports a geometry
    #[serde(default = "crate::defaults::rows")]
    pub rows: u16,

    /// Entries kept in the latest-session-id cache
    #[serde(default = "crate::defaults::session_id_cache_capacity")]
    pub session_id_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session: SessionTimings::default(),
            diagnostics: DiagnosticsConfig::default(),
            log_level: crate::defaults::log_level(),
            snapshot_path: None,
            default_provider_id: None,
            cols: crate::defaults::cols(),
            rows: crate::defaults::rows(),
            session_id_cache_capacity: crate::defaults::session_id_cache_capacity(),
        }
    }
}

impl Config {
    /// Whether lifecycle diagnostics should be recorded
    pub fn diagnostics_enabled(&self) -> bool {
        self.diagnostics.enabled || self.log_level.is_debug()
    }

    /// Reject values that would disable the lifecycle timers or buffers
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timings = &self.session;
        let non_zero = [
            ("session.stale_input_threshold_ms", timings.stale_input_threshold_ms),
            ("session.recovery_grace_ms", timings.recovery_grace_ms),
            ("session.stale_poll_interval_ms", timings.stale_poll_interval_ms),
            ("session.liveness_probe_interval_ms", timings.liveness_probe_interval_ms),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{field} must be greater than 0")));
            }
        }
        if timings.focus_retry_delays_ms.windows(2).any(|w| w[0] > w[1]) {
            return Err(ConfigError::Validation(
                "session.focus_retry_delays_ms must be ascending".to_string(),
            ));
        }
        if self.diagnostics.capacity == 0 {
            return Err(ConfigError::Validation(
                "diagnostics.capacity must be greater than 0".to_string(),
            ));
        }
        if self.session_id_cache_capacity == 0 {
            return Err(ConfigError::Validation(
                "session_id_cache_capacity must be greater than 0".to_string(),
            ));
        }
        if self.cols == 0 || self.rows == 0 {
            return Err(ConfigError::Validation("cols and rows must be greater than 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
