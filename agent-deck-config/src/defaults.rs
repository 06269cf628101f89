//! Default value functions for configuration.
//!
//! Used as `#[serde(default = "crate::defaults::...")]` attributes on
//! `Config` fields so partial YAML files keep working.

use crate::types::LogLevel;

// ── Session lifecycle timings ──────────────────────────────────────────────

pub fn stale_input_threshold_ms() -> u64 {
    8_000
}

pub fn recovery_cooldown_ms() -> u64 {
    2_500
}

pub fn recovery_grace_ms() -> u64 {
    1_200
}

pub fn stale_poll_interval_ms() -> u64 {
    1_000
}

pub fn liveness_probe_interval_ms() -> u64 {
    15_000
}

pub fn auto_recover_delay_ms() -> u64 {
    750
}

pub fn max_auto_recover_attempts() -> u32 {
    1
}

pub fn soft_reattach_delay_ms() -> u64 {
    100
}

pub fn focus_retry_delays_ms() -> Vec<u64> {
    vec![0, 50, 120, 250, 500]
}

pub fn error_banner_ttl_ms() -> u64 {
    6_000
}

// ── Diagnostics ────────────────────────────────────────────────────────────

pub fn diagnostics_capacity() -> usize {
    400
}

pub fn capture_debounce_ms() -> u64 {
    60_000
}

// ── Terminal grid ──────────────────────────────────────────────────────────

pub fn cols() -> u16 {
    80
}

pub fn rows() -> u16 {
    24
}

pub fn session_id_cache_capacity() -> usize {
    64
}

pub fn log_level() -> LogLevel {
    LogLevel::Off
}
