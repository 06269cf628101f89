//! Stale-input detection.
//!
//! Input counts as stale when it was sent longer than the threshold ago and
//! no output has arrived since. Recovery attempts are rate limited by a
//! cooldown. All timestamps are epoch milliseconds; 0 means "never".

use agent_deck_config::SessionTimings;

/// Whether a stale-input recovery should start at `now`
pub fn is_stale_recovery_eligible(
    now: u64,
    last_input_attempt_at: u64,
    last_output_at: u64,
    last_recovery_at: u64,
    timings: &SessionTimings,
) -> bool {
    if last_input_attempt_at == 0 {
        return false;
    }
    let input_is_old = now.saturating_sub(last_input_attempt_at) > timings.stale_input_threshold_ms;
    let output_lags = last_output_at < last_input_attempt_at;
    let cooled_down = last_recovery_at == 0
        || now.saturating_sub(last_recovery_at) >= timings.recovery_cooldown_ms;
    input_is_old && output_lags && cooled_down
}

/// Whether output still lags the input once the grace period is over
pub fn should_escalate(last_input_attempt_at: u64, last_output_at: u64) -> bool {
    last_input_attempt_at != 0 && last_output_at < last_input_attempt_at
}
