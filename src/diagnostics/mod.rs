//! Incident diagnostics for terminal sessions
//!
//! Lifecycle events of every pane are kept in a bounded ring buffer while
//! debug mode is on. When a session misbehaves the recent events are
//! classified and captured into an [`IncidentBundle`].
//!
//! Sub-modules:
//! - [`classify`]: picks the best matching incident label
//! - [`capture`]: per pane debounced bundle capture

pub mod capture;
pub mod classify;

pub use capture::{IncidentBundle, IncidentCapture};
pub use classify::{BackendSessionSnapshot, IncidentClass, classify};

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use agent_deck_config::Config;

use crate::pane::{HandleId, PaneAddress};

/// Kind of a recorded lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentEventKind {
    Start,
    Reattach,
    Reuse,
    Exit,
    FocusAttempt,
    FocusGated,
    WriteFailure,
    SessionNotFound,
    ListenerAttachFailed,
    StaleRecoveryAttempt,
    StaleRecoveryEscalated,
    ProbeFailed,
    ResizeFailure,
    WheelInput,
    Output,
    Input,
    Close,
}

/// One recorded lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentEvent {
    /// Epoch milliseconds
    pub at: u64,
    pub kind: IncidentEventKind,
    /// Persistent session key of the pane
    pub pane_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_id: Option<HandleId>,
    pub workspace_id: String,
    pub terminal_tab_id: String,
    pub pane_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl IncidentEvent {
    pub fn new(at: u64, kind: IncidentEventKind, address: &PaneAddress, pane_key: &str) -> Self {
        Self {
            at,
            kind,
            pane_key: pane_key.to_string(),
            terminal_id: None,
            workspace_id: address.workspace_id.clone(),
            terminal_tab_id: address.terminal_tab_id.clone(),
            pane_id: address.pane_id.clone(),
            detail: None,
        }
    }

    pub fn with_terminal(mut self, terminal_id: Option<HandleId>) -> Self {
        self.terminal_id = terminal_id;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Ring buffer of lifecycle events; records nothing while disabled
#[derive(Debug)]
pub struct IncidentLog {
    enabled: bool,
    capacity: usize,
    events: VecDeque<IncidentEvent>,
}

impl IncidentLog {
    pub fn new(enabled: bool, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            enabled,
            capacity,
            events: VecDeque::with_capacity(if enabled { capacity } else { 0 }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.events.clear();
        }
    }

    /// Append an event, dropping the oldest when full
    pub fn record(&mut self, event: IncidentEvent) {
        if !self.enabled {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Events of one pane, oldest first
    pub fn events_for(&self, pane_key: &str) -> Vec<IncidentEvent> {
        self.events
            .iter()
            .filter(|event| event.pane_key == pane_key)
            .cloned()
            .collect()
    }

    /// All events, oldest first
    pub fn events(&self) -> Vec<IncidentEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// Event log plus capture state shared by every pane controller
#[derive(Debug)]
pub struct Diagnostics {
    pub log: IncidentLog,
    pub capture: IncidentCapture,
}

impl Diagnostics {
    pub fn new(log: IncidentLog, capture: IncidentCapture) -> Self {
        Self { log, capture }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            IncidentLog::new(config.diagnostics_enabled(), config.diagnostics.capacity),
            IncidentCapture::new(
                config.diagnostics.capture_debounce_ms,
                config.diagnostics.incident_dir.clone(),
            ),
        )
    }

    /// Diagnostics that never record anything
    pub fn disabled() -> Self {
        Self::new(
            IncidentLog::new(false, 1),
            IncidentCapture::new(agent_deck_config::defaults::capture_debounce_ms(), None),
        )
    }

    /// Classify and capture the recent events of `pane_key`.
    ///
    /// Returns `None` when disabled or debounced.
    pub fn capture_incident(
        &mut self,
        pane_key: &str,
        reason: &str,
        snapshot: Option<BackendSessionSnapshot>,
        now_ms: u64,
    ) -> Option<IncidentBundle> {
        if !self.log.is_enabled() {
            return None;
        }
        let events = self.log.events_for(pane_key);
        let bundle = self.capture.capture(pane_key, reason, events, snapshot, now_ms)?;
        if let Err(e) = self.capture.write_bundle(&bundle) {
            log::warn!("Failed to write incident bundle for {}: {:#}", pane_key, e);
        }
        Some(bundle)
    }
}

/// Diagnostics shared between controllers
pub type SharedDiagnostics = Arc<Mutex<Diagnostics>>;

/// Create shared diagnostics from config
pub fn create_shared_diagnostics(config: &Config) -> SharedDiagnostics {
    Arc::new(Mutex::new(Diagnostics::from_config(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(at: u64, kind: IncidentEventKind, key: &str) -> IncidentEvent {
        IncidentEvent::new(at, kind, &PaneAddress::new("w", "t", "p"), key)
    }

    #[test]
    fn test_disabled_log_records_nothing() {
        let mut log = IncidentLog::new(false, 400);
        log.record(event(1, IncidentEventKind::Start, "k"));
        assert!(log.is_empty());
    }

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let mut log = IncidentLog::new(true, 3);
        for at in 0..5 {
            log.record(event(at, IncidentEventKind::Output, "k"));
        }
        let times: Vec<_> = log.events().iter().map(|e| e.at).collect();
        assert_eq!(times, vec![2, 3, 4]);
    }

    #[test]
    fn test_events_for_filters_by_pane() {
        let mut log = IncidentLog::new(true, 10);
        log.record(event(1, IncidentEventKind::Start, "a"));
        log.record(event(2, IncidentEventKind::Start, "b"));
        assert_eq!(log.events_for("a").len(), 1);
        log.set_enabled(false);
        assert!(log.is_empty());
    }

    #[test]
    fn test_default_config_disables_diagnostics() {
        let diagnostics = Diagnostics::from_config(&Config::default());
        assert!(!diagnostics.log.is_enabled());

        let mut config = Config::default();
        config.log_level = agent_deck_config::LogLevel::Debug;
        assert!(Diagnostics::from_config(&config).log.is_enabled());
    }

    #[test]
    fn test_event_serializes_snake_case_kind() {
        let json = serde_json::to_value(
            event(5, IncidentEventKind::StaleRecoveryEscalated, "k").with_detail("grace elapsed"),
        )
        .unwrap();
        assert_eq!(json["kind"], "stale_recovery_escalated");
        assert_eq!(json["paneKey"], "k");
        assert_eq!(json["detail"], "grace elapsed");
    }
}
