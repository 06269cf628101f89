//! Incident classification.
//!
//! Several conditions can hold at once; the first matching label in
//! [`IncidentClass::PRIORITY`] wins.

use serde::{Deserialize, Serialize};

use super::{IncidentEvent, IncidentEventKind};

/// What the backend reports about a persistent session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendSessionSnapshot {
    /// Backend knows a session for the key
    pub exists: bool,
    /// The session's process is still alive
    pub alive: bool,
    /// Handle currently serving the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle_id: Option<String>,
    /// Last output seen by the backend (epoch ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_output_at: Option<u64>,
}

/// Best matching explanation of an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentClass {
    StaleFrontendHandle,
    DeadBackendProcess,
    ListenerAttachFailed,
    InteractiveFocusGating,
    StaleRecoveryEscalated,
    BackendWriteStall,
    WheelInputObserved,
    Unclassified,
}

impl IncidentClass {
    /// Evaluation order, most specific first
    pub const PRIORITY: [IncidentClass; 8] = [
        IncidentClass::StaleFrontendHandle,
        IncidentClass::DeadBackendProcess,
        IncidentClass::ListenerAttachFailed,
        IncidentClass::InteractiveFocusGating,
        IncidentClass::StaleRecoveryEscalated,
        IncidentClass::BackendWriteStall,
        IncidentClass::WheelInputObserved,
        IncidentClass::Unclassified,
    ];

    /// Human readable label
    pub fn label(self) -> &'static str {
        match self {
            IncidentClass::StaleFrontendHandle => "stale frontend handle",
            IncidentClass::DeadBackendProcess => "dead backend process",
            IncidentClass::ListenerAttachFailed => "listener attach failed",
            IncidentClass::InteractiveFocusGating => "interactive focus gating",
            IncidentClass::StaleRecoveryEscalated => "stale recovery escalated",
            IncidentClass::BackendWriteStall => "backend write stall",
            IncidentClass::WheelInputObserved => "wheel input observed",
            IncidentClass::Unclassified => "unclassified",
        }
    }

    fn matches(self, events: &[IncidentEvent], snapshot: Option<&BackendSessionSnapshot>) -> bool {
        let has = |kind| events.iter().any(|e| e.kind == kind);
        match self {
            IncidentClass::StaleFrontendHandle => {
                let frontend_handle = events.iter().rev().find_map(|e| e.terminal_id.as_deref());
                has(IncidentEventKind::SessionNotFound)
                    || match (snapshot, frontend_handle) {
                        (Some(snap), Some(handle)) => {
                            !snap.exists || snap.handle_id.as_deref().is_some_and(|h| h != handle)
                        }
                        _ => false,
                    }
            }
            IncidentClass::DeadBackendProcess => {
                snapshot.is_some_and(|snap| snap.exists && !snap.alive) || has(IncidentEventKind::Exit)
            }
            IncidentClass::ListenerAttachFailed => has(IncidentEventKind::ListenerAttachFailed),
            IncidentClass::InteractiveFocusGating => has(IncidentEventKind::FocusGated),
            IncidentClass::StaleRecoveryEscalated => has(IncidentEventKind::StaleRecoveryEscalated),
            IncidentClass::BackendWriteStall => {
                has(IncidentEventKind::WriteFailure) || input_without_output(events)
            }
            IncidentClass::WheelInputObserved => has(IncidentEventKind::WheelInput),
            IncidentClass::Unclassified => true,
        }
    }
}

impl std::fmt::Display for IncidentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Input was sent and no output has arrived since
fn input_without_output(events: &[IncidentEvent]) -> bool {
    let last_input = events
        .iter()
        .filter(|e| e.kind == IncidentEventKind::Input)
        .map(|e| e.at)
        .max();
    let last_output = events
        .iter()
        .filter(|e| e.kind == IncidentEventKind::Output)
        .map(|e| e.at)
        .max();
    match (last_input, last_output) {
        (Some(input), Some(output)) => output < input,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Pick the single best label for `events` (oldest first)
pub fn classify(events: &[IncidentEvent], snapshot: Option<&BackendSessionSnapshot>) -> IncidentClass {
    IncidentClass::PRIORITY
        .into_iter()
        .find(|class| class.matches(events, snapshot))
        .unwrap_or(IncidentClass::Unclassified)
}
