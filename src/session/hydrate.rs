//! Snapshot hydration
//!
//! A snapshot is either restored completely or discarded completely: partial
//! corruption is never repaired in place. Live process handles from a previous
//! run are always stripped, restore intent (`sessionId`, `restorePreference`,
//! `projectPath`) is kept.

use std::collections::HashSet;

use serde_json::Value;

use super::{PersistedSnapshot, SNAPSHOT_VERSION, SnapshotError, legacy};
use crate::workspace::{Workspace, WorkspaceState};

/// JSON key of the live handle in pane state
const HANDLE_KEY: &str = "embeddedTerminalId";

/// How the stored snapshot was turned into state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HydrationOutcome {
    /// Nothing stored
    Empty,
    /// Current-format snapshot restored
    Restored,
    /// Legacy flat-tab snapshot migrated
    Migrated,
    /// Snapshot rejected; the store must be cleared
    Discarded { reason: String },
}

/// Result of [`hydrate`]
#[derive(Debug, Clone, PartialEq)]
pub struct Hydration {
    pub state: WorkspaceState,
    pub outcome: HydrationOutcome,
    /// Raw data contained live handles; the sanitized snapshot must be rewritten
    pub handles_stripped: bool,
}

impl Hydration {
    fn empty(outcome: HydrationOutcome) -> Self {
        Self {
            state: WorkspaceState::default(),
            outcome,
            handles_stripped: false,
        }
    }

    fn discarded(error: SnapshotError) -> Self {
        log::warn!("Discarding workspace snapshot: {}", error);
        Self::empty(HydrationOutcome::Discarded {
            reason: error.to_string(),
        })
    }

    /// The stored snapshot must be removed
    pub fn needs_clear(&self) -> bool {
        matches!(self.outcome, HydrationOutcome::Discarded { .. })
    }

    /// The stored snapshot must be replaced by the sanitized state
    pub fn needs_rewrite(&self) -> bool {
        !self.needs_clear() && (self.handles_stripped || self.outcome == HydrationOutcome::Migrated)
    }
}

/// Whether any object in `value` carries a live handle key
fn contains_handle(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(key, child)| (key == HANDLE_KEY && !child.is_null()) || contains_handle(child)),
        Value::Array(items) => items.iter().any(contains_handle),
        _ => false,
    }
}

/// Parse and validate a stored snapshot
pub fn hydrate(raw: &str) -> Hydration {
    if raw.trim().is_empty() {
        return Hydration::empty(HydrationOutcome::Empty);
    }

    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => return Hydration::discarded(SnapshotError::Json(e)),
    };
    let handles_stripped = contains_handle(&value);

    let version = value.get("version").and_then(Value::as_u64);
    let result = match version {
        None | Some(1) => legacy::migrate(value).map(|state| (state, HydrationOutcome::Migrated)),
        Some(v) if v == u64::from(SNAPSHOT_VERSION) => serde_json::from_value::<PersistedSnapshot>(value)
            .map_err(SnapshotError::from)
            .and_then(sanitize)
            .map(|state| (state, HydrationOutcome::Restored)),
        Some(v) => Err(SnapshotError::UnsupportedVersion(v)),
    };

    match result {
        Ok((state, outcome)) => {
            log::info!(
                "Hydrated {} workspaces ({} terminal tabs), outcome {:?}, handles stripped: {}",
                state.workspaces.len(),
                state.tab_count(),
                outcome,
                handles_stripped
            );
            Hydration {
                state,
                outcome,
                handles_stripped,
            }
        }
        Err(e) => Hydration::discarded(e),
    }
}

/// Validate a current-format snapshot and turn it into clean state
fn sanitize(snapshot: PersistedSnapshot) -> Result<WorkspaceState, SnapshotError> {
    let mut workspaces = snapshot.tabs;

    // Tab and pane node ids must be unique across the whole snapshot
    let mut workspace_ids = HashSet::new();
    let mut tab_ids = HashSet::new();
    let mut node_ids = HashSet::new();
    for workspace in &workspaces {
        if !workspace_ids.insert(workspace.id.as_str()) {
            return Err(SnapshotError::DuplicateWorkspace(workspace.id.clone()));
        }
        validate_workspace(workspace, &mut tab_ids, &mut node_ids)?;
    }

    let active_workspace_id = match snapshot.active_tab_id {
        Some(id) if !workspace_ids.contains(id.as_str()) => {
            return Err(SnapshotError::DanglingActiveWorkspace(id));
        }
        Some(id) => Some(id),
        None => workspaces.first().map(|w| w.id.clone()),
    };

    for workspace in &mut workspaces {
        if workspace.active_terminal_tab_id.is_none() {
            workspace.active_terminal_tab_id = workspace.terminal_tabs.first().map(|t| t.id.clone());
        }
        for tab in &mut workspace.terminal_tabs {
            for state in tab.pane_states.values_mut() {
                state.embedded_terminal_id = None;
            }
            tab.pane_tree.clamp_ratios();
            tab.sync_session_state();
        }
        workspace.refresh_status();
    }

    // Stable sort keeps list position for equal `order` values
    workspaces.sort_by_key(|w| w.order);
    let mut state = WorkspaceState {
        workspaces,
        active_workspace_id,
    };
    state.renumber();
    Ok(state)
}

fn validate_workspace<'a>(
    workspace: &'a Workspace,
    tab_ids: &mut HashSet<&'a str>,
    node_ids: &mut HashSet<String>,
) -> Result<(), SnapshotError> {
    if workspace.terminal_tabs.is_empty() {
        return Err(SnapshotError::EmptyWorkspace(workspace.id.clone()));
    }

    for tab in &workspace.terminal_tabs {
        if !tab_ids.insert(tab.id.as_str()) {
            return Err(SnapshotError::DuplicateTab {
                workspace: workspace.id.clone(),
                tab: tab.id.clone(),
            });
        }
        tab.validate().map_err(SnapshotError::InvalidPaneLayout)?;
        for node_id in tab.pane_tree.node_ids() {
            if node_ids.contains(&node_id) {
                return Err(SnapshotError::DuplicatePane {
                    tab: tab.id.clone(),
                    pane: node_id,
                });
            }
            node_ids.insert(node_id);
        }
    }

    if let Some(active) = &workspace.active_terminal_tab_id
        && !workspace.terminal_tabs.iter().any(|tab| &tab.id == active)
    {
        return Err(SnapshotError::DanglingActiveTab {
            workspace: workspace.id.clone(),
            tab: active.clone(),
        });
    }
    Ok(())
}
