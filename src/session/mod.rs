//! Workspace persistence
//!
//! This module turns the in-memory workspace graph into the versioned
//! on-disk snapshot and back:
//! - [`key`]: persistent session keys for panes
//! - [`hydrate`]: validating loader that strips live handles
//! - [`legacy`]: migration of the flat version 1 tab list
//! - [`storage`]: snapshot stores and the restore/persist helpers

pub mod hydrate;
pub mod key;
pub mod legacy;
pub mod storage;

pub use hydrate::{Hydration, HydrationOutcome, hydrate};
pub use key::{parse_persistent_session_key, persistent_session_key};
pub use storage::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore, persist_state, restore_state};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pane::WorkspaceId;
use crate::workspace::{Workspace, WorkspaceState};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 2;

/// On-disk snapshot of the workspace graph
///
/// `activeTabId` and `tabs` name the active workspace and the workspace list;
/// the field names predate workspaces and are kept for compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    pub version: u32,
    #[serde(default)]
    pub active_tab_id: Option<WorkspaceId>,
    #[serde(default)]
    pub tabs: Vec<Workspace>,
}

/// Reasons a stored snapshot is rejected
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u64),

    #[error("duplicate workspace id {0}")]
    DuplicateWorkspace(String),

    #[error("workspace {workspace} has duplicate terminal tab id {tab}")]
    DuplicateTab { workspace: String, tab: String },

    #[error("terminal tab {tab} reuses pane node id {pane}")]
    DuplicatePane { tab: String, pane: String },

    #[error("workspace {0} has no terminal tabs")]
    EmptyWorkspace(String),

    #[error("active workspace {0} does not exist")]
    DanglingActiveWorkspace(String),

    #[error("workspace {workspace} active terminal tab {tab} does not exist")]
    DanglingActiveTab { workspace: String, tab: String },

    #[error("invalid pane layout: {0}")]
    InvalidPaneLayout(String),
}

/// Snapshot of `state` ready to be written (live handles are never serialized)
pub fn dehydrate(state: &WorkspaceState) -> PersistedSnapshot {
    PersistedSnapshot {
        version: SNAPSHOT_VERSION,
        active_tab_id: state.active_workspace_id.clone(),
        tabs: state.workspaces.clone(),
    }
}

/// Serialize `state` as snapshot JSON
pub fn to_json(state: &WorkspaceState) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&dehydrate(state))
}
