//! Pane tree and per-pane runtime state
//!
//! This module provides the pane infrastructure for split terminals:
//! - `PaneNode`: Tree structure for nested pane splits
//! - `PaneRuntimeState`: What a pane knows about its session
//! - `PaneStatePatch`: Partial update applied by the reducer
//! - `PaneAddress`: Workspace / tab / pane triple identifying a pane

mod types;

pub use types::{
    HandleId, MAX_SPLIT_RATIO, MIN_SPLIT_RATIO, PaneAddress, PaneId, PaneNode, PaneRuntimeState,
    PaneStatePatch, PatchField, RemoveResult, RestorePreference, SplitDirection, TerminalTabId,
    WorkspaceId, clamp_ratio,
};
