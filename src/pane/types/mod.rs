//! Core types for the pane system.
//!
//! This module defines the fundamental data structures for split panes:
//! - Binary tree structure for arbitrary nesting
//! - Per-pane runtime record (provider, project, session, live handle)
//!
//! Sub-modules:
//! - [`common`]    : `SplitDirection`, `PaneAddress`, ratio clamping, id re-exports
//! - [`pane_node`] : `PaneNode` binary tree for pane layout
//! - [`runtime`]   : `PaneRuntimeState` and `PaneStatePatch`

mod common;
mod pane_node;
mod runtime;


pub use common::{
    HandleId, MAX_SPLIT_RATIO, MIN_SPLIT_RATIO, PaneAddress, PaneId, SplitDirection,
    TerminalTabId, WorkspaceId, clamp_ratio,
};
pub use pane_node::{PaneNode, RemoveResult};
pub use runtime::{PaneRuntimeState, PaneStatePatch, PatchField, RestorePreference};
