//! Pure workspace state transitions.
//!
//! `reduce` never fails: actions aimed at ids that no longer exist leave the
//! state as it was, since they are often raised by async callers that lost a
//! race with a close.

use std::collections::HashSet;

use crate::pane::{PaneAddress, PaneId, PaneStatePatch, SplitDirection, TerminalTabId, WorkspaceId};
use crate::tab::{ClosePaneOutcome, SplitIds, TabStatus, TerminalTabSeed};

use super::{Workspace, WorkspaceSeed, WorkspaceState};

/// Who asked for a tab rename
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameSource {
    /// The user typed a title; it locks the title
    User,
    /// Derived from session output; ignored while locked
    Auto,
}

/// Workspace state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    CreateWorkspace {
        seed: WorkspaceSeed,
    },
    CloseWorkspace {
        workspace_id: WorkspaceId,
    },
    SetActiveWorkspace {
        workspace_id: WorkspaceId,
    },
    CreateTerminalTab {
        workspace_id: WorkspaceId,
        seed: TerminalTabSeed,
    },
    CloseTerminalTab {
        workspace_id: WorkspaceId,
        terminal_tab_id: TerminalTabId,
        /// Default tab created if this was the last one
        replacement: TerminalTabSeed,
    },
    SetActiveTerminalTab {
        workspace_id: WorkspaceId,
        terminal_tab_id: TerminalTabId,
    },
    SplitPane {
        workspace_id: WorkspaceId,
        terminal_tab_id: TerminalTabId,
        pane_id: PaneId,
        direction: SplitDirection,
        ids: SplitIds,
    },
    ClosePane {
        workspace_id: WorkspaceId,
        terminal_tab_id: TerminalTabId,
        pane_id: PaneId,
        /// Default tab created if closing the pane empties the workspace
        replacement: TerminalTabSeed,
    },
    ActivatePane {
        workspace_id: WorkspaceId,
        terminal_tab_id: TerminalTabId,
        pane_id: PaneId,
    },
    UpdatePaneState {
        workspace_id: WorkspaceId,
        terminal_tab_id: TerminalTabId,
        pane_id: PaneId,
        patch: PaneStatePatch,
    },
    ResizeSplit {
        workspace_id: WorkspaceId,
        terminal_tab_id: TerminalTabId,
        split_id: PaneId,
        ratio: f32,
    },
    RenameTerminalTab {
        workspace_id: WorkspaceId,
        terminal_tab_id: TerminalTabId,
        title: String,
        source: RenameSource,
    },
    SetTerminalTabStatus {
        workspace_id: WorkspaceId,
        terminal_tab_id: TerminalTabId,
        status: TabStatus,
        /// Event time (epoch ms)
        at: u64,
    },
    ReorderWorkspaces {
        ordered_ids: Vec<WorkspaceId>,
    },
    MarkSaved,
}

impl Action {
    /// Split a pane with freshly generated node ids
    pub fn split_pane(address: &PaneAddress, direction: SplitDirection) -> Self {
        Action::SplitPane {
            workspace_id: address.workspace_id.clone(),
            terminal_tab_id: address.terminal_tab_id.clone(),
            pane_id: address.pane_id.clone(),
            direction,
            ids: SplitIds::generate(),
        }
    }

    /// Close a pane; a replacement tab seed is prepared in case it was the last
    pub fn close_pane(address: &PaneAddress, now: u64) -> Self {
        Action::ClosePane {
            workspace_id: address.workspace_id.clone(),
            terminal_tab_id: address.terminal_tab_id.clone(),
            pane_id: address.pane_id.clone(),
            replacement: TerminalTabSeed::default_chat(now),
        }
    }

    /// Close a terminal tab with a prepared replacement seed
    pub fn close_terminal_tab(
        workspace_id: impl Into<WorkspaceId>,
        terminal_tab_id: impl Into<TerminalTabId>,
        now: u64,
    ) -> Self {
        Action::CloseTerminalTab {
            workspace_id: workspace_id.into(),
            terminal_tab_id: terminal_tab_id.into(),
            replacement: TerminalTabSeed::default_chat(now),
        }
    }

    /// Patch the runtime state of one pane
    pub fn update_pane_state(address: &PaneAddress, patch: PaneStatePatch) -> Self {
        Action::UpdatePaneState {
            workspace_id: address.workspace_id.clone(),
            terminal_tab_id: address.terminal_tab_id.clone(),
            pane_id: address.pane_id.clone(),
            patch,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Action::CreateWorkspace { .. } => "CreateWorkspace",
            Action::CloseWorkspace { .. } => "CloseWorkspace",
            Action::SetActiveWorkspace { .. } => "SetActiveWorkspace",
            Action::CreateTerminalTab { .. } => "CreateTerminalTab",
            Action::CloseTerminalTab { .. } => "CloseTerminalTab",
            Action::SetActiveTerminalTab { .. } => "SetActiveTerminalTab",
            Action::SplitPane { .. } => "SplitPane",
            Action::ClosePane { .. } => "ClosePane",
            Action::ActivatePane { .. } => "ActivatePane",
            Action::UpdatePaneState { .. } => "UpdatePaneState",
            Action::ResizeSplit { .. } => "ResizeSplit",
            Action::RenameTerminalTab { .. } => "RenameTerminalTab",
            Action::SetTerminalTabStatus { .. } => "SetTerminalTabStatus",
            Action::ReorderWorkspaces { .. } => "ReorderWorkspaces",
            Action::MarkSaved => "MarkSaved",
        }
    }
}

/// Apply `action` to `state`
pub fn reduce(state: &WorkspaceState, action: Action) -> WorkspaceState {
    let name = action.name();
    let mut next = state.clone();
    if apply(&mut next, action) {
        next
    } else {
        log::debug!("Reducer: {} targeted a missing or invalid id, state unchanged", name);
        state.clone()
    }
}

/// Mutate `state` in place; false means nothing applied
fn apply(state: &mut WorkspaceState, action: Action) -> bool {
    match action {
        Action::CreateWorkspace { seed } => {
            if state.workspace(&seed.id).is_some() {
                return false;
            }
            let workspace = Workspace::new(seed, state.workspaces.len());
            state.active_workspace_id = Some(workspace.id.clone());
            state.workspaces.push(workspace);
            true
        }

        Action::CloseWorkspace { workspace_id } => {
            let Some(idx) = state.workspaces.iter().position(|w| w.id == workspace_id) else {
                return false;
            };
            state.workspaces.remove(idx);
            if state.active_workspace_id.as_deref() == Some(workspace_id.as_str()) {
                state.active_workspace_id = if state.workspaces.is_empty() {
                    None
                } else {
                    let new_idx = idx.min(state.workspaces.len() - 1);
                    Some(state.workspaces[new_idx].id.clone())
                };
            }
            state.renumber();
            true
        }

        Action::SetActiveWorkspace { workspace_id } => {
            if state.workspace(&workspace_id).is_none() {
                return false;
            }
            state.active_workspace_id = Some(workspace_id);
            true
        }

        Action::CreateTerminalTab { workspace_id, seed } => {
            let Some(workspace) = state.workspace_mut(&workspace_id) else {
                return false;
            };
            if workspace.tab(&seed.id).is_some() {
                return false;
            }
            let mut tab = crate::tab::TerminalTab::new(seed, Some(workspace.project_path.as_str()));
            tab.has_unsaved_changes = true;
            workspace.active_terminal_tab_id = Some(tab.id.clone());
            workspace.terminal_tabs.push(tab);
            workspace.has_unsaved_changes = true;
            workspace.refresh_status();
            true
        }

        Action::CloseTerminalTab {
            workspace_id,
            terminal_tab_id,
            replacement,
        } => state
            .workspace_mut(&workspace_id)
            .is_some_and(|w| w.close_tab(&terminal_tab_id, &replacement)),

        Action::SetActiveTerminalTab {
            workspace_id,
            terminal_tab_id,
        } => {
            let Some(workspace) = state.workspace_mut(&workspace_id) else {
                return false;
            };
            if workspace.tab(&terminal_tab_id).is_none() {
                return false;
            }
            workspace.active_terminal_tab_id = Some(terminal_tab_id);
            true
        }

        Action::SplitPane {
            workspace_id,
            terminal_tab_id,
            pane_id,
            direction,
            ids,
        } => {
            let Some(workspace) = state.workspace_mut(&workspace_id) else {
                return false;
            };
            let Some(tab) = workspace.tab_mut(&terminal_tab_id) else {
                return false;
            };
            if !tab.split_pane(&pane_id, direction, &ids) {
                return false;
            }
            workspace.has_unsaved_changes = true;
            true
        }

        Action::ClosePane {
            workspace_id,
            terminal_tab_id,
            pane_id,
            replacement,
        } => {
            let Some(workspace) = state.workspace_mut(&workspace_id) else {
                return false;
            };
            let Some(tab) = workspace.tab_mut(&terminal_tab_id) else {
                return false;
            };
            match tab.close_pane(&pane_id) {
                ClosePaneOutcome::NotFound => false,
                ClosePaneOutcome::Closed => {
                    workspace.has_unsaved_changes = true;
                    true
                }
                ClosePaneOutcome::LastPane => workspace.close_tab(&terminal_tab_id, &replacement),
            }
        }

        Action::ActivatePane {
            workspace_id,
            terminal_tab_id,
            pane_id,
        } => state
            .workspace_mut(&workspace_id)
            .and_then(|w| w.tab_mut(&terminal_tab_id))
            .is_some_and(|tab| tab.activate_pane(&pane_id)),

        Action::UpdatePaneState {
            workspace_id,
            terminal_tab_id,
            pane_id,
            patch,
        } => state
            .workspace_mut(&workspace_id)
            .and_then(|w| w.tab_mut(&terminal_tab_id))
            .is_some_and(|tab| tab.update_pane_state(&pane_id, &patch)),

        Action::ResizeSplit {
            workspace_id,
            terminal_tab_id,
            split_id,
            ratio,
        } => state
            .workspace_mut(&workspace_id)
            .and_then(|w| w.tab_mut(&terminal_tab_id))
            .is_some_and(|tab| tab.resize_split(&split_id, ratio)),

        Action::RenameTerminalTab {
            workspace_id,
            terminal_tab_id,
            title,
            source,
        } => {
            let Some(workspace) = state.workspace_mut(&workspace_id) else {
                return false;
            };
            let Some(tab) = workspace.tab_mut(&terminal_tab_id) else {
                return false;
            };
            if !tab.rename(&title, source == RenameSource::User) {
                return false;
            }
            tab.has_unsaved_changes = true;
            workspace.has_unsaved_changes = true;
            true
        }

        Action::SetTerminalTabStatus {
            workspace_id,
            terminal_tab_id,
            status,
            at,
        } => {
            let Some(workspace) = state.workspace_mut(&workspace_id) else {
                return false;
            };
            let Some(tab) = workspace.tab_mut(&terminal_tab_id) else {
                return false;
            };
            tab.status = status;
            tab.updated_at = tab.updated_at.max(at);
            workspace.refresh_status();
            true
        }

        Action::ReorderWorkspaces { ordered_ids } => {
            let mut remaining = std::mem::take(&mut state.workspaces);
            let mut reordered = Vec::with_capacity(remaining.len());
            let mut seen = HashSet::new();
            for id in &ordered_ids {
                if !seen.insert(id.as_str()) {
                    continue;
                }
                if let Some(idx) = remaining.iter().position(|w| &w.id == id) {
                    reordered.push(remaining.remove(idx));
                }
            }
            // Unlisted workspaces keep their prior relative order
            reordered.extend(remaining);
            state.workspaces = reordered;
            state.renumber();
            true
        }

        Action::MarkSaved => {
            for workspace in &mut state.workspaces {
                workspace.has_unsaved_changes = false;
                for tab in &mut workspace.terminal_tabs {
                    tab.has_unsaved_changes = false;
                }
            }
            true
        }
    }
}

/// Pane addresses present in `before` but gone from `after`.
///
/// A split parent is listed too; its session lives on in the child that
/// inherited the runtime state (see `SessionRegistry::sync`).
pub fn removed_panes(before: &WorkspaceState, after: &WorkspaceState) -> Vec<PaneAddress> {
    let remaining: HashSet<PaneAddress> = after.pane_addresses().into_iter().collect();
    before
        .pane_addresses()
        .into_iter()
        .filter(|address| !remaining.contains(address))
        .collect()
}
