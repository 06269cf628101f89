//! Workspaces and the state reducer
//!
//! A workspace is a project context owning an ordered list of terminal tabs
//! and an active-tab pointer. [`WorkspaceState`] is the whole graph; it only
//! changes through [`reduce`].

mod reducer;


pub use reducer::{Action, RenameSource, reduce, removed_panes};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::pane::{PaneAddress, TerminalTabId, WorkspaceId};
use crate::tab::{TabStatus, TerminalTab, TerminalTabSeed};

/// Everything needed to create a workspace without generating ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSeed {
    pub id: WorkspaceId,
    pub project_path: String,
    pub title: String,
    pub initial_tab: TerminalTabSeed,
}

impl WorkspaceSeed {
    /// Seed with a fresh id and a default chat tab
    pub fn new(project_path: impl Into<String>, title: impl Into<String>, created_at: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_path: project_path.into(),
            title: title.into(),
            initial_tab: TerminalTabSeed::default_chat(created_at),
        }
    }

    /// Seed whose default chat tab runs the configured default provider
    pub fn from_config(
        config: &Config,
        project_path: impl Into<String>,
        title: impl Into<String>,
        created_at: u64,
    ) -> Self {
        let mut seed = Self::new(project_path, title, created_at);
        seed.initial_tab = seed.initial_tab.with_default_provider(config);
        seed
    }
}

/// A project context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: WorkspaceId,
    pub project_path: String,
    pub title: String,
    pub terminal_tabs: Vec<TerminalTab>,
    pub active_terminal_tab_id: Option<TerminalTabId>,
    /// Canonical position in the workspace bar
    #[serde(default)]
    pub order: usize,
    #[serde(default)]
    pub status: TabStatus,
    #[serde(default)]
    pub has_unsaved_changes: bool,
}

impl Workspace {
    pub fn new(seed: WorkspaceSeed, order: usize) -> Self {
        let tab = TerminalTab::new(seed.initial_tab, Some(seed.project_path.as_str()));
        Self {
            id: seed.id,
            project_path: seed.project_path,
            title: seed.title,
            active_terminal_tab_id: Some(tab.id.clone()),
            terminal_tabs: vec![tab],
            order,
            status: TabStatus::Idle,
            has_unsaved_changes: false,
        }
    }

    pub fn tab(&self, tab_id: &str) -> Option<&TerminalTab> {
        self.terminal_tabs.iter().find(|t| t.id == tab_id)
    }

    pub fn tab_mut(&mut self, tab_id: &str) -> Option<&mut TerminalTab> {
        self.terminal_tabs.iter_mut().find(|t| t.id == tab_id)
    }

    pub fn active_tab(&self) -> Option<&TerminalTab> {
        self.active_terminal_tab_id
            .as_deref()
            .and_then(|id| self.tab(id))
    }

    /// Recompute the workspace status from its tabs
    pub fn refresh_status(&mut self) {
        self.status = TabStatus::most_urgent(self.terminal_tabs.iter().map(|t| t.status));
    }

    /// Remove a tab, promoting a neighbour if it was active.
    ///
    /// An emptied workspace gets a fresh default tab from `replacement`.
    /// Returns false if no such tab exists.
    pub fn close_tab(&mut self, tab_id: &str, replacement: &TerminalTabSeed) -> bool {
        let Some(idx) = self.terminal_tabs.iter().position(|t| t.id == tab_id) else {
            return false;
        };

        log::info!("Closing terminal tab {} (index {}) in workspace {}", tab_id, idx, self.id);
        self.terminal_tabs.remove(idx);

        if self.terminal_tabs.is_empty() {
            let tab = TerminalTab::new(replacement.clone(), Some(self.project_path.as_str()));
            self.active_terminal_tab_id = Some(tab.id.clone());
            self.terminal_tabs.push(tab);
        } else if self.active_terminal_tab_id.as_deref() == Some(tab_id) {
            // Prefer the tab at the same index (or the new last tab)
            let new_idx = idx.min(self.terminal_tabs.len() - 1);
            self.active_terminal_tab_id = Some(self.terminal_tabs[new_idx].id.clone());
        }

        self.has_unsaved_changes = true;
        self.refresh_status();
        true
    }

    /// Addresses of every pane in every tab
    pub fn pane_addresses(&self) -> Vec<PaneAddress> {
        self.terminal_tabs
            .iter()
            .flat_map(|tab| tab.pane_addresses(&self.id))
            .collect()
    }
}

/// The whole workspace graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspaceState {
    pub workspaces: Vec<Workspace>,
    pub active_workspace_id: Option<WorkspaceId>,
}

impl WorkspaceState {
    pub fn workspace(&self, workspace_id: &str) -> Option<&Workspace> {
        self.workspaces.iter().find(|w| w.id == workspace_id)
    }

    pub fn workspace_mut(&mut self, workspace_id: &str) -> Option<&mut Workspace> {
        self.workspaces.iter_mut().find(|w| w.id == workspace_id)
    }

    pub fn active_workspace(&self) -> Option<&Workspace> {
        self.active_workspace_id
            .as_deref()
            .and_then(|id| self.workspace(id))
    }

    pub fn tab(&self, workspace_id: &str, tab_id: &str) -> Option<&TerminalTab> {
        self.workspace(workspace_id)?.tab(tab_id)
    }

    /// Addresses of every pane in the graph
    pub fn pane_addresses(&self) -> Vec<PaneAddress> {
        self.workspaces
            .iter()
            .flat_map(Workspace::pane_addresses)
            .collect()
    }

    /// Rewrite `order` to match list position
    pub fn renumber(&mut self) {
        for (idx, workspace) in self.workspaces.iter_mut().enumerate() {
            workspace.order = idx;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.workspaces.is_empty()
    }

    /// Total number of terminal tabs
    pub fn tab_count(&self) -> usize {
        self.workspaces.iter().map(|w| w.terminal_tabs.len()).sum()
    }
}
