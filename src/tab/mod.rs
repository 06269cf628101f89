//! Terminal tabs
//!
//! A terminal tab is one logical terminal (a chat or an agent run) inside a
//! workspace. It owns:
//! - `pane_tree`: the split layout
//! - `pane_states`: one `PaneRuntimeState` per leaf
//! - `session_state`: a summary mirrored from the active pane
//!
//! Pane-level operations used by the reducer live in [`pane_ops`].

mod pane_ops;

pub use pane_ops::{ClosePaneOutcome, SplitIds};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::pane::{
    PaneAddress, PaneId, PaneNode, PaneRuntimeState, RestorePreference, TerminalTabId,
    WorkspaceId,
};

/// Title given to the tab that replaces the last closed tab of a workspace
pub const DEFAULT_TAB_TITLE: &str = "Terminal";

/// What a terminal tab is running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalTabKind {
    #[default]
    Chat,
    Agent,
}

/// Activity status of a terminal tab (and, aggregated, of a workspace)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    #[default]
    Idle,
    Running,
    Attention,
    Complete,
    Error,
    Active,
}

impl TabStatus {
    /// Rank used to pick the most urgent status among several tabs
    pub fn urgency(self) -> u8 {
        match self {
            TabStatus::Idle => 0,
            TabStatus::Complete => 1,
            TabStatus::Active => 2,
            TabStatus::Running => 3,
            TabStatus::Attention => 4,
            TabStatus::Error => 5,
        }
    }

    /// Most urgent status of an iterator (idle when empty)
    pub fn most_urgent(statuses: impl IntoIterator<Item = TabStatus>) -> TabStatus {
        statuses
            .into_iter()
            .max_by_key(|status| status.urgency())
            .unwrap_or_default()
    }
}

/// Session summary mirrored from the active pane
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_preference: Option<RestorePreference>,
    /// Whether a live process is bound to the active pane
    #[serde(default)]
    pub attached: bool,
}

impl SessionSummary {
    fn from_pane(state: &PaneRuntimeState) -> Self {
        Self {
            provider_id: state.provider_id.clone(),
            session_id: state.session_id.clone(),
            restore_preference: state.restore_preference,
            attached: state.is_attached(),
        }
    }
}

/// Everything needed to create a terminal tab without generating ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalTabSeed {
    pub id: TerminalTabId,
    pub pane_id: PaneId,
    pub kind: TerminalTabKind,
    pub title: String,
    pub provider_id: Option<String>,
    /// Creation time (epoch ms)
    pub created_at: u64,
}

impl TerminalTabSeed {
    /// Seed with fresh ids
    pub fn new(kind: TerminalTabKind, title: impl Into<String>, created_at: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            pane_id: uuid::Uuid::new_v4().to_string(),
            kind,
            title: title.into(),
            provider_id: None,
            created_at,
        }
    }

    /// The `chat` tab a workspace falls back to when its last tab closes
    pub fn default_chat(created_at: u64) -> Self {
        Self::new(TerminalTabKind::Chat, DEFAULT_TAB_TITLE, created_at)
    }

    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    /// Fill in `default_provider_id` from `config` when no provider was chosen
    pub fn with_default_provider(mut self, config: &Config) -> Self {
        if self.provider_id.is_none() {
            self.provider_id = config.default_provider_id.clone();
        }
        self
    }
}

/// One logical terminal owning a pane tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalTab {
    pub id: TerminalTabId,
    #[serde(default)]
    pub kind: TerminalTabKind,
    pub title: String,
    /// Set by a user rename; automatic renames are ignored while set
    #[serde(default)]
    pub title_locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub session_state: SessionSummary,
    pub pane_tree: PaneNode,
    pub active_pane_id: PaneId,
    pub pane_states: BTreeMap<PaneId, PaneRuntimeState>,
    #[serde(default)]
    pub status: TabStatus,
    #[serde(default)]
    pub has_unsaved_changes: bool,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
}

impl TerminalTab {
    /// Create a tab with a single pane in `project_path`
    pub fn new(seed: TerminalTabSeed, project_path: Option<&str>) -> Self {
        let state = PaneRuntimeState::fresh(seed.provider_id.clone(), project_path.map(str::to_string));
        let mut pane_states = BTreeMap::new();
        pane_states.insert(seed.pane_id.clone(), state);

        let mut tab = Self {
            id: seed.id,
            kind: seed.kind,
            title: seed.title,
            title_locked: false,
            provider_id: seed.provider_id,
            session_state: SessionSummary::default(),
            pane_tree: PaneNode::leaf(seed.pane_id.clone()),
            active_pane_id: seed.pane_id,
            pane_states,
            status: TabStatus::Idle,
            has_unsaved_changes: false,
            created_at: seed.created_at,
            updated_at: seed.created_at,
        };
        tab.sync_session_state();
        tab
    }

    /// Runtime state of the active pane
    pub fn active_pane_state(&self) -> Option<&PaneRuntimeState> {
        self.pane_states.get(&self.active_pane_id)
    }

    /// Refresh `session_state` from the active pane
    pub fn sync_session_state(&mut self) {
        let summary = self
            .active_pane_state()
            .map(SessionSummary::from_pane)
            .unwrap_or_default();
        self.session_state = summary;
    }

    /// Addresses of every leaf in this tab
    pub fn pane_addresses(&self, workspace_id: &WorkspaceId) -> Vec<PaneAddress> {
        self.pane_tree
            .leaf_ids()
            .into_iter()
            .map(|pane_id| PaneAddress::new(workspace_id.clone(), self.id.clone(), pane_id))
            .collect()
    }

    /// Rename the tab. Automatic renames lose against a user-locked title.
    ///
    /// Returns true if the title changed.
    pub fn rename(&mut self, title: &str, locked_by_user: bool) -> bool {
        if !locked_by_user && self.title_locked {
            log::debug!("Ignoring automatic rename of locked tab {}", self.id);
            return false;
        }
        let changed = self.title != title || (locked_by_user && !self.title_locked);
        self.title = title.to_string();
        if locked_by_user {
            self.title_locked = true;
        }
        changed
    }

    /// Check the tree against the pane-state map and the active pane.
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(dup) = self.pane_tree.duplicate_id() {
            return Err(format!("tab {} has duplicate pane node id {}", self.id, dup));
        }
        let leaves = self.pane_tree.leaf_ids();
        for leaf in &leaves {
            if !self.pane_states.contains_key(leaf) {
                return Err(format!("tab {} leaf {} has no pane state", self.id, leaf));
            }
        }
        if self.pane_states.len() != leaves.len() {
            let orphan = self
                .pane_states
                .keys()
                .find(|key| !leaves.contains(key))
                .cloned()
                .unwrap_or_default();
            return Err(format!("tab {} has pane state {} without a leaf", self.id, orphan));
        }
        if !self.pane_tree.contains_leaf(&self.active_pane_id) {
            return Err(format!(
                "tab {} active pane {} is not a leaf",
                self.id, self.active_pane_id
            ));
        }
        Ok(())
    }
}
