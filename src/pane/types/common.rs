//! Shared enums for the pane system.

use serde::{Deserialize, Serialize};

// Re-export identifier aliases from agent-deck-config for shared access across crates
pub use agent_deck_config::{HandleId, PaneId, TerminalTabId, WorkspaceId};

/// Smallest split ratio a divider may reach
pub const MIN_SPLIT_RATIO: f32 = 0.1;
/// Largest split ratio a divider may reach
pub const MAX_SPLIT_RATIO: f32 = 0.9;

/// Clamp a split ratio into the allowed range (NaN becomes an even split)
pub fn clamp_ratio(ratio: f32) -> f32 {
    if ratio.is_nan() {
        return 0.5;
    }
    ratio.clamp(MIN_SPLIT_RATIO, MAX_SPLIT_RATIO)
}

/// Direction of a split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitDirection {
    /// Panes are stacked vertically (split creates top/bottom panes)
    Horizontal,
    /// Panes are side by side (split creates left/right panes)
    Vertical,
}

/// Fully qualified location of a pane
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaneAddress {
    pub workspace_id: WorkspaceId,
    pub terminal_tab_id: TerminalTabId,
    pub pane_id: PaneId,
}

impl PaneAddress {
    pub fn new(
        workspace_id: impl Into<WorkspaceId>,
        terminal_tab_id: impl Into<TerminalTabId>,
        pane_id: impl Into<PaneId>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            terminal_tab_id: terminal_tab_id.into(),
            pane_id: pane_id.into(),
        }
    }
}

impl std::fmt::Display for PaneAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.workspace_id, self.terminal_tab_id, self.pane_id)
    }
}
