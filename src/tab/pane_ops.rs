//! Pane operations on a single terminal tab.
//!
//! Every method returns whether it changed anything so the reducer can hand
//! back the previous state untouched for stale targets.

use crate::pane::{PaneId, PaneRuntimeState, PaneStatePatch, RemoveResult, SplitDirection};

use super::TerminalTab;

/// Fresh node ids for a split, generated outside the reducer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIds {
    pub split_id: PaneId,
    pub left_id: PaneId,
    pub right_id: PaneId,
}

impl SplitIds {
    pub fn generate() -> Self {
        Self {
            split_id: uuid::Uuid::new_v4().to_string(),
            left_id: uuid::Uuid::new_v4().to_string(),
            right_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Result of closing a pane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosePaneOutcome {
    /// No such leaf
    NotFound,
    /// Pane removed; the tab still has panes
    Closed,
    /// The pane was the last leaf; the caller must close the tab
    LastPane,
}

impl TerminalTab {
    /// Turn leaf `pane_id` into a split of two fresh leaves.
    ///
    /// The left child inherits the old runtime state, the right child starts
    /// fresh and becomes active.
    pub fn split_pane(&mut self, pane_id: &str, direction: SplitDirection, ids: &SplitIds) -> bool {
        if !self.pane_tree.contains_leaf(pane_id) {
            return false;
        }
        let existing = self.pane_tree.node_ids();
        if [&ids.split_id, &ids.left_id, &ids.right_id]
            .iter()
            .any(|id| existing.contains(id))
            || ids.left_id == ids.right_id
            || ids.split_id == ids.left_id
            || ids.split_id == ids.right_id
        {
            log::warn!("Refusing split of {} with colliding node ids", pane_id);
            return false;
        }

        let inherited = self.pane_states.remove(pane_id).unwrap_or_default();
        let fresh = PaneRuntimeState::fresh(inherited.provider_id.clone(), inherited.project_path.clone());

        self.pane_tree.split_leaf(
            pane_id,
            ids.split_id.clone(),
            direction,
            ids.left_id.clone(),
            ids.right_id.clone(),
        );
        self.pane_states.insert(ids.left_id.clone(), inherited);
        self.pane_states.insert(ids.right_id.clone(), fresh);
        self.active_pane_id = ids.right_id.clone();
        self.has_unsaved_changes = true;
        self.sync_session_state();
        true
    }

    /// Remove leaf `pane_id`, promoting its sibling
    pub fn close_pane(&mut self, pane_id: &str) -> ClosePaneOutcome {
        if !self.pane_tree.contains_leaf(pane_id) {
            return ClosePaneOutcome::NotFound;
        }
        if self.pane_tree.pane_count() == 1 {
            return ClosePaneOutcome::LastPane;
        }

        let tree = std::mem::replace(&mut self.pane_tree, crate::pane::PaneNode::leaf(String::new()));
        match tree.remove_leaf(pane_id) {
            RemoveResult::Removed {
                tree: Some(tree),
                promoted_leaf,
            } => {
                self.pane_tree = tree;
                self.pane_states.remove(pane_id);
                if self.active_pane_id == pane_id {
                    self.active_pane_id = promoted_leaf
                        .unwrap_or_else(|| self.pane_tree.first_leaf_id().clone());
                }
                self.has_unsaved_changes = true;
                self.sync_session_state();
                ClosePaneOutcome::Closed
            }
            RemoveResult::Removed { tree: None, .. } => ClosePaneOutcome::LastPane,
            RemoveResult::NotFound(tree) => {
                self.pane_tree = tree;
                ClosePaneOutcome::NotFound
            }
        }
    }

    /// Make `pane_id` the active pane if it is a leaf of this tab
    pub fn activate_pane(&mut self, pane_id: &str) -> bool {
        if !self.pane_tree.contains_leaf(pane_id) {
            return false;
        }
        self.active_pane_id = pane_id.to_string();
        self.sync_session_state();
        true
    }

    /// Shallow-merge `patch` into the runtime state of `pane_id`
    pub fn update_pane_state(&mut self, pane_id: &str, patch: &PaneStatePatch) -> bool {
        let Some(state) = self.pane_states.get_mut(pane_id) else {
            return false;
        };
        patch.apply(state);
        if self.active_pane_id == pane_id {
            self.sync_session_state();
        }
        true
    }

    /// Set the ratio of split `split_id` (clamped)
    pub fn resize_split(&mut self, split_id: &str, ratio: f32) -> bool {
        self.pane_tree.set_ratio(split_id, ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pane::RestorePreference;
    use crate::tab::{TerminalTabKind, TerminalTabSeed};

    fn tab() -> TerminalTab {
        let seed = TerminalTabSeed {
            id: "t1".into(),
            pane_id: "p1".into(),
            kind: TerminalTabKind::Chat,
            title: "Chat".into(),
            provider_id: Some("claude".into()),
            created_at: 10,
        };
        TerminalTab::new(seed, Some("/proj"))
    }

    fn ids(split: &str, left: &str, right: &str) -> SplitIds {
        SplitIds {
            split_id: split.into(),
            left_id: left.into(),
            right_id: right.into(),
        }
    }

    #[test]
    fn test_split_copies_state_left_and_activates_right() {
        let mut tab = tab();
        tab.update_pane_state(
            "p1",
            &PaneStatePatch::default()
                .session_id("s1")
                .restore_preference(RestorePreference::ResumeLatest),
        );

        assert!(tab.split_pane("p1", SplitDirection::Vertical, &ids("s", "l", "r")));
        assert_eq!(tab.active_pane_id, "r");
        assert!(!tab.pane_states.contains_key("p1"));
        assert_eq!(tab.pane_states["l"].session_id.as_deref(), Some("s1"));
        assert_eq!(tab.pane_states["r"].session_id, None);
        assert_eq!(tab.pane_states["r"].project_path.as_deref(), Some("/proj"));
        assert_eq!(tab.pane_states["r"].provider_id.as_deref(), Some("claude"));
        assert!(tab.has_unsaved_changes);
        assert!(tab.validate().is_ok());
    }

    #[test]
    fn test_split_rejects_colliding_ids() {
        let mut tab = tab();
        assert!(!tab.split_pane("p1", SplitDirection::Vertical, &ids("s", "p1", "r")));
        assert!(!tab.split_pane("p1", SplitDirection::Vertical, &ids("s", "x", "x")));
        assert_eq!(tab.pane_tree.pane_count(), 1);
    }

    #[test]
    fn test_close_active_pane_promotes_sibling() {
        let mut tab = tab();
        tab.split_pane("p1", SplitDirection::Vertical, &ids("s", "l", "r"));
        tab.split_pane("l", SplitDirection::Horizontal, &ids("s2", "l1", "l2"));
        tab.activate_pane("r");

        assert_eq!(tab.close_pane("r"), ClosePaneOutcome::Closed);
        assert_eq!(tab.active_pane_id, "l1");
        assert!(tab.validate().is_ok());
        assert_eq!(tab.close_pane("zzz"), ClosePaneOutcome::NotFound);
    }

    #[test]
    fn test_close_last_pane_reports_last() {
        let mut tab = tab();
        assert_eq!(tab.close_pane("p1"), ClosePaneOutcome::LastPane);
        assert!(tab.pane_tree.contains_leaf("p1"));
    }

    #[test]
    fn test_update_active_pane_mirrors_summary() {
        let mut tab = tab();
        tab.update_pane_state("p1", &PaneStatePatch::default().embedded_terminal_id("h1"));
        assert!(tab.session_state.attached);
        assert!(!tab.update_pane_state("missing", &PaneStatePatch::default()));
    }

    #[test]
    fn test_rename_respects_lock() {
        let mut tab = tab();
        assert!(tab.rename("Mine", true));
        assert!(!tab.rename("auto title", false));
        assert_eq!(tab.title, "Mine");
        assert!(tab.rename("Renamed", true));
    }
}
