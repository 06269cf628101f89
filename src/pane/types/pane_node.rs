//! `PaneNode`: binary tree structure for arbitrary pane nesting.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::common::{PaneId, SplitDirection, clamp_ratio};

/// Tree node for pane layout
///
/// The pane tree is a binary tree where:
/// - Leaf nodes name one terminal session slot
/// - Split nodes contain two children with a split direction and ratio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum PaneNode {
    /// A leaf node hosting one terminal session
    Leaf {
        id: PaneId,
        /// Slot the live session is bound to (stable across splits of siblings)
        session_slot_id: String,
    },
    /// A split containing two child nodes
    Split {
        id: PaneId,
        /// Direction of the split
        direction: SplitDirection,
        /// Split ratio (0.1 to 0.9): share of the left/top child
        ratio: f32,
        /// First child (top for horizontal, left for vertical)
        left: Box<PaneNode>,
        /// Second child (bottom for horizontal, right for vertical)
        right: Box<PaneNode>,
    },
}

/// Outcome of removing a leaf from a tree
#[derive(Debug)]
pub enum RemoveResult {
    /// Leaf not present; the tree is handed back untouched
    NotFound(PaneNode),
    /// Leaf removed. `tree` is `None` when the removed leaf was the root.
    Removed {
        tree: Option<PaneNode>,
        /// First leaf of the sibling subtree that took the parent's place
        promoted_leaf: Option<PaneId>,
    },
}

impl PaneNode {
    /// Create a leaf whose session slot shares the pane id
    pub fn leaf(id: impl Into<PaneId>) -> Self {
        let id = id.into();
        PaneNode::Leaf {
            session_slot_id: id.clone(),
            id,
        }
    }

    /// Create a new split node
    pub fn split(
        id: impl Into<PaneId>,
        direction: SplitDirection,
        ratio: f32,
        left: PaneNode,
        right: PaneNode,
    ) -> Self {
        PaneNode::Split {
            id: id.into(),
            direction,
            ratio: clamp_ratio(ratio), // Enforce minimum pane size
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Id of this node
    pub fn id(&self) -> &PaneId {
        match self {
            PaneNode::Leaf { id, .. } | PaneNode::Split { id, .. } => id,
        }
    }

    /// Check if this is a leaf node
    pub fn is_leaf(&self) -> bool {
        matches!(self, PaneNode::Leaf { .. })
    }

    /// Find a leaf by id (recursive)
    pub fn find_leaf(&self, target: &str) -> Option<&PaneNode> {
        match self {
            PaneNode::Leaf { id, .. } => (id == target).then_some(self),
            PaneNode::Split { left, right, .. } => {
                left.find_leaf(target).or_else(|| right.find_leaf(target))
            }
        }
    }

    /// Whether a leaf with this id exists in the subtree
    pub fn contains_leaf(&self, target: &str) -> bool {
        self.find_leaf(target).is_some()
    }

    /// All leaf ids in this subtree, left to right
    pub fn leaf_ids(&self) -> Vec<PaneId> {
        match self {
            PaneNode::Leaf { id, .. } => vec![id.clone()],
            PaneNode::Split { left, right, .. } => {
                let mut ids = left.leaf_ids();
                ids.extend(right.leaf_ids());
                ids
            }
        }
    }

    /// All node ids (splits and leaves), pre-order
    pub fn node_ids(&self) -> Vec<PaneId> {
        let mut ids = vec![self.id().clone()];
        if let PaneNode::Split { left, right, .. } = self {
            ids.extend(left.node_ids());
            ids.extend(right.node_ids());
        }
        ids
    }

    /// Count total number of leaves
    pub fn pane_count(&self) -> usize {
        match self {
            PaneNode::Leaf { .. } => 1,
            PaneNode::Split { left, right, .. } => left.pane_count() + right.pane_count(),
        }
    }

    /// Leftmost leaf id of this subtree
    pub fn first_leaf_id(&self) -> &PaneId {
        match self {
            PaneNode::Leaf { id, .. } => id,
            PaneNode::Split { left, .. } => left.first_leaf_id(),
        }
    }

    /// Replace the leaf `target` by a 50/50 split of two new leaves.
    ///
    /// Returns false (tree unchanged) when `target` is not a leaf of this tree.
    pub fn split_leaf(
        &mut self,
        target: &str,
        split_id: PaneId,
        direction: SplitDirection,
        left_id: PaneId,
        right_id: PaneId,
    ) -> bool {
        match self {
            PaneNode::Leaf { id, .. } if id == target => {
                *self = PaneNode::split(
                    split_id,
                    direction,
                    0.5, // 50/50 split
                    PaneNode::leaf(left_id),
                    PaneNode::leaf(right_id),
                );
                true
            }
            PaneNode::Leaf { .. } => false,
            PaneNode::Split { left, right, .. } => {
                if left.contains_leaf(target) {
                    left.split_leaf(target, split_id, direction, left_id, right_id)
                } else {
                    right.split_leaf(target, split_id, direction, left_id, right_id)
                }
            }
        }
    }

    /// Remove a leaf, promoting its sibling subtree into the parent's place
    pub fn remove_leaf(self, target: &str) -> RemoveResult {
        match self {
            PaneNode::Leaf { .. } => {
                if self.id() == target {
                    RemoveResult::Removed {
                        tree: None,
                        promoted_leaf: None,
                    }
                } else {
                    RemoveResult::NotFound(self)
                }
            }
            PaneNode::Split {
                id,
                direction,
                ratio,
                left,
                right,
            } => match left.remove_leaf(target) {
                RemoveResult::Removed { tree: None, .. } => {
                    // Left child was the target; the right child takes this split's place
                    let promoted_leaf = Some(right.first_leaf_id().clone());
                    RemoveResult::Removed {
                        tree: Some(*right),
                        promoted_leaf,
                    }
                }
                RemoveResult::Removed {
                    tree: Some(new_left),
                    promoted_leaf,
                } => RemoveResult::Removed {
                    tree: Some(PaneNode::Split {
                        id,
                        direction,
                        ratio,
                        left: Box::new(new_left),
                        right,
                    }),
                    promoted_leaf,
                },
                RemoveResult::NotFound(left_node) => match right.remove_leaf(target) {
                    RemoveResult::Removed { tree: None, .. } => {
                        let promoted_leaf = Some(left_node.first_leaf_id().clone());
                        RemoveResult::Removed {
                            tree: Some(left_node),
                            promoted_leaf,
                        }
                    }
                    RemoveResult::Removed {
                        tree: Some(new_right),
                        promoted_leaf,
                    } => RemoveResult::Removed {
                        tree: Some(PaneNode::Split {
                            id,
                            direction,
                            ratio,
                            left: Box::new(left_node),
                            right: Box::new(new_right),
                        }),
                        promoted_leaf,
                    },
                    RemoveResult::NotFound(right_node) => RemoveResult::NotFound(PaneNode::Split {
                        id,
                        direction,
                        ratio,
                        left: Box::new(left_node),
                        right: Box::new(right_node),
                    }),
                },
            },
        }
    }

    /// Set the ratio of split `target`; returns false if no such split exists
    pub fn set_ratio(&mut self, target: &str, new_ratio: f32) -> bool {
        match self {
            PaneNode::Leaf { .. } => false,
            PaneNode::Split {
                id,
                ratio,
                left,
                right,
                ..
            } => {
                if id == target {
                    *ratio = clamp_ratio(new_ratio);
                    true
                } else {
                    left.set_ratio(target, new_ratio) || right.set_ratio(target, new_ratio)
                }
            }
        }
    }

    /// Clamp every ratio in the subtree into range
    pub fn clamp_ratios(&mut self) {
        if let PaneNode::Split {
            ratio, left, right, ..
        } = self
        {
            *ratio = clamp_ratio(*ratio);
            left.clamp_ratios();
            right.clamp_ratios();
        }
    }

    /// First duplicated node id in the subtree, if any
    pub fn duplicate_id(&self) -> Option<PaneId> {
        let mut seen = HashSet::new();
        self.node_ids().into_iter().find(|id| !seen.insert(id.clone()))
    }
}
