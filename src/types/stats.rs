//! Cached per-subtree statistics carried on every trie node, recomputed in
//! O(1) from a node's (possibly reused) children whenever a new node is
//! published.

use std::fmt;

/// Cached statistics for the subtree rooted at a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeStats {
    /// Number of active nodes in this subtree, including this node.
    pub active_count: u32,
    /// Max depth of this subtree; `1` for a node with no children.
    pub height: u32,
}

impl NodeStats {
    pub(crate) fn leaf() -> Self {
        NodeStats { active_count: 1, height: 1 }
    }

    /// Recompute a node's stats from `active` (whether the node itself is
    /// active) and the stats of whichever children it has.
    pub(crate) fn combine(active: bool, children: [Option<&NodeStats>; 2]) -> Self {
        let child_active: u32 =
            children.iter().flatten().map(|s| s.active_count).sum();
        let child_height = children.iter().flatten().map(|s| s.height).max();
        NodeStats {
            active_count: child_active + active as u32,
            height: match child_height {
                Some(h) => 1 + h,
                None => 1,
            },
        }
    }
}

impl fmt::Display for NodeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} active, height {}", self.active_count, self.height)
    }
}
