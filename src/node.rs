//! The persistent, path-compressed binary radix trie node. This is the core
//! the rest of the crate builds on: every "mutation" here returns a new
//! node, sharing untouched children with whatever root published it.

use std::sync::Arc;

use crate::types::errors::{fatal, FatalError};
use crate::types::prefix::Ipv4Net;
use crate::types::stats::NodeStats;

/// A node in the trie: either an *active* entry (a user-inserted prefix
/// carrying a value) or an *internal* split point (no value, existing only
/// to fork two disjoint children at their common prefix).
///
/// Nodes are immutable once reachable from a published root — every field
/// is set at construction time and never changed in place.
pub struct Node<V> {
    pub prefix: Ipv4Net,
    pub active: bool,
    pub value: Option<V>,
    pub children: [Option<Arc<Node<V>>>; 2],
    pub stats: NodeStats,
}

impl<V> Node<V> {
    /// A fresh active leaf with no children.
    pub(crate) fn leaf(prefix: Ipv4Net, value: V) -> Arc<Node<V>> {
        Arc::new(Node {
            prefix,
            active: true,
            value: Some(value),
            children: [None, None],
            stats: NodeStats::leaf(),
        })
    }

    /// An inactive split node with both children present.
    pub(crate) fn fork(
        prefix: Ipv4Net,
        children: [Arc<Node<V>>; 2],
    ) -> Arc<Node<V>> {
        let stats = NodeStats::combine(
            false,
            [Some(&children[0].stats), Some(&children[1].stats)],
        );
        let [a, b] = children;
        Arc::new(Node {
            prefix,
            active: false,
            value: None,
            children: [Some(a), Some(b)],
            stats,
        })
    }

    /// A fresh active node at `prefix` carrying `value`, with a single
    /// child at index `i`. Used when inserting a prefix that contains an
    /// existing, narrower node.
    pub(crate) fn active_with_child(
        prefix: Ipv4Net,
        value: V,
        i: usize,
        child: Arc<Node<V>>,
    ) -> Arc<Node<V>> {
        let mut children: [Option<Arc<Node<V>>>; 2] = [None, None];
        let stats = NodeStats::combine(true, {
            let mut s = [None, None];
            s[i] = Some(&child.stats);
            s
        });
        children[i] = Some(child);
        Arc::new(Node { prefix, active: true, value: Some(value), children, stats })
    }

    /// Rebuild this node with a new child at index `i`, recomputing cached
    /// stats. The other child (if any) is shared, not cloned.
    pub(crate) fn with_child(&self, i: usize, child: Arc<Node<V>>) -> Arc<Node<V>>
    where
        V: Clone,
    {
        let mut children = self.children.clone();
        children[i] = Some(child);
        let stats = NodeStats::combine(
            self.active,
            [children[0].as_ref().map(|n| &n.stats), children[1].as_ref().map(|n| &n.stats)],
        );
        Arc::new(Node {
            prefix: self.prefix,
            active: self.active,
            value: self.value.clone(),
            children,
            stats,
        })
    }

    /// Rebuild this node with child `i` removed entirely.
    pub(crate) fn without_child(&self, i: usize) -> Arc<Node<V>>
    where
        V: Clone,
    {
        let mut children = self.children.clone();
        children[i] = None;
        let stats = NodeStats::combine(
            self.active,
            [children[0].as_ref().map(|n| &n.stats), children[1].as_ref().map(|n| &n.stats)],
        );
        Arc::new(Node {
            prefix: self.prefix,
            active: self.active,
            value: self.value.clone(),
            children,
            stats,
        })
    }

    /// Rebuild this node, active with `value`, preserving children.
    pub(crate) fn activated(&self, value: V) -> Arc<Node<V>>
    where
        V: Clone,
    {
        let stats = NodeStats::combine(
            true,
            [self.children[0].as_ref().map(|n| &n.stats), self.children[1].as_ref().map(|n| &n.stats)],
        );
        Arc::new(Node {
            prefix: self.prefix,
            active: true,
            value: Some(value),
            children: self.children.clone(),
            stats,
        })
    }

    /// Rebuild this node, inactive, dropping its value but preserving
    /// children.
    pub(crate) fn deactivated(&self) -> Arc<Node<V>>
    where
        V: Clone,
    {
        let stats = NodeStats::combine(
            false,
            [self.children[0].as_ref().map(|n| &n.stats), self.children[1].as_ref().map(|n| &n.stats)],
        );
        Arc::new(Node {
            prefix: self.prefix,
            active: false,
            value: None,
            children: self.children.clone(),
            stats,
        })
    }

    /// Build a node from scratch with arbitrary active/value/children,
    /// recomputing stats. Used by algorithms (aggregation, set algebra)
    /// that construct nodes that don't fit the other constructors' shapes.
    ///
    /// An inactive node with exactly one child is never a valid shape — it
    /// should have been flattened to that one child already. Any caller
    /// that reaches this with a malformed pair has a bug upstream, so this
    /// aborts rather than silently publishing a corrupt tree.
    pub(crate) fn build(
        prefix: Ipv4Net,
        active: bool,
        value: Option<V>,
        children: [Option<Arc<Node<V>>>; 2],
    ) -> Arc<Node<V>> {
        if !active && children[0].is_some() != children[1].is_some() {
            fatal(FatalError::INVARIANT);
        }
        let stats = NodeStats::combine(
            active,
            [children[0].as_ref().map(|n| &n.stats), children[1].as_ref().map(|n| &n.stats)],
        );
        Arc::new(Node { prefix, active, value, children, stats })
    }

    /// `true` if this node has no children at all.
    pub(crate) fn is_leaf(&self) -> bool {
        self.children[0].is_none() && self.children[1].is_none()
    }

    /// The single remaining child, if this inactive node has exactly one.
    pub(crate) fn only_child(&self) -> Option<&Arc<Node<V>>> {
        match (&self.children[0], &self.children[1]) {
            (Some(c), None) | (None, Some(c)) => Some(c),
            _ => None,
        }
    }

    /// Recompute stats from scratch, recursively. Used only by property
    /// tests to check the cache never drifts from a fresh computation;
    /// never called on the hot path.
    #[cfg(test)]
    pub(crate) fn recompute_stats_for_test(&self) -> NodeStats {
        let child_stats: Vec<NodeStats> = self
            .children
            .iter()
            .flatten()
            .map(|c| c.recompute_stats_for_test())
            .collect();
        NodeStats::combine(
            self.active,
            [child_stats.first(), child_stats.get(1)],
        )
    }
}

impl<V: Clone> Clone for Node<V> {
    fn clone(&self) -> Self {
        Node {
            prefix: self.prefix,
            active: self.active,
            value: self.value.clone(),
            children: self.children.clone(),
            stats: self.stats,
        }
    }
}
