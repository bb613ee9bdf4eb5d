//! The immutable snapshot façade: a read-only handle over a published
//! root, structurally shared with whatever map produced it.

use std::fmt;
use std::sync::Arc;

use crate::map::{EqPredicate, PrefixMap};
use crate::trie::diff::{diff, DiffEvent};
use crate::trie::{self, EqFn, Root};
use crate::types::errors::PrefixStoreError;
use crate::types::match_options::Match;
use crate::types::prefix::{IntoPrefix, Ipv4Net};

/// An immutable, freely-shareable snapshot of a [`PrefixMap`](crate::map::PrefixMap)'s
/// trie at some point in time. No node reachable from a snapshot is ever
/// mutated in place, so it's safe to hand to other threads.
pub struct PrefixMapSnapshot<V> {
    root: Root<V>,
    eq: EqPredicate<V>,
}

impl<V> PrefixMapSnapshot<V> {
    pub(crate) fn from_parts(root: Root<V>, eq: EqPredicate<V>) -> Self {
        PrefixMapSnapshot { root, eq }
    }

    fn eq_fn(&self) -> EqFn<V> {
        &*self.eq
    }

    /// Number of active prefixes.
    pub fn size(&self) -> usize {
        trie::size(&self.root)
    }

    /// Exact-prefix lookup.
    pub fn get(&self, key: impl IntoPrefix) -> Option<V>
    where
        V: Clone,
    {
        let m = trie::longest_match(&self.root, &key.into_prefix());
        if m.kind.is_exact() {
            m.value.cloned()
        } else {
            None
        }
    }

    /// The deepest active ancestor of `key`.
    pub fn longest_match(&self, key: impl IntoPrefix) -> Option<(Ipv4Net, V, Match)>
    where
        V: Clone,
    {
        let m = trie::longest_match(&self.root, &key.into_prefix());
        let prefix = m.prefix?;
        let value = m.value.cloned()?;
        Some((prefix, value, m.kind))
    }

    /// Visit every active prefix in lexicographic order.
    pub fn walk(&self, mut callback: impl FnMut(&Ipv4Net, &V) -> bool) -> bool {
        trie::walk(&self.root, &mut callback)
    }

    /// The minimal trie preserving every address's `longest_match` answer.
    pub fn aggregate(&self) -> PrefixMapSnapshot<V>
    where
        V: Clone,
    {
        let aggregated = trie::aggregate::aggregate(&self.root, self.eq_fn());
        PrefixMapSnapshot { root: aggregated, eq: self.eq.clone() }
    }

    /// Diff this snapshot against `other`, invoking `handler` once per
    /// difference in lexicographic order. Returns `false` if `handler`
    /// short-circuited the traversal.
    pub fn diff(&self, other: &PrefixMapSnapshot<V>, handler: impl FnMut(DiffEvent<V>) -> bool) -> bool {
        let mut handler = handler;
        diff(&self.root, &other.root, self.eq_fn(), &mut handler)
    }

    /// A writable map sharing this snapshot's root; cheap, no copy.
    pub fn to_mutable(&self) -> PrefixMap<V> {
        PrefixMap::from_parts(self.root.clone(), self.eq.clone(), true)
    }

    /// Structural equality, through `self`'s value-equality predicate.
    pub fn equals(&self, other: &PrefixMapSnapshot<V>) -> bool {
        trie::equal(&self.root, &other.root, self.eq_fn())
    }
}

impl<V> Clone for PrefixMapSnapshot<V> {
    fn clone(&self) -> Self {
        PrefixMapSnapshot { root: self.root.clone(), eq: self.eq.clone() }
    }
}

impl<V: PartialEq> Default for PrefixMapSnapshot<V> {
    /// An empty snapshot, comparing values with `PartialEq`.
    fn default() -> Self {
        PrefixMapSnapshot { root: None, eq: Arc::new(|a, b| a == b) }
    }
}

impl<V: fmt::Debug> fmt::Debug for PrefixMapSnapshot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut m = f.debug_map();
        self.walk(|prefix, value| {
            m.entry(prefix, value);
            true
        });
        m.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::PrefixMap;
    use std::net::Ipv4Addr;

    fn p(a: u8, b: u8, c: u8, d: u8, len: u8) -> Ipv4Net {
        Ipv4Net::new(Ipv4Addr::new(a, b, c, d), len).unwrap()
    }

    #[test]
    fn aggregate_collapses_covered_children() {
        let map: PrefixMap<bool> = PrefixMap::new();
        map.insert(p(10, 224, 24, 2, 31), true).unwrap();
        map.insert(p(10, 224, 24, 1, 32), true).unwrap();
        map.insert(p(10, 224, 24, 0, 32), true).unwrap();
        let aggregated = map.snapshot().aggregate();
        let mut seen = Vec::new();
        aggregated.walk(|prefix, _| {
            seen.push(*prefix);
            true
        });
        assert_eq!(seen, vec![p(10, 224, 24, 0, 30)]);
    }

    #[test]
    fn diff_reports_modified_removed_added_in_order() {
        let a: PrefixMap<bool> = PrefixMap::new();
        a.insert(p(203, 0, 113, 0, 27), true).unwrap();
        a.insert(p(203, 0, 113, 64, 27), true).unwrap();
        a.insert(p(203, 0, 113, 0, 25), true).unwrap();

        let b: PrefixMap<bool> = PrefixMap::new();
        b.insert(p(203, 0, 113, 0, 27), true).unwrap();
        b.insert(p(203, 0, 113, 96, 27), true).unwrap();
        b.insert(p(203, 0, 113, 0, 25), false).unwrap();

        let mut events = Vec::new();
        a.snapshot().diff(&b.snapshot(), |event| {
            let label = match event {
                DiffEvent::Removed(p, _) => format!("Removed({p})"),
                DiffEvent::Added(p, _) => format!("Added({p})"),
                DiffEvent::Modified(p, _, _) => format!("Modified({p})"),
            };
            events.push(label);
            true
        });
        assert_eq!(
            events,
            vec![
                "Modified(203.0.113.0/25)".to_string(),
                "Removed(203.0.113.64/27)".to_string(),
                "Added(203.0.113.96/27)".to_string(),
            ]
        );
    }
}
