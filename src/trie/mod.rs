//! The value-map algorithms layered on top of [`crate::node::Node`]:
//! longest-prefix match, the four insert modes, flatten-aware delete,
//! get-or-insert, lexicographic walk, and structural equality.
//!
//! Everything here is a pure function from a root (and whatever else it
//! needs) to a new root; no function ever mutates a published [`Node`].

pub mod aggregate;
pub mod diff;
pub mod set_ops;

use std::sync::Arc;

use crate::node::Node;
use crate::types::errors::PrefixStoreError;
use crate::types::match_options::{Match, MatchResult};
use crate::types::prefix::{compare, Comparison, Ipv4Net};
use crate::types::range::Range;

/// A trie root: `None` is the empty trie.
pub(crate) type Root<V> = Option<Arc<Node<V>>>;

/// A value-equality predicate, used by flatten-insert (to merge sibling
/// pairs), [`diff`](diff::diff), and [`aggregate`](aggregate::aggregate).
/// Defaults to `PartialEq` at the façade layer; callers may supply anything
/// else here (needed for payloads that are themselves sets or otherwise
/// don't have a meaningful derived `Eq`).
pub(crate) type EqFn<'a, V> = &'a dyn Fn(&V, &V) -> bool;

/// Which of the four effective insert operations to run: strict insert,
/// strict update, upsert, or flatten-on-conflict set insert.
#[derive(Clone, Copy)]
pub(crate) struct InsertFlags {
    pub insert: bool,
    pub update: bool,
    pub flatten: bool,
}

impl InsertFlags {
    pub const STRICT_INSERT: Self = Self { insert: true, update: false, flatten: false };
    pub const STRICT_UPDATE: Self = Self { insert: false, update: true, flatten: false };
    pub const UPSERT: Self = Self { insert: true, update: true, flatten: false };
    pub const SET_INSERT: Self = Self { insert: true, update: true, flatten: true };
}

/// Insert `key` into `root` under the given flags. Returns the new root and
/// the previous value at `key`, if any (always `None` for a fresh insert).
pub(crate) fn insert<V: Clone>(
    root: &Root<V>,
    key: Ipv4Net,
    value: V,
    flags: InsertFlags,
    eq: EqFn<V>,
) -> Result<(Arc<Node<V>>, Option<V>), PrefixStoreError> {
    match root {
        None => {
            if flags.insert {
                Ok((Node::leaf(key, value), None))
            } else {
                Err(PrefixStoreError::NotFound)
            }
        }
        Some(node) => insert_at(node, key, value, flags, eq),
    }
}

fn insert_at<V: Clone>(
    node: &Arc<Node<V>>,
    key: Ipv4Net,
    value: V,
    flags: InsertFlags,
    eq: EqFn<V>,
) -> Result<(Arc<Node<V>>, Option<V>), PrefixStoreError> {
    let cmp = compare(&node.prefix, &key);
    match cmp.result {
        Comparison::Same => {
            if node.active {
                if !flags.update {
                    return Err(PrefixStoreError::AlreadyExists);
                }
                let old = node.value.clone();
                Ok((node.activated(value), old))
            } else {
                if !flags.insert {
                    return Err(PrefixStoreError::NotFound);
                }
                Ok((node.activated(value), None))
            }
        }
        Comparison::AContainsB => {
            let i = key.bit_at(node.prefix.len()) as usize;
            let (rebuilt, old) = match &node.children[i] {
                Some(child) => {
                    let (new_child, old) = insert_at(child, key, value, flags, eq)?;
                    (node.with_child(i, new_child), old)
                }
                None => {
                    if !flags.insert {
                        return Err(PrefixStoreError::NotFound);
                    }
                    (node.with_child(i, Node::leaf(key, value)), None)
                }
            };
            let rebuilt = if flags.flatten { maybe_flatten(rebuilt, eq) } else { rebuilt };
            Ok((rebuilt, old))
        }
        Comparison::BContainsA => {
            if !flags.insert {
                return Err(PrefixStoreError::NotFound);
            }
            let i = node.prefix.bit_at(key.len()) as usize;
            Ok((Node::active_with_child(key, value, i, node.clone()), None))
        }
        Comparison::Disjoint => {
            if !flags.insert {
                return Err(PrefixStoreError::NotFound);
            }
            let common_prefix = Ipv4Net::from_bits(key.addr_bits(), cmp.common);
            let leaf = Node::leaf(key, value);
            let i = key.bit_at(cmp.common) as usize;
            let mut children = [node.clone(), leaf];
            if i == 0 {
                children.swap(0, 1);
            }
            Ok((Node::fork(common_prefix, children), None))
        }
    }
}

/// After a flatten-mode insert rebuilds `node`, collapse it if it is now an
/// inactive split with two active children exactly one bit longer than
/// itself, and those children carry equal values. Never applied to an
/// active node (an active parent is never split during flatten-insert).
fn maybe_flatten<V: Clone>(node: Arc<Node<V>>, eq: EqFn<V>) -> Arc<Node<V>> {
    if node.active {
        return node;
    }
    let child_len = node.prefix.len() + 1;
    match (&node.children[0], &node.children[1]) {
        (Some(l), Some(r))
            if l.active
                && r.active
                && l.prefix.len() == child_len
                && r.prefix.len() == child_len =>
        {
            match (&l.value, &r.value) {
                (Some(lv), Some(rv)) if eq(lv, rv) => {
                    node.activated(lv.clone())
                }
                _ => node,
            }
        }
        _ => node,
    }
}

/// Delete `key` from `root`. In flatten mode this may split an active
/// containing prefix into its remaining sub-ranges; in strict mode it
/// fails if `key` isn't active.
pub(crate) fn delete<V: Clone>(
    root: &Root<V>,
    key: Ipv4Net,
    flatten: bool,
    eq: EqFn<V>,
) -> Result<(Root<V>, Option<V>), PrefixStoreError> {
    match root {
        None => {
            if flatten {
                Ok((None, None))
            } else {
                Err(PrefixStoreError::NotFound)
            }
        }
        Some(node) => delete_at(node, key, flatten, eq),
    }
}

fn delete_at<V: Clone>(
    node: &Arc<Node<V>>,
    key: Ipv4Net,
    flatten: bool,
    eq: EqFn<V>,
) -> Result<(Root<V>, Option<V>), PrefixStoreError> {
    let cmp = compare(&node.prefix, &key);
    match cmp.result {
        Comparison::Same => {
            if flatten {
                return Ok((None, node.value.clone()));
            }
            if !node.active {
                return Err(PrefixStoreError::NotFound);
            }
            let removed = node.value.clone();
            let present: Vec<usize> =
                (0..2).filter(|&i| node.children[i].is_some()).collect();
            let new_root = match present.len() {
                0 => None,
                1 => node.children[present[0]].clone(),
                _ => Some(node.deactivated()),
            };
            Ok((new_root, removed))
        }
        Comparison::AContainsB => {
            if flatten && node.active {
                let value = node.value.clone().expect("active node has a value");
                let remaining = Range::of(&node.prefix).subtract(&Range::of(&key));
                let mut acc: Root<V> = None;
                for r in remaining {
                    for p in r.to_prefixes() {
                        let (new_acc, _) =
                            insert(&acc, p, value.clone(), InsertFlags::SET_INSERT, eq)?;
                        acc = Some(new_acc);
                    }
                }
                return Ok((acc, Some(value)));
            }
            let i = key.bit_at(node.prefix.len()) as usize;
            match &node.children[i] {
                None => {
                    if flatten {
                        Ok((Some(node.clone()), None))
                    } else {
                        Err(PrefixStoreError::NotFound)
                    }
                }
                Some(child) => {
                    let (new_child, removed) = delete_at(child, key, flatten, eq)?;
                    match new_child {
                        Some(nc) => Ok((Some(node.with_child(i, nc)), removed)),
                        None if !node.active => {
                            let other = 1 - i;
                            let promoted = node.children[other].clone();
                            Ok((promoted, removed))
                        }
                        None => Ok((Some(node.without_child(i)), removed)),
                    }
                }
            }
        }
        Comparison::BContainsA | Comparison::Disjoint => {
            if flatten {
                Ok((Some(node.clone()), None))
            } else {
                Err(PrefixStoreError::NotFound)
            }
        }
    }
}

/// Longest-prefix-match lookup: the deepest active ancestor of `key`, if
/// any.
pub(crate) fn longest_match<'v, V>(root: &'v Root<V>, key: &Ipv4Net) -> MatchResult<'v, V> {
    let mut cursor = root.as_ref();
    let mut best: Option<&Arc<Node<V>>> = None;
    loop {
        let node = match cursor {
            Some(n) => n,
            None => break,
        };
        if !node.prefix.contains(key) {
            break;
        }
        if node.active {
            best = Some(node);
        }
        if node.prefix.len() == key.len() {
            break;
        }
        let i = key.bit_at(node.prefix.len()) as usize;
        cursor = node.children[i].as_ref();
    }
    match best {
        None => MatchResult::none(),
        Some(node) => MatchResult {
            kind: if node.prefix.len() == key.len() { Match::Exact } else { Match::Contains },
            prefix: Some(node.prefix),
            value: node.value.as_ref(),
        },
    }
}

/// Search for an exact match; if absent, insert `default` (insert-or-update)
/// and return the new root plus a reference reachable through it.
pub(crate) fn get_or_insert<V: Clone>(
    root: &Root<V>,
    key: Ipv4Net,
    default: V,
    eq: EqFn<V>,
) -> Result<(Arc<Node<V>>, V), PrefixStoreError> {
    if let Some(node) = root {
        let m = longest_match(root, &key);
        if m.kind.is_exact() {
            return Ok((node.clone(), m.value.cloned().expect("exact match has a value")));
        }
    }
    let (new_root, _) = insert(root, key, default.clone(), InsertFlags::UPSERT, eq)?;
    Ok((new_root, default))
}

/// Pre-order, lexicographic walk: every active prefix, in the order a
/// containing prefix precedes anything it contains, and disjoint subtrees
/// are visited low address first. Stops early (returning `false`) if
/// `callback` does.
pub(crate) fn walk<V>(root: &Root<V>, callback: &mut dyn FnMut(&Ipv4Net, &V) -> bool) -> bool {
    match root {
        None => true,
        Some(node) => walk_node(node, callback),
    }
}

fn walk_node<V>(node: &Arc<Node<V>>, callback: &mut dyn FnMut(&Ipv4Net, &V) -> bool) -> bool {
    if node.active {
        let value = node.value.as_ref().expect("active node has a value");
        if !callback(&node.prefix, value) {
            return false;
        }
    }
    for child in node.children.iter().flatten() {
        if !walk_node(child, callback) {
            return false;
        }
    }
    true
}

/// Structural equality, routed through `eq` for payload comparison.
pub(crate) fn equal<V>(a: &Root<V>, b: &Root<V>, eq: EqFn<V>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => equal_node(x, y, eq),
        _ => false,
    }
}

fn equal_node<V>(a: &Arc<Node<V>>, b: &Arc<Node<V>>, eq: EqFn<V>) -> bool {
    if a.active != b.active || a.prefix != b.prefix {
        return false;
    }
    let values_equal = match (&a.value, &b.value) {
        (Some(av), Some(bv)) => eq(av, bv),
        (None, None) => true,
        _ => false,
    };
    if !values_equal {
        return false;
    }
    for i in 0..2 {
        match (&a.children[i], &b.children[i]) {
            (None, None) => {}
            (Some(ac), Some(bc)) => {
                if !equal_node(ac, bc, eq) {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}

/// Number of active nodes in the trie (the map's `size()`).
pub(crate) fn size<V>(root: &Root<V>) -> usize {
    root.as_ref().map_or(0, |n| n.stats.active_count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::net::Ipv4Addr;

    fn eq_u32(a: &u32, b: &u32) -> bool {
        a == b
    }

    fn arb_prefix() -> impl Strategy<Value = Ipv4Net> {
        (any::<u32>(), 0u8..=32).prop_map(|(addr, len)| Ipv4Net::from_bits(addr, len))
    }

    proptest! {
        #[test]
        fn cached_stats_never_drift(keys in prop::collection::vec(arb_prefix(), 0..40)) {
            let mut root: Root<u32> = None;
            for (i, key) in keys.into_iter().enumerate() {
                let (new_root, _) =
                    insert(&root, key, i as u32, InsertFlags::UPSERT, &eq_u32).unwrap();
                prop_assert_eq!(new_root.stats, new_root.recompute_stats_for_test());
                root = Some(new_root);
            }
        }

        #[test]
        fn longest_match_only_returns_a_covering_active_ancestor(
            keys in prop::collection::vec(arb_prefix(), 0..40),
            query in arb_prefix(),
        ) {
            let mut root: Root<u32> = None;
            for (i, key) in keys.into_iter().enumerate() {
                let (new_root, _) =
                    insert(&root, key, i as u32, InsertFlags::UPSERT, &eq_u32).unwrap();
                root = Some(new_root);
            }
            let m = longest_match(&root, &query);
            if let Some(prefix) = m.prefix {
                prop_assert!(prefix.contains(&query));
                prop_assert_eq!(m.kind == Match::Exact, prefix.len() == query.len());
            } else {
                prop_assert!(m.kind.is_none());
            }
        }
    }

    #[test]
    fn strict_insert_then_delete_round_trips_to_empty() {
        let root: Root<u32> = None;
        let key = Ipv4Net::new(Ipv4Addr::new(10, 0, 0, 0), 24).unwrap();
        let (root, _) = insert(&root, key, 7, InsertFlags::STRICT_INSERT, &eq_u32).unwrap();
        let root = Some(root);
        assert_eq!(size(&root), 1);
        let (root, removed) = delete(&root, key, false, &eq_u32).unwrap();
        assert_eq!(removed, Some(7));
        assert_eq!(size(&root), 0);
    }
}
