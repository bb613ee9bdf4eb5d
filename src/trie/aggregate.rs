//! Rebuild a trie with the minimum number of active nodes while preserving
//! every address's longest-match answer.

use std::sync::Arc;

use log::trace;

use super::{EqFn, Root};
use crate::node::Node;

/// Produce the aggregated trie. Preserves lexicographic order by
/// construction (children are rebuilt in their existing bit order, never
/// reordered).
pub(crate) fn aggregate<V: Clone>(root: &Root<V>, eq: EqFn<V>) -> Root<V> {
    match root {
        None => None,
        Some(node) => aggregate_node(node, None, eq),
    }
}

fn aggregate_node<V: Clone>(
    node: &Arc<Node<V>>,
    umbrella: Option<&V>,
    eq: EqFn<V>,
) -> Root<V> {
    // Step 1: is this node redundant under the umbrella in effect before it?
    let (redundant, umbrella_for_children) = match (node.active, umbrella) {
        (true, Some(u)) if eq(node.value.as_ref().expect("active node has a value"), u) => {
            (true, umbrella)
        }
        (true, _) => (false, node.value.as_ref()),
        (false, _) => (false, umbrella),
    };
    if redundant {
        trace!("collapsing redundant descendant {}", node.prefix);
    }

    // Step 2: recurse into children carrying the (possibly updated) umbrella.
    let new_children: [Root<V>; 2] = [
        node.children[0]
            .as_ref()
            .and_then(|c| aggregate_node(c, umbrella_for_children, eq)),
        node.children[1]
            .as_ref()
            .and_then(|c| aggregate_node(c, umbrella_for_children, eq)),
    ];

    let self_active = node.active && !redundant;
    let child_len = node.prefix.len() + 1;

    // Step 3: promote a matching pair of children into this node.
    if !self_active {
        if let [Some(l), Some(r)] = &new_children {
            if l.active && r.active && l.prefix.len() == child_len && r.prefix.len() == child_len
            {
                let (lv, rv) = (
                    l.value.as_ref().expect("active node has a value"),
                    r.value.as_ref().expect("active node has a value"),
                );
                if eq(lv, rv) {
                    trace!("promoting equal-valued sibling pair under {}", node.prefix);
                    return Some(Node::leaf(node.prefix, lv.clone()));
                }
            }
        }
    }

    // Step 4: standard compactness invariant for inactive nodes.
    if self_active {
        return Some(Node::build(node.prefix, true, node.value.clone(), new_children));
    }
    match new_children {
        [None, None] => None,
        [Some(only), None] | [None, Some(only)] => Some(only),
        [Some(l), Some(r)] => Some(Node::fork(node.prefix, [l, r])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::{insert, walk, InsertFlags};
    use crate::types::prefix::Ipv4Net;
    use std::net::Ipv4Addr;

    fn eq_bool(a: &bool, b: &bool) -> bool {
        a == b
    }

    fn p(a: u8, b: u8, c: u8, d: u8, len: u8) -> Ipv4Net {
        Ipv4Net::new(Ipv4Addr::new(a, b, c, d), len).unwrap()
    }

    #[test]
    fn redundant_descendant_of_same_value_ancestor_is_dropped() {
        let mut root: Root<bool> = None;
        for (key, value) in [
            (p(10, 0, 0, 0, 24), true),
            (p(10, 0, 0, 0, 28), true),
        ] {
            let (new_root, _) = insert(&root, key, value, InsertFlags::UPSERT, &eq_bool).unwrap();
            root = Some(new_root);
        }
        let aggregated = aggregate(&root, &eq_bool);
        let mut seen = Vec::new();
        walk(&aggregated, &mut |prefix, value| {
            seen.push((*prefix, *value));
            true
        });
        assert_eq!(seen, vec![(p(10, 0, 0, 0, 24), true)]);
    }

    #[test]
    fn aggregate_is_idempotent() {
        let mut root: Root<u8> = None;
        for (key, value) in [
            (p(10, 0, 0, 0, 25), 1u8),
            (p(10, 0, 0, 128, 25), 1u8),
            (p(172, 16, 0, 0, 16), 2u8),
        ] {
            let (new_root, _) =
                insert(&root, key, value, InsertFlags::UPSERT, &|a: &u8, b: &u8| a == b).unwrap();
            root = Some(new_root);
        }
        let once = aggregate(&root, &|a: &u8, b: &u8| a == b);
        let twice = aggregate(&once, &|a: &u8, b: &u8| a == b);
        assert!(crate::trie::equal(&once, &twice, &|a: &u8, b: &u8| a == b));
    }
}
