//! Set algebra over trees satisfying the *set invariant*: active nodes
//! are exactly the leaves, so every active node's value stands for its
//! entire address range with nothing finer recorded beneath it.

use std::sync::Arc;

use super::{maybe_flatten, EqFn, Root};
use crate::node::Node;
use crate::types::prefix::{compare, Comparison, Ipv4Net};

/// `A ∪ B`.
pub(crate) fn union<V: Clone>(a: &Root<V>, b: &Root<V>) -> Root<V> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) => Some(x.clone()),
        (None, Some(y)) => Some(y.clone()),
        (Some(x), Some(y)) => Some(union_some(x, y)),
    }
}

fn union_some<V: Clone>(a: &Arc<Node<V>>, b: &Arc<Node<V>>) -> Arc<Node<V>> {
    if a.active {
        return a.clone();
    }
    if b.active {
        return b.clone();
    }
    let trivial: EqFn<V> = &|_, _| true;
    let cmp = compare(&a.prefix, &b.prefix);
    match cmp.result {
        Comparison::Same => {
            let children = [
                union(&a.children[0], &b.children[0]),
                union(&a.children[1], &b.children[1]),
            ];
            maybe_flatten(Node::build(a.prefix, false, None, children), trivial)
        }
        Comparison::AContainsB => {
            let i = b.prefix.bit_at(a.prefix.len()) as usize;
            let merged = union(&a.children[i], &Some(b.clone()))
                .expect("union with a non-empty side is non-empty");
            maybe_flatten(a.with_child(i, merged), trivial)
        }
        Comparison::BContainsA => {
            let i = a.prefix.bit_at(b.prefix.len()) as usize;
            let merged = union(&Some(a.clone()), &b.children[i])
                .expect("union with a non-empty side is non-empty");
            maybe_flatten(b.with_child(i, merged), trivial)
        }
        Comparison::Disjoint => {
            let common_prefix = Ipv4Net::from_bits(a.prefix.addr_bits(), cmp.common);
            let mut children = [a.clone(), b.clone()];
            if a.prefix.bit_at(cmp.common) == 1 {
                children.swap(0, 1);
            }
            Node::fork(common_prefix, children)
        }
    }
}

/// `A ∩ B`.
pub(crate) fn intersection<V: Clone>(a: &Root<V>, b: &Root<V>) -> Root<V> {
    match (a, b) {
        (Some(x), Some(y)) => intersection_some(x, y),
        _ => None,
    }
}

fn intersection_some<V: Clone>(a: &Arc<Node<V>>, b: &Arc<Node<V>>) -> Root<V> {
    let cmp = compare(&a.prefix, &b.prefix);
    match cmp.result {
        Comparison::Disjoint => None,
        Comparison::Same => match (a.active, b.active) {
            (true, true) => Some(a.clone()),
            (true, false) => distribute(b, a),
            (false, true) => distribute(a, b),
            (false, false) => union(
                &intersection(&a.children[0], &b.children[0]),
                &intersection(&a.children[1], &b.children[1]),
            ),
        },
        Comparison::AContainsB => {
            if !a.active {
                let i = b.prefix.bit_at(a.prefix.len()) as usize;
                intersection(&a.children[i], &Some(b.clone()))
            } else if b.active {
                Some(b.clone())
            } else {
                distribute(b, a)
            }
        }
        Comparison::BContainsA => {
            if !b.active {
                let i = a.prefix.bit_at(b.prefix.len()) as usize;
                intersection(&Some(a.clone()), &b.children[i])
            } else if a.active {
                Some(a.clone())
            } else {
                distribute(a, b)
            }
        }
    }
}

/// `inactive`'s children, each intersected against the active `whole` that
/// contains them, unioned back together.
fn distribute<V: Clone>(inactive: &Arc<Node<V>>, whole: &Arc<Node<V>>) -> Root<V> {
    union(
        &intersection(&inactive.children[0], &Some(whole.clone())),
        &intersection(&inactive.children[1], &Some(whole.clone())),
    )
}

/// `A \ B`.
pub(crate) fn difference<V: Clone>(a: &Root<V>, b: &Root<V>) -> Root<V> {
    match (a, b) {
        (None, _) => None,
        (Some(x), None) => Some(x.clone()),
        (Some(x), Some(y)) => difference_some(x, y),
    }
}

fn difference_some<V: Clone>(a: &Arc<Node<V>>, b: &Arc<Node<V>>) -> Root<V> {
    let cmp = compare(&a.prefix, &b.prefix);
    match cmp.result {
        Comparison::Disjoint => Some(a.clone()),
        Comparison::Same => {
            if b.active {
                None
            } else if a.active {
                let [h0, h1] = halves_as_leaves(a);
                union(
                    &difference(&Some(h0), &b.children[0]),
                    &difference(&Some(h1), &b.children[1]),
                )
            } else {
                union(
                    &difference(&a.children[0], &b.children[0]),
                    &difference(&a.children[1], &b.children[1]),
                )
            }
        }
        Comparison::AContainsB => {
            if a.active {
                let halves = halves_as_leaves(a);
                let i = b.prefix.bit_at(a.prefix.len()) as usize;
                let matching = difference(&Some(halves[i].clone()), &Some(b.clone()));
                union(&matching, &Some(halves[1 - i].clone()))
            } else {
                let i = b.prefix.bit_at(a.prefix.len()) as usize;
                let new_child = difference(&a.children[i], &Some(b.clone()));
                promote_child(a, i, new_child)
            }
        }
        Comparison::BContainsA => {
            if b.active {
                None
            } else {
                let i = a.prefix.bit_at(b.prefix.len()) as usize;
                difference(&Some(a.clone()), &b.children[i])
            }
        }
    }
}

fn halves_as_leaves<V: Clone>(node: &Arc<Node<V>>) -> [Arc<Node<V>>; 2] {
    let [h0, h1] = node.prefix.halves();
    let v = node.value.as_ref().expect("active node has a value");
    [Node::leaf(h0, v.clone()), Node::leaf(h1, v.clone())]
}

fn promote_child<V: Clone>(node: &Arc<Node<V>>, i: usize, new_child: Root<V>) -> Root<V> {
    match new_child {
        Some(c) => Some(node.with_child(i, c)),
        None => node.children[1 - i].clone(),
    }
}

/// Smallest (most specific) prefix of length `<= max_len` that lies
/// entirely within `available \ reserved`.
pub(crate) fn find_smallest_containing_prefix<V: Clone>(
    available: &Root<V>,
    reserved: &Root<V>,
    max_len: u8,
) -> Option<Ipv4Net> {
    let mut best: Option<Ipv4Net> = None;
    collect_candidates(available, reserved, max_len, &mut best);
    best
}

fn collect_candidates<V: Clone>(
    node: &Root<V>,
    reserved: &Root<V>,
    max_len: u8,
    best: &mut Option<Ipv4Net>,
) {
    let Some(n) = node else { return };
    if n.active {
        if n.prefix.len() <= max_len {
            if let Some(candidate) = narrow(n.prefix, reserved, max_len) {
                if best.map_or(true, |b| candidate.len() > b.len()) {
                    *best = Some(candidate);
                }
            }
        }
        return;
    }
    collect_candidates(&n.children[0], reserved, max_len, best);
    collect_candidates(&n.children[1], reserved, max_len, best);
}

/// Narrow `candidate` (known to be entirely available) toward `max_len`,
/// splitting into halves wherever `reserved` dips into it.
fn narrow<V: Clone>(candidate: Ipv4Net, reserved: &Root<V>, max_len: u8) -> Option<Ipv4Net> {
    match overlap(&candidate, reserved) {
        Overlap::Full => None,
        Overlap::None => {
            if candidate.len() >= max_len {
                Some(candidate)
            } else {
                let [h0, h1] = candidate.halves();
                narrow(h0, reserved, max_len)
                    .or_else(|| narrow(h1, reserved, max_len))
                    .or(Some(candidate))
            }
        }
        Overlap::Partial => {
            if candidate.len() >= max_len {
                None
            } else {
                let [h0, h1] = candidate.halves();
                narrow(h0, reserved, max_len).or_else(|| narrow(h1, reserved, max_len))
            }
        }
    }
}

enum Overlap {
    None,
    Partial,
    Full,
}

fn overlap<V>(prefix: &Ipv4Net, reserved: &Root<V>) -> Overlap {
    match reserved {
        None => Overlap::None,
        Some(node) => overlap_node(prefix, node),
    }
}

/// Total number of addresses covered by a trie satisfying the set
/// invariant (active nodes are leaves, so their ranges never overlap).
pub(crate) fn num_addresses<V>(root: &Root<V>) -> u64 {
    match root {
        None => 0,
        Some(node) if node.active => 1u64 << (32 - u32::from(node.prefix.len())),
        Some(node) => num_addresses(&node.children[0]) + num_addresses(&node.children[1]),
    }
}

fn overlap_node<V>(prefix: &Ipv4Net, node: &Arc<Node<V>>) -> Overlap {
    let cmp = compare(prefix, &node.prefix);
    match cmp.result {
        Comparison::Disjoint => Overlap::None,
        Comparison::Same => {
            if node.active {
                Overlap::Full
            } else if node.stats.active_count > 0 {
                Overlap::Partial
            } else {
                Overlap::None
            }
        }
        // `prefix` contains `node`: node's reservation is strictly narrower.
        Comparison::AContainsB => {
            if node.stats.active_count > 0 {
                Overlap::Partial
            } else {
                Overlap::None
            }
        }
        // `node` contains `prefix`: the whole of `prefix` inherits node's status.
        Comparison::BContainsA => {
            if node.active {
                Overlap::Full
            } else {
                let i = prefix.bit_at(node.prefix.len()) as usize;
                match &node.children[i] {
                    Some(child) => overlap_node(prefix, child),
                    None => Overlap::None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::{insert, InsertFlags};
    use std::net::Ipv4Addr;

    fn eq_unit(_a: &(), _b: &()) -> bool {
        true
    }

    fn p(a: u8, b: u8, c: u8, d: u8, len: u8) -> Ipv4Net {
        Ipv4Net::new(Ipv4Addr::new(a, b, c, d), len).unwrap()
    }

    fn set_with(prefixes: &[Ipv4Net]) -> Root<()> {
        let mut root: Root<()> = None;
        for prefix in prefixes {
            let (new_root, _) =
                insert(&root, *prefix, (), InsertFlags::SET_INSERT, &eq_unit).unwrap();
            root = Some(new_root);
        }
        root
    }

    #[test]
    fn difference_of_identical_sets_is_empty() {
        let a = set_with(&[p(10, 0, 0, 0, 24)]);
        let b = set_with(&[p(10, 0, 0, 0, 24)]);
        assert_eq!(num_addresses(&difference(&a, &b)), 0);
    }

    #[test]
    fn difference_removes_exactly_the_overlapping_half() {
        let a = set_with(&[p(10, 0, 0, 0, 24)]);
        let b = set_with(&[p(10, 0, 0, 0, 25)]);
        let d = difference(&a, &b);
        assert_eq!(num_addresses(&d), 128);
        assert!(matches!(overlap(&p(10, 0, 0, 128, 25), &d), Overlap::Full));
        assert!(matches!(overlap(&p(10, 0, 0, 0, 25), &d), Overlap::None));
    }

    #[test]
    fn find_smallest_containing_prefix_avoids_reserved_half() {
        let available = set_with(&[p(10, 0, 0, 0, 24)]);
        let reserved = set_with(&[p(10, 0, 0, 0, 25)]);
        let found = find_smallest_containing_prefix(&available, &reserved, 25).unwrap();
        assert_eq!(found, p(10, 0, 0, 128, 25));
    }
}
