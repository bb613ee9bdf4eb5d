//! Recursive structural diff between two tries: synchronized descent
//! producing `Removed` / `Added` / `Modified` events in lexicographic
//! prefix order.

use std::sync::Arc;

use super::{EqFn, Root};
use crate::node::Node;
use crate::types::prefix::{compare, Comparison, Ipv4Net};

/// A single difference between two tries, as seen by [`diff`].
#[derive(Debug)]
pub enum DiffEvent<'a, V> {
    /// An active prefix present in the left trie and absent (no matching
    /// explicit entry) in the right one.
    Removed(Ipv4Net, &'a V),
    /// An active prefix present in the right trie and absent in the left.
    Added(Ipv4Net, &'a V),
    /// The same prefix, active in both, with unequal payloads.
    Modified(Ipv4Net, &'a V, &'a V),
}

/// Diff `l` against `r`. `handler` is invoked once per difference, in
/// lexicographic prefix order; returning `false` short-circuits the
/// traversal (the overall call then also returns `false`).
pub(crate) fn diff<V>(
    l: &Root<V>,
    r: &Root<V>,
    eq: EqFn<V>,
    handler: &mut dyn FnMut(DiffEvent<V>) -> bool,
) -> bool {
    diff_pair(l.as_ref(), r.as_ref(), eq, handler)
}

fn diff_pair<V>(
    l: Option<&Arc<Node<V>>>,
    r: Option<&Arc<Node<V>>>,
    eq: EqFn<V>,
    handler: &mut dyn FnMut(DiffEvent<V>) -> bool,
) -> bool {
    match (l, r) {
        (None, None) => true,
        (Some(ln), None) => emit_one_sided(ln, true, handler),
        (None, Some(rn)) => emit_one_sided(rn, false, handler),
        (Some(ln), Some(rn)) => {
            let cmp = compare(&ln.prefix, &rn.prefix);
            match cmp.result {
                Comparison::Same => {
                    if !emit_same(ln, rn, eq, handler) {
                        return false;
                    }
                    for i in 0..2 {
                        if !diff_pair(
                            ln.children[i].as_ref(),
                            rn.children[i].as_ref(),
                            eq,
                            handler,
                        ) {
                            return false;
                        }
                    }
                    true
                }
                Comparison::AContainsB => {
                    if ln.active {
                        let v = ln.value.as_ref().expect("active node has a value");
                        if !handler(DiffEvent::Removed(ln.prefix, v)) {
                            return false;
                        }
                    }
                    let i = rn.prefix.bit_at(ln.prefix.len()) as usize;
                    diff_pair(ln.children[i].as_ref(), Some(rn), eq, handler)
                        && diff_pair(ln.children[1 - i].as_ref(), None, eq, handler)
                }
                Comparison::BContainsA => {
                    if rn.active {
                        let v = rn.value.as_ref().expect("active node has a value");
                        if !handler(DiffEvent::Added(rn.prefix, v)) {
                            return false;
                        }
                    }
                    let i = ln.prefix.bit_at(rn.prefix.len()) as usize;
                    diff_pair(Some(ln), rn.children[i].as_ref(), eq, handler)
                        && diff_pair(None, rn.children[1 - i].as_ref(), eq, handler)
                }
                Comparison::Disjoint => {
                    let ln_bit = ln.prefix.bit_at(cmp.common);
                    if ln_bit == 0 {
                        diff_pair(Some(ln), None, eq, handler)
                            && diff_pair(None, Some(rn), eq, handler)
                    } else {
                        diff_pair(None, Some(rn), eq, handler)
                            && diff_pair(Some(ln), None, eq, handler)
                    }
                }
            }
        }
    }
}

fn emit_same<V>(
    ln: &Arc<Node<V>>,
    rn: &Arc<Node<V>>,
    eq: EqFn<V>,
    handler: &mut dyn FnMut(DiffEvent<V>) -> bool,
) -> bool {
    match (ln.active, rn.active) {
        (true, true) => {
            let lv = ln.value.as_ref().expect("active node has a value");
            let rv = rn.value.as_ref().expect("active node has a value");
            if eq(lv, rv) {
                true
            } else {
                handler(DiffEvent::Modified(ln.prefix, lv, rv))
            }
        }
        (true, false) => handler(DiffEvent::Removed(
            ln.prefix,
            ln.value.as_ref().expect("active node has a value"),
        )),
        (false, true) => handler(DiffEvent::Added(
            rn.prefix,
            rn.value.as_ref().expect("active node has a value"),
        )),
        (false, false) => true,
    }
}

/// Walk an entire one-sided subtree, emitting `Removed` (if `is_left`) or
/// `Added` for every active node, in lexicographic order.
fn emit_one_sided<V>(
    node: &Arc<Node<V>>,
    is_left: bool,
    handler: &mut dyn FnMut(DiffEvent<V>) -> bool,
) -> bool {
    if node.active {
        let v = node.value.as_ref().expect("active node has a value");
        let event = if is_left {
            DiffEvent::Removed(node.prefix, v)
        } else {
            DiffEvent::Added(node.prefix, v)
        };
        if !handler(event) {
            return false;
        }
    }
    for child in node.children.iter().flatten() {
        if !emit_one_sided(child, is_left, handler) {
            return false;
        }
    }
    true
}
