//! The mutable set façade: a set of IPv4 addresses, represented as a
//! trie satisfying the set invariant (active nodes are exactly the leaves).
//! Shares the same node layout as the map, with the payload type fixed to
//! `()` and a trivial always-equal predicate.

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use log::trace;

use crate::node::Node;
use crate::set_snapshot::PrefixSetSnapshot;
use crate::trie::{self, set_ops, EqFn, InsertFlags, Root};
use crate::types::errors::{fatal, FatalError, PrefixStoreError};
use crate::types::prefix::Ipv4Net;
use crate::types::range::Range;

fn trivial_eq(_a: &(), _b: &()) -> bool {
    true
}

/// Anything the set façades accept as a key: a bare address, an explicit
/// prefix, or a contiguous address range.
pub enum PrefixInput {
    Address(Ipv4Addr),
    Prefix(Ipv4Net),
    Range(Range),
}

impl PrefixInput {
    fn into_prefixes(self) -> Vec<Ipv4Net> {
        match self {
            PrefixInput::Address(a) => vec![Ipv4Net::host(a)],
            PrefixInput::Prefix(p) => vec![p],
            PrefixInput::Range(r) => r.to_prefixes(),
        }
    }
}

impl From<Ipv4Addr> for PrefixInput {
    fn from(a: Ipv4Addr) -> Self {
        PrefixInput::Address(a)
    }
}

impl From<Ipv4Net> for PrefixInput {
    fn from(p: Ipv4Net) -> Self {
        PrefixInput::Prefix(p)
    }
}

impl From<Range> for PrefixInput {
    fn from(r: Range) -> Self {
        PrefixInput::Range(r)
    }
}

/// A value that can stand in for a set of addresses in an algebra
/// operation: either mutable-set or snapshot-set handle.
pub trait SetLike {
    fn set_root(&self) -> Root<()>;
}

/// A mutable, single-writer-per-handle set of IPv4 addresses.
pub struct PrefixSet {
    root: ArcSwapOption<Node<()>>,
    writable: bool,
}

impl SetLike for PrefixSet {
    fn set_root(&self) -> Root<()> {
        self.root.load().as_ref().map(Arc::clone)
    }
}

impl Default for PrefixSet {
    /// A "zero" handle: readable (and empty), but any write through it
    /// panics.
    fn default() -> Self {
        PrefixSet { root: ArcSwapOption::from(None), writable: false }
    }
}

impl PrefixSet {
    /// A fresh, empty, writable set.
    pub fn new() -> Self {
        PrefixSet { root: ArcSwapOption::from(None), writable: true }
    }

    pub(crate) fn from_root(root: Root<()>, writable: bool) -> Self {
        PrefixSet { root: ArcSwapOption::from(root), writable }
    }

    fn eq_fn(&self) -> EqFn<()> {
        &trivial_eq
    }

    fn require_writable(&self) {
        if !self.writable {
            fatal(FatalError::WRITE_THROUGH_DEFAULT);
        }
    }

    /// Number of addresses the set covers (not the number of stored
    /// prefixes — two adjacent inserted blocks that merge into one still
    /// count every address once).
    pub fn size(&self) -> u64 {
        set_ops::num_addresses(&self.set_root())
    }

    /// Synonym for [`PrefixSet::size`]; kept for callers that want the
    /// address-cardinality reading to be unambiguous at the call site.
    pub fn num_addresses(&self) -> u64 {
        self.size()
    }

    /// `true` if every address denoted by `input` is in the set.
    pub fn contains(&self, input: impl Into<PrefixInput>) -> bool {
        let root = self.set_root();
        input
            .into()
            .into_prefixes()
            .into_iter()
            .all(|p| !trie::longest_match(&root, &p).kind.is_none())
    }

    /// Insert every address denoted by `input`.
    pub fn insert(&self, input: impl Into<PrefixInput>) -> Result<(), PrefixStoreError> {
        self.require_writable();
        for p in input.into().into_prefixes() {
            trace!("set insert {p}");
            let current = self.root.load();
            let current_root: Root<()> = current.as_ref().map(Arc::clone);
            let (new_node, _) =
                trie::insert(&current_root, p, (), InsertFlags::SET_INSERT, self.eq_fn())?;
            let prev = self.root.compare_and_swap(&current, Some(new_node));
            if !same_root(&prev, &current) {
                fatal(FatalError::CAS_RACE);
            }
        }
        Ok(())
    }

    /// Remove every address denoted by `input`.
    pub fn remove(&self, input: impl Into<PrefixInput>) -> Result<(), PrefixStoreError> {
        self.require_writable();
        for p in input.into().into_prefixes() {
            trace!("set remove {p}");
            let current = self.root.load();
            let current_root: Root<()> = current.as_ref().map(Arc::clone);
            let (new_root, _) = trie::delete(&current_root, p, true, self.eq_fn())?;
            let prev = self.root.compare_and_swap(&current, new_root);
            if !same_root(&prev, &current) {
                fatal(FatalError::CAS_RACE);
            }
        }
        Ok(())
    }

    /// Visit every stored prefix (post-flattening, so each covers a maximal
    /// contiguous block) in lexicographic order.
    pub fn walk_prefixes(&self, mut callback: impl FnMut(&Ipv4Net) -> bool) -> bool {
        let root = self.set_root();
        trie::walk(&root, &mut |p, _| callback(p))
    }

    /// Visit every address in the set, in ascending order. Expensive for
    /// large sets — intended for small allocations, not full-table scans.
    pub fn walk_addresses(&self, mut callback: impl FnMut(Ipv4Addr) -> bool) -> bool {
        self.walk_prefixes(|p| {
            for addr in p.first()..=p.last() {
                if !callback(Ipv4Addr::from(addr)) {
                    return false;
                }
            }
            true
        })
    }

    /// Visit every maximal contiguous block in the set as a [`Range`], in
    /// ascending order.
    pub fn walk_ranges(&self, mut callback: impl FnMut(Range) -> bool) -> bool {
        self.walk_prefixes(|p| callback(Range::of(p)))
    }

    /// `A ∪ other`, as a new set; `self` is unchanged.
    pub fn union(&self, other: &dyn SetLike) -> PrefixSet {
        PrefixSet::from_root(set_ops::union(&self.set_root(), &other.set_root()), true)
    }

    /// `A ∩ other`, as a new set; `self` is unchanged.
    pub fn intersection(&self, other: &dyn SetLike) -> PrefixSet {
        PrefixSet::from_root(set_ops::intersection(&self.set_root(), &other.set_root()), true)
    }

    /// `A \ other`, as a new set; `self` is unchanged.
    pub fn difference(&self, other: &dyn SetLike) -> PrefixSet {
        PrefixSet::from_root(set_ops::difference(&self.set_root(), &other.set_root()), true)
    }

    /// Replace `self`'s contents with `self ∪ other`.
    pub fn union_assign(&self, other: &dyn SetLike) {
        self.assign(set_ops::union(&self.set_root(), &other.set_root()));
    }

    /// Replace `self`'s contents with `self ∩ other`.
    pub fn intersection_assign(&self, other: &dyn SetLike) {
        self.assign(set_ops::intersection(&self.set_root(), &other.set_root()));
    }

    /// Replace `self`'s contents with `self \ other`.
    pub fn difference_assign(&self, other: &dyn SetLike) {
        self.assign(set_ops::difference(&self.set_root(), &other.set_root()));
    }

    fn assign(&self, new_root: Root<()>) {
        self.require_writable();
        let current = self.root.load();
        let prev = self.root.compare_and_swap(&current, new_root);
        if !same_root(&prev, &current) {
            fatal(FatalError::CAS_RACE);
        }
    }

    /// The smallest prefix of length `<= max_len` entirely within
    /// `self \ reserved`, for address allocation.
    pub fn find_smallest_containing_prefix(
        &self,
        reserved: &dyn SetLike,
        max_len: u8,
    ) -> Option<Ipv4Net> {
        set_ops::find_smallest_containing_prefix(&self.set_root(), &reserved.set_root(), max_len)
    }

    /// A cheap, immutable handle sharing this set's current root.
    pub fn snapshot(&self) -> PrefixSetSnapshot {
        PrefixSetSnapshot::from_root(self.set_root())
    }

    /// Structural equality: the same addresses, member for member.
    pub fn equals(&self, other: &dyn SetLike) -> bool {
        trie::equal(&self.set_root(), &other.set_root(), self.eq_fn())
    }
}

impl fmt::Debug for PrefixSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_set();
        self.walk_prefixes(|prefix| {
            s.entry(prefix);
            true
        });
        s.finish()
    }
}

fn same_root(
    observed: &arc_swap::Guard<Option<Arc<Node<()>>>>,
    expected: &arc_swap::Guard<Option<Arc<Node<()>>>>,
) -> bool {
    match (observed.as_ref(), expected.as_ref()) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}
