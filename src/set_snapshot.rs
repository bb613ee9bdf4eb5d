//! The immutable set snapshot façade: a read-only handle over a
//! published set root, with set algebra returning new snapshots.

use std::fmt;
use std::net::Ipv4Addr;

use crate::set::{PrefixSet, SetLike};
use crate::trie::{self, set_ops, Root};
use crate::types::prefix::Ipv4Net;
use crate::types::range::Range;

/// An immutable, freely-shareable snapshot of a [`PrefixSet`]'s trie.
pub struct PrefixSetSnapshot {
    root: Root<()>,
}

impl SetLike for PrefixSetSnapshot {
    fn set_root(&self) -> Root<()> {
        self.root.clone()
    }
}

impl PrefixSetSnapshot {
    pub(crate) fn from_root(root: Root<()>) -> Self {
        PrefixSetSnapshot { root }
    }

    /// Total number of addresses the set covers.
    pub fn size(&self) -> u64 {
        set_ops::num_addresses(&self.root)
    }

    /// Synonym for [`PrefixSetSnapshot::size`].
    pub fn num_addresses(&self) -> u64 {
        self.size()
    }

    /// `true` if `addr` is in the set.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        !trie::longest_match(&self.root, &Ipv4Net::host(addr)).kind.is_none()
    }

    /// Visit every stored prefix in lexicographic order.
    pub fn walk_prefixes(&self, mut callback: impl FnMut(&Ipv4Net) -> bool) -> bool {
        trie::walk(&self.root, &mut |p, _| callback(p))
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

    /// `self ∪ other`, as a new snapshot.
    pub fn union(&self, other: &dyn SetLike) -> PrefixSetSnapshot {
        PrefixSetSnapshot::from_root(set_ops::union(&self.root, &other.set_root()))
    }

    /// `self ∩ other`, as a new snapshot.
    pub fn intersection(&self, other: &dyn SetLike) -> PrefixSetSnapshot {
        PrefixSetSnapshot::from_root(set_ops::intersection(&self.root, &other.set_root()))
    }

    /// `self \ other`, as a new snapshot.
    pub fn difference(&self, other: &dyn SetLike) -> PrefixSetSnapshot {
        PrefixSetSnapshot::from_root(set_ops::difference(&self.root, &other.set_root()))
    }

    /// The smallest prefix of length `<= max_len` entirely within
    /// `self \ reserved`.
    pub fn find_smallest_containing_prefix(
        &self,
        reserved: &dyn SetLike,
        max_len: u8,
    ) -> Option<Ipv4Net> {
        set_ops::find_smallest_containing_prefix(&self.root, &reserved.set_root(), max_len)
    }

    /// A writable set sharing this snapshot's root; cheap, no copy.
    pub fn to_mutable(&self) -> PrefixSet {
        PrefixSet::from_root(self.root.clone(), true)
    }

    /// Structural equality: the same addresses, member for member.
    pub fn equals(&self, other: &dyn SetLike) -> bool {
        trie::equal(&self.root, &other.set_root(), &|_, _| true)
    }
}

impl Clone for PrefixSetSnapshot {
    fn clone(&self) -> Self {
        PrefixSetSnapshot { root: self.root.clone() }
    }
}

impl Default for PrefixSetSnapshot {
    /// An empty snapshot.
    fn default() -> Self {
        PrefixSetSnapshot { root: None }
    }
}

impl fmt::Debug for PrefixSetSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_set();
        self.walk_prefixes(|prefix| {
            s.entry(prefix);
            true
        });
        s.finish()
    }
}
