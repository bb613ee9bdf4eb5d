//! The mutable map façade: a single-writer, copy-on-write map from
//! IPv4 prefixes to values, built on the trie core in [`crate::trie`].

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use log::trace;

use crate::node::Node;
use crate::snapshot::PrefixMapSnapshot;
use crate::trie::{self, EqFn, InsertFlags, Root};
use crate::types::errors::{fatal, FatalError, PrefixStoreError};
use crate::types::match_options::Match;
use crate::types::prefix::{IntoPrefix, Ipv4Net};

pub(crate) type EqPredicate<V> = Arc<dyn Fn(&V, &V) -> bool + Send + Sync>;

/// A mutable, single-writer-per-handle map from IPv4 prefixes to values.
///
/// Reads never block; writes are a compare-and-swap of the whole root
/// pointer against whatever the handle last observed. A losing writer
/// doesn't retry or return an error — it panics, since this map isn't
/// designed for concurrent mutation and silent success would be incorrect.
pub struct PrefixMap<V> {
    root: ArcSwapOption<Node<V>>,
    eq: EqPredicate<V>,
    writable: bool,
}

impl<V: PartialEq> PrefixMap<V> {
    /// A fresh, empty, writable map comparing values with `PartialEq`.
    pub fn new() -> Self {
        Self::with_eq(|a, b| a == b)
    }
}

impl<V: PartialEq> Default for PrefixMap<V> {
    /// A "zero" handle: readable (and empty), but any write through it
    /// panics. Use [`PrefixMap::new`] to get a writable map.
    fn default() -> Self {
        PrefixMap { root: ArcSwapOption::from(None), eq: Arc::new(|a, b| a == b), writable: false }
    }
}

impl<V> PrefixMap<V> {
    /// A fresh, empty, writable map using a custom value-equality
    /// predicate — for payloads without a meaningful `PartialEq`.
    pub fn with_eq(eq: impl Fn(&V, &V) -> bool + Send + Sync + 'static) -> Self {
        PrefixMap { root: ArcSwapOption::from(None), eq: Arc::new(eq), writable: true }
    }

    pub(crate) fn from_parts(root: Root<V>, eq: EqPredicate<V>, writable: bool) -> Self {
        PrefixMap { root: ArcSwapOption::from(root), eq, writable }
    }

    fn eq_fn(&self) -> EqFn<V> {
        &*self.eq
    }

    fn snapshot_root(&self) -> Root<V> {
        self.root.load().as_ref().map(Arc::clone)
    }

    /// Number of active prefixes (not the number of addresses covered).
    pub fn size(&self) -> usize {
        let root = self.snapshot_root();
        trie::size(&root)
    }

    /// Exact-prefix lookup (not longest-prefix-match).
    pub fn get(&self, key: impl IntoPrefix) -> Option<V>
    where
        V: Clone,
    {
        let key = key.into_prefix();
        let root = self.snapshot_root();
        let m = trie::longest_match(&root, &key);
        if m.kind.is_exact() {
            m.value.cloned()
        } else {
            None
        }
    }

    /// The deepest active ancestor of `key`: its matched prefix, value, and
    /// whether the match was exact or merely containing.
    pub fn longest_match(&self, key: impl IntoPrefix) -> Option<(Ipv4Net, V, Match)>
    where
        V: Clone,
    {
        let key = key.into_prefix();
        let root = self.snapshot_root();
        let m = trie::longest_match(&root, &key);
        let prefix = m.prefix?;
        let value = m.value.cloned()?;
        Some((prefix, value, m.kind))
    }

    /// Strict insert: fails with `AlreadyExists` if `key` is already active.
    pub fn insert(&self, key: impl IntoPrefix, value: V) -> Result<(), PrefixStoreError>
    where
        V: Clone,
    {
        self.write(key.into_prefix(), value, InsertFlags::STRICT_INSERT).map(|_| ())
    }

    /// Strict update: fails with `NotFound` if `key` isn't already active.
    /// Returns the previous value.
    pub fn update(&self, key: impl IntoPrefix, value: V) -> Result<V, PrefixStoreError>
    where
        V: Clone,
    {
        self.write(key.into_prefix(), value, InsertFlags::STRICT_UPDATE)
            .map(|old| old.expect("strict update always replaces an existing value"))
    }

    /// Insert-or-update (upsert). Returns the previous value, if `key` was
    /// already active.
    pub fn insert_or_update(
        &self,
        key: impl IntoPrefix,
        value: V,
    ) -> Result<Option<V>, PrefixStoreError>
    where
        V: Clone,
    {
        self.write(key.into_prefix(), value, InsertFlags::UPSERT)
    }

    /// Exact-match lookup that inserts `default` if `key` isn't already
    /// active, returning the value now stored at `key` either way.
    pub fn get_or_insert(&self, key: impl IntoPrefix, default: V) -> V
    where
        V: Clone,
    {
        let key = key.into_prefix();
        let current = self.root.load();
        let current_root: Root<V> = current.as_ref().map(Arc::clone);
        let (new_node, value) =
            trie::get_or_insert(&current_root, key, default, self.eq_fn())
                .expect("get_or_insert never fails");
        let unchanged = current_root.as_ref().is_some_and(|n| Arc::ptr_eq(n, &new_node));
        if unchanged {
            return value;
        }
        self.require_writable();
        let prev = self.root.compare_and_swap(&current, Some(new_node));
        if !same_root(&prev, &current) {
            fatal(FatalError::CAS_RACE);
        }
        value
    }

    /// Strict delete: fails with `NotFound` if `key` isn't active. Returns
    /// the removed value.
    pub fn remove(&self, key: impl IntoPrefix) -> Result<V, PrefixStoreError>
    where
        V: Clone,
    {
        self.require_writable();
        let key = key.into_prefix();
        trace!("remove {key}");
        let current = self.root.load();
        let current_root: Root<V> = current.as_ref().map(Arc::clone);
        let (new_root, removed) = trie::delete(&current_root, key, false, self.eq_fn())?;
        let prev = self.root.compare_and_swap(&current, new_root);
        if !same_root(&prev, &current) {
            fatal(FatalError::CAS_RACE);
        }
        Ok(removed.expect("a strict delete that didn't error always removed a value"))
    }

    /// Visit every active prefix in lexicographic order. Stops early if
    /// `callback` returns `false`.
    pub fn walk(&self, mut callback: impl FnMut(&Ipv4Net, &V) -> bool) -> bool {
        let root = self.snapshot_root();
        trie::walk(&root, &mut callback)
    }

    /// A cheap, immutable handle sharing this map's current root.
    pub fn snapshot(&self) -> PrefixMapSnapshot<V> {
        PrefixMapSnapshot::from_parts(self.snapshot_root(), Arc::clone(&self.eq))
    }

    /// Structural equality: both tries active the same prefixes with the
    /// same values, compared through `self`'s value-equality predicate.
    pub fn equals(&self, other: &PrefixMap<V>) -> bool {
        trie::equal(&self.snapshot_root(), &other.snapshot_root(), self.eq_fn())
    }

    fn require_writable(&self) {
        if !self.writable {
            fatal(FatalError::WRITE_THROUGH_DEFAULT);
        }
    }

    fn write(
        &self,
        key: Ipv4Net,
        value: V,
        flags: InsertFlags,
    ) -> Result<Option<V>, PrefixStoreError>
    where
        V: Clone,
    {
        self.require_writable();
        trace!("write {key}");
        let current = self.root.load();
        let current_root: Root<V> = current.as_ref().map(Arc::clone);
        let (new_node, old) = trie::insert(&current_root, key, value, flags, self.eq_fn())?;
        let prev = self.root.compare_and_swap(&current, Some(new_node));
        if !same_root(&prev, &current) {
            fatal(FatalError::CAS_RACE);
        }
        Ok(old)
    }
}

impl<V: fmt::Debug + Clone> fmt::Debug for PrefixMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut m = f.debug_map();
        self.walk(|prefix, value| {
            m.entry(prefix, value);
            true
        });
        m.finish()
    }
}

fn same_root<V>(
    observed: &arc_swap::Guard<Option<Arc<Node<V>>>>,
    expected: &arc_swap::Guard<Option<Arc<Node<V>>>>,
) -> bool {
    match (observed.as_ref(), expected.as_ref()) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}
