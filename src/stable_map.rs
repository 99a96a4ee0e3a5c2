//! StableMap: chain table keyed on permanent record indices.
//!
//! Keys and values live in a `RecordList`; the chain table only stores each
//! record's `RecordKey` plus the hash fragment. Probing compares through the
//! record list, so the table can relocate its slots freely while handles,
//! which are record keys, never move.

use crate::config::TableConfig;
use crate::error::{fail_fast, InvariantError, TableError};
use crate::raw_table::RawChainTable;
use crate::record_list::{RecordKey, RecordList};
use crate::reentrancy::DebugReentrancy;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;

/// Stable reference to one entry of a [`StableMap`].
///
/// Survives inserts, rehashes and the removal of other entries. After its
/// own entry is removed it resolves to `None` and never to a later entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(RecordKey);

impl Handle {
    pub fn key<'a, K, V, S>(&self, map: &'a StableMap<K, V, S>) -> Option<&'a K>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        map.handle_key(*self)
    }

    pub fn value<'a, K, V, S>(&self, map: &'a StableMap<K, V, S>) -> Option<&'a V>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        map.handle_value(*self)
    }

    pub fn value_mut<'a, K, V, S>(&self, map: &'a mut StableMap<K, V, S>) -> Option<&'a mut V>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        map.handle_value_mut(*self)
    }
}

#[derive(Debug)]
struct Record<K, V> {
    key: K,
    value: V,
    hash: u64,
}

/// Hash map whose handles stay valid for the lifetime of their entry.
///
/// `iter`, `first` and `next` follow insertion order. `iter_mut` visits the
/// same entries in record-arena order, which differs from insertion order
/// once removed records have been reused.
pub struct StableMap<K, V, S = RandomState> {
    hasher: S,
    index: RawChainTable<RecordKey>,
    records: RecordList<Record<K, V>>,
    reentrancy: DebugReentrancy,
}

impl<K, V> StableMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    pub fn with_capacity(entries: usize) -> Self {
        Self::with_config_and_hasher(TableConfig::new().initial_capacity(entries), Default::default())
            .unwrap_or_else(|e| fail_fast(e))
    }
}

impl<K, V, S> Default for StableMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

/// Iterator over entries in insertion order.
pub struct Iter<'a, K, V> {
    it: crate::record_list::Iter<'a, Record<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (Handle, &'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it
            .next()
            .map(|(k, r)| (Handle(k), &r.key, &r.value))
    }
}

impl<K, V, S> StableMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: RawChainTable::new(),
            records: RecordList::new(),
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn with_config_and_hasher(config: TableConfig, hasher: S) -> Result<Self, TableError> {
        let records = RecordList::with_capacity(config.initial_capacity);
        Ok(Self {
            hasher,
            index: RawChainTable::with_config(config)?,
            records,
            reentrancy: DebugReentrancy::new(),
        })
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// Probe the index with the caller's key, comparing through the records.
    fn lookup<Q>(&self, hash: u64, q: &Q) -> Option<RecordKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let records = &self.records;
        let slot = self.index.find(hash, |&rk| {
            records
                .get(rk)
                .map_or(false, |r| r.key.borrow() == q)
        })?;
        self.index.get(slot).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.len() == 0
    }

    /// Slot count of the index table.
    pub fn capacity(&self) -> usize {
        self.index.capacity()
    }

    pub fn find<Q>(&self, q: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(q);
        self.lookup(hash, q).map(Handle)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.find(q)?;
        self.handle_value(h)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.find(q)?;
        self.handle_value_mut(h)
    }

    /// Insert-or-find. An existing entry keeps its value and handle and is
    /// reported with `false`. Panics if the index cannot grow.
    pub fn insert(&mut self, key: K, value: V) -> (Handle, bool) {
        self.try_insert(key, value).unwrap_or_else(|e| fail_fast(e))
    }

    pub fn try_insert(&mut self, key: K, value: V) -> Result<(Handle, bool), TableError> {
        self.try_insert_with(key, || value)
    }

    pub fn insert_with<F>(&mut self, key: K, default: F) -> (Handle, bool)
    where
        F: FnOnce() -> V,
    {
        self.try_insert_with(key, default)
            .unwrap_or_else(|e| fail_fast(e))
    }

    pub fn try_insert_with<F>(&mut self, key: K, default: F) -> Result<(Handle, bool), TableError>
    where
        F: FnOnce() -> V,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(&key);
        if let Some(rk) = self.lookup(hash, &key) {
            return Ok((Handle(rk), false));
        }
        // Every fallible step happens before either layer changes.
        self.index.prepare_insert()?;
        let value = default();
        let rk = self.records.push_back(Record { key, value, hash });
        self.index.insert_no_grow(hash, rk);
        Ok((Handle(rk), true))
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(q);
        let rk = self.lookup(hash, q)?;
        Some(unlink(&mut self.index, &mut self.records, hash, rk))
    }

    pub fn remove_handle(&mut self, handle: Handle) -> Option<(K, V)> {
        let _g = self.reentrancy.enter();
        let hash = self.records.get(handle.0)?.hash;
        Some(unlink(&mut self.index, &mut self.records, hash, handle.0))
    }

    pub(crate) fn handle_key(&self, h: Handle) -> Option<&K> {
        self.records.get(h.0).map(|r| &r.key)
    }

    pub(crate) fn handle_value(&self, h: Handle) -> Option<&V> {
        self.records.get(h.0).map(|r| &r.value)
    }

    pub(crate) fn handle_value_mut(&mut self, h: Handle) -> Option<&mut V> {
        self.records.get_mut(h.0).map(|r| &mut r.value)
    }

    /// Oldest live entry.
    pub fn first(&self) -> Option<Handle> {
        self.records.first().map(Handle)
    }

    /// Entry inserted after `h` that is still live. Valid while entries
    /// other than `h` are removed.
    pub fn next(&self, h: Handle) -> Option<Handle> {
        self.records.next(h.0).map(Handle)
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let _g = self.reentrancy.enter();
        let mut cursor = self.records.first();
        while let Some(rk) = cursor {
            cursor = self.records.next(rk);
            let dropped = self
                .records
                .get_mut(rk)
                .and_then(|r| (!keep(&r.key, &mut r.value)).then_some(r.hash));
            if let Some(hash) = dropped {
                unlink(&mut self.index, &mut self.records, hash, rk);
            }
        }
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            it: self.records.iter(),
        }
    }

    /// Mutable access to every value, in record-arena order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle, &K, &mut V)> {
        self.records
            .iter_mut()
            .map(|(k, r)| (Handle(k), &r.key, &mut r.value))
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.records.clear();
    }

    pub fn reserve(&mut self, additional: usize) {
        self.index.reserve(additional);
    }

    pub fn shrink_to_fit(&mut self) {
        self.index.shrink_to_fit();
    }

    /// Verify the index layout and that the index and the record list hold
    /// the same entries.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.index.check_invariants()?;
        if self.index.len() != self.records.len() {
            return Err(InvariantError::LayerMismatch {
                indexed: self.index.len(),
                records: self.records.len(),
            });
        }
        let reachable = self
            .records
            .iter()
            .filter(|(rk, record)| self.index.find(record.hash, |k| k == rk).is_some())
            .count();
        if reachable != self.records.len() {
            return Err(InvariantError::LayerMismatch {
                indexed: reachable,
                records: self.records.len(),
            });
        }
        Ok(())
    }
}

/// Drop a live record from both layers. Takes the fields separately so the
/// caller's reentrancy guard can stay alive.
fn unlink<K, V>(
    index: &mut RawChainTable<RecordKey>,
    records: &mut RecordList<Record<K, V>>,
    hash: u64,
    rk: RecordKey,
) -> (K, V) {
    index
        .remove(hash, |&k| k == rk)
        .expect("live record must be indexed");
    let record = records.remove(rk).expect("indexed key must have a record");
    (record.key, record.value)
}
