//! ChainMap: typed key/value layer over `RawChainTable`, handing out slot
//! handles.

use crate::config::TableConfig;
use crate::control::ControlWord;
use crate::error::{fail_fast, InvariantError, TableError};
use crate::raw_table::{RawChainTable, SlotHandle};
use crate::reentrancy::DebugReentrancy;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;

/// Hash map with in-place collision chains.
///
/// Handles are slot positions: cheap, but invalidated by any insert that
/// relocates an entry, by removals and by rehashing. Use
/// [`StableMap`](crate::StableMap) when handles must outlive unrelated
/// mutations.
pub struct ChainMap<K, V, S = RandomState, W = u32> {
    hasher: S,
    table: RawChainTable<(K, V), W>,
    reentrancy: DebugReentrancy,
}

/// `ChainMap` with 16-bit hash fragments, for payloads of two bytes or less.
pub type NarrowChainMap<K, V, S = RandomState> = ChainMap<K, V, S, u16>;

impl<K, V> ChainMap<K, V>
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

impl<K, V, S, W> Default for ChainMap<K, V, S, W>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
    W: ControlWord,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S, W> ChainMap<K, V, S, W>
where
    K: Eq + Hash,
    S: BuildHasher,
    W: ControlWord,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            table: RawChainTable::new(),
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn with_config_and_hasher(config: TableConfig, hasher: S) -> Result<Self, TableError> {
        Ok(Self {
            hasher,
            table: RawChainTable::with_config(config)?,
            reentrancy: DebugReentrancy::new(),
        })
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn find<Q>(&self, q: &Q) -> Option<SlotHandle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(q);
        self.table.find(hash, |(k, _)| k.borrow() == q)
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
        self.value_at(h)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.find(q)?;
        self.value_at_mut(h)
    }

    /// Insert-or-find. When `key` is already present its entry is kept
    /// as is, `value` is dropped, and `false` is returned with the existing
    /// handle. Panics if the table cannot grow.
    pub fn insert(&mut self, key: K, value: V) -> (SlotHandle, bool) {
        self.try_insert(key, value).unwrap_or_else(|e| fail_fast(e))
    }

    pub fn try_insert(&mut self, key: K, value: V) -> Result<(SlotHandle, bool), TableError> {
        self.try_insert_with(key, || value)
    }

    /// Like [`insert`](Self::insert), but only builds the value when the key
    /// is absent.
    pub fn insert_with<F>(&mut self, key: K, default: F) -> (SlotHandle, bool)
    where
        F: FnOnce() -> V,
    {
        self.try_insert_with(key, default)
            .unwrap_or_else(|e| fail_fast(e))
    }

    pub fn try_insert_with<F>(&mut self, key: K, default: F) -> Result<(SlotHandle, bool), TableError>
    where
        F: FnOnce() -> V,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(&key);
        if let Some(h) = self.table.find(hash, |(k, _)| *k == key) {
            return Ok((h, false));
        }
        self.table.prepare_insert()?;
        let h = self.table.insert_no_grow(hash, (key, default()));
        Ok((h, true))
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(q);
        self.table.remove(hash, |(k, _)| k.borrow() == q)
    }

    pub fn key_at(&self, h: SlotHandle) -> Option<&K> {
        self.table.get(h).map(|(k, _)| k)
    }

    pub fn value_at(&self, h: SlotHandle) -> Option<&V> {
        self.table.get(h).map(|(_, v)| v)
    }

    pub fn value_at_mut(&mut self, h: SlotHandle) -> Option<&mut V> {
        self.table.get_mut(h).map(|(_, v)| v)
    }

    pub fn remove_at(&mut self, h: SlotHandle) -> Option<(K, V)> {
        self.table.remove_handle(h)
    }

    /// Handle of the first entry in slot order.
    pub fn first(&self) -> Option<SlotHandle> {
        self.table.first()
    }

    pub fn next(&self, h: SlotHandle) -> Option<SlotHandle> {
        self.table.next(h)
    }

    /// Remove the entry at `h` and return it with the handle to continue a
    /// slot-order walk from.
    pub fn remove_and_advance(&mut self, h: SlotHandle) -> Option<((K, V), Option<SlotHandle>)> {
        self.table.remove_and_advance(h)
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let _g = self.reentrancy.enter();
        self.table.retain(|(k, v)| keep(k, v));
    }

    /// Entries in slot order, which is not meaningful to callers.
    pub fn iter(&self) -> impl Iterator<Item = (SlotHandle, &K, &V)> {
        self.table.iter().map(|(h, (k, v))| (h, k, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotHandle, &K, &mut V)> {
        self.table.iter_mut().map(|(h, (k, v))| (h, &*k, v))
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Drop every entry and release the backing array.
    pub fn purge(&mut self) {
        self.table.purge();
    }

    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    pub fn shrink_to_fit(&mut self) {
        self.table.shrink_to_fit();
    }

    /// The underlying table, for slot-level inspection.
    pub fn raw(&self) -> &RawChainTable<(K, V), W> {
        &self.table
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.table.check_invariants()
    }
}
