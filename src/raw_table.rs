//! RawChainTable: open addressing with collision chains kept inside the
//! slot array.
//!
//! Every key has an ideal slot, `spread(fragment) & mask`. The entry stored
//! at its own ideal slot is the chain's root. The remaining members of the
//! chain sit further along (wrapping) and are found by scanning forward,
//! skipping slots that belong to other chains, until the member flagged as
//! chain-end. A chain exists only while its root does, so a lookup whose
//! ideal slot holds no root of its own fails after a single probe.
//!
//! Handles returned here are slot positions. They are invalidated whenever
//! entries move (relocation on insert, removal, rehash); each handle carries
//! the table epoch it was minted in and resolves to `None` once stale.

use crate::config::{prev_power_of_two, TableConfig, DEFAULT_MIN_CAPACITY};
use crate::control::ControlWord;
use crate::error::{fail_fast, InvariantError, TableError};
use crate::slots::{Entry, Slot, SlotArray};
use std::collections::BTreeMap;

/// Largest slot count. Handles address slots with 32-bit indices.
pub const MAX_CAPACITY: usize = 1 << 31;

/// Position of an entry, valid until the table next moves entries.
///
/// The 64-bit epoch cannot wrap in practice, so a stale handle never matches
/// a later table state.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SlotHandle {
    index: u32,
    epoch: u64,
}

impl SlotHandle {
    /// Slot index this handle points at.
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// The chain table over raw payloads. Callers supply the 64-bit hash and an
/// equality closure on every call; `T` is typically the key or a
/// `(key, value)` pair.
#[derive(Debug, Clone)]
pub struct RawChainTable<T, W = u32> {
    slots: SlotArray<T, W>,
    len: usize,
    min_capacity: usize,
    /// Capacity explicitly asked for through `initial_capacity` or
    /// `reserve`; resizing on insert stays at or above it.
    floor: usize,
    growth: bool,
    epoch: u64,
}

impl<T, W: ControlWord> Default for RawChainTable<T, W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, W: ControlWord> RawChainTable<T, W> {
    /// An empty, growable table. Nothing is allocated until the first insert.
    pub fn new() -> Self {
        Self {
            slots: SlotArray::empty(),
            len: 0,
            min_capacity: DEFAULT_MIN_CAPACITY,
            floor: 0,
            growth: true,
            epoch: 0,
        }
    }

    /// A growable table pre-sized for `entries`. Panics if the allocation
    /// cannot be made.
    pub fn with_capacity(entries: usize) -> Self {
        Self::with_config(TableConfig::new().initial_capacity(entries))
            .unwrap_or_else(|e| fail_fast(e))
    }

    pub fn with_config(config: TableConfig) -> Result<Self, TableError> {
        let mut table = Self {
            slots: SlotArray::empty(),
            len: 0,
            min_capacity: config.min_capacity,
            floor: 0,
            growth: config.growth,
            epoch: 0,
        };
        if let Some(slots) = config.fixed_capacity {
            if slots > MAX_CAPACITY {
                return Err(TableError::CapacityOverflow {
                    requested: slots,
                    max: MAX_CAPACITY,
                });
            }
            if slots > 0 {
                table.slots = SlotArray::allocate(slots)?;
            }
        } else if config.initial_capacity > 0 {
            let slots = table.target_capacity(config.initial_capacity)?;
            table.slots = SlotArray::allocate(slots)?;
            table.floor = slots;
        }
        Ok(table)
    }

    /// A fixed table using as many slots as fit in `bytes`, rounded down to
    /// a power of two.
    pub fn with_fixed_memory(bytes: usize) -> Result<Self, TableError> {
        let slot_size = core::mem::size_of::<Slot<T, W>>().max(1);
        Self::with_config(TableConfig::new().fixed(bytes / slot_size))
    }

    /// A fixed table over a caller-provided buffer. The largest power-of-two
    /// prefix of the buffer becomes the slot array; anything it held is
    /// dropped. [`into_buffer`](Self::into_buffer) hands the storage back.
    pub fn from_buffer(buffer: Vec<Slot<T, W>>) -> Self {
        let capacity = prev_power_of_two(buffer.len()).min(MAX_CAPACITY);
        Self {
            slots: SlotArray::adopt(buffer, capacity),
            len: 0,
            min_capacity: DEFAULT_MIN_CAPACITY,
            floor: 0,
            growth: false,
            epoch: 0,
        }
    }

    /// Give up the backing storage, entries included.
    pub fn into_buffer(self) -> Vec<Slot<T, W>> {
        self.slots.into_vec()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots; zero or a power of two.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub fn growth_enabled(&self) -> bool {
        self.growth
    }

    /// Allow or forbid resizing on insert. A fixed table can be turned into
    /// a growable one this way.
    pub fn set_growth(&mut self, enabled: bool) {
        self.growth = enabled;
    }

    /// Ideal slot for `hash` at the current capacity.
    pub fn ideal_index(&self, hash: u64) -> Option<usize> {
        (self.capacity() > 0).then(|| self.chain_of(W::from_hash(hash)))
    }

    /// Raw view of one slot.
    pub fn slot(&self, index: usize) -> Option<&Slot<T, W>> {
        self.slots.as_slice().get(index)
    }

    /// Whether `index` holds the root of its own chain.
    pub fn is_root(&self, index: usize) -> bool {
        index < self.capacity()
            && self
                .slots
                .entry(index)
                .map_or(false, |e| self.chain_of(e.fragment) == index)
    }

    pub fn find<F>(&self, hash: u64, mut eq: F) -> Option<SlotHandle>
    where
        F: FnMut(&T) -> bool,
    {
        self.locate(W::from_hash(hash), &mut eq)
            .map(|(index, _)| self.handle(index))
    }

    pub fn get(&self, handle: SlotHandle) -> Option<&T> {
        let index = self.resolve(handle)?;
        self.slots.entry(index).map(|e| &e.value)
    }

    pub fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut T> {
        let index = self.resolve(handle)?;
        self.slots.entry_mut(index).map(|e| &mut e.value)
    }

    /// Insert-or-find. An existing entry is left untouched and reported with
    /// `false`; `make` only runs when a new entry is created.
    pub fn find_or_insert_with<F, M>(
        &mut self,
        hash: u64,
        mut eq: F,
        make: M,
    ) -> Result<(SlotHandle, bool), TableError>
    where
        F: FnMut(&T) -> bool,
        M: FnOnce() -> T,
    {
        let fragment = W::from_hash(hash);
        if let Some((index, _)) = self.locate(fragment, &mut eq) {
            return Ok((self.handle(index), false));
        }
        self.prepare_insert()?;
        let index = self.place(fragment, make());
        self.len += 1;
        Ok((self.handle(index), true))
    }

    /// Insert without checking for an equal entry. The caller guarantees
    /// absence.
    pub fn insert_unique(&mut self, hash: u64, value: T) -> Result<SlotHandle, TableError> {
        self.prepare_insert()?;
        Ok(self.insert_no_grow(hash, value))
    }

    /// Run the resize check for one more entry. After it succeeds,
    /// [`insert_no_grow`](Self::insert_no_grow) cannot fail.
    pub fn prepare_insert(&mut self) -> Result<(), TableError> {
        let needed = self.len + 1;
        let cap = self.capacity();
        if !self.growth {
            if needed > cap {
                #[cfg(feature = "logging")]
                log::warn!("fixed table of {cap} slots rejected an insert");
                return Err(TableError::Full { capacity: cap });
            }
            return Ok(());
        }
        let grow = needed.saturating_mul(4) > cap.saturating_mul(3);
        let shrink = needed.saturating_mul(4) < cap && cap > self.min_capacity.max(self.floor) * 2;
        if grow || shrink {
            let target = self.target_capacity(needed)?;
            self.resize(target)?;
        }
        Ok(())
    }

    /// Place a new entry without any resize check. Panics if no slot is
    /// free; call [`prepare_insert`](Self::prepare_insert) first.
    pub fn insert_no_grow(&mut self, hash: u64, value: T) -> SlotHandle {
        if self.len >= self.capacity() {
            fail_fast(TableError::Full {
                capacity: self.capacity(),
            });
        }
        let index = self.place(W::from_hash(hash), value);
        self.len += 1;
        self.handle(index)
    }

    pub fn remove<F>(&mut self, hash: u64, mut eq: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        let (index, prev) = self.locate(W::from_hash(hash), &mut eq)?;
        self.unlink(index, prev).map(|(value, _)| value)
    }

    pub fn remove_handle(&mut self, handle: SlotHandle) -> Option<T> {
        let index = self.resolve(handle)?;
        self.remove_index(index).map(|(value, _)| value)
    }

    /// Remove the entry at `handle` and return the next entry in slot order.
    ///
    /// Removing a root pulls the next chain member into the vacated slot.
    /// When that member came from a higher index it has not been visited
    /// yet, so the returned handle points at the same slot again.
    pub fn remove_and_advance(&mut self, handle: SlotHandle) -> Option<(T, Option<SlotHandle>)> {
        let index = self.resolve(handle)?;
        let (value, filled_from) = self.remove_index(index)?;
        let next = self
            .resume_after(index, filled_from)
            .map(|i| self.handle(i));
        Some((value, next))
    }

    /// First occupied slot.
    pub fn first(&self) -> Option<SlotHandle> {
        self.next_occupied(0).map(|i| self.handle(i))
    }

    /// Next occupied slot after `handle`; `None` at the end or when the
    /// handle is stale.
    pub fn next(&self, handle: SlotHandle) -> Option<SlotHandle> {
        let index = self.resolve(handle)?;
        self.next_occupied(index + 1).map(|i| self.handle(i))
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&mut T) -> bool,
    {
        let mut cursor = self.next_occupied(0);
        while let Some(index) = cursor {
            let kept = self
                .slots
                .entry_mut(index)
                .map_or(true, |e| keep(&mut e.value));
            cursor = if kept {
                self.next_occupied(index + 1)
            } else {
                let filled_from = self.remove_index(index).and_then(|(_, from)| from);
                self.resume_after(index, filled_from)
            };
        }
    }

    pub fn iter(&self) -> Iter<'_, T, W> {
        Iter {
            inner: self.slots.as_slice().iter().enumerate(),
            epoch: self.epoch,
        }
    }

    /// Mutable iteration. Changing the parts of `T` that feed the hash or
    /// equality leaves the entry unreachable.
    pub fn iter_mut(&mut self) -> IterMut<'_, T, W> {
        IterMut {
            epoch: self.epoch,
            inner: self.slots.as_mut_slice().iter_mut().enumerate(),
        }
    }

    /// Drop every entry, keeping the allocation.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.len = 0;
        self.bump_epoch();
    }

    /// Drop every entry and release the backing array. A fixed table keeps
    /// zero slots afterwards.
    pub fn purge(&mut self) {
        self.slots = SlotArray::empty();
        self.floor = 0;
        self.len = 0;
        self.bump_epoch();
    }

    /// Make room for `additional` more entries without a resize. Panics on
    /// failure.
    pub fn reserve(&mut self, additional: usize) {
        if let Err(e) = self.try_reserve(additional) {
            fail_fast(e);
        }
    }

    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TableError> {
        let needed = self
            .len
            .checked_add(additional)
            .ok_or(TableError::CapacityOverflow {
                requested: usize::MAX,
                max: MAX_CAPACITY,
            })?;
        let cap = self.capacity();
        if !self.growth {
            return if needed <= cap {
                Ok(())
            } else {
                Err(TableError::Full { capacity: cap })
            };
        }
        if needed.saturating_mul(4) > cap.saturating_mul(3) {
            let target = self.target_capacity(needed)?;
            self.resize(target)?;
        }
        self.floor = self.floor.max(self.capacity());
        Ok(())
    }

    /// Shrink to the smallest capacity the growth policy allows for the
    /// current length, dropping any reserved floor. Fixed tables are left
    /// alone.
    pub fn shrink_to_fit(&mut self) {
        if !self.growth {
            return;
        }
        self.floor = 0;
        if self.len == 0 {
            self.purge();
            return;
        }
        let result = self.target_capacity(self.len).and_then(|target| {
            if target < self.capacity() {
                self.resize(target)
            } else {
                Ok(())
            }
        });
        if let Err(e) = result {
            fail_fast(e);
        }
    }

    /// Verify the chain layout.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let cap = self.capacity();
        if cap != 0 && !cap.is_power_of_two() {
            return Err(InvariantError::NotPowerOfTwo { capacity: cap });
        }
        let counted = self.slots.as_slice().iter().filter(|s| !s.is_free()).count();
        if counted != self.len {
            return Err(InvariantError::LenMismatch {
                recorded: self.len,
                counted,
            });
        }
        if cap == 0 {
            return Ok(());
        }

        struct Tally {
            members: usize,
            ends: usize,
            first: usize,
        }
        let mask = self.slots.mask();
        let mut chains: BTreeMap<usize, Tally> = BTreeMap::new();
        for (index, slot) in self.slots.as_slice().iter().enumerate() {
            if let Some(e) = slot.entry() {
                let tally = chains.entry(self.chain_of(e.fragment)).or_insert(Tally {
                    members: 0,
                    ends: 0,
                    first: index,
                });
                tally.members += 1;
                tally.ends += usize::from(e.last);
            }
        }

        for (&chain, tally) in &chains {
            if !self.is_root(chain) {
                return Err(InvariantError::MissingRoot {
                    index: tally.first,
                    chain,
                });
            }
            if tally.ends != 1 {
                return Err(InvariantError::ChainEnds {
                    chain,
                    count: tally.ends,
                });
            }
            let mut reached = 0;
            let mut i = chain;
            for _ in 0..=mask {
                if self.is_member(i, chain) {
                    reached += 1;
                    if self.slots.entry(i).map_or(false, |e| e.last) {
                        break;
                    }
                }
                i = (i + 1) & mask;
            }
            if reached != tally.members {
                let index = (1..=mask)
                    .map(|step| (i + step) & mask)
                    .find(|&j| self.is_member(j, chain))
                    .unwrap_or(i);
                return Err(InvariantError::Unreachable { index, chain });
            }
        }
        Ok(())
    }

    /// Capacity below which resizing on insert never goes.
    #[cfg(test)]
    pub(crate) fn resize_floor(&self) -> usize {
        self.min_capacity.max(self.floor)
    }

    #[inline]
    fn chain_of(&self, fragment: W) -> usize {
        fragment.spread() & self.slots.mask()
    }

    #[inline]
    fn is_member(&self, index: usize, chain: usize) -> bool {
        self.slots
            .entry(index)
            .map_or(false, |e| self.chain_of(e.fragment) == chain)
    }

    #[inline]
    fn handle(&self, index: usize) -> SlotHandle {
        SlotHandle {
            index: index as u32,
            epoch: self.epoch,
        }
    }

    fn resolve(&self, handle: SlotHandle) -> Option<usize> {
        let index = handle.index();
        let live = handle.epoch == self.epoch
            && index < self.capacity()
            && !self.slots.get(index).is_free();
        live.then_some(index)
    }

    fn bump_epoch(&mut self) {
        self.epoch += 1;
    }

    /// Smallest power of two holding `entries` at a load of one half or
    /// less, and never below the configured minimum or reserved floor.
    fn target_capacity(&self, entries: usize) -> Result<usize, TableError> {
        let least = self.min_capacity.max(self.floor);
        match entries
            .checked_mul(2)
            .and_then(usize::checked_next_power_of_two)
            .map(|slots| slots.max(least))
        {
            Some(slots) if slots <= MAX_CAPACITY => Ok(slots),
            _ => Err(TableError::CapacityOverflow {
                requested: entries,
                max: MAX_CAPACITY,
            }),
        }
    }

    /// Move every entry into a fresh array of `capacity` slots. Entries are
    /// placed again from their stored fragments, highest index first.
    fn resize(&mut self, capacity: usize) -> Result<(), TableError> {
        debug_assert!(capacity >= self.len);
        let fresh = SlotArray::allocate(capacity)?;
        let old = core::mem::replace(&mut self.slots, fresh);
        #[cfg(feature = "logging")]
        log::debug!(
            "rehashing {} entries from {} to {} slots",
            self.len,
            old.capacity(),
            capacity
        );
        for entry in old.into_entries_rev() {
            self.place(entry.fragment, entry.value);
        }
        self.bump_epoch();
        Ok(())
    }

    /// Find the entry and the chain member preceding it.
    fn locate<F>(&self, fragment: W, eq: &mut F) -> Option<(usize, Option<usize>)>
    where
        F: FnMut(&T) -> bool,
    {
        if self.capacity() == 0 {
            return None;
        }
        let mask = self.slots.mask();
        let chain = self.chain_of(fragment);
        if !self.is_root(chain) {
            return None;
        }
        let mut prev = None;
        let mut i = chain;
        for _ in 0..=mask {
            if let Some(e) = self.slots.entry(i) {
                if self.chain_of(e.fragment) == chain {
                    if e.fragment == fragment && eq(&e.value) {
                        return Some((i, prev));
                    }
                    if e.last {
                        return None;
                    }
                    prev = Some(i);
                }
            }
            i = (i + 1) & mask;
        }
        None
    }

    /// Put a new entry into its chain. At least one slot must be free.
    fn place(&mut self, fragment: W, value: T) -> usize {
        debug_assert!(self.len < self.capacity());
        let chain = self.chain_of(fragment);
        let occupant = self.slots.entry(chain).map(|e| self.chain_of(e.fragment));
        match occupant {
            None => {
                self.slots.put(chain, Entry::new(fragment, true, value));
                chain
            }
            // The root keeps its slot; the newcomer joins further along.
            Some(owner) if owner == chain => {
                self.settle(chain, chain, Entry::new(fragment, false, value))
            }
            Some(_) => {
                self.bump(chain);
                self.slots.put(chain, Entry::new(fragment, true, value));
                chain
            }
        }
    }

    /// Relocate the occupant of `from`, a member of some other chain, to the
    /// next free slot.
    fn bump(&mut self, from: usize) {
        if let Some(entry) = self.slots.take(from) {
            let start = (from + 1) & self.slots.mask();
            self.settle(start, from, entry);
            self.bump_epoch();
        }
    }

    /// Store `entry` in the first free slot at or after `start`. Passing a
    /// same-chain member flagged as chain-end moves the flag onto `entry`.
    ///
    /// `origin` is where the entry sat in its chain. If the free slot is
    /// closer to the chain root than that (the scan wrapped past the root),
    /// forward order no longer matches the old chain order and the end flag
    /// is recomputed.
    fn settle(&mut self, start: usize, origin: usize, mut entry: Entry<T, W>) -> usize {
        let mask = self.slots.mask();
        let chain = self.chain_of(entry.fragment);
        let mut i = start;
        while let Some(e) = self.slots.entry_mut(i) {
            if e.last && e.fragment.spread() & mask == chain {
                e.last = false;
                entry.last = true;
            }
            i = (i + 1) & mask;
        }
        let wrapped = (i.wrapping_sub(chain) & mask) < (origin.wrapping_sub(chain) & mask);
        self.slots.put(i, entry);
        if wrapped {
            self.repair_chain_end(chain);
        }
        i
    }

    /// Flag the member farthest from the root as chain-end.
    fn repair_chain_end(&mut self, chain: usize) {
        let mask = self.slots.mask();
        let mut end = None;
        for step in 0..=mask {
            let i = (chain + step) & mask;
            if let Some(e) = self.slots.entry_mut(i) {
                if e.fragment.spread() & mask == chain {
                    e.last = false;
                    end = Some(i);
                }
            }
        }
        if let Some(e) = end.and_then(|i| self.slots.entry_mut(i)) {
            e.last = true;
        }
    }

    fn previous_member(&self, index: usize, chain: usize) -> Option<usize> {
        let mask = self.slots.mask();
        let mut prev = None;
        let mut i = chain;
        while i != index {
            if self.is_member(i, chain) {
                prev = Some(i);
            }
            i = (i + 1) & mask;
        }
        prev
    }

    fn next_member(&self, chain: usize, after: usize) -> Option<usize> {
        let mask = self.slots.mask();
        let mut i = (after + 1) & mask;
        while i != after {
            if self.is_member(i, chain) {
                return Some(i);
            }
            i = (i + 1) & mask;
        }
        None
    }

    fn next_occupied(&self, from: usize) -> Option<usize> {
        (from..self.capacity()).find(|&i| !self.slots.get(i).is_free())
    }

    /// Where a slot-order scan continues after removing `index`.
    fn resume_after(&self, index: usize, filled_from: Option<usize>) -> Option<usize> {
        match filled_from {
            Some(from) if from > index => self.next_occupied(index),
            _ => self.next_occupied(index + 1),
        }
    }

    fn remove_index(&mut self, index: usize) -> Option<(T, Option<usize>)> {
        let chain = self.chain_of(self.slots.entry(index)?.fragment);
        let prev = self.previous_member(index, chain);
        self.unlink(index, prev)
    }

    /// Take the entry at `index` out of its chain. Returns its payload and,
    /// when a later member was promoted into a vacated root, where that
    /// member came from.
    fn unlink(&mut self, index: usize, prev: Option<usize>) -> Option<(T, Option<usize>)> {
        let entry = self.slots.take(index)?;
        let chain = self.chain_of(entry.fragment);
        self.len -= 1;
        self.bump_epoch();

        let mut filled_from = None;
        if index == chain {
            if !entry.last {
                if let Some(next) = self.next_member(chain, index) {
                    if let Some(moved) = self.slots.take(next) {
                        self.slots.put(index, moved);
                        filled_from = Some(next);
                    }
                }
            }
        } else if entry.last {
            if let Some(e) = prev.and_then(|p| self.slots.entry_mut(p)) {
                e.last = true;
            }
        }
        Some((entry.value, filled_from))
    }
}

/// Iterator over occupied slots in slot order.
pub struct Iter<'a, T, W> {
    inner: core::iter::Enumerate<core::slice::Iter<'a, Slot<T, W>>>,
    epoch: u64,
}

impl<'a, T, W> Iterator for Iter<'a, T, W> {
    type Item = (SlotHandle, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        for (index, slot) in self.inner.by_ref() {
            if let Slot::Occupied(e) = slot {
                let handle = SlotHandle {
                    index: index as u32,
                    epoch: self.epoch,
                };
                return Some((handle, &e.value));
            }
        }
        None
    }
}

/// Mutable iterator over occupied slots in slot order.
pub struct IterMut<'a, T, W> {
    inner: core::iter::Enumerate<core::slice::IterMut<'a, Slot<T, W>>>,
    epoch: u64,
}

impl<'a, T, W> Iterator for IterMut<'a, T, W> {
    type Item = (SlotHandle, &'a mut T);

    fn next(&mut self) -> Option<Self::Item> {
        for (index, slot) in self.inner.by_ref() {
            if let Slot::Occupied(e) = slot {
                let handle = SlotHandle {
                    index: index as u32,
                    epoch: self.epoch,
                };
                return Some((handle, &mut e.value));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    // Entries are (id, hash); equality is on id so hashes can collide freely.
    type Table = RawChainTable<(u32, u64)>;

    fn fixed(slots: usize) -> Table {
        RawChainTable::with_config(TableConfig::new().fixed(slots)).unwrap()
    }

    fn add(t: &mut Table, id: u32, hash: u64) -> SlotHandle {
        let (h, created) = t
            .find_or_insert_with(hash, |e| e.0 == id, || (id, hash))
            .unwrap();
        assert!(created, "id {id} inserted twice");
        h
    }

    fn at(t: &Table, index: usize) -> Option<(u32, bool)> {
        t.slot(index)
            .and_then(Slot::entry)
            .map(|e| (e.value().0, e.is_chain_end()))
    }

    fn find(t: &Table, id: u32, hash: u64) -> Option<usize> {
        t.find(hash, |e| e.0 == id).map(SlotHandle::index)
    }

    #[test]
    fn empty_table_finds_nothing() {
        let t = Table::new();
        assert_eq!(t.capacity(), 0);
        assert!(t.find(3, |_| true).is_none());
        assert!(t.first().is_none());
        assert_eq!(t.ideal_index(3), None);
        t.check_invariants().unwrap();
    }

    #[test]
    fn first_insert_allocates_min_capacity() {
        let mut t = Table::new();
        add(&mut t, 1, 1);
        assert_eq!(t.capacity(), DEFAULT_MIN_CAPACITY);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn insert_or_find_keeps_first_value() {
        let mut t: RawChainTable<(u32, &str)> = RawChainTable::new();
        let (h1, new1) = t
            .find_or_insert_with(9, |e| e.0 == 1, || (1, "first"))
            .unwrap();
        let (h2, new2) = t
            .find_or_insert_with(9, |e| e.0 == 1, || (1, "second"))
            .unwrap();
        assert!(new1);
        assert!(!new2);
        assert_eq!(h1, h2);
        assert_eq!(t.get(h1).map(|e| e.1), Some("first"));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn colliding_entries_append_after_root() {
        let mut t = fixed(8);
        add(&mut t, 10, 3);
        add(&mut t, 11, 3);
        add(&mut t, 12, 3);
        assert_eq!(at(&t, 3), Some((10, false)));
        assert_eq!(at(&t, 4), Some((11, false)));
        assert_eq!(at(&t, 5), Some((12, true)));
        assert!(t.is_root(3));
        assert!(!t.is_root(4));
        t.check_invariants().unwrap();
    }

    #[test]
    fn foreign_occupant_is_bumped_with_its_end_flag() {
        let mut t = fixed(8);
        add(&mut t, 1, 3);
        add(&mut t, 2, 3); // lands in 4, chain-end of chain 3
        add(&mut t, 3, 4); // claims 4 as its own root
        assert_eq!(at(&t, 3), Some((1, false)));
        assert_eq!(at(&t, 4), Some((3, true)));
        assert_eq!(at(&t, 5), Some((2, true)));
        assert_eq!(find(&t, 2, 3), Some(5));
        assert_eq!(find(&t, 3, 4), Some(4));
        t.check_invariants().unwrap();
    }

    #[test]
    fn bump_takes_end_flag_from_passed_member() {
        let mut t = fixed(8);
        add(&mut t, 1, 3);
        add(&mut t, 2, 3); // 4
        add(&mut t, 3, 3); // 5, end
        add(&mut t, 4, 4); // bumps id 2 past id 3
        assert_eq!(at(&t, 4), Some((4, true)));
        assert_eq!(at(&t, 5), Some((3, false)));
        assert_eq!(at(&t, 6), Some((2, true)));
        for (id, hash) in [(1, 3), (2, 3), (3, 3), (4, 4)] {
            assert!(find(&t, id, hash).is_some(), "lost id {id}");
        }
        t.check_invariants().unwrap();
    }

    /// The bump scan passes the occupant's own root; the end flag must be
    /// recomputed rather than carried.
    #[test]
    fn bump_that_wraps_past_its_root_repairs_chain_end() {
        let mut t = fixed(8);
        for id in 0..4 {
            add(&mut t, id, 6); // 6, 7, 0, 1
        }
        for (id, hash) in [(10, 2), (11, 3), (12, 4), (13, 5)] {
            add(&mut t, id, hash);
        }
        assert_eq!(t.len(), 8);
        assert_eq!(t.remove(6, |e| e.0 == 1), Some((1, 6))); // frees 7
        add(&mut t, 20, 1);

        assert_eq!(at(&t, 1), Some((20, true)));
        assert_eq!(at(&t, 7), Some((3, false)));
        assert_eq!(at(&t, 0), Some((2, true)));
        t.check_invariants().unwrap();
        for id in [0, 2, 3] {
            assert!(find(&t, id, 6).is_some(), "lost id {id}");
        }
        assert!(find(&t, 20, 1).is_some());
    }

    #[test]
    fn removing_root_promotes_next_member() {
        let mut t = fixed(8);
        add(&mut t, 1, 3);
        add(&mut t, 2, 3);
        add(&mut t, 3, 3);
        assert_eq!(t.remove(3, |e| e.0 == 1), Some((1, 3)));
        assert_eq!(at(&t, 3), Some((2, false)));
        assert_eq!(at(&t, 4), None);
        assert_eq!(at(&t, 5), Some((3, true)));
        assert_eq!(find(&t, 3, 3), Some(5));
        t.check_invariants().unwrap();
    }

    #[test]
    fn removing_chain_end_hands_flag_back() {
        let mut t = fixed(8);
        add(&mut t, 1, 3);
        add(&mut t, 2, 3);
        add(&mut t, 3, 3);
        assert!(t.remove(3, |e| e.0 == 3).is_some());
        assert_eq!(at(&t, 4), Some((2, true)));
        t.check_invariants().unwrap();
        assert!(t.remove(3, |e| e.0 == 2).is_some());
        assert_eq!(at(&t, 3), Some((1, true)));
        assert!(t.remove(3, |e| e.0 == 1).is_some());
        assert!(t.is_empty());
        t.check_invariants().unwrap();
    }

    #[test]
    fn interior_hole_is_tolerated_and_reused() {
        let mut t = fixed(8);
        add(&mut t, 1, 3);
        add(&mut t, 2, 3);
        add(&mut t, 3, 3);
        assert!(t.remove(3, |e| e.0 == 2).is_some());
        assert_eq!(at(&t, 4), None);
        assert_eq!(find(&t, 3, 3), Some(5));
        add(&mut t, 4, 3);
        assert_eq!(at(&t, 4), Some((4, false)));
        assert_eq!(at(&t, 5), Some((3, true)));
        t.check_invariants().unwrap();
    }

    #[test]
    fn lookup_misses_when_ideal_slot_is_foreign() {
        let mut t = fixed(8);
        add(&mut t, 1, 3);
        add(&mut t, 2, 3); // occupies 4 but is not a root
        assert!(!t.is_root(4));
        assert!(find(&t, 99, 4).is_none());
    }

    #[test]
    fn handles_go_stale_when_entries_move() {
        let mut t = fixed(8);
        let a = add(&mut t, 1, 3);
        let b = add(&mut t, 2, 5);
        // Plain appends do not move anything.
        assert_eq!(t.get(a), Some(&(1, 3)));
        t.remove(5, |e| e.0 == 2);
        assert!(t.get(a).is_none(), "removal invalidates slot handles");
        assert!(t.get(b).is_none());
        let a2 = t.find(3, |e| e.0 == 1).unwrap();
        assert_eq!(a2.index(), a.index());
        assert_eq!(t.get(a2), Some(&(1, 3)));
    }

    #[test]
    fn grows_within_load_band() {
        let mut t = Table::new();
        for id in 0..1000u32 {
            let before = t.capacity();
            add(&mut t, id, u64::from(id).wrapping_mul(0x9e37_79b9_7f4a_7c15));
            assert!(t.capacity().is_power_of_two());
            assert!(t.len() * 4 <= t.capacity() * 3);
            if t.capacity() != before && t.capacity() > t.min_capacity.max(t.floor) {
                assert!(t.len() * 4 > t.capacity(), "over-allocated to {}", t.capacity());
            }
        }
        t.check_invariants().unwrap();
        for id in 0..1000u32 {
            let hash = u64::from(id).wrapping_mul(0x9e37_79b9_7f4a_7c15);
            assert!(find(&t, id, hash).is_some());
        }
    }

    #[test]
    fn insert_after_mass_removal_shrinks() {
        let mut t = Table::new();
        for id in 0..512u32 {
            add(&mut t, id, u64::from(id));
        }
        let big = t.capacity();
        t.retain(|e| e.0 < 4);
        assert_eq!(t.capacity(), big);
        add(&mut t, 1000, 1000);
        assert!(t.capacity() < big);
        assert!(t.capacity() >= DEFAULT_MIN_CAPACITY);
        assert_eq!(t.len(), 5);
        t.check_invariants().unwrap();
    }

    #[test]
    fn fixed_table_reports_full_until_growth_enabled() {
        let mut t = fixed(4);
        for id in 0..4 {
            add(&mut t, id, u64::from(id) * 7);
        }
        let err = t
            .find_or_insert_with(100, |e| e.0 == 100, || (100, 100))
            .unwrap_err();
        assert_eq!(err, TableError::Full { capacity: 4 });
        assert_eq!(t.len(), 4);
        t.set_growth(true);
        add(&mut t, 100, 100);
        assert!(t.capacity() > 4);
        t.check_invariants().unwrap();
    }

    #[test]
    fn fixed_memory_rounds_to_power_of_two() {
        let slot = core::mem::size_of::<Slot<(u32, u64), u32>>();
        let t = Table::with_fixed_memory(slot * 20).unwrap();
        assert_eq!(t.capacity(), 16);
        assert!(!t.growth_enabled());
    }

    #[test]
    fn buffer_round_trip() {
        let buffer = vec![Slot::Free; 12];
        let mut t = Table::from_buffer(buffer);
        assert_eq!(t.capacity(), 8);
        add(&mut t, 1, 1);
        let back = t.into_buffer();
        assert_eq!(back.len(), 8);
        assert_eq!(back.iter().filter(|s| !s.is_free()).count(), 1);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn oversized_fixed_capacity_is_rejected() {
        let err = Table::with_config(TableConfig::new().fixed(MAX_CAPACITY * 2)).unwrap_err();
        assert!(matches!(err, TableError::CapacityOverflow { .. }));
    }

    #[test]
    fn remove_and_advance_visits_each_entry_once() {
        let mut t = Table::new();
        for id in 0..64u32 {
            add(&mut t, id, u64::from(id % 5)); // long, interleaved chains
        }
        let mut seen = BTreeSet::new();
        let mut cursor = t.first();
        while let Some(h) = cursor {
            let id = t.get(h).unwrap().0;
            assert!(seen.insert(id), "id {id} visited twice");
            cursor = if id % 2 == 0 {
                t.remove_and_advance(h).unwrap().1
            } else {
                t.next(h)
            };
            t.check_invariants().unwrap();
        }
        assert_eq!(seen.len(), 64);
        let left: BTreeSet<u32> = t.iter().map(|(_, e)| e.0).collect();
        assert_eq!(left, (0..64).filter(|id| id % 2 == 1).collect());
    }

    #[test]
    fn root_removal_at_wrap_does_not_revisit() {
        let mut t = fixed(8);
        add(&mut t, 1, 7); // 7
        add(&mut t, 2, 7); // wraps to 0
        let mut visited = Vec::new();
        let mut cursor = t.first();
        while let Some(h) = cursor {
            let id = t.get(h).unwrap().0;
            visited.push(id);
            cursor = if id == 1 {
                // Pulls id 2 from slot 0 into slot 7.
                t.remove_and_advance(h).unwrap().1
            } else {
                t.next(h)
            };
        }
        assert_eq!(visited, vec![2, 1]);
        assert_eq!(at(&t, 7), Some((2, true)));
    }

    /// Handles from an epoch exactly 2^32 moves back stay stale.
    #[test]
    fn handle_epoch_does_not_wrap_at_32_bits() {
        let mut t = fixed(8);
        let old = add(&mut t, 1, 3);
        t.remove(3, |e| e.0 == 1);
        t.epoch = old.epoch + (1 << 32);
        add(&mut t, 2, 3);
        assert_eq!(t.find(3, |e| e.0 == 2).map(SlotHandle::index), Some(old.index()));
        assert!(t.get(old).is_none());
        assert!(t.remove_handle(old).is_none());
        assert_eq!(t.len(), 1);
    }

    /// Shrinking on insert lands inside the load band too.
    #[test]
    fn shrink_on_insert_stays_above_quarter_load() {
        let mut t = Table::new();
        for id in 0..2048u32 {
            add(&mut t, id, u64::from(id));
        }
        t.retain(|e| e.0 < 100);
        let before = t.capacity();
        add(&mut t, 5000, 5000);
        assert!(t.capacity() < before);
        assert!(t.len() * 4 > t.capacity());
        assert!(t.len() * 4 <= t.capacity() * 3);
    }

    #[test]
    fn clear_and_purge() {
        let mut t = Table::with_capacity(100);
        let cap = t.capacity();
        add(&mut t, 1, 1);
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.capacity(), cap);
        t.purge();
        assert_eq!(t.capacity(), 0);
        add(&mut t, 1, 1);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn reserve_and_shrink() {
        let mut t = Table::new();
        t.reserve(100);
        let cap = t.capacity();
        assert!(cap * 3 >= 100 * 4);
        for id in 0..100u32 {
            add(&mut t, id, u64::from(id));
        }
        assert_eq!(t.capacity(), cap, "reserve avoids resizes");
        t.retain(|e| e.0 < 3);
        t.shrink_to_fit();
        assert_eq!(t.capacity(), DEFAULT_MIN_CAPACITY);
        t.retain(|_| false);
        t.shrink_to_fit();
        assert_eq!(t.capacity(), 0);
    }

    #[test]
    fn narrow_table_past_two_to_the_fourteenth() {
        let mut t: RawChainTable<u32, u16> = RawChainTable::new();
        let hash = |k: u32| u64::from(k).wrapping_mul(0x9e37_79b9_7f4a_7c15) >> 17;
        for k in 0..13_000u32 {
            let (_, created) = t.find_or_insert_with(hash(k), |&e| e == k, || k).unwrap();
            assert!(created);
        }
        assert!(t.capacity() > 1 << 14);
        t.check_invariants().unwrap();
        for k in 0..13_000u32 {
            assert!(t.find(hash(k), |&e| e == k).is_some());
        }
        assert!(t.find(hash(50_000), |&e| e == 50_000).is_none());
    }

    #[test]
    fn iter_mut_updates_payloads() {
        let mut t: RawChainTable<(u32, u32)> = RawChainTable::new();
        for k in 0..10 {
            t.insert_unique(u64::from(k), (k, 0)).unwrap();
        }
        for (_, e) in t.iter_mut() {
            e.1 = e.0 * 2;
        }
        assert!(t.iter().all(|(_, e)| e.1 == e.0 * 2));
    }
}
