//! Backing array: a flat, power-of-two run of tagged slots.

use crate::control::ControlWord;
use crate::error::TableError;

/// One occupied slot.
#[derive(Debug, Clone)]
pub struct Entry<T, W = u32> {
    pub(crate) fragment: W,
    pub(crate) last: bool,
    pub(crate) value: T,
}

impl<T, W: ControlWord> Entry<T, W> {
    pub(crate) fn new(fragment: W, last: bool, value: T) -> Self {
        Self {
            fragment,
            last,
            value,
        }
    }

    /// Stored low bits of the entry's hash.
    pub fn fragment(&self) -> W {
        self.fragment
    }

    /// Whether this entry ends its collision chain.
    pub fn is_chain_end(&self) -> bool {
        self.last
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

/// Content of one cell of the backing array.
#[derive(Debug, Clone)]
pub enum Slot<T, W = u32> {
    Free,
    Occupied(Entry<T, W>),
}

impl<T, W> Default for Slot<T, W> {
    fn default() -> Self {
        Slot::Free
    }
}

impl<T, W> Slot<T, W> {
    pub fn is_free(&self) -> bool {
        matches!(self, Slot::Free)
    }

    pub fn entry(&self) -> Option<&Entry<T, W>> {
        match self {
            Slot::Free => None,
            Slot::Occupied(e) => Some(e),
        }
    }
}

/// Owned slot storage. The length is always zero or a power of two; callers
/// ask for exact sizes and nothing here rounds.
#[derive(Debug, Clone)]
pub(crate) struct SlotArray<T, W> {
    slots: Vec<Slot<T, W>>,
}

impl<T, W: ControlWord> SlotArray<T, W> {
    pub(crate) const fn empty() -> Self {
        Self { slots: Vec::new() }
    }

    pub(crate) fn allocate(capacity: usize) -> Result<Self, TableError> {
        debug_assert!(capacity.is_power_of_two());
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| TableError::AllocFailed { slots: capacity })?;
        slots.resize_with(capacity, || Slot::Free);
        Ok(Self { slots })
    }

    /// Adopt a caller buffer, keeping its largest power-of-two prefix and
    /// dropping whatever it held.
    pub(crate) fn adopt(mut buffer: Vec<Slot<T, W>>, capacity: usize) -> Self {
        debug_assert!(capacity == 0 || capacity.is_power_of_two());
        buffer.truncate(capacity);
        for slot in buffer.iter_mut() {
            *slot = Slot::Free;
        }
        Self { slots: buffer }
    }

    pub(crate) fn into_vec(self) -> Vec<Slot<T, W>> {
        self.slots
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// `capacity - 1`; only meaningful once allocated.
    #[inline]
    pub(crate) fn mask(&self) -> usize {
        self.slots.len().wrapping_sub(1)
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> &Slot<T, W> {
        &self.slots[index]
    }

    #[inline]
    pub(crate) fn entry(&self, index: usize) -> Option<&Entry<T, W>> {
        self.slots[index].entry()
    }

    #[inline]
    pub(crate) fn entry_mut(&mut self, index: usize) -> Option<&mut Entry<T, W>> {
        match &mut self.slots[index] {
            Slot::Free => None,
            Slot::Occupied(e) => Some(e),
        }
    }

    /// Move the entry out, leaving the slot free.
    #[inline]
    pub(crate) fn take(&mut self, index: usize) -> Option<Entry<T, W>> {
        match core::mem::take(&mut self.slots[index]) {
            Slot::Free => None,
            Slot::Occupied(e) => Some(e),
        }
    }

    #[inline]
    pub(crate) fn put(&mut self, index: usize, entry: Entry<T, W>) {
        debug_assert!(self.slots[index].is_free());
        self.slots[index] = Slot::Occupied(entry);
    }

    pub(crate) fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = Slot::Free;
        }
    }

    pub(crate) fn as_slice(&self) -> &[Slot<T, W>] {
        &self.slots
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Slot<T, W>] {
        &mut self.slots
    }

    /// Consume the array, yielding entries from the highest index down.
    pub(crate) fn into_entries_rev(self) -> impl Iterator<Item = Entry<T, W>> {
        self.slots.into_iter().rev().filter_map(|s| match s {
            Slot::Free => None,
            Slot::Occupied(e) => Some(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_is_exact_and_free() {
        let a: SlotArray<u8, u32> = SlotArray::allocate(16).unwrap();
        assert_eq!(a.capacity(), 16);
        assert_eq!(a.mask(), 15);
        assert!(a.as_slice().iter().all(Slot::is_free));
    }

    #[test]
    fn take_and_put_move_ownership() {
        let mut a: SlotArray<String, u16> = SlotArray::allocate(4).unwrap();
        a.put(2, Entry::new(7, true, "x".to_string()));
        assert_eq!(a.entry(2).map(|e| e.value().as_str()), Some("x"));
        let e = a.take(2).unwrap();
        assert!(a.get(2).is_free());
        assert_eq!(e.value, "x");
        assert!(a.take(2).is_none());
    }

    #[test]
    fn adopt_truncates_and_clears() {
        let buf = vec![Slot::Occupied(Entry::new(1u32, false, 5u64)); 11];
        let a = SlotArray::adopt(buf, 8);
        assert_eq!(a.capacity(), 8);
        assert!(a.as_slice().iter().all(Slot::is_free));
    }

    #[test]
    fn entries_rev_skips_free() {
        let mut a: SlotArray<u8, u32> = SlotArray::allocate(8).unwrap();
        a.put(1, Entry::new(1, true, 10));
        a.put(6, Entry::new(6, true, 60));
        let got: Vec<u8> = a.into_entries_rev().map(|e| e.value).collect();
        assert_eq!(got, vec![60, 10]);
    }
}
