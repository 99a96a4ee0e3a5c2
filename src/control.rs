//! Hash fragment widths.
//!
//! Every occupied slot keeps the low bits of its entry's hash. The fragment
//! is compared before the full key on lookup, and it is the only input to
//! the ideal index, so rehashing never calls back into user `Hash` code.
//! Narrow (`u16`) fragments suit tiny payloads where a 32-bit word would
//! dominate the slot size.

use core::fmt::Debug;
use core::hash::Hash;

mod sealed {
    pub trait Sealed {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
}

/// Width of the stored hash fragment.
pub trait ControlWord: Copy + Eq + Hash + Debug + sealed::Sealed {
    /// Number of hash bits kept per entry.
    const BITS: u32;

    /// Truncate a full hash to its fragment.
    fn from_hash(hash: u64) -> Self;

    /// Zero-extended fragment.
    fn widen(self) -> usize;

    /// The fragment repeated across the whole index width.
    ///
    /// Masking this with `capacity - 1` gives the ideal index. Without the
    /// repetition, tables wider than the fragment would only ever place
    /// roots in their first `2^BITS` slots.
    #[inline]
    fn spread(self) -> usize {
        let f = self.widen();
        let mut out = f;
        let mut shift = Self::BITS;
        while shift < usize::BITS {
            out |= f << shift;
            shift += Self::BITS;
        }
        out
    }
}

impl ControlWord for u16 {
    const BITS: u32 = 16;

    #[inline]
    fn from_hash(hash: u64) -> Self {
        hash as u16
    }

    #[inline]
    fn widen(self) -> usize {
        self as usize
    }
}

impl ControlWord for u32 {
    const BITS: u32 = 32;

    #[inline]
    fn from_hash(hash: u64) -> Self {
        hash as u32
    }

    #[inline]
    fn widen(self) -> usize {
        self as usize
    }
}
