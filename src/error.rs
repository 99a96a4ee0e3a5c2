//! Error types for table growth and structural verification.

/// Failure to make room for an entry.
///
/// Lookups and removals never produce this; an absent key is reported as
/// `None`. These errors mean the table could not proceed without breaking
/// its layout, so the convenience methods (`insert`, `reserve`, ...) treat
/// them as fatal.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// The requested slot count does not fit the handle index width.
    #[error("capacity overflow: {requested} entries need more than {max} slots")]
    CapacityOverflow { requested: usize, max: usize },

    /// The backing array could not be allocated.
    #[error("failed to allocate a backing array of {slots} slots")]
    AllocFailed { slots: usize },

    /// Growth is disabled and every slot is occupied.
    #[error("fixed-capacity table is full ({capacity} slots)")]
    Full { capacity: usize },
}

/// A structural invariant that does not hold. Returned by `check_invariants`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    #[error("capacity {capacity} is not a power of two")]
    NotPowerOfTwo { capacity: usize },

    #[error("recorded length {recorded} but {counted} occupied slots")]
    LenMismatch { recorded: usize, counted: usize },

    /// An entry exists for a chain whose ideal slot does not hold a root.
    #[error("slot {index} belongs to chain {chain}, which has no root")]
    MissingRoot { index: usize, chain: usize },

    /// An entry sits past its chain's end flag.
    #[error("slot {index} is not reachable from the root of chain {chain}")]
    Unreachable { index: usize, chain: usize },

    #[error("chain {chain} has {count} chain-end entries")]
    ChainEnds { chain: usize, count: usize },

    /// The stable map's index and record list disagree on membership.
    #[error("index holds {indexed} entries but the record list holds {records}")]
    LayerMismatch { indexed: usize, records: usize },
}

/// Abort the current operation on an unrecoverable growth failure.
#[cold]
#[track_caller]
pub(crate) fn fail_fast(err: TableError) -> ! {
    #[cfg(feature = "logging")]
    log::error!("chain table cannot continue: {err}");

    panic!("{err}")
}
