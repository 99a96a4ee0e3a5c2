//! chain-table: an open-addressing hash table that keeps its collision
//! chains inside the slot array, plus a variant with stable handles.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a compact hash table whose worst case stays bounded by chain
//!   length rather than cluster length, built in layers that can be checked
//!   independently.
//! - Layers:
//!   - RawChainTable<T, W>: the slot array and chain discipline. Callers
//!     pass a 64-bit hash and an equality closure; the table stores a hash
//!     fragment of width `W` next to each payload and never hashes anything
//!     itself.
//!   - ChainMap<K, V, S, W>: typed key/value map over the raw table. Its
//!     `SlotHandle`s are slot positions and go stale when entries move.
//!   - StableMap<K, V, S>: keys and values live in a generational record
//!     list; the raw table only indexes record keys. Its `Handle`s stay
//!     valid until their own entry is removed.
//!
//! Layout
//! - Capacity is zero or a power of two. A key's ideal slot is
//!   `spread(fragment) & (capacity - 1)`, where `spread` repeats the
//!   fragment across the machine word so narrow fragments still address
//!   large tables.
//! - The entry sitting at its own ideal slot is the chain root. Further
//!   members follow in forward (wrapping) order, possibly interleaved with
//!   other chains, and exactly one member carries the chain-end flag.
//! - An occupant of some other chain found at a new key's ideal slot is
//!   bumped to the next free slot, so every chain with members has its
//!   root. Lookups therefore cost one probe when the ideal slot holds no
//!   root.
//!
//! Constraints
//! - Single-threaded use per table: the typed maps are `Send` but `!Sync`.
//! - No per-entry heap allocation in the raw table or `ChainMap`.
//! - Insert-or-find semantics: inserting a present key keeps the stored
//!   entry and reports `false`.
//! - Reentrancy: the typed maps call `K: Hash/Eq` while probing and a debug
//!   guard panics if that code reaches back into the same map.
//!
//! Hasher and rehashing invariants
//! - Rehashing places entries again from their stored fragments and never
//!   calls `K: Hash`. `StableMap` additionally keeps the full `u64` hash per
//!   record so removal by handle needs no hashing either.
//!
//! Growth
//! - Growable tables keep the load at or below three quarters and resize to
//!   the smallest power of two giving at most half load. An insert into a
//!   table loaded below one quarter shrinks it, never under the configured
//!   minimum or any explicitly reserved capacity. Fixed tables report
//!   `TableError::Full` instead of resizing.
//!
//! Notes and non-goals
//! - Iteration order of `ChainMap` is slot order and carries no meaning;
//!   `StableMap` iterates in insertion order.
//! - Keys are immutable after insertion; there is no `key_mut`.
//! - Enable the `logging` feature to get `log` records for rehashes and
//!   fatal growth failures.

pub mod chain_map;
pub mod config;
pub mod control;
pub mod error;
pub mod raw_table;
mod raw_table_proptest;
mod record_list;
mod reentrancy;
pub mod slots;
pub mod stable_map;
mod stable_map_proptest;

// Public surface
pub use chain_map::{ChainMap, NarrowChainMap};
pub use config::{TableConfig, DEFAULT_MIN_CAPACITY};
pub use control::ControlWord;
pub use error::{InvariantError, TableError};
pub use raw_table::{RawChainTable, SlotHandle, MAX_CAPACITY};
pub use record_list::RecordKey;
pub use slots::{Entry, Slot};
pub use stable_map::{Handle, StableMap};
