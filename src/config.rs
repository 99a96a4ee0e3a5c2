//! Construction-time settings shared by every table type.

/// Slot count below which the table never shrinks.
pub const DEFAULT_MIN_CAPACITY: usize = 8;

/// Sizing and growth policy for a table.
///
/// ```
/// use chain_table::{RawChainTable, TableConfig};
///
/// let table: RawChainTable<u64> = RawChainTable::with_config(
///     TableConfig::new().min_capacity(32).initial_capacity(100),
/// )
/// .unwrap();
/// assert_eq!(table.capacity(), 256);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableConfig {
    pub(crate) min_capacity: usize,
    pub(crate) initial_capacity: usize,
    pub(crate) fixed_capacity: Option<usize>,
    pub(crate) growth: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            min_capacity: DEFAULT_MIN_CAPACITY,
            initial_capacity: 0,
            fixed_capacity: None,
            growth: true,
        }
    }
}

impl TableConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Smallest slot count used on allocation and the floor for shrinking.
    /// Rounded up to a power of two.
    pub fn min_capacity(self, slots: usize) -> Self {
        Self {
            min_capacity: slots.max(1).next_power_of_two(),
            ..self
        }
    }

    /// Allocate up front for this many entries.
    pub fn initial_capacity(self, entries: usize) -> Self {
        Self {
            initial_capacity: entries,
            ..self
        }
    }

    /// Allocate exactly `slots` slots (rounded down to a power of two) and
    /// never resize. Inserting into a full fixed table fails with
    /// [`TableError::Full`](crate::TableError::Full).
    pub fn fixed(self, slots: usize) -> Self {
        Self {
            fixed_capacity: Some(prev_power_of_two(slots)),
            growth: false,
            ..self
        }
    }

    /// Enable or disable automatic resizing on insert.
    pub fn growth(self, enabled: bool) -> Self {
        Self {
            growth: enabled,
            ..self
        }
    }
}

/// Largest power of two not above `n`, or zero.
pub(crate) fn prev_power_of_two(n: usize) -> usize {
    if n == 0 {
        0
    } else {
        1 << (usize::BITS - 1 - n.leading_zeros())
    }
}
