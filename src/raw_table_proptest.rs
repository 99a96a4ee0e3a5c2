#![cfg(test)]

// Property tests for RawChainTable. Hashes are derived from a small modulus
// so chains get long and interleave, which is where relocation, root
// promotion and end-flag hand-off can go wrong.

use crate::config::TableConfig;
use crate::error::TableError;
use crate::raw_table::RawChainTable;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

type Table = RawChainTable<(u32, u64)>;

#[derive(Clone, Debug)]
enum Op {
    Insert(u32),
    Remove(u32),
    Find(u32),
    Retain(u32),
    // Walk the table removing entries whose id is divisible by the argument.
    DrainWalk(u32),
    Reserve(usize),
    Shrink,
    Clear,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0u32..64).prop_map(Op::Insert),
        3 => (0u32..64).prop_map(Op::Remove),
        2 => (0u32..64).prop_map(Op::Find),
        1 => (2u32..5).prop_map(Op::Retain),
        1 => (2u32..5).prop_map(Op::DrainWalk),
        1 => (0usize..40).prop_map(Op::Reserve),
        1 => Just(Op::Shrink),
        1 => Just(Op::Clear),
    ]
}

// Modulus 0 selects a well-spread hash; anything else folds ids into that
// many buckets.
fn hash_of(id: u32, modulus: u64) -> u64 {
    if modulus == 0 {
        u64::from(id).wrapping_mul(0x9e37_79b9_7f4a_7c15)
    } else {
        u64::from(id) % modulus
    }
}

fn ids(t: &Table) -> BTreeSet<u32> {
    t.iter().map(|(_, e)| e.0).collect()
}

// Property: the table agrees with a BTreeMap model through random
// operation sequences and keeps a valid chain layout after every step.
// - Every present id is found; every absent id is not.
// - `remove_and_advance` walks visit each entry exactly once.
// - Growable tables stay within the 3/4 load bound after inserts, and an
//   insert that resizes lands above 1/4 load unless clamped by the floor.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_model_equivalence(
        modulus in prop_oneof![Just(0u64), 1u64..12],
        ops in proptest::collection::vec(arb_op(), 1..120),
    ) {
        let mut t = Table::new();
        let mut model: BTreeMap<u32, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(id) => {
                    let hash = hash_of(id, modulus);
                    let before = t.capacity();
                    let (h, created) = t
                        .find_or_insert_with(hash, |e| e.0 == id, || (id, hash))
                        .unwrap();
                    prop_assert_eq!(created, model.insert(id, hash).is_none());
                    prop_assert_eq!(t.get(h), Some(&(id, hash)));
                    prop_assert!(t.len() * 4 <= t.capacity() * 3);
                    if t.capacity() != before && t.capacity() > t.resize_floor() {
                        prop_assert!(t.len() * 4 > t.capacity(), "resized to {} for {} entries", t.capacity(), t.len());
                    }
                }
                Op::Remove(id) => {
                    let hash = hash_of(id, modulus);
                    let got = t.remove(hash, |e| e.0 == id);
                    prop_assert_eq!(got, model.remove(&id).map(|h| (id, h)));
                }
                Op::Find(id) => {
                    let found = t.find(hash_of(id, modulus), |e| e.0 == id);
                    prop_assert_eq!(found.is_some(), model.contains_key(&id));
                }
                Op::Retain(m) => {
                    t.retain(|e| e.0 % m != 0);
                    model.retain(|id, _| id % m != 0);
                }
                Op::DrainWalk(m) => {
                    let before = ids(&t);
                    let mut seen = BTreeSet::new();
                    let mut cursor = t.first();
                    while let Some(h) = cursor {
                        let id = t.get(h).map(|e| e.0).unwrap();
                        prop_assert!(seen.insert(id), "id {} visited twice", id);
                        cursor = if id % m == 0 {
                            let (removed, next) = t.remove_and_advance(h).unwrap();
                            prop_assert_eq!(removed.0, id);
                            model.remove(&id);
                            next
                        } else {
                            t.next(h)
                        };
                    }
                    prop_assert_eq!(seen, before);
                }
                Op::Reserve(n) => {
                    t.reserve(n);
                    prop_assert!((t.len() + n) * 4 <= t.capacity() * 3);
                }
                Op::Shrink => t.shrink_to_fit(),
                Op::Clear => {
                    t.clear();
                    model.clear();
                }
            }

            t.check_invariants().map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(t.len(), model.len());
            prop_assert_eq!(ids(&t), model.keys().copied().collect::<BTreeSet<_>>());
        }
        for (&id, &hash) in &model {
            prop_assert!(t.find(hash, |e| e.0 == id).is_some(), "lost id {}", id);
        }
    }
}

// Property: a fixed table accepts inserts until every slot is used, then
// reports Full without disturbing its contents; removals make room again.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_fixed_table_fills_completely(
        slots_log2 in 1u32..6,
        modulus in 1u64..20,
        removals in proptest::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let slots = 1usize << slots_log2;
        let mut t = Table::with_config(TableConfig::new().fixed(slots)).unwrap();
        for id in 0..slots as u32 {
            let hash = hash_of(id, modulus);
            t.insert_unique(hash, (id, hash)).unwrap();
            t.check_invariants().map_err(|e| TestCaseError::fail(e.to_string()))?;
        }
        prop_assert_eq!(t.len(), slots);
        let extra = slots as u32 + 1;
        let err = t.insert_unique(hash_of(extra, modulus), (extra, 0)).unwrap_err();
        prop_assert_eq!(err, TableError::Full { capacity: slots });
        prop_assert_eq!(t.len(), slots);

        let mut present: Vec<u32> = (0..slots as u32).collect();
        for ix in removals {
            if present.is_empty() {
                break;
            }
            let id = present.swap_remove(ix.index(present.len()));
            prop_assert!(t.remove(hash_of(id, modulus), |e| e.0 == id).is_some());
            t.check_invariants().map_err(|e| TestCaseError::fail(e.to_string()))?;
        }
        for &id in &present {
            prop_assert!(t.find(hash_of(id, modulus), |e| e.0 == id).is_some());
        }
        // Refill whatever was freed.
        for id in 100..100 + (slots - present.len()) as u32 {
            let hash = hash_of(id, modulus);
            t.insert_unique(hash, (id, hash)).unwrap();
        }
        prop_assert_eq!(t.len(), slots);
        t.check_invariants().map_err(|e| TestCaseError::fail(e.to_string()))?;
    }
}
