#![cfg(test)]

// Property tests for StableMap and ChainMap kept inside the crate so they
// can reach `check_invariants` on every layer.

use crate::chain_map::ChainMap;
use crate::stable_map::{Handle, StableMap};
use proptest::prelude::*;
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};
use std::rc::Rc;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    InsertWith(usize, i32),
    Remove(usize),
    RemoveHandle(usize),
    Find(usize),
    Contains(String),
    Mutate(usize, i32),
    Retain(i32),
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=12).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            3 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::InsertWith(i, v)),
            1 => idx.clone().prop_map(OpI::Remove),
            1 => idx.clone().prop_map(OpI::RemoveHandle),
            1 => idx.clone().prop_map(OpI::Find),
            1 => prop_oneof![contains_pool, "[a-z]{0,5}"].prop_map(OpI::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => (2i32..5).prop_map(OpI::Retain),
            1 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Drive a StableMap and a HashMap model through the same operations. An
// insertion-order list of live keys models `iter`.
fn run_state_machine<S>(
    mut sut: StableMap<Key, i32, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError>
where
    S: BuildHasher,
{
    let mut model: HashMap<Key, i32> = HashMap::new();
    let mut order: Vec<Key> = Vec::new();
    let mut live: HashMap<Key, Handle> = HashMap::new();
    let mut stale: Vec<Handle> = Vec::new();
    let default_calls = Rc::new(Cell::new(0));

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(pool, i);
                let already = model.contains_key(&k);
                let (h, created) = sut.insert(k.clone(), v);
                prop_assert_eq!(created, !already);
                if created {
                    live.insert(k.clone(), h);
                    order.push(k.clone());
                    model.insert(k, v);
                } else {
                    prop_assert_eq!(Some(&h), live.get(&k), "existing handle returned");
                }
            }
            OpI::InsertWith(i, v) => {
                let k = key_from(pool, i);
                let already = model.contains_key(&k);
                let counter = default_calls.clone();
                let before = counter.get();
                let (h, created) = sut.insert_with(k.clone(), move || {
                    counter.set(counter.get() + 1);
                    v
                });
                prop_assert_eq!(created, !already);
                if created {
                    prop_assert_eq!(default_calls.get(), before + 1);
                    live.insert(k.clone(), h);
                    order.push(k.clone());
                    model.insert(k, v);
                } else {
                    prop_assert_eq!(default_calls.get(), before, "default must not run on a present key");
                }
            }
            OpI::Remove(i) => {
                let k = key_from(pool, i);
                let got = sut.remove(k.0.as_str());
                prop_assert_eq!(got.map(|(_, v)| v), model.remove(&k));
                if let Some(h) = live.remove(&k) {
                    stale.push(h);
                    order.retain(|o| *o != k);
                }
            }
            OpI::RemoveHandle(i) => {
                let k = key_from(pool, i);
                if let Some(h) = live.remove(&k) {
                    let (kk, vv) = sut.remove_handle(h).expect("live handle removes");
                    prop_assert!(kk == k);
                    prop_assert_eq!(Some(vv), model.remove(&k));
                    order.retain(|o| *o != k);
                    stale.push(h);
                }
            }
            OpI::Find(i) => {
                let k = key_from(pool, i);
                let found = sut.find(&k);
                prop_assert_eq!(found, live.get(&k).copied());
            }
            OpI::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            OpI::Mutate(i, d) => {
                let k = key_from(pool, i);
                if let Some(&h) = live.get(&k) {
                    let vr = h.value_mut(&mut sut);
                    prop_assert!(vr.is_some(), "live handle should resolve");
                    if let Some(vr) = vr {
                        *vr = vr.wrapping_add(d);
                    }
                    if let Some(mv) = model.get_mut(&k) {
                        *mv = mv.wrapping_add(d);
                    }
                }
            }
            OpI::Retain(m) => {
                sut.retain(|_, v| v.rem_euclid(m) != 0);
                let dropped: Vec<Key> = model
                    .iter()
                    .filter(|(_, v)| v.rem_euclid(m) == 0)
                    .map(|(k, _)| k.clone())
                    .collect();
                for k in dropped {
                    model.remove(&k);
                    order.retain(|o| *o != k);
                    if let Some(h) = live.remove(&k) {
                        stale.push(h);
                    }
                }
            }
            OpI::Iterate => {
                let s_keys: Vec<Key> = sut.iter().map(|(_, k, _)| k.clone()).collect();
                prop_assert_eq!(&s_keys, &order, "iteration follows insertion order");
                for (h, k, v) in sut.iter() {
                    prop_assert_eq!(live.get(k), Some(&h));
                    prop_assert_eq!(model.get(k), Some(v));
                }
            }
        }

        // Post-conditions after each op
        for &h in &stale {
            prop_assert!(h.value(&sut).is_none());
        }
        for (k, h) in &live {
            prop_assert_eq!(h.key(&sut), Some(k));
            prop_assert_eq!(h.value(&sut), model.get(k));
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        sut.check_invariants()
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// - Insert-or-find: a present key returns its existing handle, keeps its
//   value, and never runs the default closure.
// - Handles of live entries keep resolving across rehashes and removals of
//   other entries; removed handles never resolve again.
// - `iter` follows insertion order.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(StableMap::new(), &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_state_machine(StableMap::with_hasher(ConstBuildHasher), &pool, ops)?;
    }
}

// Property: ChainMap and StableMap agree on contents for the same
// operations, and ChainMap keeps a valid layout throughout.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_chain_map_matches_stable_map(
        ops in proptest::collection::vec((any::<bool>(), 0u16..200, any::<u32>()), 1..300),
    ) {
        let mut chain: ChainMap<u16, u32> = ChainMap::new();
        let mut stable: StableMap<u16, u32> = StableMap::new();
        for (insert, k, v) in ops {
            if insert {
                let (_, a) = chain.insert(k, v);
                let (_, b) = stable.insert(k, v);
                prop_assert_eq!(a, b);
            } else {
                prop_assert_eq!(chain.remove(&k), stable.remove(&k));
            }
            prop_assert_eq!(chain.get(&k), stable.get(&k));
            prop_assert_eq!(chain.len(), stable.len());
            chain.check_invariants().map_err(|e| TestCaseError::fail(e.to_string()))?;
        }
        let a: BTreeSet<(u16, u32)> = chain.iter().map(|(_, k, v)| (*k, *v)).collect();
        let b: BTreeSet<(u16, u32)> = stable.iter().map(|(_, k, v)| (*k, *v)).collect();
        prop_assert_eq!(a, b);
        stable.check_invariants().map_err(|e| TestCaseError::fail(e.to_string()))?;
    }
}
