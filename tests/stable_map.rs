// StableMap integration tests.
//
// The invariants exercised:
// - Handle stability: a handle resolves to its entry until that entry is
//   removed, across growth, shrinking and removal of other entries.
// - No aliasing: a removed handle never resolves to a later entry.
// - Insertion order: `iter` and the `first`/`next` walk follow insertion
//   order and tolerate removal of entries other than the current one.
// - Insert-or-find: a present key keeps its value and handle.
use chain_table::{Handle, StableMap, TableConfig, TableError};
use std::collections::hash_map::RandomState;

// Test: handles survive growth and shrinking.
#[test]
fn handles_survive_resizes() {
    let mut m: StableMap<String, usize> = StableMap::new();
    let handles: Vec<Handle> = (0..3000).map(|i| m.insert(format!("k{i}"), i).0).collect();
    m.retain(|_, v| *v % 100 == 0);
    m.insert("trigger".to_string(), 0);
    m.shrink_to_fit();
    for (i, h) in handles.iter().enumerate() {
        if i % 100 == 0 {
            assert_eq!(h.value(&m), Some(&i));
            assert_eq!(h.key(&m), Some(&format!("k{i}")));
        } else {
            assert!(h.value(&m).is_none());
        }
    }
    m.check_invariants().unwrap();
}

// Test: removal by handle, then reuse of the freed record.
// Verifies: the old handle stays dead; the new one is distinct.
#[test]
fn removed_handle_never_aliases() {
    let mut m: StableMap<u32, &str> = StableMap::new();
    let mut dead = Vec::new();
    for round in 0..50 {
        let (h, _) = m.insert(round, "v");
        assert_eq!(m.remove_handle(h), Some((round, "v")));
        dead.push(h);
        let (live, _) = m.insert(1000 + round, "w");
        assert!(!dead.contains(&live));
    }
    for h in &dead {
        assert!(h.value(&m).is_none());
        assert!(m.remove_handle(*h).is_none());
    }
    assert_eq!(m.len(), 50);
}

// Test: the cursor walk removes entries ahead of and behind itself.
#[test]
fn walk_in_insertion_order_with_removals() {
    let mut m: StableMap<u32, u32> = StableMap::new();
    for k in [40, 10, 30, 20, 50] {
        m.insert(k, k);
    }
    let mut visited = Vec::new();
    let mut cursor = m.first();
    while let Some(h) = cursor {
        let k = *h.key(&m).unwrap();
        visited.push(k);
        if k == 30 {
            m.remove(&40);
            m.remove(&20);
        }
        cursor = m.next(h);
    }
    assert_eq!(visited, [40, 10, 30, 50]);
    let keys: Vec<u32> = m.iter().map(|(_, k, _)| *k).collect();
    assert_eq!(keys, [10, 30, 50]);
}

// Test: insert-or-find keeps the first value and handle.
#[test]
fn reinsert_returns_existing_handle() {
    let mut m: StableMap<&str, Vec<u8>> = StableMap::new();
    let (h, created) = m.insert("k", vec![1]);
    assert!(created);
    h.value_mut(&mut m).unwrap().push(2);
    let (again, created) = m.insert("k", vec![9]);
    assert!(!created);
    assert_eq!(again, h);
    assert_eq!(m.get("k"), Some(&vec![1, 2]));
}

// Test: a fixed index refuses new keys and leaves both layers unchanged.
#[test]
fn fixed_index_reports_full() {
    let mut m: StableMap<u32, u32> =
        StableMap::with_config_and_hasher(TableConfig::new().fixed(8), RandomState::new()).unwrap();
    for k in 0..8 {
        m.try_insert(k, k).unwrap();
    }
    assert_eq!(m.try_insert(8, 8), Err(TableError::Full { capacity: 8 }));
    assert_eq!(m.len(), 8);
    assert_eq!(m.iter().count(), 8);
    m.check_invariants().unwrap();
}

// Test: clear drops everything and invalidates all handles.
#[test]
fn clear_invalidates_handles() {
    let mut m: StableMap<u32, u32> = StableMap::with_capacity(16);
    let hs: Vec<Handle> = (0..10).map(|k| m.insert(k, k).0).collect();
    m.clear();
    assert!(m.is_empty());
    assert!(m.first().is_none());
    assert!(hs.iter().all(|h| h.value(&m).is_none()));
    m.insert(3, 3);
    assert_eq!(m.get(&3), Some(&3));
}
