// ChainTable integration suite.
//
// Each test replays one scenario against a table preloaded with the fixed
// uuid key set. The core invariants exercised:
// - Growth: every key stays reachable whatever the initial capacity hint.
// - Uniqueness: len equals the number of distinct live keys.
// - Removal: explicit, stolen, in-walk and predicate removals all keep
//   len consistent with the keys still reachable.
// - Walk lock: only the visited entry may be removed during for_each.
mod common;

use chain_table::{ChainTable, TableError};
use common::{init_table, init_test_logger, uuids, uuids_new, uuids_subset};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

// Test: growth transparency.
// Verifies: all keys retrievable and len correct for hints 1, 10 and 42.
#[test]
fn grow_from_small_hints() {
    for hint in [1, 10, 42] {
        let t = init_table(hint);
        assert_eq!(t.len(), uuids().len(), "hint {hint}");
        assert!(t.capacity() > hint);
        for (i, k) in uuids().iter().enumerate() {
            assert_eq!(t.lookup(k), Some(&i));
        }
    }
}

// Test: upsert of existing and new keys.
// Verifies: existing keys are overwritten in place, new keys are added.
#[test]
fn update_existing_and_new() {
    let mut t = init_table(0);
    for k in uuids_subset() {
        t.upsert(&k, usize::MAX).unwrap();
    }
    for k in uuids_new() {
        t.upsert(&k, usize::MAX).unwrap();
    }
    assert_eq!(t.len(), uuids().len() + uuids_new().len());
    for k in uuids_subset().iter().chain(uuids_new().iter()) {
        assert_eq!(t.lookup(k), Some(&usize::MAX));
    }
}

// Test: round-trip of upsert then lookup for every key.
#[test]
fn upsert_then_lookup_round_trips() {
    let mut t: ChainTable<String> = ChainTable::with_capacity(1);
    for k in uuids() {
        t.upsert(&k, k.to_uppercase()).unwrap();
    }
    for k in uuids() {
        assert_eq!(t.lookup(&k), Some(&k.to_uppercase()));
    }
}

// Test: explicit removal of a subset.
#[test]
fn remove_subset() {
    let mut t = init_table(0);
    for k in uuids_subset() {
        t.remove(&k).unwrap();
    }
    assert_eq!(t.len(), uuids().len() - uuids_subset().len());
    for k in uuids_subset() {
        assert!(t.lookup(&k).is_none());
        assert_eq!(t.remove(&k), Err(TableError::NotFound));
    }
    let subset = uuids_subset();
    for k in uuids().iter().filter(|k| !subset.contains(k)) {
        assert!(t.contains_key(k));
    }
}

// Test: removing five keys, two of them by name.
#[test]
fn remove_two_of_five() {
    let mut t: ChainTable<&'static str> = ChainTable::new();
    for k in ["A", "B", "C", "D", "E"] {
        t.insert(k, k).unwrap();
    }
    t.remove("B").unwrap();
    t.remove("D").unwrap();
    assert_eq!(t.len(), 3);
    assert!(t.lookup("B").is_none());
    assert!(t.lookup("D").is_none());
    for k in ["A", "C", "E"] {
        assert_eq!(t.lookup(k), Some(&k));
    }
}

// Test: walk whose visitor removes only subset keys.
// Verifies: every entry is visited once; len drops by the subset size.
#[test]
fn remove_in_walk_some() {
    let mut t = init_table(0);
    let subset = uuids_subset();
    let visited = t
        .for_each(|v| {
            if subset.iter().any(|k| k == v.key()) {
                v.remove().unwrap();
            }
        })
        .unwrap();
    assert_eq!(visited, uuids().len());
    assert_eq!(t.len(), uuids().len() - subset.len());
}

// Test: walk whose visitor removes every entry it sees.
#[test]
fn remove_in_walk_all() {
    let mut t = init_table(0);
    let visited = t
        .for_each(|v| {
            let key = v.key().to_string();
            v.table().remove(&key).unwrap();
        })
        .unwrap();
    assert_eq!(visited, uuids().len());
    assert_eq!(t.len(), 0);
    assert!(t.is_empty());
}

// Test: walk whose visitor tries to remove a different subset key.
// Verifies: each attempt fails with Locked and nothing is removed.
#[test]
fn remove_in_walk_forbidden() {
    let mut t = init_table(0);
    let subset = uuids_subset();
    let mut refused = 0;
    let visited = t
        .for_each(|v| {
            if let Some(i) = subset.iter().position(|k| k == v.key()) {
                let next = &subset[(i + 1) % subset.len()];
                let before = v.table().len();
                assert_eq!(v.table().remove(next), Err(TableError::Locked));
                assert_eq!(v.table().len(), before);
                refused += 1;
            }
        })
        .unwrap();
    assert_eq!(visited, uuids().len());
    assert_eq!(refused, subset.len());
    assert_eq!(t.len(), uuids().len());
}

// Test: steal transfers ownership without the deallocator.
#[test]
fn steal_subset() {
    init_test_logger();
    let freed = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&freed);
    let mut t: ChainTable<usize> = ChainTable::builder()
        .deallocator(move |v, _| sink.borrow_mut().push(v))
        .build()
        .unwrap();
    for (i, k) in uuids().iter().enumerate() {
        t.insert(k, i).unwrap();
    }
    for k in uuids_subset() {
        let v = t.steal(&k).unwrap();
        assert_eq!(uuids()[v], k);
        assert!(t.lookup(&k).is_none());
    }
    assert!(freed.borrow().is_empty());
    assert_eq!(t.len(), uuids().len() - uuids_subset().len());

    drop(t);
    assert_eq!(freed.borrow().len(), uuids().len() - uuids_subset().len());
}

// Test: every mutation other than removing the visited entry is refused
// inside a walk, including starting another walk.
#[test]
fn forbidden_ops_in_walk() {
    let mut t = init_table(0);
    let fresh = uuids_new();
    let new_key = &fresh[0];
    let keys = uuids();
    let visited = t
        .for_each(|v| {
            let other = if v.key() == keys[0] { &keys[1] } else { &keys[0] };
            let mut table = v.table();
            let before = table.len();
            assert_eq!(table.insert(new_key, 0).unwrap_err().error(), TableError::Locked);
            assert_eq!(table.upsert(new_key, 0).unwrap_err().error(), TableError::Locked);
            assert_eq!(table.steal(other), Err(TableError::Locked));
            assert_eq!(table.remove(other), Err(TableError::Locked));
            assert_eq!(table.for_each(|_| {}), Err(TableError::Locked));
            assert_eq!(table.len(), before);
            assert!(table.contains_key(other));
        })
        .unwrap();
    assert_eq!(visited, uuids().len());
    assert_eq!(t.len(), uuids().len());
    assert!(!t.contains_key(new_key));
}

// Test: predicate removal with a seeded random selector.
// Verifies: the returned count matches the predicate's own tally and len.
#[test]
fn remove_set_seeded() {
    let mut t = init_table(0);
    let subset = uuids_subset();
    let mut rng = StdRng::seed_from_u64(9000);
    let mut marked = 0;
    let removed = t
        .remove_set(|k, _| {
            let rem = subset.iter().any(|s| s == k) || rng.gen_bool(0.5);
            if rem {
                marked += 1;
            }
            rem
        })
        .unwrap();
    assert_eq!(removed, marked);
    assert_eq!(t.len(), uuids().len() - marked);
    for k in &subset {
        assert!(!t.contains_key(k));
    }
}

// Test: search for exactly one known key.
#[test]
fn search_single_key() {
    let t = init_table(0);
    let subset = uuids_subset();
    let target = &subset[subset.len() / 2];
    let all = uuids();
    let found = t.search(|k, _| k == target).copied();
    assert_eq!(found.map(|i| &all[i]), Some(target));
    assert_eq!(t.len(), uuids().len());
    let missing = uuids_new().swap_remove(0);
    assert!(t.search(|k, _| k == missing).is_none());
}

// Test: len tracks distinct keys across mixed insert/upsert traffic.
#[test]
fn uniqueness_under_mixed_inserts() {
    let mut t: ChainTable<u32> = ChainTable::with_capacity(10);
    let keys = uuids();
    let mut live = HashSet::new();
    for (round, k) in keys.iter().cycle().take(keys.len() * 3).enumerate() {
        if round % 2 == 0 {
            match t.insert(k, round as u32) {
                Ok(()) => assert!(live.insert(k.clone()), "insert accepted a live key {k}"),
                Err(r) => {
                    assert_eq!(r.error(), TableError::KeyExists);
                    assert_eq!(r.into_value(), round as u32);
                    assert!(live.contains(k));
                }
            }
        } else {
            t.upsert(k, round as u32).unwrap();
            live.insert(k.clone());
        }
        assert_eq!(t.len(), live.len());
    }
    assert_eq!(t.len(), keys.len());
    assert_eq!(t.iter().count(), keys.len());
}

// Test: removing everything keeps the grown capacity.
#[test]
fn remove_all_keeps_capacity() {
    let mut t = init_table(1);
    let cap = t.capacity();
    assert_eq!(t.remove_all(), Ok(uuids().len()));
    assert!(t.is_empty());
    assert_eq!(t.capacity(), cap);
    t.insert("again", 1).unwrap();
    assert_eq!(t.capacity(), cap);
}
