#![cfg(test)]

// Property tests for ChainTable kept inside the crate so the collision
// hasher and the capacity rules can be checked against internals.

use crate::chain_table::ChainTable;
use crate::config;
use crate::error::TableError;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};
use std::hash::{BuildHasher, Hasher};
use std::rc::Rc;

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Upsert(usize, i32),
    Remove(usize),
    Steal(usize),
    Lookup(usize),
    Mutate(usize, i32),
    // Walk removing entries whose value is divisible by the modulus.
    WalkRemove(i32),
    // Walk attempting to remove a pool key other than the visited one.
    WalkForbidden(usize),
    RemoveSet(i32),
    Search(i32),
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, usize, Vec<OpI>)> {
    (
        proptest::collection::vec("[a-z]{0,5}", 1..=12),
        prop_oneof![Just(0usize), 1usize..64],
    )
        .prop_flat_map(|(pool, hint)| {
            let idxs: Vec<usize> = (0..pool.len()).collect();
            let idx = proptest::sample::select(idxs);
            let op = prop_oneof![
                3 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
                2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Upsert(i, v)),
                1 => idx.clone().prop_map(OpI::Remove),
                1 => idx.clone().prop_map(OpI::Steal),
                1 => idx.clone().prop_map(OpI::Lookup),
                1 => (idx.clone(), -5i32..5).prop_map(|(i, d)| OpI::Mutate(i, d)),
                1 => (1i32..4).prop_map(OpI::WalkRemove),
                1 => idx.clone().prop_map(OpI::WalkForbidden),
                1 => (1i32..4).prop_map(OpI::RemoveSet),
                1 => any::<i32>().prop_map(OpI::Search),
                1 => Just(OpI::Iterate),
            ];
            proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), hint, ops))
        })
}

fn divides(m: i32, v: i32) -> bool {
    v.rem_euclid(m) == 0
}

// Model: std HashMap plus a tally of deallocator calls.
fn run_scenario<S>(
    hasher: S,
    pool: &[String],
    hint: usize,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError>
where
    S: BuildHasher,
{
    let freed = Rc::new(Cell::new(0usize));
    let sink = Rc::clone(&freed);
    let mut sut: ChainTable<i32, S> = ChainTable::builder()
        .hasher(hasher)
        .capacity(hint)
        .deallocator(move |_, _| sink.set(sink.get() + 1))
        .build()
        .expect("bucket allocation");
    let mut model: HashMap<String, i32> = HashMap::new();
    let mut expected_freed = 0usize;
    let mut capacity = sut.capacity();

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = &pool[i];
                let already = model.contains_key(k);
                match sut.insert(k, v) {
                    Ok(()) => {
                        prop_assert!(!already, "insert must fail on duplicate");
                        model.insert(k.clone(), v);
                    }
                    Err(r) => {
                        prop_assert!(already, "duplicate error only when key exists");
                        prop_assert_eq!(r.error(), TableError::KeyExists);
                        prop_assert_eq!(r.into_value(), v);
                    }
                }
            }
            OpI::Upsert(i, v) => {
                let k = &pool[i];
                if model.insert(k.clone(), v).is_some() {
                    expected_freed += 1;
                }
                prop_assert!(sut.upsert(k, v).is_ok());
            }
            OpI::Remove(i) => {
                let k = &pool[i];
                match model.remove(k) {
                    Some(_) => {
                        prop_assert_eq!(sut.remove(k), Ok(()));
                        expected_freed += 1;
                    }
                    None => prop_assert_eq!(sut.remove(k), Err(TableError::NotFound)),
                }
            }
            OpI::Steal(i) => {
                let k = &pool[i];
                match model.remove(k) {
                    Some(mv) => prop_assert_eq!(sut.steal(k), Ok(mv)),
                    None => prop_assert_eq!(sut.steal(k), Err(TableError::NotFound)),
                }
            }
            OpI::Lookup(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.lookup(k), model.get(k));
                prop_assert_eq!(sut.contains_key(k), model.contains_key(k));
            }
            OpI::Mutate(i, d) => {
                let k = &pool[i];
                if let Some(vr) = sut.lookup_mut(k) {
                    *vr = vr.saturating_add(d);
                }
                if let Some(mv) = model.get_mut(k) {
                    *mv = mv.saturating_add(d);
                }
            }
            OpI::WalkRemove(m) => {
                let before = sut.len();
                let mut failures = 0;
                let visited = sut
                    .for_each(|v| {
                        let hit = v.value().map_or(false, |&x| divides(m, x));
                        if hit && v.remove().is_err() {
                            failures += 1;
                        }
                    })
                    .expect("walk starts on an idle table");
                prop_assert_eq!(visited, before);
                prop_assert_eq!(failures, 0);
                let doomed: Vec<String> = model
                    .iter()
                    .filter(|(_, &x)| divides(m, x))
                    .map(|(k, _)| k.clone())
                    .collect();
                expected_freed += doomed.len();
                for k in doomed {
                    model.remove(&k);
                }
            }
            OpI::WalkForbidden(i) => {
                let target = &pool[i];
                let before = sut.len();
                let mut seen = 0;
                let visited = sut
                    .for_each(|v| {
                        seen += 1;
                        if v.key() != target.as_str() {
                            let len = v.table().len();
                            let r = v.table().remove(target);
                            let ok = r == Err(TableError::Locked) || r == Err(TableError::NotFound);
                            assert!(ok, "foreign removal must be refused");
                            assert_eq!(v.table().len(), len);
                        }
                    })
                    .expect("walk starts on an idle table");
                prop_assert_eq!(visited, before);
                prop_assert_eq!(seen, before);
            }
            OpI::RemoveSet(m) => {
                let removed = sut.remove_set(|_, &x| divides(m, x)).expect("idle table");
                let before = model.len();
                model.retain(|_, x| !divides(m, *x));
                prop_assert_eq!(removed, before - model.len());
                expected_freed += removed;
            }
            OpI::Search(v) => {
                let found = sut.search(|_, &x| x == v).copied();
                let present = model.values().any(|&x| x == v);
                prop_assert_eq!(found.is_some(), present);
                if let Some(x) = found {
                    prop_assert_eq!(x, v);
                }
            }
            OpI::Iterate => {
                let s_keys: BTreeSet<String> = sut.keys().map(str::to_owned).collect();
                let m_keys: BTreeSet<String> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
                prop_assert_eq!(sut.iter().count(), model.len());
            }
        }

        // Post-conditions after each op
        // 1) Size and deallocator parity
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        prop_assert_eq!(freed.get(), expected_freed);
        prop_assert!(!sut.is_locked());
        // 2) Capacity never shrinks and the load bound holds
        prop_assert!(sut.capacity() >= capacity);
        prop_assert!(sut.capacity().is_power_of_two());
        prop_assert!(!config::exceeds_load(sut.len(), sut.capacity()));
        capacity = sut.capacity();
    }

    let remaining = sut.len();
    drop(sut);
    prop_assert_eq!(freed.get(), expected_freed + remaining);
    Ok(())
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - Duplicate inserts are rejected and hand the value back.
// - Upsert/remove/remove_set/walk removals each run the deallocator once per
//   discarded value; steal never does.
// - A walk visits exactly `len()` entries and refuses foreign removals.
// - `len`, key set and lookups match the model after every op.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, hint, ops) in arb_scenario()) {
        run_scenario(hashbrown::hash_map::DefaultHashBuilder::default(), &pool, hint, ops)?;
    }
}

// Collision variant using a constant hasher to stress chain unlinking.
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

// Property: Same state-machine invariants as above, with every key in one
// chain. Removals hit the head, middle and tail of a single chain.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, hint, ops) in arb_scenario()) {
        run_scenario(ConstBuildHasher, &pool, hint, ops)?;
    }
}
