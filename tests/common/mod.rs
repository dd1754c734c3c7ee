//! Shared fixtures for the integration suites: a fixed set of uuid-shaped
//! keys and an idempotent test logger.
#![allow(dead_code)]

use chain_table::ChainTable;
use env_logger::Builder;
use log::LevelFilter;
use std::sync::Once;

static INIT: Once = Once::new();

pub fn init_test_logger() {
    INIT.call_once_force(|_| {
        let _ = Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .parse_default_env()
            .try_init();
    });
}

pub const KEY_COUNT: usize = 400;
pub const SUBSET_STRIDE: usize = 17;
pub const NEW_COUNT: usize = 16;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        Some(s)
    })
}

fn uuid_from(a: u64, b: u64) -> String {
    format!(
        "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
        a >> 32,
        (a >> 16) & 0xffff,
        a & 0xffff,
        b >> 48,
        b & 0xffff_ffff_ffff
    )
}

fn uuid_stream(seed: u64) -> impl Iterator<Item = String> {
    let mut it = lcg(seed);
    std::iter::from_fn(move || {
        let a = it.next()?;
        let b = it.next()?;
        Some(uuid_from(a, b))
    })
}

/// Keys every fixture table starts with.
pub fn uuids() -> Vec<String> {
    uuid_stream(0x5eed).take(KEY_COUNT).collect()
}

/// A spread-out subset of `uuids()`.
pub fn uuids_subset() -> Vec<String> {
    uuids().into_iter().step_by(SUBSET_STRIDE).collect()
}

/// Keys that are not in `uuids()`.
pub fn uuids_new() -> Vec<String> {
    let present = uuids();
    uuid_stream(0xfeed)
        .filter(|k| !present.contains(k))
        .take(NEW_COUNT)
        .collect()
}

/// A table holding every key of `uuids()` mapped to its own index. Keys are
/// added in reverse so each collision chain lists them in `uuids()` order.
pub fn init_table(hint: usize) -> ChainTable<usize> {
    init_test_logger();
    let keys = uuids();
    let mut t = ChainTable::with_capacity(hint);
    for (i, k) in keys.iter().enumerate().rev() {
        let before = t.capacity();
        t.insert(k, i).expect("fixture keys are unique");
        if t.capacity() != before {
            log::debug!("fixture table grown from {} to {}", before, t.capacity());
        }
    }
    for k in &keys {
        assert!(t.lookup(k).is_some(), "entry {k} could not be found");
    }
    t
}
