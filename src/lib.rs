//! chain-table: a single-threaded, string-keyed hash table with separate
//! chaining, an optional value deallocator, and walks that may remove the
//! entry they are visiting.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a table whose every observable behavior can be stated as a small
//!   contract: unique keys, amortized O(1) access, growth only on insert,
//!   and a walk lock that makes in-walk mutation either safe or refused.
//! - Layers:
//!   - `SlotMap<DefaultKey, Node>`: the arena owning every entry. Chains
//!     link entries by generational handle, never by pointer.
//!   - Bucket array: `Vec<Option<DefaultKey>>` of chain heads. A bucket is
//!     `hash & (capacity - 1)`; new keys are pushed at the chain head.
//!   - `IterationLock`: per-table walk state consulted by every mutating
//!     method.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` (keys are `Rc<str>`).
//! - Keys are copied in on insert and immutable afterwards.
//! - The table owns keys and chain nodes. Values are discarded through the
//!   caller's deallocator (overwrite, remove, bulk removal, drop) or handed
//!   back (`steal`, rejected inserts).
//!
//! Walk lock
//! - `for_each` hands the visitor a `Visit`, which carries the visited key
//!   and a `LockedTable` handle that forwards to the table's own entry
//!   points but never exposes the table by `&mut`, so it cannot be swapped
//!   or replaced mid-walk. Through it the visitor may look up any key,
//!   change values in place, and remove or steal the visited entry. Insert,
//!   upsert, removal of any other key, bulk removal and a nested walk all
//!   return `TableError::Locked` and leave the table unchanged.
//! - The walk captures the next handle before calling the visitor, so
//!   unlinking the visited entry cannot skip or repeat anything.
//! - The lock is released when the `Visit` drops, including on unwind.
//! - `remove_set` and `search` run predicates that only see `(&str, &V)`;
//!   the borrow checker already keeps them from reaching the table.
//!
//! Growth
//! - After a new key is linked, the table doubles once `len` exceeds three
//!   quarters of `capacity`. Rehashing walks the old buckets in walk order
//!   and appends to the new chains, so entries that meet again keep their
//!   relative order. Removal, lookup and overwrite never resize.
//! - Bucket arrays are allocated with `try_reserve_exact`; a failed growth
//!   is logged and the table keeps its current size.
//!
//! Hashing
//! - Each entry stores its `u64` hash; rehashing never calls the hasher.
//! - The default hasher is `hashbrown`'s randomly seeded builder. Any
//!   `BuildHasher` can be supplied for deterministic layouts.

pub mod builder;
pub mod chain_table;
mod chain_table_proptest;
pub mod config;
pub mod error;
mod reentrancy;

// Public surface
pub use builder::TableBuilder;
pub use chain_table::{ChainTable, Deallocator, Iter, LockedTable, Visit};
pub use error::{Rejected, TableError};
