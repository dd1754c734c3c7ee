//! TableBuilder: creation parameters for `ChainTable`.

use crate::chain_table::{alloc_buckets, ChainTable, Deallocator};
use crate::config;
use crate::error::TableError;
use core::hash::BuildHasher;
use hashbrown::hash_map::DefaultHashBuilder;

/// Collects a capacity hint, hasher and deallocator, then allocates the
/// table with `build()`.
///
/// ```
/// use chain_table::ChainTable;
///
/// let table: ChainTable<Vec<u8>> = ChainTable::builder()
///     .capacity(42)
///     .deallocator(|value: Vec<u8>, key: &str| {
///         log::trace!("freeing {} bytes under {}", value.len(), key);
///     })
///     .build()
///     .unwrap();
/// assert_eq!(table.capacity(), 64);
/// ```
pub struct TableBuilder<V, S = DefaultHashBuilder> {
    capacity: usize,
    hasher: S,
    deallocator: Option<Deallocator<V>>,
}

impl<V> TableBuilder<V> {
    pub fn new() -> Self {
        Self {
            capacity: 0,
            hasher: DefaultHashBuilder::default(),
            deallocator: None,
        }
    }
}

impl<V> Default for TableBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, S> TableBuilder<V, S>
where
    S: BuildHasher,
{
    /// Initial bucket count hint; see `config::normalize_capacity`.
    pub fn capacity(mut self, hint: usize) -> Self {
        self.capacity = hint;
        self
    }

    pub fn hasher<T: BuildHasher>(self, hasher: T) -> TableBuilder<V, T> {
        TableBuilder {
            capacity: self.capacity,
            hasher,
            deallocator: self.deallocator,
        }
    }

    /// Run `dealloc(value, key)` whenever the table discards a value it
    /// holds: overwrite, removal, bulk removal, and drop of the table.
    pub fn deallocator<F>(mut self, dealloc: F) -> Self
    where
        F: FnMut(V, &str) + 'static,
    {
        self.deallocator = Some(Box::new(dealloc));
        self
    }

    /// Allocate the bucket array. Fails only with `OutOfMemory`.
    pub fn build(self) -> Result<ChainTable<V, S>, TableError> {
        let buckets = alloc_buckets(config::normalize_capacity(self.capacity))?;
        Ok(ChainTable::from_parts(buckets, self.hasher, self.deallocator))
    }
}
