//! ChainTable: bucket array of collision chains over a slot arena, with a
//! walk lock that allows removing the visited entry and nothing else.

use crate::builder::TableBuilder;
use crate::config::{self, bucket_index};
use crate::error::{Rejected, TableError};
use crate::reentrancy::IterationLock;
use core::fmt;
use core::hash::BuildHasher;
use hashbrown::hash_map::DefaultHashBuilder;
use log::{debug, trace, warn};
use slotmap::{DefaultKey, SlotMap};
use std::rc::Rc;

/// Cleanup hook run on every value the table discards. Receives the value
/// and the key it was stored under.
pub type Deallocator<V> = Box<dyn FnMut(V, &str)>;

#[derive(Debug)]
struct Node<V> {
    key: Rc<str>,
    value: V,
    hash: u64,
    next: Option<DefaultKey>, // toward the chain tail
}

pub struct ChainTable<V, S = DefaultHashBuilder> {
    hasher: S,
    buckets: Vec<Option<DefaultKey>>, // chain heads
    slots: SlotMap<DefaultKey, Node<V>>,
    deallocator: Option<Deallocator<V>>,
    lock: IterationLock,
}

pub(crate) fn alloc_buckets(capacity: usize) -> Result<Vec<Option<DefaultKey>>, TableError> {
    let mut buckets = Vec::new();
    buckets
        .try_reserve_exact(capacity)
        .map_err(|_| TableError::OutOfMemory)?;
    buckets.resize(capacity, None);
    Ok(buckets)
}

impl<V> ChainTable<V> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a table sized from `hint`. A hint of zero selects
    /// `config::DEFAULT_CAPACITY`.
    pub fn with_capacity(hint: usize) -> Self {
        Self::with_capacity_and_hasher(hint, DefaultHashBuilder::default())
    }

    pub fn builder() -> TableBuilder<V> {
        TableBuilder::new()
    }
}

impl<V> Default for ChainTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowing iterator in walk order: buckets by index, each chain from head
/// to tail.
pub struct Iter<'a, V> {
    buckets: &'a [Option<DefaultKey>],
    slots: &'a SlotMap<DefaultKey, Node<V>>,
    bucket: usize,
    next: Option<DefaultKey>,
    remaining: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(h) = self.next {
                let slots = self.slots;
                let node = &slots[h];
                self.next = node.next;
                self.remaining -= 1;
                return Some((&*node.key, &node.value));
            }
            let head = self.buckets.get(self.bucket)?;
            self.next = *head;
            self.bucket += 1;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

impl<V, S> ChainTable<V, S> {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// True while a `for_each` walk is in progress.
    pub fn is_locked(&self) -> bool {
        self.lock.is_active()
    }

    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            buckets: &self.buckets,
            slots: &self.slots,
            bucket: 0,
            next: None,
            remaining: self.slots.len(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(k, _)| k)
    }

    /// Snapshot of every entry ordered by key.
    pub fn items_sorted(&self) -> Vec<(&str, &V)> {
        let mut items: Vec<_> = self.iter().collect();
        items.sort_unstable_by(|a, b| a.0.cmp(b.0));
        items
    }

    /// First entry in walk order whose `(key, value)` satisfies `pred`.
    /// Read-only; does not take the walk lock.
    pub fn search<P>(&self, mut pred: P) -> Option<&V>
    where
        P: FnMut(&str, &V) -> bool,
    {
        self.iter().find(|&(k, v)| pred(k, v)).map(|(_, v)| v)
    }

    fn discard(&mut self, value: V, key: &str) {
        match self.deallocator.as_mut() {
            Some(dealloc) => dealloc(value, key),
            None => drop(value),
        }
    }
}

impl<V, S> ChainTable<V, S>
where
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(0, hasher)
    }

    pub fn with_capacity_and_hasher(hint: usize, hasher: S) -> Self {
        let capacity = config::normalize_capacity(hint);
        Self::from_parts(vec![None; capacity], hasher, None)
    }

    pub(crate) fn from_parts(
        buckets: Vec<Option<DefaultKey>>,
        hasher: S,
        deallocator: Option<Deallocator<V>>,
    ) -> Self {
        debug!("chain table created with {} buckets", buckets.len());
        Self {
            hasher,
            buckets,
            slots: SlotMap::with_key(),
            deallocator,
            lock: IterationLock::new(),
        }
    }

    fn make_hash(&self, key: &str) -> u64 {
        self.hasher.hash_one(key)
    }

    fn find_slot(&self, key: &str, hash: u64) -> Option<DefaultKey> {
        let mut cur = self.buckets[bucket_index(hash, self.buckets.len())];
        while let Some(h) = cur {
            let node = &self.slots[h];
            if node.hash == hash && *node.key == *key {
                return Some(h);
            }
            cur = node.next;
        }
        None
    }

    pub fn lookup(&self, key: &str) -> Option<&V> {
        let h = self.find_slot(key, self.make_hash(key))?;
        Some(&self.slots[h].value)
    }

    /// In-place access to a stored value. Not a structural change, so it is
    /// permitted during a walk.
    pub fn lookup_mut(&mut self, key: &str) -> Option<&mut V> {
        let h = self.find_slot(key, self.make_hash(key))?;
        Some(&mut self.slots[h].value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.find_slot(key, self.make_hash(key)).is_some()
    }

    /// Add `key -> value` if `key` is absent. On `KeyExists` or `Locked` the
    /// value comes back inside the error.
    pub fn insert(&mut self, key: &str, value: V) -> Result<(), Rejected<V>> {
        if let Err(e) = self.lock.check_mutation() {
            return Err(Rejected::new(e, value));
        }
        let hash = self.make_hash(key);
        if self.find_slot(key, hash).is_some() {
            return Err(Rejected::new(TableError::KeyExists, value));
        }
        self.link_new(Rc::from(key), value, hash);
        Ok(())
    }

    /// Add or overwrite. An overwritten value goes through the deallocator.
    pub fn upsert(&mut self, key: &str, value: V) -> Result<(), Rejected<V>> {
        if let Err(e) = self.lock.check_mutation() {
            return Err(Rejected::new(e, value));
        }
        let hash = self.make_hash(key);
        match self.find_slot(key, hash) {
            Some(h) => {
                let node = &mut self.slots[h];
                let old = core::mem::replace(&mut node.value, value);
                let key = Rc::clone(&node.key);
                self.discard(old, &key);
            }
            None => self.link_new(Rc::from(key), value, hash),
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Result<(), TableError> {
        let node = self.take(key)?;
        self.discard(node.value, &node.key);
        Ok(())
    }

    /// Unlink `key` and hand its value back without running the deallocator.
    pub fn steal(&mut self, key: &str) -> Result<V, TableError> {
        Ok(self.take(key)?.value)
    }

    /// Walk every entry, handing each to `visitor` through a `Visit`.
    ///
    /// The table is locked for the duration: the visitor may remove or steal
    /// the entry it is visiting, and every other structural mutation
    /// (including a nested walk) fails with `Locked`. Returns the number of
    /// entries visited, which equals `len()` at the start of the walk.
    pub fn for_each<'t, F>(&'t mut self, mut visitor: F) -> Result<usize, TableError>
    where
        F: FnMut(&mut Visit<'t, V, S>),
    {
        self.lock.begin()?;
        let mut visit = Visit {
            table: self,
            slot: DefaultKey::default(),
            key: Rc::from(""),
        };
        let mut visited = 0;
        let mut idx = 0;
        while let Some(&head) = visit.table.buckets.get(idx) {
            idx += 1;
            let mut cur = head;
            while let Some(h) = cur {
                let Some(node) = visit.table.slots.get(h) else {
                    break;
                };
                // Captured before the visitor runs; it may unlink `h`.
                cur = node.next;
                visit.key = Rc::clone(&node.key);
                visit.slot = h;
                visit.table.lock.visit(h);
                visitor(&mut visit);
                visited += 1;
            }
        }
        trace!(
            "walk visited {} entries, {} remain",
            visited,
            visit.table.len()
        );
        Ok(visited)
    }

    /// Remove every entry for which `pred` holds, running the deallocator on
    /// each. Returns the number removed.
    pub fn remove_set<P>(&mut self, mut pred: P) -> Result<usize, TableError>
    where
        P: FnMut(&str, &V) -> bool,
    {
        self.lock.check_mutation()?;
        let mut removed = 0;
        for idx in 0..self.buckets.len() {
            let mut prev: Option<DefaultKey> = None;
            let mut cur = self.buckets[idx];
            while let Some(h) = cur {
                let node = &self.slots[h];
                cur = node.next;
                if !pred(&*node.key, &node.value) {
                    prev = Some(h);
                    continue;
                }
                match prev {
                    Some(p) => self.slots[p].next = cur,
                    None => self.buckets[idx] = cur,
                }
                if let Some(node) = self.slots.remove(h) {
                    self.discard(node.value, &node.key);
                    removed += 1;
                }
            }
        }
        trace!("remove_set removed {} entries", removed);
        Ok(removed)
    }

    /// Remove every entry through the deallocator. Capacity is kept.
    pub fn remove_all(&mut self) -> Result<usize, TableError> {
        self.remove_set(|_, _| true)
    }

    /// Equal key sets, with `cmp` accepting every pair of values.
    pub fn eq_by<W, T, F>(&self, other: &ChainTable<W, T>, mut cmp: F) -> bool
    where
        T: BuildHasher,
        F: FnMut(&V, &W) -> bool,
    {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.lookup(k).map_or(false, |w| cmp(v, w)))
    }

    fn take(&mut self, key: &str) -> Result<Node<V>, TableError> {
        let hash = self.make_hash(key);
        let h = self.find_slot(key, hash).ok_or(TableError::NotFound)?;
        self.lock.check_removal(h)?;
        self.unlink(h).ok_or(TableError::NotFound)
    }

    fn link_new(&mut self, key: Rc<str>, value: V, hash: u64) {
        let idx = bucket_index(hash, self.buckets.len());
        let next = self.buckets[idx];
        let h = self.slots.insert(Node {
            key,
            value,
            hash,
            next,
        });
        self.buckets[idx] = Some(h);
        self.maybe_grow();
    }

    fn unlink(&mut self, h: DefaultKey) -> Option<Node<V>> {
        let (hash, next) = {
            let node = self.slots.get(h)?;
            (node.hash, node.next)
        };
        let idx = bucket_index(hash, self.buckets.len());
        if self.buckets[idx] == Some(h) {
            self.buckets[idx] = next;
        } else {
            let mut cur = self.buckets[idx];
            while let Some(c) = cur {
                let node = &mut self.slots[c];
                if node.next == Some(h) {
                    node.next = next;
                    break;
                }
                cur = node.next;
            }
        }
        self.slots.remove(h)
    }

    fn maybe_grow(&mut self) {
        let capacity = self.capacity();
        if !config::exceeds_load(self.len(), capacity) {
            return;
        }
        if let Some(grown) = config::grown_capacity(capacity) {
            self.rehash(grown);
        }
    }

    /// Move every entry into a fresh bucket array of `capacity` buckets.
    /// Entries meeting in a new bucket keep the order the walk found them
    /// in. On allocation failure the table is left as it was.
    fn rehash(&mut self, capacity: usize) {
        let old_capacity = self.capacity();
        let (mut heads, mut tails) = match (alloc_buckets(capacity), alloc_buckets(capacity)) {
            (Ok(heads), Ok(tails)) => (heads, tails),
            _ => {
                warn!(
                    "chain table growth from {} to {} buckets failed; keeping current size",
                    old_capacity, capacity
                );
                return;
            }
        };
        for idx in 0..old_capacity {
            let mut cur = self.buckets[idx];
            while let Some(h) = cur {
                let node = &mut self.slots[h];
                cur = node.next.take();
                let b = bucket_index(node.hash, capacity);
                match tails[b] {
                    Some(t) => self.slots[t].next = Some(h),
                    None => heads[b] = Some(h),
                }
                tails[b] = Some(h);
            }
        }
        self.buckets = heads;
        debug!("chain table grown from {} to {} buckets", old_capacity, capacity);
    }
}

impl<V, S> Drop for ChainTable<V, S> {
    fn drop(&mut self) {
        if let Some(mut dealloc) = self.deallocator.take() {
            for (_, node) in self.slots.drain() {
                dealloc(node.value, &node.key);
            }
        }
    }
}

impl<V: fmt::Debug, S> fmt::Debug for ChainTable<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<V, S, T> PartialEq<ChainTable<V, T>> for ChainTable<V, S>
where
    V: PartialEq,
    S: BuildHasher,
    T: BuildHasher,
{
    fn eq(&self, other: &ChainTable<V, T>) -> bool {
        self.eq_by(other, |a, b| a == b)
    }
}

/// The visitor's view of a `for_each` walk: the entry being visited plus the
/// locked table. Dropping it ends the walk, so the lock is released even if
/// the visitor panics.
pub struct Visit<'t, V, S> {
    table: &'t mut ChainTable<V, S>,
    slot: DefaultKey,
    key: Rc<str>,
}

impl<V, S> Visit<'_, V, S>
where
    S: BuildHasher,
{
    pub fn key(&self) -> &str {
        &self.key
    }

    /// `None` once the visited entry has been removed or stolen.
    pub fn value(&self) -> Option<&V> {
        self.table.slots.get(self.slot).map(|n| &n.value)
    }

    pub fn value_mut(&mut self) -> Option<&mut V> {
        self.table.slots.get_mut(self.slot).map(|n| &mut n.value)
    }

    pub fn is_removed(&self) -> bool {
        !self.table.slots.contains_key(self.slot)
    }

    /// Remove the visited entry, running the deallocator on its value.
    pub fn remove(&mut self) -> Result<(), TableError> {
        let key = Rc::clone(&self.key);
        self.table.remove(&key)
    }

    /// Unlink the visited entry and take its value.
    pub fn steal(&mut self) -> Result<V, TableError> {
        let key = Rc::clone(&self.key);
        self.table.steal(&key)
    }

    /// The table under walk. Lookups work as usual; structural changes other
    /// than removing the visited key fail with `Locked`.
    pub fn table(&mut self) -> LockedTable<'_, V, S> {
        LockedTable {
            table: &mut *self.table,
        }
    }
}

impl<V, S> Drop for Visit<'_, V, S> {
    fn drop(&mut self) {
        self.table.lock.end();
    }
}

/// Handle to a table in the middle of a walk. Every operation goes through
/// the table's own entry points, so the walk lock decides what is allowed;
/// the table itself can never be moved out or replaced through it.
///
/// ```compile_fail
/// use chain_table::ChainTable;
///
/// let mut t: ChainTable<u8> = ChainTable::new();
/// t.insert("a", 1).unwrap();
/// let mut other: ChainTable<u8> = ChainTable::new();
/// t.for_each(|v| std::mem::swap(v.table(), &mut other)).unwrap();
/// ```
pub struct LockedTable<'a, V, S> {
    table: &'a mut ChainTable<V, S>,
}

impl<V, S> LockedTable<'_, V, S>
where
    S: BuildHasher,
{
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn is_locked(&self) -> bool {
        self.table.is_locked()
    }

    pub fn iter(&self) -> Iter<'_, V> {
        self.table.iter()
    }

    pub fn lookup(&self, key: &str) -> Option<&V> {
        self.table.lookup(key)
    }

    pub fn lookup_mut(&mut self, key: &str) -> Option<&mut V> {
        self.table.lookup_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.table.contains_key(key)
    }

    pub fn search<P>(&self, pred: P) -> Option<&V>
    where
        P: FnMut(&str, &V) -> bool,
    {
        self.table.search(pred)
    }

    pub fn insert(&mut self, key: &str, value: V) -> Result<(), Rejected<V>> {
        self.table.insert(key, value)
    }

    pub fn upsert(&mut self, key: &str, value: V) -> Result<(), Rejected<V>> {
        self.table.upsert(key, value)
    }

    pub fn remove(&mut self, key: &str) -> Result<(), TableError> {
        self.table.remove(key)
    }

    pub fn steal(&mut self, key: &str) -> Result<V, TableError> {
        self.table.steal(key)
    }

    pub fn for_each<F>(&mut self, visitor: F) -> Result<usize, TableError>
    where
        F: FnMut(&mut Visit<'_, V, S>),
    {
        self.table.for_each(visitor)
    }

    pub fn remove_set<P>(&mut self, pred: P) -> Result<usize, TableError>
    where
        P: FnMut(&str, &V) -> bool,
    {
        self.table.remove_set(pred)
    }

    pub fn remove_all(&mut self) -> Result<usize, TableError> {
        self.table.remove_all()
    }
}
