//! WeakTable: weak-keyed structural layer with stable handles and lazy sweeping.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_table::Entry as TableEntry;
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;
use std::sync::{Arc, Weak};

/// Writes below this slot count never trigger an amortised sweep.
const MIN_SWEEP_INTERVAL: usize = 16;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(DefaultKey);

impl Handle {
    pub(crate) fn new(k: DefaultKey) -> Self {
        Handle(k)
    }
    pub(crate) fn raw_handle(&self) -> DefaultKey {
        self.0
    }
}

struct Entry<K: ?Sized, V> {
    key: Weak<K>,
    value: V,
    // Dead keys cannot be hashed again; the index relies on this copy.
    hash: u64,
    seq: u64,
}

impl<K: ?Sized, V> Entry<K, V> {
    fn is_live(&self) -> bool {
        self.key.strong_count() > 0
    }
}

pub struct WeakTable<K: ?Sized, V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Entry<K, V>>,
    next_seq: u64,
    writes_since_sweep: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InsertError {
    #[error("an equal live key is already present")]
    DuplicateKey,
}

impl<K: ?Sized, V> WeakTable<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<K: ?Sized, V> Default for WeakTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ?Sized, V, S> WeakTable<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            slots: SlotMap::with_key(),
            next_seq: 0,
            writes_since_sweep: 0,
        }
    }

    /// Number of slots, counting entries whose key died but was not swept yet.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of entries whose key is still alive.
    pub fn len(&self) -> usize {
        self.slots.values().filter(|e| e.is_live()).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.slots.values().any(Entry::is_live)
    }

    /// Strong reference to the key behind `h`, if the slot exists and the key is alive.
    pub fn key(&self, h: Handle) -> Option<Arc<K>> {
        self.slots.get(h.raw_handle()).and_then(|e| e.key.upgrade())
    }

    /// Value behind `h`, if the slot exists and its key is alive.
    pub fn value(&self, h: Handle) -> Option<&V> {
        self.slots
            .get(h.raw_handle())
            .filter(|e| e.is_live())
            .map(|e| &e.value)
    }

    /// Physically remove every entry whose key was reclaimed. Returns how many went.
    pub fn sweep(&mut self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, e| e.is_live());
        let slots = &self.slots;
        self.index.retain(|k| slots.contains_key(*k));
        self.writes_since_sweep = 0;
        let swept = before - self.slots.len();
        if swept > 0 {
            tracing::trace!(swept, remaining = self.slots.len(), "swept reclaimed entries");
        }
        swept
    }

    /// Insertion-ordered snapshot of live entries. Dead slots met on the way are swept.
    pub fn live_entries(&mut self) -> Vec<(Handle, Arc<K>)> {
        let mut live = Vec::with_capacity(self.slots.len());
        let mut dead = 0usize;
        for (k, e) in &self.slots {
            match e.key.upgrade() {
                Some(key) => live.push((e.seq, Handle::new(k), key)),
                None => dead += 1,
            }
        }
        if dead > 0 {
            self.sweep();
        }
        live.sort_unstable_by_key(|(seq, _, _)| *seq);
        live.into_iter().map(|(_, h, key)| (h, key)).collect()
    }

    /// Iterate live entries in slot order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            it: self.slots.iter(),
        }
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn note_write(&mut self) {
        self.writes_since_sweep += 1;
        if self.writes_since_sweep >= self.slots.len().max(MIN_SWEEP_INTERVAL) {
            self.sweep();
        }
    }
}

fn key_matches<K, V, Q>(slots: &SlotMap<DefaultKey, Entry<K, V>>, k: DefaultKey, q: &Q) -> bool
where
    K: ?Sized + Borrow<Q>,
    Q: ?Sized + Eq,
{
    slots
        .get(k)
        .and_then(|e| e.key.upgrade())
        .map(|key| Borrow::<Q>::borrow(&*key) == q)
        .unwrap_or(false)
}

impl<K, V, S> WeakTable<K, V, S>
where
    K: ?Sized + Eq + Hash,
    S: BuildHasher,
{
    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    pub fn find<Q>(&self, q: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        let slots = &self.slots;
        self.index
            .find(hash, |&k| key_matches(slots, k, q))
            .map(|&k| Handle::new(k))
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<(Arc<K>, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.find(q)?;
        let e = self.slots.get(h.raw_handle())?;
        Some((e.key.upgrade()?, &e.value))
    }

    /// Insert or overwrite. An overwritten entry keeps its insertion position but
    /// now refers to `key`; the previous value is returned.
    pub fn insert(&mut self, key: &Arc<K>, value: V) -> Option<V> {
        self.note_write();
        let hash = self.make_hash(&**key);
        let slots = &self.slots;
        match self.index.entry(
            hash,
            |&kk| key_matches(slots, kk, &**key),
            |&kk| slots.get(kk).map(|e| e.hash).unwrap_or(0),
        ) {
            TableEntry::Occupied(o) => {
                let k = *o.get();
                let e = self.slots.get_mut(k)?;
                e.key = Arc::downgrade(key);
                Some(core::mem::replace(&mut e.value, value))
            }
            TableEntry::Vacant(v) => {
                let seq = self.next_seq;
                self.next_seq += 1;
                let k = self.slots.insert(Entry {
                    key: Arc::downgrade(key),
                    value,
                    hash,
                    seq,
                });
                let _ = v.insert(k);
                None
            }
        }
    }

    /// Insert only if no equal live key is present.
    pub fn try_insert(&mut self, key: &Arc<K>, value: V) -> Result<Handle, InsertError> {
        if self.contains_key(&**key) {
            return Err(InsertError::DuplicateKey);
        }
        self.note_write();
        let hash = self.make_hash(&**key);
        let seq = self.next_seq();
        let k = self.slots.insert(Entry {
            key: Arc::downgrade(key),
            value,
            hash,
            seq,
        });
        let slots = &self.slots;
        let _ = self
            .index
            .insert_unique(hash, k, |&kk| slots.get(kk).map(|e| e.hash).unwrap_or(0));
        Ok(Handle::new(k))
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<(Arc<K>, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        let slots = &self.slots;
        let found = self.index.find_entry(hash, |&k| key_matches(slots, k, q)).ok()?;
        let (k, _) = found.remove();
        let entry = self.slots.remove(k)?;
        // The key may have died between the probe and here; the slot is gone either way.
        Some((entry.key.upgrade()?, entry.value))
    }
}

/// Iterator over live entries of a `WeakTable`, in slot order.
pub struct Iter<'a, K: ?Sized, V> {
    it: slotmap::basic::Iter<'a, DefaultKey, Entry<K, V>>,
}

impl<'a, K: ?Sized, V> Iterator for Iter<'a, K, V> {
    type Item = (Handle, Arc<K>, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        for (k, e) in self.it.by_ref() {
            if let Some(key) = e.key.upgrade() {
                return Some((Handle::new(k), key, &e.value));
            }
        }
        None
    }
}
