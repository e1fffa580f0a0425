//! WeakValueMap: strong keys mapping to weakly held values.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashMap;
use std::collections::hash_map::RandomState;
use std::sync::{Arc, Weak};

const MIN_SWEEP_INTERVAL: usize = 16;

pub struct WeakValueMap<K, V, S = RandomState> {
    map: HashMap<K, Weak<V>, S>,
    writes_since_sweep: usize,
}

impl<K, V, S> WeakValueMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            map: HashMap::with_hasher(hasher),
            writes_since_sweep: 0,
        }
    }

    /// Number of keys whose value is still alive.
    pub fn len(&self) -> usize {
        self.map.values().filter(|v| v.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.map.values().any(|v| v.strong_count() > 0)
    }

    /// Number of stored keys, counting ones whose value died but was not swept yet.
    #[cfg(test)]
    pub fn slot_count(&self) -> usize {
        self.map.len()
    }

    /// Drop keys whose value was reclaimed. Returns how many went.
    pub fn sweep(&mut self) -> usize {
        let before = self.map.len();
        self.map.retain(|_, v| v.strong_count() > 0);
        self.writes_since_sweep = 0;
        let swept = before - self.map.len();
        if swept > 0 {
            tracing::trace!(swept, remaining = self.map.len(), "swept reclaimed values");
        }
        swept
    }
}

impl<K, V, S> WeakValueMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.get(key).and_then(Weak::upgrade)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map
            .get(key)
            .map(|v| v.strong_count() > 0)
            .unwrap_or(false)
    }

    /// Live value for `key`, creating one with `make` if there is none. The map
    /// only keeps a weak reference to what it creates.
    pub fn get_or_insert_with<F>(&mut self, key: K, make: F) -> (Arc<V>, bool)
    where
        F: FnOnce() -> V,
    {
        if let Some(v) = self.get(&key) {
            return (v, false);
        }
        self.writes_since_sweep += 1;
        if self.writes_since_sweep >= self.map.len().max(MIN_SWEEP_INTERVAL) {
            self.sweep();
        }
        let v = Arc::new(make());
        self.map.insert(key, Arc::downgrade(&v));
        (v, true)
    }
}
