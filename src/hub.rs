//! Hub: a keyed directory of `Observable`s that prunes itself.
//!
//! The hub maps each key to its `Observable` through a `Weak` only. Observers
//! added through a hub keep the observable alive instead: every observer embeds
//! a [`Backrefs`] holding strong references to the observables it backs. Once
//! the last observer for a key is deleted or dropped, nothing strong points at
//! that key's observable any more and the key disappears from the hub.

use crate::error::InvalidObserver;
use crate::observable::Observable;
use crate::observer::{Callback, Method, Observer, Receive};
use crate::weak_value_map::WeakValueMap;
use core::borrow::Borrow;
use core::cell::RefCell;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashMap;
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::hash_map::RandomState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_HUB_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of a `Hub`. Never reused, unlike an address.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct HubId(u64);

impl HubId {
    fn next() -> Self {
        HubId(NEXT_HUB_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The observables an observer currently backs, per hub.
///
/// Lives inside the observer, so it is dropped together with it.
pub struct Backrefs<O> {
    // Keyed by (hub, observable address); the stored Arc pins the address.
    entries: Mutex<HashMap<(HubId, usize), Arc<Observable<O>>>>,
}

impl<O> Backrefs<O> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of observables backed, across all hubs.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of observables backed under `hub`.
    pub fn count_for(&self, hub: HubId) -> usize {
        self.entries.lock().keys().filter(|(h, _)| *h == hub).count()
    }

    fn slot(hub: HubId, observable: &Arc<Observable<O>>) -> (HubId, usize) {
        (hub, Arc::as_ptr(observable) as usize)
    }

    pub(crate) fn insert(&self, hub: HubId, observable: &Arc<Observable<O>>) {
        let slot = Self::slot(hub, observable);
        self.entries
            .lock()
            .entry(slot)
            .or_insert_with(|| Arc::clone(observable));
    }

    pub(crate) fn remove(&self, hub: HubId, observable: &Arc<Observable<O>>) -> bool {
        let slot = Self::slot(hub, observable);
        // Dropped after the lock is released.
        let removed = self.entries.lock().remove(&slot);
        removed.is_some()
    }
}

impl<O> Default for Backrefs<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> fmt::Debug for Backrefs<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backrefs").field("len", &self.len()).finish()
    }
}

/// An observer that can be registered through a `Hub`.
pub trait HubObserver: Observer + Sized {
    fn backrefs(&self) -> &Backrefs<Self>;
}

pub struct Hub<K, O, S = RandomState> {
    id: HubId,
    mapping: ReentrantMutex<RefCell<WeakValueMap<K, Observable<O>, S>>>,
}

impl<K, O> Hub<K, O> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<K, O> Default for Hub<K, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, O, S> fmt::Debug for Hub<K, O, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<K, O, S> Hub<K, O, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            id: HubId::next(),
            mapping: ReentrantMutex::new(RefCell::new(WeakValueMap::with_hasher(hasher))),
        }
    }

    pub fn id(&self) -> HubId {
        self.id
    }

    /// Number of keys whose observable is still alive.
    pub fn len(&self) -> usize {
        let guard = self.mapping.lock();
        let n = RefCell::borrow(&guard).len();
        n
    }

    pub fn is_empty(&self) -> bool {
        let guard = self.mapping.lock();
        let empty = RefCell::borrow(&guard).is_empty();
        empty
    }
}

impl<K, O, S> Hub<K, O, S>
where
    K: Eq + Hash,
    O: HubObserver + Eq + Hash,
    S: BuildHasher,
{
    /// Register `observer` for `key` under the `update` method.
    pub fn add(&self, key: K, observer: &Arc<O>) -> Result<Arc<O>, InvalidObserver> {
        self.add_with(key, observer, Method::UPDATE)
    }

    /// Register `observer` for `key` under `method`, creating the key's
    /// observable if needed.
    pub fn add_with(
        &self,
        key: K,
        observer: &Arc<O>,
        method: impl Into<Method>,
    ) -> Result<Arc<O>, InvalidObserver> {
        let method = method.into();
        if !observer.responds_to(&method) {
            return Err(InvalidObserver::new(method));
        }

        let guard = self.mapping.lock();
        let (observable, created) = guard
            .borrow_mut()
            .get_or_insert_with(key, Observable::new);
        if created {
            tracing::debug!(hub = self.id.0, "created observable for new key");
        }
        observer.backrefs().insert(self.id, &observable);
        Ok(observable.register(observer, method))
    }

    /// Unregister `observer` from `key`. Returns `None` if the key has no live
    /// observable or the observer was not registered for it.
    pub fn delete<Q>(&self, key: &Q, observer: &O) -> Option<Arc<O>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let guard = self.mapping.lock();
        let observable = RefCell::borrow(&guard).get(key)?;
        observer.backrefs().remove(self.id, &observable);
        observable.delete(observer)
    }

    /// Observable currently registered for `key`.
    pub fn observable<Q>(&self, key: &Q) -> Option<Arc<Observable<O>>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let guard = self.mapping.lock();
        let found = RefCell::borrow(&guard).get(key);
        found
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let guard = self.mapping.lock();
        let found = RefCell::borrow(&guard).contains_key(key);
        found
    }

    /// Notify every live observer registered for `key`. A key without a live
    /// observable yields an empty result.
    pub fn notify<Q, A>(&self, key: &Q, args: &A) -> Result<Vec<O::Output>, O::Error>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        A: ?Sized,
        O: Receive<A>,
    {
        self.notify_with(key, args, None)
    }

    /// Like `notify`, also handing `callback` to every observer.
    ///
    /// The hub lock stays held while observers run, so a callback may re-enter
    /// this hub from the same thread.
    pub fn notify_with<Q, A>(
        &self,
        key: &Q,
        args: &A,
        callback: Option<&Callback<'_, A, O::Output>>,
    ) -> Result<Vec<O::Output>, O::Error>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        A: ?Sized,
        O: Receive<A>,
    {
        let _guard = self.mapping.lock();
        match self.observable(key) {
            Some(observable) => observable.notify_with(args, callback),
            None => Ok(Vec::new()),
        }
    }
}
