//! Observable: a registry of observers for one notification channel.
//!
//! Observers are held through `Weak` only. Each observer maps to the method it
//! is notified through; the identity slot and the method live in the same
//! `WeakTable` entry, so both vanish together when the observer is reclaimed.
//!
//! Every public operation runs under a per-instance re-entrant lock. `notify`
//! keeps that lock for its whole duration but releases the table borrow before
//! calling into observers, so a callback may `add`, `delete` or `notify` on the
//! same instance from the same thread.

use crate::error::InvalidObserver;
use crate::observer::{Callback, Method, Observer, Receive};
use crate::weak_table::WeakTable;
use core::cell::RefCell;
use core::fmt;
use core::hash::Hash;
use parking_lot::ReentrantMutex;
use std::sync::Arc;

pub struct Observable<O> {
    state: ReentrantMutex<RefCell<WeakTable<O, Method>>>,
}

impl<O> Observable<O> {
    pub fn new() -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(WeakTable::new())),
        }
    }

    /// Number of registered observers that are still alive.
    pub fn len(&self) -> usize {
        let guard = self.state.lock();
        let n = guard.borrow().len();
        n
    }

    pub fn is_empty(&self) -> bool {
        let guard = self.state.lock();
        let empty = guard.borrow().is_empty();
        empty
    }
}

impl<O> Default for Observable<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> fmt::Debug for Observable<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").field("len", &self.len()).finish()
    }
}

impl<O> Observable<O>
where
    O: Observer + Eq + Hash,
{
    /// Register `observer` under the `update` method.
    pub fn add(&self, observer: &Arc<O>) -> Result<Arc<O>, InvalidObserver> {
        self.add_with(observer, Method::UPDATE)
    }

    /// Register `observer` under `method`. Adding an observer equal to one already
    /// registered replaces its method instead of adding a second entry.
    pub fn add_with(
        &self,
        observer: &Arc<O>,
        method: impl Into<Method>,
    ) -> Result<Arc<O>, InvalidObserver> {
        let method = method.into();
        if !observer.responds_to(&method) {
            return Err(InvalidObserver::new(method));
        }
        Ok(self.register(observer, method))
    }

    /// Registration without the `responds_to` check; callers validate first.
    pub(crate) fn register(&self, observer: &Arc<O>, method: Method) -> Arc<O> {
        let guard = self.state.lock();
        guard.borrow_mut().insert(observer, method);
        Arc::clone(observer)
    }

    /// Remove `observer`. Returns the registered instance, or `None` if it was
    /// not registered (or already reclaimed).
    pub fn delete(&self, observer: &O) -> Option<Arc<O>> {
        let guard = self.state.lock();
        let removed = guard.borrow_mut().remove(observer);
        removed.map(|(o, _)| o)
    }

    pub fn contains(&self, observer: &O) -> bool {
        let guard = self.state.lock();
        let found = guard.borrow().contains_key(observer);
        found
    }

    /// Method `observer` is currently registered under.
    pub fn method_of(&self, observer: &O) -> Option<Method> {
        let guard = self.state.lock();
        let method = guard.borrow().get(observer).map(|(_, m)| m.clone());
        method
    }

    /// Notify every live observer with `args`, collecting return values in
    /// registration order.
    pub fn notify<A>(&self, args: &A) -> Result<Vec<O::Output>, O::Error>
    where
        A: ?Sized,
        O: Receive<A>,
    {
        self.notify_with(args, None)
    }

    /// Like `notify`, also handing `callback` to every observer.
    ///
    /// The set of observers is fixed when the call starts. An observer deleted by
    /// an earlier callback in the same call is skipped. One whose last outside
    /// reference is dropped mid-call is still notified, since the snapshot holds
    /// it. The first observer error stops the call and is returned as is.
    pub fn notify_with<A>(
        &self,
        args: &A,
        callback: Option<&Callback<'_, A, O::Output>>,
    ) -> Result<Vec<O::Output>, O::Error>
    where
        A: ?Sized,
        O: Receive<A>,
    {
        let guard = self.state.lock();
        let snapshot = guard.borrow_mut().live_entries();
        tracing::trace!(observers = snapshot.len(), "notifying observers");

        let mut results = Vec::with_capacity(snapshot.len());
        for (handle, observer) in &snapshot {
            let method = guard.borrow().value(*handle).cloned();
            let Some(method) = method else {
                tracing::trace!("observer removed during notify; skipping");
                continue;
            };
            results.push(observer.receive(&method, args, callback)?);
        }
        Ok(results)
    }
}
