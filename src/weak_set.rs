//! WeakSet: a set that does not keep its members alive.
//!
//! Membership is decided by `Eq + Hash` on the member. Members vanish once
//! their last strong reference is dropped; there is no explicit cleanup call.

use crate::weak_table::WeakTable;
use core::borrow::Borrow;
use core::cell::RefCell;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use parking_lot::ReentrantMutex;
use std::collections::hash_map::RandomState;
use std::sync::Arc;

pub struct WeakSet<T: ?Sized, S = RandomState> {
    contents: ReentrantMutex<RefCell<WeakTable<T, (), S>>>,
}

impl<T: ?Sized> WeakSet<T> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<T: ?Sized> Default for WeakSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized, S> WeakSet<T, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            contents: ReentrantMutex::new(RefCell::new(WeakTable::with_hasher(hasher))),
        }
    }

    pub fn len(&self) -> usize {
        let guard = self.contents.lock();
        let n = RefCell::borrow(&guard).len();
        n
    }

    pub fn is_empty(&self) -> bool {
        let guard = self.contents.lock();
        let empty = RefCell::borrow(&guard).is_empty();
        empty
    }

    /// Snapshot of the live members, in insertion order. Each call starts afresh.
    pub fn iter(&self) -> Iter<T> {
        let guard = self.contents.lock();
        let members: Vec<Arc<T>> = guard
            .borrow_mut()
            .live_entries()
            .into_iter()
            .map(|(_, member)| member)
            .collect();
        Iter {
            members: members.into_iter(),
        }
    }

    /// Visit every live member while holding the set's lock. The visitor may
    /// call back into this set from the same thread.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&Arc<T>),
    {
        let guard = self.contents.lock();
        let members = guard.borrow_mut().live_entries();
        for (_, member) in &members {
            visit(member);
        }
    }
}

impl<T, S> WeakSet<T, S>
where
    T: ?Sized + Eq + Hash,
    S: BuildHasher,
{
    /// Build a set from `members`; later members equal to an earlier one are dropped.
    pub fn from_members<'a, I>(members: I) -> Self
    where
        I: IntoIterator<Item = &'a Arc<T>>,
        T: 'a,
        S: Default,
    {
        let set = Self::with_hasher(S::default());
        for member in members {
            set.add(member);
        }
        set
    }

    /// Add `member`. Returns `None` without replacing anything if an equal
    /// member is already present.
    pub fn add(&self, member: &Arc<T>) -> Option<Arc<T>> {
        let guard = self.contents.lock();
        let added = guard.borrow_mut().try_insert(member, ()).ok();
        added.map(|_| Arc::clone(member))
    }

    /// Remove the member equal to `member`, returning it.
    pub fn delete<Q>(&self, member: &Q) -> Option<Arc<T>>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let guard = self.contents.lock();
        let removed = guard.borrow_mut().remove(member);
        removed.map(|(m, ())| m)
    }

    pub fn contains<Q>(&self, member: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let guard = self.contents.lock();
        let found = RefCell::borrow(&guard).contains_key(member);
        found
    }
}

impl<'a, T, S> Extend<&'a Arc<T>> for WeakSet<T, S>
where
    T: ?Sized + Eq + Hash + 'a,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = &'a Arc<T>>>(&mut self, iter: I) {
        for member in iter {
            self.add(member);
        }
    }
}

impl<'a, T: ?Sized, S> IntoIterator for &'a WeakSet<T, S> {
    type Item = Arc<T>;
    type IntoIter = Iter<T>;
    fn into_iter(self) -> Iter<T> {
        self.iter()
    }
}

impl<T: ?Sized, S> fmt::Debug for WeakSet<T, S>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Snapshot iterator over a `WeakSet`. Holding it keeps the yielded members alive.
pub struct Iter<T: ?Sized> {
    members: std::vec::IntoIter<Arc<T>>,
}

impl<T: ?Sized> Clone for Iter<T> {
    fn clone(&self) -> Self {
        Self {
            members: self.members.clone(),
        }
    }
}

impl<T: ?Sized> Iterator for Iter<T> {
    type Item = Arc<T>;
    fn next(&mut self) -> Option<Arc<T>> {
        self.members.next()
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.members.size_hint()
    }
}

impl<T: ?Sized> ExactSizeIterator for Iter<T> {}
