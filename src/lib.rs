//! weak-observable: observer registries that hold no strong references to
//! the observers, or to the per-key groups, they manage.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: an observer that becomes unreachable everywhere else drops out of
//!   notification on its own, with no explicit unregistration, while the
//!   registries stay safe to share between threads.
//! - Layers:
//!   - WeakTable<K, V, S>: structural map from weakly held keys to values,
//!     with stable generational handles, precomputed hashes and lazy sweeping
//!     of reclaimed entries.
//!   - WeakSet<T, S>: a locked WeakTable with unit values; a general weak
//!     membership primitive.
//!   - Observable<O>: a locked WeakTable from observer to the method it is
//!     notified through; add / delete / notify.
//!   - Hub<K, O, S>: key -> Observable, where the hub holds each observable
//!     only weakly and the observers hold it strongly through their
//!     `Backrefs`. A key lives exactly as long as some observer backs it.
//!
//! What "weak" means here
//! - Objects are shared as `Arc<T>` and registries store `Weak<T>`. An entry
//!   is dead once the last `Arc` is dropped. Dead entries never match a
//!   lookup and are never notified; their slots are reclaimed lazily (on
//!   iteration, and amortised over writes).
//! - Identity is `Eq + Hash` on the referent, not the allocation. Two equal
//!   observers collide in an `Observable`; re-adding overwrites the method.
//!
//! Locking
//! - Every `WeakSet`, `Observable` and `Hub` owns one re-entrant mutex, held
//!   for the full duration of each public call and released on every exit
//!   path, including unwinding.
//! - `Observable::notify` keeps its lock while observers run, but releases the
//!   table borrow first. A callback may re-enter the same observable from the
//!   same thread; a callback that blocks stalls every other caller.
//! - `Hub::add`, `delete` and `notify` hold the hub lock while delegating to
//!   the key's observable, so the hub lock is always taken before an
//!   observable's lock. Callbacks may re-enter the hub from the same thread.
//! - `Eq`/`Hash` of keys and observers run while the internal `RefCell` is
//!   borrowed; re-entering the same collection from them panics.
//!
//! Errors
//! - Registering an observer that does not respond to the requested method
//!   fails with `InvalidObserver` and changes nothing.
//! - Errors returned by an observer abort the rest of that `notify` and reach
//!   the caller unchanged (`Receive::Error`).
//! - Absence is not an error: deleting an unknown observer returns `None`,
//!   notifying an unknown key returns an empty `Vec`.
//!
//! Notes and non-goals
//! - No strong-observer mode.
//! - Ordering is insertion order among currently live observers; re-adding an
//!   observer keeps its position.
//! - A dropped `Hub` leaves its back-references inside observers until those
//!   observers are dropped or deleted.

pub mod error;
pub mod hub;
pub mod observable;
pub mod observed;
pub mod observer;
pub mod weak_set;
pub mod weak_table;
mod weak_table_proptest;
mod weak_value_map;

// Public surface
pub use error::InvalidObserver;
pub use hub::{Backrefs, Hub, HubId, HubObserver};
pub use observable::Observable;
pub use observed::{Observed, Observers};
pub use observer::{Callback, Method, Observer, Receive};
pub use weak_set::WeakSet;
pub use weak_table::InsertError;
