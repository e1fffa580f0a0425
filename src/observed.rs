//! Lazily attached `Observable` for arbitrary host types.
//!
//! A host embeds an [`Observers`] slot and implements [`Observed`]; the first
//! call to `observers()` creates the observable, later calls return the same one.

use crate::observable::Observable;
use std::fmt;
use once_cell::sync::OnceCell;

pub struct Observers<O> {
    cell: OnceCell<Observable<O>>,
}

impl<O> Observers<O> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// The observable, created on first access.
    pub fn get(&self) -> &Observable<O> {
        self.cell.get_or_init(Observable::new)
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<O> Default for Observers<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> fmt::Debug for Observers<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(observable) => fmt::Debug::fmt(observable, f),
            None => f.write_str("Observers(<uninit>)"),
        }
    }
}

pub trait Observed {
    type Observer;

    fn observers_slot(&self) -> &Observers<Self::Observer>;

    /// The host's observable, memoised per instance.
    fn observers(&self) -> &Observable<Self::Observer> {
        self.observers_slot().get()
    }
}
