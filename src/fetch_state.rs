//! Lazily fetched entity state.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Whether a lazily populated value has been fetched yet.
///
/// The transition is one-way: `Unfetched -> Fetched`. An explicit re-fetch
/// replaces the `Fetched` payload wholesale; nothing ever invalidates it.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState<T> {
    Unfetched,
    Fetched(T),
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        FetchState::Unfetched
    }
}

impl<T> FetchState<T> {
    pub fn is_fetched(&self) -> bool {
        matches!(self, FetchState::Fetched(_))
    }

    pub fn fetched(&self) -> Option<&T> {
        match self {
            FetchState::Fetched(value) => Some(value),
            FetchState::Unfetched => None,
        }
    }
}

// Writers only ever swap in whole values, so a poisoned lock still holds
// consistent data.
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
