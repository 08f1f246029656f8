//! Shared aggregate handle
//!
//! One exclusive writer per aggregate instance. Readers either run a
//! closure under the read lock or take an owned snapshot; neither can
//! observe a collection halfway through a reindex.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::hydrate::{Hydrate, hydrate_with};
use crate::config::ContentConfig;
use crate::error::Result;

/// Cloneable handle to one aggregate behind a per-instance lock
#[derive(Debug, Default)]
pub struct SharedAggregate<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> Clone for SharedAggregate<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> SharedAggregate<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }

    /// Owned copy of the current state
    pub fn snapshot(&self) -> T {
        self.read_guard().clone()
    }

    /// Run `f` against the current state under the read lock
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.read_guard())
    }

    /// Apply `f` under the write lock
    ///
    /// `f` works on a copy that replaces the aggregate only when it
    /// returns `Ok`, so an error leaves the pre-call state in place.
    /// Parts held behind an `Arc` (a post's reply thread) are shared by
    /// the copy, so handles into them stay valid across the swap.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let mut guard = self.write_guard();
        let mut working = guard.clone();
        let result = f(&mut working)?;
        *guard = working;
        Ok(result)
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, T> {
        // Writers only swap in complete values, so a poisoned lock still
        // holds a consistent aggregate.
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Hydrate + Clone> SharedAggregate<T> {
    /// Hydrate the current state with `patch`, replacing it on success
    pub fn hydrate_in_place(&self, patch: T::Patch, content: &ContentConfig) -> Result<()> {
        let mut guard = self.write_guard();
        let hydrated = hydrate_with(&*guard, patch, content)?;
        *guard = hydrated;
        Ok(())
    }
}
