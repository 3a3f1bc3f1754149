//! Single-load cells shared by every lazily decoded value of an archive.
//!
//! A [`LazyValue`] is `Unloaded` until its first successful load and `Loaded` forever after. The
//! load itself (the `Loading` state) only ever runs while the archive-wide [`LoadLock`] is held,
//! and the cell is re-checked once the lock is acquired, so two readers racing on the same value
//! never run its loader twice. Reads of a loaded value never touch the lock.

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use crate::error::Result;

/// The lock every first-time load of an archive goes through
#[derive(Debug, Default)]
pub(crate) struct LoadLock(Mutex<()>);

/// Proof that the [`LoadLock`] is held by the current thread
pub(crate) struct LoadGuard<'a>(#[allow(dead_code)] MutexGuard<'a, ()>);

impl LoadLock {
    pub fn lock(&self) -> LoadGuard<'_> {
        // A panicking loader never publishes a value, so the data behind the lock is still sound
        LoadGuard(self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[derive(Debug)]
pub(crate) struct LazyValue<T> {
    cell: OnceLock<T>,
}

impl<T> Default for LazyValue<T> {
    fn default() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }
}

impl<T> LazyValue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Returns the value, loading it under `lock` if this is the first access
    ///
    /// The loader receives the held guard so it can load other values without re-locking.
    pub fn get_or_load<F>(&self, lock: &LoadLock, load: F) -> Result<&T>
    where
        F: FnOnce(&LoadGuard<'_>) -> Result<T>,
    {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }

        let guard = lock.lock();
        self.get_or_load_locked(&guard, || load(&guard))
    }

    /// Same as [`LazyValue::get_or_load`] for callers already holding the lock
    pub fn get_or_load_locked<F>(&self, _guard: &LoadGuard<'_>, load: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }

        let value = load()?;
        Ok(self.cell.get_or_init(|| value))
    }
}
