//! # Read-Write Lock
//!
//! Many readers XOR one writer over a value of type `T`.
//!
//! Acquisition always hands back a guard. Releasing is either explicit
//! (`unlock_read` / `unlock_write` consume the guard) or implicit when the
//! guard leaves scope, so a lock is released on every exit path: early
//! return, `?` propagation, or unwinding out of a panicking task.
//!
//! No fairness is promised beyond `parking_lot`'s eventual fairness. A writer
//! can be delayed by constant read pressure.

use std::fmt;
use std::ops::{Deref, DerefMut};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Multi-reader / single-writer lock.
#[derive(Default)]
pub struct ReadWriteLock<T> {
    inner: RwLock<T>,
}

impl<T> ReadWriteLock<T> {
    /// Creates a new lock protecting `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }

    /// Acquires shared access, blocking while a writer holds the lock.
    #[must_use]
    pub fn lock_read(&self) -> ReadGuard<'_, T> {
        ReadGuard {
            guard: self.inner.read(),
        }
    }

    /// Releases shared access.
    pub fn unlock_read(guard: ReadGuard<'_, T>) {
        drop(guard);
    }

    /// Acquires exclusive access, blocking until no reader or writer holds the lock.
    #[must_use]
    pub fn lock_write(&self) -> WriteGuard<'_, T> {
        WriteGuard {
            guard: self.inner.write(),
        }
    }

    /// Releases exclusive access.
    pub fn unlock_write(guard: WriteGuard<'_, T>) {
        drop(guard);
    }

    /// Attempts shared access without blocking.
    #[must_use]
    pub fn try_read(&self) -> Option<ReadGuard<'_, T>> {
        self.inner.try_read().map(|guard| ReadGuard { guard })
    }

    /// Attempts exclusive access without blocking.
    #[must_use]
    pub fn try_write(&self) -> Option<WriteGuard<'_, T>> {
        self.inner.try_write().map(|guard| WriteGuard { guard })
    }

    /// Returns a mutable reference without locking (exclusive borrow proves no guards exist).
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    /// Consumes the lock, returning the protected value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadWriteLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_read() {
            Some(guard) => f.debug_struct("ReadWriteLock").field("value", &*guard).finish(),
            None => f.debug_struct("ReadWriteLock").field("value", &"<locked>").finish(),
        }
    }
}

/// Scoped shared acquisition of a [`ReadWriteLock`].
pub struct ReadGuard<'a, T> {
    guard: RwLockReadGuard<'a, T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Scoped exclusive acquisition of a [`ReadWriteLock`].
pub struct WriteGuard<'a, T> {
    guard: RwLockWriteGuard<'a, T>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
