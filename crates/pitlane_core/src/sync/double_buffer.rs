//! # Double Buffer
//!
//! Two instances of the same value type, labelled front and back.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────────────────────┐
//!                    │        DoubleBuffer<T>      │
//!                    │                             │
//!                    │  ┌─────────┐  ┌─────────┐   │
//!                    │  │ front   │  │ back    │   │
//!                    │  │ Arc<T>  │  │ Arc<T>  │   │
//!                    │  └────┬────┘  └────┬────┘   │
//!                    │       └──swap()────┘        │
//!                    └─────────────────────────────┘
//!                              │
//!              ┌───────────────┼───────────────┐
//!              ▼               ▼               ▼
//!      ┌──────────────┐ ┌────────────┐ ┌────────────┐
//!      │  BackGuard   │ │ FrontGuard │ │   swap()   │
//!      │  (producer)  │ │ (readers)  │ │ (1/frame)  │
//!      └──────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! ## Thread Safety
//!
//! - `FrontGuard`: a shared snapshot of the front instance (many allowed)
//! - `BackGuard`: exclusive access to the back instance
//! - `swap()`: exchanges the two instances once no back writer is active
//!
//! Readers never block writers or `swap`. A front guard taken before a swap
//! keeps the instance it was taken on alive. It stays valid but is stale;
//! re-acquire `front()` to see the newly published data. Writing to a back
//! instance that stale readers still share copies it first.
//!
//! Holding a `BackGuard` while calling `swap` on the same thread deadlocks.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// Double-buffered storage for per-frame results.
///
/// ## Usage
///
/// ```rust
/// use pitlane_core::DoubleBuffer;
///
/// let lap_times = DoubleBuffer::new(Vec::<f64>::new());
///
/// // Producer fills the back instance
/// lap_times.back_mut().push(81.4);
///
/// // Nothing published yet
/// assert!(lap_times.front().is_empty());
///
/// // Single swap point per frame
/// lap_times.swap();
/// assert_eq!(lap_times.front().as_slice(), &[81.4]);
/// ```
pub struct DoubleBuffer<T> {
    /// Published instance. Locked only long enough to clone or replace the `Arc`.
    front: Mutex<Arc<T>>,

    /// Instance being written. Held for the whole life of a `BackGuard`.
    /// Lock order: `back` before `front`.
    back: Mutex<Arc<T>>,

    /// Number of completed swaps.
    swap_count: AtomicU64,
}

impl<T> DoubleBuffer<T> {
    /// Creates a buffer with both instances set to a copy of `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self
    where
        T: Clone,
    {
        Self::from_slots(initial.clone(), initial)
    }

    /// Creates a buffer from explicit front and back instances.
    #[must_use]
    pub fn from_slots(front: T, back: T) -> Self {
        Self {
            front: Mutex::new(Arc::new(front)),
            back: Mutex::new(Arc::new(back)),
            swap_count: AtomicU64::new(0),
        }
    }

    /// Returns a snapshot of the current front instance.
    ///
    /// Never waits for writers or for `swap`.
    #[must_use]
    pub fn front(&self) -> FrontGuard<T> {
        FrontGuard {
            value: Arc::clone(&self.front.lock()),
        }
    }

    /// Runs `f` against the front instance.
    pub fn with_front<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let front = self.front();
        f(&front)
    }

    /// Exchanges the front and back instances.
    ///
    /// Waits for an active `BackGuard` to drop first, so readers never see a
    /// half-written instance become front.
    pub fn swap(&self) {
        let mut back = self.back.lock();
        let mut front = self.front.lock();
        std::mem::swap(&mut *front, &mut *back);
        drop(front);

        self.swap_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of swaps performed so far.
    #[inline]
    #[must_use]
    pub fn swap_count(&self) -> u64 {
        self.swap_count.load(Ordering::Relaxed)
    }
}

impl<T: Clone> DoubleBuffer<T> {
    /// Returns a write guard on the current back instance.
    ///
    /// Blocks while another writer or a `swap` is in progress. If stale
    /// readers still share the back instance it is copied first.
    #[must_use]
    pub fn back_mut(&self) -> BackGuard<'_, T> {
        let mut guard = self.back.lock();
        let _ = Arc::make_mut(&mut guard);
        BackGuard { guard }
    }

    /// Runs `f` against the back instance while holding the writer lock.
    pub fn modify_back<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut back = self.back_mut();
        f(&mut back)
    }
}

impl<T: Default> Default for DoubleBuffer<T> {
    fn default() -> Self {
        Self::from_slots(T::default(), T::default())
    }
}

impl<T> std::fmt::Debug for DoubleBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoubleBuffer")
            .field("swap_count", &self.swap_count())
            .finish_non_exhaustive()
    }
}

/// Shared snapshot of the front instance of a [`DoubleBuffer`].
pub struct FrontGuard<T> {
    value: Arc<T>,
}

impl<T> FrontGuard<T> {
    /// Whether both guards read the same instance.
    #[inline]
    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl<T> Deref for FrontGuard<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

/// Exclusive access to the back instance of a [`DoubleBuffer`].
pub struct BackGuard<'a, T> {
    guard: MutexGuard<'a, Arc<T>>,
}

impl<T> Deref for BackGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T: Clone> DerefMut for BackGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        // Unique since `back_mut`: readers only ever clone the front Arc
        Arc::make_mut(&mut self.guard)
    }
}
