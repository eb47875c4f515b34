//! # Atomic State Cell
//!
//! Lock-free cell holding one value of a small enum.
//!
//! Stores use `Release`, loads use `Acquire`: a thread that observes a new
//! state also observes every write the setting thread made before the store.
//! `compare_and_swap` is the primitive for exactly-once transitions without a
//! separate lock.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};

/// Enum types that can live in an [`AtomicState`].
///
/// `from_raw(into_raw(s)) == s` must hold for every value. Use
/// [`atomic_repr!`](crate::atomic_repr) for fieldless `#[repr(u8)]` enums.
pub trait AtomicRepr: Copy + Eq {
    /// Converts the state into its raw representation.
    fn into_raw(self) -> u8;

    /// Rebuilds a state from a raw value produced by `into_raw`.
    fn from_raw(raw: u8) -> Self;
}

/// Implements [`AtomicRepr`] for a fieldless enum by listing its variants.
///
/// ```rust
/// use pitlane_core::{atomic_repr, AtomicState};
///
/// #[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// #[repr(u8)]
/// enum Light { Red, Green }
///
/// atomic_repr!(Light { Red, Green });
///
/// let light = AtomicState::new(Light::Red);
/// assert!(light.compare_and_swap(Light::Red, Light::Green));
/// assert_eq!(light.get(), Light::Green);
/// ```
#[macro_export]
macro_rules! atomic_repr {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::AtomicRepr for $ty {
            #[inline]
            fn into_raw(self) -> u8 {
                self as u8
            }

            #[inline]
            fn from_raw(raw: u8) -> Self {
                $(
                    if raw == $ty::$variant as u8 {
                        return $ty::$variant;
                    }
                )+
                unreachable!("raw value {raw} is not a variant of {}", stringify!($ty))
            }
        }
    };
}

/// Lock-free enumerated state cell.
pub struct AtomicState<S: AtomicRepr> {
    raw: AtomicU8,
    _state: PhantomData<fn() -> S>,
}

impl<S: AtomicRepr> AtomicState<S> {
    /// Creates a cell holding `initial`.
    #[must_use]
    pub fn new(initial: S) -> Self {
        Self {
            raw: AtomicU8::new(initial.into_raw()),
            _state: PhantomData,
        }
    }

    /// Unconditionally stores `state` (release).
    #[inline]
    pub fn set(&self, state: S) {
        self.raw.store(state.into_raw(), Ordering::Release);
    }

    /// Loads the current state (acquire).
    #[inline]
    #[must_use]
    pub fn get(&self) -> S {
        S::from_raw(self.raw.load(Ordering::Acquire))
    }

    /// Stores `state` and returns the previous value.
    #[inline]
    pub fn swap(&self, state: S) -> S {
        S::from_raw(self.raw.swap(state.into_raw(), Ordering::AcqRel))
    }

    /// Replaces the value with `desired` only if it currently equals `expected`.
    ///
    /// Returns whether the replacement happened. Of N threads racing with the
    /// same `expected`, exactly one succeeds.
    #[inline]
    pub fn compare_and_swap(&self, expected: S, desired: S) -> bool {
        self.raw
            .compare_exchange(
                expected.into_raw(),
                desired.into_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Returns `true` if the cell currently holds `state`.
    #[inline]
    #[must_use]
    pub fn is(&self, state: S) -> bool {
        self.get() == state
    }
}

impl<S: AtomicRepr + Default> Default for AtomicState<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: AtomicRepr + fmt::Debug> fmt::Debug for AtomicState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicState").field(&self.get()).finish()
    }
}
