//! # PITLANE Core
//!
//! Cross-thread primitives shared by the thread manager, the engine loop and
//! every subsystem that plugs into them.
//!
//! ## Primitives
//!
//! 1. **`TaskQueue`** - unbounded FIFO, blocking `pop` and non-blocking `try_pop`
//! 2. **`DoubleBuffer`** - writer fills the back slot, readers see the front slot
//! 3. **`ReadWriteLock`** - N readers XOR 1 writer with scoped guards
//! 4. **`AtomicState`** - enum cell with acquire/release ordering and CAS
//!
//! ## Example
//!
//! ```rust
//! use pitlane_core::{DoubleBuffer, TaskQueue};
//!
//! let events = TaskQueue::new();
//! events.push("lap completed");
//! assert_eq!(events.try_pop(), Some("lap completed"));
//!
//! let positions = DoubleBuffer::new(vec![0.0_f32; 4]);
//! positions.modify_back(|p| p[0] = 12.5);
//! positions.swap();
//! assert!((positions.front()[0] - 12.5).abs() < f32::EPSILON);
//! ```

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod sync;

pub use sync::{
    AtomicRepr, AtomicState, BackGuard, DoubleBuffer, FrontGuard, ReadGuard, ReadWriteLock,
    TaskQueue, WriteGuard,
};
