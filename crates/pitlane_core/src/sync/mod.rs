//! # Synchronization Primitives
//!
//! The only sanctioned ways to move data between the engine thread and the
//! threads owned by the `ThreadManager`.
//!
//! ```text
//!   Worker threads                         Engine thread
//!   ──────────────                         ─────────────
//!   results ──► DoubleBuffer::back_mut     DoubleBuffer::front ──► render
//!   events  ──► TaskQueue::push            TaskQueue::try_pop  ──► dispatch
//!   status  ──► AtomicState::set           AtomicState::get    ──► branch
//! ```
//!
//! Nothing here takes the thread manager's table lock.

mod atomic_state;
mod double_buffer;
mod queue;
mod rw_lock;

pub use atomic_state::{AtomicRepr, AtomicState};
pub use double_buffer::{BackGuard, DoubleBuffer, FrontGuard};
pub use queue::TaskQueue;
pub use rw_lock::{ReadGuard, ReadWriteLock, WriteGuard};
