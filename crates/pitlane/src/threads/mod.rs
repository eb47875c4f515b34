//! # Threads
//!
//! Named threads with cooperative pause/stop, fixed-size worker pools fed
//! from a shared [`TaskQueue`](pitlane_core::TaskQueue), and best-effort OS
//! priority and affinity hints.

mod manager;
mod native;
mod types;

pub use manager::{Task, ThreadManager};
pub use types::{NativeHint, ThreadInfo, ThreadKind, ThreadPriority, ThreadStatus};
