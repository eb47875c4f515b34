//! Thread record vocabulary.

use serde::{Deserialize, Serialize};

use pitlane_core::atomic_repr;

/// Lifecycle status of a managed thread.
///
/// ```text
/// Idle ──► Running ◄──► Paused
///             │            │
///             └──► Stopping ◄┘ ──► Stopped
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ThreadStatus {
    /// Registered, not yet executing.
    #[default]
    Idle,
    /// Executing its callable.
    Running,
    /// Parked until resumed or stopped.
    Paused,
    /// Leaving its loop.
    Stopping,
    /// Finished. The record stays queryable until shutdown.
    Stopped,
}

atomic_repr!(ThreadStatus {
    Idle,
    Running,
    Paused,
    Stopping,
    Stopped,
});

impl ThreadStatus {
    /// Whether the thread still counts against the live-thread cap.
    #[inline]
    #[must_use]
    pub fn is_live(self) -> bool {
        self != Self::Stopped
    }
}

/// Scheduling priority requested for a thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadPriority {
    /// Background work.
    Low,
    /// Default.
    #[default]
    Normal,
    /// Latency-sensitive work.
    High,
    /// Round-robin real-time scheduling, usually needs privileges.
    RealTime,
}

/// How a thread treats its callable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ThreadKind {
    /// Invoke once, then finish.
    #[default]
    Transient,
    /// Invoke repeatedly until stopped.
    Looping,
}

/// Outcome of a best-effort OS scheduling hint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NativeHint {
    /// The OS accepted the hint.
    Applied,
    /// This platform has no such control.
    Unsupported,
    /// The OS refused the hint (typically missing privileges).
    Rejected {
        /// Raw OS error code.
        code: i32,
    },
}

impl NativeHint {
    /// Whether the OS honored the hint.
    #[inline]
    #[must_use]
    pub fn is_honored(self) -> bool {
        self == Self::Applied
    }
}

/// Snapshot of one thread record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadInfo {
    /// Unique thread name.
    pub name: String,
    /// Transient or looping.
    pub kind: ThreadKind,
    /// Logical priority.
    pub priority: ThreadPriority,
    /// Status at snapshot time.
    pub status: ThreadStatus,
    /// Outcome of the priority hint applied at spawn.
    pub native_priority: NativeHint,
    /// Owning pool, for pool workers.
    pub pool: Option<String>,
}
