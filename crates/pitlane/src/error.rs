//! # Runtime Error Types
//!
//! Every failure the thread manager, the engine and the config loader can
//! report. Configuration errors come back as `Err`; task panics never do,
//! they are caught and logged at the thread boundary.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::GameState;
use crate::threads::ThreadStatus;

/// Errors reported by the [`ThreadManager`](crate::threads::ThreadManager).
#[derive(Error, Debug)]
pub enum ThreadError {
    /// An operation was attempted before `initialize`.
    #[error("thread manager is not initialized")]
    NotInitialized,

    /// `initialize` was called twice.
    #[error("thread manager is already initialized")]
    AlreadyInitialized,

    /// A live thread with this name already exists.
    #[error("thread already exists: {0}")]
    DuplicateThread(String),

    /// A pool with this name already exists.
    #[error("thread pool already exists: {0}")]
    DuplicatePool(String),

    /// No thread with this name is registered.
    #[error("thread not found: {0}")]
    UnknownThread(String),

    /// No pool with this name is registered.
    #[error("thread pool not found: {0}")]
    UnknownPool(String),

    /// Creating the requested threads would exceed the live-thread cap.
    #[error("maximum thread count would be exceeded: {live} live + {requested} requested > {max}")]
    CapacityExceeded {
        /// Threads currently alive.
        live: usize,
        /// Threads the call wanted to add.
        requested: usize,
        /// Cap set at initialization.
        max: usize,
    },

    /// The thread is not in the status the operation requires.
    #[error("cannot {operation} thread {name}: status is {status:?}")]
    InvalidTransition {
        /// Thread name.
        name: String,
        /// Operation that was rejected.
        operation: &'static str,
        /// Status at the time of the call.
        status: ThreadStatus,
    },

    /// The OS refused to spawn the thread.
    #[error("failed to spawn thread {name}: {source}")]
    Spawn {
        /// Thread name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for thread manager operations.
pub type ThreadResult<T> = Result<T, ThreadError>;

/// Failure raised by a subsystem hook.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{subsystem}: {reason}")]
pub struct SubsystemError {
    /// Name of the failing subsystem.
    pub subsystem: String,
    /// Human-readable cause.
    pub reason: String,
}

impl SubsystemError {
    /// Creates a subsystem error.
    pub fn new(subsystem: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            subsystem: subsystem.into(),
            reason: reason.into(),
        }
    }
}

/// Errors reported by the [`Engine`](crate::engine::Engine).
#[derive(Error, Debug)]
pub enum EngineError {
    /// `initialize` was called while the engine was already running.
    #[error("engine already initialized (state {0:?})")]
    AlreadyInitialized(GameState),

    /// `run` was called before `initialize`.
    #[error("cannot run an uninitialized engine")]
    NotInitialized,

    /// The thread manager rejected an operation during startup.
    #[error("thread manager failure: {0}")]
    Threads(#[from] ThreadError),

    /// A subsystem failed to initialize.
    #[error("subsystem failed to initialize: {0}")]
    Subsystem(#[from] SubsystemError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while loading configuration or installing logging.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that was requested.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`PitlaneConfig`](crate::config::PitlaneConfig).
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The values parse but make no sense together.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The logging subscriber could not be installed.
    #[error("failed to install logging: {0}")]
    Logging(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
