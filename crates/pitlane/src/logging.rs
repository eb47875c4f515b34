//! Logging bootstrap.
//!
//! Library code only emits `tracing` events. The binary (or a test that
//! wants output) installs the subscriber once at startup:
//!
//! ```text
//! registry ─┬─ console fmt layer (optional)
//!           ├─ file fmt layer, append, no ANSI (optional)
//!           └─ level filter
//! ```

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;
use crate::error::{ConfigError, ConfigResult};

/// Installs the global subscriber described by `config`.
///
/// # Errors
///
/// - [`ConfigError::Io`] if the log file cannot be opened
/// - [`ConfigError::Logging`] if a global subscriber is already installed
pub fn init(config: &LoggingConfig) -> ConfigResult<()> {
    let console = config
        .console
        .then(|| fmt::layer().with_thread_names(true).with_target(false));

    let file = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_thread_names(true)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(LevelFilter::from_level(config.level_filter()))
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}
