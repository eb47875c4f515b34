//! # Runtime Configuration
//!
//! Loaded once at startup from TOML. Every section has defaults, so an empty
//! file (or no file at all) yields a working configuration.
//!
//! ```toml
//! [app]
//! name = "Car Racing Simulation"
//! width = 1280
//! height = 720
//! fullscreen = false
//!
//! [threads]
//! max_threads = 0          # 0 = hardware concurrency, at least 2
//! general_pool_workers = 2
//!
//! [timing]
//! fixed_step_hz = 60
//! max_step_ms = 33
//! min_frame_us = 1000
//!
//! [logging]
//! level = "info"
//! console = true
//! file = "pitlane.log"
//!
//! [profiling]
//! enabled = true
//! report_path = "profiling_report.txt"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitlaneConfig {
    /// Application window settings.
    pub app: AppConfig,
    /// Thread manager sizing.
    pub threads: ThreadConfig,
    /// Frame loop timing.
    pub timing: TimingConfig,
    /// Log output.
    pub logging: LoggingConfig,
    /// Profiler settings.
    pub profiling: ProfilingConfig,
}

impl PitlaneConfig {
    /// Parses a configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for inconsistent values.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
    /// errors of [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Serializes the configuration back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if serialization fails.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Checks that the values are usable together.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.timing.fixed_step_hz == 0 {
            return Err(ConfigError::Invalid("timing.fixed_step_hz must be > 0".into()));
        }
        if self.timing.fixed_step_hz > 1000 {
            return Err(ConfigError::Invalid(
                "timing.fixed_step_hz must be <= 1000 (fixed step floor is 1ms)".into(),
            ));
        }
        if self.timing.max_step() < self.timing.fixed_step() {
            return Err(ConfigError::Invalid(format!(
                "timing.max_step_ms ({}) is shorter than one fixed step ({:?})",
                self.timing.max_step_ms,
                self.timing.fixed_step()
            )));
        }
        if self.threads.max_threads != 0
            && self.threads.general_pool_workers > self.threads.max_threads
        {
            return Err(ConfigError::Invalid(format!(
                "threads.general_pool_workers ({}) exceeds threads.max_threads ({})",
                self.threads.general_pool_workers, self.threads.max_threads
            )));
        }
        if parse_level(&self.logging.level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "logging.level '{}' is not one of trace/debug/info/warn/error",
                self.logging.level
            )));
        }
        Ok(())
    }
}

/// Application window settings, passed to `Engine::initialize`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name.
    pub name: String,
    /// Window width in pixels.
    pub width: u32,
    /// Window height in pixels.
    pub height: u32,
    /// Start in fullscreen.
    pub fullscreen: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Car Racing Simulation".to_owned(),
            width: 1280,
            height: 720,
            fullscreen: false,
        }
    }
}

/// Thread manager sizing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadConfig {
    /// Live-thread cap. 0 resolves to hardware concurrency (at least 2).
    pub max_threads: usize,
    /// Workers in the engine's `GeneralPool`.
    pub general_pool_workers: usize,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            max_threads: 0,
            general_pool_workers: 2,
        }
    }
}

/// Frame loop timing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Fixed-update rate.
    pub fixed_step_hz: u32,
    /// Largest frame delta fed to the accumulator (spiral-of-death clamp).
    pub max_step_ms: u64,
    /// Frames shorter than this yield 1ms to the OS.
    pub min_frame_us: u64,
}

impl TimingConfig {
    /// Duration of one fixed step.
    #[must_use]
    pub fn fixed_step(&self) -> Duration {
        Duration::from_secs(1) / self.fixed_step_hz.max(1)
    }

    /// The per-frame delta clamp.
    #[must_use]
    pub fn max_step(&self) -> Duration {
        Duration::from_millis(self.max_step_ms)
    }

    /// Frame duration under which the loop yields.
    #[must_use]
    pub fn min_frame(&self) -> Duration {
        Duration::from_micros(self.min_frame_us)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fixed_step_hz: 60,
            max_step_ms: 33,
            min_frame_us: 1000,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level: trace, debug, info, warn or error.
    pub level: String,
    /// Write to stdout.
    pub console: bool,
    /// Append to this file as well.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// The configured level, falling back to INFO for unknown strings.
    #[must_use]
    pub fn level_filter(&self) -> tracing::Level {
        parse_level(&self.level).unwrap_or(tracing::Level::INFO)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            console: true,
            file: None,
        }
    }
}

/// Report file written at shutdown unless configured otherwise.
pub const DEFAULT_REPORT_PATH: &str = "profiling_report.txt";

/// Profiler settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilingConfig {
    /// Record section timings.
    pub enabled: bool,
    /// Where `Engine::shutdown` writes the report. Defaults to
    /// `profiling_report.txt`; nothing is written while profiling is disabled.
    pub report_path: Option<PathBuf>,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            report_path: Some(PathBuf::from(DEFAULT_REPORT_PATH)),
        }
    }
}

fn parse_level(level: &str) -> Option<tracing::Level> {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Some(tracing::Level::TRACE),
        "debug" => Some(tracing::Level::DEBUG),
        "info" => Some(tracing::Level::INFO),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "error" => Some(tracing::Level::ERROR),
        _ => None,
    }
}
