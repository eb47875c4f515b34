//! # PITLANE
//!
//! Thread lifecycle management and a fixed-timestep engine loop for a racing
//! simulation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────── Engine (main thread) ───────────────────────────┐
//! │  GameState cell + callbacks        frame loop         subsystems            │
//! │  ┌────────────────────┐   ┌──────────────────────┐   ┌───────────────────┐  │
//! │  │ AtomicState + CAS  │◄──│ input/fixed/update/  │──►│ physics, render,  │  │
//! │  │ one callback/state │   │ render, 33ms clamp   │   │ AI, audio, race…  │  │
//! │  └────────────────────┘   └──────────────────────┘   └─────────┬─────────┘  │
//! │            ▲ EngineHandle (Clone, Send + Sync)                 │ submit_task│
//! └────────────┼───────────────────────────────────────────────────┼────────────┘
//!              │                                                   ▼
//! ┌────────────┴────────────── ThreadManager ─────────────────────────────────────┐
//! │ named threads (Transient/Looping, pause/resume/stop)   pools + TaskQueue      │
//! └───────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use pitlane::engine::{Engine, GameState};
//! use pitlane::PitlaneConfig;
//!
//! let mut engine = Engine::new(PitlaneConfig::default());
//! engine.initialize("Car Racing Simulation", 1280, 720, false)?;
//!
//! let handle = engine.handle();
//! engine.register_state_callback(GameState::RaceFinished, move || handle.request_exit(0));
//!
//! let exit_code = engine.run()?;
//! assert_eq!(exit_code, 0);
//! # Ok::<(), pitlane::EngineError>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod profiler;
pub mod threads;

pub use config::PitlaneConfig;
pub use engine::{Engine, EngineHandle, GameState, Subsystem};
pub use error::{ConfigError, EngineError, SubsystemError, ThreadError};
pub use profiler::{Profiler, ReportOrder};
pub use threads::{ThreadKind, ThreadManager, ThreadPriority, ThreadStatus};
