//! # Engine
//!
//! Game-state machine, state callbacks and the fixed-timestep frame loop
//! that drives [`Subsystem`]s.

mod clock;
mod game_loop;
mod state;
mod subsystem;

pub use clock::{Clock, ManualClock, SystemClock};
pub use game_loop::{Engine, EngineHandle, GENERAL_POOL, MIN_FIXED_STEP};
pub use state::GameState;
pub use subsystem::Subsystem;
