//! Plug-in seam for physics, rendering, AI, audio, input and race logic.

use std::time::Duration;

use super::GameState;
use crate::error::SubsystemError;
use crate::threads::ThreadManager;

/// A collaborator driven by the frame loop.
///
/// Every hook has a no-op default. Hooks receive the current game state and
/// decide for themselves whether to work in it (physics only while
/// [`GameState::Racing`], for example). They run on the thread calling
/// [`Engine::run`](super::Engine::run).
///
/// Per frame:
///
/// ```text
/// process_input ─► fixed_update × 0..n ─► update ─► render
/// ```
///
/// `process_input` and `render` are skipped while Exiting.
pub trait Subsystem: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Called once from `Engine::initialize`, after the thread manager and
    /// the general pool are up. An error aborts initialization.
    ///
    /// # Errors
    ///
    /// Returns the reason the subsystem cannot start.
    fn initialize(&mut self, threads: &ThreadManager) -> Result<(), SubsystemError> {
        let _ = threads;
        Ok(())
    }

    /// Input phase.
    fn process_input(&mut self, state: GameState) {
        let _ = state;
    }

    /// One fixed step of simulation.
    fn fixed_update(&mut self, step: Duration, state: GameState) {
        let _ = (step, state);
    }

    /// Variable-rate update with the clamped frame delta.
    fn update(&mut self, delta: Duration, state: GameState) {
        let _ = (delta, state);
    }

    /// Render phase.
    fn render(&mut self, state: GameState) {
        let _ = state;
    }

    /// Called once during engine shutdown, in reverse registration order.
    fn shutdown(&mut self) {}
}
