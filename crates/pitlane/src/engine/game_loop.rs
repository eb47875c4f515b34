//! # Engine Loop
//!
//! ```text
//! Frame N:
//! ┌───────────────────────────────────────────────────────────────┐
//! │ 1. DELTA        now - last, clamped to max_step (33ms)        │
//! │ 2. FPS          frames / elapsed, logged once per second      │
//! │ 3. INPUT        process_input          (skipped when Exiting) │
//! │ 4. FIXED        accumulator += delta                          │
//! │                 while accumulator >= step: fixed_update(step) │
//! │ 5. UPDATE       update(delta)                                 │
//! │ 6. RENDER       render                 (skipped when Exiting) │
//! │ 7. YIELD        sleep 1ms if delta < 1ms                      │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The [`Engine`] is owned by the thread that runs the loop. Everything other
//! threads may touch (game state, callbacks, exit request, thread manager)
//! lives behind an [`EngineHandle`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pitlane_core::AtomicState;

use super::{Clock, GameState, Subsystem, SystemClock};
use crate::config::{AppConfig, PitlaneConfig};
use crate::error::{EngineError, EngineResult};
use crate::profiler::{Profiler, ReportOrder};
use crate::threads::{ThreadManager, ThreadPriority};

/// Name of the pool every engine creates on startup.
pub const GENERAL_POOL: &str = "GeneralPool";

/// Smallest fixed step `set_fixed_time_step` accepts.
pub const MIN_FIXED_STEP: Duration = Duration::from_millis(1);

const FRAME_YIELD: Duration = Duration::from_millis(1);
const FRAME_RATE_WINDOW: Duration = Duration::from_secs(1);

type StateCallback = Arc<dyn Fn() + Send + Sync + 'static>;

struct Shared {
    state: AtomicState<GameState>,
    callbacks: Mutex<HashMap<GameState, StateCallback>>,
    exit_requested: AtomicBool,
    exit_code: AtomicI32,
    threads: Arc<ThreadManager>,
}

/// Cloneable, thread-safe view of a running [`Engine`].
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<Shared>,
}

impl EngineHandle {
    /// Current game state.
    #[inline]
    #[must_use]
    pub fn game_state(&self) -> GameState {
        self.shared.state.get()
    }

    /// Moves to `state` and runs its callback on the calling thread.
    ///
    /// Returns `false` without side effects if `state` is already current.
    /// Concurrent callers each win at most one transition, so every
    /// transition is logged and dispatched exactly once. Callbacks run after
    /// the state is published and may themselves change state.
    pub fn set_game_state(&self, state: GameState) -> bool {
        let mut previous = self.shared.state.get();
        loop {
            if previous == state {
                return false;
            }
            if self.shared.state.compare_and_swap(previous, state) {
                break;
            }
            previous = self.shared.state.get();
        }

        tracing::info!(from = ?previous, to = ?state, "Game state changed");

        let callback = self.shared.callbacks.lock().get(&state).cloned();
        if let Some(callback) = callback {
            callback();
        }
        true
    }

    /// Registers the callback for entering `state`, replacing any previous one.
    pub fn register_state_callback<F>(&self, state: GameState, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.callbacks.lock().insert(state, Arc::new(callback));
    }

    /// Asks the loop to exit after the current frame with `code`.
    pub fn request_exit(&self, code: i32) {
        tracing::info!(code, "Exit requested");
        self.shared.exit_code.store(code, Ordering::Release);
        self.shared.exit_requested.store(true, Ordering::Release);
    }

    /// Whether an exit has been requested.
    #[inline]
    #[must_use]
    pub fn is_exit_requested(&self) -> bool {
        self.shared.exit_requested.load(Ordering::Acquire)
    }

    /// Code passed to the last `request_exit`.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.shared.exit_code.load(Ordering::Acquire)
    }

    /// The engine's thread manager.
    #[must_use]
    pub fn threads(&self) -> &ThreadManager {
        &self.shared.threads
    }

    /// Shared ownership of the thread manager.
    #[must_use]
    pub fn thread_manager(&self) -> Arc<ThreadManager> {
        Arc::clone(&self.shared.threads)
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("state", &self.game_state())
            .field("exit_requested", &self.is_exit_requested())
            .finish_non_exhaustive()
    }
}

/// Frame timing owned by the loop thread.
#[derive(Debug)]
struct FrameTiming {
    last_frame: Instant,
    delta: Duration,
    fixed_step: Duration,
    accumulator: Duration,
    rate_window: Duration,
    rate_frames: u32,
    frame_rate: f64,
}

impl FrameTiming {
    fn new(now: Instant, fixed_step: Duration) -> Self {
        Self {
            last_frame: now,
            delta: Duration::ZERO,
            fixed_step,
            accumulator: Duration::ZERO,
            rate_window: Duration::ZERO,
            rate_frames: 0,
            frame_rate: 0.0,
        }
    }

    fn reset(&mut self, now: Instant) {
        *self = Self::new(now, self.fixed_step);
    }

    /// Advances to `now` and returns the clamped delta.
    fn begin_frame(&mut self, now: Instant, max_step: Duration) -> Duration {
        self.delta = now.saturating_duration_since(self.last_frame).min(max_step);
        self.last_frame = now;

        self.rate_window += self.delta;
        self.rate_frames += 1;
        if self.rate_window >= FRAME_RATE_WINDOW {
            self.frame_rate = f64::from(self.rate_frames) / self.rate_window.as_secs_f64();
            self.rate_window = Duration::ZERO;
            self.rate_frames = 0;
            tracing::debug!(fps = self.frame_rate, "Frame rate");
        }

        self.accumulator += self.delta;
        self.delta
    }

    /// Consumes one fixed step from the accumulator if available.
    fn take_fixed_step(&mut self) -> bool {
        if self.accumulator >= self.fixed_step {
            self.accumulator -= self.fixed_step;
            true
        } else {
            false
        }
    }
}

/// The application scheduler: game state, subsystems and the frame loop.
pub struct Engine {
    handle: EngineHandle,
    config: PitlaneConfig,
    clock: Arc<dyn Clock>,
    profiler: Arc<Profiler>,
    timing: FrameTiming,
    subsystems: Vec<Box<dyn Subsystem>>,
    started_subsystems: usize,
}

impl Engine {
    /// Creates an uninitialized engine on the system clock.
    #[must_use]
    pub fn new(config: PitlaneConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an uninitialized engine driven by `clock`.
    #[must_use]
    pub fn with_clock(config: PitlaneConfig, clock: Arc<dyn Clock>) -> Self {
        let profiler = Arc::new(Profiler::new(config.profiling.enabled));
        let threads = Arc::new(ThreadManager::with_profiler(Arc::clone(&profiler)));
        let timing = FrameTiming::new(clock.now(), config.timing.fixed_step().max(MIN_FIXED_STEP));

        Self {
            handle: EngineHandle {
                shared: Arc::new(Shared {
                    state: AtomicState::new(GameState::Uninitialized),
                    callbacks: Mutex::new(HashMap::new()),
                    exit_requested: AtomicBool::new(false),
                    exit_code: AtomicI32::new(0),
                    threads,
                }),
            },
            config,
            clock,
            profiler,
            timing,
            subsystems: Vec::new(),
            started_subsystems: 0,
        }
    }

    /// A handle for callbacks and other threads.
    #[must_use]
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Adds a subsystem. Subsystems are initialized in registration order
    /// and shut down in reverse.
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyInitialized`] once `initialize` has succeeded.
    pub fn add_subsystem<S>(&mut self, subsystem: S) -> EngineResult<()>
    where
        S: Subsystem + 'static,
    {
        let state = self.game_state();
        if state != GameState::Uninitialized {
            return Err(EngineError::AlreadyInitialized(state));
        }
        self.subsystems.push(Box::new(subsystem));
        Ok(())
    }

    /// Brings the engine up with the `[app]` settings from the configuration.
    ///
    /// # Errors
    ///
    /// Same as [`initialize`](Self::initialize).
    pub fn initialize_from_config(&mut self) -> EngineResult<()> {
        let AppConfig {
            name,
            width,
            height,
            fullscreen,
        } = self.config.app.clone();
        self.initialize(&name, width, height, fullscreen)
    }

    /// Starts the thread manager, the general pool and every subsystem,
    /// then moves to [`GameState::Loading`].
    ///
    /// On failure everything started so far is torn down and the engine
    /// stays Uninitialized.
    ///
    /// # Errors
    ///
    /// - [`EngineError::AlreadyInitialized`] unless Uninitialized
    /// - [`EngineError::Threads`] if the manager or pool cannot start
    /// - [`EngineError::Subsystem`] if a subsystem refuses to start
    pub fn initialize(
        &mut self,
        app_name: &str,
        width: u32,
        height: u32,
        fullscreen: bool,
    ) -> EngineResult<()> {
        let state = self.game_state();
        if state != GameState::Uninitialized {
            tracing::warn!(?state, "Engine already initialized");
            return Err(EngineError::AlreadyInitialized(state));
        }

        tracing::info!(app = %app_name, width, height, fullscreen, "Initializing engine");
        self.config.app = AppConfig {
            name: app_name.to_owned(),
            width,
            height,
            fullscreen,
        };
        self.timing.reset(self.clock.now());
        self.profiler.set_enabled(self.config.profiling.enabled);

        if let Err(err) = self.start_subsystems() {
            tracing::error!(error = %err, "Failed to initialize subsystems");
            self.stop_subsystems();
            return Err(err);
        }

        self.handle.set_game_state(GameState::Loading);
        tracing::info!("Engine initialized");
        Ok(())
    }

    fn start_subsystems(&mut self) -> EngineResult<()> {
        let threads = self.handle.threads();
        threads.initialize(self.config.threads.max_threads)?;
        threads.create_thread_pool(
            GENERAL_POOL,
            self.config.threads.general_pool_workers,
            ThreadPriority::Normal,
        )?;

        self.started_subsystems = 0;
        for subsystem in &mut self.subsystems {
            tracing::info!(subsystem = %subsystem.name(), "Initializing subsystem");
            subsystem.initialize(threads)?;
            self.started_subsystems += 1;
        }
        Ok(())
    }

    /// Shuts started subsystems down in reverse order, drops all of them,
    /// then stops the thread manager.
    fn stop_subsystems(&mut self) {
        let started = std::mem::take(&mut self.started_subsystems);
        while let Some(mut subsystem) = self.subsystems.pop() {
            if self.subsystems.len() < started {
                tracing::info!(subsystem = %subsystem.name(), "Shutting down subsystem");
                subsystem.shutdown();
            }
        }

        tracing::info!("Shutting down thread manager");
        self.handle.threads().shutdown();
    }

    /// Runs frames until an exit is requested, then shuts down.
    ///
    /// Returns the code passed to [`EngineHandle::request_exit`].
    ///
    /// # Errors
    ///
    /// [`EngineError::NotInitialized`] if called before `initialize`.
    pub fn run(&mut self) -> EngineResult<i32> {
        if self.game_state() == GameState::Uninitialized {
            tracing::error!("Cannot run an uninitialized engine");
            return Err(EngineError::NotInitialized);
        }

        tracing::info!("Starting main loop");
        self.timing.last_frame = self.clock.now();
        while !self.handle.is_exit_requested() {
            self.frame();
        }
        tracing::info!("Main loop exited");

        let code = self.handle.exit_code();
        self.shutdown();
        Ok(code)
    }

    /// Runs one frame.
    pub fn frame(&mut self) {
        let Self {
            handle,
            config,
            clock,
            profiler,
            timing,
            subsystems,
            ..
        } = self;
        let _frame = profiler.scope("Frame");

        let delta = timing.begin_frame(clock.now(), config.timing.max_step());
        let state = handle.game_state();

        if state != GameState::Exiting {
            let _scope = profiler.scope("ProcessInput");
            for subsystem in subsystems.iter_mut() {
                subsystem.process_input(state);
            }
        }

        {
            let _scope = profiler.scope("FixedUpdate");
            while timing.take_fixed_step() {
                let state = handle.game_state();
                for subsystem in subsystems.iter_mut() {
                    subsystem.fixed_update(timing.fixed_step, state);
                }
            }
        }

        {
            let _scope = profiler.scope("Update");
            let state = handle.game_state();
            for subsystem in subsystems.iter_mut() {
                subsystem.update(delta, state);
            }
        }

        let state = handle.game_state();
        if state != GameState::Exiting {
            let _scope = profiler.scope("Render");
            for subsystem in subsystems.iter_mut() {
                subsystem.render(state);
            }
        }

        if delta < config.timing.min_frame() {
            clock.sleep(FRAME_YIELD);
        }
    }

    /// Tears everything down and returns to Uninitialized. Does nothing if
    /// already Uninitialized.
    pub fn shutdown(&mut self) {
        if self.game_state() == GameState::Uninitialized {
            return;
        }

        tracing::info!("Shutting down engine");
        self.handle.set_game_state(GameState::Exiting);
        self.stop_subsystems();

        let shared = &self.handle.shared;
        shared.state.set(GameState::Uninitialized);
        shared.exit_requested.store(false, Ordering::Release);
        shared.exit_code.store(0, Ordering::Release);

        if let Some(path) = &self.config.profiling.report_path {
            match self.profiler.save_report(path, ReportOrder::TotalTime) {
                Ok(true) => tracing::info!(path = %path.display(), "Saved profiling report"),
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Failed to save profiling report");
                }
            }
        }

        tracing::info!("Engine shut down");
    }

    /// Current game state.
    #[inline]
    #[must_use]
    pub fn game_state(&self) -> GameState {
        self.handle.game_state()
    }

    /// See [`EngineHandle::set_game_state`].
    pub fn set_game_state(&self, state: GameState) -> bool {
        self.handle.set_game_state(state)
    }

    /// See [`EngineHandle::register_state_callback`].
    pub fn register_state_callback<F>(&self, state: GameState, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.handle.register_state_callback(state, callback);
    }

    /// See [`EngineHandle::request_exit`].
    pub fn request_exit(&self, code: i32) {
        self.handle.request_exit(code);
    }

    /// The engine's thread manager.
    #[must_use]
    pub fn threads(&self) -> &ThreadManager {
        self.handle.threads()
    }

    /// The engine's profiler.
    #[must_use]
    pub fn profiler(&self) -> &Arc<Profiler> {
        &self.profiler
    }

    /// Clamped delta of the last frame.
    #[inline]
    #[must_use]
    pub fn delta_time(&self) -> Duration {
        self.timing.delta
    }

    /// Current fixed step.
    #[inline]
    #[must_use]
    pub fn fixed_time_step(&self) -> Duration {
        self.timing.fixed_step
    }

    /// Changes the fixed step, floored at 1ms.
    pub fn set_fixed_time_step(&mut self, step: Duration) {
        self.timing.fixed_step = step.max(MIN_FIXED_STEP);
    }

    /// Frames per second over the last completed one-second window.
    #[must_use]
    pub fn frame_rate(&self) -> f64 {
        self.timing.frame_rate
    }

    /// Application name.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.config.app.name
    }

    /// Window size as (width, height).
    #[must_use]
    pub fn window_size(&self) -> (u32, u32) {
        (self.config.app.width, self.config.app.height)
    }

    /// Records a new window size.
    pub fn resize_window(&mut self, width: u32, height: u32) {
        if self.window_size() == (width, height) {
            return;
        }
        self.config.app.width = width;
        self.config.app.height = height;
        tracing::info!(width, height, "Window resized");
    }

    /// Whether the window is fullscreen.
    #[must_use]
    pub fn is_fullscreen(&self) -> bool {
        self.config.app.fullscreen
    }

    /// Records a fullscreen toggle.
    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        if self.config.app.fullscreen == fullscreen {
            return;
        }
        self.config.app.fullscreen = fullscreen;
        if fullscreen {
            tracing::info!("Switched to fullscreen mode");
        } else {
            tracing::info!("Switched to windowed mode");
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(PitlaneConfig::default())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
        // Callbacks often capture a handle to this engine
        self.handle.shared.callbacks.lock().clear();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.game_state())
            .field("app", &self.config.app)
            .field("subsystems", &self.subsystems.len())
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}
