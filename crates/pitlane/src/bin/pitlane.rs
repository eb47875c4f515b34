//! # PITLANE Demo Session
//!
//! Brings the engine up, walks one scripted race session from a director
//! thread and exits with the engine's exit code.
//!
//! ## Usage
//!
//! ```bash
//! pitlane [CONFIG.toml]
//! ```

use std::num::NonZeroUsize;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use pitlane::engine::{Engine, EngineHandle, GameState, Subsystem, GENERAL_POOL};
use pitlane::{PitlaneConfig, SubsystemError, ThreadKind, ThreadManager, ThreadPriority};
use pitlane_core::DoubleBuffer;

/// Pause between scripted director steps.
const DIRECTOR_STEP: Duration = Duration::from_millis(600);

const CAR_COUNT: usize = 8;

/// Integrates car progress while Racing and publishes it each fixed step.
struct RaceSimulation {
    positions: Arc<DoubleBuffer<Vec<f32>>>,
    speeds: Vec<f32>,
}

impl Subsystem for RaceSimulation {
    fn name(&self) -> &str {
        "RaceSimulation"
    }

    fn initialize(&mut self, threads: &ThreadManager) -> Result<(), SubsystemError> {
        if !threads.pool_exists(GENERAL_POOL) {
            return Err(SubsystemError::new(self.name(), "general pool is missing"));
        }
        Ok(())
    }

    fn fixed_update(&mut self, step: Duration, state: GameState) {
        if state != GameState::Racing {
            return;
        }
        let dt = step.as_secs_f32();
        let speeds = &self.speeds;
        self.positions.modify_back(|back| {
            for (position, speed) in back.iter_mut().zip(speeds) {
                *position += speed * dt;
            }
        });
        self.positions.swap();
        // Carry the new front into the next back slot
        let front = self.positions.with_front(Clone::clone);
        self.positions.modify_back(|back| *back = front);
    }
}

/// Reads published positions and hands leaderboard sorting to the pool.
struct Leaderboard {
    positions: Arc<DoubleBuffer<Vec<f32>>>,
    engine: EngineHandle,
    frames: u64,
}

impl Subsystem for Leaderboard {
    fn name(&self) -> &str {
        "Leaderboard"
    }

    fn render(&mut self, state: GameState) {
        self.frames += 1;
        if state != GameState::Racing || self.frames % 120 != 0 {
            return;
        }
        let snapshot = self.positions.with_front(Clone::clone);
        let submitted = self.engine.threads().submit_task(GENERAL_POOL, move || {
            let mut order: Vec<usize> = (0..snapshot.len()).collect();
            order.sort_by(|&a, &b| snapshot[b].total_cmp(&snapshot[a]));
            tracing::info!(leader = order[0], distance = snapshot[order[0]], "Leaderboard");
        });
        if let Err(err) = submitted {
            tracing::warn!(error = %err, "Leaderboard task dropped");
        }
    }
}

fn register_callbacks(engine: &Engine) {
    let handle = engine.handle();
    engine.register_state_callback(GameState::Loading, move || {
        tracing::info!("Loading game resources...");
        std::thread::sleep(DIRECTOR_STEP);
        handle.set_game_state(GameState::MainMenu);
    });
    engine.register_state_callback(GameState::MainMenu, || tracing::info!("Entered main menu"));
    engine.register_state_callback(GameState::RaceSetup, || tracing::info!("Setting up race"));
    engine.register_state_callback(GameState::Racing, || tracing::info!("Race started"));
    engine.register_state_callback(GameState::Paused, || tracing::info!("Game paused"));
    engine.register_state_callback(GameState::RaceFinished, || tracing::info!("Race finished"));
    engine.register_state_callback(GameState::Exiting, || tracing::info!("Exiting game"));
}

/// Scripted session: what a player clicking through the menus would do.
fn race_director(engine: &EngineHandle) {
    if engine.game_state() != GameState::MainMenu {
        tracing::warn!(state = ?engine.game_state(), "Director expected the main menu");
        engine.request_exit(1);
        return;
    }

    let script = [
        (GameState::RaceSetup, 2),
        (GameState::Racing, 5),
        (GameState::Paused, 2),
        (GameState::Racing, 5),
        (GameState::RaceFinished, 3),
        (GameState::MainMenu, 2),
    ];
    for (state, steps) in script {
        engine.set_game_state(state);
        std::thread::sleep(DIRECTOR_STEP * steps);
    }
    engine.request_exit(0);
}

fn main() -> ExitCode {
    let mut config_path = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                println!("Usage: pitlane [CONFIG.toml]");
                println!();
                println!("Runs one scripted race session. Without a config file the");
                println!("built-in defaults are used.");
                return ExitCode::SUCCESS;
            }
            _ => config_path = Some(arg),
        }
    }

    let mut config = match config_path {
        Some(path) => match PitlaneConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("pitlane: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => PitlaneConfig::default(),
    };

    if config.threads.max_threads == 0 {
        // Leave room for the director next to the general pool
        let cores = std::thread::available_parallelism().map_or(2, NonZeroUsize::get);
        config.threads.max_threads = cores.max(config.threads.general_pool_workers + 1);
    }

    if let Err(err) = pitlane::logging::init(&config.logging) {
        eprintln!("pitlane: {err}");
        return ExitCode::FAILURE;
    }
    tracing::info!("Car Racing Simulation starting up");

    let positions = Arc::new(DoubleBuffer::new(vec![0.0_f32; CAR_COUNT]));
    let mut engine = Engine::new(config);
    register_callbacks(&engine);

    #[allow(clippy::cast_precision_loss)]
    let speeds = (0..CAR_COUNT).map(|i| 60.0 + i as f32 * 1.5).collect();
    let subsystems = engine
        .add_subsystem(RaceSimulation {
            positions: Arc::clone(&positions),
            speeds,
        })
        .and_then(|()| {
            engine.add_subsystem(Leaderboard {
                positions,
                engine: engine.handle(),
                frames: 0,
            })
        });
    if let Err(err) = subsystems.and_then(|()| engine.initialize_from_config()) {
        tracing::error!(error = %err, "Failed to initialize engine");
        return ExitCode::FAILURE;
    }

    let director = engine.handle();
    if let Err(err) = engine.threads().create_thread(
        "RaceDirector",
        ThreadKind::Transient,
        ThreadPriority::Normal,
        move || race_director(&director),
    ) {
        tracing::error!(error = %err, "Failed to start race director");
        return ExitCode::FAILURE;
    }

    match engine.run() {
        Ok(code) => {
            tracing::info!(code, "Car Racing Simulation shutting down");
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
        Err(err) => {
            tracing::error!(error = %err, "Engine loop failed");
            ExitCode::FAILURE
        }
    }
}
