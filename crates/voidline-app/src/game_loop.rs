//! Game loop thread: runs the simulation engine at a fixed step.
//!
//! The engine is created inside this thread; it holds `Rc` handles shared
//! with its input handlers and never crosses threads. Commands arrive via
//! `mpsc`. After every tick the freshly published trace is handed to the
//! shared [`TraceHandle`].

use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use voidline_core::config::SimConfig;
use voidline_core::enums::GamePhase;
use voidline_core::events::SimEvent;
use voidline_core::state::TickReport;
use voidline_sim::SimulationEngine;

use crate::bootstrap;
use crate::script::{KeyScript, ScriptedKeys};
use crate::state::{GameLoopCommand, TraceHandle};
use crate::AppError;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Stop after this many frames; `None` runs until quit or shutdown.
    pub max_frames: Option<u64>,
    /// Pace ticks against the wall clock.
    pub throttle: bool,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_frames: None,
            throttle: true,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
        }
    }
}

/// What a finished run looked like.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoopSummary {
    pub frames: u64,
    pub final_tick: u64,
    pub final_phase: GamePhase,
    pub ships_alive: usize,
    pub ships_spawned: u64,
    pub spawns_deferred: u64,
    pub spawns_dropped: u64,
    pub ships_disabled: u64,
    pub quit_requested: bool,
}

impl LoopSummary {
    fn record(&mut self, report: &TickReport) {
        self.frames += 1;
        self.final_tick = report.time.tick;
        self.final_phase = report.phase;
        self.ships_alive = report.ship_count;
        for event in &report.events {
            match event {
                SimEvent::ShipSpawned { .. } => self.ships_spawned += 1,
                SimEvent::SpawnDeferred { .. } => self.spawns_deferred += 1,
                SimEvent::SpawnDropped { .. } => self.spawns_dropped += 1,
                SimEvent::ShipDisabled { .. } => self.ships_disabled += 1,
                SimEvent::TargetAcquired { .. } | SimEvent::ShipDespawned { .. } => {}
            }
        }
    }
}

/// A running game loop thread.
pub struct GameLoop {
    commands: mpsc::Sender<GameLoopCommand>,
    handle: JoinHandle<Result<LoopSummary, AppError>>,
}

impl GameLoop {
    pub fn sender(&self) -> mpsc::Sender<GameLoopCommand> {
        self.commands.clone()
    }

    /// Ask the loop to stop at the next frame boundary.
    pub fn shutdown(&self) {
        let _ = self.commands.send(GameLoopCommand::Shutdown);
    }

    /// Wait for the loop to finish on its own.
    pub fn join(self) -> Result<LoopSummary, AppError> {
        let Self { commands, handle } = self;
        let result = handle.join().map_err(|_| AppError::LoopPanicked);
        drop(commands);
        result?
    }
}

/// Spawns the game loop in a new thread.
pub fn spawn_game_loop(
    config: SimConfig,
    loop_config: LoopConfig,
    script: KeyScript,
    traces: TraceHandle,
) -> Result<GameLoop, AppError> {
    let (cmd_tx, cmd_rx) = mpsc::channel::<GameLoopCommand>();

    let handle = std::thread::Builder::new()
        .name("voidline-game-loop".into())
        .spawn(move || run_game_loop(config, &loop_config, script, &cmd_rx, &traces))
        .map_err(AppError::ThreadSpawn)?;

    Ok(GameLoop {
        commands: cmd_tx,
        handle,
    })
}

/// The game loop. Runs until quit, the frame limit, a Shutdown command or
/// channel disconnect.
fn run_game_loop(
    config: SimConfig,
    loop_config: &LoopConfig,
    script: KeyScript,
    cmd_rx: &mpsc::Receiver<GameLoopCommand>,
    traces: &TraceHandle,
) -> Result<LoopSummary, AppError> {
    if let Some(last_frame) = script.last_frame_beyond(loop_config.max_frames) {
        warn!(last_frame, max_frames = ?loop_config.max_frames, "key_script_past_frame_limit");
    }

    let fixed_dt = Duration::from_secs_f64(config.dt());
    let mut engine = SimulationEngine::new(config)?;
    let bindings = bootstrap::install_key_bindings(&engine);
    let mut keys = ScriptedKeys::new(script);
    let mut summary = LoopSummary::default();

    let mut accumulator = Duration::ZERO;
    let mut last_frame = Instant::now();

    info!(throttle = loop_config.throttle, max_frames = ?loop_config.max_frames, "game_loop_started");

    let outcome: Result<(), AppError> = 'frames: loop {
        // 1. Drain all pending commands
        loop {
            match cmd_rx.try_recv() {
                Ok(GameLoopCommand::Sim(command)) => engine.queue_command(command),
                Ok(GameLoopCommand::Shutdown) => break 'frames Ok(()),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => break 'frames Ok(()),
            }
        }

        // 2. Decide how many ticks this frame owes
        let ticks_to_run = if loop_config.throttle {
            let now = Instant::now();
            let frame_dt = clamp_frame_delta(now - last_frame, loop_config.max_frame_delta);
            last_frame = now;

            let time_scale = engine.time_scale();
            let scaled = if time_scale > 0.001 {
                frame_dt.mul_f64(time_scale)
            } else {
                frame_dt
            };
            let plan = plan_sim_steps(accumulator + scaled, fixed_dt, loop_config.max_ticks_per_frame);
            accumulator = plan.remaining_accumulator;
            if !plan.dropped_backlog.is_zero() {
                warn!(
                    dropped_ms = plan.dropped_backlog.as_secs_f64() * 1000.0,
                    "sim_backlog_dropped"
                );
            }
            plan.ticks_to_run
        } else {
            1
        };

        // 3. Advance the engine
        for _ in 0..ticks_to_run {
            keys.begin_frame(summary.frames);
            let report = match engine.tick(&keys) {
                Ok(report) => report,
                Err(err) => break 'frames Err(err.into()),
            };
            summary.record(&report);
            traces.publish(engine.published_traces());

            if bindings.quit_requested() {
                summary.quit_requested = true;
                break 'frames Ok(());
            }
            if loop_config.max_frames.is_some_and(|max| summary.frames >= max) {
                break 'frames Ok(());
            }
        }

        // 4. Sleep off the rest of the step
        if loop_config.throttle && ticks_to_run == 0 {
            std::thread::sleep(fixed_dt.saturating_sub(accumulator));
        }
    };

    engine.shutdown();
    info!(
        frames = summary.frames,
        final_tick = summary.final_tick,
        ships_spawned = summary.ships_spawned,
        "game_loop_stopped"
    );
    outcome.map(|()| summary)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

/// Whole ticks owed by `accumulator`, capped per frame. A backlog still
/// worth a full tick after the cap is dropped rather than carried.
fn plan_sim_steps(accumulator: Duration, fixed_dt: Duration, max_ticks_per_frame: u32) -> StepPlan {
    let owed = accumulator.as_nanos() / fixed_dt.as_nanos().max(1);
    let ticks_to_run = owed.min(u128::from(max_ticks_per_frame)) as u32;
    let leftover = accumulator.saturating_sub(fixed_dt * ticks_to_run);

    if leftover >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: leftover,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: leftover,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}
