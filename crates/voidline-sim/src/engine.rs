//! Simulation engine: the core of the game.
//!
//! `SimulationEngine` is the explicitly constructed context that owns every
//! simulation service: the hecs world, the identity service, the input
//! dispatcher, the spawn pipeline and the trace buffer. Nothing is global;
//! every engine (and every test) starts from fresh state, and `shutdown`
//! tears it all down again. Completely headless, enabling deterministic
//! testing.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use hecs::World;
use thiserror::Error;
use tracing::{debug, info};

use voidline_core::commands::SimCommand;
use voidline_core::components::Ship;
use voidline_core::config::{ConfigError, SimConfig};
use voidline_core::enums::GamePhase;
use voidline_core::events::SimEvent;
use voidline_core::state::{TickReport, WorldState};
use voidline_core::{IdentityService, SimTime};

use crate::input::{InputDispatcher, KeyStateSource};
use crate::spawn::{PopulationCensus, RequeueOutcome, SpawnContext, SpawnExecutor, SpawnPlanner, Spawner};
use crate::systems;
use crate::trace::{PublishedTraces, TraceBuffer, TraceError};

#[derive(Debug, Error)]
pub enum SimError {
    #[error("trace invariant violated: {0}")]
    Trace(#[from] TraceError),
}

/// Shared handle for queuing commands, usable from input handlers.
#[derive(Debug, Clone, Default)]
pub struct CommandSink(Rc<RefCell<VecDeque<SimCommand>>>);

impl CommandSink {
    pub fn push(&self, command: SimCommand) {
        self.0.borrow_mut().push_back(command);
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    fn drain(&self) -> Vec<SimCommand> {
        self.0.borrow_mut().drain(..).collect()
    }

    fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// The simulation engine. Owns the ECS world and all sim state.
pub struct SimulationEngine {
    config: SimConfig,
    world: World,
    time: SimTime,
    phase: GamePhase,
    time_scale: f64,
    identity: IdentityService,
    input: Rc<InputDispatcher>,
    commands: CommandSink,
    planner: SpawnPlanner,
    executor: Box<dyn SpawnExecutor>,
    trace: TraceBuffer,
    world_state: WorldState,
    despawn_buffer: Vec<hecs::Entity>,
    events: Vec<SimEvent>,
}

impl SimulationEngine {
    /// Create an engine with the default [`Spawner`] executor.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        let spawner = Spawner::new(config.systems.clone(), config.seed);
        Self::with_executor(config, Box::new(spawner))
    }

    /// Create an engine with a custom spawn executor.
    pub fn with_executor(
        config: SimConfig,
        executor: Box<dyn SpawnExecutor>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let planner = SpawnPlanner::new(&config.systems, &config.spawn);
        info!(
            seed = config.seed,
            tick_rate = config.tick_rate,
            substeps = config.substeps,
            systems = config.systems.len(),
            "engine_initialized"
        );
        Ok(Self {
            time_scale: config.time_scale,
            config,
            world: World::new(),
            time: SimTime::default(),
            phase: GamePhase::default(),
            identity: IdentityService::new(),
            input: Rc::new(InputDispatcher::new()),
            commands: CommandSink::default(),
            planner,
            executor,
            trace: TraceBuffer::new(),
            world_state: WorldState::default(),
            despawn_buffer: Vec::new(),
            events: Vec::new(),
        })
    }

    /// Queue a command for processing at the next tick boundary.
    pub fn queue_command(&self, command: SimCommand) {
        self.commands.push(command);
    }

    /// Queue multiple commands.
    pub fn queue_commands(&self, commands: impl IntoIterator<Item = SimCommand>) {
        for command in commands {
            self.commands.push(command);
        }
    }

    /// Advance one tick: input, commands, spawn planning and execution, AI,
    /// substep integration, trace publish, cleanup.
    pub fn tick(&mut self, keys: &dyn KeyStateSource) -> Result<TickReport, SimError> {
        let stats = self.input.update(keys);
        if stats.invoked > 0 || stats.faults > 0 {
            debug!(invoked = stats.invoked, faults = stats.faults, "input_dispatched");
        }

        self.process_commands();

        if self.phase == GamePhase::Active {
            self.run_systems()?;
            self.time.advance(self.config.dt());
        }

        Ok(self.build_report())
    }

    /// Tear down all state. The engine stays usable: a `Reset` command
    /// brings it back to tick 0.
    pub fn shutdown(&mut self) {
        self.clear_state();
        self.input.clear();
        self.phase = GamePhase::Stopped;
        info!("engine_shutdown");
    }

    /// Get the current game phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Get the current simulation time.
    pub fn time(&self) -> SimTime {
        self.time
    }

    /// Get the current time scale.
    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Get a read-only reference to the ECS world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// World state as seen by this tick's AI.
    pub fn world_state(&self) -> &WorldState {
        &self.world_state
    }

    /// The input dispatcher. Handlers may keep a clone or a `Weak`.
    pub fn input(&self) -> &Rc<InputDispatcher> {
        &self.input
    }

    /// Command queue handle for input handlers and other collaborators.
    pub fn command_sink(&self) -> CommandSink {
        self.commands.clone()
    }

    pub fn planner(&self) -> &SpawnPlanner {
        &self.planner
    }

    pub fn identity(&self) -> &IdentityService {
        &self.identity
    }

    pub fn trace(&self) -> &TraceBuffer {
        &self.trace
    }

    /// The last published trace.
    pub fn published_traces(&self) -> Arc<PublishedTraces> {
        self.trace.published_handle()
    }

    fn process_commands(&mut self) {
        for command in self.commands.drain() {
            self.handle_command(command);
        }
    }

    fn handle_command(&mut self, command: SimCommand) {
        match command {
            SimCommand::Pause => {
                if self.phase == GamePhase::Active {
                    self.phase = GamePhase::Paused;
                    info!(tick = self.time.tick, "engine_paused");
                }
            }
            SimCommand::Resume => {
                if self.phase == GamePhase::Paused {
                    self.phase = GamePhase::Active;
                    info!(tick = self.time.tick, "engine_resumed");
                }
            }
            SimCommand::SetTimeScale { scale } => {
                self.time_scale = scale.clamp(0.0, 4.0);
            }
            SimCommand::Reset => {
                self.clear_state();
                self.phase = GamePhase::Active;
                info!("engine_reset");
            }
        }
    }

    fn clear_state(&mut self) {
        self.world.clear();
        self.time = SimTime::default();
        self.time_scale = self.config.time_scale;
        self.identity.reset();
        self.commands.clear();
        self.planner.clear();
        self.trace.clear();
        self.world_state = WorldState::default();
        self.despawn_buffer.clear();
        self.events.clear();
    }

    /// Run all systems in order.
    fn run_systems(&mut self) -> Result<(), SimError> {
        let tick = self.time.tick;
        let dt = self.config.dt();

        // 1. Spawn planning from the current population
        let census =
            PopulationCensus::from_world_state(&systems::snapshot::build_world_state(&self.world, tick));
        self.planner.tick(tick, dt, &census);
        // 2. Spawn execution
        self.execute_spawns();
        // 3. World-state snapshot for AI
        self.world_state = systems::snapshot::build_world_state(&self.world, tick);
        // 4. AI: targeting, steering, weapons
        systems::ai::run(
            &mut self.world,
            &self.world_state,
            &self.config.systems,
            &self.config.targeting,
            dt as f32,
            &mut self.events,
        );
        // 5. Substep integration into the trace buffer
        self.trace.begin_tick();
        systems::movement::run(&mut self.world, &mut self.trace, dt as f32, self.config.substeps)?;
        // 6. Publish the completed tick
        self.trace.publish()?;
        // 7. Cleanup (disabled ships)
        systems::cleanup::run(&mut self.world, &mut self.despawn_buffer, &mut self.events);
        Ok(())
    }

    /// Dequeue → attempt → requeue on failure, bounded per tick. Each
    /// queued intent is attempted at most once per tick.
    fn execute_spawns(&mut self) {
        let budget = (self.config.spawn.max_spawns_per_tick as usize).min(self.planner.queue_len());

        for _ in 0..budget {
            let Some(ticket) = self.planner.try_dequeue_next_intent() else {
                break;
            };

            let mut ctx = SpawnContext {
                world: &mut self.world,
                identity: &mut self.identity,
                events: &mut self.events,
            };
            if self.executor.try_execute(ticket.intent(), &mut ctx) {
                continue;
            }

            let (system_id, role) = (ticket.intent().system_id, ticket.intent().role.clone());
            match self.planner.requeue(ticket) {
                RequeueOutcome::Requeued { attempts } => {
                    debug!(system_id, role = role.as_str(), attempts, "spawn_deferred");
                    self.events.push(SimEvent::SpawnDeferred {
                        system_id,
                        role,
                        attempts,
                    });
                }
                RequeueOutcome::Dropped { attempts } => {
                    self.events.push(SimEvent::SpawnDropped {
                        system_id,
                        role,
                        attempts,
                    });
                }
            }
        }
    }

    fn build_report(&mut self) -> TickReport {
        TickReport {
            time: self.time,
            phase: self.phase,
            ship_count: self.world.query::<&Ship>().iter().count(),
            spawn_queue_len: self.planner.queue_len(),
            traced_entities: self.trace.published().len(),
            events: std::mem::take(&mut self.events),
        }
    }

    /// Spawn a ship directly, bypassing the planner (for tests).
    #[cfg(test)]
    pub(crate) fn spawn_test_ship(
        &mut self,
        system_id: u32,
        role: &str,
        faction: voidline_core::enums::Faction,
        position: glam::Vec3,
    ) -> voidline_core::Uid {
        use voidline_core::enums::EntityType;

        let uid = self.identity.create(EntityType::Ship);
        let system = self
            .config
            .systems
            .iter()
            .find(|s| s.id == system_id)
            .expect("test system exists");
        crate::world_setup::spawn_ship_at(
            &mut self.world,
            crate::world_setup::ShipSpec {
                uid,
                system,
                role,
                faction,
            },
            position,
            glam::Quat::IDENTITY,
        );
        uid
    }
}
