//! Simulation engine for VOIDLINE.
//!
//! Owns the hecs ECS world, runs systems at a fixed tick rate, dispatches
//! edge-triggered input, feeds the spawn pipeline and publishes a substep
//! trace of every tick for presentation.

pub mod engine;
pub mod input;
pub mod spawn;
pub mod systems;
pub mod targeting;
pub mod trace;
pub mod world_setup;

pub use engine::{CommandSink, SimError, SimulationEngine};
pub use input::{InputDispatcher, KeyHandler, KeyStateSource, KeyboardState};
pub use spawn::{
    PopulationCensus, RequeueOutcome, SpawnContext, SpawnExecutor, SpawnPlanner, SpawnTicket, Spawner,
};
pub use targeting::{try_acquire_nearest_target, TargetAcquisition, TargetQueryParams};
pub use trace::{PublishedTraces, TraceBuffer, TraceError};
pub use voidline_core as core;

#[cfg(test)]
mod tests;
