//! Spawn pipeline: planner, queue and executor.
//!
//! The planner turns standing role quotas into [`SpawnIntent`]s on its own
//! cadence and queues them. Each tick the engine drains a bounded number of
//! tickets: dequeue, attempt, and on "not ready" hand the ticket back via
//! [`SpawnPlanner::requeue`], where the configured retry policy decides
//! whether it goes to the tail, the head, or is dropped.
//!
//! [`SpawnIntent`]: voidline_core::SpawnIntent

mod executor;
mod planner;

pub use executor::{SpawnContext, SpawnExecutor, Spawner};
pub use planner::{PopulationCensus, RequeueOutcome, SpawnPlanner, SpawnTicket};
