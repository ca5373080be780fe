//! Fundamental identity, intent and motion types.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::enums::EntityType;

/// Stable identity of a simulated entity.
///
/// Ids are unique per [`EntityType`], start at 1 and are never reused.
/// Only [`IdentityService`](crate::IdentityService) mints new values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uid {
    entity_type: EntityType,
    id: u64,
}

impl Uid {
    pub(crate) fn new(entity_type: EntityType, id: u64) -> Self {
        Self { entity_type, id }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}#{}", self.entity_type, self.id)
    }
}

/// One unit of spawn demand: "put a ship with this role into this system".
///
/// Data only. Created by the planner, consumed by an executor, and handed
/// back unchanged when execution is not ready.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpawnIntent {
    pub system_id: u32,
    pub role: String,
}

impl SpawnIntent {
    pub fn new(system_id: u32, role: impl Into<String>) -> Self {
        Self {
            system_id,
            role: role.into(),
        }
    }
}

/// One interpolation keyframe inside a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubstepSample {
    /// Position within the tick, 0.0 = tick start, 1.0 = tick end.
    pub time_fraction: f32,
    pub position: Vec3,
    pub rotation: Quat,
}

impl SubstepSample {
    pub fn new(time_fraction: f32, position: Vec3, rotation: Quat) -> Self {
        Self {
            time_fraction,
            position,
            rotation,
        }
    }
}

/// Simulation time tracking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimTime {
    /// Current tick number (increments by 1 each tick).
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub elapsed_secs: f64,
}

impl SimTime {
    /// Advance by one tick of `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        self.tick += 1;
        self.elapsed_secs += dt;
    }
}
