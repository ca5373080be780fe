//! World-state records handed to queries and the per-tick report
//! handed back to the driver.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::enums::{Faction, GamePhase};
use crate::events::SimEvent;
use crate::types::{SimTime, Uid};

/// Read-only copy of one ship's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipRecord {
    pub uid: Uid,
    pub system_id: u32,
    pub role: String,
    pub faction: Faction,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub health: f32,
    pub speed: f32,
    pub active: bool,
}

/// All ships currently inside one star system, in slot order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StarSystemState {
    pub system_id: u32,
    pub ships: Vec<ShipRecord>,
}

/// Snapshot of every star system at a tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub tick: u64,
    pub systems: Vec<StarSystemState>,
}

impl WorldState {
    pub fn system(&self, system_id: u32) -> Option<&StarSystemState> {
        self.systems.iter().find(|s| s.system_id == system_id)
    }

    pub fn ship_count(&self) -> usize {
        self.systems.iter().map(|s| s.ships.len()).sum()
    }
}

/// What a targeting query hands back about the chosen target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    pub uid: Uid,
    pub faction: Faction,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub health: f32,
    /// Straight-line distance from the source at query time.
    pub distance: f32,
}

impl TargetSnapshot {
    pub fn from_record(record: &ShipRecord, distance: f32) -> Self {
        Self {
            uid: record.uid,
            faction: record.faction,
            position: record.position,
            rotation: record.rotation,
            velocity: record.velocity,
            health: record.health,
            distance,
        }
    }
}

/// Summary returned by every engine tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickReport {
    pub time: SimTime,
    pub phase: GamePhase,
    pub ship_count: usize,
    pub spawn_queue_len: usize,
    /// Entities present in the trace published this tick.
    pub traced_entities: usize,
    pub events: Vec<SimEvent>,
}
