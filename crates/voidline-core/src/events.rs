//! Events emitted by the simulation during a tick.

use serde::{Deserialize, Serialize};

use crate::types::Uid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SimEvent {
    /// An intent was realised as a new ship.
    ShipSpawned {
        uid: Uid,
        system_id: u32,
        role: String,
    },
    /// The executor was not ready; the intent went back to the queue.
    SpawnDeferred {
        system_id: u32,
        role: String,
        attempts: u32,
    },
    /// Retry budget exhausted; the intent was abandoned.
    SpawnDropped {
        system_id: u32,
        role: String,
        attempts: u32,
    },
    /// A ship picked a new pursuit target.
    TargetAcquired { source: Uid, target: Uid, distance: f32 },
    /// Hull reached zero.
    ShipDisabled { uid: Uid },
    /// Entity removed from the world.
    ShipDespawned { uid: Uid },
}
