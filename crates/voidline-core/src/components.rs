//! ECS components for hecs entities.
//!
//! Components are plain data structs with no methods.
//! Game logic lives in systems, not components.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::enums::Faction;
use crate::types::Uid;

/// Identity and allegiance of a ship entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ship {
    pub uid: Uid,
    pub system_id: u32,
    pub role: String,
    pub faction: Faction,
}

/// Simulation-owned pose. Presentation never writes it; it reads the
/// published trace instead.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

/// Linear motion state.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Motion {
    pub velocity: Vec3,
    /// Desired speed (units/s).
    pub speed: f32,
    /// Desired heading set by AI, integrated toward by movement.
    pub heading_goal: Quat,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Hull {
    pub health: f32,
    pub max_health: f32,
}

/// Cleared when a ship is disabled; cleanup despawns inactive ships.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Active(pub bool);

/// Current AI pursuit target, if any.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Pursuit {
    pub target: Option<Uid>,
}
