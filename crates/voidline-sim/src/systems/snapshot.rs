//! Snapshot system: builds the [`WorldState`] read by targeting and the
//! spawn census.
//!
//! This system is read-only. It never modifies the world.

use std::collections::BTreeMap;

use hecs::World;

use voidline_core::components::*;
use voidline_core::state::{ShipRecord, StarSystemState, WorldState};

/// Group every ship by system. Ships within a system are ordered by uid,
/// which fixes slot indices for a given world.
pub fn build_world_state(world: &World, tick: u64) -> WorldState {
    let mut systems: BTreeMap<u32, Vec<ShipRecord>> = BTreeMap::new();

    for (_, (ship, pose, motion, hull, active)) in world
        .query::<(&Ship, &Pose, &Motion, &Hull, &Active)>()
        .iter()
    {
        systems.entry(ship.system_id).or_default().push(ShipRecord {
            uid: ship.uid,
            system_id: ship.system_id,
            role: ship.role.clone(),
            faction: ship.faction,
            position: pose.position,
            rotation: pose.rotation,
            velocity: motion.velocity,
            health: hull.health,
            speed: motion.velocity.length(),
            active: active.0,
        });
    }

    WorldState {
        tick,
        systems: systems
            .into_iter()
            .map(|(system_id, mut ships)| {
                ships.sort_by_key(|s| s.uid);
                StarSystemState { system_id, ships }
            })
            .collect(),
    }
}
