//! Cleanup system: removes disabled ships.

use hecs::{Entity, World};
use tracing::debug;

use voidline_core::components::{Active, Ship};
use voidline_core::events::SimEvent;

/// Despawn every inactive ship.
/// Uses a pre-allocated buffer to avoid per-tick allocation.
pub fn run(world: &mut World, despawn_buffer: &mut Vec<Entity>, events: &mut Vec<SimEvent>) {
    despawn_buffer.clear();

    for (entity, (ship, active)) in world.query_mut::<(&Ship, &Active)>() {
        if !active.0 {
            despawn_buffer.push(entity);
            events.push(SimEvent::ShipDespawned { uid: ship.uid });
            debug!(uid = %ship.uid, "ship_despawned");
        }
    }

    for entity in despawn_buffer.drain(..) {
        let _ = world.despawn(entity);
    }
}
