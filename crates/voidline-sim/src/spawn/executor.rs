//! Spawn execution: turning an intent into a ship entity.

use hecs::World;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use voidline_core::config::StarSystemConfig;
use voidline_core::enums::EntityType;
use voidline_core::events::SimEvent;
use voidline_core::{IdentityService, SpawnIntent};

use crate::world_setup::{self, ShipSpec};

/// Collaborators an executor may use while realising an intent.
pub struct SpawnContext<'a> {
    pub world: &'a mut World,
    pub identity: &'a mut IdentityService,
    pub events: &'a mut Vec<SimEvent>,
}

pub trait SpawnExecutor {
    /// Try to realise `intent`. `false` means "not ready" and is an ordinary
    /// outcome; the caller decides whether to requeue.
    fn try_execute(&mut self, intent: &SpawnIntent, ctx: &mut SpawnContext<'_>) -> bool;
}

/// Default executor: spawns ships into their star system while the
/// system's ship pool has room.
#[derive(Debug, Clone)]
pub struct Spawner {
    systems: Vec<StarSystemConfig>,
    rng: ChaCha8Rng,
}

impl Spawner {
    pub fn new(systems: Vec<StarSystemConfig>, seed: u64) -> Self {
        Self {
            systems,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl SpawnExecutor for Spawner {
    fn try_execute(&mut self, intent: &SpawnIntent, ctx: &mut SpawnContext<'_>) -> bool {
        let Some(system) = self.systems.iter().find(|s| s.id == intent.system_id) else {
            debug!(system_id = intent.system_id, "spawn_unknown_system");
            return false;
        };
        let Some(quota) = system.quotas.iter().find(|q| q.role == intent.role) else {
            debug!(
                system_id = intent.system_id,
                role = intent.role.as_str(),
                "spawn_unknown_role"
            );
            return false;
        };

        let population = world_setup::ships_in_system(ctx.world, system.id);
        if population >= system.max_ships as usize {
            debug!(
                system_id = system.id,
                population,
                max_ships = system.max_ships,
                "spawn_pool_full"
            );
            return false;
        }

        let uid = ctx.identity.create(EntityType::Ship);
        world_setup::spawn_ship(
            ctx.world,
            &mut self.rng,
            ShipSpec {
                uid,
                system,
                role: &intent.role,
                faction: quota.faction,
            },
        );
        info!(
            uid = %uid,
            system_id = system.id,
            role = intent.role.as_str(),
            "ship_spawned"
        );
        ctx.events.push(SimEvent::ShipSpawned {
            uid,
            system_id: system.id,
            role: intent.role.clone(),
        });
        true
    }
}
