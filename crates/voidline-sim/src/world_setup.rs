//! Entity spawn factories.
//!
//! Creates ship entities with their full component bundle.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::{Quat, Vec3};
use hecs::World;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use voidline_core::components::*;
use voidline_core::config::StarSystemConfig;
use voidline_core::constants::*;
use voidline_core::enums::Faction;
use voidline_core::Uid;

/// Everything the factory needs to know about a new ship.
pub struct ShipSpec<'a> {
    pub uid: Uid,
    pub system: &'a StarSystemConfig,
    pub role: &'a str,
    pub faction: Faction,
}

/// Spawn a ship at a random point inside its system, heading along the
/// orbit tangent at cruise speed.
pub fn spawn_ship(world: &mut World, rng: &mut ChaCha8Rng, spec: ShipSpec<'_>) -> hecs::Entity {
    let bearing: f32 = rng.gen_range(0.0..TAU);
    let distance = rng.gen_range(0.2f32..0.9) * spec.system.radius;
    let altitude = rng.gen_range(-0.05f32..0.05) * spec.system.radius;

    let position =
        spec.system.center + Vec3::new(bearing.cos() * distance, bearing.sin() * distance, altitude);
    let rotation = Quat::from_rotation_z(bearing + FRAC_PI_2);

    spawn_ship_at(world, spec, position, rotation)
}

/// Spawn a ship with an explicit pose.
pub fn spawn_ship_at(
    world: &mut World,
    spec: ShipSpec<'_>,
    position: Vec3,
    rotation: Quat,
) -> hecs::Entity {
    world.spawn((
        Ship {
            uid: spec.uid,
            system_id: spec.system.id,
            role: spec.role.to_string(),
            faction: spec.faction,
        },
        Pose { position, rotation },
        Motion {
            velocity: rotation * SHIP_FORWARD * SHIP_CRUISE_SPEED,
            speed: SHIP_CRUISE_SPEED,
            heading_goal: rotation,
        },
        Hull {
            health: SHIP_MAX_HEALTH,
            max_health: SHIP_MAX_HEALTH,
        },
        Active(true),
        Pursuit::default(),
    ))
}

/// Ships currently occupying a system's pool, disabled wrecks included.
pub fn ships_in_system(world: &World, system_id: u32) -> usize {
    world
        .query::<&Ship>()
        .iter()
        .filter(|(_, ship)| ship.system_id == system_id)
        .count()
}
