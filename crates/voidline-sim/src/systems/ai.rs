//! Ship AI: pick a target, steer, shoot.
//!
//! Every active ship queries the nearest qualifying target from the
//! tick's world-state snapshot. With a target it turns toward it and, once
//! inside weapon range, deals damage; otherwise it orbits its system.

use std::collections::HashMap;

use glam::{Quat, Vec3};
use hecs::World;
use tracing::{debug, info};

use voidline_core::components::*;
use voidline_core::config::{StarSystemConfig, TargetingConfig};
use voidline_core::constants::{ORBIT_RADIUS_FRACTION, SHIP_CRUISE_SPEED, SHIP_FORWARD};
use voidline_core::events::SimEvent;
use voidline_core::state::WorldState;
use voidline_core::Uid;

use crate::targeting::{try_acquire_nearest_target, TargetAcquisition, TargetQueryParams};

pub fn run(
    world: &mut World,
    world_state: &WorldState,
    systems: &[StarSystemConfig],
    targeting: &TargetingConfig,
    dt: f32,
    events: &mut Vec<SimEvent>,
) {
    let params = TargetQueryParams::from(targeting);

    let decisions: HashMap<Uid, Option<TargetAcquisition>> = world_state
        .systems
        .iter()
        .flat_map(|system| system.ships.iter())
        .filter(|ship| ship.active)
        .map(|ship| {
            (
                ship.uid,
                try_acquire_nearest_target(Some(world_state), ship, &params),
            )
        })
        .collect();

    let mut damage: HashMap<Uid, f32> = HashMap::new();

    for (_entity, (ship, pose, motion, pursuit, active)) in
        world.query_mut::<(&Ship, &Pose, &mut Motion, &mut Pursuit, &Active)>()
    {
        if !active.0 {
            motion.speed = 0.0;
            pursuit.target = None;
            continue;
        }

        let acquisition = decisions.get(&ship.uid).and_then(Option::as_ref);
        let direction = match acquisition {
            Some(hit) => {
                if pursuit.target != Some(hit.target.uid) {
                    debug!(
                        source = %ship.uid,
                        target = %hit.target.uid,
                        distance = hit.target.distance,
                        "target_acquired"
                    );
                    events.push(SimEvent::TargetAcquired {
                        source: ship.uid,
                        target: hit.target.uid,
                        distance: hit.target.distance,
                    });
                }
                pursuit.target = Some(hit.target.uid);
                if hit.target.distance <= targeting.weapon_range {
                    *damage.entry(hit.target.uid).or_insert(0.0) += targeting.weapon_dps * dt;
                }
                (hit.target.position - pose.position).normalize_or_zero()
            }
            None => {
                pursuit.target = None;
                match systems.iter().find(|s| s.id == ship.system_id) {
                    Some(system) => orbit_direction(pose.position, system),
                    None => Vec3::ZERO,
                }
            }
        };

        if direction != Vec3::ZERO {
            motion.heading_goal = heading_for(direction);
        }
        motion.speed = SHIP_CRUISE_SPEED;
    }

    if damage.is_empty() {
        return;
    }

    for (_entity, (ship, hull, active)) in world.query_mut::<(&Ship, &mut Hull, &mut Active)>() {
        let Some(amount) = damage.get(&ship.uid) else {
            continue;
        };
        hull.health = (hull.health - amount).max(0.0);
        if hull.health <= 0.0 && active.0 {
            active.0 = false;
            info!(uid = %ship.uid, "ship_disabled");
            events.push(SimEvent::ShipDisabled { uid: ship.uid });
        }
    }
}

/// Counter-clockwise orbit around the system center, pulled toward the
/// orbit radius.
fn orbit_direction(position: Vec3, system: &StarSystemConfig) -> Vec3 {
    let orbit_radius = system.radius * ORBIT_RADIUS_FRACTION;
    let offset = position - system.center;
    let planar = Vec3::new(offset.x, offset.y, 0.0);
    let r = planar.length();
    if r < 1e-3 || orbit_radius <= 0.0 {
        return SHIP_FORWARD;
    }

    let radial = planar / r;
    let tangent = Vec3::new(-radial.y, radial.x, 0.0);
    let correction = radial * ((orbit_radius - r) / orbit_radius).clamp(-1.0, 1.0);
    // Also bleed off altitude.
    let climb = Vec3::new(0.0, 0.0, (-offset.z / orbit_radius).clamp(-0.5, 0.5));
    (tangent + correction + climb).normalize_or_zero()
}

fn heading_for(direction: Vec3) -> Quat {
    Quat::from_rotation_arc(SHIP_FORWARD, direction)
}
