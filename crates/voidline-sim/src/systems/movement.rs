//! Kinematic integration with substep tracing.
//!
//! Each ship is integrated through `substeps` equal sub-steps. The pose at
//! the start of the tick is recorded at fraction 0.0 and the pose after
//! sub-step k at k/substeps, so every ship contributes `substeps + 1`
//! samples ending at exactly 1.0.

use hecs::World;

use voidline_core::components::{Active, Motion, Pose, Ship};
use voidline_core::constants::{SHIP_FORWARD, SHIP_TURN_RATE};

use crate::trace::{TraceBuffer, TraceError};

/// Integrate all ships over `dt` seconds. The caller owns the tick
/// protocol: `begin_tick` before, `publish` after.
pub fn run(
    world: &mut World,
    trace: &mut TraceBuffer,
    dt: f32,
    substeps: u32,
) -> Result<(), TraceError> {
    let substeps = substeps.max(1);
    let h = dt / substeps as f32;
    let max_turn = SHIP_TURN_RATE * h;

    for (_entity, (ship, pose, motion, active)) in
        world.query_mut::<(&Ship, &mut Pose, &mut Motion, &Active)>()
    {
        trace.add_sample(ship.uid, 0.0, pose.position, pose.rotation)?;

        let speed = if active.0 { motion.speed } else { 0.0 };
        for k in 1..=substeps {
            let remaining = pose.rotation.angle_between(motion.heading_goal);
            pose.rotation = if remaining <= max_turn {
                motion.heading_goal
            } else {
                pose.rotation
                    .slerp(motion.heading_goal, max_turn / remaining)
                    .normalize()
            };

            motion.velocity = pose.rotation * SHIP_FORWARD * speed;
            pose.position += motion.velocity * h;

            let fraction = k as f32 / substeps as f32;
            trace.add_sample(ship.uid, fraction, pose.position, pose.rotation)?;
        }
    }
    Ok(())
}
