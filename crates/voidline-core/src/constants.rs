//! Simulation constants and tuning parameters.

/// Simulation tick rate (Hz).
pub const TICK_RATE: u32 = 30;

/// Integration sub-steps per tick.
pub const SUBSTEPS_PER_TICK: u32 = 4;

// --- Ships ---

/// Local forward axis of a ship.
pub const SHIP_FORWARD: glam::Vec3 = glam::Vec3::X;

/// Hull points of a freshly spawned ship.
pub const SHIP_MAX_HEALTH: f32 = 100.0;

/// Cruise speed in units per second.
pub const SHIP_CRUISE_SPEED: f32 = 40.0;

/// Maximum yaw rate in radians per second.
pub const SHIP_TURN_RATE: f32 = 2.0;

/// Fraction of the system radius that idle ships orbit at.
pub const ORBIT_RADIUS_FRACTION: f32 = 0.6;

// --- Spawning ---

/// Queue length above which the planner stops enqueuing new intents.
pub const MAX_SPAWN_QUEUE_LEN: usize = 64;

/// Executor attempts per tick.
pub const MAX_SPAWNS_PER_TICK: u32 = 2;

/// Attempts before an intent that keeps failing is dropped.
pub const MAX_SPAWN_ATTEMPTS: u32 = 8;

// --- Targeting / weapons ---

/// Default acquisition radius.
pub const TARGET_SEARCH_RADIUS: f32 = 400.0;

/// Range at which a pursuing ship starts dealing damage.
pub const WEAPON_RANGE: f32 = 60.0;

/// Damage per second while in weapon range.
pub const WEAPON_DPS: f32 = 12.0;

// --- Demo world ---

/// Default system radius.
pub const SYSTEM_RADIUS: f32 = 500.0;

/// Default per-system ship pool.
pub const SYSTEM_MAX_SHIPS: u32 = 8;

/// Role names used by the default configuration.
pub const ROLE_PATROL: &str = "Patrol";
pub const ROLE_RAIDER: &str = "Raider";
