//! Engine configuration, loadable from JSON.

use std::collections::HashSet;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::*;
use crate::enums::Faction;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("tick_rate must be greater than zero")]
    ZeroTickRate,
    #[error("substeps must be greater than zero")]
    ZeroSubsteps,
    #[error("duplicate star system id {0}")]
    DuplicateSystem(u32),
    #[error("star system {system_id}: {reason}")]
    InvalidSystem { system_id: u32, reason: &'static str },
    #[error("targeting.search_radius must be a non-negative number, got {0}")]
    NegativeSearchRadius(f32),
}

/// Where a failed intent goes when it is handed back to the planner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequeuePlacement {
    /// Back of the queue. Avoids head-of-line blocking.
    #[default]
    Tail,
    /// Front of the queue. Preserves demand order.
    Head,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub placement: RequeuePlacement,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            placement: RequeuePlacement::Tail,
            max_attempts: Some(MAX_SPAWN_ATTEMPTS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub max_queue_len: usize,
    pub max_spawns_per_tick: u32,
    pub retry: RetryPolicy,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            max_queue_len: MAX_SPAWN_QUEUE_LEN,
            max_spawns_per_tick: MAX_SPAWNS_PER_TICK,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingConfig {
    pub search_radius: f32,
    pub allow_friendly_fire: bool,
    pub weapon_range: f32,
    pub weapon_dps: f32,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            search_radius: TARGET_SEARCH_RADIUS,
            allow_friendly_fire: false,
            weapon_range: WEAPON_RANGE,
            weapon_dps: WEAPON_DPS,
        }
    }
}

/// Standing demand for one role inside a system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleQuota {
    pub role: String,
    pub faction: Faction,
    /// Ships of this role the planner keeps alive.
    pub target_count: u32,
    /// Minimum seconds between two intents for this role.
    pub interval_secs: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarSystemConfig {
    pub id: u32,
    pub center: Vec3,
    pub radius: f32,
    /// Ship pool; the spawner is not ready while the system is full.
    pub max_ships: u32,
    pub quotas: Vec<RoleQuota>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// RNG seed for determinism. Same seed = same simulation.
    pub seed: u64,
    pub tick_rate: u32,
    pub substeps: u32,
    /// Initial time scale (1.0 = normal).
    pub time_scale: f64,
    pub spawn: SpawnConfig,
    pub targeting: TargetingConfig,
    pub systems: Vec<StarSystemConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            tick_rate: TICK_RATE,
            substeps: SUBSTEPS_PER_TICK,
            time_scale: 1.0,
            spawn: SpawnConfig::default(),
            targeting: TargetingConfig::default(),
            systems: default_systems(),
        }
    }
}

impl SimConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if self.substeps == 0 {
            return Err(ConfigError::ZeroSubsteps);
        }
        if self.targeting.search_radius.is_nan() || self.targeting.search_radius < 0.0 {
            return Err(ConfigError::NegativeSearchRadius(
                self.targeting.search_radius,
            ));
        }

        let mut seen = HashSet::new();
        for system in &self.systems {
            if !seen.insert(system.id) {
                return Err(ConfigError::DuplicateSystem(system.id));
            }
            if system.radius <= 0.0 {
                return Err(ConfigError::InvalidSystem {
                    system_id: system.id,
                    reason: "radius must be positive",
                });
            }
            if system.quotas.iter().any(|q| q.interval_secs < 0.0) {
                return Err(ConfigError::InvalidSystem {
                    system_id: system.id,
                    reason: "quota interval must be non-negative",
                });
            }
        }
        Ok(())
    }

    /// Seconds per tick at this config's tick rate.
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_rate.max(1) as f64
    }

    pub fn system(&self, id: u32) -> Option<&StarSystemConfig> {
        self.systems.iter().find(|s| s.id == id)
    }
}

/// Demo layout: a contested system and a quiet Kethri system.
fn default_systems() -> Vec<StarSystemConfig> {
    vec![
        StarSystemConfig {
            id: 1,
            center: Vec3::ZERO,
            radius: SYSTEM_RADIUS,
            max_ships: SYSTEM_MAX_SHIPS,
            quotas: vec![
                RoleQuota {
                    role: ROLE_PATROL.to_string(),
                    faction: Faction::Terran,
                    target_count: 3,
                    interval_secs: 2.0,
                },
                RoleQuota {
                    role: ROLE_RAIDER.to_string(),
                    faction: Faction::Pirate,
                    target_count: 2,
                    interval_secs: 5.0,
                },
            ],
        },
        StarSystemConfig {
            id: 3,
            center: Vec3::new(5_000.0, 0.0, 0.0),
            radius: SYSTEM_RADIUS,
            max_ships: SYSTEM_MAX_SHIPS,
            quotas: vec![RoleQuota {
                role: ROLE_PATROL.to_string(),
                faction: Faction::Kethri,
                target_count: 2,
                interval_secs: 3.0,
            }],
        },
    ]
}
