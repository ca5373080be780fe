//! Nearest-target acquisition for AI-controlled ships.
//!
//! Read-only over a [`WorldState`]. Candidates are the other ships in the
//! source's star system that are active with hull left. Without friendly
//! fire only ships hostile to the source's faction qualify. The nearest
//! candidate inside the search radius wins; equal distances go to the
//! lowest [`Uid`], then the lowest slot.

use serde::{Deserialize, Serialize};

use voidline_core::config::TargetingConfig;
use voidline_core::state::{ShipRecord, TargetSnapshot, WorldState};
use voidline_core::Uid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetQueryParams {
    pub search_radius: f32,
    pub allow_friendly_fire: bool,
}

impl From<&TargetingConfig> for TargetQueryParams {
    fn from(config: &TargetingConfig) -> Self {
        Self {
            search_radius: config.search_radius,
            allow_friendly_fire: config.allow_friendly_fire,
        }
    }
}

/// A successful query: the target and its index in the system's ship list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetAcquisition {
    pub target: TargetSnapshot,
    pub slot_index: usize,
}

pub fn try_acquire_nearest_target(
    world: Option<&WorldState>,
    source: &ShipRecord,
    params: &TargetQueryParams,
) -> Option<TargetAcquisition> {
    // A negative or NaN radius would otherwise square into a usable bound.
    if params.search_radius.is_nan() || params.search_radius < 0.0 {
        return None;
    }
    let system = world?.system(source.system_id)?;
    let radius_sq = params.search_radius * params.search_radius;

    // (distance², uid, slot)
    let mut best: Option<(f32, Uid, usize)> = None;

    for (slot, candidate) in system.ships.iter().enumerate() {
        if candidate.uid == source.uid || !candidate.active || candidate.health <= 0.0 {
            continue;
        }
        if !params.allow_friendly_fire && !source.faction.is_hostile_to(candidate.faction) {
            continue;
        }

        let distance_sq = source.position.distance_squared(candidate.position);
        if distance_sq.is_nan() || distance_sq > radius_sq {
            continue;
        }

        let closer = match best {
            None => true,
            Some((best_sq, best_uid, _)) => distance_sq
                .total_cmp(&best_sq)
                .then(candidate.uid.cmp(&best_uid))
                .is_lt(),
        };
        if closer {
            best = Some((distance_sq, candidate.uid, slot));
        }
    }

    best.map(|(distance_sq, _, slot)| TargetAcquisition {
        target: TargetSnapshot::from_record(&system.ships[slot], distance_sq.sqrt()),
        slot_index: slot,
    })
}
