//! Identity service: per-type monotonic id allocation.
//!
//! Owned by the engine context rather than living in a global, so every
//! engine (and every test) starts from a fresh counter set.

use std::collections::HashMap;

use crate::enums::EntityType;
use crate::types::Uid;

#[derive(Debug, Clone, Default)]
pub struct IdentityService {
    counters: HashMap<EntityType, u64>,
}

impl IdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the next id for `entity_type`. The first id of every type is 1.
    pub fn create(&mut self, entity_type: EntityType) -> Uid {
        let counter = self.counters.entry(entity_type).or_insert(0);
        *counter += 1;
        Uid::new(entity_type, *counter)
    }

    /// Highest id issued so far for `entity_type` (0 if none).
    pub fn last_issued(&self, entity_type: EntityType) -> u64 {
        self.counters.get(&entity_type).copied().unwrap_or(0)
    }

    /// Forget all counters. Only for simulation reset; ids issued before the
    /// reset must not outlive it.
    pub fn reset(&mut self) {
        self.counters.clear();
    }
}
