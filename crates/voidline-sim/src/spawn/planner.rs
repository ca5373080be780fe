//! Spawn demand planning and the intent queue.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, warn};

use voidline_core::config::{RequeuePlacement, RetryPolicy, SpawnConfig, StarSystemConfig};
use voidline_core::state::WorldState;
use voidline_core::SpawnIntent;

/// Live ships per (system, role).
#[derive(Debug, Clone, Default)]
pub struct PopulationCensus {
    counts: HashMap<(u32, String), u32>,
}

impl PopulationCensus {
    /// Count active ships in a world-state snapshot.
    pub fn from_world_state(world: &WorldState) -> Self {
        let mut census = Self::default();
        for system in &world.systems {
            for ship in system.ships.iter().filter(|s| s.active) {
                census.record(system.system_id, &ship.role);
            }
        }
        census
    }

    pub fn record(&mut self, system_id: u32, role: &str) {
        *self
            .counts
            .entry((system_id, role.to_string()))
            .or_insert(0) += 1;
    }

    pub fn count(&self, system_id: u32, role: &str) -> u32 {
        self.counts
            .get(&(system_id, role.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

/// What happened to an intent handed back with [`SpawnPlanner::requeue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueOutcome {
    Requeued { attempts: u32 },
    /// Retry budget exhausted; the intent is gone.
    Dropped { attempts: u32 },
}

/// A dequeued intent together with its failed-execution count.
///
/// Handed out by [`SpawnPlanner::try_dequeue_next_intent`] and given back
/// to [`SpawnPlanner::requeue`] when execution was not ready. Not `Clone`:
/// one ticket is one unit of demand.
#[derive(Debug, PartialEq, Eq)]
pub struct SpawnTicket {
    intent: SpawnIntent,
    attempts: u32,
}

impl SpawnTicket {
    fn fresh(intent: SpawnIntent) -> Self {
        Self {
            intent,
            attempts: 0,
        }
    }

    pub fn intent(&self) -> &SpawnIntent {
        &self.intent
    }

    /// Failed executions so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn into_intent(self) -> SpawnIntent {
        self.intent
    }
}

#[derive(Debug, Clone)]
struct QuotaTracker {
    intent: SpawnIntent,
    target_count: u32,
    interval_secs: f32,
    since_last_secs: f32,
}

#[derive(Debug)]
pub struct SpawnPlanner {
    quotas: Vec<QuotaTracker>,
    queue: VecDeque<SpawnTicket>,
    max_queue_len: usize,
    retry: RetryPolicy,
    last_tick: Option<u64>,
}

impl SpawnPlanner {
    pub fn new(systems: &[StarSystemConfig], config: &SpawnConfig) -> Self {
        let quotas = systems
            .iter()
            .flat_map(|system| {
                system.quotas.iter().map(move |quota| QuotaTracker {
                    intent: SpawnIntent::new(system.id, quota.role.clone()),
                    target_count: quota.target_count,
                    interval_secs: quota.interval_secs,
                    // First intent of every quota is due on the first tick.
                    since_last_secs: quota.interval_secs,
                })
            })
            .collect();

        Self {
            quotas,
            queue: VecDeque::new(),
            max_queue_len: config.max_queue_len,
            retry: config.retry,
            last_tick: None,
        }
    }

    /// Recompute demand for the `dt` seconds that elapsed and enqueue what
    /// is missing. Returns the number of new intents.
    pub fn tick(&mut self, tick_index: u64, dt: f64, census: &PopulationCensus) -> usize {
        if let Some(last) = self.last_tick {
            if tick_index <= last {
                debug!(tick_index, last, "spawn_planner_stale_tick");
                return 0;
            }
        }
        self.last_tick = Some(tick_index);

        let mut enqueued = 0;
        for i in 0..self.quotas.len() {
            let tracker = &mut self.quotas[i];
            tracker.since_last_secs =
                (tracker.since_last_secs + dt as f32).min(tracker.interval_secs.max(dt as f32));
            if tracker.since_last_secs < tracker.interval_secs {
                continue;
            }

            let intent = tracker.intent.clone();
            let target_count = tracker.target_count;
            let live = census.count(intent.system_id, &intent.role);
            let pending = self.pending_for(&intent);
            if live + pending >= target_count {
                continue;
            }

            if self.queue.len() >= self.max_queue_len {
                debug!(
                    system_id = intent.system_id,
                    role = intent.role.as_str(),
                    queue_len = self.queue.len(),
                    "spawn_queue_full"
                );
                continue;
            }

            self.queue.push_back(SpawnTicket::fresh(intent));
            self.quotas[i].since_last_secs = 0.0;
            enqueued += 1;
        }
        enqueued
    }

    /// Add externally generated demand. Refused when the queue is full.
    pub fn enqueue(&mut self, intent: SpawnIntent) -> bool {
        if self.queue.len() >= self.max_queue_len {
            return false;
        }
        self.queue.push_back(SpawnTicket::fresh(intent));
        true
    }

    /// Pop the head of the queue. The ticket leaves the planner: a dropped
    /// ticket counts as realised.
    pub fn try_dequeue_next_intent(&mut self) -> Option<SpawnTicket> {
        self.queue.pop_front()
    }

    /// Hand back a ticket whose execution was not ready.
    ///
    /// Requeued tickets bypass the queue length cap so demand is never lost
    /// to backpressure; only the retry budget can drop them.
    pub fn requeue(&mut self, mut ticket: SpawnTicket) -> RequeueOutcome {
        ticket.attempts += 1;
        let attempts = ticket.attempts;

        if let Some(max) = self.retry.max_attempts {
            if attempts >= max {
                warn!(
                    system_id = ticket.intent.system_id,
                    role = ticket.intent.role.as_str(),
                    attempts,
                    "spawn_intent_dropped"
                );
                return RequeueOutcome::Dropped { attempts };
            }
        }

        match self.retry.placement {
            RequeuePlacement::Tail => self.queue.push_back(ticket),
            RequeuePlacement::Head => self.queue.push_front(ticket),
        }
        RequeueOutcome::Requeued { attempts }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queued intents equal to `intent`.
    pub fn pending_for(&self, intent: &SpawnIntent) -> u32 {
        self.queue
            .iter()
            .filter(|ticket| ticket.intent == *intent)
            .count() as u32
    }

    /// Queued intents in dequeue order.
    pub fn queued(&self) -> impl Iterator<Item = &SpawnIntent> {
        self.queue.iter().map(SpawnTicket::intent)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.last_tick = None;
        for tracker in &mut self.quotas {
            tracker.since_last_secs = tracker.interval_secs;
        }
    }
}
