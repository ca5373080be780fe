//! Tests for input dispatch, the trace buffer, the spawn pipeline,
//! targeting and the engine tick.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use glam::{Quat, Vec3};
use hecs::World;

use voidline_core::commands::SimCommand;
use voidline_core::config::*;
use voidline_core::enums::*;
use voidline_core::events::SimEvent;
use voidline_core::state::{ShipRecord, StarSystemState, WorldState};
use voidline_core::{IdentityService, SpawnIntent, Uid};

use crate::engine::SimulationEngine;
use crate::input::{InputDispatcher, KeyHandler, KeyboardState};
use crate::spawn::{PopulationCensus, RequeueOutcome, SpawnContext, SpawnExecutor, SpawnPlanner, Spawner};
use crate::targeting::{try_acquire_nearest_target, TargetQueryParams};
use crate::trace::{TraceBuffer, TraceError};

const DT: f64 = 1.0 / 30.0;

fn counter_handler(count: &Rc<Cell<u32>>) -> KeyHandler {
    let count = Rc::clone(count);
    KeyHandler::new(move || count.set(count.get() + 1))
}

fn press(keys: &mut KeyboardState, key: Key) {
    keys.handle_key(key, true);
}

/// End the frame and release everything, like a one-frame tap.
fn next_frame(keys: &mut KeyboardState) {
    keys.end_frame();
    keys.release_all();
}

// ---- Input dispatch ----

#[test]
fn test_input_handler_runs_once_per_press_edge() {
    let dispatcher = InputDispatcher::new();
    let count = Rc::new(Cell::new(0));
    dispatcher.subscribe(Key::F1, counter_handler(&count));

    let mut keys = KeyboardState::new();
    press(&mut keys, Key::F1);
    dispatcher.update(&keys);
    assert_eq!(count.get(), 1);

    // Still held, no new edge.
    keys.end_frame();
    keys.handle_key(Key::F1, true);
    dispatcher.update(&keys);
    assert_eq!(count.get(), 1);

    // No input at all.
    next_frame(&mut keys);
    dispatcher.update(&keys);
    assert_eq!(count.get(), 1);
}

#[test]
fn test_input_handlers_run_in_registration_order() {
    let dispatcher = InputDispatcher::new();
    let order = Rc::new(RefCell::new(Vec::new()));
    for label in ["a", "b", "c"] {
        let order = Rc::clone(&order);
        dispatcher.subscribe(Key::Space, KeyHandler::new(move || order.borrow_mut().push(label)));
    }

    let mut keys = KeyboardState::new();
    press(&mut keys, Key::Space);
    dispatcher.update(&keys);
    assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
}

#[test]
fn test_input_unpressed_keys_are_not_dispatched() {
    let dispatcher = InputDispatcher::new();
    let f1 = Rc::new(Cell::new(0));
    let f2 = Rc::new(Cell::new(0));
    dispatcher.subscribe(Key::F1, counter_handler(&f1));
    dispatcher.subscribe(Key::F2, counter_handler(&f2));

    let mut keys = KeyboardState::new();
    press(&mut keys, Key::F2);
    let stats = dispatcher.update(&keys);
    assert_eq!((f1.get(), f2.get()), (0, 1));
    assert_eq!(stats.invoked, 1);
}

#[test]
fn test_input_unsubscribe_removes_first_match_only() {
    let dispatcher = InputDispatcher::new();
    let count = Rc::new(Cell::new(0));
    let handler = counter_handler(&count);
    dispatcher.subscribe(Key::F1, handler.clone());
    dispatcher.subscribe(Key::F1, handler.clone());
    assert_eq!(dispatcher.handler_count(Key::F1), 2);

    assert!(dispatcher.unsubscribe(Key::F1, &handler));
    assert_eq!(dispatcher.handler_count(Key::F1), 1);

    let mut keys = KeyboardState::new();
    press(&mut keys, Key::F1);
    dispatcher.update(&keys);
    assert_eq!(count.get(), 1);

    assert!(dispatcher.unsubscribe(Key::F1, &handler));
    assert!(!dispatcher.is_registered(Key::F1));
}

#[test]
fn test_input_unsubscribe_unknown_is_noop() {
    let dispatcher = InputDispatcher::new();
    let stranger = KeyHandler::new(|| {});
    assert!(!dispatcher.unsubscribe(Key::F5, &stranger));

    dispatcher.subscribe(Key::F5, KeyHandler::new(|| {}));
    assert!(!dispatcher.unsubscribe(Key::F5, &stranger));
    assert_eq!(dispatcher.handler_count(Key::F5), 1);
}

#[test]
fn test_input_fault_is_isolated() {
    let dispatcher = InputDispatcher::new();
    let same_key = Rc::new(Cell::new(0));
    let other_key = Rc::new(Cell::new(0));

    dispatcher.subscribe(Key::F1, KeyHandler::new(|| panic!("handler exploded")));
    dispatcher.subscribe(Key::F1, counter_handler(&same_key));
    dispatcher.subscribe(Key::F2, counter_handler(&other_key));

    let mut keys = KeyboardState::new();
    press(&mut keys, Key::F1);
    press(&mut keys, Key::F2);
    let stats = dispatcher.update(&keys);

    assert_eq!(stats.faults, 1);
    assert_eq!(stats.invoked, 2);
    assert_eq!(same_key.get(), 1);
    assert_eq!(other_key.get(), 1);
}

#[test]
fn test_input_unsubscribe_during_dispatch_keeps_current_frame() {
    let dispatcher = Rc::new(InputDispatcher::new());
    let victim_count = Rc::new(Cell::new(0));
    let victim = counter_handler(&victim_count);

    let weak = Rc::downgrade(&dispatcher);
    let target = victim.clone();
    dispatcher.subscribe(
        Key::F1,
        KeyHandler::new(move || {
            if let Some(dispatcher) = weak.upgrade() {
                dispatcher.unsubscribe(Key::F1, &target);
            }
        }),
    );
    dispatcher.subscribe(Key::F1, victim);

    let mut keys = KeyboardState::new();
    press(&mut keys, Key::F1);
    dispatcher.update(&keys);
    assert_eq!(victim_count.get(), 1, "already-snapshotted handler still runs");

    next_frame(&mut keys);
    press(&mut keys, Key::F1);
    dispatcher.update(&keys);
    assert_eq!(victim_count.get(), 1, "unsubscribed handler must not run again");
}

#[test]
fn test_input_subscribe_during_dispatch_waits_for_next_frame() {
    let dispatcher = Rc::new(InputDispatcher::new());
    let late_count = Rc::new(Cell::new(0));

    let weak = Rc::downgrade(&dispatcher);
    let late = counter_handler(&late_count);
    let subscribed = Rc::new(Cell::new(false));
    let flag = Rc::clone(&subscribed);
    dispatcher.subscribe(
        Key::F1,
        KeyHandler::new(move || {
            if flag.replace(true) {
                return;
            }
            if let Some(dispatcher) = weak.upgrade() {
                dispatcher.subscribe(Key::F9, late.clone());
            }
        }),
    );

    let mut keys = KeyboardState::new();
    press(&mut keys, Key::F1);
    press(&mut keys, Key::F9);
    dispatcher.update(&keys);
    assert!(subscribed.get());
    assert_eq!(late_count.get(), 0, "key registered mid-dispatch is not in this frame's snapshot");

    next_frame(&mut keys);
    press(&mut keys, Key::F9);
    dispatcher.update(&keys);
    assert_eq!(late_count.get(), 1);
}

// ---- Trace buffer ----

#[test]
fn test_trace_publish_exact_samples() {
    let mut ids = IdentityService::new();
    let uid_a = ids.create(EntityType::Ship);
    let (p0, p1) = (Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 2.0, 3.0));
    let (r0, r1) = (Quat::IDENTITY, Quat::from_rotation_z(0.5));

    let mut trace = TraceBuffer::new();
    trace.begin_tick();
    trace.add_sample(uid_a, 0.0, p0, r0).unwrap();
    trace.add_sample(uid_a, 0.5, p1, r1).unwrap();
    trace.publish().unwrap();

    let samples = trace.published().get(&uid_a).unwrap();
    assert_eq!(samples.len(), 2);
    assert_eq!((samples[0].time_fraction, samples[0].position, samples[0].rotation), (0.0, p0, r0));
    assert_eq!((samples[1].time_fraction, samples[1].position, samples[1].rotation), (0.5, p1, r1));
}

#[test]
fn test_trace_published_is_isolated_from_later_writes() {
    let mut ids = IdentityService::new();
    let uid_a = ids.create(EntityType::Ship);
    let uid_b = ids.create(EntityType::Ship);

    let mut trace = TraceBuffer::new();
    trace.begin_tick();
    trace.add_sample(uid_a, 0.0, Vec3::ZERO, Quat::IDENTITY).unwrap();
    trace.publish().unwrap();
    let held = trace.published_handle();

    trace.add_sample(uid_a, 1.0, Vec3::ONE, Quat::IDENTITY).unwrap();
    trace.add_sample(uid_b, 0.0, Vec3::ONE, Quat::IDENTITY).unwrap();
    assert_eq!(trace.published().get(&uid_a).unwrap().len(), 1);
    assert!(trace.published().get(&uid_b).is_none());

    // Next tick replaces the view, but a reader's handle keeps its tick.
    trace.begin_tick();
    trace.add_sample(uid_b, 0.0, Vec3::X, Quat::IDENTITY).unwrap();
    trace.publish().unwrap();
    assert!(trace.published().get(&uid_a).is_none());
    assert_eq!(held.get(&uid_a).unwrap().len(), 1);
    assert!(held.get(&uid_b).is_none());
    assert_eq!(held.generation() + 1, trace.published().generation());
}

#[test]
fn test_trace_begin_tick_discards_stale_working_data() {
    let mut ids = IdentityService::new();
    let uid = ids.create(EntityType::Ship);

    let mut trace = TraceBuffer::new();
    trace.begin_tick();
    trace.add_sample(uid, 0.0, Vec3::ZERO, Quat::IDENTITY).unwrap();
    trace.begin_tick();
    assert_eq!(trace.working_len(), 0);
    trace.publish().unwrap();
    assert!(trace.published().is_empty());
}

#[test]
fn test_trace_clear_and_initial_state() {
    let mut ids = IdentityService::new();
    let uid = ids.create(EntityType::Ship);

    let mut trace = TraceBuffer::new();
    assert!(trace.published().is_empty());
    assert_eq!(trace.published().generation(), 0);

    trace.begin_tick();
    trace.add_sample(uid, 0.0, Vec3::ZERO, Quat::IDENTITY).unwrap();
    trace.publish().unwrap();
    assert_eq!(trace.published().len(), 1);

    trace.clear();
    assert!(trace.published().is_empty());
    assert_eq!(trace.working_len(), 0);
    assert!(!trace.is_tick_open());
}

#[test]
fn test_trace_rejects_invariant_violations() {
    let mut ids = IdentityService::new();
    let uid = ids.create(EntityType::Ship);
    let mut trace = TraceBuffer::new();

    assert_eq!(
        trace.add_sample(uid, 0.0, Vec3::ZERO, Quat::IDENTITY),
        Err(TraceError::NoOpenTick)
    );
    assert_eq!(trace.publish(), Err(TraceError::NoOpenTick));

    trace.begin_tick();
    assert!(matches!(
        trace.add_sample(uid, 1.5, Vec3::ZERO, Quat::IDENTITY),
        Err(TraceError::TimeFractionOutOfRange { .. })
    ));
    assert!(matches!(
        trace.add_sample(uid, f32::NAN, Vec3::ZERO, Quat::IDENTITY),
        Err(TraceError::TimeFractionOutOfRange { .. })
    ));

    trace.add_sample(uid, 0.5, Vec3::ZERO, Quat::IDENTITY).unwrap();
    trace.add_sample(uid, 0.5, Vec3::ZERO, Quat::IDENTITY).unwrap();
    assert!(matches!(
        trace.add_sample(uid, 0.25, Vec3::ZERO, Quat::IDENTITY),
        Err(TraceError::NonMonotonicTimeFraction { .. })
    ));
}

#[test]
fn test_trace_sample_at_interpolates() {
    let mut ids = IdentityService::new();
    let uid = ids.create(EntityType::Ship);

    let mut trace = TraceBuffer::new();
    trace.begin_tick();
    trace.add_sample(uid, 0.0, Vec3::ZERO, Quat::IDENTITY).unwrap();
    trace
        .add_sample(uid, 0.5, Vec3::new(10.0, 0.0, 0.0), Quat::from_rotation_z(1.0))
        .unwrap();
    trace.publish().unwrap();
    let published = trace.published();

    let (mid, rot) = published.sample_at(&uid, 0.25).unwrap();
    assert!((mid - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-5);
    assert!((rot.angle_between(Quat::from_rotation_z(0.5))).abs() < 1e-4);

    let (after, _) = published.sample_at(&uid, 0.9).unwrap();
    assert_eq!(after, Vec3::new(10.0, 0.0, 0.0));

    let stranger = ids.create(EntityType::Ship);
    assert!(published.sample_at(&stranger, 0.5).is_none());
}

// ---- Spawn pipeline ----

fn quiet_system(id: u32, role: &str, target_count: u32, interval_secs: f32) -> StarSystemConfig {
    StarSystemConfig {
        id,
        center: Vec3::ZERO,
        radius: 100.0,
        max_ships: 4,
        quotas: vec![RoleQuota {
            role: role.to_string(),
            faction: Faction::Terran,
            target_count,
            interval_secs,
        }],
    }
}

fn spawn_config(placement: RequeuePlacement, max_attempts: Option<u32>) -> SpawnConfig {
    SpawnConfig {
        max_queue_len: 16,
        max_spawns_per_tick: 4,
        retry: RetryPolicy {
            placement,
            max_attempts,
        },
    }
}

#[test]
fn test_spawn_failed_intent_is_returned_unchanged() {
    let systems = vec![quiet_system(3, "Patrol", 1, 0.0)];
    let mut planner = SpawnPlanner::new(&systems, &SpawnConfig::default());
    assert_eq!(planner.tick(0, DT, &PopulationCensus::default()), 1);

    let ticket = planner.try_dequeue_next_intent().unwrap();
    assert_eq!(ticket.intent(), &SpawnIntent::new(3, "Patrol"));
    assert_eq!(ticket.attempts(), 0);

    assert_eq!(planner.requeue(ticket), RequeueOutcome::Requeued { attempts: 1 });
    let again = planner.try_dequeue_next_intent().unwrap();
    assert_eq!(again.attempts(), 1);
    assert_eq!(again.into_intent(), SpawnIntent::new(3, "Patrol"));
    assert!(planner.try_dequeue_next_intent().is_none());
}

#[test]
fn test_spawn_tail_requeue_goes_behind_others() {
    let mut planner = SpawnPlanner::new(&[], &spawn_config(RequeuePlacement::Tail, None));
    planner.enqueue(SpawnIntent::new(1, "Patrol"));
    planner.enqueue(SpawnIntent::new(2, "Patrol"));

    let first = planner.try_dequeue_next_intent().unwrap();
    planner.requeue(first);
    let order: Vec<u32> = planner.queued().map(|i| i.system_id).collect();
    assert_eq!(order, vec![2, 1]);
}

#[test]
fn test_spawn_head_requeue_keeps_order() {
    let mut planner = SpawnPlanner::new(&[], &spawn_config(RequeuePlacement::Head, None));
    planner.enqueue(SpawnIntent::new(1, "Patrol"));
    planner.enqueue(SpawnIntent::new(2, "Patrol"));

    let first = planner.try_dequeue_next_intent().unwrap();
    planner.requeue(first);
    let order: Vec<u32> = planner.queued().map(|i| i.system_id).collect();
    assert_eq!(order, vec![1, 2]);
}

#[test]
fn test_spawn_retry_budget_drops_after_max_attempts() {
    let mut planner = SpawnPlanner::new(&[], &spawn_config(RequeuePlacement::Tail, Some(3)));
    planner.enqueue(SpawnIntent::new(1, "Patrol"));

    for expected in 1..3 {
        let intent = planner.try_dequeue_next_intent().unwrap();
        assert_eq!(
            planner.requeue(intent),
            RequeueOutcome::Requeued { attempts: expected }
        );
    }
    let intent = planner.try_dequeue_next_intent().unwrap();
    assert_eq!(planner.requeue(intent), RequeueOutcome::Dropped { attempts: 3 });
    assert!(planner.is_empty());
}

#[test]
fn test_spawn_equal_intents_keep_their_own_attempts() {
    let mut planner = SpawnPlanner::new(&[], &spawn_config(RequeuePlacement::Tail, Some(3)));
    planner.enqueue(SpawnIntent::new(1, "Patrol"));
    for _ in 0..2 {
        let aged = planner.try_dequeue_next_intent().unwrap();
        planner.requeue(aged);
    }
    planner.enqueue(SpawnIntent::new(1, "Patrol"));

    let aged = planner.try_dequeue_next_intent().unwrap();
    let fresh = planner.try_dequeue_next_intent().unwrap();
    assert_eq!(aged.intent(), fresh.intent());
    assert_eq!((aged.attempts(), fresh.attempts()), (2, 0));

    // The aged one spawns; the fresh one is not ready.
    drop(aged);
    assert_eq!(planner.requeue(fresh), RequeueOutcome::Requeued { attempts: 1 });
    assert_eq!(planner.queue_len(), 1);
}

#[test]
fn test_spawn_aged_intent_drops_while_equal_fresh_one_succeeds() {
    let mut planner = SpawnPlanner::new(&[], &spawn_config(RequeuePlacement::Tail, Some(3)));
    planner.enqueue(SpawnIntent::new(1, "Patrol"));
    for _ in 0..2 {
        let aged = planner.try_dequeue_next_intent().unwrap();
        planner.requeue(aged);
    }
    planner.enqueue(SpawnIntent::new(1, "Patrol"));

    let aged = planner.try_dequeue_next_intent().unwrap();
    let fresh = planner.try_dequeue_next_intent().unwrap();
    drop(fresh);
    assert_eq!(planner.requeue(aged), RequeueOutcome::Dropped { attempts: 3 });
    assert!(planner.is_empty());
}

#[test]
fn test_spawn_attempts_survive_planner_tick() {
    // Due on the first tick only.
    let systems = vec![quiet_system(1, "Patrol", 1, 1_000.0)];
    let mut planner = SpawnPlanner::new(&systems, &spawn_config(RequeuePlacement::Tail, Some(3)));
    let census = PopulationCensus::default();
    planner.tick(0, DT, &census);

    let mut last = None;
    for tick in 1..=3 {
        let ticket = planner.try_dequeue_next_intent().unwrap();
        // A planner tick between dequeue and requeue must not reset the count.
        planner.tick(tick, DT, &census);
        last = Some(planner.requeue(ticket));
        if matches!(last, Some(RequeueOutcome::Dropped { .. })) {
            break;
        }
    }
    assert_eq!(last, Some(RequeueOutcome::Dropped { attempts: 3 }));
}

#[test]
fn test_spawn_unbounded_retry_never_loses_intent() {
    let mut planner = SpawnPlanner::new(&[], &spawn_config(RequeuePlacement::Tail, None));
    planner.enqueue(SpawnIntent::new(7, "Raider"));
    for _ in 0..1_000 {
        let intent = planner.try_dequeue_next_intent().unwrap();
        assert!(matches!(planner.requeue(intent), RequeueOutcome::Requeued { .. }));
    }
    assert_eq!(planner.queue_len(), 1);
}

#[test]
fn test_spawn_planner_respects_pending_and_census() {
    let systems = vec![quiet_system(1, "Patrol", 2, 0.0)];
    let mut planner = SpawnPlanner::new(&systems, &SpawnConfig::default());
    let census = PopulationCensus::default();

    for tick in 0..10 {
        planner.tick(tick, DT, &census);
    }
    assert_eq!(planner.queue_len(), 2, "pending intents count toward demand");

    let mut full = PopulationCensus::default();
    full.record(1, "Patrol");
    full.record(1, "Patrol");
    let mut satisfied = SpawnPlanner::new(&systems, &SpawnConfig::default());
    assert_eq!(satisfied.tick(0, DT, &full), 0);
}

#[test]
fn test_spawn_planner_interval_cadence() {
    // One intent per second, quota large enough never to be satisfied.
    let systems = vec![quiet_system(1, "Patrol", 100, 1.0)];
    let mut planner = SpawnPlanner::new(&systems, &SpawnConfig::default());
    let census = PopulationCensus::default();

    let mut total = 0;
    for tick in 0..=60 {
        total += planner.tick(tick, DT, &census);
    }
    // Due on tick 0, then once per 30 ticks.
    assert!((2..=3).contains(&total), "got {total}");
}

#[test]
fn test_spawn_planner_backpressure() {
    let systems = vec![
        quiet_system(1, "Patrol", 10, 0.0),
        quiet_system(2, "Patrol", 10, 0.0),
    ];
    let config = SpawnConfig {
        max_queue_len: 3,
        ..SpawnConfig::default()
    };
    let mut planner = SpawnPlanner::new(&systems, &config);
    for tick in 0..10 {
        planner.tick(tick, DT, &PopulationCensus::default());
    }
    assert_eq!(planner.queue_len(), 3);
    assert!(!planner.enqueue(SpawnIntent::new(1, "Patrol")));

    // Requeue ignores the cap.
    let intent = planner.try_dequeue_next_intent().unwrap();
    planner.enqueue(SpawnIntent::new(9, "Patrol"));
    assert!(matches!(planner.requeue(intent), RequeueOutcome::Requeued { .. }));
    assert_eq!(planner.queue_len(), 4);
}

#[test]
fn test_spawn_planner_ignores_stale_tick() {
    let systems = vec![quiet_system(1, "Patrol", 5, 0.0)];
    let mut planner = SpawnPlanner::new(&systems, &SpawnConfig::default());
    assert_eq!(planner.tick(4, DT, &PopulationCensus::default()), 1);
    assert_eq!(planner.tick(4, DT, &PopulationCensus::default()), 0);
    assert_eq!(planner.tick(3, DT, &PopulationCensus::default()), 0);
}

#[test]
fn test_spawner_mints_uid_and_respects_pool() {
    let mut system = quiet_system(1, "Patrol", 5, 0.0);
    system.max_ships = 2;
    let mut spawner = Spawner::new(vec![system], 9);
    let mut world = World::new();
    let mut identity = IdentityService::new();
    let mut events = Vec::new();
    let intent = SpawnIntent::new(1, "Patrol");

    let mut ctx = SpawnContext {
        world: &mut world,
        identity: &mut identity,
        events: &mut events,
    };
    assert!(spawner.try_execute(&intent, &mut ctx));
    assert!(spawner.try_execute(&intent, &mut ctx));
    assert!(!spawner.try_execute(&intent, &mut ctx), "pool is full");
    assert!(!spawner.try_execute(&SpawnIntent::new(99, "Patrol"), &mut ctx));
    assert!(!spawner.try_execute(&SpawnIntent::new(1, "Miner"), &mut ctx));

    assert_eq!(identity.last_issued(EntityType::Ship), 2);
    let spawned: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            SimEvent::ShipSpawned { uid, .. } => Some(uid.id()),
            _ => None,
        })
        .collect();
    assert_eq!(spawned, vec![1, 2]);
}

struct NeverReady {
    attempts: Rc<Cell<u32>>,
}

impl SpawnExecutor for NeverReady {
    fn try_execute(&mut self, _intent: &SpawnIntent, _ctx: &mut SpawnContext<'_>) -> bool {
        self.attempts.set(self.attempts.get() + 1);
        false
    }
}

#[test]
fn test_engine_keeps_demand_when_executor_never_ready() {
    let config = SimConfig {
        systems: vec![quiet_system(1, "Patrol", 3, 0.0)],
        spawn: spawn_config(RequeuePlacement::Tail, None),
        ..SimConfig::default()
    };
    let attempts = Rc::new(Cell::new(0));
    let mut engine = SimulationEngine::with_executor(
        config,
        Box::new(NeverReady {
            attempts: Rc::clone(&attempts),
        }),
    )
    .unwrap();
    let keys = KeyboardState::new();

    let mut deferred = 0;
    for _ in 0..50 {
        let report = engine.tick(&keys).unwrap();
        deferred += report
            .events
            .iter()
            .filter(|e| matches!(e, SimEvent::SpawnDeferred { .. }))
            .count();
    }

    assert_eq!(engine.planner().queue_len(), 3, "no loss, no duplication");
    assert!(attempts.get() > 0);
    assert_eq!(deferred as u32, attempts.get());
    assert_eq!(engine.world().len(), 0);
}

#[test]
fn test_engine_drops_intent_after_retry_budget() {
    let mut system = quiet_system(1, "Patrol", 1, 0.0);
    // One intent, then nothing new for the rest of the test.
    system.quotas[0].interval_secs = 1_000.0;
    let config = SimConfig {
        systems: vec![system],
        spawn: spawn_config(RequeuePlacement::Tail, Some(3)),
        ..SimConfig::default()
    };
    let attempts = Rc::new(Cell::new(0));
    let mut engine = SimulationEngine::with_executor(
        config,
        Box::new(NeverReady {
            attempts: Rc::clone(&attempts),
        }),
    )
    .unwrap();
    let keys = KeyboardState::new();

    let mut outcomes = Vec::new();
    for _ in 0..6 {
        let report = engine.tick(&keys).unwrap();
        outcomes.extend(report.events.into_iter().filter_map(|e| match e {
            SimEvent::SpawnDeferred { attempts, .. } => Some(("deferred", attempts)),
            SimEvent::SpawnDropped { attempts, .. } => Some(("dropped", attempts)),
            _ => None,
        }));
    }

    assert_eq!(
        outcomes,
        vec![("deferred", 1), ("deferred", 2), ("dropped", 3)]
    );
    assert_eq!(attempts.get(), 3);
    assert_eq!(engine.planner().queue_len(), 0);
}

// ---- Targeting ----

struct Fleet {
    ids: IdentityService,
    ships: Vec<ShipRecord>,
}

impl Fleet {
    fn new() -> Self {
        Self {
            ids: IdentityService::new(),
            ships: Vec::new(),
        }
    }

    fn add(&mut self, faction: Faction, position: Vec3) -> Uid {
        let uid = self.ids.create(EntityType::Ship);
        self.ships.push(ShipRecord {
            uid,
            system_id: 1,
            role: "Patrol".into(),
            faction,
            position,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            health: 100.0,
            speed: 0.0,
            active: true,
        });
        uid
    }

    fn world(&self) -> WorldState {
        WorldState {
            tick: 0,
            systems: vec![StarSystemState {
                system_id: 1,
                ships: self.ships.clone(),
            }],
        }
    }
}

fn params(search_radius: f32, allow_friendly_fire: bool) -> TargetQueryParams {
    TargetQueryParams {
        search_radius,
        allow_friendly_fire,
    }
}

#[test]
fn test_targeting_absent_world_finds_nothing() {
    let mut fleet = Fleet::new();
    fleet.add(Faction::Terran, Vec3::ZERO);
    let source = fleet.ships[0].clone();
    assert!(try_acquire_nearest_target(None, &source, &params(100.0, true)).is_none());
}

#[test]
fn test_targeting_picks_nearest_hostile_with_slot() {
    let mut fleet = Fleet::new();
    fleet.add(Faction::Terran, Vec3::ZERO);
    fleet.add(Faction::Pirate, Vec3::new(50.0, 0.0, 0.0));
    let near = fleet.add(Faction::Pirate, Vec3::new(0.0, 20.0, 0.0));
    fleet.add(Faction::Kethri, Vec3::new(0.0, 0.0, 30.0));
    let world = fleet.world();

    let hit = try_acquire_nearest_target(Some(&world), &fleet.ships[0], &params(100.0, false)).unwrap();
    assert_eq!(hit.target.uid, near);
    assert_eq!(hit.slot_index, 2);
    assert!((hit.target.distance - 20.0).abs() < 1e-5);
}

#[test]
fn test_targeting_respects_radius() {
    let mut fleet = Fleet::new();
    fleet.add(Faction::Terran, Vec3::ZERO);
    fleet.add(Faction::Pirate, Vec3::new(150.0, 0.0, 0.0));
    let world = fleet.world();
    assert!(try_acquire_nearest_target(Some(&world), &fleet.ships[0], &params(100.0, false)).is_none());

    // Boundary is inclusive.
    assert!(try_acquire_nearest_target(Some(&world), &fleet.ships[0], &params(150.0, false)).is_some());
}

#[test]
fn test_targeting_rejects_invalid_radius() {
    let mut fleet = Fleet::new();
    fleet.add(Faction::Terran, Vec3::ZERO);
    fleet.add(Faction::Pirate, Vec3::new(5.0, 0.0, 0.0));
    let world = fleet.world();

    for radius in [-100.0, f32::NAN] {
        assert!(
            try_acquire_nearest_target(Some(&world), &fleet.ships[0], &params(radius, true)).is_none(),
            "radius {radius} must not match anything"
        );
    }
}

#[test]
fn test_targeting_only_friendlies_without_friendly_fire() {
    let mut fleet = Fleet::new();
    fleet.add(Faction::Terran, Vec3::ZERO);
    fleet.add(Faction::Terran, Vec3::new(10.0, 0.0, 0.0));
    let world = fleet.world();
    assert!(try_acquire_nearest_target(Some(&world), &fleet.ships[0], &params(100.0, false)).is_none());
}

#[test]
fn test_targeting_friendly_fire_prefers_closer_friendly() {
    let mut fleet = Fleet::new();
    fleet.add(Faction::Terran, Vec3::ZERO);
    fleet.add(Faction::Pirate, Vec3::new(80.0, 0.0, 0.0));
    let friendly = fleet.add(Faction::Terran, Vec3::new(10.0, 0.0, 0.0));
    let world = fleet.world();

    let hit = try_acquire_nearest_target(Some(&world), &fleet.ships[0], &params(100.0, true)).unwrap();
    assert_eq!(hit.target.uid, friendly);
}

#[test]
fn test_targeting_never_selects_self_or_inactive() {
    let mut fleet = Fleet::new();
    fleet.add(Faction::Terran, Vec3::ZERO);
    fleet.add(Faction::Pirate, Vec3::new(5.0, 0.0, 0.0));
    fleet.ships[1].active = false;
    let world = fleet.world();
    assert!(try_acquire_nearest_target(Some(&world), &fleet.ships[0], &params(100.0, true)).is_none());
}

#[test]
fn test_targeting_tie_breaks_on_lowest_uid() {
    let mut fleet = Fleet::new();
    fleet.add(Faction::Terran, Vec3::ZERO);
    let first = fleet.add(Faction::Pirate, Vec3::new(10.0, 0.0, 0.0));
    let second = fleet.add(Faction::Pirate, Vec3::new(-10.0, 0.0, 0.0));
    // Put the higher uid in the lower slot.
    fleet.ships.swap(1, 2);
    let world = fleet.world();

    let hit = try_acquire_nearest_target(Some(&world), &fleet.ships[0], &params(100.0, false)).unwrap();
    assert_eq!(hit.target.uid, first);
    assert_ne!(hit.target.uid, second);
    assert_eq!(hit.slot_index, 2);
}

#[test]
fn test_targeting_ignores_other_systems() {
    let mut fleet = Fleet::new();
    fleet.add(Faction::Terran, Vec3::ZERO);
    let mut world = fleet.world();
    let mut other = fleet.ships[0].clone();
    other.uid = fleet.ids.create(EntityType::Ship);
    other.system_id = 2;
    other.faction = Faction::Pirate;
    world.systems.push(StarSystemState {
        system_id: 2,
        ships: vec![other],
    });
    assert!(try_acquire_nearest_target(Some(&world), &fleet.ships[0], &params(100.0, true)).is_none());
}

#[test]
fn test_targeting_does_not_mutate_world() {
    let mut fleet = Fleet::new();
    fleet.add(Faction::Terran, Vec3::ZERO);
    fleet.add(Faction::Pirate, Vec3::new(5.0, 0.0, 0.0));
    let world = fleet.world();
    let before = world.clone();
    let _ = try_acquire_nearest_target(Some(&world), &fleet.ships[0], &params(100.0, false));
    assert_eq!(world, before);
}

// ---- Engine ----

#[test]
fn test_engine_spawns_and_publishes_substeps() {
    let mut engine = SimulationEngine::new(SimConfig::default()).unwrap();
    let keys = KeyboardState::new();

    let first = engine.tick(&keys).unwrap();
    assert_eq!(first.time.tick, 1);
    assert_eq!(first.ship_count, 2, "two spawns allowed per tick");
    assert_eq!(first.spawn_queue_len, 1);

    let second = engine.tick(&keys).unwrap();
    assert_eq!(second.ship_count, 3);

    let substeps = engine.config().substeps as usize;
    let published = engine.published_traces();
    assert_eq!(published.len(), 3);
    for (_, samples) in published.iter() {
        assert_eq!(samples.len(), substeps + 1);
        assert_eq!(samples[0].time_fraction, 0.0);
        assert_eq!(samples[substeps].time_fraction, 1.0);
        assert!(samples
            .windows(2)
            .all(|w| w[0].time_fraction <= w[1].time_fraction));
    }
}

#[test]
fn test_engine_identity_counters_are_per_engine() {
    let keys = KeyboardState::new();
    let mut a = SimulationEngine::new(SimConfig::default()).unwrap();
    let mut b = SimulationEngine::new(SimConfig::default()).unwrap();
    a.tick(&keys).unwrap();
    a.tick(&keys).unwrap();
    b.tick(&keys).unwrap();
    assert_eq!(a.identity().last_issued(EntityType::Ship), 3);
    assert_eq!(b.identity().last_issued(EntityType::Ship), 2);
}

#[test]
fn test_engine_determinism_same_seed() {
    let keys = KeyboardState::new();
    let mut engine_a = SimulationEngine::new(SimConfig {
        seed: 12345,
        ..Default::default()
    })
    .unwrap();
    let mut engine_b = SimulationEngine::new(SimConfig {
        seed: 12345,
        ..Default::default()
    })
    .unwrap();

    for _ in 0..300 {
        let report_a = engine_a.tick(&keys).unwrap();
        let report_b = engine_b.tick(&keys).unwrap();
        let json_a = serde_json::to_string(&report_a).unwrap();
        let json_b = serde_json::to_string(&report_b).unwrap();
        assert_eq!(json_a, json_b, "Reports diverged with same seed");
    }
    assert_eq!(
        serde_json::to_string(engine_a.world_state()).unwrap(),
        serde_json::to_string(engine_b.world_state()).unwrap()
    );
}

#[test]
fn test_engine_pause_via_key_binding() {
    let mut engine = SimulationEngine::new(SimConfig::default()).unwrap();
    let sink = engine.command_sink();
    engine
        .input()
        .subscribe(Key::F2, KeyHandler::new(move || sink.push(SimCommand::Pause)));

    let mut keys = KeyboardState::new();
    engine.tick(&keys).unwrap();

    press(&mut keys, Key::F2);
    let report = engine.tick(&keys).unwrap();
    assert_eq!(report.phase, GamePhase::Paused);
    assert_eq!(report.time.tick, 1, "pause applies before systems run");

    next_frame(&mut keys);
    engine.queue_command(SimCommand::Resume);
    let report = engine.tick(&keys).unwrap();
    assert_eq!(report.phase, GamePhase::Active);
    assert_eq!(report.time.tick, 2);
}

#[test]
fn test_engine_combat_disables_and_despawns() {
    let config = SimConfig {
        systems: vec![StarSystemConfig {
            id: 1,
            center: Vec3::ZERO,
            radius: 500.0,
            max_ships: 8,
            quotas: Vec::new(),
        }],
        targeting: TargetingConfig {
            weapon_dps: 6_000.0,
            ..TargetingConfig::default()
        },
        ..SimConfig::default()
    };
    let mut engine = SimulationEngine::new(config).unwrap();
    let terran = engine.spawn_test_ship(1, "Patrol", Faction::Terran, Vec3::ZERO);
    let pirate = engine.spawn_test_ship(1, "Raider", Faction::Pirate, Vec3::new(30.0, 0.0, 0.0));

    let report = engine.tick(&KeyboardState::new()).unwrap();
    for uid in [terran, pirate] {
        assert!(report.events.contains(&SimEvent::ShipDisabled { uid }));
        assert!(report.events.contains(&SimEvent::ShipDespawned { uid }));
    }
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, SimEvent::TargetAcquired { source, target, .. } if *source == terran && *target == pirate)));
    assert_eq!(report.ship_count, 0);
    // Disabled ships still appear in the tick they were disabled in.
    assert_eq!(report.traced_entities, 2);
}

#[test]
fn test_engine_shutdown_and_reset() {
    let mut engine = SimulationEngine::new(SimConfig::default()).unwrap();
    let keys = KeyboardState::new();
    engine.input().subscribe(Key::F1, KeyHandler::new(|| {}));
    for _ in 0..5 {
        engine.tick(&keys).unwrap();
    }
    assert!(!engine.published_traces().is_empty());

    engine.shutdown();
    assert_eq!(engine.phase(), GamePhase::Stopped);
    assert!(engine.published_traces().is_empty());
    assert_eq!(engine.world().len(), 0);
    assert!(!engine.input().is_registered(Key::F1));

    let report = engine.tick(&keys).unwrap();
    assert_eq!(report.time.tick, 0, "stopped engine does not advance");

    engine.queue_command(SimCommand::Reset);
    let report = engine.tick(&keys).unwrap();
    assert_eq!(report.phase, GamePhase::Active);
    assert_eq!(report.time.tick, 1);
    assert_eq!(engine.identity().last_issued(EntityType::Ship), 2);
}

#[test]
fn test_engine_rejects_invalid_config() {
    let config = SimConfig {
        substeps: 0,
        ..SimConfig::default()
    };
    assert!(SimulationEngine::new(config).is_err());
}
