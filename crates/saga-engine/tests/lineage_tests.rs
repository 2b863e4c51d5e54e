//! Integration tests for the command lineage: recycle, revert, undo, and
//! garbage collection at command boundaries.

use saga_engine::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn roll() -> TrackedEvent {
    TrackedEvent::new("roll", |ctx| {
        let n = ctx.random().int(1, 5)?;
        let mut rolls = ctx
            .get(AgentId::ROOT, "rolls")?
            .and_then(Value::as_list)
            .map(<[Value]>::to_vec)
            .unwrap_or_default();
        rolls.push(Value::Int(n));
        ctx.set(AgentId::ROOT, "rolls", rolls)?;
        Ok(EventOutcome::Done)
    })
}

fn rolls_of(session: &Session, generation: &Generation) -> Vec<i64> {
    generation
        .get_property(session.registry(), AgentId::ROOT, "rolls")
        .unwrap()
        .and_then(Value::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_int)
        .collect()
}

fn set_root(key: &'static str, value: i64) -> TrackedEvent {
    TrackedEvent::new("set_root", move |ctx| {
        ctx.set(AgentId::ROOT, key, value)?;
        Ok(EventOutcome::Done)
    })
}

/// A session with one static `Dummy` named "D1" with health 10.
fn dummy_session() -> (Session, AgentId) {
    let mut session = Session::new();
    session.begin_static().unwrap();
    let mut dummy = AgentDraft::new("dummy").with("name", "D1").with("health", 10);
    let id = session.register(&mut dummy).unwrap();
    session.end_static();
    (session, id)
}

// ---------------------------------------------------------------------------
// Random stream across commands
// ---------------------------------------------------------------------------

#[test]
fn boop_rolls_one_per_command() {
    let mut session = Session::new();
    let mut generation = session.new_game(GameOptions::seeded("boop")).unwrap();
    for _ in 0..5 {
        generation = session.run_command(&generation, roll()).unwrap();
    }
    assert_eq!(rolls_of(&session, &generation), vec![3, 2, 2, 3, 1]);
    assert_eq!(generation.random().count(), 5);
}

#[test]
fn undo_reproduces_the_same_roll() {
    let mut session = Session::new();
    let mut generation = session.new_game(GameOptions::seeded("boop")).unwrap();
    for _ in 0..5 {
        generation = session.run_command(&generation, roll()).unwrap();
    }
    let undone = session.undo(&generation).unwrap();
    assert_eq!(rolls_of(&session, &undone), vec![3, 2, 2, 3]);
    assert_eq!(undone.random().count(), 4);

    let again = session.run_command(&undone, roll()).unwrap();
    assert_eq!(rolls_of(&session, &again), vec![3, 2, 2, 3, 1]);
    assert_eq!(again.state_hash(session.registry()), generation.state_hash(session.registry()));
}

#[test]
fn revert_inside_a_command_rewinds_draws() {
    let mut session = Session::new();
    let start = session.new_game(GameOptions::seeded("boop")).unwrap();
    let burst = TrackedEvent::new("burst", |_ctx| {
        Ok(roll().then([roll(), roll(), roll(), roll()]).into())
    });
    let generation = session.run_command(&start, burst).unwrap();
    assert_eq!(rolls_of(&session, &generation), vec![3, 2, 2, 3, 1]);

    // Events: 1 burst, 2..=6 rolls. After event 3, two rolls have happened.
    let reverted = session.revert_to(&generation, EventId(3)).unwrap();
    assert_eq!(rolls_of(&session, &reverted), vec![3, 2]);
    assert_eq!(reverted.random().count(), 2);

    let mut replayed = reverted;
    for _ in 0..3 {
        replayed = session.run_command(&replayed, roll()).unwrap();
    }
    assert_eq!(rolls_of(&session, &replayed), vec![3, 2, 2, 3, 1]);
}

#[test]
fn same_seed_same_draws() {
    let mut session = Session::new();
    let a = session.new_game(GameOptions::seeded("lantern")).unwrap();
    let b = session.new_game(GameOptions::seeded("lantern")).unwrap();
    let draw = || {
        TrackedEvent::new("draw", |ctx| {
            let s = ctx.random().string(8, None)?;
            let d = ctx.random().decimal()?;
            ctx.set(AgentId::ROOT, "s", s)?;
            ctx.set(AgentId::ROOT, "d", d)?;
            Ok(EventOutcome::Done)
        })
    };
    let a = session.run_command(&a, draw()).unwrap();
    let b = session.run_command(&b, draw()).unwrap();
    assert_eq!(a.state_hash(session.registry()), b.state_hash(session.registry()));
    assert_eq!(
        a.journal().randoms().collect::<Vec<_>>(),
        b.journal().randoms().collect::<Vec<_>>()
    );
}

// ---------------------------------------------------------------------------
// Static agents
// ---------------------------------------------------------------------------

#[test]
fn dummy_revert_restores_static_defaults() {
    let (mut session, dummy) = dummy_session();
    let start = session.new_game(GameOptions::default()).unwrap();
    let before = session.run_command(&start, set_root("turn", 1)).unwrap();

    let rename = TrackedEvent::new("rename", move |ctx| {
        ctx.activate(dummy)?;
        ctx.agent(dummy).set("name", "Jeff")?.set("mood", "smug")?;
        Ok(EventOutcome::Done)
    });
    let after = session.run_command(&before, rename).unwrap();
    assert_eq!(
        after.get_property(session.registry(), dummy, "name").unwrap(),
        Some(&Value::from("Jeff"))
    );

    let reverted = session.revert_to(&after, before.last_event_id()).unwrap();
    let registry = session.registry();
    assert_eq!(reverted.get_property(registry, dummy, "name").unwrap(), Some(&Value::from("D1")));
    assert_eq!(reverted.get_property(registry, dummy, "health").unwrap(), Some(&Value::Int(10)));
    assert_eq!(reverted.get_property(registry, dummy, "mood").unwrap(), None);
    assert_eq!(registry.get_property(dummy, "name").unwrap(), Some(&Value::from("D1")));
}

#[test]
fn recycle_drops_values_equal_to_defaults() {
    let (mut session, dummy) = dummy_session();
    let start = session.new_game(GameOptions::default()).unwrap();
    let round_trip = TrackedEvent::new("round_trip", move |ctx| {
        let held = ctx.activate(dummy)?;
        ctx.set(AgentId::ROOT, "held", held)?;
        ctx.agent(dummy).set("name", "Jeff")?.set("name", "D1")?.delete("health")?;
        Ok(EventOutcome::Done)
    });
    let generation = session.run_command(&start, round_trip).unwrap();
    let next = session.start_command(&generation, None).unwrap();
    session.abort_command();

    let ledger = next.agent_manager(dummy).unwrap();
    assert!(ledger.history("name").is_empty());
    let health = ledger.history("health");
    assert_eq!(health.len(), 1);
    assert_eq!(health[0].op, ChangeOp::Deleted);
    assert_eq!(health[0].event_id, EventId::DEFAULT);
    assert_eq!(next.get_property(session.registry(), dummy, "health").unwrap(), None);
}

#[test]
fn unreferenced_static_agents_fall_back_to_defaults() {
    let (mut session, dummy) = dummy_session();
    let start = session.new_game(GameOptions::default()).unwrap();
    let rename = TrackedEvent::new("rename", move |ctx| {
        ctx.activate(dummy)?;
        ctx.agent(dummy).set("name", "Jeff")?;
        Ok(EventOutcome::Done)
    });
    let one = session.run_command(&start, rename).unwrap();
    let two = session.run_command(&one, set_root("x", 1)).unwrap();
    assert!(!two.store().is_active(dummy));
    assert_eq!(
        two.get_property(session.registry(), dummy, "name").unwrap(),
        Some(&Value::from("D1"))
    );
}

#[test]
fn registration_closed_during_play() {
    let (mut session, _) = dummy_session();
    let start = session.new_game(GameOptions::default()).unwrap();
    let generation = session.start_command(&start, None).unwrap();
    assert!(session.begin_static().is_err());
    let generation = session.finish_command(generation);
    assert!(session.register(&mut AgentDraft::new("late")).is_err());
    assert!(session.run_command(&generation, set_root("x", 1)).is_ok());
}

// ---------------------------------------------------------------------------
// Garbage collection
// ---------------------------------------------------------------------------

#[test]
fn unreachable_agents_are_scrubbed_at_the_next_command() {
    let mut session = Session::new();
    let start = session.new_game(GameOptions::default()).unwrap();

    let spawn = TrackedEvent::new("spawn", |ctx| {
        let mut bag = AgentDraft::new("bag").with("contents", vec![Value::from(AgentDraft::new("coin"))]);
        let bag = ctx.spawn(&mut bag)?;
        ctx.set(AgentId::ROOT, "bag", bag)?;
        Ok(EventOutcome::Done)
    });
    let one = session.run_command(&start, spawn).unwrap();
    let bag = one
        .get_property(session.registry(), AgentId::ROOT, "bag")
        .unwrap()
        .and_then(Value::as_agent)
        .unwrap();
    assert_eq!(one.store().len(), 3);

    let drop_bag = TrackedEvent::new("drop", |ctx| {
        ctx.delete(AgentId::ROOT, "bag")?;
        Ok(EventOutcome::Done)
    });
    let two = session.run_command(&one, drop_bag).unwrap();
    assert!(two.store().is_active(bag));

    let three = session.run_command(&two, set_root("x", 1)).unwrap();
    assert!(!three.store().is_active(bag));
    assert_eq!(three.store().len(), 1);
    let err = three.get_property(session.registry(), bag, "contents").unwrap_err();
    assert!(matches!(err, SagaError::InvalidState { .. }));
}

#[test]
fn spawned_ids_are_never_reused() {
    let mut session = Session::new();
    let start = session.new_game(GameOptions::default()).unwrap();
    let spawn = || {
        TrackedEvent::new("spawn", |ctx| {
            let coin = ctx.spawn(&mut AgentDraft::new("coin"))?;
            ctx.set(AgentId::ROOT, "coin", coin)?;
            Ok(EventOutcome::Done)
        })
    };
    let one = session.run_command(&start, spawn()).unwrap();
    let first = one.store().peek_next_id();
    let undone = session.undo(&one).unwrap();
    let again = session.run_command(&undone, spawn()).unwrap();
    let coin = again
        .get_property(session.registry(), AgentId::ROOT, "coin")
        .unwrap()
        .and_then(Value::as_agent)
        .unwrap();
    assert!(coin >= first);
}

// ---------------------------------------------------------------------------
// Minimal tracking
// ---------------------------------------------------------------------------

#[test]
fn minimal_tracking_limits_history_and_revert() {
    let mut session = Session::new();
    let options = GameOptions::from_json(r#"{ "seed": "quiet", "trackAgentChanges": false }"#).unwrap();
    let start = session.new_game(options).unwrap();
    let one = session.run_command(&start, set_root("x", 1)).unwrap();

    let churn = TrackedEvent::new("churn", |_ctx| {
        Ok(set_root("x", 2).then([set_root("x", 3), set_root("x", 4)]).into())
    });
    let two = session.run_command(&one, churn).unwrap();
    assert!(two.agent_manager(AgentId::ROOT).unwrap().history("x").len() <= 2);
    assert_eq!(
        two.get_property(session.registry(), AgentId::ROOT, "x").unwrap(),
        Some(&Value::Int(4))
    );

    let middle = EventId(two.last_event_id().0 - 1);
    let err = session.revert_to(&two, middle).unwrap_err();
    assert!(matches!(err, SagaError::InvalidOperation { .. }));

    let undone = session.undo(&two).unwrap();
    assert_eq!(
        undone.get_property(session.registry(), AgentId::ROOT, "x").unwrap(),
        Some(&Value::Int(1))
    );
}

#[test]
fn revert_past_the_last_event_fails() {
    let mut session = Session::new();
    let start = session.new_game(GameOptions::default()).unwrap();
    let one = session.run_command(&start, set_root("x", 1)).unwrap();
    let err = session.revert_to(&one, EventId(2)).unwrap_err();
    assert!(matches!(err, SagaError::InvalidOperation { .. }));
}

#[test]
fn new_options_on_recycle_keep_the_seed() {
    let mut session = Session::new();
    let start = session.new_game(GameOptions::seeded("boop")).unwrap();
    let changed = start
        .options()
        .with_overrides(&serde_json::json!({ "seed": "other", "trackAgentChanges": false, "difficulty": "hard" }))
        .unwrap();
    let next = session.start_command(&start, Some(&changed)).unwrap();
    let next = session.finish_command(next);
    assert_eq!(next.options().seed, "boop");
    assert!(!next.options().track_agent_changes);
    assert_eq!(next.options().extra["difficulty"], "hard");
}
