//! Integration tests for replay verification.
//!
//! These tests record a command sequence with [`ReplayRecorder`], revert,
//! and check that [`verify_replay`] reproduces the recorded states or
//! reports the first divergence.

use saga_engine::prelude::*;

// ---------------------------------------------------------------------------
// Test commands
// ---------------------------------------------------------------------------

/// Rolls a die and spawns a "monster" agent with that much health.
fn encounter() -> TrackedEvent {
    TrackedEvent::new("encounter", |ctx| {
        let health = ctx.random().int(1, 20)?;
        let mut monster = AgentDraft::new("monster").with("health", health);
        let monster = ctx.spawn(&mut monster)?;
        ctx.set(AgentId::ROOT, "foe", monster)?;
        Ok(EventOutcome::Done)
    })
}

/// Hits the current foe for a random amount.
fn attack() -> TrackedEvent {
    TrackedEvent::new("attack", |ctx| {
        let Some(foe) = ctx.follow(AgentId::ROOT, "foe")? else {
            return Ok(EventOutcome::Done);
        };
        let damage = ctx.random().int(1, 6)?;
        let health = ctx.get(foe, "health")?.and_then(Value::as_int).unwrap_or(0);
        ctx.set(foe, "health", (health - damage).max(0))?;
        Ok(EventOutcome::Done)
    })
}

/// Same name as [`attack`], but drops the foe straight to zero health.
fn rigged_attack() -> TrackedEvent {
    TrackedEvent::new("attack", |ctx| {
        if let Some(foe) = ctx.follow(AgentId::ROOT, "foe")? {
            ctx.set(foe, "health", 0)?;
        }
        Ok(EventOutcome::Done)
    })
}

fn script() -> Vec<TrackedEvent> {
    vec![encounter(), attack(), attack(), encounter(), attack()]
}

/// Run `commands` from `start`, recording each resulting state.
fn record(session: &mut Session, start: &Generation, commands: &[TrackedEvent]) -> (Generation, ReplayLog) {
    let mut recorder = ReplayRecorder::new(session.registry(), start);
    let mut current = start.clone();
    for command in commands {
        current = session.run_command(&current, command.clone()).unwrap();
        recorder.record(session.registry(), command, &current);
    }
    assert_eq!(recorder.len(), commands.len());
    (current, recorder.finish())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn replay_from_the_same_start_matches() {
    let mut session = Session::new();
    let start = session.new_game(GameOptions::seeded("boop")).unwrap();
    let (_, log) = record(&mut session, &start, &script());

    let result = verify_replay(&mut session, &start, &script(), &log).unwrap();
    assert!(result.completed);
    assert_eq!(result.commands_replayed, 5);
    assert!(result.first_divergence.is_none());
}

#[test]
fn replay_after_undo_matches() {
    let mut session = Session::new();
    let start = session.new_game(GameOptions::seeded("boop")).unwrap();
    let opening = session.run_command(&start, encounter()).unwrap();
    let (_, log) = record(&mut session, &opening, &script()[1..]);

    // Undoing the first recorded command lands back on the opening state,
    // with fresh ids for anything spawned from here on.
    let first = session.run_command(&opening, attack()).unwrap();
    let rewound = session.undo(&first).unwrap();
    assert_eq!(
        rewound.state_hash(session.registry()),
        opening.state_hash(session.registry())
    );

    let result = verify_replay(&mut session, &rewound, &script()[1..], &log).unwrap();
    assert!(result.completed, "diverged: {:?}", result.first_divergence);
}

#[test]
fn divergence_is_reported_at_the_first_differing_command() {
    let mut session = Session::new();
    let start = session.new_game(GameOptions::seeded("boop")).unwrap();
    let (_, log) = record(&mut session, &start, &script());

    let mut tampered = script();
    tampered[2] = rigged_attack();
    let result = verify_replay(&mut session, &start, &tampered, &log).unwrap();
    assert!(!result.completed);
    assert_eq!(result.commands_replayed, 3);
    let divergence = result.first_divergence.unwrap();
    assert_eq!(divergence.index, 2);
    assert_eq!(divergence.command, "attack");
    assert_ne!(divergence.expected_hash, divergence.actual_hash);
}

#[test]
fn mismatched_commands_are_rejected_before_running() {
    let mut session = Session::new();
    let start = session.new_game(GameOptions::seeded("boop")).unwrap();
    let (_, log) = record(&mut session, &start, &script());

    assert!(verify_replay(&mut session, &start, &script()[..4], &log).is_err());

    let mut renamed = script();
    renamed[0] = attack();
    assert!(verify_replay(&mut session, &start, &renamed, &log).is_err());
}

#[test]
fn wrong_starting_state_is_rejected() {
    let mut session = Session::new();
    let start = session.new_game(GameOptions::seeded("boop")).unwrap();
    let (end, log) = record(&mut session, &start, &script());
    let err = verify_replay(&mut session, &end, &script(), &log).unwrap_err();
    assert!(err.to_string().contains("does not match"));
}

#[test]
fn log_roundtrips_through_json() {
    let mut session = Session::new();
    let start = session.new_game(GameOptions::seeded("boop")).unwrap();
    let (_, log) = record(&mut session, &start, &script()[..2]);

    let json = serde_json::to_string_pretty(&log).unwrap();
    assert!(json.contains("initialHash"));
    assert!(json.contains("stateHash"));
    let back: ReplayLog = serde_json::from_str(&json).unwrap();
    assert_eq!(back, log);
}
