//! Command replay with state hash verification.
//!
//! A [`ReplayRecorder`] captures the state hash of a starting generation and
//! the hash reached after every command, producing a serializable
//! [`ReplayLog`]. [`verify_replay`] re-runs the same commands from a starting
//! generation (typically one produced by a revert) and reports the first
//! command whose resulting state differs from the log.
//!
//! Events are closures and cannot be serialized, so the caller supplies the
//! commands again at verification time; the log only names them.

use saga_core::registry::StaticRegistry;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::event::TrackedEvent;
use crate::generation::Generation;
use crate::session::Session;

// ---------------------------------------------------------------------------
// ReplayLog
// ---------------------------------------------------------------------------

/// Hashes of a recorded command sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayLog {
    /// State hash of the generation recording started from.
    pub initial_hash: String,
    /// One entry per command, in execution order.
    pub entries: Vec<ReplayEntry>,
}

/// One recorded command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayEntry {
    /// Position in the command sequence.
    pub index: usize,
    /// Name of the command's root event.
    pub command: String,
    /// State hash after the command finished.
    pub state_hash: String,
}

// ---------------------------------------------------------------------------
// ReplayResult
// ---------------------------------------------------------------------------

/// Outcome of [`verify_replay`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayResult {
    /// Whether every command ran and matched.
    pub completed: bool,
    pub commands_replayed: usize,
    /// The first command whose resulting hash did not match.
    pub first_divergence: Option<ReplayDivergence>,
}

/// A command whose replayed state differs from the recorded one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayDivergence {
    pub index: usize,
    pub command: String,
    pub expected_hash: String,
    pub actual_hash: String,
}

// ---------------------------------------------------------------------------
// ReplayRecorder
// ---------------------------------------------------------------------------

/// Records command hashes into a [`ReplayLog`].
pub struct ReplayRecorder {
    log: ReplayLog,
}

impl ReplayRecorder {
    /// Start recording from `start`.
    pub fn new(registry: &StaticRegistry, start: &Generation) -> Self {
        Self {
            log: ReplayLog {
                initial_hash: start.state_hash(registry),
                entries: Vec::new(),
            },
        }
    }

    /// Record that `command` produced `after`.
    pub fn record(&mut self, registry: &StaticRegistry, command: &TrackedEvent, after: &Generation) {
        let index = self.log.entries.len();
        self.log.entries.push(ReplayEntry {
            index,
            command: command.name().to_owned(),
            state_hash: after.state_hash(registry),
        });
    }

    pub fn len(&self) -> usize {
        self.log.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.entries.is_empty()
    }

    pub fn finish(self) -> ReplayLog {
        self.log
    }
}

// ---------------------------------------------------------------------------
// verify_replay
// ---------------------------------------------------------------------------

/// Re-run `commands` from `start` through `session` and compare each
/// resulting state hash with `log`.
///
/// Replay stops at the first divergence and reports it.
///
/// # Errors
///
/// Returns an error if the command list does not match the log (length or
/// names), if `start` is not the state the log was recorded from, or if a
/// command fails. All validation happens before any command runs.
pub fn verify_replay(
    session: &mut Session,
    start: &Generation,
    commands: &[TrackedEvent],
    log: &ReplayLog,
) -> Result<ReplayResult, anyhow::Error> {
    if commands.len() != log.entries.len() {
        return Err(anyhow::anyhow!(
            "replay log has {} commands but {} were supplied",
            log.entries.len(),
            commands.len()
        ));
    }
    for (entry, command) in log.entries.iter().zip(commands) {
        if entry.command != command.name() {
            return Err(anyhow::anyhow!(
                "command {} is '{}' in the replay log but '{}' was supplied",
                entry.index,
                entry.command,
                command.name()
            ));
        }
    }
    let start_hash = start.state_hash(session.registry());
    if start_hash != log.initial_hash {
        return Err(anyhow::anyhow!(
            "starting state {start_hash} does not match the recorded initial state {}",
            log.initial_hash
        ));
    }

    let mut current = start.clone();
    let mut commands_replayed = 0;
    for (entry, command) in log.entries.iter().zip(commands) {
        current = session
            .run_command(&current, command.clone())
            .map_err(|e| anyhow::anyhow!("command {} ('{}') failed during replay: {e}", entry.index, entry.command))?;
        commands_replayed += 1;

        let actual_hash = current.state_hash(session.registry());
        if actual_hash != entry.state_hash {
            warn!(index = entry.index, command = %entry.command, "replay diverged");
            return Ok(ReplayResult {
                completed: false,
                commands_replayed,
                first_divergence: Some(ReplayDivergence {
                    index: entry.index,
                    command: entry.command.clone(),
                    expected_hash: entry.state_hash.clone(),
                    actual_hash,
                }),
            });
        }
    }

    Ok(ReplayResult {
        completed: true,
        commands_replayed,
        first_divergence: None,
    })
}
