//! The boundary the embedding layer drives.
//!
//! A [`Session`] owns the [`StaticRegistry`] and sequences its two phases:
//! the static phase, where static agents are registered, and play, where
//! commands turn one [`Generation`] into the next.
//!
//! The static phase closes for good once the first game starts, so static
//! ids never overlap the instance ids games hand out.
//! [`reset_static`](Session::reset_static) reopens it.
//!
//! Each command works on a fresh generation recycled from the previous one
//! and scrubbed of unreachable agents. If the command fails, the fresh
//! generation is dropped and the caller still holds the previous one.
//!
//! ```
//! use saga_engine::prelude::*;
//!
//! let mut session = Session::new();
//! session.begin_static().unwrap();
//! let mut dummy = AgentDraft::new("dummy").with("name", "D1");
//! let dummy = session.register(&mut dummy).unwrap();
//! session.end_static();
//!
//! let start = session.new_game(GameOptions::seeded("boop")).unwrap();
//! let rename = TrackedEvent::new("rename", move |ctx| {
//!     ctx.activate(dummy)?;
//!     ctx.set(dummy, "name", "Jeff")?;
//!     Ok(EventOutcome::Done)
//! });
//! let next = session.run_command(&start, rename).unwrap();
//!
//! let name = next.get_property(session.registry(), dummy, "name").unwrap();
//! assert_eq!(name, Some(&Value::from("Jeff")));
//! let undone = session.undo(&next).unwrap();
//! let name = undone.get_property(session.registry(), dummy, "name").unwrap();
//! assert_eq!(name, Some(&Value::from("D1")));
//! ```

use saga_core::agent::{AgentDraft, AgentId};
use saga_core::change::EventId;
use saga_core::registry::StaticRegistry;
use saga_core::value::Value;
use saga_core::SagaError;
use tracing::{debug, info};

use crate::event::TrackedEvent;
use crate::generation::Generation;
use crate::options::GameOptions;

/// Static registry plus command sequencing.
#[derive(Debug, Default)]
pub struct Session {
    registry: StaticRegistry,
    command_active: bool,
    game_started: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &StaticRegistry {
        &self.registry
    }

    /// Whether a command is between [`start_command`](Self::start_command)
    /// and [`finish_command`](Self::finish_command).
    pub fn command_active(&self) -> bool {
        self.command_active
    }

    fn require_no_command(&self, action: &str) -> Result<(), SagaError> {
        if self.command_active {
            Err(SagaError::invalid_state(format!("cannot {action} while a command is active")))
        } else {
            Ok(())
        }
    }

    fn require_no_game(&self, action: &str) -> Result<(), SagaError> {
        if self.game_started {
            Err(SagaError::invalid_state(format!("cannot {action} after a game has started")))
        } else {
            Ok(())
        }
    }

    fn require_play(&self, action: &str) -> Result<(), SagaError> {
        if self.registry.in_static_context() {
            Err(SagaError::invalid_state(format!("cannot {action} during the static phase")))
        } else {
            Ok(())
        }
    }

    // -- static phase ---------------------------------------------------------

    /// Open the static phase.
    ///
    /// # Errors
    ///
    /// [`SagaError::InvalidState`] while a command is active, or once a
    /// game has started.
    pub fn begin_static(&mut self) -> Result<(), SagaError> {
        self.require_no_command("begin the static phase")?;
        self.require_no_game("begin the static phase")?;
        self.registry.begin_static();
        Ok(())
    }

    pub fn end_static(&mut self) {
        self.registry.end_static();
    }

    /// Register a static agent. Only legal in the static phase.
    pub fn register(&mut self, draft: &mut AgentDraft) -> Result<AgentId, SagaError> {
        self.require_no_game("register a static agent")?;
        self.registry.register(draft)
    }

    /// Set a static default. Only legal in the static phase.
    pub fn set_static_property(
        &mut self,
        id: AgentId,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<(), SagaError> {
        self.registry.set_property(id, key, value)
    }

    /// Remove a static default. Only legal in the static phase.
    pub fn delete_static_property(&mut self, id: AgentId, key: &str) -> Result<(), SagaError> {
        self.registry.delete_property(id, key)
    }

    /// Forget every static agent and reopen the static phase for a fresh
    /// setup. Generations from before the reset must not be used again.
    pub fn reset_static(&mut self) -> Result<(), SagaError> {
        self.require_no_command("reset the static registry")?;
        self.registry.reset();
        self.game_started = false;
        Ok(())
    }

    // -- play -----------------------------------------------------------------

    /// The first generation of a new game. Closes the static phase until
    /// the next [`reset_static`](Self::reset_static).
    pub fn new_game(&mut self, options: GameOptions) -> Result<Generation, SagaError> {
        self.require_play("start a game")?;
        if !self.game_started {
            info!(static_agents = self.registry.len(), "first game started, static phase closed");
        }
        self.game_started = true;
        Ok(Generation::new(&self.registry, options))
    }

    /// Begin a command: recycle `prev` and scrub unreachable agents.
    pub fn start_command(
        &mut self,
        prev: &Generation,
        options: Option<&GameOptions>,
    ) -> Result<Generation, SagaError> {
        self.require_play("start a command")?;
        self.require_no_command("start a command")?;
        let mut generation = prev.recycle(&self.registry, options);
        let removed = generation.scrub_agents(&self.registry);
        debug!(removed = removed.len(), "command started");
        self.command_active = true;
        Ok(generation)
    }

    /// Run `event` against the command's generation.
    pub fn invoke(
        &self,
        generation: &mut Generation,
        event: TrackedEvent,
    ) -> Result<Option<EventId>, SagaError> {
        if !self.command_active {
            return Err(SagaError::invalid_state("no command is active"));
        }
        generation.invoke(&self.registry, event)
    }

    /// End the command and hand back its generation.
    pub fn finish_command(&mut self, generation: Generation) -> Generation {
        self.command_active = false;
        generation
    }

    /// End the command without keeping its generation.
    pub fn abort_command(&mut self) {
        self.command_active = false;
    }

    /// Start a command on `prev`, run `event`, and finish. On error the new
    /// generation is discarded and `prev` stays the latest valid state.
    pub fn run_command(&mut self, prev: &Generation, event: TrackedEvent) -> Result<Generation, SagaError> {
        let mut generation = self.start_command(prev, None)?;
        match self.invoke(&mut generation, event) {
            Ok(_) => Ok(self.finish_command(generation)),
            Err(e) => {
                self.abort_command();
                info!(error = %e, "command aborted");
                Err(e)
            }
        }
    }

    /// Revert `prev` to the state right after event `to`.
    pub fn revert_to(&mut self, prev: &Generation, to: EventId) -> Result<Generation, SagaError> {
        self.require_play("revert")?;
        self.require_no_command("revert")?;
        let mut generation = prev.revert(&self.registry, to)?;
        generation.scrub_agents(&self.registry);
        Ok(generation)
    }

    /// Undo the command that produced `prev`.
    ///
    /// # Errors
    ///
    /// [`SagaError::InvalidOperation`] if `prev` ran no events.
    pub fn undo(&mut self, prev: &Generation) -> Result<Generation, SagaError> {
        let first = prev
            .journal()
            .first_event_id()
            .ok_or_else(|| SagaError::invalid_operation("nothing to undo: no events in this generation"))?;
        self.revert_to(prev, EventId(first.0 - 1))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
