//! Saga Engine -- events, deterministic randomness, and undoable generations.
//!
//! This crate builds on [`saga_core`] and [`saga_journal`] to run the game:
//! [`TrackedEvent`](event::TrackedEvent)s mutate a [`Generation`] through an
//! [`EventContext`](context::EventContext), every write and random draw is
//! journaled against the event that made it, and the lineage operations
//! (recycle and revert) build each command's generation from the last one.
//!
//! # Quick Start
//!
//! ```
//! use saga_engine::prelude::*;
//!
//! let mut session = Session::new();
//! let start = session.new_game(GameOptions::seeded("boop")).unwrap();
//!
//! let roll = TrackedEvent::new("roll", |ctx| {
//!     let n = ctx.random().int(1, 5)?;
//!     ctx.set(AgentId::ROOT, "roll", n)?;
//!     Ok(EventOutcome::Done)
//! });
//!
//! let next = session.run_command(&start, roll).unwrap();
//! let rolled = next.get_property(session.registry(), AgentId::ROOT, "roll").unwrap();
//! assert_eq!(rolled, Some(&Value::Int(3)));
//! ```

#![deny(unsafe_code)]

pub mod context;
pub mod engine;
pub mod event;
pub mod generation;
pub mod hash;
pub mod lineage;
pub mod logging;
pub mod options;
pub mod random;
pub mod replay;
pub mod session;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the core crate for convenience.
pub use saga_core;

/// Re-export the journal crate for convenience.
pub use saga_journal;

pub use generation::Generation;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use saga_core::prelude::*;
    pub use saga_journal::prelude::*;

    pub use crate::context::{AgentMut, EventContext};
    pub use crate::event::{noop, nq, EventOutcome, EventQueue, TrackedEvent};
    pub use crate::generation::Generation;
    pub use crate::logging::init_tracing;
    pub use crate::options::GameOptions;
    pub use crate::random::{Random, RandomStream, ALPHABET, ALPHANUMERIC, EXPANDED, NUMBERS};
    pub use crate::replay::{
        verify_replay, ReplayDivergence, ReplayEntry, ReplayLog, ReplayRecorder, ReplayResult,
    };
    pub use crate::session::Session;
}
