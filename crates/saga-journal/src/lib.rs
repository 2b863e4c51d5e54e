//! Saga Journal - event records and the per-generation causality graph.
//!
//! # Modules
//!
//! - [`record`]: [`EventRecord`](record::EventRecord),
//!   [`RandomRecord`](record::RandomRecord), and
//!   [`OutputLine`](record::OutputLine) with their camelCase wire formats.
//! - [`journal`]: the [`EventJournal`](journal::EventJournal) holding one
//!   generation's records, with causality and change queries.
//! - [`output`]: the append-only [`OutputLog`](output::OutputLog) sink.

#![deny(unsafe_code)]

pub mod journal;
pub mod output;
pub mod record;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::journal::EventJournal;
    pub use crate::output::OutputLog;
    pub use crate::record::{EventRecord, OutputLine, RandomRecord};
}
