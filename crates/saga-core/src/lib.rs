//! Saga Core -- event-sourced agent ledgers with a static prototype layer.
//!
//! This crate provides the data model of the Saga state core. Every tracked
//! game object ("agent") has, per generation, an [`AgentManager`] ledger that
//! records each property mutation against the event that caused it. Static
//! agents registered up front in the [`StaticRegistry`] act as defaults that
//! a generation's [`ObjectStore`] falls back to.
//!
//! # Quick Start
//!
//! ```
//! use saga_core::prelude::*;
//!
//! let mut registry = StaticRegistry::new();
//! registry.begin_static();
//! let mut dummy = AgentDraft::new("dummy").with("name", "D1").with("health", 10);
//! let id = registry.register(&mut dummy).unwrap();
//! registry.end_static();
//!
//! let mut store = ObjectStore::new(&registry, TrackingMode::Full);
//! let stamp = EventStamp::new(EventId(1), "rename");
//! store.activate_static(&registry, id).unwrap();
//! store.set_property(&registry, id, "name", "Jeff", &stamp).unwrap();
//!
//! assert_eq!(store.get_property(&registry, id, "name").unwrap(), Some(&Value::from("Jeff")));
//! assert_eq!(registry.get_property(id, "name").unwrap(), Some(&Value::from("D1")));
//! ```

#![deny(unsafe_code)]

pub mod agent;
pub mod change;
pub mod ledger;
pub mod registry;
pub mod store;
pub mod value;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ledger, registry, event, and lineage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SagaError {
    /// The operation is not legal in the current state (static context
    /// closed, agent not activated, agent no longer live, draft already
    /// bound).
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },

    /// The operation is malformed regardless of state (bad random bounds,
    /// illegal queue composition, revert past the last event).
    #[error("invalid operation: {reason}")]
    InvalidOperation { reason: String },

    /// A referenced agent or event does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },
}

impl SagaError {
    /// Shorthand for [`SagaError::InvalidState`].
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        SagaError::InvalidState {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`SagaError::InvalidOperation`].
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        SagaError::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`SagaError::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        SagaError::NotFound { what: what.into() }
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::agent::{AgentDraft, AgentId, AgentRef};
    pub use crate::change::{ChangeOp, EventId, EventStamp, PropertyChange};
    pub use crate::ledger::{AgentManager, PropertyState, TrackingMode};
    pub use crate::registry::{StaticAgent, StaticRegistry};
    pub use crate::store::ObjectStore;
    pub use crate::value::Value;
    pub use crate::SagaError;
}

pub use agent::{AgentDraft, AgentId, AgentRef};
pub use change::{ChangeOp, EventId, EventStamp, PropertyChange};
pub use ledger::{AgentManager, TrackingMode};
pub use registry::StaticRegistry;
pub use store::ObjectStore;
pub use value::Value;

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
