//! Property changes and the event stamps they carry.
//!
//! A [`PropertyChange`] is the unit of the per-agent ledger: one write, one
//! deletion, or one seeded baseline value. Every change is stamped with the
//! id and name of the event that was executing when it happened, so that the
//! ledger can be replayed to any prior event.
//!
//! # Value semantics
//!
//! - **Added** (no value existed before): `init` is `None`, `final` is set.
//! - **Modified** (a value existed before): both `init` and `final` are set.
//! - **Deleted** (a value was removed): `init` is set, `final` is `None`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::value::Value;

// ---------------------------------------------------------------------------
// EventId
// ---------------------------------------------------------------------------

/// Identity of an executed event. Monotonically increasing along a lineage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl EventId {
    /// The sentinel id stamped on baseline values seeded by a recycle.
    pub const DEFAULT: EventId = EventId(0);

    /// The id immediately after this one.
    #[inline]
    pub fn next(self) -> EventId {
        EventId(self.0 + 1)
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EventStamp
// ---------------------------------------------------------------------------

/// The id and name of the event a change is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStamp {
    /// Id of the executing event.
    pub id: EventId,
    /// Name of the executing event.
    pub name: String,
}

impl EventStamp {
    /// Name used for the [`EventId::DEFAULT`] stamp.
    pub const DEFAULT_NAME: &'static str = "DEFAULT";

    /// Build a stamp for an executing event.
    pub fn new(id: EventId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// The sentinel stamp used for seeded baseline values.
    pub fn default_event() -> Self {
        Self::new(EventId::DEFAULT, Self::DEFAULT_NAME)
    }
}

// ---------------------------------------------------------------------------
// ChangeOp
// ---------------------------------------------------------------------------

/// What kind of mutation a [`PropertyChange`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeOp {
    /// The property had no value before.
    Added,
    /// The property had a value and now has a different one.
    Modified,
    /// The property's value was removed.
    Deleted,
}

// ---------------------------------------------------------------------------
// PropertyChange
// ---------------------------------------------------------------------------

/// A single recorded property mutation.
///
/// Serializes as
/// `{eventId, eventName, agentId, property, op, init?, final?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyChange {
    /// Id of the event that produced the change.
    pub event_id: EventId,
    /// Name of the event that produced the change.
    pub event_name: String,
    /// The agent whose property changed.
    pub agent_id: AgentId,
    /// The property name.
    pub property: String,
    /// Kind of mutation.
    pub op: ChangeOp,
    /// Value before the change, `None` (`null` on the wire) if there was none.
    #[serde(default)]
    pub init: Option<Value>,
    /// Value after the change, `None` (`null` on the wire) for deletions.
    #[serde(rename = "final", default)]
    pub final_value: Option<Value>,
}

impl PropertyChange {
    /// Build a change stamped with `stamp`.
    pub fn new(
        stamp: &EventStamp,
        agent_id: AgentId,
        property: impl Into<String>,
        op: ChangeOp,
        init: Option<Value>,
        final_value: Option<Value>,
    ) -> Self {
        Self {
            event_id: stamp.id,
            event_name: stamp.name.clone(),
            agent_id,
            property: property.into(),
            op,
            init,
            final_value,
        }
    }

    /// Returns `true` if this change removed the property.
    pub fn is_deletion(&self) -> bool {
        self.op == ChangeOp::Deleted
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
