//! Agent identifiers, by-id references, and unbound agent drafts.
//!
//! An [`AgentId`] is a plain 64-bit integer. Id `0` is reserved for the root
//! "state" agent of every generation; static agents are numbered from `1` in
//! registration order and instance agents continue after the last static id.
//! Ids are never reused within a lineage of generations.
//!
//! Agent-typed property values are never stored inline. They are replaced by
//! an [`AgentRef`] that is resolved against the current generation's object
//! store on read, which keeps cyclic object graphs representable.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

// ---------------------------------------------------------------------------
// AgentId
// ---------------------------------------------------------------------------

/// Identity of a tracked game object, unique within a lineage of generations.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u64);

impl AgentId {
    /// The root "state" agent present in every generation.
    pub const ROOT: AgentId = AgentId(0);

    /// Returns `true` for the root agent.
    #[inline]
    pub fn is_root(self) -> bool {
        self.0 == 0
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// The id immediately after this one.
    #[inline]
    pub fn next(self) -> AgentId {
        AgentId(self.0 + 1)
    }
}

impl fmt::Debug for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgentId({})", self.0)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AgentRef
// ---------------------------------------------------------------------------

/// A by-id pointer to another agent, stored in place of the agent itself.
///
/// Serializes as `{"refId": <id>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentRef {
    /// The referenced agent.
    #[serde(rename = "refId")]
    pub ref_id: AgentId,
}

impl AgentRef {
    /// Build a reference to `id`.
    pub fn new(id: AgentId) -> Self {
        Self { ref_id: id }
    }
}

impl From<AgentId> for AgentRef {
    fn from(id: AgentId) -> Self {
        Self::new(id)
    }
}

// ---------------------------------------------------------------------------
// AgentDraft
// ---------------------------------------------------------------------------

/// An agent object that has not been bound to an id yet.
///
/// A draft becomes a *static* agent through
/// [`StaticRegistry::register`](crate::registry::StaticRegistry::register), or
/// an *instance* agent when it is activated into a generation, either
/// explicitly or by storing it as another agent's property. Once bound, the
/// draft remembers its id; storing a bound draft again stores a reference to
/// the same agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDraft {
    kind: String,
    properties: BTreeMap<String, Value>,
    bound: Option<AgentId>,
}

impl AgentDraft {
    /// Create an empty draft of the given kind (e.g. `"dummy"`, `"room"`).
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            properties: BTreeMap::new(),
            bound: None,
        }
    }

    /// Builder-style property insertion.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set an initial property value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    /// The draft's kind label.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The initial properties, in key order.
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// The id this draft was bound to, if any.
    pub fn bound_id(&self) -> Option<AgentId> {
        self.bound
    }

    /// A reference to the bound agent, or `None` while unbound.
    pub fn agent_ref(&self) -> Option<AgentRef> {
        self.bound.map(AgentRef::new)
    }

    pub(crate) fn bind(&mut self, id: AgentId) {
        self.bound = Some(id);
    }

    pub(crate) fn unbind(&mut self) {
        self.bound = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
