//! The static agent registry.
//!
//! Static agents are immutable baseline objects created before any game
//! session begins. They act as a shared prototype layer: a generation's
//! object store falls back to the registry for any property its own ledger
//! has never touched.
//!
//! The registry is an explicit context object. Registration and mutation are
//! only allowed while the *static context* is open
//! ([`begin_static`](StaticRegistry::begin_static) /
//! [`end_static`](StaticRegistry::end_static)); during a game command the
//! registry is read-only and static agents are changed through the
//! generation's own ledger after activation.

use std::collections::BTreeMap;

use tracing::debug;

use crate::agent::{AgentDraft, AgentId, AgentRef};
use crate::value::Value;
use crate::SagaError;

// ---------------------------------------------------------------------------
// StaticAgent
// ---------------------------------------------------------------------------

/// A registered static agent: its id, kind, and default properties.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticAgent {
    /// Id assigned at registration.
    pub id: AgentId,
    /// Kind label copied from the draft.
    pub kind: String,
    /// Default property values. Agent values are stored as references.
    pub properties: BTreeMap<String, Value>,
}

// ---------------------------------------------------------------------------
// StaticRegistry
// ---------------------------------------------------------------------------

/// Process-wide table of static agents, passed explicitly to every
/// generation operation that needs the prototype layer.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    agents: BTreeMap<AgentId, StaticAgent>,
    last_id: u64,
    static_context: bool,
}

impl StaticRegistry {
    /// Create an empty registry with the static context closed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the static context; registration and mutation become legal.
    pub fn begin_static(&mut self) {
        self.static_context = true;
    }

    /// Close the static context.
    pub fn end_static(&mut self) {
        self.static_context = false;
    }

    /// Whether the static context is currently open.
    pub fn in_static_context(&self) -> bool {
        self.static_context
    }

    /// Drop every entry and restart ids at 1. Leaves the context flag closed.
    pub fn reset(&mut self) {
        self.agents.clear();
        self.last_id = 0;
        self.static_context = false;
    }

    fn require_static_context(&self, action: &str) -> Result<(), SagaError> {
        if self.static_context {
            Ok(())
        } else {
            Err(SagaError::InvalidState {
                reason: format!("cannot {action} outside the static context"),
            })
        }
    }

    /// Register a draft as a static agent and bind it to the new id.
    ///
    /// Nested unbound drafts inside the draft's properties are registered
    /// after the parent, in property order. Bound drafts and references must
    /// point at already registered static agents.
    ///
    /// # Errors
    ///
    /// - [`SagaError::InvalidState`] outside the static context, or if the
    ///   draft is already bound (registered or activated into a generation).
    /// - [`SagaError::NotFound`] if a property references an unknown agent.
    pub fn register(&mut self, draft: &mut AgentDraft) -> Result<AgentId, SagaError> {
        self.require_static_context("register a static agent")?;
        let mark = self.last_id;
        self.register_draft(draft).inspect_err(|_| self.rollback_to(mark))
    }

    fn register_draft(&mut self, draft: &mut AgentDraft) -> Result<AgentId, SagaError> {
        if let Some(id) = draft.bound_id() {
            return Err(SagaError::InvalidState {
                reason: format!("agent {id} is already bound and cannot be registered again"),
            });
        }

        self.last_id += 1;
        let id = AgentId(self.last_id);
        draft.bind(id);
        self.agents.insert(
            id,
            StaticAgent {
                id,
                kind: draft.kind().to_owned(),
                properties: BTreeMap::new(),
            },
        );

        let properties = match self.normalize(Value::Map(draft.properties().clone())) {
            Ok(Value::Map(properties)) => properties,
            Ok(_) => BTreeMap::new(),
            Err(e) => {
                draft.unbind();
                return Err(e);
            }
        };
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.properties = properties;
        }

        debug!(agent = %id, kind = draft.kind(), "registered static agent");
        Ok(id)
    }

    /// Drop every agent registered after `mark` and hand its ids out again.
    fn rollback_to(&mut self, mark: u64) {
        self.agents.retain(|id, _| id.0 <= mark);
        self.last_id = mark;
    }

    fn normalize(&mut self, value: Value) -> Result<Value, SagaError> {
        match value {
            Value::Draft(mut draft) => match draft.bound_id() {
                Some(id) => self.reference(id),
                None => Ok(Value::Agent(AgentRef::new(self.register_draft(&mut draft)?))),
            },
            Value::Agent(r) => self.reference(r.ref_id),
            Value::List(items) => items
                .into_iter()
                .map(|v| self.normalize(v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Value::Map(map) => map
                .into_iter()
                .map(|(k, v)| self.normalize(v).map(|v| (k, v)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Value::Map),
            other => Ok(other),
        }
    }

    fn reference(&self, id: AgentId) -> Result<Value, SagaError> {
        if self.agents.contains_key(&id) {
            Ok(Value::Agent(AgentRef::new(id)))
        } else {
            Err(SagaError::NotFound {
                what: format!("static agent {id}"),
            })
        }
    }

    /// Set a default property on a registered static agent.
    pub fn set_property(
        &mut self,
        id: AgentId,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<(), SagaError> {
        self.require_static_context("modify a static agent")?;
        self.agent(id)?;
        let mark = self.last_id;
        let value = self
            .normalize(value.into())
            .inspect_err(|_| self.rollback_to(mark))?;
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.properties.insert(key.to_owned(), value);
        }
        Ok(())
    }

    /// Remove a default property from a registered static agent.
    pub fn delete_property(&mut self, id: AgentId, key: &str) -> Result<(), SagaError> {
        self.require_static_context("modify a static agent")?;
        match self.agents.get_mut(&id) {
            Some(agent) => {
                agent.properties.remove(key);
                Ok(())
            }
            None => Err(SagaError::NotFound {
                what: format!("static agent {id}"),
            }),
        }
    }

    /// Look up a static agent.
    pub fn agent(&self, id: AgentId) -> Result<&StaticAgent, SagaError> {
        self.agents.get(&id).ok_or_else(|| SagaError::NotFound {
            what: format!("static agent {id}"),
        })
    }

    /// Whether `id` is a registered static agent.
    pub fn has_agent(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    /// Whether static agent `id` has a default for `key`. `false` for
    /// unknown agents.
    pub fn has_property(&self, id: AgentId, key: &str) -> bool {
        self.agents
            .get(&id)
            .is_some_and(|a| a.properties.contains_key(key))
    }

    /// The default value of `key` on static agent `id`.
    ///
    /// # Errors
    ///
    /// [`SagaError::NotFound`] if `id` is not a registered static agent.
    pub fn get_property(&self, id: AgentId, key: &str) -> Result<Option<&Value>, SagaError> {
        Ok(self.agent(id)?.properties.get(key))
    }

    /// The highest id handed out so far (`0` when empty).
    pub fn last_id(&self) -> AgentId {
        AgentId(self.last_id)
    }

    /// Number of registered static agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Returns `true` if no static agent is registered.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Iterate over static agents in id order.
    pub fn iter(&self) -> impl Iterator<Item = &StaticAgent> {
        self.agents.values()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
