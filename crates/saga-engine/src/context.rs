//! The view an event handler gets of its generation.
//!
//! [`EventContext`] borrows the pieces of a [`Generation`](crate::Generation)
//! an event may touch, plus the event's own record. Every side effect made
//! through it is stamped with the executing event and appended to that record
//! in execution order: property changes from the object store, output line
//! ids, and random draws.

use saga_core::agent::{AgentDraft, AgentId, AgentRef};
use saga_core::change::{EventId, EventStamp};
use saga_core::registry::StaticRegistry;
use saga_core::store::ObjectStore;
use saga_core::value::Value;
use saga_core::SagaError;
use saga_journal::output::OutputLog;
use saga_journal::record::EventRecord;

use crate::random::{Random, RandomStream};

// ---------------------------------------------------------------------------
// EventContext
// ---------------------------------------------------------------------------

/// Mutable access to one generation for the duration of one event.
pub struct EventContext<'a> {
    registry: &'a StaticRegistry,
    store: &'a mut ObjectStore,
    random: &'a mut RandomStream,
    output: &'a mut OutputLog,
    record: &'a mut EventRecord,
    stamp: EventStamp,
}

impl<'a> EventContext<'a> {
    pub(crate) fn new(
        registry: &'a StaticRegistry,
        store: &'a mut ObjectStore,
        random: &'a mut RandomStream,
        output: &'a mut OutputLog,
        record: &'a mut EventRecord,
    ) -> Self {
        let stamp = EventStamp::new(record.id, record.name.clone());
        Self {
            registry,
            store,
            random,
            output,
            record,
            stamp,
        }
    }

    /// Id of the executing event.
    pub fn event_id(&self) -> EventId {
        self.stamp.id
    }

    /// Name of the executing event.
    pub fn event_name(&self) -> &str {
        &self.stamp.name
    }

    /// The event that scheduled this one, if any.
    pub fn caused_by(&self) -> Option<EventId> {
        self.record.caused_by
    }

    pub fn registry(&self) -> &StaticRegistry {
        self.registry
    }

    // -- reads ----------------------------------------------------------------

    /// Resolve `key` on agent `id`: ledger, then static default.
    pub fn get(&self, id: AgentId, key: &str) -> Result<Option<&Value>, SagaError> {
        self.store.get_property(self.registry, id, key)
    }

    pub fn has(&self, id: AgentId, key: &str) -> Result<bool, SagaError> {
        self.store.has_property(self.registry, id, key)
    }

    /// Follow an agent-valued property to the agent it references.
    pub fn follow(&self, id: AgentId, key: &str) -> Result<Option<AgentId>, SagaError> {
        Ok(self.get(id, key)?.and_then(Value::as_agent))
    }

    // -- writes ---------------------------------------------------------------

    /// Set `key` on agent `id`. Equal values are not recorded.
    pub fn set(&mut self, id: AgentId, key: &str, value: impl Into<Value>) -> Result<(), SagaError> {
        let changes = self
            .store
            .set_property(self.registry, id, key, value, &self.stamp)?;
        self.record.changes.extend(changes);
        Ok(())
    }

    /// Delete `key` from agent `id`. Absent properties are not recorded.
    pub fn delete(&mut self, id: AgentId, key: &str) -> Result<(), SagaError> {
        let changes = self
            .store
            .delete_property(self.registry, id, key, &self.stamp)?;
        self.record.changes.extend(changes);
        Ok(())
    }

    /// Handle for reading and writing one agent.
    pub fn agent(&mut self, id: AgentId) -> AgentMut<'_, 'a> {
        AgentMut { ctx: self, id }
    }

    /// Handle for the root "state" agent.
    pub fn root(&mut self) -> AgentMut<'_, 'a> {
        self.agent(AgentId::ROOT)
    }

    // -- activation -----------------------------------------------------------

    /// Activate a static agent so it can be modified in this generation.
    pub fn activate(&mut self, id: AgentId) -> Result<AgentRef, SagaError> {
        self.store.activate_static(self.registry, id)
    }

    /// Bind `draft` to a fresh instance agent and record its properties.
    /// A draft that is already bound resolves to its agent.
    pub fn spawn(&mut self, draft: &mut AgentDraft) -> Result<AgentRef, SagaError> {
        let (agent, changes) = self.store.activate_draft(self.registry, draft, &self.stamp)?;
        self.record.changes.extend(changes);
        Ok(agent)
    }

    // -- output and randomness ------------------------------------------------

    /// Append a line to the output sink. Returns its id.
    pub fn output(&mut self, kind: impl Into<String>, data: serde_json::Value) -> u64 {
        let line = self.output.write(kind, data);
        self.record.output.push(line.id);
        line.id
    }

    /// Draw handle recording into this event.
    pub fn random(&mut self) -> Random<'_> {
        Random::new(self.random, &mut self.record.randoms)
    }
}

// ---------------------------------------------------------------------------
// AgentMut
// ---------------------------------------------------------------------------

/// Accessor for one agent inside an event.
pub struct AgentMut<'c, 'a> {
    ctx: &'c mut EventContext<'a>,
    id: AgentId,
}

impl AgentMut<'_, '_> {
    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn get(&self, key: &str) -> Result<Option<&Value>, SagaError> {
        self.ctx.get(self.id, key)
    }

    pub fn has(&self, key: &str) -> Result<bool, SagaError> {
        self.ctx.has(self.id, key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<&mut Self, SagaError> {
        self.ctx.set(self.id, key, value)?;
        Ok(self)
    }

    pub fn delete(&mut self, key: &str) -> Result<&mut Self, SagaError> {
        self.ctx.delete(self.id, key)?;
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
