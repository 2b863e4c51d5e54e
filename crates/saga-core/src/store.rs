//! The per-generation object store.
//!
//! An [`ObjectStore`] owns one [`AgentManager`] per live agent of a
//! generation and resolves every read with an explicit two-step lookup:
//! the agent's own ledger first, then the [`StaticRegistry`] defaults.
//!
//! # Writes
//!
//! Every write computes the property's current value and is a no-op when the
//! new value is equal. Otherwise it is classified as `ADDED` (no current
//! value) or `MODIFIED`, stamped with the executing event, pushed to the
//! front of the property's history, and returned to the caller so the event
//! engine can attach it to the active event record.
//!
//! Agent-typed values are stored as [`AgentRef`]s. Storing an unactivated
//! static agent activates it; storing an unbound [`AgentDraft`] binds it to a
//! fresh id and records its initial properties under the same event.
//!
//! # Garbage collection
//!
//! [`scrub_agents`](ObjectStore::scrub_agents) walks references breadth-first
//! from the root agent and drops every ledger that was not reached. It must
//! run exactly once per command boundary, after recycling and before the next
//! command mutates state; scrubbing in the middle of a command would drop
//! agents whose references are still being assembled.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, info, trace};

use crate::agent::{AgentDraft, AgentId, AgentRef};
use crate::change::{ChangeOp, EventId, EventStamp, PropertyChange};
use crate::ledger::{AgentManager, PropertyState, TrackingMode};
use crate::registry::StaticRegistry;
use crate::value::Value;
use crate::SagaError;

/// Kind label of the root agent.
pub const ROOT_KIND: &str = "state";

// ---------------------------------------------------------------------------
// ObjectStore
// ---------------------------------------------------------------------------

/// All agent ledgers of one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectStore {
    managers: BTreeMap<AgentId, AgentManager>,
    /// Next instance id to hand out, before clamping past the static ids.
    next_id: u64,
    tracking: TrackingMode,
}

impl ObjectStore {
    /// Create a store containing only the root agent.
    pub fn new(registry: &StaticRegistry, tracking: TrackingMode) -> Self {
        let mut managers = BTreeMap::new();
        managers.insert(AgentId::ROOT, AgentManager::new(AgentId::ROOT, ROOT_KIND, false));
        Self {
            managers,
            next_id: registry.last_id().0 + 1,
            tracking,
        }
    }

    /// The history depth this store records with.
    pub fn tracking(&self) -> TrackingMode {
        self.tracking
    }

    /// Reserve a fresh instance id. Ids are never handed out twice.
    pub fn reserve_new_id(&mut self, registry: &StaticRegistry) -> AgentId {
        let id = self.next_id.max(registry.last_id().0 + 1);
        self.next_id = id + 1;
        AgentId(id)
    }

    /// The next id [`reserve_new_id`](Self::reserve_new_id) would consider.
    pub fn peek_next_id(&self) -> AgentId {
        AgentId(self.next_id)
    }

    // -- access -------------------------------------------------------------

    fn inactive(&self, registry: &StaticRegistry, id: AgentId) -> SagaError {
        if registry.has_agent(id) {
            SagaError::InvalidState {
                reason: format!("static agent {id} must be activated before it is modified"),
            }
        } else if id.0 < self.next_id {
            SagaError::InvalidState {
                reason: format!("agent {id} is not active in this generation"),
            }
        } else {
            SagaError::NotFound {
                what: format!("agent {id}"),
            }
        }
    }

    /// Whether `id` has a ledger in this generation.
    pub fn is_active(&self, id: AgentId) -> bool {
        self.managers.contains_key(&id)
    }

    /// Whether `id` can be read: active here, or a registered static agent.
    pub fn is_readable(&self, registry: &StaticRegistry, id: AgentId) -> bool {
        self.is_active(id) || registry.has_agent(id)
    }

    /// The ledger of `id`, if active.
    pub fn agent_manager(&self, id: AgentId) -> Option<&AgentManager> {
        self.managers.get(&id)
    }

    /// Every ledger, in id order.
    pub fn agent_managers(&self) -> impl Iterator<Item = &AgentManager> {
        self.managers.values()
    }

    /// Number of active agents, root included.
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    /// Always `false`: the root agent is always present.
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    // -- reads --------------------------------------------------------------

    /// Resolve `key` on agent `id`: ledger, then static default.
    ///
    /// Returns `Ok(None)` when the property is absent or deleted.
    ///
    /// # Errors
    ///
    /// [`SagaError::InvalidState`] for instance agents that are not active in
    /// this generation, [`SagaError::NotFound`] for ids nobody knows.
    pub fn get_property<'a>(
        &'a self,
        registry: &'a StaticRegistry,
        id: AgentId,
        key: &str,
    ) -> Result<Option<&'a Value>, SagaError> {
        match self.managers.get(&id) {
            Some(manager) => match manager.lookup(key) {
                PropertyState::Set(v) => Ok(Some(v)),
                PropertyState::Deleted => Ok(None),
                PropertyState::Untouched if manager.is_static() => {
                    registry.get_property(id, key)
                }
                PropertyState::Untouched => Ok(None),
            },
            None if registry.has_agent(id) => registry.get_property(id, key),
            None => Err(self.inactive(registry, id)),
        }
    }

    /// Whether `key` currently resolves to a value on `id`.
    pub fn has_property(
        &self,
        registry: &StaticRegistry,
        id: AgentId,
        key: &str,
    ) -> Result<bool, SagaError> {
        Ok(self.get_property(registry, id, key)?.is_some())
    }

    /// Every property name visible on `id` (ledger and static defaults),
    /// excluding deleted ones, in key order.
    pub fn property_names(
        &self,
        registry: &StaticRegistry,
        id: AgentId,
    ) -> Result<Vec<String>, SagaError> {
        let mut names = BTreeSet::new();
        if let Ok(agent) = registry.agent(id) {
            names.extend(agent.properties.keys().cloned());
        }
        match self.managers.get(&id) {
            Some(manager) => names.extend(manager.property_names().map(str::to_owned)),
            None if registry.has_agent(id) => {}
            None => return Err(self.inactive(registry, id)),
        }
        let mut visible = Vec::with_capacity(names.len());
        for name in names {
            if self.get_property(registry, id, &name)?.is_some() {
                visible.push(name);
            }
        }
        Ok(visible)
    }

    // -- activation ---------------------------------------------------------

    /// Activate a static agent into this generation. Idempotent.
    pub fn activate_static(
        &mut self,
        registry: &StaticRegistry,
        id: AgentId,
    ) -> Result<AgentRef, SagaError> {
        if self.managers.contains_key(&id) {
            return Ok(AgentRef::new(id));
        }
        let agent = registry.agent(id).map_err(|_| self.inactive(registry, id))?;
        self.managers
            .insert(id, AgentManager::new(id, agent.kind.clone(), true));
        debug!(agent = %id, kind = %agent.kind, "activated static agent");
        Ok(AgentRef::new(id))
    }

    /// Activate a draft. Unbound drafts get a fresh instance id and their
    /// initial properties are recorded under `stamp`; bound drafts resolve to
    /// their existing agent (activating it if it is static).
    pub fn activate_draft(
        &mut self,
        registry: &StaticRegistry,
        draft: &mut AgentDraft,
        stamp: &EventStamp,
    ) -> Result<(AgentRef, Vec<PropertyChange>), SagaError> {
        let mut changes = Vec::new();
        let r = self.bind_draft(registry, draft, stamp, &mut changes)?;
        Ok((r, changes))
    }

    fn bind_draft(
        &mut self,
        registry: &StaticRegistry,
        draft: &mut AgentDraft,
        stamp: &EventStamp,
        changes: &mut Vec<PropertyChange>,
    ) -> Result<AgentRef, SagaError> {
        if let Some(id) = draft.bound_id() {
            return self.ensure_active(registry, id);
        }
        let id = self.reserve_new_id(registry);
        draft.bind(id);
        self.managers
            .insert(id, AgentManager::new(id, draft.kind(), false));
        debug!(agent = %id, kind = draft.kind(), event = %stamp.id, "activated instance agent");

        for (key, value) in draft.properties().clone() {
            self.write(registry, id, &key, value, stamp, changes)?;
        }
        Ok(AgentRef::new(id))
    }

    fn ensure_active(&mut self, registry: &StaticRegistry, id: AgentId) -> Result<AgentRef, SagaError> {
        if self.managers.contains_key(&id) {
            Ok(AgentRef::new(id))
        } else if registry.has_agent(id) {
            self.activate_static(registry, id)
        } else {
            Err(self.inactive(registry, id))
        }
    }

    /// Replace every agent-typed value by a reference to an active agent.
    fn normalize(
        &mut self,
        registry: &StaticRegistry,
        value: Value,
        stamp: &EventStamp,
        changes: &mut Vec<PropertyChange>,
    ) -> Result<Value, SagaError> {
        match value {
            Value::Agent(r) => self.ensure_active(registry, r.ref_id).map(Value::Agent),
            Value::Draft(mut draft) => self
                .bind_draft(registry, &mut draft, stamp, changes)
                .map(Value::Agent),
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.normalize(registry, item, stamp, changes)?);
                }
                Ok(Value::List(out))
            }
            Value::Map(map) => {
                let mut out = BTreeMap::new();
                for (k, v) in map {
                    out.insert(k, self.normalize(registry, v, stamp, changes)?);
                }
                Ok(Value::Map(out))
            }
            other => Ok(other),
        }
    }

    // -- writes -------------------------------------------------------------

    /// Set `key` on agent `id`, returning every change recorded (the write
    /// itself plus any draft activations it caused). Empty when the write is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// [`SagaError::InvalidState`] if `id` is an unactivated static agent or
    /// an inactive instance agent; [`SagaError::NotFound`] for unknown ids or
    /// references to unknown agents.
    pub fn set_property(
        &mut self,
        registry: &StaticRegistry,
        id: AgentId,
        key: &str,
        value: impl Into<Value>,
        stamp: &EventStamp,
    ) -> Result<Vec<PropertyChange>, SagaError> {
        let mut changes = Vec::new();
        self.write(registry, id, key, value.into(), stamp, &mut changes)?;
        Ok(changes)
    }

    fn write(
        &mut self,
        registry: &StaticRegistry,
        id: AgentId,
        key: &str,
        value: Value,
        stamp: &EventStamp,
        changes: &mut Vec<PropertyChange>,
    ) -> Result<(), SagaError> {
        if !self.managers.contains_key(&id) {
            return Err(self.inactive(registry, id));
        }
        let value = self.normalize(registry, value, stamp, changes)?;
        let current = self.get_property(registry, id, key)?.cloned();
        if current.as_ref() == Some(&value) {
            trace!(agent = %id, property = key, "write is a no-op");
            return Ok(());
        }

        let op = if current.is_some() {
            ChangeOp::Modified
        } else {
            ChangeOp::Added
        };
        let change = PropertyChange::new(stamp, id, key, op, current, Some(value));
        self.record(change, changes);
        Ok(())
    }

    /// Delete `key` from agent `id`. A no-op (empty result) when the property
    /// has no current value.
    pub fn delete_property(
        &mut self,
        registry: &StaticRegistry,
        id: AgentId,
        key: &str,
        stamp: &EventStamp,
    ) -> Result<Vec<PropertyChange>, SagaError> {
        if !self.managers.contains_key(&id) {
            return Err(self.inactive(registry, id));
        }
        let mut changes = Vec::new();
        let Some(current) = self.get_property(registry, id, key)?.cloned() else {
            trace!(agent = %id, property = key, "delete of absent property is a no-op");
            return Ok(changes);
        };
        let change = PropertyChange::new(stamp, id, key, ChangeOp::Deleted, Some(current), None);
        self.record(change, &mut changes);
        Ok(changes)
    }

    fn record(&mut self, change: PropertyChange, changes: &mut Vec<PropertyChange>) {
        trace!(
            agent = %change.agent_id,
            property = %change.property,
            op = ?change.op,
            event = %change.event_id,
            "recorded property change"
        );
        if let Some(manager) = self.managers.get_mut(&change.agent_id) {
            manager.record(change.clone(), self.tracking);
            changes.push(change);
        }
    }

    // -- garbage collection -------------------------------------------------

    /// Every agent reachable from the root, including static agents reached
    /// only through defaults.
    pub fn reachable(&self, registry: &StaticRegistry) -> BTreeSet<AgentId> {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        visited.insert(AgentId::ROOT);
        queue.push_back(AgentId::ROOT);

        while let Some(id) = queue.pop_front() {
            for next in self.outgoing(registry, id) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        visited
    }

    fn outgoing(&self, registry: &StaticRegistry, id: AgentId) -> Vec<AgentId> {
        let manager = self.managers.get(&id);
        let mut refs = manager.map(AgentManager::references).unwrap_or_default();
        let static_defaults = match manager {
            Some(m) if !m.is_static() => None,
            _ => registry.agent(id).ok(),
        };
        if let Some(agent) = static_defaults {
            for (key, value) in &agent.properties {
                let overridden = manager.is_some_and(|m| m.lookup(key) != PropertyState::Untouched);
                if !overridden {
                    refs.extend(value.agent_refs());
                }
            }
        }
        refs
    }

    /// Drop every ledger not reachable from the root. Returns the removed
    /// ids in ascending order.
    pub fn scrub_agents(&mut self, registry: &StaticRegistry) -> Vec<AgentId> {
        let reachable = self.reachable(registry);
        let removed: Vec<AgentId> = self
            .managers
            .keys()
            .filter(|id| !reachable.contains(id))
            .copied()
            .collect();
        for id in &removed {
            self.managers.remove(id);
        }
        if !removed.is_empty() {
            info!(removed = removed.len(), remaining = self.managers.len(), "scrubbed unreachable agents");
        }
        removed
    }

    // -- generation rebuilding ----------------------------------------------

    fn empty_like(&self, tracking: TrackingMode) -> ObjectStore {
        ObjectStore {
            managers: BTreeMap::new(),
            next_id: self.next_id,
            tracking,
        }
    }

    /// A new store holding only the collapsed current state of every
    /// property, stamped with the default event. Shares nothing with `self`.
    pub fn collapsed(&self, registry: &StaticRegistry, tracking: TrackingMode) -> ObjectStore {
        let mut out = self.empty_like(tracking);
        for manager in self.managers.values() {
            let mut fresh = AgentManager::new(manager.id(), manager.kind(), manager.is_static());
            for key in manager.property_names() {
                let state = match manager.lookup(key) {
                    PropertyState::Set(v) => Some(v),
                    _ => None,
                };
                seed_property(&mut fresh, registry, key, state);
            }
            out.managers.insert(manager.id(), fresh);
        }
        out
    }

    /// A new store holding every property as it was right after event `to`,
    /// stamped with the default event.
    ///
    /// For each property the newest change with `event_id <= to` decides the
    /// value. Properties with no such change did not exist yet: instance
    /// agents lose them, static agents fall back to their registry default.
    pub fn rewound(&self, registry: &StaticRegistry, to: EventId, tracking: TrackingMode) -> ObjectStore {
        let mut out = self.empty_like(tracking);
        for manager in self.managers.values() {
            let mut fresh = AgentManager::new(manager.id(), manager.kind(), manager.is_static());
            for key in manager.property_names() {
                let Some(change) = manager.history(key).iter().find(|c| c.event_id <= to) else {
                    continue;
                };
                let state = if change.is_deletion() {
                    None
                } else {
                    change.final_value.as_ref()
                };
                seed_property(&mut fresh, registry, key, state);
            }
            out.managers.insert(manager.id(), fresh);
        }
        out
    }
}

/// Seed `key` into a fresh ledger so that it resolves to `state` (`None`
/// meaning absent) against the registry defaults.
fn seed_property(
    manager: &mut AgentManager,
    registry: &StaticRegistry,
    key: &str,
    state: Option<&Value>,
) {
    let default = if manager.is_static() {
        registry.get_property(manager.id(), key).ok().flatten()
    } else {
        None
    };
    let stamp = EventStamp::default_event();
    let change = match (state, default) {
        (Some(v), Some(d)) if v == d => return,
        (None, None) => return,
        (Some(v), Some(d)) => {
            PropertyChange::new(&stamp, manager.id(), key, ChangeOp::Modified, Some(d.clone()), Some(v.clone()))
        }
        (Some(v), None) => {
            PropertyChange::new(&stamp, manager.id(), key, ChangeOp::Added, None, Some(v.clone()))
        }
        (None, Some(d)) => {
            PropertyChange::new(&stamp, manager.id(), key, ChangeOp::Deleted, Some(d.clone()), None)
        }
    };
    manager.seed(change);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
