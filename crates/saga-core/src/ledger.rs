//! Per-agent property ledgers.
//!
//! An [`AgentManager`] holds, for one agent in one generation, a mapping from
//! property name to that property's change list, newest first. Reads resolve
//! against the newest entry; the object store falls back to the static
//! registry when a property has no entry at all.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::agent::AgentId;
use crate::change::PropertyChange;
use crate::value::Value;

// ---------------------------------------------------------------------------
// TrackingMode
// ---------------------------------------------------------------------------

/// How much property history a ledger retains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrackingMode {
    /// Keep every change. Required for reverting to arbitrary events.
    #[default]
    Full,
    /// Keep only the newest change and the generation's base entry.
    Minimal,
}

impl TrackingMode {
    /// Map the `trackAgentChanges` option onto a mode.
    pub fn from_flag(track_agent_changes: bool) -> Self {
        if track_agent_changes {
            TrackingMode::Full
        } else {
            TrackingMode::Minimal
        }
    }
}

// ---------------------------------------------------------------------------
// PropertyState
// ---------------------------------------------------------------------------

/// The resolved state of one property in one ledger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyState<'a> {
    /// The newest change set this value.
    Set(&'a Value),
    /// The newest change deleted the property.
    Deleted,
    /// The ledger has no entry for this property.
    Untouched,
}

// ---------------------------------------------------------------------------
// AgentManager
// ---------------------------------------------------------------------------

/// The change ledger for a single agent within one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentManager {
    id: AgentId,
    kind: String,
    is_static: bool,
    properties: BTreeMap<String, Vec<PropertyChange>>,
}

impl AgentManager {
    /// Create an empty ledger.
    pub fn new(id: AgentId, kind: impl Into<String>, is_static: bool) -> Self {
        Self {
            id,
            kind: kind.into(),
            is_static,
            properties: BTreeMap::new(),
        }
    }

    /// The agent this ledger belongs to.
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// The agent's kind label.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Whether the agent is a static agent activated into this generation.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Resolve a property against the newest ledger entry.
    pub fn lookup(&self, key: &str) -> PropertyState<'_> {
        match self.properties.get(key).and_then(|h| h.first()) {
            Some(change) => match &change.final_value {
                Some(v) if !change.is_deletion() => PropertyState::Set(v),
                _ => PropertyState::Deleted,
            },
            None => PropertyState::Untouched,
        }
    }

    /// The change list for `key`, newest first. Empty if untouched.
    pub fn history(&self, key: &str) -> &[PropertyChange] {
        self.properties.get(key).map_or(&[], Vec::as_slice)
    }

    /// Names of every property with at least one ledger entry.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Current (non-deleted) values, in key order.
    pub fn current_values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.keys().filter_map(move |k| match self.lookup(k) {
            PropertyState::Set(v) => Some((k.as_str(), v)),
            _ => None,
        })
    }

    /// Every agent referenced by a current value of this ledger.
    pub fn references(&self) -> Vec<AgentId> {
        self.current_values()
            .flat_map(|(_, v)| v.agent_refs())
            .collect()
    }

    /// Number of properties with ledger entries.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns `true` if no property has a ledger entry.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Push `change` to the front of its property's history.
    ///
    /// Under [`TrackingMode::Minimal`] the history keeps only the newest
    /// change and the oldest retained one (the generation's base entry);
    /// anything in between is dropped.
    pub fn record(&mut self, change: PropertyChange, tracking: TrackingMode) {
        let history = self.properties.entry(change.property.clone()).or_default();
        history.insert(0, change);
        if tracking == TrackingMode::Minimal && history.len() > 2 {
            let last = history.len() - 1;
            let dropped = history.drain(1..last).count();
            trace!(
                agent = %self.id,
                dropped,
                "minimal tracking truncated property history"
            );
        }
    }

    /// Replace the whole history of `key` with a single baseline entry.
    pub fn seed(&mut self, change: PropertyChange) {
        self.properties.insert(change.property.clone(), vec![change]);
    }

    /// Forget every ledger entry for `key`.
    pub fn clear_property(&mut self, key: &str) {
        self.properties.remove(key);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
