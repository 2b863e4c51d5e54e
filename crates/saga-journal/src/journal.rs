//! The per-generation event journal and its causality graph.
//!
//! The [`EventJournal`] owns the [`EventRecord`] of every event executed in
//! one generation, keyed by id. Event ids are allocated when an event is
//! invoked and keep counting across generations, so a recycled journal starts
//! with [`EventJournal::continuing`].
//!
//! Records are committed after their handler returns. Committing a record
//! links it into its parent's `caused` list; the parent always commits first
//! because scheduled events only run after the event that scheduled them.
//!
//! # Query API
//!
//! - **By id**: [`EventJournal::event`]
//! - **By agent / property**: [`EventJournal::changes_for_agent`],
//!   [`EventJournal::changes_for_property`]
//! - **By name**: [`EventJournal::events_named`]
//! - **Causality**: [`EventJournal::causal_chain`],
//!   [`EventJournal::descendants`]
//!
//! # Example
//!
//! ```
//! use saga_journal::journal::EventJournal;
//! use saga_journal::record::EventRecord;
//!
//! let mut journal = EventJournal::new();
//! let root = journal.allocate_id();
//! journal.commit(EventRecord::new(root, "look", None));
//! let child = journal.allocate_id();
//! journal.commit(EventRecord::new(child, "describe", Some(root)));
//!
//! assert_eq!(journal.event(root).unwrap().caused, vec![child]);
//! assert_eq!(journal.causal_chain(child).len(), 2);
//! ```

use std::collections::{BTreeMap, VecDeque};

use saga_core::agent::AgentId;
use saga_core::change::{EventId, PropertyChange};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::record::{EventRecord, RandomRecord};

// ---------------------------------------------------------------------------
// EventJournal
// ---------------------------------------------------------------------------

/// All events executed during one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventJournal {
    events: BTreeMap<EventId, EventRecord>,
    next_id: EventId,
}

impl Default for EventJournal {
    fn default() -> Self {
        Self::new()
    }
}

impl EventJournal {
    /// An empty journal whose first event gets id 1. Id 0 is the default
    /// event that seeded values are stamped with.
    pub fn new() -> Self {
        Self {
            events: BTreeMap::new(),
            next_id: EventId::DEFAULT.next(),
        }
    }

    /// An empty journal continuing the id counter of `previous`.
    pub fn continuing(previous: &EventJournal) -> Self {
        Self {
            events: BTreeMap::new(),
            next_id: previous.next_id,
        }
    }

    /// Hand out the next event id.
    pub fn allocate_id(&mut self) -> EventId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    /// Id the next invoked event will get.
    pub fn next_id(&self) -> EventId {
        self.next_id
    }

    /// Store a finished record and link it to its parent.
    pub fn commit(&mut self, record: EventRecord) {
        let id = record.id;
        if let Some(parent) = record.caused_by.and_then(|p| self.events.get_mut(&p)) {
            parent.caused.push(id);
        }
        trace!(event = %id, name = %record.name, changes = record.changes.len(), "committed event");
        self.events.insert(id, record);
    }

    /// The record of event `id`.
    pub fn event(&self, id: EventId) -> Option<&EventRecord> {
        self.events.get(&id)
    }

    /// Every record, in id order.
    pub fn events(&self) -> impl Iterator<Item = &EventRecord> {
        self.events.values()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Smallest event id executed in this generation.
    pub fn first_event_id(&self) -> Option<EventId> {
        self.events.keys().next().copied()
    }

    /// Largest event id executed in this generation.
    pub fn last_event_id(&self) -> Option<EventId> {
        self.events.keys().next_back().copied()
    }

    /// Events with the given name, in id order.
    pub fn events_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a EventRecord> {
        self.events.values().filter(move |e| e.name == name)
    }

    /// Every change made to `agent`, oldest first.
    pub fn changes_for_agent(&self, agent: AgentId) -> impl Iterator<Item = &PropertyChange> {
        self.events
            .values()
            .flat_map(|e| e.changes.iter())
            .filter(move |c| c.agent_id == agent)
    }

    /// Every change made to `agent.property`, oldest first.
    pub fn changes_for_property<'a>(
        &'a self,
        agent: AgentId,
        property: &'a str,
    ) -> impl Iterator<Item = &'a PropertyChange> {
        self.changes_for_agent(agent)
            .filter(move |c| c.property == property)
    }

    /// Every random draw, in draw order.
    pub fn randoms(&self) -> impl Iterator<Item = &RandomRecord> {
        self.events.values().flat_map(|e| e.randoms.iter())
    }

    /// Index of the first draw made by an event after `to`, if any.
    pub fn first_random_after(&self, to: EventId) -> Option<u64> {
        self.events
            .range(to.next()..)
            .flat_map(|(_, e)| e.randoms.iter())
            .map(|r| r.id)
            .next()
    }

    /// The event and its ancestors, from `id` back to the command root.
    /// Empty when `id` is unknown.
    pub fn causal_chain(&self, id: EventId) -> Vec<&EventRecord> {
        let mut chain = Vec::new();
        let mut cursor = self.events.get(&id);
        while let Some(record) = cursor {
            chain.push(record);
            cursor = record.caused_by.and_then(|p| self.events.get(&p));
        }
        chain
    }

    /// Every event transitively caused by `id`, breadth first.
    pub fn descendants(&self, id: EventId) -> Vec<EventId> {
        let mut out = Vec::new();
        let mut queue: VecDeque<EventId> = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            if let Some(record) = self.events.get(&current) {
                for &child in &record.caused {
                    out.push(child);
                    queue.push_back(child);
                }
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
