//! Event, random-draw, and output records.
//!
//! An [`EventRecord`] is the journal entry for one executed event: its
//! position in the causality graph plus everything it did, in execution
//! order. Empty collections are omitted from the wire format.

use saga_core::agent::AgentId;
use saga_core::change::{EventId, PropertyChange};
use saga_core::value::Value;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RandomRecord
// ---------------------------------------------------------------------------

/// One draw from the random stream.
///
/// `id` is the stream's draw index, so the first record recorded after an
/// event tells a revert where to rewind the counter to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomRecord {
    /// Draw index within the lineage.
    pub id: u64,
    /// The drawn value (or the selected index for choices over agents).
    pub value: Value,
}

// ---------------------------------------------------------------------------
// OutputLine
// ---------------------------------------------------------------------------

/// One line written to the output sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputLine {
    /// Sink-wide id, monotonic across generations.
    pub id: u64,
    /// Opaque line type chosen by the writer.
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque payload.
    pub data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// EventRecord
// ---------------------------------------------------------------------------

/// Journal entry for one executed event.
///
/// Serializes as `{id, name, causedBy?, caused?, changes?, output?, randoms?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: EventId,
    pub name: String,
    /// The event whose outcome scheduled this one. `None` for command roots.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub caused_by: Option<EventId>,
    /// Events scheduled by this one, in execution order.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub caused: Vec<EventId>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub changes: Vec<PropertyChange>,
    /// Ids of the output lines written by this event.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub output: Vec<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub randoms: Vec<RandomRecord>,
}

impl EventRecord {
    /// Start a record for an event that is about to run.
    pub fn new(id: EventId, name: impl Into<String>, caused_by: Option<EventId>) -> Self {
        Self {
            id,
            name: name.into(),
            caused_by,
            caused: Vec::new(),
            changes: Vec::new(),
            output: Vec::new(),
            randoms: Vec::new(),
        }
    }

    /// Whether the event left any trace besides its position in the graph.
    pub fn is_inert(&self) -> bool {
        self.changes.is_empty() && self.output.is_empty() && self.randoms.is_empty()
    }

    /// Whether any recorded change touched `agent`.
    pub fn touches(&self, agent: AgentId) -> bool {
        self.changes.iter().any(|c| c.agent_id == agent)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use saga_core::change::{ChangeOp, EventStamp};

    #[test]
    fn output_line_renames_kind() {
        let line = OutputLine {
            id: 3,
            kind: "text".to_owned(),
            data: serde_json::json!("You hit the dummy."),
        };
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["id"], 3);
    }

    #[test]
    fn empty_collections_are_omitted() {
        let record = EventRecord::new(EventId(4), "look", None);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({ "id": 4, "name": "look" }));
        assert!(record.is_inert());
    }

    #[test]
    fn full_record_wire_format() {
        let mut record = EventRecord::new(EventId(5), "attack", Some(EventId(4)));
        record.caused.push(EventId(6));
        record.changes.push(PropertyChange::new(
            &EventStamp::new(EventId(5), "attack"),
            AgentId(3),
            "health",
            ChangeOp::Modified,
            Some(Value::Int(10)),
            Some(Value::Int(7)),
        ));
        record.output.push(0);
        record.randoms.push(RandomRecord { id: 2, value: Value::Int(3) });

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["causedBy"], 4);
        assert_eq!(json["caused"], serde_json::json!([6]));
        assert_eq!(json["changes"][0]["op"], "MODIFIED");
        assert_eq!(json["output"], serde_json::json!([0]));
        assert_eq!(json["randoms"][0], serde_json::json!({ "id": 2, "value": 3 }));
        assert!(record.touches(AgentId(3)));
        assert!(!record.touches(AgentId(4)));

        let back: EventRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
