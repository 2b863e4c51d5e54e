//! Dynamic property values.
//!
//! Every tracked property holds a [`Value`]. Agent-typed values are always
//! stored as [`Value::Agent`] references; [`Value::Draft`] exists only as an
//! input form for agents that have not been activated yet and is converted to
//! a reference by the object store before anything is recorded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agent::{AgentDraft, AgentId, AgentRef};

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A property value.
///
/// Serializes to plain JSON; references serialize as `{"refId": n}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Reference to another agent in the same generation.
    Agent(AgentRef),
    /// String-keyed map, ordered by key.
    Map(BTreeMap<String, Value>),
    /// An agent that has not been activated yet. Input only.
    #[serde(skip)]
    Draft(AgentDraft),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The integer payload, if this is an [`Value::Int`].
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The numeric payload widened to `f64`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// The boolean payload.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The text payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The list payload.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// The map payload.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The referenced agent id, if this is a [`Value::Agent`].
    pub fn as_agent(&self) -> Option<AgentId> {
        match self {
            Value::Agent(r) => Some(r.ref_id),
            _ => None,
        }
    }

    /// Returns `true` if this value is, or contains, an agent reference or
    /// an unactivated draft.
    pub fn contains_agent(&self) -> bool {
        match self {
            Value::Agent(_) | Value::Draft(_) => true,
            Value::List(items) => items.iter().any(Value::contains_agent),
            Value::Map(map) => map.values().any(Value::contains_agent),
            _ => false,
        }
    }

    /// Every agent id referenced by this value, including nested lists and
    /// maps, in traversal order.
    pub fn agent_refs(&self) -> Vec<AgentId> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs(&self, out: &mut Vec<AgentId>) {
        match self {
            Value::Agent(r) => out.push(r.ref_id),
            Value::List(items) => items.iter().for_each(|v| v.collect_refs(out)),
            Value::Map(map) => map.values().for_each(|v| v.collect_refs(out)),
            _ => {}
        }
    }

    /// Convert to a `serde_json::Value`. Drafts become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Draft(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Agent(r) => serde_json::json!({ "refId": r.ref_id.0 }),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<AgentRef> for Value {
    fn from(r: AgentRef) -> Self {
        Value::Agent(r)
    }
}

impl From<AgentId> for Value {
    fn from(id: AgentId) -> Self {
        Value::Agent(AgentRef::new(id))
    }
}

impl From<AgentDraft> for Value {
    fn from(draft: AgentDraft) -> Self {
        match draft.agent_ref() {
            Some(r) => Value::Agent(r),
            None => Value::Draft(draft),
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    /// Objects of the exact shape `{"refId": n}` become agent references.
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(id) = map.get("refId").and_then(serde_json::Value::as_u64) {
                        return Value::Agent(AgentRef::new(AgentId(id)));
                    }
                }
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
