//! Canonical state hashing for determinism checks.
//!
//! The hash covers what a player can observe: every resolved property of
//! every agent reachable from the root, plus the random stream position.
//! Ledger history, event ids, and output are left out.
//!
//! Instance agent ids are never reused along a lineage, so replaying the same
//! commands after a revert spawns the same agents under new ids. To make such
//! states compare equal, reachable agents are labelled canonically: the root
//! is `"root"`, static agents keep their registry id (`"s<id>"`), and instance
//! agents are numbered in breadth-first discovery order (`"i<n>"`), walking
//! properties in key order.

use std::collections::{BTreeMap, VecDeque};

use saga_core::agent::AgentId;
use saga_core::registry::StaticRegistry;
use saga_core::value::Value;
use serde_json::json;

use crate::generation::Generation;

// ---------------------------------------------------------------------------
// Canonical view
// ---------------------------------------------------------------------------

struct Labels<'r> {
    registry: &'r StaticRegistry,
    by_id: BTreeMap<AgentId, String>,
    instances: usize,
}

impl<'r> Labels<'r> {
    fn new(registry: &'r StaticRegistry) -> Self {
        Self {
            registry,
            by_id: BTreeMap::new(),
            instances: 0,
        }
    }

    /// Label `id`, returning `true` the first time it is seen.
    fn visit(&mut self, id: AgentId) -> bool {
        if self.by_id.contains_key(&id) {
            return false;
        }
        let label = if id.is_root() {
            "root".to_owned()
        } else if self.registry.has_agent(id) {
            format!("s{}", id.0)
        } else {
            self.instances += 1;
            format!("i{}", self.instances)
        };
        self.by_id.insert(id, label);
        true
    }

    fn label(&self, id: AgentId) -> String {
        self.by_id.get(&id).cloned().unwrap_or_else(|| format!("?{}", id.0))
    }
}

fn canonical(value: &Value, labels: &Labels<'_>) -> serde_json::Value {
    match value {
        Value::Agent(r) => json!({ "ref": labels.label(r.ref_id) }),
        Value::List(items) => items.iter().map(|v| canonical(v, labels)).collect(),
        Value::Map(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), canonical(v, labels)))
            .collect::<serde_json::Map<_, _>>()
            .into(),
        other => other.to_json(),
    }
}

impl Generation {
    /// A canonical JSON view of the observable state.
    pub fn canonical_state(&self, registry: &StaticRegistry) -> serde_json::Value {
        let mut labels = Labels::new(registry);
        let mut order = Vec::new();
        let mut queue = VecDeque::from([AgentId::ROOT]);
        labels.visit(AgentId::ROOT);

        let mut resolved: BTreeMap<AgentId, Vec<(String, Value)>> = BTreeMap::new();
        while let Some(id) = queue.pop_front() {
            order.push(id);
            let names = self.store.property_names(registry, id).unwrap_or_default();
            let mut props = Vec::with_capacity(names.len());
            for name in names {
                let Ok(Some(value)) = self.store.get_property(registry, id, &name) else {
                    continue;
                };
                for next in value.agent_refs() {
                    if labels.visit(next) {
                        queue.push_back(next);
                    }
                }
                props.push((name, value.clone()));
            }
            resolved.insert(id, props);
        }

        let agents: Vec<serde_json::Value> = order
            .iter()
            .map(|id| {
                let kind = self
                    .store
                    .agent_manager(*id)
                    .map(|m| m.kind().to_owned())
                    .or_else(|| registry.agent(*id).ok().map(|a| a.kind.clone()))
                    .unwrap_or_default();
                let properties: serde_json::Map<String, serde_json::Value> = resolved
                    .get(id)
                    .into_iter()
                    .flatten()
                    .map(|(k, v)| (k.clone(), canonical(v, &labels)))
                    .collect();
                json!({ "agent": labels.label(*id), "kind": kind, "properties": properties })
            })
            .collect();

        json!({
            "seed": self.random.seed(),
            "numGenerations": self.random.count(),
            "agents": agents,
        })
    }

    /// BLAKE3 hex digest of [`canonical_state`](Self::canonical_state).
    pub fn state_hash(&self, registry: &StaticRegistry) -> String {
        let bytes = self.canonical_state(registry).to_string();
        blake3::hash(bytes.as_bytes()).to_hex().to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
