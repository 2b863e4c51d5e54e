//! Game options.
//!
//! Options arrive as an opaque JSON record from the embedding layer. The core
//! reads `seed` and `trackAgentChanges`; every other field is carried through
//! untouched in [`GameOptions::extra`].

use saga_core::ledger::TrackingMode;
use serde::{Deserialize, Serialize};

fn default_seed() -> String {
    GameOptions::DEFAULT_SEED.to_owned()
}

fn default_tracking() -> bool {
    true
}

/// Options of one generation lineage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOptions {
    /// Seed of the random stream.
    #[serde(default = "default_seed")]
    pub seed: String,
    /// Keep full property history. Without it only the generation start can
    /// be reverted to.
    #[serde(default = "default_tracking")]
    pub track_agent_changes: bool,
    /// Fields the core does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            track_agent_changes: default_tracking(),
            extra: serde_json::Map::new(),
        }
    }
}

impl GameOptions {
    pub const DEFAULT_SEED: &'static str = "saga";

    /// Options with the given seed and defaults for everything else.
    pub fn seeded(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            ..Self::default()
        }
    }

    /// Parse options from a JSON object. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// These options with the fields of `overrides` (a JSON object) laid on
    /// top. Fields absent from `overrides` keep their current value.
    pub fn with_overrides(&self, overrides: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut merged = serde_json::to_value(self)?;
        if let (Some(base), Some(patch)) = (merged.as_object_mut(), overrides.as_object()) {
            for (k, v) in patch {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(merged)
    }

    /// The ledger tracking mode these options ask for.
    pub fn tracking(&self) -> TrackingMode {
        TrackingMode::from_flag(self.track_agent_changes)
    }
}
