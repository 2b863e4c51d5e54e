//! One immutable-once-built snapshot of game state.
//!
//! A [`Generation`] bundles everything a command can change: the agent
//! ledgers, the event journal, the random stream position, the output log,
//! and the options. Generations own all of their data, so cloning one or
//! building the next one never shares mutable structure with the previous.

use saga_core::agent::AgentId;
use saga_core::change::EventId;
use saga_core::ledger::AgentManager;
use saga_core::registry::StaticRegistry;
use saga_core::store::ObjectStore;
use saga_core::value::Value;
use saga_core::SagaError;
use saga_journal::journal::EventJournal;
use saga_journal::output::OutputLog;
use tracing::info;

use crate::options::GameOptions;
use crate::random::RandomStream;

/// The complete state of a game between two commands.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub(crate) store: ObjectStore,
    pub(crate) journal: EventJournal,
    pub(crate) random: RandomStream,
    pub(crate) output: OutputLog,
    pub(crate) options: GameOptions,
}

impl Generation {
    /// The first generation of a new game: only the root agent, no events,
    /// the random stream at draw 0.
    pub fn new(registry: &StaticRegistry, options: GameOptions) -> Self {
        info!(seed = %options.seed, tracking = ?options.tracking(), "new game");
        Self {
            store: ObjectStore::new(registry, options.tracking()),
            journal: EventJournal::new(),
            random: RandomStream::new(options.seed.clone()),
            output: OutputLog::new(),
            options,
        }
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn journal(&self) -> &EventJournal {
        &self.journal
    }

    pub fn random(&self) -> &RandomStream {
        &self.random
    }

    pub fn output(&self) -> &OutputLog {
        &self.output
    }

    pub fn options(&self) -> &GameOptions {
        &self.options
    }

    /// Resolve `key` on agent `id` against this generation.
    pub fn get_property<'a>(
        &'a self,
        registry: &'a StaticRegistry,
        id: AgentId,
        key: &str,
    ) -> Result<Option<&'a Value>, SagaError> {
        self.store.get_property(registry, id, key)
    }

    /// The ledger of `id`, if the agent is active in this generation.
    pub fn agent_manager(&self, id: AgentId) -> Option<&AgentManager> {
        self.store.agent_manager(id)
    }

    /// The newest event id handed out along the lineage, executed in this
    /// generation or an earlier one. [`EventId::DEFAULT`] before any event.
    pub fn last_event_id(&self) -> EventId {
        EventId(self.journal.next_id().0.saturating_sub(1))
    }

    /// Drop every agent unreachable from the root. Returns the removed ids.
    ///
    /// Only sound at a command boundary.
    pub fn scrub_agents(&mut self, registry: &StaticRegistry) -> Vec<AgentId> {
        self.store.scrub_agents(registry)
    }
}
