//! Building the next generation: recycling and reverting.
//!
//! Both operations return a new [`Generation`] and leave the old one as it
//! was.
//!
//! **Recycle** collapses every property to its current state, stamped with
//! the default event (id 0, name `"DEFAULT"`). Values equal to their static
//! default are dropped, so static agents start clean again. The random
//! stream's seed and draw counter carry over; the journal and output log
//! start empty but keep counting ids.
//!
//! **Revert** rebuilds every property as it stood right after a given event,
//! from the old generation's full history, and rewinds the random counter to
//! the first draw made after that event. Without full tracking only the
//! generation start can be reverted to.

use saga_core::change::EventId;
use saga_core::registry::StaticRegistry;
use saga_core::SagaError;
use saga_journal::journal::EventJournal;
use saga_journal::output::OutputLog;
use tracing::{info, warn};

use crate::generation::Generation;
use crate::options::GameOptions;

impl Generation {
    /// Options for the next generation: `options` if given, with the
    /// lineage's seed kept.
    fn next_options(&self, options: Option<&GameOptions>) -> GameOptions {
        match options {
            Some(next) => {
                let mut next = next.clone();
                if next.seed != self.options.seed {
                    warn!(
                        current = %self.options.seed,
                        requested = %next.seed,
                        "seed cannot change within a lineage; keeping the current seed"
                    );
                    next.seed = self.options.seed.clone();
                }
                next
            }
            None => self.options.clone(),
        }
    }

    /// A fresh generation holding only the collapsed current state.
    pub fn recycle(&self, registry: &StaticRegistry, options: Option<&GameOptions>) -> Generation {
        let options = self.next_options(options);
        let store = self.store.collapsed(registry, options.tracking());
        info!(
            agents = store.len(),
            events = self.journal.len(),
            draws = self.random.count(),
            "recycled generation"
        );
        Generation {
            store,
            journal: EventJournal::continuing(&self.journal),
            random: self.random.clone(),
            output: OutputLog::continuing(&self.output),
            options,
        }
    }

    /// A fresh generation holding the state right after event `to`.
    ///
    /// Any `to` below this generation's first event means the generation
    /// start.
    ///
    /// # Errors
    ///
    /// [`SagaError::InvalidOperation`] if `to` is past the newest event id,
    /// or if tracking is disabled and `to` is not the generation start.
    pub fn revert(&self, registry: &StaticRegistry, to: EventId) -> Result<Generation, SagaError> {
        let last = self.last_event_id();
        if to > last {
            return Err(SagaError::invalid_operation(format!(
                "cannot revert to event {to}: the newest event is {last}"
            )));
        }
        let at_start = self.journal.first_event_id().map_or(true, |first| to < first);
        if !self.options.track_agent_changes && !at_start {
            return Err(SagaError::invalid_operation(format!(
                "cannot revert to event {to} with agent change tracking disabled"
            )));
        }

        let mut random = self.random.clone();
        if let Some(count) = self.journal.first_random_after(to) {
            random.rewind(count);
        }
        let store = self.store.rewound(registry, to, self.options.tracking());
        info!(to = %to, draws = random.count(), "reverted generation");

        Ok(Generation {
            store,
            journal: EventJournal::continuing(&self.journal),
            random,
            output: OutputLog::continuing(&self.output),
            options: self.options.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
