//! The event engine: runs a command's root event and everything it schedules.
//!
//! Execution uses a single work list. Each entry is an event plus the id of
//! the event that scheduled it. An event gets its id when it is taken off the
//! list, runs against an [`EventContext`], and is committed to the journal
//! when its handler returns. Then its outcome is scheduled:
//!
//! - chained and immediate events go to the **front** of the list, in
//!   declared order, so they run depth first before anything queued earlier;
//! - delayed events go to the **back**, in enqueue order.
//!
//! Ids therefore increase strictly in execution order and every parent id is
//! smaller than its children's.
//!
//! Errors are never caught here. A failing handler aborts the command with
//! the generation half-written; callers run commands on a fresh generation
//! (see [`Session`](crate::session::Session)) and drop it on error.

use std::collections::VecDeque;

use saga_core::change::EventId;
use saga_core::registry::StaticRegistry;
use saga_core::SagaError;
use saga_journal::record::EventRecord;
use tracing::debug;

use crate::context::EventContext;
use crate::event::{EventOutcome, TrackedEvent};
use crate::generation::Generation;

impl Generation {
    /// Run `root` and every event it schedules to completion.
    ///
    /// Returns the root event's id, or `None` if `root` was the [`noop`]
    /// sentinel.
    ///
    /// [`noop`]: crate::event::noop
    pub fn invoke(
        &mut self,
        registry: &StaticRegistry,
        root: TrackedEvent,
    ) -> Result<Option<EventId>, SagaError> {
        let Generation {
            store,
            journal,
            random,
            output,
            ..
        } = self;

        let mut work: VecDeque<(TrackedEvent, Option<EventId>)> = VecDeque::new();
        work.push_back((root, None));
        let mut root_id = None;

        while let Some((event, caused_by)) = work.pop_front() {
            if event.is_noop() {
                continue;
            }
            let id = journal.allocate_id();
            root_id.get_or_insert(id);
            debug!(event = %id, name = event.name(), caused_by = ?caused_by.map(|p| p.0), "invoking event");

            let mut record = EventRecord::new(id, event.name(), caused_by);
            let outcome = {
                let mut ctx = EventContext::new(registry, store, random, output, &mut record);
                event.run(&mut ctx)?
            };
            journal.commit(record);

            match outcome {
                EventOutcome::Done => {}
                EventOutcome::Chain(next) => work.push_front((next, Some(id))),
                EventOutcome::Queue(queue) => {
                    let (immediate, delayed) = queue.into_parts();
                    for next in immediate.into_iter().rev() {
                        work.push_front((next, Some(id)));
                    }
                    for next in delayed {
                        work.push_back((next, Some(id)));
                    }
                }
            }
        }
        Ok(root_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
