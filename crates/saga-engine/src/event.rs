//! Tracked events and their composition into queues.
//!
//! A [`TrackedEvent`] is a named handler run against an
//! [`EventContext`](crate::context::EventContext). Its [`EventOutcome`] tells
//! the engine what runs next:
//!
//! - [`EventOutcome::Chain`] runs one event immediately after this one.
//! - [`EventOutcome::Queue`] runs the queue's immediate events right away, in
//!   order and depth first, and appends its delayed events to the end of the
//!   command's work list.
//!
//! Composition mirrors that split. `a.then([b, c])` builds an immediate
//! sequence, `thenq` adds delayed entries, and [`nq`] builds a queue with
//! delayed entries only. Once a queue holds delayed entries, appending more
//! immediate ones is rejected.
//!
//! Parameterised events are ordinary closures capturing their arguments:
//!
//! ```
//! use saga_engine::prelude::*;
//!
//! fn attack(target: AgentId, damage: i64) -> TrackedEvent {
//!     TrackedEvent::new("attack", move |ctx| {
//!         let hp = ctx.get(target, "health")?.and_then(Value::as_int).unwrap_or(0);
//!         ctx.set(target, "health", hp - damage)?;
//!         Ok(EventOutcome::Done)
//!     })
//! }
//!
//! let queue = attack(AgentId(1), 3).then([attack(AgentId(1), 2)]).thenq([noop()]);
//! assert_eq!(queue.immediate().len(), 2);
//! assert_eq!(queue.delayed().len(), 1);
//! assert!(nq([noop()]).then([noop()]).is_err());
//! ```

use std::fmt;
use std::rc::Rc;

use saga_core::SagaError;

use crate::context::EventContext;

/// Signature of an event handler.
pub type Handler = dyn Fn(&mut EventContext<'_>) -> Result<EventOutcome, SagaError>;

const NOOP_NAME: &str = "noop";

// ---------------------------------------------------------------------------
// TrackedEvent
// ---------------------------------------------------------------------------

/// A named, cloneable unit of work.
#[derive(Clone)]
pub struct TrackedEvent {
    name: Rc<str>,
    handler: Option<Rc<Handler>>,
}

impl fmt::Debug for TrackedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedEvent")
            .field("name", &self.name)
            .field("noop", &self.is_noop())
            .finish()
    }
}

impl TrackedEvent {
    /// Build an event from a name and a handler.
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut EventContext<'_>) -> Result<EventOutcome, SagaError> + 'static,
    {
        let name: String = name.into();
        Self {
            name: Rc::from(name),
            handler: Some(Rc::new(handler)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the [`noop`] sentinel.
    pub fn is_noop(&self) -> bool {
        self.handler.is_none()
    }

    /// Run the handler. The sentinel does nothing.
    pub(crate) fn run(&self, ctx: &mut EventContext<'_>) -> Result<EventOutcome, SagaError> {
        match &self.handler {
            Some(handler) => handler(ctx),
            None => Ok(EventOutcome::Done),
        }
    }

    /// This event followed immediately by `events`.
    pub fn then(self, events: impl IntoIterator<Item = TrackedEvent>) -> EventQueue {
        let mut immediate = vec![self];
        immediate.extend(events);
        EventQueue {
            immediate,
            delayed: Vec::new(),
        }
    }

    /// This event now, `events` after everything already scheduled.
    pub fn thenq(self, events: impl IntoIterator<Item = TrackedEvent>) -> EventQueue {
        EventQueue {
            immediate: vec![self],
            delayed: events.into_iter().collect(),
        }
    }
}

/// The sentinel event: never recorded, never run.
pub fn noop() -> TrackedEvent {
    TrackedEvent {
        name: Rc::from(NOOP_NAME),
        handler: None,
    }
}

// ---------------------------------------------------------------------------
// EventQueue
// ---------------------------------------------------------------------------

/// Events scheduled by an event: an immediate sequence and a delayed tail.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    immediate: Vec<TrackedEvent>,
    delayed: Vec<TrackedEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append immediate events.
    ///
    /// # Errors
    ///
    /// [`SagaError::InvalidOperation`] if the queue already has delayed
    /// entries.
    pub fn then(
        mut self,
        events: impl IntoIterator<Item = TrackedEvent>,
    ) -> Result<EventQueue, SagaError> {
        if !self.delayed.is_empty() {
            return Err(SagaError::invalid_operation(
                "cannot chain immediate events after delayed ones",
            ));
        }
        self.immediate.extend(events);
        Ok(self)
    }

    /// Append delayed events.
    pub fn thenq(mut self, events: impl IntoIterator<Item = TrackedEvent>) -> EventQueue {
        self.delayed.extend(events);
        self
    }

    pub fn immediate(&self) -> &[TrackedEvent] {
        &self.immediate
    }

    pub fn delayed(&self) -> &[TrackedEvent] {
        &self.delayed
    }

    pub fn is_empty(&self) -> bool {
        self.immediate.is_empty() && self.delayed.is_empty()
    }

    pub(crate) fn into_parts(self) -> (Vec<TrackedEvent>, Vec<TrackedEvent>) {
        (self.immediate, self.delayed)
    }
}

/// A queue holding only delayed events.
pub fn nq(events: impl IntoIterator<Item = TrackedEvent>) -> EventQueue {
    EventQueue::new().thenq(events)
}

// ---------------------------------------------------------------------------
// EventOutcome
// ---------------------------------------------------------------------------

/// What an event handler schedules next.
#[derive(Debug, Clone, Default)]
pub enum EventOutcome {
    #[default]
    Done,
    Chain(TrackedEvent),
    Queue(EventQueue),
}

impl From<TrackedEvent> for EventOutcome {
    fn from(event: TrackedEvent) -> Self {
        EventOutcome::Chain(event)
    }
}

impl From<EventQueue> for EventOutcome {
    fn from(queue: EventQueue) -> Self {
        EventOutcome::Queue(queue)
    }
}

impl From<()> for EventOutcome {
    fn from(_: ()) -> Self {
        EventOutcome::Done
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> TrackedEvent {
        TrackedEvent::new(name, |_| Ok(EventOutcome::Done))
    }

    fn names(events: &[TrackedEvent]) -> Vec<&str> {
        events.iter().map(TrackedEvent::name).collect()
    }

    #[test]
    fn then_builds_immediate_sequence() {
        let q = named("a").then([named("b"), named("c")]);
        assert_eq!(names(q.immediate()), vec!["a", "b", "c"]);
        assert!(q.delayed().is_empty());
    }

    #[test]
    fn thenq_appends_delayed() {
        let q = named("a").then([named("b"), named("c")]).thenq([named("d"), named("e")]);
        assert_eq!(names(q.immediate()), vec!["a", "b", "c"]);
        assert_eq!(names(q.delayed()), vec!["d", "e"]);

        let q = named("a").thenq([named("b")]);
        assert_eq!(names(q.immediate()), vec!["a"]);
        assert_eq!(names(q.delayed()), vec!["b"]);
    }

    #[test]
    fn then_after_delayed_is_invalid_operation() {
        let err = nq([named("x"), named("y")]).then([named("z")]).unwrap_err();
        assert!(matches!(err, SagaError::InvalidOperation { .. }));

        let ok = named("a").then([named("b")]).then([named("c")]).unwrap();
        assert_eq!(names(ok.immediate()), vec!["a", "b", "c"]);
    }

    #[test]
    fn noop_sentinel() {
        let n = noop();
        assert!(n.is_noop());
        assert_eq!(n.name(), "noop");
        assert!(!named("a").is_noop());
        assert!(EventQueue::new().is_empty());
    }

    #[test]
    fn outcome_conversions() {
        assert!(matches!(EventOutcome::from(named("a")), EventOutcome::Chain(_)));
        assert!(matches!(EventOutcome::from(nq([named("a")])), EventOutcome::Queue(_)));
        assert!(matches!(EventOutcome::from(()), EventOutcome::Done));
    }
}
