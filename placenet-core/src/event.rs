//! Workflow events.
//!
//! Three kinds of events are dispatched while a workflow moves:
//!
//! - `guard` - fired by `can`/`apply` before anything changes; listeners
//!   may veto by calling [`GuardEvent::block`]
//! - `before_transition` - fired by `apply` right before the marking changes
//! - `after_transition` - fired by `apply` once the marking has changed
//!
//! Events borrow everything they carry and live only for the duration of
//! the dispatch that created them.

use crate::place::Place;
use crate::transition::Transition;
use crate::workflow::Workflow;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BeforeTransition,
    AfterTransition,
    Guard,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::BeforeTransition => "before_transition",
            EventKind::AfterTransition => "after_transition",
            EventKind::Guard => "guard",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied values passed through to every event of one call.
///
/// The cancellation flag is advisory: the engine never inspects it, but
/// listeners and constraints may.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    values: HashMap<String, Value>,
    cancelled: Arc<AtomicBool>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }

    /// Flags the call as cancelled. Clones share the flag.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// An event raised while checking or applying a transition.
#[derive(Clone, Copy)]
pub struct Event<'a> {
    kind: EventKind,
    transition: &'a Transition,
    from: &'a [Place],
    to: &'a [Place],
    workflow: &'a Workflow,
    context: &'a CallContext,
}

impl<'a> Event<'a> {
    pub fn new(
        kind: EventKind,
        transition: &'a Transition,
        from: &'a [Place],
        to: &'a [Place],
        workflow: &'a Workflow,
        context: &'a CallContext,
    ) -> Self {
        Self {
            kind,
            transition,
            from,
            to,
            workflow,
            context,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn transition(&self) -> &'a Transition {
        self.transition
    }

    /// Places consumed by the transition.
    pub fn from(&self) -> &'a [Place] {
        self.from
    }

    /// Places produced by the transition.
    pub fn to(&self) -> &'a [Place] {
        self.to
    }

    pub fn workflow(&self) -> &'a Workflow {
        self.workflow
    }

    /// Looks up a value in the caller's context.
    pub fn context(&self, key: &str) -> Option<&'a Value> {
        self.context.value(key)
    }

    pub fn call_context(&self) -> &'a CallContext {
        self.context
    }
}

impl fmt::Debug for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("transition", &self.transition.name())
            .field("from", &self.from)
            .field("to", &self.to)
            .field("workflow", &self.workflow.name())
            .finish()
    }
}

/// A guard event. Listeners veto the transition with [`GuardEvent::block`].
#[derive(Debug)]
pub struct GuardEvent<'a> {
    event: Event<'a>,
    blocking: bool,
}

impl<'a> GuardEvent<'a> {
    pub fn new(
        transition: &'a Transition,
        from: &'a [Place],
        to: &'a [Place],
        workflow: &'a Workflow,
        context: &'a CallContext,
    ) -> Self {
        Self {
            event: Event::new(EventKind::Guard, transition, from, to, workflow, context),
            blocking: false,
        }
    }

    /// Vetoes the transition. Once blocked, the event stays blocked for
    /// the rest of the dispatch.
    pub fn block(&mut self) {
        self.blocking = true;
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn event(&self) -> &Event<'a> {
        &self.event
    }
}

impl<'a> Deref for GuardEvent<'a> {
    type Target = Event<'a>;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}
