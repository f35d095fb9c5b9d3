//! Workflow instances.
//!
//! A [`Workflow`] binds a shared [`Definition`] to its own [`Marking`],
//! context values and listeners. It has no internal locking: concurrent
//! `apply`/`set_context` calls on one instance must be serialized by the
//! caller (the [`Registry`](crate::registry::Registry) hands out
//! instances behind a mutex for that reason).

use crate::diagram::Diagram;
use crate::definition::Definition;
use crate::error::{BoxError, CoreError};
use crate::event::{CallContext, Event, EventKind, GuardEvent};
use crate::listener::{self, ListenerId, Listeners, Registered, SharedListeners};
use crate::marking::Marking;
use crate::place::Place;
use crate::transition::Transition;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};

/// Flat string-keyed context values of a workflow instance.
pub type ContextMap = Map<String, Value>;

/// A workflow instance shared between threads.
pub type SharedWorkflow = Arc<Mutex<Workflow>>;

/// One running instance of a workflow definition.
#[derive(Debug)]
pub struct Workflow {
    name: String,
    definition: Arc<Definition>,
    initial_place: Place,
    marking: Marking,
    context: ContextMap,
    listeners: Listeners,
    /// Listener table of the owning manager, if any. Never owning.
    manager: Option<Weak<RwLock<Listeners>>>,
}

impl Workflow {
    /// Creates a workflow marked at `initial_place`.
    pub fn new(
        name: impl Into<String>,
        definition: Arc<Definition>,
        initial_place: impl Into<Place>,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        let initial_place = initial_place.into();

        if name.is_empty() {
            return Err(CoreError::InvalidWorkflow {
                reason: "workflow name cannot be empty".to_string(),
            });
        }
        if !definition.has_place(&initial_place) {
            return Err(CoreError::InvalidInitialPlace {
                place: initial_place.to_string(),
            });
        }

        let marking = Marking::new(std::slice::from_ref(&initial_place));
        Ok(Self {
            name,
            definition,
            initial_place,
            marking,
            context: ContextMap::new(),
            listeners: Listeners::new(),
            manager: None,
        })
    }

    /// Creates a workflow at the definition's default initial place.
    pub fn with_default_place(
        name: impl Into<String>,
        definition: Arc<Definition>,
    ) -> Result<Self, CoreError> {
        let initial = definition
            .initial_place()
            .cloned()
            .ok_or_else(|| CoreError::InvalidWorkflow {
                reason: "definition has no initial place".to_string(),
            })?;
        Self::new(name, definition, initial)
    }

    /// Rebuilds a workflow from its persisted places and context.
    ///
    /// The initial place is the definition's default if it has one, the
    /// first persisted place otherwise. Storage does not keep the place a
    /// workflow started in, so without a default the restored instance (and
    /// the `[*] -->` arrow of its diagram) starts where it currently is.
    pub fn restore(
        name: impl Into<String>,
        definition: Arc<Definition>,
        places: &[Place],
        context: ContextMap,
    ) -> Result<Self, CoreError> {
        let first = places.first().ok_or_else(|| CoreError::InvalidWorkflow {
            reason: "cannot restore a workflow without places".to_string(),
        })?;
        if let Some(place) = places.iter().find(|p| !definition.has_place(p)) {
            return Err(CoreError::InvalidPlace {
                place: place.to_string(),
            });
        }

        let initial = definition.initial_place().unwrap_or(first).clone();
        let mut workflow = Self::new(name, definition, initial)?;
        workflow.marking.set_places(places);
        workflow.context = context;
        Ok(workflow)
    }

    /// Wraps the workflow for sharing through a registry.
    pub fn into_shared(self) -> SharedWorkflow {
        Arc::new(Mutex::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &Arc<Definition> {
        &self.definition
    }

    pub fn initial_place(&self) -> &Place {
        &self.initial_place
    }

    pub fn marking(&self) -> &Marking {
        &self.marking
    }

    /// Replaces the marking wholesale, bypassing guards and events.
    pub fn set_marking(&mut self, marking: Marking) {
        self.marking = marking;
    }

    /// Returns a copy of the current places.
    pub fn current_places(&self) -> Vec<Place> {
        self.marking.places()
    }

    pub fn set_context(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.context.insert(key.into(), value.into());
    }

    pub fn context(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    pub fn context_map(&self) -> &ContextMap {
        &self.context
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Registers a listener on this instance only.
    pub fn add_event_listener<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&Event<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.listeners.add_event_listener(kind, listener)
    }

    /// Registers a guard listener on this instance only.
    pub fn add_guard_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&mut GuardEvent<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.listeners.add_guard_listener(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Attaches the listener table of the manager that owns this workflow.
    ///
    /// Only a weak reference is kept; once the manager is gone its
    /// listeners are skipped.
    pub fn set_manager(&mut self, listeners: &SharedListeners) {
        self.manager = Some(Arc::downgrade(listeners));
    }

    pub fn clear_manager(&mut self) {
        self.manager = None;
    }

    /// Returns true if a manager is attached and still alive.
    pub fn has_manager(&self) -> bool {
        self.manager
            .as_ref()
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Returns every transition whose `from` places are all marked.
    pub fn enabled_transitions(&self) -> Vec<&Transition> {
        self.definition
            .transitions()
            .iter()
            .filter(|t| self.marking.contains_all(t.from()))
            .collect()
    }

    /// Checks whether the workflow can move to `to`.
    pub fn can(&self, to: &[Place]) -> Result<(), CoreError> {
        self.can_with_context(&CallContext::default(), to)
    }

    /// Checks whether the workflow can move to `to`, passing `ctx` to
    /// constraints and guard listeners.
    ///
    /// `to` must equal the transition's declared targets in the same order.
    pub fn can_with_context(&self, ctx: &CallContext, to: &[Place]) -> Result<(), CoreError> {
        if to.is_empty() {
            return Err(CoreError::InvalidTransition);
        }
        self.check_declared(to)?;

        let transition = self
            .enabled_transitions()
            .into_iter()
            .find(|t| t.leads_to(to))
            .ok_or(CoreError::TransitionNotAllowed)?;

        self.guard(ctx, transition, to)
    }

    /// Moves the workflow to `to`.
    pub fn apply(&mut self, to: &[Place]) -> Result<(), CoreError> {
        self.apply_with_context(&CallContext::default(), to)
    }

    /// Moves the workflow to `to`, passing `ctx` to every event.
    ///
    /// Guards run first and may reject without changing anything. The
    /// marking then changes between the `before_transition` and
    /// `after_transition` events; an error from an `after_transition`
    /// listener is returned but the new marking stays in place.
    pub fn apply_with_context(&mut self, ctx: &CallContext, to: &[Place]) -> Result<(), CoreError> {
        self.check_declared(to)?;
        self.can_with_context(ctx, to)?;

        let definition = Arc::clone(&self.definition);
        let transition = definition
            .transitions()
            .iter()
            .find(|t| self.marking.contains_all(t.from()) && t.leads_to(to))
            .ok_or(CoreError::InvalidTransition)?;

        let before = Event::new(
            EventKind::BeforeTransition,
            transition,
            transition.from(),
            to,
            self,
            ctx,
        );
        self.fire(&before)?;

        self.marking.fire(transition.from(), to);
        tracing::debug!(
            "workflow {}: applied '{}' {:?} -> {:?}",
            self.name,
            transition.name(),
            transition.from(),
            to
        );

        let after = Event::new(
            EventKind::AfterTransition,
            transition,
            transition.from(),
            to,
            self,
            ctx,
        );
        self.fire(&after)
    }

    /// Renders the definition and current marking as a state diagram.
    pub fn diagram(&self) -> String {
        Diagram::new(&self.definition, &self.marking, &self.initial_place).to_string()
    }

    fn check_declared(&self, places: &[Place]) -> Result<(), CoreError> {
        match places.iter().find(|p| !self.definition.has_place(p)) {
            Some(place) => Err(CoreError::InvalidPlace {
                place: place.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn guard(&self, ctx: &CallContext, transition: &Transition, to: &[Place]) -> Result<(), CoreError> {
        let mut event = GuardEvent::new(transition, transition.from(), to, self, ctx);

        transition.validate(event.event())?;

        let manager = self.manager_listeners(EventKind::Guard);
        listener::dispatch_guard(self.tiers(EventKind::Guard, &manager), &mut event)?;

        if event.is_blocking() {
            tracing::debug!(
                "workflow {}: guard blocked '{}'",
                self.name,
                transition.name()
            );
            return Err(CoreError::TransitionNotAllowed);
        }
        Ok(())
    }

    fn fire(&self, event: &Event<'_>) -> Result<(), CoreError> {
        let manager = self.manager_listeners(event.kind());
        listener::dispatch_event(self.tiers(event.kind(), &manager), event)
    }

    fn tiers<'a>(&'a self, kind: EventKind, manager: &'a [Registered]) -> [&'a [Registered]; 3] {
        [
            self.definition.listeners().for_kind(kind),
            manager,
            self.listeners.for_kind(kind),
        ]
    }

    /// Snapshots the manager's listeners so none of them run under its lock.
    fn manager_listeners(&self, kind: EventKind) -> Vec<Registered> {
        let Some(weak) = &self.manager else {
            return Vec::new();
        };
        let Some(listeners) = weak.upgrade() else {
            tracing::debug!("workflow {}: manager dropped, skipping its listeners", self.name);
            return Vec::new();
        };
        let table = listeners.read();
        table.for_kind(kind).to_vec()
    }
}
