//! Listener tables and three-tier dispatch.
//!
//! Listeners are kept by three owners: the definition (shared by every
//! workflow of that type), the manager (shared by every managed workflow)
//! and the workflow instance itself. Each owner keeps one [`Listeners`]
//! table; [`dispatch_event`] and [`dispatch_guard`] walk the tables in that
//! fixed order and stop at the first error.

use crate::error::{BoxError, CoreError};
use crate::event::{Event, EventKind, GuardEvent};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Handles before/after events (and may observe guard events).
pub type EventListenerFn = Arc<dyn Fn(&Event<'_>) -> Result<(), BoxError> + Send + Sync>;

/// Handles guard events and may veto them.
pub type GuardListenerFn = Arc<dyn Fn(&mut GuardEvent<'_>) -> Result<(), BoxError> + Send + Sync>;

/// Listener table shared between a manager and the workflows it manages.
pub type SharedListeners = Arc<RwLock<Listeners>>;

/// Handle returned on registration, used to remove a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Clone)]
pub(crate) enum Registered {
    Event(ListenerId, EventListenerFn),
    Guard(ListenerId, GuardListenerFn),
}

impl Registered {
    fn id(&self) -> ListenerId {
        match self {
            Registered::Event(id, _) | Registered::Guard(id, _) => *id,
        }
    }
}

/// Ordered listeners per event kind.
#[derive(Clone, Default)]
pub struct Listeners {
    next_id: u64,
    by_kind: HashMap<EventKind, Vec<Registered>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedListeners {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Registers a listener for `kind`.
    ///
    /// A plain listener registered for [`EventKind::Guard`] observes guard
    /// events but cannot block them.
    pub fn add_event_listener<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&Event<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.by_kind
            .entry(kind)
            .or_default()
            .push(Registered::Event(id, Arc::new(listener)));
        id
    }

    /// Registers a guard listener.
    pub fn add_guard_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&mut GuardEvent<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.by_kind
            .entry(EventKind::Guard)
            .or_default()
            .push(Registered::Guard(id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns false if the id is unknown.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        for registered in self.by_kind.values_mut() {
            if let Some(pos) = registered.iter().position(|r| r.id() == id) {
                registered.remove(pos);
                return true;
            }
        }
        false
    }

    /// Number of listeners registered for `kind`.
    pub fn len(&self, kind: EventKind) -> usize {
        self.by_kind.get(&kind).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.values().all(Vec::is_empty)
    }

    pub(crate) fn for_kind(&self, kind: EventKind) -> &[Registered] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    fn next_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("before_transition", &self.len(EventKind::BeforeTransition))
            .field("after_transition", &self.len(EventKind::AfterTransition))
            .field("guard", &self.len(EventKind::Guard))
            .finish()
    }
}

/// Offers a before/after event to each tier in order.
pub(crate) fn dispatch_event(tiers: [&[Registered]; 3], event: &Event<'_>) -> Result<(), CoreError> {
    for registered in tiers.into_iter().flatten() {
        if let Registered::Event(_, listener) = registered {
            listener(event).map_err(CoreError::Listener)?;
        }
    }
    Ok(())
}

/// Offers a guard event to each tier in order.
pub(crate) fn dispatch_guard(
    tiers: [&[Registered]; 3],
    event: &mut GuardEvent<'_>,
) -> Result<(), CoreError> {
    for registered in tiers.into_iter().flatten() {
        match registered {
            Registered::Guard(_, listener) => listener(&mut *event).map_err(CoreError::Listener)?,
            Registered::Event(_, listener) => listener(event.event()).map_err(CoreError::Listener)?,
        }
    }
    Ok(())
}
