//! Transitions and per-transition constraints.

use crate::error::{BoxError, CoreError, Side};
use crate::event::Event;
use crate::place::Place;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// A predicate evaluated during the guard phase of a transition.
///
/// A constraint error is a hard failure: it is returned to the caller of
/// `can`/`apply` unchanged and no listener runs afterwards.
pub trait Constraint: Send + Sync {
    fn validate(&self, event: &Event<'_>) -> Result<(), BoxError>;
}

impl<F> Constraint for F
where
    F: Fn(&Event<'_>) -> Result<(), BoxError> + Send + Sync,
{
    fn validate(&self, event: &Event<'_>) -> Result<(), BoxError> {
        self(event)
    }
}

/// A named move consuming the `from` places and producing the `to` places.
#[derive(Clone)]
pub struct Transition {
    name: String,
    from: Vec<Place>,
    to: Vec<Place>,
    metadata: BTreeMap<String, Value>,
    constraints: Vec<Arc<dyn Constraint>>,
}

impl Transition {
    /// Creates a transition, checking name and place lists.
    ///
    /// `from` and `to` must each be non-empty and duplicate-free. A place
    /// may appear on both sides.
    pub fn new(
        name: impl Into<String>,
        from: Vec<Place>,
        to: Vec<Place>,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        if name.is_empty() {
            return Err(CoreError::EmptyName);
        }
        if from.is_empty() {
            return Err(CoreError::EmptyFromSet { transition: name });
        }
        if to.is_empty() {
            return Err(CoreError::EmptyToSet { transition: name });
        }
        check_unique(&name, Side::From, &from)?;
        check_unique(&name, Side::To, &to)?;

        Ok(Self {
            name,
            from,
            to,
            metadata: BTreeMap::new(),
            constraints: Vec::new(),
        })
    }

    /// Like [`Transition::new`] but panics on invalid input.
    ///
    /// Meant for static, known-good definitions.
    pub fn must(name: impl Into<String>, from: Vec<Place>, to: Vec<Place>) -> Self {
        match Self::new(name, from, to) {
            Ok(t) => t,
            Err(e) => panic!("invalid transition: {}", e),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn from(&self) -> &[Place] {
        &self.from
    }

    pub fn to(&self) -> &[Place] {
        &self.to
    }

    /// Returns true if `targets` equals `to` element by element, in order.
    pub fn leads_to(&self, targets: &[Place]) -> bool {
        self.to.as_slice() == targets
    }

    /// Attaches a constraint. Constraints run in attachment order.
    pub fn add_constraint<C>(&mut self, constraint: C)
    where
        C: Constraint + 'static,
    {
        self.constraints.push(Arc::new(constraint));
    }

    /// Builder form of [`Transition::add_constraint`].
    pub fn with_constraint<C>(mut self, constraint: C) -> Self
    where
        C: Constraint + 'static,
    {
        self.add_constraint(constraint);
        self
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn metadata_map(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    /// Runs every constraint against `event`; the first error wins.
    pub fn validate(&self, event: &Event<'_>) -> Result<(), CoreError> {
        for constraint in &self.constraints {
            constraint.validate(event).map_err(CoreError::Constraint)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("name", &self.name)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("metadata", &self.metadata)
            .field("constraints", &self.constraints.len())
            .finish()
    }
}

fn check_unique(transition: &str, side: Side, places: &[Place]) -> Result<(), CoreError> {
    let mut seen = HashSet::with_capacity(places.len());
    for place in places {
        if !seen.insert(place) {
            return Err(CoreError::DuplicatePlace {
                transition: transition.to_string(),
                side,
                place: place.to_string(),
            });
        }
    }
    Ok(())
}
