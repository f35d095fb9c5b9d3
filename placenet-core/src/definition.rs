//! Workflow definition types.
//!
//! Definitions can be built in code or from a document:
//!
//! ```json
//! {
//!   "places": ["draft", "review", "published"],
//!   "initial": "draft",
//!   "transitions": [
//!     {"name": "submit", "from": "draft", "to": "review"},
//!     {"name": "publish", "from": "review", "to": ["published"], "metadata": {"label": "Go live"}}
//!   ]
//! }
//! ```

use crate::error::{BoxError, CoreError};
use crate::event::{Event, EventKind, GuardEvent};
use crate::listener::{ListenerId, Listeners};
use crate::place::Place;
use crate::transition::Transition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// A transition as stored in a definition document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionDocument {
    pub name: String,

    /// Source place(s). A single string or a list.
    #[serde(deserialize_with = "deserialize_places")]
    pub from: Vec<Place>,

    /// Target place(s). A single string or a list.
    #[serde(deserialize_with = "deserialize_places")]
    pub to: Vec<Place>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

fn deserialize_places<'de, D>(deserializer: D) -> Result<Vec<Place>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct PlacesVisitor;

    impl<'de> Visitor<'de> for PlacesVisitor {
        type Value = Vec<Place>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a place name or a list of place names")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![Place::from(v)])
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut places = Vec::new();
            while let Some(p) = seq.next_element::<String>()? {
                places.push(Place::from(p));
            }
            Ok(places)
        }
    }

    deserializer.deserialize_any(PlacesVisitor)
}

/// Serializable form of a definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionDocument {
    pub places: Vec<Place>,

    /// Default initial place for new instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<Place>,

    #[serde(default)]
    pub transitions: Vec<TransitionDocument>,
}

/// Validated workflow schema: the legal places and the transitions between them.
///
/// The schema never changes after construction. Default listeners may be
/// registered until the definition is shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Definition {
    places: Vec<Place>,
    transitions: Vec<Transition>,
    initial: Option<Place>,
    listeners: Listeners,
    checksum: String,
}

impl Definition {
    /// Creates a definition, checking that every transition only references
    /// declared places.
    pub fn new(places: Vec<Place>, transitions: Vec<Transition>) -> Result<Self, CoreError> {
        let declared: HashSet<&Place> = places.iter().collect();

        for t in &transitions {
            for place in t.from().iter().chain(t.to()) {
                if !declared.contains(place) {
                    return Err(CoreError::InvalidSchema {
                        place: place.to_string(),
                        transition: t.name().to_string(),
                    });
                }
            }
        }

        let mut definition = Self {
            places,
            transitions,
            initial: None,
            listeners: Listeners::new(),
            checksum: String::new(),
        };
        definition.checksum = compute_checksum(&definition.to_document())?;
        Ok(definition)
    }

    /// Like [`Definition::new`] but panics on an invalid schema.
    pub fn must(places: Vec<Place>, transitions: Vec<Transition>) -> Self {
        match Self::new(places, transitions) {
            Ok(d) => d,
            Err(e) => panic!("invalid definition: {}", e),
        }
    }

    /// Sets the default initial place.
    pub fn with_initial_place(mut self, place: impl Into<Place>) -> Result<Self, CoreError> {
        let place = place.into();
        if !self.has_place(&place) {
            return Err(CoreError::InvalidInitialPlace {
                place: place.to_string(),
            });
        }
        self.initial = Some(place);
        self.checksum = compute_checksum(&self.to_document())?;
        Ok(self)
    }

    /// Builds a definition from a document.
    pub fn from_document(doc: DefinitionDocument) -> Result<Self, CoreError> {
        let mut transitions = Vec::with_capacity(doc.transitions.len());
        for t in doc.transitions {
            let mut transition = Transition::new(t.name, t.from, t.to)?;
            for (key, value) in t.metadata {
                transition.set_metadata(key, value);
            }
            transitions.push(transition);
        }

        let definition = Self::new(doc.places, transitions)?;
        match doc.initial {
            Some(initial) => definition.with_initial_place(initial),
            None => Ok(definition),
        }
    }

    /// Parses and validates a definition from JSON.
    pub fn from_json(json: &Value) -> Result<Self, CoreError> {
        let doc: DefinitionDocument = serde_json::from_value(json.clone())?;
        Self::from_document(doc)
    }

    /// Returns the document form of this definition. Constraints and
    /// listeners are not part of it.
    pub fn to_document(&self) -> DefinitionDocument {
        DefinitionDocument {
            places: self.places.clone(),
            initial: self.initial.clone(),
            transitions: self
                .transitions
                .iter()
                .map(|t| TransitionDocument {
                    name: t.name().to_string(),
                    from: t.from().to_vec(),
                    to: t.to().to_vec(),
                    metadata: t.metadata_map().clone(),
                })
                .collect(),
        }
    }

    pub fn places(&self) -> &[Place] {
        &self.places
    }

    /// Returns a copy of the declared places.
    pub fn all_places(&self) -> Vec<Place> {
        self.places.clone()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Returns a copy of the transitions.
    pub fn all_transitions(&self) -> Vec<Transition> {
        self.transitions.clone()
    }

    /// Looks up a transition by name. With duplicate names the first wins.
    pub fn transition(&self, name: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.name() == name)
    }

    /// Returns true if the place is declared.
    pub fn has_place(&self, place: &Place) -> bool {
        self.places.contains(place)
    }

    pub fn initial_place(&self) -> Option<&Place> {
        self.initial.as_ref()
    }

    /// CRC32C of the document form, as 8 hex digits.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Registers a default listener for every workflow built from this definition.
    pub fn add_event_listener<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&Event<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.listeners.add_event_listener(kind, listener)
    }

    /// Registers a default guard listener.
    pub fn add_guard_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&mut GuardEvent<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.listeners.add_guard_listener(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }
}

fn compute_checksum(doc: &DefinitionDocument) -> Result<String, CoreError> {
    let json_bytes = serde_json::to_vec(doc)?;
    Ok(format!("{:08x}", crc32c::crc32c(&json_bytes)))
}
