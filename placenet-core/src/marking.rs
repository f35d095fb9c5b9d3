//! Current places of a workflow instance.

use crate::error::CoreError;
use crate::place::Place;
use serde::{Deserialize, Serialize};

/// The set of places a workflow instance currently occupies.
///
/// Order is insertion order. `set_places` stores the list as given and
/// does not deduplicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marking {
    places: Vec<Place>,
}

impl Marking {
    pub fn new(places: &[Place]) -> Self {
        Self {
            places: places.to_vec(),
        }
    }

    /// Returns a copy of the current places.
    pub fn places(&self) -> Vec<Place> {
        self.places.clone()
    }

    pub fn as_slice(&self) -> &[Place] {
        &self.places
    }

    pub fn set_places(&mut self, places: &[Place]) {
        self.places = places.to_vec();
    }

    pub fn has_place(&self, place: &Place) -> bool {
        self.places.contains(place)
    }

    /// Returns true if every place in `places` is marked, in any order.
    pub fn contains_all(&self, places: &[Place]) -> bool {
        places.iter().all(|p| self.has_place(p))
    }

    /// Adds a place. Adding a place that is already marked does nothing.
    pub fn add_place(&mut self, place: Place) {
        if !self.has_place(&place) {
            self.places.push(place);
        }
    }

    pub fn remove_place(&mut self, place: &Place) -> Result<(), CoreError> {
        match self.places.iter().position(|p| p == place) {
            Some(pos) => {
                self.places.remove(pos);
                Ok(())
            }
            None => Err(CoreError::PlaceNotMarked {
                place: place.to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    /// Removes every `consumed` place, then appends each `produced` place
    /// that is not still marked.
    pub(crate) fn fire(&mut self, consumed: &[Place], produced: &[Place]) {
        self.places.retain(|p| !consumed.contains(p));
        for place in produced {
            if !self.places.contains(place) {
                self.places.push(place.clone());
            }
        }
    }
}
