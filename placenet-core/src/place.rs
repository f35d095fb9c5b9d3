//! Place labels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named state-slot a workflow instance can occupy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Place(String);

impl Place {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Place {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Place {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Place {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for Place {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Place {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Builds a place list from string literals.
pub fn places<I, S>(names: I) -> Vec<Place>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(|n| Place(n.into())).collect()
}
