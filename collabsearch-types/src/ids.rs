//! Identifier types used throughout collaborative search.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Origin names reserved for registry-wide events.
pub(crate) const RESERVED_IDS: [&str; 2] = ["all", "url"];

/// Unique identifier of a contributor (a widget taking part in the search).
///
/// Contributor ids are chosen by the application, usually from configuration,
/// so they are free-form strings rather than generated UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContributorId(String);

impl ContributorId {
    /// Creates a contributor id without validation.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parses a contributor id, rejecting empty strings and the reserved
    /// `"all"` / `"url"` event origins.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.is_empty() || RESERVED_IDS.contains(&s) {
            return Err(crate::Error::InvalidContributorId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContributorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContributorId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&str> for ContributorId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ContributorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for ContributorId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ContributorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
