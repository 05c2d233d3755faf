//! Collaborations and collaboration events.
//!
//! A collaboration is the filter state one contributor currently imposes on
//! the shared dataset, scoped per collection. Every mutation of the registry
//! of collaborations produces exactly one immutable [`CollaborationEvent`].

use crate::ids::RESERVED_IDS;
use crate::{ContributorId, Filter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Filter state contributed by one contributor.
#[derive(Debug, Clone, PartialEq)]
pub struct Collaboration {
    /// Filter fragments keyed by target collection.
    pub filters: BTreeMap<String, Vec<Filter>>,
    /// Whether the collaboration currently takes part in merges.
    pub enabled: bool,
}

impl Default for Collaboration {
    fn default() -> Self {
        Self {
            filters: BTreeMap::new(),
            enabled: true,
        }
    }
}

impl Collaboration {
    /// Creates an empty, enabled collaboration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collaboration holding a single filter for one collection.
    #[must_use]
    pub fn single(collection: impl Into<String>, filter: Filter) -> Self {
        Self::new().with_filter(collection, filter)
    }

    /// Appends a filter fragment for a collection.
    #[must_use]
    pub fn with_filter(mut self, collection: impl Into<String>, filter: Filter) -> Self {
        self.filters.entry(collection.into()).or_default().push(filter);
        self
    }

    /// Returns the fragment list registered for a collection, if any.
    #[must_use]
    pub fn filters_for(&self, collection: &str) -> Option<&[Filter]> {
        self.filters.get(collection).map(Vec::as_slice)
    }

    /// Returns the fragment this collaboration contributes to a merge on
    /// `collection`: the first entry of a non-empty list.
    #[must_use]
    pub fn contribution(&self, collection: &str) -> Option<&Filter> {
        self.filters_for(collection).and_then(<[Filter]>::first)
    }

    /// Collections this collaboration has fragments for.
    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }
}

/// Collaborations keyed by contributor id.
pub type CollaborationMap = BTreeMap<ContributorId, Collaboration>;

/// Kind of registry mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Remove,
}

/// What caused a collaboration event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventOrigin {
    /// A single contributor's collaboration changed.
    Contributor(ContributorId),
    /// Every collaboration was removed at once.
    All,
    /// Collaborations were restored from a shared URL state.
    Url,
}

impl EventOrigin {
    /// Wire name of the origin: the contributor id, `"all"` or `"url"`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Contributor(id) => id.as_str(),
            Self::All => RESERVED_IDS[0],
            Self::Url => RESERVED_IDS[1],
        }
    }

    /// Returns the contributor id for contributor-scoped origins.
    #[must_use]
    pub fn contributor(&self) -> Option<&ContributorId> {
        match self {
            Self::Contributor(id) => Some(id),
            _ => None,
        }
    }

    /// True for the registry-wide `"all"` and `"url"` origins.
    #[must_use]
    pub fn is_global(&self) -> bool {
        !matches!(self, Self::Contributor(_))
    }
}

impl From<String> for EventOrigin {
    fn from(s: String) -> Self {
        match s.as_str() {
            "all" => Self::All,
            "url" => Self::Url,
            _ => Self::Contributor(ContributorId::from(s)),
        }
    }
}

impl From<EventOrigin> for String {
    fn from(origin: EventOrigin) -> Self {
        match origin {
            EventOrigin::Contributor(id) => id.as_str().to_string(),
            other => other.as_str().to_string(),
        }
    }
}

impl From<ContributorId> for EventOrigin {
    fn from(id: ContributorId) -> Self {
        Self::Contributor(id)
    }
}

impl fmt::Display for EventOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification that the registry of collaborations changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaborationEvent {
    pub id: EventOrigin,
    pub operation: Operation,
    /// Whether every subscriber should consider itself concerned.
    pub all: bool,
}

impl CollaborationEvent {
    #[must_use]
    pub fn new(id: EventOrigin, operation: Operation, all: bool) -> Self {
        Self { id, operation, all }
    }

    /// A contributor set its filter.
    #[must_use]
    pub fn added(id: ContributorId) -> Self {
        Self::new(EventOrigin::Contributor(id), Operation::Add, false)
    }

    /// A contributor removed its filter.
    #[must_use]
    pub fn removed(id: ContributorId) -> Self {
        Self::new(EventOrigin::Contributor(id), Operation::Remove, false)
    }

    /// Every collaboration was removed.
    #[must_use]
    pub fn all_removed() -> Self {
        Self::new(EventOrigin::All, Operation::Remove, true)
    }

    /// Collaborations were loaded from a URL state.
    #[must_use]
    pub fn url_loaded() -> Self {
        Self::new(EventOrigin::Url, Operation::Add, true)
    }

    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.operation == Operation::Remove
    }
}
