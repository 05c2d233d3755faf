//! Shareable filter state.
//!
//! The state of every collaboration is written as `filter=<JSON>`, where the
//! JSON object is keyed by contributor id and each collaboration's
//! per-collection filters are a plain JSON object. Collaborations written
//! before per-collection filters existed carry a single `filter` field; they
//! are read as the sole entry of the default collection.

use crate::error::{CollabResult, CollaborationError};
use collabsearch_types::{Collaboration, CollaborationMap, ContributorId, Filter};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Prefix of an encoded state.
pub const URL_STATE_PREFIX: &str = "filter=";

/// Ordered `(collection, filters)` pairs, written as a JSON object.
///
/// Only used at the serialization boundary: the in-memory model keeps a map
/// with unique keys, see [`Collaboration::filters`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterEntries(pub Vec<(String, Vec<Filter>)>);

impl Serialize for FilterEntries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (collection, filters) in &self.0 {
            map.serialize_entry(collection, filters)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FilterEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = FilterEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of collection name to filter list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((collection, filters)) = access.next_entry::<String, Vec<Filter>>()? {
                    entries.push((collection, filters));
                }
                Ok(FilterEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

impl From<&BTreeMap<String, Vec<Filter>>> for FilterEntries {
    fn from(filters: &BTreeMap<String, Vec<Filter>>) -> Self {
        Self(
            filters
                .iter()
                .map(|(collection, list)| (collection.clone(), list.clone()))
                .collect(),
        )
    }
}

impl From<FilterEntries> for BTreeMap<String, Vec<Filter>> {
    fn from(entries: FilterEntries) -> Self {
        // A repeated collection keeps its last list.
        entries.0.into_iter().collect()
    }
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
struct WireCollaboration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filters: Option<FilterEntries>,
    /// Legacy single filter, read only.
    #[serde(default, skip_serializing)]
    filter: Option<Filter>,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

impl WireCollaboration {
    fn into_collaboration(self, default_collection: Option<&str>) -> CollabResult<Collaboration> {
        let filters = match (self.filters, self.filter) {
            (Some(entries), _) => entries.into(),
            (None, Some(legacy)) => {
                let collection = default_collection.ok_or_else(|| {
                    CollaborationError::UrlState(
                        "legacy single-filter collaboration needs a default collection".into(),
                    )
                })?;
                BTreeMap::from([(collection.to_string(), vec![legacy])])
            }
            (None, None) => BTreeMap::new(),
        };
        Ok(Collaboration {
            filters,
            enabled: self.enabled,
        })
    }
}

/// Writes every collaboration as `filter=<JSON>`.
pub fn encode(collaborations: &CollaborationMap) -> CollabResult<String> {
    Ok(format!("{URL_STATE_PREFIX}{}", encode_json(collaborations)?))
}

/// Same as [`encode`] with the JSON part percent-encoded.
pub fn encode_url_safe(collaborations: &CollaborationMap) -> CollabResult<String> {
    let json = encode_json(collaborations)?;
    Ok(format!("{URL_STATE_PREFIX}{}", urlencoding::encode(&json)))
}

fn encode_json(collaborations: &CollaborationMap) -> CollabResult<String> {
    let wire: BTreeMap<&str, WireCollaboration> = collaborations
        .iter()
        .map(|(id, collab)| {
            (
                id.as_str(),
                WireCollaboration {
                    filters: Some(FilterEntries::from(&collab.filters)),
                    filter: None,
                    enabled: collab.enabled,
                },
            )
        })
        .collect();
    Ok(serde_json::to_string(&wire)?)
}

/// Reads a state written by [`encode`] or [`encode_url_safe`]. The
/// `filter=` prefix is optional.
pub fn decode(state: &str, default_collection: Option<&str>) -> CollabResult<CollaborationMap> {
    let body = state.trim();
    let body = body.strip_prefix(URL_STATE_PREFIX).unwrap_or(body);
    let json = if body.starts_with('{') {
        body.to_string()
    } else {
        urlencoding::decode(body)
            .map_err(|e| CollaborationError::UrlState(e.to_string()))?
            .into_owned()
    };

    let wire: BTreeMap<String, WireCollaboration> = serde_json::from_str(&json)
        .map_err(|e| CollaborationError::UrlState(e.to_string()))?;

    wire.into_iter()
        .map(|(id, collab)| {
            Ok((
                ContributorId::from(id),
                collab.into_collaboration(default_collection)?,
            ))
        })
        .collect()
}
