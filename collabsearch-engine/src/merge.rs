//! Filter merge engine.
//!
//! Combines the filter fragments of several collaborations into the single
//! filter sent with a query:
//! - field-expression groups and free-text groups are unioned, duplicates
//!   dropped, first-seen order kept;
//! - the date format must agree across fragments, a disagreement is reported
//!   as a conflict and the first value seen is used;
//! - opaque predicate classes are carried through, a later fragment setting
//!   the same key overrides an earlier one.
//!
//! Fragment selection (who contributes to a merge) is also here, so the
//! resolver only has to dispatch.

use crate::error::CollaborationError;
use collabsearch_bus::Bus;
use collabsearch_types::{CollaborationMap, ContributorId, Filter};
use tracing::warn;

/// Outcome of a merge: the combined filter and a conflict, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedFilter {
    pub filter: Filter,
    pub conflict: Option<CollaborationError>,
}

/// Merges filter fragments into one filter.
pub fn merge_filters<'a, I>(fragments: I) -> MergedFilter
where
    I: IntoIterator<Item = &'a Filter>,
{
    let mut merged = Filter::new();
    let mut groups = Vec::new();
    let mut terms = Vec::new();
    let mut dateformats: Vec<String> = Vec::new();

    for fragment in fragments {
        for group in fragment.groups() {
            if !groups.contains(group) {
                groups.push(group.clone());
            }
        }
        for group in fragment.query_groups() {
            if !terms.contains(group) {
                terms.push(group.clone());
            }
        }
        if let Some(dateformat) = &fragment.dateformat
            && !dateformats.contains(dateformat)
        {
            dateformats.push(dateformat.clone());
        }
        for (key, value) in &fragment.extra {
            merged.extra.insert(key.clone(), value.clone());
        }
    }

    let conflict = if dateformats.len() > 1 {
        warn!(?dateformats, "dateformat conflict while merging filters");
        Some(CollaborationError::DateformatConflict {
            dateformats: dateformats.clone(),
        })
    } else {
        None
    };

    if !groups.is_empty() {
        merged.f = Some(groups);
    }
    if !terms.is_empty() {
        merged.q = Some(terms);
    }
    merged.dateformat = dateformats.into_iter().next();
    merged.righthand = Some(false);

    MergedFilter {
        filter: merged,
        conflict,
    }
}

/// Merges fragments and publishes a conflict, if any, on the error bus.
pub fn merge_and_report<'a, I>(fragments: I, errors: &Bus<CollaborationError>) -> Filter
where
    I: IntoIterator<Item = &'a Filter>,
{
    let MergedFilter { filter, conflict } = merge_filters(fragments);
    if let Some(conflict) = conflict {
        errors.publish(conflict);
    }
    filter
}

/// Fragments of a single contributor: its own enabled collaboration on
/// `collection`, nothing when it has none.
pub fn own_fragments(
    collaborations: &CollaborationMap,
    collection: &str,
    contributor: Option<&ContributorId>,
) -> Vec<Filter> {
    contributor
        .and_then(|id| collaborations.get(id))
        .filter(|collab| collab.enabled)
        .and_then(|collab| collab.contribution(collection))
        .cloned()
        .into_iter()
        .collect()
}

/// Fragments of every enabled collaboration on `collection` except the
/// excluded contributor's. With no exclusion every enabled collaboration
/// contributes.
pub fn fragments_but_not(
    collaborations: &CollaborationMap,
    collection: &str,
    excluded: Option<&ContributorId>,
) -> Vec<Filter> {
    collaborations
        .iter()
        .filter(|(id, collab)| collab.enabled && Some(*id) != excluded)
        .filter_map(|(_, collab)| collab.contribution(collection).cloned())
        .collect()
}
