mod common;

use collabsearch_bus::Bus;
use collabsearch_engine::merge::{fragments_but_not, merge_and_report, own_fragments};
use collabsearch_engine::{merge_filters, CollaborationError};
use collabsearch_types::{
    Collaboration, CollaborationMap, Expression, ExpressionOp, Filter,
};
use common::{eq, id};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeSet;

fn expression_set(filter: &Filter) -> BTreeSet<String> {
    filter
        .groups()
        .map(|group| {
            group
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(";")
        })
        .collect()
}

fn term_set(filter: &Filter) -> BTreeSet<Vec<String>> {
    filter.query_groups().cloned().collect()
}

// ── Unions ───────────────────────────────────────────────────────

#[test]
fn unions_groups_in_first_seen_order() {
    let a = eq("color", "red").with_group(vec![Expression::new("size", ExpressionOp::Gte, "10")]);
    let b = eq("brand", "acme").with_group(vec![Expression::new("color", ExpressionOp::Eq, "red")]);

    let merged = merge_filters([&a, &b]).filter;

    let groups: Vec<String> = merged
        .groups()
        .map(|g| g.iter().map(ToString::to_string).collect::<Vec<_>>().join(";"))
        .collect();
    assert_eq!(groups, vec!["color:eq:red", "size:gte:10", "brand:eq:acme"]);
}

#[test]
fn unions_query_terms() {
    let a = Filter::new().with_query(vec!["rust".into()]);
    let b = Filter::new()
        .with_query(vec!["rust".into()])
        .with_query(vec!["tokio".into(), "async".into()]);

    let merged = merge_filters([&a, &b]).filter;

    assert_eq!(
        merged.q,
        Some(vec![vec!["rust".to_string()], vec!["tokio".into(), "async".into()]])
    );
}

#[test]
fn empty_input_yields_bare_filter() {
    let merged = merge_filters(std::iter::empty::<&Filter>());
    assert!(merged.conflict.is_none());
    assert!(merged.filter.f.is_none());
    assert!(merged.filter.q.is_none());
    assert!(merged.filter.dateformat.is_none());
    assert_eq!(merged.filter.righthand, Some(false));
}

#[test]
fn groups_are_compared_structurally() {
    let a = Filter::new().with_group(vec![
        Expression::new("a", ExpressionOp::Eq, "1"),
        Expression::new("b", ExpressionOp::Eq, "2"),
    ]);
    // Same members, different order: a different group.
    let b = Filter::new().with_group(vec![
        Expression::new("b", ExpressionOp::Eq, "2"),
        Expression::new("a", ExpressionOp::Eq, "1"),
    ]);

    let merged = merge_filters([&a, &b, &a.clone()]).filter;
    assert_eq!(merged.f.map(|f| f.len()), Some(2));
}

// ── Date format ──────────────────────────────────────────────────

#[test]
fn agreeing_dateformats_do_not_conflict() {
    let a = eq("x", "1").with_dateformat("epoch_second");
    let b = eq("y", "2").with_dateformat("epoch_second");
    let c = eq("z", "3");

    let merged = merge_filters([&a, &b, &c]);

    assert!(merged.conflict.is_none());
    assert_eq!(merged.filter.dateformat.as_deref(), Some("epoch_second"));
}

#[test]
fn conflicting_dateformats_report_and_keep_first() {
    let a = eq("x", "1").with_dateformat("epoch_second");
    let b = eq("y", "2").with_dateformat("iso_8601");

    let merged = merge_filters([&a, &b]);

    assert_eq!(
        merged.conflict,
        Some(CollaborationError::DateformatConflict {
            dateformats: vec!["epoch_second".into(), "iso_8601".into()],
        })
    );
    assert_eq!(merged.filter.dateformat.as_deref(), Some("epoch_second"));
    assert_eq!(expression_set(&merged.filter).len(), 2);
}

#[test]
fn conflict_is_published_exactly_once() {
    let errors = Bus::new("errors");
    let mut sub = errors.subscribe();
    let a = eq("x", "1").with_dateformat("epoch_second");
    let b = eq("y", "2").with_dateformat("iso_8601");
    let c = eq("z", "3").with_dateformat("iso_8601");

    let filter = merge_and_report([&a, &b, &c], &errors);

    assert_eq!(filter.dateformat.as_deref(), Some("epoch_second"));
    let published = sub.drain();
    assert_eq!(published.len(), 1);
    assert!(matches!(published[0], CollaborationError::DateformatConflict { .. }));
}

// ── Opaque predicates ────────────────────────────────────────────

#[test]
fn extra_predicates_last_writer_wins() {
    let a = Filter::new()
        .with_extra("pwithin", json!("POLYGON A"))
        .with_extra("gintersect", json!("LINE"));
    let b = Filter::new().with_extra("pwithin", json!("POLYGON B"));

    let merged = merge_filters([&a, &b]).filter;

    assert_eq!(merged.extra["pwithin"], json!("POLYGON B"));
    assert_eq!(merged.extra["gintersect"], json!("LINE"));
}

// ── Fragment selection ───────────────────────────────────────────

fn two_collaborations() -> CollaborationMap {
    CollaborationMap::from([
        (id("a"), Collaboration::single("products", eq("x", "1"))),
        (
            id("b"),
            Collaboration::single("products", eq("y", "2"))
                .with_filter("products", eq("ignored", "second"))
                .with_filter("orders", eq("status", "open")),
        ),
    ])
}

#[test]
fn own_fragments_only_the_first_of_the_contributor() {
    let map = two_collaborations();

    assert_eq!(own_fragments(&map, "products", Some(&id("b"))), vec![eq("y", "2")]);
    assert_eq!(own_fragments(&map, "orders", Some(&id("b"))), vec![eq("status", "open")]);
    assert!(own_fragments(&map, "orders", Some(&id("a"))).is_empty());
    assert!(own_fragments(&map, "products", None).is_empty());
}

#[test]
fn own_fragments_skip_disabled() {
    let mut map = two_collaborations();
    map.get_mut(&id("a")).unwrap().enabled = false;
    assert!(own_fragments(&map, "products", Some(&id("a"))).is_empty());
}

#[test]
fn fragments_but_not_excludes_one_contributor() {
    let map = two_collaborations();

    assert_eq!(
        fragments_but_not(&map, "products", Some(&id("a"))),
        vec![eq("y", "2")]
    );
    assert_eq!(
        fragments_but_not(&map, "products", None),
        vec![eq("x", "1"), eq("y", "2")]
    );
}

#[test]
fn fragments_but_not_skips_disabled_and_empty_lists() {
    let mut map = two_collaborations();
    map.get_mut(&id("b")).unwrap().enabled = false;
    map.insert(
        id("c"),
        Collaboration {
            filters: [("products".to_string(), Vec::new())].into(),
            enabled: true,
        },
    );

    assert_eq!(fragments_but_not(&map, "products", None), vec![eq("x", "1")]);
}

#[test]
fn excluding_the_sole_contributor_equals_an_empty_registry() {
    let only = CollaborationMap::from([(id("a"), Collaboration::single("products", eq("x", "1")))]);
    let empty = CollaborationMap::new();

    let excluded = merge_filters(&fragments_but_not(&only, "products", Some(&id("a")))).filter;
    let nothing = merge_filters(&fragments_but_not(&empty, "products", None)).filter;

    assert_eq!(excluded, nothing);
}

#[test]
fn own_resolves_union_to_the_unexcluded_resolve() {
    let map = CollaborationMap::from([
        (id("a"), Collaboration::single("products", eq("x", "1"))),
        (id("b"), Collaboration::single("products", eq("y", "2"))),
    ]);

    let mut from_own = BTreeSet::new();
    for contributor in map.keys() {
        let own = merge_filters(&own_fragments(&map, "products", Some(contributor))).filter;
        from_own.extend(expression_set(&own));
    }
    let everyone = merge_filters(&fragments_but_not(&map, "products", None)).filter;

    let expected: BTreeSet<String> = ["x:eq:1".to_string(), "y:eq:2".to_string()].into();
    assert_eq!(from_own, expected);
    assert_eq!(expression_set(&everyone), expected);
}

// ── Properties ───────────────────────────────────────────────────

fn arb_expression() -> impl Strategy<Value = Expression> {
    ("[a-c]", "[0-3]").prop_map(|(field, value)| Expression::new(field, ExpressionOp::Eq, value))
}

fn arb_filter() -> impl Strategy<Value = Filter> {
    (
        prop::collection::vec(prop::collection::vec(arb_expression(), 1..3), 0..4),
        prop::collection::vec(prop::collection::vec("[a-d]{1,3}", 1..3), 0..3),
    )
        .prop_map(|(groups, terms)| {
            let mut filter = Filter::new();
            for group in groups {
                filter = filter.with_group(group);
            }
            for group in terms {
                filter = filter.with_query(group);
            }
            filter
        })
}

proptest! {
    #[test]
    fn merge_is_commutative_on_sets(a in arb_filter(), b in arb_filter()) {
        let ab = merge_filters([&a, &b]).filter;
        let ba = merge_filters([&b, &a]).filter;
        prop_assert_eq!(expression_set(&ab), expression_set(&ba));
        prop_assert_eq!(term_set(&ab), term_set(&ba));
    }

    #[test]
    fn merge_is_idempotent_on_sets(a in arb_filter()) {
        let once = merge_filters([&a]).filter;
        let twice = merge_filters([&a, &a]).filter;
        prop_assert_eq!(expression_set(&once), expression_set(&twice));
        prop_assert_eq!(term_set(&once), term_set(&twice));
    }

    #[test]
    fn merged_groups_have_no_duplicates(fragments in prop::collection::vec(arb_filter(), 0..5)) {
        let merged = merge_filters(&fragments).filter;
        let groups: Vec<_> = merged.groups().collect();
        for (i, group) in groups.iter().enumerate() {
            prop_assert!(!groups[i + 1..].contains(group));
        }
    }
}
