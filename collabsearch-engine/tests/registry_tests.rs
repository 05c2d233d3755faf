mod common;

use collabsearch_engine::transport::mock::MockTransport;
use collabsearch_engine::{CollaborationError, CollaborativeSearch, ConfigService, EngineConfig};
use collabsearch_types::{
    Collaboration, CollaborationEvent, CollaborationMap, CollectionCount, EventOrigin, Hits,
    Operation, ProjectionKind, ProjectionResult,
};
use common::{eq, id, make_search, quiet_engine, StaticContributor};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::time::Duration;

fn search() -> CollaborativeSearch {
    make_search(MockTransport::new().shared())
}

// ── Registration ─────────────────────────────────────────────────

#[test]
fn register_twice_keeps_one_entry_and_unions_collections() {
    let search = search();
    search.register(StaticContributor::new("chart", &["products"]).shared());
    search.register(StaticContributor::new("chart", &["orders", "stores"]).shared());

    assert_eq!(search.registered_contributors(), vec![id("chart")]);
    let collections: Vec<_> = search.collections().into_iter().collect();
    assert_eq!(collections, vec!["orders", "products", "stores"]);

    // Last registration wins.
    let descriptor = search.contributor(&id("chart")).unwrap();
    assert_eq!(descriptor.collections(), vec!["orders", "stores"]);
}

#[test]
fn unknown_contributor_lookups() {
    let search = search();
    assert!(search.contributor(&id("ghost")).is_none());
    assert_eq!(
        search.filter_display_name(&id("ghost")),
        Err(CollaborationError::UnknownContributor(id("ghost")))
    );

    search.register(StaticContributor::new("map", &["products"]).shared());
    assert_eq!(search.filter_display_name(&id("map")).unwrap(), "map");
}

#[test]
fn default_collection_from_engine_config() {
    assert_eq!(search().default_collection(), Some("products"));

    let bare = CollaborativeSearch::new(MockTransport::new().shared(), ConfigService::default());
    assert_eq!(bare.default_collection(), None);
}

// ── Mutations & events ───────────────────────────────────────────

#[test]
fn set_filter_forces_enabled_and_emits_add() {
    let search = search();
    let mut events = search.collaboration_events();

    let mut collab = Collaboration::single("products", eq("color", "red"));
    collab.enabled = false;
    search.set_filter(&id("a"), collab);

    assert!(search.is_enabled(&id("a")));
    assert_eq!(events.drain(), vec![CollaborationEvent::added(id("a"))]);
}

#[test]
fn set_filter_replaces_previous_collaboration() {
    let search = search();
    search.set_filter(&id("a"), Collaboration::single("products", eq("color", "red")));
    search.set_filter(&id("a"), Collaboration::single("products", eq("color", "blue")));

    let stored = search.get_collaboration(&id("a")).unwrap();
    assert_eq!(stored.contribution("products"), Some(&eq("color", "blue")));
    assert_eq!(search.all_contributors(), vec![id("a")]);
}

#[test]
fn remove_filter_emits_then_deletes() {
    let search = search();
    search.set_filter(&id("a"), Collaboration::single("products", eq("color", "red")));
    let mut events = search.collaboration_events();

    search.remove_filter(&id("a"));

    assert_eq!(events.drain(), vec![CollaborationEvent::removed(id("a"))]);
    assert!(search.get_collaboration(&id("a")).is_none());
}

#[test]
fn remove_all_clears_every_collaboration() {
    let search = search();
    search.set_filter(&id("a"), Collaboration::single("products", eq("color", "red")));
    search.set_filter(&id("b"), Collaboration::single("products", eq("size", "xl")));
    let mut events = search.collaboration_events();

    search.remove_all();

    let drained = events.drain();
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].id, EventOrigin::All);
    assert_eq!(drained[0].operation, Operation::Remove);
    assert!(drained[0].all);
    assert!(search.collaborations().is_empty());
}

#[test]
fn enable_and_disable_broadcast_as_all_by_default() {
    let search = search();
    search.set_filter(&id("a"), Collaboration::single("products", eq("color", "red")));
    let mut events = search.collaboration_events();

    search.disable(&id("a"));
    assert!(!search.is_enabled(&id("a")));
    assert_eq!(search.disabled_contributors(), vec![id("a")]);
    assert!(search.enabled_contributors().is_empty());

    search.enable(&id("a"));
    assert!(search.is_enabled(&id("a")));

    let drained = events.drain();
    assert_eq!(drained.len(), 2);
    for event in drained {
        assert_eq!(event.id, EventOrigin::Contributor(id("a")));
        assert_eq!(event.operation, Operation::Add);
        assert!(event.all);
    }
}

#[test]
fn enable_can_emit_precise_events() {
    let engine = EngineConfig {
        broadcast_enable_as_all: false,
        ..quiet_engine()
    };
    let search = CollaborativeSearch::with_engine_config(
        MockTransport::new().shared(),
        ConfigService::default(),
        engine,
    );
    search.set_filter(&id("a"), Collaboration::single("products", eq("color", "red")));
    let mut events = search.collaboration_events();

    search.disable(&id("a"));

    assert_eq!(events.drain(), vec![CollaborationEvent::added(id("a"))]);
}

#[test]
fn enable_absent_contributor_is_a_noop_that_still_emits() {
    let search = search();
    let mut events = search.collaboration_events();

    search.enable(&id("ghost"));

    assert!(search.get_collaboration(&id("ghost")).is_none());
    assert!(!search.is_enabled(&id("ghost")));
    assert_eq!(events.drain().len(), 1);
}

#[test]
fn set_collaborations_keeps_registered_ids_only() {
    let search = search();
    search.register(StaticContributor::new("a", &["products"]).shared());
    search.set_filter(&id("old"), Collaboration::single("products", eq("k", "v")));
    let mut events = search.collaboration_events();

    let snapshot = CollaborationMap::from([
        (id("a"), Collaboration::single("products", eq("color", "red"))),
        (id("stranger"), Collaboration::single("products", eq("size", "xl"))),
    ]);
    search.set_collaborations(snapshot);

    assert_eq!(search.all_contributors(), vec![id("a")]);
    assert_eq!(events.drain(), vec![CollaborationEvent::url_loaded()]);
}

#[test]
fn get_collaboration_of_absent_contributor_is_none() {
    assert!(search().get_collaboration(&id("nobody")).is_none());
}

// ── Removal of "all" ─────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Step {
    Set(u8),
    Remove(u8),
    Enable(u8),
    Disable(u8),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0u8..4).prop_map(Step::Set),
        (0u8..4).prop_map(Step::Remove),
        (0u8..4).prop_map(Step::Enable),
        (0u8..4).prop_map(Step::Disable),
    ]
}

proptest! {
    #[test]
    fn remove_all_always_empties_the_map(steps in prop::collection::vec(step(), 0..20)) {
        let search = search();
        for step in steps {
            match step {
                Step::Set(n) => search.set_filter(
                    &id(&format!("c{n}")),
                    Collaboration::single("products", eq("n", &n.to_string())),
                ),
                Step::Remove(n) => search.remove_filter(&id(&format!("c{n}"))),
                Step::Enable(n) => search.enable(&id(&format!("c{n}"))),
                Step::Disable(n) => search.disable(&id(&format!("c{n}"))),
            }
        }
        search.remove_all();
        prop_assert!(search.collaborations().is_empty());
    }
}

// ── Count-all ────────────────────────────────────────────────────

fn counting_transport() -> MockTransport {
    MockTransport::new().with_responder(|request| {
        let filters = request.filter.f.as_ref().map_or(0, Vec::len) as u64;
        Ok(ProjectionResult::Hits(Hits {
            collection: Some(request.collection.clone()),
            totalnb: 100 - filters * 10,
            ..Hits::default()
        }))
    })
}

#[tokio::test]
async fn refresh_count_all_counts_every_collection() {
    let search = make_search(counting_transport().shared());
    search.register(StaticContributor::new("a", &["products"]).shared());
    search.register(StaticContributor::new("b", &["orders"]).shared());
    search.set_filter(&id("a"), Collaboration::single("products", eq("color", "red")));

    let counts = search.refresh_count_all().await;

    assert_eq!(
        counts,
        vec![
            CollectionCount { collection: "orders".into(), count: 100 },
            CollectionCount { collection: "products".into(), count: 90 },
        ]
    );
    assert_eq!(*search.count_all().borrow(), counts);
}

#[tokio::test]
async fn events_schedule_a_count_refresh() {
    let transport = counting_transport().shared();
    let search = CollaborativeSearch::with_engine_config(
        transport.clone(),
        ConfigService::default(),
        EngineConfig::default(),
    );
    search.register(StaticContributor::new("a", &["products"]).shared());
    let mut counts = search.count_all();

    search.set_filter(&id("a"), Collaboration::single("products", eq("color", "red")));

    tokio::time::timeout(Duration::from_secs(1), counts.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        *counts.borrow(),
        vec![CollectionCount { collection: "products".into(), count: 90 }]
    );
    assert_eq!(transport.requests_of(ProjectionKind::Count).len(), 1);
}

#[test]
fn no_refresh_without_runtime() {
    let transport = counting_transport().shared();
    let search = CollaborativeSearch::with_engine_config(
        transport.clone(),
        ConfigService::default(),
        EngineConfig::default(),
    );
    search.register(StaticContributor::new("a", &["products"]).shared());
    search.set_filter(&id("a"), Collaboration::single("products", eq("color", "red")));

    assert_eq!(transport.request_count(), 0);
    assert!(search.count_all().borrow().is_empty());
}

// ── URL state helpers ────────────────────────────────────────────

#[test]
fn url_state_round_trip_through_registry() {
    let search = search();
    search.register(StaticContributor::new("a", &["products"]).shared());
    search.register(StaticContributor::new("b", &["orders"]).shared());
    search.set_filter(&id("a"), Collaboration::single("products", eq("color", "red")));
    search.set_filter(&id("b"), Collaboration::single("orders", eq("status", "open")));
    search.disable(&id("b"));

    let before = search.collaborations();
    let state = search.url_state().unwrap();
    search.remove_all();
    assert!(search.collaborations().is_empty());

    let mut events = search.collaboration_events();
    search.load_url_state(&state).unwrap();

    assert_eq!(search.collaborations(), before);
    assert_eq!(events.drain(), vec![CollaborationEvent::url_loaded()]);
}

#[test]
fn invalid_url_state_is_reported() {
    let search = search();
    let mut errors = search.errors();
    let mut events = search.collaboration_events();

    let result = search.load_url_state("filter={not json");

    assert!(matches!(result, Err(CollaborationError::UrlState(_))));
    assert_eq!(errors.drain().len(), 1);
    assert!(events.drain().is_empty());
}

#[test]
fn collections_set_is_append_only() {
    let search = search();
    search.register(StaticContributor::new("a", &["products", "orders"]).shared());
    search.register(StaticContributor::new("a", &["stores"]).shared());

    let expected: BTreeSet<String> = ["orders", "products", "stores"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(search.collections(), expected);
}
