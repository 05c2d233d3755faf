#![allow(dead_code)]

use async_trait::async_trait;
use collabsearch_engine::transport::mock::MockTransport;
use collabsearch_engine::{
    CollabResult, CollaborationError, CollaborativeSearch, ConfigService, Contributor,
    ContributorDescriptor, EngineConfig, ResolveOptions,
};
use collabsearch_types::{
    Collaboration, CollaborationEvent, ContributorId, ExpressionOp, Filter, Hits, Projection,
};
use parking_lot::Mutex;
use std::sync::Arc;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn id(s: &str) -> ContributorId {
    ContributorId::new(s)
}

/// Single-expression filter `field:eq:value`.
pub fn eq(field: &str, value: &str) -> Filter {
    Filter::expression(field, ExpressionOp::Eq, value)
}

/// Engine settings without background count refreshes, so mock transports
/// only see the queries a test makes.
pub fn quiet_engine() -> EngineConfig {
    EngineConfig {
        refresh_count_all: false,
        ..EngineConfig::default()
    }
    .with_default_collection("products")
}

pub fn make_search(transport: Arc<MockTransport>) -> CollaborativeSearch {
    init_tracing();
    CollaborativeSearch::with_engine_config(transport, ConfigService::default(), quiet_engine())
}

/// Descriptor with no lifecycle, for registry-only tests.
pub struct StaticContributor {
    pub id: ContributorId,
    pub collections: Vec<String>,
    pub linked: Option<ContributorId>,
    pub own_updates: bool,
}

impl StaticContributor {
    pub fn new(id: &str, collections: &[&str]) -> Self {
        Self {
            id: ContributorId::new(id),
            collections: collections.iter().map(|c| c.to_string()).collect(),
            linked: None,
            own_updates: false,
        }
    }

    pub fn linked_to(mut self, linked: &str) -> Self {
        self.linked = Some(ContributorId::new(linked));
        self
    }

    pub fn updating_on_own(mut self) -> Self {
        self.own_updates = true;
        self
    }

    pub fn shared(self) -> Arc<dyn ContributorDescriptor> {
        Arc::new(self)
    }
}

impl ContributorDescriptor for StaticContributor {
    fn identifier(&self) -> &ContributorId {
        &self.id
    }

    fn package_name(&self) -> &str {
        "test"
    }

    fn collections(&self) -> Vec<String> {
        self.collections.clone()
    }

    fn linked_contributor_id(&self) -> Option<&ContributorId> {
        self.linked.as_ref()
    }

    fn is_update_enabled_on_own_collaboration(&self) -> bool {
        self.own_updates
    }
}

/// Contributor counting the hits of everyone else's filters, recording
/// every hook call.
pub struct RecordingContributor {
    pub descriptor: StaticContributor,
    pub fail_with: Option<CollaborationError>,
    pub fetched: Mutex<Vec<CollaborationEvent>>,
    pub data: Mutex<Vec<u64>>,
    pub selections: Mutex<Vec<Option<Collaboration>>>,
}

impl RecordingContributor {
    pub fn new(id: &str, collection: &str) -> Self {
        Self {
            descriptor: StaticContributor::new(id, &[collection]),
            fail_with: None,
            fetched: Mutex::new(Vec::new()),
            data: Mutex::new(Vec::new()),
            selections: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, error: CollaborationError) -> Self {
        self.fail_with = Some(error);
        self
    }

    pub fn fetched(&self) -> Vec<CollaborationEvent> {
        self.fetched.lock().clone()
    }

    pub fn selections(&self) -> Vec<Option<Collaboration>> {
        self.selections.lock().clone()
    }
}

impl ContributorDescriptor for RecordingContributor {
    fn identifier(&self) -> &ContributorId {
        self.descriptor.identifier()
    }

    fn package_name(&self) -> &str {
        "recording"
    }

    fn collections(&self) -> Vec<String> {
        self.descriptor.collections()
    }

    fn linked_contributor_id(&self) -> Option<&ContributorId> {
        self.descriptor.linked_contributor_id()
    }

    fn is_update_enabled_on_own_collaboration(&self) -> bool {
        self.descriptor.own_updates
    }
}

#[async_trait]
impl Contributor for RecordingContributor {
    type Fetched = Hits;
    type Data = u64;

    async fn fetch_data(
        &self,
        search: &CollaborativeSearch,
        event: &CollaborationEvent,
    ) -> CollabResult<Hits> {
        self.fetched.lock().push(event.clone());
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        let collection = self.descriptor.collections[0].clone();
        search
            .resolve_but_not_hits(
                Projection::count(),
                &collection,
                Some(self.identifier()),
                ResolveOptions::default(),
            )
            .await
    }

    fn compute_data(&self, fetched: Hits) -> u64 {
        fetched.totalnb
    }

    fn set_data(&self, data: &u64) {
        self.data.lock().push(*data);
    }

    fn set_selection(&self, _data: Option<&u64>, collaboration: Option<&Collaboration>) {
        self.selections.lock().push(collaboration.cloned());
    }
}
