//! Collaboration registry.
//!
//! [`CollaborativeSearch`] owns the collaborations of every contributor, the
//! set of known collections and the buses through which changes are
//! announced. Every mutation publishes exactly one [`CollaborationEvent`].
//!
//! Bookkeeping runs inline, right after the event is published and before the
//! mutating call returns: a removal event is applied to the map, then a
//! per-collection count refresh is scheduled. Subscribers therefore observe a
//! removal event before the entry is gone from their point of view.

use crate::config::{ConfigService, EngineConfig};
use crate::contributor::ContributorDescriptor;
use crate::error::{CollabResult, CollaborationError};
use crate::resolver::{ResolveOptions, Resolver, Scope, TypedResult};
use crate::transport::ExploreTransport;
use crate::url_state;
use collabsearch_bus::{Bus, InFlight, Subscription};
use collabsearch_types::{
    AggregationResponse, Collaboration, CollaborationEvent, CollaborationMap, CollectionCount,
    CollectionReferenceDescription, ComputationResponse, ContributorId, EventOrigin,
    FeatureCollection, Filter, Hits, Operation, Projection, ProjectionResult, RangeResponse,
};
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Default)]
struct RegistryState {
    collaborations: CollaborationMap,
    contributors: HashMap<ContributorId, Arc<dyn ContributorDescriptor>>,
    /// Append-only.
    collections: BTreeSet<String>,
}

/// Registry of collaborations and entry point of every resolve.
pub struct CollaborativeSearch {
    engine: EngineConfig,
    config: ConfigService,
    state: RwLock<RegistryState>,
    collaboration_bus: Bus<CollaborationEvent>,
    contributor_bus: Bus<ContributorId>,
    errors: Bus<CollaborationError>,
    inflight: InFlight,
    resolver: Resolver,
    counts: Arc<watch::Sender<Vec<CollectionCount>>>,
    count_generation: Arc<AtomicU64>,
}

impl CollaborativeSearch {
    /// Creates a registry with the engine settings of `config`.
    pub fn new(transport: Arc<dyn ExploreTransport>, config: ConfigService) -> Self {
        let engine = EngineConfig::from_config(&config);
        Self::with_engine_config(transport, config, engine)
    }

    /// Creates a registry with explicit engine settings.
    pub fn with_engine_config(
        transport: Arc<dyn ExploreTransport>,
        config: ConfigService,
        engine: EngineConfig,
    ) -> Self {
        let errors = Bus::with_capacity("collaboration-errors", engine.bus_capacity);
        let resolver = Resolver::new(transport, errors.clone(), engine.max_age);
        let (counts, _) = watch::channel(Vec::new());
        Self {
            collaboration_bus: Bus::with_capacity("collaborations", engine.bus_capacity),
            contributor_bus: Bus::with_capacity("contributors", engine.bus_capacity),
            errors,
            inflight: InFlight::new(),
            resolver,
            counts: Arc::new(counts),
            count_generation: Arc::new(AtomicU64::new(0)),
            state: RwLock::new(RegistryState::default()),
            config,
            engine,
        }
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine
    }

    pub fn config(&self) -> &ConfigService {
        &self.config
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn inflight(&self) -> &InFlight {
        &self.inflight
    }

    /// Bus of collaboration events.
    pub fn collaboration_bus(&self) -> &Bus<CollaborationEvent> {
        &self.collaboration_bus
    }

    /// Subscribes to every collaboration event, undebounced.
    pub fn collaboration_events(&self) -> Subscription<CollaborationEvent> {
        self.collaboration_bus.subscribe()
    }

    /// Subscribes to the ids of contributors that completed an update cycle.
    pub fn contributor_changes(&self) -> Subscription<ContributorId> {
        self.contributor_bus.subscribe()
    }

    /// Subscribes to the error bus.
    pub fn errors(&self) -> Subscription<CollaborationError> {
        self.errors.subscribe()
    }

    /// Publishes an error raised outside the engine, typically by a
    /// contributor hook.
    pub fn report_error(&self, error: CollaborationError) {
        warn!(error = %error, "collaboration error reported");
        self.errors.publish(error);
    }

    /// Announces that a contributor finished an update cycle.
    pub fn notify_contributor_changed(&self, id: ContributorId) {
        self.contributor_bus.publish(id);
    }

    // ── Registration ─────────────────────────────────────────────

    /// Registers a contributor and its collections. Registering an id again
    /// replaces the previous descriptor; collections accumulate.
    pub fn register(&self, contributor: Arc<dyn ContributorDescriptor>) {
        let id = contributor.identifier().clone();
        let collections = contributor.collections();
        let mut state = self.state.write();
        state.collections.extend(collections.iter().cloned());
        if state.contributors.insert(id.clone(), contributor).is_some() {
            warn!(contributor = %id, "contributor registered twice, replacing");
        } else {
            info!(contributor = %id, ?collections, "contributor registered");
        }
    }

    /// Descriptor of a registered contributor.
    pub fn contributor(&self, id: &ContributorId) -> Option<Arc<dyn ContributorDescriptor>> {
        self.state.read().contributors.get(id).cloned()
    }

    /// Display name of the filter a registered contributor imposes.
    pub fn filter_display_name(&self, id: &ContributorId) -> CollabResult<String> {
        self.contributor(id)
            .map(|c| c.filter_display_name())
            .ok_or_else(|| CollaborationError::UnknownContributor(id.clone()))
    }

    /// Ids of every registered contributor.
    pub fn registered_contributors(&self) -> Vec<ContributorId> {
        let mut ids: Vec<_> = self.state.read().contributors.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Every collection targeted by a registered contributor.
    pub fn collections(&self) -> BTreeSet<String> {
        self.state.read().collections.clone()
    }

    pub fn default_collection(&self) -> Option<&str> {
        self.engine.default_collection.as_deref()
    }

    // ── Mutations ────────────────────────────────────────────────

    /// Stores a contributor's collaboration, enabled.
    pub fn set_filter(&self, id: &ContributorId, mut collaboration: Collaboration) {
        collaboration.enabled = true;
        self.mutate(|state| {
            state.collaborations.insert(id.clone(), collaboration);
            CollaborationEvent::added(id.clone())
        });
    }

    /// Removes a contributor's collaboration.
    pub fn remove_filter(&self, id: &ContributorId) {
        self.mutate(|_| CollaborationEvent::removed(id.clone()));
    }

    /// Removes every collaboration.
    pub fn remove_all(&self) {
        self.mutate(|_| CollaborationEvent::all_removed());
    }

    /// Enables a stored collaboration. The event is published even when the
    /// contributor has none.
    pub fn enable(&self, id: &ContributorId) {
        self.set_enabled(id, true);
    }

    /// Disables a stored collaboration. The event is published even when the
    /// contributor has none.
    pub fn disable(&self, id: &ContributorId) {
        self.set_enabled(id, false);
    }

    fn set_enabled(&self, id: &ContributorId, enabled: bool) {
        let all = self.engine.broadcast_enable_as_all;
        self.mutate(|state| {
            if let Some(collaboration) = state.collaborations.get_mut(id) {
                collaboration.enabled = enabled;
            }
            CollaborationEvent::new(EventOrigin::Contributor(id.clone()), Operation::Add, all)
        });
    }

    /// Replaces every collaboration with the entries of `snapshot` whose id
    /// is a registered contributor.
    pub fn set_collaborations(&self, snapshot: CollaborationMap) {
        self.mutate(|state| {
            let RegistryState {
                collaborations,
                contributors,
                ..
            } = state;
            collaborations.clear();
            for (id, collaboration) in snapshot {
                if contributors.contains_key(&id) {
                    collaborations.insert(id, collaboration);
                } else {
                    debug!(contributor = %id, "skipping collaboration of unregistered contributor");
                }
            }
            CollaborationEvent::url_loaded()
        });
    }

    fn mutate<F>(&self, f: F)
    where
        F: FnOnce(&mut RegistryState) -> CollaborationEvent,
    {
        {
            let mut state = self.state.write();
            let event = f(&mut *state);
            debug!(origin = %event.id, operation = ?event.operation, all = event.all, "collaboration event");
            self.collaboration_bus.publish(event.clone());
            if event.is_removal() {
                if event.all {
                    state.collaborations.clear();
                } else if let Some(id) = event.id.contributor() {
                    state.collaborations.remove(id);
                }
            }
        }
        self.schedule_count_all();
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Collaboration of a contributor, `None` when it has none.
    pub fn get_collaboration(&self, id: &ContributorId) -> Option<Collaboration> {
        self.state.read().collaborations.get(id).cloned()
    }

    /// Snapshot of every collaboration.
    pub fn collaborations(&self) -> CollaborationMap {
        self.state.read().collaborations.clone()
    }

    /// Ids of every contributor with a collaboration.
    pub fn all_contributors(&self) -> Vec<ContributorId> {
        self.state.read().collaborations.keys().cloned().collect()
    }

    pub fn enabled_contributors(&self) -> Vec<ContributorId> {
        self.contributors_where(|c| c.enabled)
    }

    pub fn disabled_contributors(&self) -> Vec<ContributorId> {
        self.contributors_where(|c| !c.enabled)
    }

    /// Whether a contributor's collaboration is enabled, `false` when it has
    /// none.
    pub fn is_enabled(&self, id: &ContributorId) -> bool {
        self.state
            .read()
            .collaborations
            .get(id)
            .is_some_and(|c| c.enabled)
    }

    fn contributors_where(&self, pred: impl Fn(&Collaboration) -> bool) -> Vec<ContributorId> {
        self.state
            .read()
            .collaborations
            .iter()
            .filter(|(_, c)| pred(c))
            .map(|(id, _)| id.clone())
            .collect()
    }

    // ── URL state ────────────────────────────────────────────────

    /// Current collaborations as `filter=<JSON>`.
    pub fn url_state(&self) -> CollabResult<String> {
        url_state::encode(&self.collaborations())
    }

    /// Decodes a shared state and loads it with [`Self::set_collaborations`].
    pub fn load_url_state(&self, state: &str) -> CollabResult<()> {
        let snapshot = url_state::decode(state, self.default_collection()).inspect_err(|e| {
            warn!(error = %e, "failed to decode url state");
            self.errors.publish(e.clone());
        })?;
        self.set_collaborations(snapshot);
        Ok(())
    }

    // ── Count-all ────────────────────────────────────────────────

    /// Watches the per-collection counts, refreshed after every event.
    pub fn count_all(&self) -> watch::Receiver<Vec<CollectionCount>> {
        self.counts.subscribe()
    }

    /// Counts every known collection with every enabled collaboration and
    /// publishes the result. Collections whose count fails are left out.
    pub async fn refresh_count_all(&self) -> Vec<CollectionCount> {
        let generation = self.count_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (view, collections) = self.count_inputs();
        let counts = count_collections(&self.resolver, &view, &collections).await;
        publish_counts(&self.counts, &self.count_generation, generation, counts.clone());
        counts
    }

    fn count_inputs(&self) -> (CollaborationMap, Vec<String>) {
        let state = self.state.read();
        (
            state.collaborations.clone(),
            state.collections.iter().cloned().collect(),
        )
    }

    fn schedule_count_all(&self) {
        if !self.engine.refresh_count_all {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            debug!("no runtime, count refresh skipped");
            return;
        };
        let (view, collections) = self.count_inputs();
        if collections.is_empty() {
            return;
        }
        let generation = self.count_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let resolver = self.resolver.clone();
        let counts = Arc::clone(&self.counts);
        let latest = Arc::clone(&self.count_generation);
        handle.spawn(async move {
            let result = count_collections(&resolver, &view, &collections).await;
            publish_counts(&counts, &latest, generation, result);
        });
    }

    // ── Resolve ──────────────────────────────────────────────────

    /// Resolves with only `contributor`'s own collaboration.
    pub async fn resolve(
        &self,
        projection: Projection,
        collection: &str,
        contributor: Option<&ContributorId>,
        options: ResolveOptions,
    ) -> CollabResult<ProjectionResult> {
        let view = self.collaborations();
        self.resolver
            .resolve(projection, &view, collection, contributor, options)
            .await
    }

    /// Resolves with every enabled collaboration except `contributor`'s.
    pub async fn resolve_but_not(
        &self,
        projection: Projection,
        collection: &str,
        contributor: Option<&ContributorId>,
        options: ResolveOptions,
    ) -> CollabResult<ProjectionResult> {
        let view = self.collaborations();
        self.resolver
            .resolve_but_not(projection, &view, collection, contributor, options)
            .await
    }

    async fn resolve_typed<T: TypedResult>(
        &self,
        projection: Projection,
        collection: &str,
        scope: Scope<'_>,
        options: ResolveOptions,
    ) -> CollabResult<T> {
        let view = self.collaborations();
        self.resolver
            .resolve_as(projection, &view, collection, scope, options)
            .await
    }

    /// Count or search with only `contributor`'s collaboration.
    pub async fn resolve_hits(
        &self,
        projection: Projection,
        collection: &str,
        contributor: Option<&ContributorId>,
        options: ResolveOptions,
    ) -> CollabResult<Hits> {
        self.resolve_typed(projection, collection, Scope::Only(contributor), options)
            .await
    }

    /// Count or search with every collaboration but `contributor`'s.
    pub async fn resolve_but_not_hits(
        &self,
        projection: Projection,
        collection: &str,
        contributor: Option<&ContributorId>,
        options: ResolveOptions,
    ) -> CollabResult<Hits> {
        self.resolve_typed(projection, collection, Scope::ButNot(contributor), options)
            .await
    }

    /// Geo projection with only `contributor`'s collaboration. Output is
    /// flat unless `options` says otherwise.
    pub async fn resolve_feature_collection(
        &self,
        projection: Projection,
        collection: &str,
        contributor: Option<&ContributorId>,
        options: ResolveOptions,
    ) -> CollabResult<FeatureCollection> {
        self.resolve_typed(projection, collection, Scope::Only(contributor), options)
            .await
    }

    /// Geo projection with every collaboration but `contributor`'s.
    pub async fn resolve_but_not_feature_collection(
        &self,
        projection: Projection,
        collection: &str,
        contributor: Option<&ContributorId>,
        options: ResolveOptions,
    ) -> CollabResult<FeatureCollection> {
        self.resolve_typed(projection, collection, Scope::ButNot(contributor), options)
            .await
    }

    pub async fn resolve_aggregation(
        &self,
        projection: Projection,
        collection: &str,
        contributor: Option<&ContributorId>,
        options: ResolveOptions,
    ) -> CollabResult<AggregationResponse> {
        self.resolve_typed(projection, collection, Scope::Only(contributor), options)
            .await
    }

    pub async fn resolve_but_not_aggregation(
        &self,
        projection: Projection,
        collection: &str,
        contributor: Option<&ContributorId>,
        options: ResolveOptions,
    ) -> CollabResult<AggregationResponse> {
        self.resolve_typed(projection, collection, Scope::ButNot(contributor), options)
            .await
    }

    pub async fn resolve_but_not_computation(
        &self,
        projection: Projection,
        collection: &str,
        contributor: Option<&ContributorId>,
        options: ResolveOptions,
    ) -> CollabResult<ComputationResponse> {
        self.resolve_typed(projection, collection, Scope::ButNot(contributor), options)
            .await
    }

    pub async fn resolve_but_not_range(
        &self,
        projection: Projection,
        collection: &str,
        contributor: Option<&ContributorId>,
        options: ResolveOptions,
    ) -> CollabResult<RangeResponse> {
        self.resolve_typed(projection, collection, Scope::ButNot(contributor), options)
            .await
    }

    /// Shape-file export with every collaboration but `contributor`'s.
    pub async fn resolve_but_not_shapefile(
        &self,
        projection: Projection,
        collection: &str,
        contributor: Option<&ContributorId>,
        options: ResolveOptions,
    ) -> CollabResult<Vec<u8>> {
        self.resolve_typed(projection, collection, Scope::ButNot(contributor), options)
            .await
    }

    /// Count or search over an explicit filter list, ignoring the registry.
    pub async fn resolve_compute_hits(
        &self,
        projection: Projection,
        filters: &[Filter],
        collection: &str,
        options: ResolveOptions,
    ) -> CollabResult<Hits> {
        self.resolver
            .compute_resolve_as(projection, filters, collection, options)
            .await
    }

    /// GET query string of a projection over merged `filters`.
    pub fn get_url(&self, projection: &Projection, filters: &[Filter], max_age: Option<u64>) -> String {
        self.resolver.get_url(projection, filters, max_age)
    }

    pub async fn describe(
        &self,
        collection: &str,
        pretty: bool,
    ) -> CollabResult<CollectionReferenceDescription> {
        self.resolver.describe(collection, pretty).await
    }

    pub async fn list(&self, pretty: bool) -> CollabResult<Vec<CollectionReferenceDescription>> {
        self.resolver.list(pretty).await
    }
}

async fn count_collections(
    resolver: &Resolver,
    view: &CollaborationMap,
    collections: &[String],
) -> Vec<CollectionCount> {
    let queries = collections.iter().map(|collection| async move {
        let hits: CollabResult<Hits> = resolver
            .resolve_as(
                Projection::count(),
                view,
                collection,
                Scope::ButNot(None),
                ResolveOptions::default(),
            )
            .await;
        (collection, hits)
    });
    join_all(queries)
        .await
        .into_iter()
        .filter_map(|(collection, hits)| {
            let hits = hits.ok()?;
            Some(CollectionCount {
                collection: hits.collection.unwrap_or_else(|| collection.clone()),
                count: hits.totalnb,
            })
        })
        .collect()
}

/// Publishes counts unless a newer refresh has started since.
fn publish_counts(
    sender: &watch::Sender<Vec<CollectionCount>>,
    latest: &AtomicU64,
    generation: u64,
    counts: Vec<CollectionCount>,
) {
    if latest.load(Ordering::SeqCst) == generation {
        sender.send_replace(counts);
    } else {
        debug!(generation, "stale count refresh dropped");
    }
}
