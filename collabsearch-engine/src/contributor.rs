//! Contributor contract and driver.
//!
//! A contributor is a consumer of the shared filter state: it registers with
//! the engine, listens to the debounced collaboration stream, and recomputes
//! its own data when an event concerns it. The engine only ever sees the
//! object-safe [`ContributorDescriptor`]; the data-carrying [`Contributor`]
//! trait is driven by the task spawned in [`attach`].

use crate::config::ConfigService;
use crate::error::CollabResult;
use crate::registry::CollaborativeSearch;
use async_trait::async_trait;
use collabsearch_types::{Collaboration, CollaborationEvent, ContributorId};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Identity and targeting of a contributor.
pub trait ContributorDescriptor: Send + Sync {
    /// Unique identifier.
    fn identifier(&self) -> &ContributorId;

    /// Package name, first half of the contributor's configuration keys.
    fn package_name(&self) -> &str;

    /// Collections this contributor targets.
    fn collections(&self) -> Vec<String>;

    /// Contributor whose changes only refresh this one's selection.
    fn linked_contributor_id(&self) -> Option<&ContributorId> {
        None
    }

    /// Human-readable summary of the filter this contributor imposes.
    fn filter_display_name(&self) -> String {
        self.identifier().to_string()
    }

    /// Whether changes to this contributor's own collaboration trigger a
    /// recompute.
    fn is_update_enabled_on_own_collaboration(&self) -> bool {
        false
    }
}

/// Lifecycle hooks of a contributor.
///
/// Hooks take `&self`: implementors keep their display state behind their own
/// interior mutability.
#[async_trait]
pub trait Contributor: ContributorDescriptor + 'static {
    /// Raw result of [`Contributor::fetch_data`].
    type Fetched: Send;
    /// Display data derived from the fetched result.
    type Data: Send + Sync;

    /// Queries the engine for the data this contributor displays.
    async fn fetch_data(
        &self,
        search: &CollaborativeSearch,
        event: &CollaborationEvent,
    ) -> CollabResult<Self::Fetched>;

    /// Transforms a fetched result into display data.
    fn compute_data(&self, fetched: Self::Fetched) -> Self::Data;

    /// Stores display data.
    fn set_data(&self, data: &Self::Data);

    /// Highlights the part of `data` selected by `collaboration`.
    fn set_selection(&self, data: Option<&Self::Data>, collaboration: Option<&Collaboration>);
}

/// Per-contributor overrides read from configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContributorSettings {
    pub name: Option<String>,
    /// Cache lifetime, in seconds, of this contributor's queries.
    pub cache_duration: Option<u64>,
    pub linked_contributor_id: Option<ContributorId>,
    /// Debounce window of this contributor's subscription.
    pub debounce: Option<Duration>,
    pub collections: Option<Vec<String>>,
}

impl ContributorSettings {
    /// Reads the `<package>$<identifier>.*` section. A missing `name` is
    /// reported on the configuration error bus; the other fields are optional.
    pub fn load(config: &ConfigService, package: &str, identifier: &str) -> Self {
        let quiet = |field: &str| {
            config
                .try_value(&crate::config::contributor_key(package, identifier, field))
                .cloned()
        };
        Self {
            name: config
                .contributor_value(package, identifier, "name")
                .and_then(|v| v.as_str().map(str::to_string)),
            cache_duration: quiet("cache_duration").and_then(|v| v.as_u64()),
            linked_contributor_id: quiet("linked_contributor_id")
                .and_then(|v| v.as_str().and_then(|s| ContributorId::parse(s).ok())),
            debounce: quiet("debounce_ms")
                .and_then(|v| v.as_u64())
                .map(Duration::from_millis),
            collections: quiet("collections").and_then(|v| match v {
                Value::Array(items) => Some(
                    items
                        .iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect(),
                ),
                Value::String(s) => Some(vec![s]),
                _ => None,
            }),
        }
    }
}

/// What a contributor does with one collaboration event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateDecision {
    /// Full fetch, compute, store and selection cycle.
    Update,
    /// Re-apply the selection from the linked contributor's collaboration.
    LinkedSelection(ContributorId),
    Ignore,
}

/// Decides whether `event` concerns `contributor`.
///
/// `source_collections` are the collections registered by the event's
/// source contributor, empty for global events or unknown sources.
pub fn should_update(
    contributor: &dyn ContributorDescriptor,
    event: &CollaborationEvent,
    source_collections: &[String],
) -> UpdateDecision {
    if event.id.is_global() || event.all {
        return UpdateDecision::Update;
    }
    if contributor.is_update_enabled_on_own_collaboration() {
        return UpdateDecision::Update;
    }

    let me = contributor.identifier();
    let linked = contributor.linked_contributor_id();
    let source = event.id.contributor();
    if let Some(source) = source
        && source != me
        && Some(source) != linked
    {
        let mine = contributor.collections();
        if source_collections.iter().any(|c| mine.contains(c)) {
            return UpdateDecision::Update;
        }
    }

    if event.is_removal() {
        return UpdateDecision::Update;
    }

    match (source, linked) {
        (Some(source), Some(linked)) if source == linked => {
            UpdateDecision::LinkedSelection(linked.clone())
        }
        _ => UpdateDecision::Ignore,
    }
}

/// Lifecycle state of an attached contributor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributorState {
    /// Registered, no event processed yet.
    Registered,
    Idle,
    /// An update cycle is running.
    Updating,
}

/// Handle on the driver task of an attached contributor.
#[derive(Debug)]
pub struct ContributorHandle {
    id: ContributorId,
    state: watch::Receiver<ContributorState>,
    task: JoinHandle<()>,
}

impl ContributorHandle {
    pub fn id(&self) -> &ContributorId {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ContributorState {
        *self.state.borrow()
    }

    /// Watches lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ContributorState> {
        self.state.clone()
    }

    /// Stops the driver. A cycle in progress is dropped and its in-flight
    /// count released.
    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Registers `contributor`, subscribes it to the debounced collaboration
/// stream and spawns its driver task. Must be called within a tokio runtime.
pub fn attach<C: Contributor>(contributor: Arc<C>, search: Arc<CollaborativeSearch>) -> ContributorHandle {
    let id = contributor.identifier().clone();
    let settings = ContributorSettings::load(search.config(), contributor.package_name(), id.as_str());
    let window = settings.debounce.unwrap_or(search.engine_config().debounce);

    search.register(Arc::clone(&contributor) as Arc<dyn ContributorDescriptor>);
    // Subscribe before spawning so no event published after attach is missed.
    let mut events = search.collaboration_bus().subscribe_debounced(window);
    let (state_tx, state_rx) = watch::channel(ContributorState::Registered);
    info!(contributor = %id, ?window, "contributor attached");

    let task = tokio::spawn(async move {
        let mut data: Option<C::Data> = None;
        while let Some(event) = events.recv().await {
            let source_collections = event
                .id
                .contributor()
                .and_then(|source| search.contributor(source))
                .map(|source| source.collections())
                .unwrap_or_default();

            match should_update(&*contributor, &event, &source_collections) {
                UpdateDecision::Update => {
                    state_tx.send_replace(ContributorState::Updating);
                    update_cycle(&*contributor, &search, &event, &mut data).await;
                    state_tx.send_replace(ContributorState::Idle);
                }
                UpdateDecision::LinkedSelection(linked) => {
                    debug!(contributor = %contributor.identifier(), %linked, "linked selection refresh");
                    let collaboration = search.get_collaboration(&linked);
                    contributor.set_selection(data.as_ref(), collaboration.as_ref());
                }
                UpdateDecision::Ignore => {}
            }
        }
        debug!(contributor = %contributor.identifier(), "collaboration stream closed");
    });

    ContributorHandle {
        id,
        state: state_rx,
        task,
    }
}

async fn update_cycle<C: Contributor>(
    contributor: &C,
    search: &CollaborativeSearch,
    event: &CollaborationEvent,
    data: &mut Option<C::Data>,
) {
    let id = contributor.identifier();
    let _busy = search.inflight().begin();
    let mut engine_errors = search.errors();
    debug!(contributor = %id, origin = %event.id, "update cycle");

    match contributor.fetch_data(search, event).await {
        Ok(fetched) => {
            let computed = contributor.compute_data(fetched);
            contributor.set_data(&computed);
            *data = Some(computed);
        }
        Err(e) => {
            // Resolver failures were published while the fetch ran.
            if engine_errors.drain().contains(&e) {
                warn!(contributor = %id, error = %e, "fetch failed");
            } else {
                search.report_error(e);
            }
        }
    }

    let own = search.get_collaboration(id);
    contributor.set_selection(data.as_ref(), own.as_ref());
    search.notify_contributor_changed(id.clone());
}

