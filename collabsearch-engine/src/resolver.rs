//! Projection resolver.
//!
//! Selects the fragments that take part in a query, merges them, and turns
//! the merged filter plus a projection into one [`QueryRequest`] dispatched
//! through the transport. Every failure is both returned and published on the
//! error bus; a merge conflict is published without failing the query.

use crate::error::{CollabResult, CollaborationError};
use crate::merge::{fragments_but_not, merge_and_report, own_fragments};
use crate::query::QueryParams;
use crate::transport::{ExploreTransport, QueryRequest, SearchOptions};
use collabsearch_bus::Bus;
use collabsearch_types::{
    AggregationResponse, CollaborationMap, CollectionReferenceDescription, ComputationResponse,
    ContributorId, FeatureCollection, Filter, Hits, Projection, ProjectionKind, ProjectionResult,
    RangeResponse,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Extra filter merged with the selected fragments.
    pub filter: Option<Filter>,
    /// Flatten output; a search form's own `flat` wins over it.
    pub flat: Option<bool>,
    /// Cache lifetime override, in seconds.
    pub max_age: Option<u64>,
    /// Cancellation signal; a cancelled query settles as
    /// [`CollaborationError::Cancelled`].
    pub cancel: Option<CancellationToken>,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn flat(mut self, flat: bool) -> Self {
        self.flat = Some(flat);
        self
    }

    #[must_use]
    pub fn max_age(mut self, max_age: u64) -> Self {
        self.max_age = Some(max_age);
        self
    }

    #[must_use]
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// A result type a typed resolve entry point can return.
pub trait TypedResult: Sized {
    /// Shape name used in mismatch errors.
    const SHAPE: &'static str;
    /// Flat default when the caller gives none.
    const DEFAULT_FLAT: Option<bool> = None;

    /// Projection kinds producing this result.
    fn accepts(kind: ProjectionKind) -> bool;

    /// Extracts the typed value, `None` on a shape mismatch.
    fn from_result(result: ProjectionResult) -> Option<Self>;
}

impl TypedResult for Hits {
    const SHAPE: &'static str = "hits";

    fn accepts(kind: ProjectionKind) -> bool {
        matches!(kind, ProjectionKind::Count | ProjectionKind::Search)
    }

    fn from_result(result: ProjectionResult) -> Option<Self> {
        match result {
            ProjectionResult::Hits(hits) => Some(hits),
            _ => None,
        }
    }
}

impl TypedResult for FeatureCollection {
    const SHAPE: &'static str = "feature collection";
    const DEFAULT_FLAT: Option<bool> = Some(true);

    fn accepts(kind: ProjectionKind) -> bool {
        matches!(
            kind,
            ProjectionKind::GeoSearch
                | ProjectionKind::TiledGeoSearch
                | ProjectionKind::GeoAggregate
                | ProjectionKind::GeohashGeoAggregate
                | ProjectionKind::GeoTileGeoAggregate
        )
    }

    fn from_result(result: ProjectionResult) -> Option<Self> {
        match result {
            ProjectionResult::FeatureCollection(fc) => Some(fc),
            _ => None,
        }
    }
}

impl TypedResult for AggregationResponse {
    const SHAPE: &'static str = "aggregation";

    fn accepts(kind: ProjectionKind) -> bool {
        kind == ProjectionKind::Aggregate
    }

    fn from_result(result: ProjectionResult) -> Option<Self> {
        match result {
            ProjectionResult::Aggregation(agg) => Some(agg),
            _ => None,
        }
    }
}

impl TypedResult for ComputationResponse {
    const SHAPE: &'static str = "computation";

    fn accepts(kind: ProjectionKind) -> bool {
        kind == ProjectionKind::Compute
    }

    fn from_result(result: ProjectionResult) -> Option<Self> {
        match result {
            ProjectionResult::Computation(c) => Some(c),
            _ => None,
        }
    }
}

impl TypedResult for RangeResponse {
    const SHAPE: &'static str = "range";

    fn accepts(kind: ProjectionKind) -> bool {
        kind == ProjectionKind::Range
    }

    fn from_result(result: ProjectionResult) -> Option<Self> {
        match result {
            ProjectionResult::Range(r) => Some(r),
            _ => None,
        }
    }
}

impl TypedResult for Vec<u8> {
    const SHAPE: &'static str = "bytes";
    const DEFAULT_FLAT: Option<bool> = Some(true);

    fn accepts(kind: ProjectionKind) -> bool {
        matches!(kind, ProjectionKind::ShapeSearch | ProjectionKind::ShapeAggregate)
    }

    fn from_result(result: ProjectionResult) -> Option<Self> {
        match result {
            ProjectionResult::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Which collaborations take part in a resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    /// Only this contributor's own collaboration (none when `None`).
    Only(Option<&'a ContributorId>),
    /// Every enabled collaboration except this contributor's.
    ButNot(Option<&'a ContributorId>),
}

impl Scope<'_> {
    /// Fragments selected on `collection`.
    pub fn fragments(&self, view: &CollaborationMap, collection: &str) -> Vec<Filter> {
        match *self {
            Scope::Only(id) => own_fragments(view, collection, id),
            Scope::ButNot(id) => fragments_but_not(view, collection, id),
        }
    }
}

/// Turns merged filters into dispatched queries.
#[derive(Clone)]
pub struct Resolver {
    transport: Arc<dyn ExploreTransport>,
    errors: Bus<CollaborationError>,
    max_age: u64,
}

impl Resolver {
    pub fn new(
        transport: Arc<dyn ExploreTransport>,
        errors: Bus<CollaborationError>,
        max_age: u64,
    ) -> Self {
        Self {
            transport,
            errors,
            max_age,
        }
    }

    /// Bus every failure is published on.
    pub fn errors(&self) -> &Bus<CollaborationError> {
        &self.errors
    }

    /// Default cache lifetime.
    pub fn max_age(&self) -> u64 {
        self.max_age
    }

    /// Resolves with only `contributor`'s own collaboration, plus the extra
    /// filter of `options`.
    pub async fn resolve(
        &self,
        projection: Projection,
        view: &CollaborationMap,
        collection: &str,
        contributor: Option<&ContributorId>,
        options: ResolveOptions,
    ) -> CollabResult<ProjectionResult> {
        self.resolve_scoped(projection, view, collection, Scope::Only(contributor), options)
            .await
    }

    /// Resolves with every enabled collaboration except `contributor`'s,
    /// plus the extra filter of `options`.
    pub async fn resolve_but_not(
        &self,
        projection: Projection,
        view: &CollaborationMap,
        collection: &str,
        contributor: Option<&ContributorId>,
        options: ResolveOptions,
    ) -> CollabResult<ProjectionResult> {
        self.resolve_scoped(projection, view, collection, Scope::ButNot(contributor), options)
            .await
    }

    /// Resolves the fragments selected by `scope`.
    pub async fn resolve_scoped(
        &self,
        projection: Projection,
        view: &CollaborationMap,
        collection: &str,
        scope: Scope<'_>,
        mut options: ResolveOptions,
    ) -> CollabResult<ProjectionResult> {
        let mut fragments = scope.fragments(view, collection);
        fragments.extend(options.filter.take());
        self.compute_resolve(projection, &fragments, collection, options)
            .await
    }

    /// Typed variant of [`Resolver::resolve_scoped`]. A projection that
    /// cannot produce `T` fails before anything is sent.
    pub async fn resolve_as<T: TypedResult>(
        &self,
        projection: Projection,
        view: &CollaborationMap,
        collection: &str,
        scope: Scope<'_>,
        mut options: ResolveOptions,
    ) -> CollabResult<T> {
        self.check_kind::<T>(&projection)?;
        if options.flat.is_none() {
            options.flat = T::DEFAULT_FLAT;
        }
        let result = self
            .resolve_scoped(projection, view, collection, scope, options)
            .await?;
        self.extract(result)
    }

    /// Resolves a projection over an explicit list of filters, ignoring the
    /// registry.
    pub async fn compute_resolve(
        &self,
        projection: Projection,
        filters: &[Filter],
        collection: &str,
        options: ResolveOptions,
    ) -> CollabResult<ProjectionResult> {
        let filter = merge_and_report(filters, &self.errors);
        let request = self.build_request(projection, filter, collection, options);
        self.dispatch(request).await
    }

    /// Typed variant of [`Resolver::compute_resolve`].
    pub async fn compute_resolve_as<T: TypedResult>(
        &self,
        projection: Projection,
        filters: &[Filter],
        collection: &str,
        mut options: ResolveOptions,
    ) -> CollabResult<T> {
        self.check_kind::<T>(&projection)?;
        if options.flat.is_none() {
            options.flat = T::DEFAULT_FLAT;
        }
        let result = self
            .compute_resolve(projection, filters, collection, options)
            .await?;
        self.extract(result)
    }

    /// Builds the outbound request of a projection over a merged filter.
    pub fn build_request(
        &self,
        projection: Projection,
        filter: Filter,
        collection: &str,
        options: ResolveOptions,
    ) -> QueryRequest {
        let max_age = options.max_age.unwrap_or(self.max_age);
        let mut flat = options.flat.unwrap_or(false);
        let mut pretty = false;
        let mut search_options = None;

        if let Some(search) = projection.search() {
            if let Some(form) = &search.form {
                flat = form.flat.unwrap_or(flat);
                pretty = form.pretty.unwrap_or(false);
            }
            let fields = search.projection.as_ref();
            search_options = Some(SearchOptions {
                includes: fields.and_then(|p| p.includes.clone()).into_iter().collect(),
                excludes: fields.and_then(|p| p.excludes.clone()).into_iter().collect(),
                returned_geometries: search.returned_geometries.clone(),
                page: search.page.clone().unwrap_or_default(),
            });
        }

        let params = QueryParams::build(&projection, &filter, Some(max_age));
        QueryRequest {
            collection: collection.to_string(),
            projection,
            filter,
            params,
            flat,
            pretty,
            search: search_options,
            max_age,
            cancel: options.cancel,
        }
    }

    /// GET query string of a projection over merged `filters`.
    pub fn get_url(&self, projection: &Projection, filters: &[Filter], max_age: Option<u64>) -> String {
        let filter = merge_and_report(filters, &self.errors);
        QueryParams::build(projection, &filter, Some(max_age.unwrap_or(self.max_age)))
            .to_query_string()
    }

    /// Describes one collection.
    pub async fn describe(
        &self,
        collection: &str,
        pretty: bool,
    ) -> CollabResult<CollectionReferenceDescription> {
        let outcome = self.transport.describe(collection, pretty, self.max_age).await;
        self.report(outcome)
    }

    /// Lists every collection.
    pub async fn list(&self, pretty: bool) -> CollabResult<Vec<CollectionReferenceDescription>> {
        let outcome = self.transport.list(pretty, self.max_age).await;
        self.report(outcome)
    }

    async fn dispatch(&self, request: QueryRequest) -> CollabResult<ProjectionResult> {
        debug!(
            collection = %request.collection,
            kind = %request.projection.kind(),
            max_age = request.max_age,
            "dispatching query"
        );
        let cancel = request.cancel.clone();
        let query = self.transport.query(request);
        let outcome = match cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => Err(CollaborationError::Cancelled),
                result = query => result,
            },
            None => query.await,
        };
        self.report(outcome)
    }

    fn check_kind<T: TypedResult>(&self, projection: &Projection) -> CollabResult<()> {
        let kind = projection.kind();
        if T::accepts(kind) {
            return Ok(());
        }
        self.report(Err(CollaborationError::ProjectionMismatch {
            expected: T::SHAPE,
            got: kind,
        }))
    }

    fn extract<T: TypedResult>(&self, result: ProjectionResult) -> CollabResult<T> {
        let got = result.shape();
        match T::from_result(result) {
            Some(value) => Ok(value),
            None => self.report(Err(CollaborationError::UnexpectedResponse {
                expected: T::SHAPE,
                got,
            })),
        }
    }

    fn report<T>(&self, outcome: CollabResult<T>) -> CollabResult<T> {
        if let Err(e) = &outcome {
            warn!(error = %e, "collaborative search request failed");
            self.errors.publish(e.clone());
        }
        outcome
    }
}
