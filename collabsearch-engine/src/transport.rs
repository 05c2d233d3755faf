//! Transport abstraction.
//!
//! The engine builds one [`QueryRequest`] per resolved projection and hands
//! it to an [`ExploreTransport`]. Whether the transport speaks HTTP, reads a
//! local index or replays fixtures is none of the engine's business.

use crate::error::CollabResult;
use crate::query::QueryParams;
use async_trait::async_trait;
use collabsearch_types::{
    CollectionReferenceDescription, Filter, Page, Projection, ProjectionResult,
};
use tokio_util::sync::CancellationToken;

/// Search directives lifted out of a search-type projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub returned_geometries: Option<String>,
    pub page: Page,
}

/// One outbound query.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Target collection.
    pub collection: String,
    /// Operation and its payload.
    pub projection: Projection,
    /// Merged filter.
    pub filter: Filter,
    /// GET form of `filter` and of the aggregation pipeline.
    pub params: QueryParams,
    /// Flatten record properties in the output.
    pub flat: bool,
    /// Pretty-print the output.
    pub pretty: bool,
    /// Search directives, for search-type projections.
    pub search: Option<SearchOptions>,
    /// Cache lifetime hint, in seconds. A freshness bound, not a guarantee.
    pub max_age: u64,
    /// Cancellation signal of the caller.
    pub cancel: Option<CancellationToken>,
}

/// A backend able to run projections and describe its collections.
#[async_trait]
pub trait ExploreTransport: Send + Sync {
    /// Runs one projection.
    async fn query(&self, request: QueryRequest) -> CollabResult<ProjectionResult>;

    /// Describes one collection.
    async fn describe(
        &self,
        collection: &str,
        pretty: bool,
        max_age: u64,
    ) -> CollabResult<CollectionReferenceDescription>;

    /// Lists every collection.
    async fn list(
        &self,
        pretty: bool,
        max_age: u64,
    ) -> CollabResult<Vec<CollectionReferenceDescription>>;
}

/// A scripted transport for testing.
pub mod mock {
    use super::*;
    use crate::error::CollaborationError;
    use collabsearch_types::{
        AggregationResponse, ComputationResponse, FeatureCollection, Hits, ProjectionKind,
        RangeResponse,
    };
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    type Responder = dyn Fn(&QueryRequest) -> CollabResult<ProjectionResult> + Send + Sync;

    /// Records every request and answers through a responder closure.
    ///
    /// The default responder returns an empty result of the shape expected
    /// for the projection kind, with `collection` set on hits.
    pub struct MockTransport {
        requests: Mutex<Vec<QueryRequest>>,
        responder: Box<Responder>,
        latency: Option<Duration>,
        collections: Vec<CollectionReferenceDescription>,
    }

    impl Default for MockTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                responder: Box::new(|request| Ok(empty_result(request))),
                latency: None,
                collections: Vec::new(),
            }
        }

        /// Replaces the responder.
        pub fn with_responder<F>(mut self, responder: F) -> Self
        where
            F: Fn(&QueryRequest) -> CollabResult<ProjectionResult> + Send + Sync + 'static,
        {
            self.responder = Box::new(responder);
            self
        }

        /// Fails every query with a transport error.
        pub fn failing(message: impl Into<String>) -> Self {
            let message = message.into();
            Self::new().with_responder(move |_| Err(CollaborationError::Transport(message.clone())))
        }

        /// Delays every query.
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = Some(latency);
            self
        }

        /// Collections returned by `list` and `describe`.
        pub fn with_collections(mut self, collections: Vec<CollectionReferenceDescription>) -> Self {
            self.collections = collections;
            self
        }

        /// Wraps the transport for the engine.
        pub fn shared(self) -> Arc<Self> {
            Arc::new(self)
        }

        /// Every request received so far.
        pub fn requests(&self) -> Vec<QueryRequest> {
            self.requests.lock().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().len()
        }

        pub fn last_request(&self) -> Option<QueryRequest> {
            self.requests.lock().last().cloned()
        }

        /// Requests of one projection kind.
        pub fn requests_of(&self, kind: ProjectionKind) -> Vec<QueryRequest> {
            self.requests
                .lock()
                .iter()
                .filter(|r| r.projection.kind() == kind)
                .cloned()
                .collect()
        }

        pub fn clear(&self) {
            self.requests.lock().clear();
        }
    }

    /// Empty result of the shape expected for the request's projection.
    pub fn empty_result(request: &QueryRequest) -> ProjectionResult {
        match request.projection.kind() {
            ProjectionKind::Count | ProjectionKind::Search => ProjectionResult::Hits(Hits {
                collection: Some(request.collection.clone()),
                ..Hits::default()
            }),
            ProjectionKind::GeoSearch
            | ProjectionKind::TiledGeoSearch
            | ProjectionKind::GeoAggregate
            | ProjectionKind::GeohashGeoAggregate
            | ProjectionKind::GeoTileGeoAggregate => {
                ProjectionResult::FeatureCollection(FeatureCollection::default())
            }
            ProjectionKind::Aggregate => ProjectionResult::Aggregation(AggregationResponse::default()),
            ProjectionKind::Compute => ProjectionResult::Computation(ComputationResponse::default()),
            ProjectionKind::Range => ProjectionResult::Range(RangeResponse::default()),
            ProjectionKind::ShapeSearch | ProjectionKind::ShapeAggregate => {
                ProjectionResult::Bytes(Vec::new())
            }
        }
    }

    #[async_trait]
    impl ExploreTransport for MockTransport {
        async fn query(&self, request: QueryRequest) -> CollabResult<ProjectionResult> {
            self.requests.lock().push(request.clone());
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            (self.responder)(&request)
        }

        async fn describe(
            &self,
            collection: &str,
            _pretty: bool,
            _max_age: u64,
        ) -> CollabResult<CollectionReferenceDescription> {
            self.collections
                .iter()
                .find(|c| c.collection_name == collection)
                .cloned()
                .ok_or_else(|| {
                    CollaborationError::Transport(format!("collection {collection} not found"))
                })
        }

        async fn list(
            &self,
            _pretty: bool,
            _max_age: u64,
        ) -> CollabResult<Vec<CollectionReferenceDescription>> {
            Ok(self.collections.clone())
        }
    }
}
