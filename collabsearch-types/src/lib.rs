//! Core type definitions for collaborative search.
//!
//! This crate defines the plain data shared by every part of the engine:
//! - Contributor identifiers
//! - Filter fragments (field expressions, free-text terms, date format)
//! - Collaborations and the events emitted when they change
//! - Projection requests (count, search, aggregate and their geo variants)
//! - Typed query responses
//!
//! Nothing here performs I/O. The registry, merge engine and resolver live in
//! `collabsearch-engine`.

mod collaboration;
mod filter;
mod ids;
mod projection;
mod response;

pub use collaboration::{
    Collaboration, CollaborationEvent, CollaborationMap, EventOrigin, Operation,
};
pub use filter::{Expression, ExpressionOp, Filter};
pub use ids::ContributorId;
pub use projection::{
    AggregatedGeometry, Aggregation, AggregationType, CollectFunction, ComputationRequest, Count,
    Form, GeoTileAggregation, GeohashAggregation, HitsFetcher, Interval, IntervalUnit, Metric,
    Order, OrderOn, Page, Projection, ProjectionFields, ProjectionKind, RangeRequest, RawGeometry,
    Search, TiledSearch,
};
pub use response::{
    AggregationResponse, CollectionCount, CollectionReferenceDescription, ComputationResponse,
    FeatureCollection, Hit, Hits, ProjectionResult, RangeResponse,
};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown expression operator: {0}")]
    UnknownOperator(String),

    #[error("unknown projection kind: {0}")]
    UnknownProjection(String),

    #[error("invalid contributor id: {0}")]
    InvalidContributorId(String),
}
