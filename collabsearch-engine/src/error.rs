//! Error types for the collaboration engine.

use collabsearch_types::{ContributorId, ProjectionKind};
use thiserror::Error;

/// Result type for engine operations.
pub type CollabResult<T> = Result<T, CollaborationError>;

/// Errors reported by the engine.
///
/// Every variant is cloneable so the same error can be returned to the caller
/// and published on the error bus.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollaborationError {
    /// A configuration key could not be resolved.
    #[error("missing configuration key: {key}")]
    Config { key: String },

    /// Filters being merged disagree on their date format.
    #[error("dateformats must be equal for each filter, got {dateformats:?}")]
    DateformatConflict { dateformats: Vec<String> },

    /// The outbound query failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The outbound query was cancelled by its caller.
    #[error("request cancelled")]
    Cancelled,

    /// A typed resolve entry point received a projection it cannot serve.
    #[error("projection mismatch: expected {expected}, got {got}")]
    ProjectionMismatch {
        expected: &'static str,
        got: ProjectionKind,
    },

    /// The backend answered with a result of the wrong shape.
    #[error("unexpected response: expected {expected}, got {got}")]
    UnexpectedResponse {
        expected: &'static str,
        got: &'static str,
    },

    /// A shared URL state could not be decoded.
    #[error("invalid url state: {0}")]
    UrlState(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The contributor is not registered.
    #[error("unknown contributor: {0}")]
    UnknownContributor(ContributorId),
}

impl From<serde_json::Error> for CollaborationError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
