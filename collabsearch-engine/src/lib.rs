//! Collaboration engine for collaborative search.
//!
//! Several independent contributors (widgets) each impose a filter on a shared
//! dataset. The engine keeps those filters, tells every contributor when it
//! has to recompute, and turns the merged filters plus a requested projection
//! into one outbound query.
//!
//! # Architecture
//!
//! ## Components
//!
//! - **Registry**: collaborations per contributor, registered contributors,
//!   known collections, and the buses announcing every change
//! - **Merge**: combines filter fragments into one filter, reporting date
//!   format conflicts instead of failing
//! - **Resolver**: selects fragments (own only, or everyone but one), merges
//!   them and dispatches the projection through an [`ExploreTransport`]
//! - **Contributor**: the lifecycle contract widgets implement, and the
//!   driver task that runs it on debounced events
//! - **URL state**: the shareable `filter=<JSON>` form of the registry
//!
//! ## Update cycle
//!
//! 1. A contributor calls [`CollaborativeSearch::set_filter`]
//! 2. The registry publishes one [`CollaborationEvent`]
//! 3. Each attached contributor sees the last event of the burst once its
//!    debounce window closes
//! 4. Concerned contributors resolve, usually with
//!    [`CollaborativeSearch::resolve_but_not`], and redraw
//!
//! # Example
//!
//! ```
//! use collabsearch_engine::{CollaborativeSearch, ConfigService};
//! use collabsearch_engine::transport::mock::MockTransport;
//! use collabsearch_types::{Collaboration, ContributorId, Expression, ExpressionOp, Filter};
//!
//! let search = CollaborativeSearch::new(MockTransport::new().shared(), ConfigService::default());
//! let histogram = ContributorId::new("histogram");
//! let filter = Filter::new().with_group(vec![Expression::new("year", ExpressionOp::Range, "[2000<2010]")]);
//!
//! search.set_filter(&histogram, Collaboration::single("products", filter));
//! assert!(search.is_enabled(&histogram));
//! assert!(search.url_state().unwrap().starts_with("filter="));
//! ```
//!
//! [`CollaborationEvent`]: collabsearch_types::CollaborationEvent

pub mod config;
pub mod contributor;
mod error;
pub mod merge;
pub mod query;
mod registry;
pub mod resolver;
pub mod transport;
pub mod url_state;

pub use config::{ConfigService, EngineConfig, DEFAULT_MAX_AGE};
pub use contributor::{
    attach, should_update, Contributor, ContributorDescriptor, ContributorHandle,
    ContributorSettings, ContributorState, UpdateDecision,
};
pub use error::{CollabResult, CollaborationError};
pub use merge::{merge_filters, MergedFilter};
pub use query::QueryParams;
pub use registry::CollaborativeSearch;
pub use resolver::{ResolveOptions, Resolver, Scope, TypedResult};
pub use transport::{ExploreTransport, QueryRequest, SearchOptions};
