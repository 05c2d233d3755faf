//! Typed query responses.
//!
//! Record payloads (hit data, GeoJSON features, bucket metrics) stay as
//! `serde_json::Value`: their shape belongs to the collection, not to the
//! engine.

use crate::ProjectionKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One search hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md: Option<Value>,
    #[serde(default)]
    pub data: Value,
}

/// Result of a count or search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default)]
    pub totalnb: u64,
    #[serde(default)]
    pub nbhits: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hits: Option<Vec<Hit>>,
}

/// GeoJSON feature collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "feature_collection_type")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<Value>,
}

fn feature_collection_type() -> String {
    "FeatureCollection".to_string()
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self {
            kind: feature_collection_type(),
            features: Vec::new(),
        }
    }
}

/// Result of an aggregation, recursively nested per bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sumotherdoccounts: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_as_string: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<AggregationResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totalnb: Option<u64>,
}

/// Result of a single-metric computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputationResponse {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub metric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
    #[serde(default)]
    pub totalnb: u64,
}

/// Bounds of a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
    #[serde(default)]
    pub totalnb: u64,
}

/// Description of a collection as exposed by the backend catalogue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionReferenceDescription {
    pub collection_name: String,
    #[serde(default)]
    pub params: Value,
}

/// Number of records matching the merged filter in one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionCount {
    pub collection: String,
    pub count: u64,
}

/// Output of any projection, tagged by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionResult {
    Hits(Hits),
    FeatureCollection(FeatureCollection),
    Aggregation(AggregationResponse),
    Computation(ComputationResponse),
    Range(RangeResponse),
    /// Binary output of the shape-file projections.
    Bytes(Vec<u8>),
}

impl ProjectionResult {
    /// Short name of the result shape, for diagnostics.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Hits(_) => "hits",
            Self::FeatureCollection(_) => "feature collection",
            Self::Aggregation(_) => "aggregation",
            Self::Computation(_) => "computation",
            Self::Range(_) => "range",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Shape a well-behaved backend returns for a projection kind.
    #[must_use]
    pub const fn expected_shape(kind: ProjectionKind) -> &'static str {
        match kind {
            ProjectionKind::Count | ProjectionKind::Search => "hits",
            ProjectionKind::GeoSearch
            | ProjectionKind::TiledGeoSearch
            | ProjectionKind::GeoAggregate
            | ProjectionKind::GeohashGeoAggregate
            | ProjectionKind::GeoTileGeoAggregate => "feature collection",
            ProjectionKind::Aggregate => "aggregation",
            ProjectionKind::Compute => "computation",
            ProjectionKind::Range => "range",
            ProjectionKind::ShapeSearch | ProjectionKind::ShapeAggregate => "bytes",
        }
    }
}
