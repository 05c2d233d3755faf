//! Projection requests.
//!
//! A [`Projection`] names the backend operation to run over the merged
//! filter, together with its kind-specific payload.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payload of a count request. The merged filter is all a count needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Count {}

/// Paging and sort directives of a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
}

/// Output shaping options of a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flat: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretty: Option<bool>,
}

/// Field include/exclude lists, comma separated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excludes: Option<String>,
}

/// Payload of search-type requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Search {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<Page>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<Form>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<ProjectionFields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_geometries: Option<String>,
}

/// A search restricted to one map tile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiledSearch {
    pub search: Search,
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

/// Aggregations restricted to one geohash cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeohashAggregation {
    pub aggregations: Vec<Aggregation>,
    pub geohash: String,
}

/// Aggregations restricted to one map tile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoTileAggregation {
    pub aggregations: Vec<Aggregation>,
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

/// A single metric computed over a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputationRequest {
    pub field: String,
    pub metric: CollectFunction,
}

/// Min/max bounds of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRequest {
    pub field: String,
}

/// Bucketing strategy of an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationType {
    Datehistogram,
    Geohash,
    Geotile,
    Histogram,
    Term,
    H3,
}

impl AggregationType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Datehistogram => "datehistogram",
            Self::Geohash => "geohash",
            Self::Geotile => "geotile",
            Self::Histogram => "histogram",
            Self::Term => "term",
            Self::H3 => "h3",
        }
    }
}

/// Calendar unit of a date histogram interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Year,
    Quarter,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
}

impl IntervalUnit {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Quarter => "quarter",
            Self::Month => "month",
            Self::Week => "week",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
        }
    }
}

/// Bucket width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<IntervalUnit>,
}

/// Metric function applied per bucket (or by a compute request).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectFunction {
    Avg,
    Cardinality,
    Max,
    Min,
    Sum,
    Geobbox,
    Geocentroid,
    Spanning,
}

impl CollectFunction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Cardinality => "cardinality",
            Self::Max => "max",
            Self::Min => "min",
            Self::Sum => "sum",
            Self::Geobbox => "geobbox",
            Self::Geocentroid => "geocentroid",
            Self::Spanning => "spanning",
        }
    }
}

/// Per-bucket metric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collect_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collect_fct: Option<CollectFunction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderOn {
    Field,
    Count,
    Result,
}

impl OrderOn {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Field => "field",
            Self::Count => "count",
            Self::Result => "result",
        }
    }
}

/// Geometry computed for each bucket of a geo aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatedGeometry {
    Bbox,
    Centroid,
    Cell,
    CellCenter,
    Geohash,
    GeohashCenter,
    Tile,
    TileCenter,
    H3,
    H3Center,
}

impl AggregatedGeometry {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bbox => "bbox",
            Self::Centroid => "centroid",
            Self::Cell => "cell",
            Self::CellCenter => "cell_center",
            Self::Geohash => "geohash",
            Self::GeohashCenter => "geohash_center",
            Self::Tile => "tile",
            Self::TileCenter => "tile_center",
            Self::H3 => "h3",
            Self::H3Center => "h3_center",
        }
    }
}

/// A raw geometry field returned per bucket, optionally sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawGeometry {
    pub geometry: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

/// Hits fetched per bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitsFetcher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
}

/// One stage of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    #[serde(rename = "type")]
    pub kind: AggregationType,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<Metric>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<OrderOn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregated_geometries: Option<Vec<AggregatedGeometry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_geometries: Option<Vec<RawGeometry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_hits: Option<HitsFetcher>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
}

impl Aggregation {
    /// Creates a bare aggregation of the given type on a field.
    #[must_use]
    pub fn new(kind: AggregationType, field: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            interval: None,
            format: None,
            metrics: None,
            order: None,
            on: None,
            size: None,
            aggregated_geometries: None,
            raw_geometries: None,
            fetch_hits: None,
            include: None,
        }
    }
}

/// Kind tag of a [`Projection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionKind {
    Count,
    Search,
    GeoSearch,
    TiledGeoSearch,
    Aggregate,
    GeoAggregate,
    GeohashGeoAggregate,
    GeoTileGeoAggregate,
    Compute,
    Range,
    ShapeSearch,
    ShapeAggregate,
}

impl ProjectionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Search => "search",
            Self::GeoSearch => "geosearch",
            Self::TiledGeoSearch => "tiledgeosearch",
            Self::Aggregate => "aggregate",
            Self::GeoAggregate => "geoaggregate",
            Self::GeohashGeoAggregate => "geohashgeoaggregate",
            Self::GeoTileGeoAggregate => "geotilegeoaggregate",
            Self::Compute => "compute",
            Self::Range => "range",
            Self::ShapeSearch => "shapesearch",
            Self::ShapeAggregate => "shapeaggregate",
        }
    }

    /// Kinds whose GET form carries `agg` parameters.
    #[must_use]
    pub const fn is_aggregation(self) -> bool {
        matches!(
            self,
            Self::Aggregate
                | Self::GeoAggregate
                | Self::GeohashGeoAggregate
                | Self::GeoTileGeoAggregate
                | Self::ShapeAggregate
        )
    }

    /// Kinds carrying a [`Search`] payload.
    #[must_use]
    pub const fn is_search(self) -> bool {
        matches!(
            self,
            Self::Search | Self::GeoSearch | Self::TiledGeoSearch | Self::ShapeSearch
        )
    }
}

impl fmt::Display for ProjectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectionKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "count" => Self::Count,
            "search" => Self::Search,
            "geosearch" => Self::GeoSearch,
            "tiledgeosearch" => Self::TiledGeoSearch,
            "aggregate" => Self::Aggregate,
            "geoaggregate" => Self::GeoAggregate,
            "geohashgeoaggregate" => Self::GeohashGeoAggregate,
            "geotilegeoaggregate" => Self::GeoTileGeoAggregate,
            "compute" => Self::Compute,
            "range" => Self::Range,
            "shapesearch" => Self::ShapeSearch,
            "shapeaggregate" => Self::ShapeAggregate,
            other => return Err(crate::Error::UnknownProjection(other.to_string())),
        })
    }
}

/// A backend operation together with its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum Projection {
    Count(Count),
    Search(Search),
    GeoSearch(Search),
    TiledGeoSearch(TiledSearch),
    Aggregate(Vec<Aggregation>),
    GeoAggregate(Vec<Aggregation>),
    GeohashGeoAggregate(GeohashAggregation),
    GeoTileGeoAggregate(GeoTileAggregation),
    Compute(ComputationRequest),
    Range(RangeRequest),
    ShapeSearch(Search),
    ShapeAggregate(Vec<Aggregation>),
}

impl Projection {
    /// A count with no extra payload.
    #[must_use]
    pub fn count() -> Self {
        Self::Count(Count::default())
    }

    #[must_use]
    pub fn kind(&self) -> ProjectionKind {
        match self {
            Self::Count(_) => ProjectionKind::Count,
            Self::Search(_) => ProjectionKind::Search,
            Self::GeoSearch(_) => ProjectionKind::GeoSearch,
            Self::TiledGeoSearch(_) => ProjectionKind::TiledGeoSearch,
            Self::Aggregate(_) => ProjectionKind::Aggregate,
            Self::GeoAggregate(_) => ProjectionKind::GeoAggregate,
            Self::GeohashGeoAggregate(_) => ProjectionKind::GeohashGeoAggregate,
            Self::GeoTileGeoAggregate(_) => ProjectionKind::GeoTileGeoAggregate,
            Self::Compute(_) => ProjectionKind::Compute,
            Self::Range(_) => ProjectionKind::Range,
            Self::ShapeSearch(_) => ProjectionKind::ShapeSearch,
            Self::ShapeAggregate(_) => ProjectionKind::ShapeAggregate,
        }
    }

    /// The aggregation pipeline of aggregate-type projections.
    #[must_use]
    pub fn aggregations(&self) -> Option<&[Aggregation]> {
        match self {
            Self::Aggregate(aggs) | Self::GeoAggregate(aggs) | Self::ShapeAggregate(aggs) => {
                Some(aggs)
            }
            Self::GeohashGeoAggregate(g) => Some(&g.aggregations),
            Self::GeoTileGeoAggregate(g) => Some(&g.aggregations),
            _ => None,
        }
    }

    /// The search payload of search-type projections.
    #[must_use]
    pub fn search(&self) -> Option<&Search> {
        match self {
            Self::Search(s) | Self::GeoSearch(s) | Self::ShapeSearch(s) => Some(s),
            Self::TiledGeoSearch(t) => Some(&t.search),
            _ => None,
        }
    }
}
