//! GET query-string encoding.
//!
//! Field-expression groups become repeated `f` parameters
//! (`field:op:value` joined by `;` inside a group), aggregation stages become
//! repeated `agg` parameters of colon-separated tokens, and the global flags
//! are single parameters.

use collabsearch_types::{Aggregation, Filter, Projection};

/// Encodes every field-expression group of a filter.
pub fn filter_params(filter: &Filter) -> Vec<String> {
    filter
        .groups()
        .map(|group| {
            group
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(";")
        })
        .collect()
}

/// Encodes every free-text group of a filter, `None` when the filter has no
/// `q` at all.
pub fn query_params(filter: &Filter) -> Option<Vec<String>> {
    filter
        .q
        .as_ref()
        .map(|groups| groups.iter().map(|terms| terms.join(";")).collect())
}

/// Encodes one aggregation stage.
pub fn aggregation_param(agg: &Aggregation) -> String {
    let mut out = format!("{}:{}", agg.kind.as_str(), agg.field);
    if let Some(interval) = &agg.interval {
        if let Some(value) = interval.value {
            out.push_str(&format!(":interval-{value}"));
        }
        if let Some(unit) = interval.unit {
            out.push_str(unit.as_str());
        }
    }
    if let Some(format) = &agg.format {
        out.push_str(&format!(":format-{format}"));
    }
    for metric in agg.metrics.iter().flatten() {
        if let (Some(field), Some(fct)) = (&metric.collect_field, metric.collect_fct) {
            out.push_str(&format!(":collect_field-{field}:collect_fct-{}", fct.as_str()));
        }
    }
    if let Some(order) = agg.order {
        out.push_str(&format!(":order-{}", order.as_str()));
    }
    if let Some(on) = agg.on {
        out.push_str(&format!(":on-{}", on.as_str()));
    }
    if let Some(size) = &agg.size {
        out.push_str(&format!(":size-{size}"));
    }
    if let Some(geometries) = &agg.aggregated_geometries {
        let joined = geometries
            .iter()
            .map(|g| g.as_str())
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&format!(":aggregated_geometries-{joined}"));
    }
    if let Some(raw) = &agg.raw_geometries {
        let joined = raw
            .iter()
            .map(|rg| match &rg.sort {
                Some(sort) => format!("{}({sort})", rg.geometry),
                None => rg.geometry.clone(),
            })
            .collect::<Vec<_>>()
            .join(";");
        out.push_str(&format!(":raw_geometries-{joined}"));
    }
    if let Some(fetch) = &agg.fetch_hits {
        out.push_str(":fetch_hits");
        if let Some(size) = fetch.size {
            out.push_str(&format!("-{size}"));
        }
        if let Some(include) = &fetch.include {
            out.push_str(&format!("({})", include.join(",")));
        }
    }
    if let Some(include) = &agg.include {
        out.push_str(&format!(":include-{include}"));
    }
    out
}

/// Encodes an aggregation pipeline.
pub fn aggregation_params(aggregations: &[Aggregation]) -> Vec<String> {
    aggregations.iter().map(aggregation_param).collect()
}

/// GET parameters of one outbound query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub agg: Vec<String>,
    pub f: Vec<String>,
    pub q: Option<Vec<String>>,
    pub pretty: bool,
    pub max_age: Option<u64>,
    pub dateformat: Option<String>,
    pub righthand: bool,
}

impl QueryParams {
    /// Builds the parameters of a projection over an already merged filter.
    /// `agg` is only filled for aggregation kinds.
    pub fn build(projection: &Projection, filter: &Filter, max_age: Option<u64>) -> Self {
        let agg = if projection.kind().is_aggregation() {
            projection
                .aggregations()
                .map(aggregation_params)
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        Self {
            agg,
            f: filter_params(filter),
            q: query_params(filter),
            pretty: false,
            max_age,
            dateformat: filter.dateformat.clone(),
            righthand: false,
        }
    }

    /// Parameters in emission order.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(self.agg.len() + self.f.len() + 5);
        pairs.extend(self.agg.iter().map(|a| ("agg", a.clone())));
        pairs.extend(self.f.iter().map(|f| ("f", f.clone())));
        if let Some(q) = &self.q {
            pairs.push(("q", q.join(",")));
        }
        pairs.push(("pretty", self.pretty.to_string()));
        if let Some(max_age) = self.max_age {
            pairs.push(("max-age-cache", max_age.to_string()));
        }
        if let Some(dateformat) = &self.dateformat {
            pairs.push(("dateformat", dateformat.clone()));
        }
        pairs.push(("righthand", self.righthand.to_string()));
        pairs
    }

    /// Percent-encoded `key=value&...` string.
    pub fn to_query_string(&self) -> String {
        self.to_pairs()
            .into_iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(&value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}
