//! Aggregation DSL emission (§4.5): builds the `aggs` subtree for one
//! [`AggregationQuery`] under either planner strategy, alongside the `meta`
//! side-channel the Response Decoder needs to walk the resulting buckets.

use std::collections::BTreeSet;

use serde_json::{json, Map, Value as Json};

use crate::config::AggregationStrategy;
use crate::error::PlanError;
use crate::filter::interpret;

use super::types::{AggregationQuery, Computation, Grouping, SubAggregation};

/// Per-node metadata the Response Decoder consults to know how to read a
/// bucket back into a typed shape (§4.5).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregationMeta {
    pub size: u32,
    pub bucket_path: Option<String>,
    pub buckets_path: Option<String>,
    pub merge_into_bucket: Option<bool>,
    pub grouping_fields: Option<Vec<String>>,
    pub key_path: Option<String>,
}

impl AggregationMeta {
    fn to_json(&self) -> Json {
        let mut map = Map::new();
        map.insert("size".to_string(), json!(self.size));
        if let Some(v) = &self.bucket_path {
            map.insert("bucket_path".to_string(), json!(v));
        }
        if let Some(v) = &self.buckets_path {
            map.insert("buckets_path".to_string(), json!(v));
        }
        if let Some(v) = self.merge_into_bucket {
            map.insert("merge_into_bucket".to_string(), json!(v));
        }
        if let Some(v) = &self.grouping_fields {
            map.insert("grouping_fields".to_string(), json!(v));
        }
        if let Some(v) = &self.key_path {
            map.insert("key_path".to_string(), json!(v));
        }
        Json::Object(map)
    }
}

/// Build `(node_name, node_body, meta)` for `query`, or `None` when
/// `query.first == Some(0)` (§4.5 last bullet: the node is omitted
/// entirely).
pub fn build_aggregation(
    query: &AggregationQuery,
    strategy: AggregationStrategy,
    default_page_size: u32,
) -> Result<Option<(String, Json, AggregationMeta)>, PlanError> {
    if query.is_omitted() {
        return Ok(None);
    }
    check_unique_composite_source_names(&query.groupings)?;

    let size = query.first.unwrap_or(default_page_size);
    let body = build_aggregation_body(query, strategy, default_page_size, size);
    let meta = AggregationMeta {
        size,
        grouping_fields: if query.groupings.is_empty() {
            None
        } else {
            Some(query.groupings.iter().map(|g| g.graphql_path().to_string()).collect())
        },
        ..Default::default()
    };
    let (name, body) = wrap_with_filter(&query.name, query.filter.as_ref(), body);
    Ok(Some((name, body, meta)))
}

/// Composite aggregation sources are keyed by name (§4.5 scenario 6); two
/// groupings producing the same source name would silently overwrite one
/// another in the datastore's `sources` array.
fn check_unique_composite_source_names(groupings: &[Grouping]) -> Result<(), PlanError> {
    let mut seen = BTreeSet::new();
    for grouping in groupings {
        let name = grouping.source_name();
        if !seen.insert(name) {
            return Err(PlanError::DuplicateCompositeSourceName { name: name.to_string() });
        }
    }
    Ok(())
}

fn build_aggregation_body(
    query: &AggregationQuery,
    strategy: AggregationStrategy,
    default_page_size: u32,
    size: u32,
) -> Json {
    let mut aggs = Map::new();
    for computation in &query.computations {
        aggs.insert(computation.computed_field_name.clone(), metric_clause(computation));
    }
    for sub in &query.sub_aggregations {
        let (name, body) = build_sub_aggregation(sub, strategy, default_page_size);
        aggs.insert(name, body);
    }

    if query.groupings.is_empty() {
        return Json::Object(aggs);
    }

    match strategy {
        AggregationStrategy::Composite => build_composite(&query.groupings, size, aggs),
        AggregationStrategy::NonComposite => {
            build_noncomposite_tree(&query.groupings, 0, default_page_size, aggs)
        }
    }
}

fn metric_clause(computation: &Computation) -> Json {
    json!({
        computation.function.as_str(): { "field": computation.source_field_path }
    })
}

fn wrap_with_filter(name: &str, filter: Option<&crate::filter::FilterNode>, body: Json) -> (String, Json) {
    match filter {
        None => (name.to_string(), body),
        Some(node) => {
            let query_clause = interpret(node).unwrap_or_else(|| json!({ "match_all": {} }));
            let wrapped = json!({ "filter": query_clause, "aggs": { name: body } });
            (format!("{name}:filtered"), wrapped)
        }
    }
}

fn build_sub_aggregation(
    sub: &SubAggregation,
    strategy: AggregationStrategy,
    default_page_size: u32,
) -> (String, Json) {
    let path = sub.path_in_index.join(".");
    let prefixed_query = prefix_field_paths(&sub.query, &path);
    let default_size = prefixed_query.first.unwrap_or(default_page_size);
    let inner_body = build_aggregation_body(&prefixed_query, strategy, default_page_size, default_size + 1);
    let meta = AggregationMeta { size: default_size, ..Default::default() };
    let (name, body) = wrap_with_filter(&prefixed_query.name, prefixed_query.filter.as_ref(), inner_body);
    (
        name,
        json!({
            "nested": { "path": path },
            "meta": meta.to_json(),
            "aggs": body,
        }),
    )
}

/// Prefix every metric/grouping field path in `query` with `prefix` — the
/// nested aggregation's full dotted path. ES requires fully-qualified field
/// names even inside a `nested` aggregation's own sub-aggregations, so
/// callers hand this planner paths relative to the nested object, the same
/// way filter normalization takes relative nested-field paths and joins them
/// against the enclosing path before interpretation. `graphql_field_path`/
/// `graphql_path` are left untouched: those name the GraphQL-facing shape,
/// not the index field.
fn prefix_field_paths(query: &AggregationQuery, prefix: &str) -> AggregationQuery {
    let mut query = query.clone();
    for computation in &mut query.computations {
        computation.source_field_path = format!("{prefix}.{}", computation.source_field_path);
    }
    for grouping in &mut query.groupings {
        prefix_grouping_field_path(grouping, prefix);
    }
    query
}

fn prefix_grouping_field_path(grouping: &mut Grouping, prefix: &str) {
    match grouping {
        Grouping::FieldTerm { field_path, .. }
        | Grouping::DateHistogram { field_path, .. }
        | Grouping::Script { field_path, .. } => {
            *field_path = format!("{prefix}.{field_path}");
        }
    }
}

fn build_composite(groupings: &[Grouping], size: u32, aggs: Map<String, Json>) -> Json {
    let sources: Vec<Json> = groupings.iter().map(composite_source).collect();
    let mut node = Map::new();
    node.insert("composite".to_string(), json!({ "size": size, "sources": sources }));
    if !aggs.is_empty() {
        node.insert("aggs".to_string(), Json::Object(aggs));
    }
    Json::Object(node)
}

fn composite_source(grouping: &Grouping) -> Json {
    let name = grouping.source_name().to_string();
    match grouping {
        Grouping::FieldTerm { field_path, .. } => {
            json!({ name: { "terms": { "field": field_path, "missing_bucket": true } } })
        }
        Grouping::DateHistogram { field_path, calendar_interval, time_zone, .. } => {
            json!({
                name: {
                    "date_histogram": {
                        "field": field_path,
                        "calendar_interval": calendar_interval,
                        "time_zone": time_zone,
                        "format": "strict_date_time",
                        "missing_bucket": true,
                    }
                }
            })
        }
        Grouping::Script { script_id, params, field_path, .. } => {
            let _ = field_path;
            json!({
                name: {
                    "terms": {
                        "script": { "id": script_id, "params": params },
                        "missing_bucket": true,
                    }
                }
            })
        }
    }
}

fn build_noncomposite_tree(
    groupings: &[Grouping],
    idx: usize,
    default_page_size: u32,
    leaf_aggs: Map<String, Json>,
) -> Json {
    let Some(grouping) = groupings.get(idx) else {
        return Json::Object(leaf_aggs);
    };
    let is_last = idx + 1 == groupings.len();
    let child_aggs = if is_last {
        leaf_aggs.clone()
    } else {
        let nested = build_noncomposite_tree(groupings, idx + 1, default_page_size, leaf_aggs.clone());
        nested.as_object().cloned().unwrap_or_default()
    };

    let name = grouping.source_name().to_string();
    let graphql_path = grouping.graphql_path().to_string();
    let mut aggs_map = Map::new();

    let node_meta = AggregationMeta {
        size: default_page_size,
        grouping_fields: Some(vec![graphql_path.clone()]),
        ..Default::default()
    };

    match grouping {
        Grouping::FieldTerm { field_path, .. } => {
            aggs_map.insert(
                name.clone(),
                json!({
                    "terms": {
                        "field": field_path,
                        "collect_mode": "depth_first",
                        "size": default_page_size,
                        "show_term_doc_count_error": true,
                    },
                    "meta": node_meta.to_json(),
                    "aggs": child_aggs,
                }),
            );
            let missing_meta = AggregationMeta {
                size: default_page_size,
                grouping_fields: Some(vec![graphql_path]),
                // Signals to the Response Decoder that this bucket's one
                // (missing-valued) row folds into the sibling terms
                // aggregation's bucket list as a null-key entry (§4.5).
                merge_into_bucket: Some(true),
                ..Default::default()
            };
            aggs_map.insert(
                format!("{name}:m"),
                json!({
                    "missing": { "field": field_path },
                    "meta": missing_meta.to_json(),
                    "aggs": child_aggs,
                }),
            );
        }
        Grouping::DateHistogram { field_path, calendar_interval, time_zone, .. } => {
            aggs_map.insert(
                name,
                json!({
                    "date_histogram": {
                        "field": field_path,
                        "calendar_interval": calendar_interval,
                        "format": "strict_date_time",
                        "time_zone": time_zone,
                        "min_doc_count": 1,
                    },
                    "meta": node_meta.to_json(),
                    "aggs": child_aggs,
                }),
            );
        }
        Grouping::Script { script_id, params, .. } => {
            aggs_map.insert(
                name,
                json!({
                    "terms": {
                        "script": { "id": script_id, "params": params },
                        "collect_mode": "depth_first",
                        "size": default_page_size,
                    },
                    "meta": node_meta.to_json(),
                    "aggs": child_aggs,
                }),
            );
        }
    }

    Json::Object(aggs_map)
}
