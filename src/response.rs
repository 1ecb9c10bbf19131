//! Response Decoder (§2 item 9): reads raw hits and aggregation buckets
//! back into typed shapes using the `meta` side-channel the Aggregation
//! Planner embedded in the request (§4.5), symmetric to [`crate::aggregation`].

use std::collections::BTreeMap;

use serde_json::Value as Json;

use crate::aggregation::decode_aggregated_value_key;
use crate::executor::SearchResponse;

/// One decoded document hit: its id plus the requested `_source` fields.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentHit {
    pub id: String,
    pub source: Json,
}

/// One decoded aggregation bucket: the grouping key values (in grouping
/// order) and the computed values for that bucket, keyed by the
/// aggregated-value key (§4.5, §6).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregationBucket {
    pub key_values: Vec<Json>,
    pub doc_count: u64,
    pub computed_values: BTreeMap<String, Json>,
}

/// Top-level decoded shape for one query's response.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedResponse {
    pub hits: Vec<DocumentHit>,
    pub total_document_count: Option<u64>,
    pub buckets: Vec<AggregationBucket>,
}

/// Decode the document hits out of a raw response (`hits.hits[]._id` /
/// `_source`).
#[must_use]
pub fn decode_hits(response: &SearchResponse) -> Vec<DocumentHit> {
    response.raw["hits"]["hits"]
        .as_array()
        .into_iter()
        .flatten()
        .map(|hit| DocumentHit {
            id: hit["_id"].as_str().unwrap_or_default().to_string(),
            source: hit.get("_source").cloned().unwrap_or(Json::Null),
        })
        .collect()
}

/// Decode `hits.total.value`, present whenever `track_total_hits` was set.
#[must_use]
pub fn decode_total_document_count(response: &SearchResponse) -> Option<u64> {
    response.raw["hits"]["total"]["value"].as_u64()
}

/// Decode the composite-strategy aggregation result named `agg_name` out
/// of `response.aggregations`. Each composite bucket's `key` map supplies
/// the grouping key values in the order the sources were declared; each
/// non-`doc_count`/`key` entry is a computed value, whose bucket key is
/// resolved through [`decode_aggregated_value_key`] when a caller needs to
/// map it back to its originating computation.
#[must_use]
pub fn decode_composite_buckets(response: &SearchResponse, agg_name: &str) -> Vec<AggregationBucket> {
    let node = &response.raw["aggregations"][agg_name];
    let buckets = node["buckets"].as_array().cloned().unwrap_or_default();

    buckets
        .into_iter()
        .map(|bucket| {
            let key_values = bucket["key"]
                .as_object()
                .map(|key_map| key_map.values().cloned().collect())
                .unwrap_or_default();
            let doc_count = bucket["doc_count"].as_u64().unwrap_or(0);
            let mut computed_values = BTreeMap::new();
            if let Some(obj) = bucket.as_object() {
                for (field, value) in obj {
                    if field == "key" || field == "doc_count" {
                        continue;
                    }
                    computed_values.insert(field.clone(), value.clone());
                }
            }
            AggregationBucket { key_values, doc_count, computed_values }
        })
        .collect()
}

/// Resolve a computed-value field name found inside a bucket back to
/// `(agg_name, graphql_dot_path, computed_field_name)`, when that field was
/// named using the aggregated-value key convention rather than a plain
/// metric name (nested/sub-aggregation cases, §4.5).
#[must_use]
pub fn resolve_computed_field(field_name: &str) -> Option<(String, String, String)> {
    decode_aggregated_value_key(field_name)
}
