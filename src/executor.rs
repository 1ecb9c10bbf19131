//! Batch Executor (§4.7): groups queries by datastore cluster, yields a map
//! of `(header, body)` tuples to a caller-supplied transport callback
//! exactly once, and wraps the raw responses.

use std::collections::BTreeMap;

use serde_json::{json, Value as Json};

use crate::config::QueryPlannerConfig;
use crate::error::{ExecutorError, QueryCoreError};
use crate::index_expr::build_index_expression;
use crate::query::{assemble_body, DatastoreQuery};
use crate::routing::{resolve_routing, RoutingDecision};
use crate::schema::RolloverConfig;

/// Header fields sent alongside a query body (§4.7 item 2).
#[derive(Clone, Debug, PartialEq)]
pub struct QueryHeader {
    pub index: String,
    pub routing: Option<String>,
}

/// A compiled `(header, body)` request ready for transport.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledRequest {
    pub header: QueryHeader,
    pub body: Json,
}

/// A wrapped datastore response with a stable empty fallback shape
/// (§4.7 item 5).
#[derive(Clone, Debug, PartialEq)]
pub struct SearchResponse {
    pub raw: Json,
}

impl SearchResponse {
    #[must_use]
    pub fn from_raw(raw: Json) -> Self {
        Self { raw }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            raw: json!({
                "hits": { "hits": [], "total": { "value": 0 } },
                "aggregations": {},
            }),
        }
    }
}

/// Extra per-query inputs the compiler needs that are not carried on
/// `DatastoreQuery` itself: the rollover config (if any) and the set of
/// concrete index names currently known to exist for its pattern.
pub struct IndexContext<'a> {
    pub base_pattern: &'a str,
    pub rollover: Option<&'a RolloverConfig>,
    pub known_indices: std::collections::BTreeSet<String>,
    pub routing_field_paths: std::collections::BTreeSet<String>,
    pub ignored_routing_values: std::collections::BTreeSet<String>,
}

/// Compile one query into its transport-ready `(header, body)`, or `None`
/// if it produces no payload at all (§4.7 item 1: such queries are dropped
/// and get a default empty response instead). Fails if the query's
/// aggregations have no sound plan (§4.5).
pub fn compile_request(
    query: &DatastoreQuery,
    context: &IndexContext<'_>,
    config: &QueryPlannerConfig,
) -> Result<Option<CompiledRequest>, QueryCoreError> {
    let Some(assembled) = assemble_body(query, config)? else {
        return Ok(None);
    };

    let filter = query.combined_filter();
    let index = match context.rollover {
        Some(rollover) => build_index_expression(
            &filter,
            rollover,
            context.base_pattern,
            &context.known_indices,
            query.has_aggregations(),
        ),
        None => context.base_pattern.to_string(),
    };

    let routing_decision = resolve_routing(
        &filter,
        &context.routing_field_paths,
        &context.ignored_routing_values,
        query.has_aggregations(),
        &config.fallback_shard_routing_value,
    );
    let routing = match routing_decision {
        RoutingDecision::AllShards | RoutingDecision::NoShards => None,
        RoutingDecision::Shards(shards) => Some(shards.into_iter().collect::<Vec<_>>().join(",")),
        RoutingDecision::FallbackShard(value) => Some(value),
    };

    Ok(Some(CompiledRequest {
        header: QueryHeader { index, routing },
        body: assembled.body,
    }))
}

/// Identifies one query within a batch for the transport callback's map
/// keys and for error reporting; callers supply a stable id per query
/// (e.g. the GraphQL root field name).
pub type QueryId = String;

/// Run a batch of queries through `transport` exactly once (§4.7 item 3).
/// `transport` maps the non-dropped `(id, header, body)` requests to raw
/// JSON responses; any id missing from its return value is a
/// [`ExecutorError::SearchFailed`].
pub fn execute_batch<F>(
    queries: &BTreeMap<QueryId, (DatastoreQuery, IndexContext<'_>)>,
    config: &QueryPlannerConfig,
    transport: F,
) -> Result<BTreeMap<QueryId, SearchResponse>, QueryCoreError>
where
    F: FnOnce(BTreeMap<QueryId, CompiledRequest>) -> BTreeMap<QueryId, Json>,
{
    let mut requests = BTreeMap::new();
    let mut results = BTreeMap::new();

    for (id, (query, context)) in queries {
        match compile_request(query, context, config)? {
            Some(request) => {
                requests.insert(id.clone(), request);
            }
            None => {
                results.insert(id.clone(), SearchResponse::empty());
            }
        }
    }

    let expected_count = requests.len();
    let mut raw_responses = transport(requests.clone());

    let missing: Vec<String> = requests.keys().filter(|id| !raw_responses.contains_key(*id)).cloned().collect();
    if !missing.is_empty() {
        return Err(ExecutorError::SearchFailed {
            missing_count: missing.len(),
            expected_count,
            debug_descriptions: missing,
        }
        .into());
    }

    for id in requests.keys() {
        if let Some(raw) = raw_responses.remove(id) {
            results.insert(id.clone(), SearchResponse::from_raw(raw));
        }
    }

    Ok(results)
}
