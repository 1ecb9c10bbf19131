//! End-to-end scenarios exercising the whole pipeline (normalize through
//! assembly, routing, and index pruning) from typed inputs to the literal
//! JSON/string shapes a caller would send to the datastore.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;
use time::macros::datetime;

use shard_query_core::aggregation::{encode_aggregated_value_key, AggregationQuery, Computation, ComputationFunction, Grouping};
use shard_query_core::config::QueryPlannerConfig;
use shard_query_core::executor::{compile_request, IndexContext};
use shard_query_core::filter::{FilterNode, LeafPredicates};
use shard_query_core::query::{DatastoreQuery, IndexDefinitionKey};
use shard_query_core::routing::{resolve_routing, RoutingDecision};
use shard_query_core::schema::{IndexDefinition, RolloverConfig, RolloverGranularity};
use shard_query_core::value::Value;

fn index_def(name: &str, route_with: Option<&str>, rollover: Option<RolloverConfig>) -> IndexDefinitionKey {
    IndexDefinitionKey(IndexDefinition {
        name: name.to_string(),
        cluster_to_query: "main".to_string(),
        route_with: route_with.map(str::to_string),
        rollover,
        ignored_routing_values: BTreeSet::new(),
        search_index_expression_template: format!("{name}__*"),
    })
}

fn context(base_pattern: &'static str, rollover: Option<&'static RolloverConfig>, known_indices: BTreeSet<String>) -> IndexContext<'static> {
    IndexContext {
        base_pattern,
        rollover,
        known_indices,
        routing_field_paths: BTreeSet::new(),
        ignored_routing_values: BTreeSet::new(),
    }
}

/// Scenario 1: an empty filter with documents requested produces a body
/// with no `query` key, a default tiebreaker sort, and `size = default + 1`.
#[test]
fn empty_filter_query_has_no_query_key_and_default_tiebreaker() {
    let query = DatastoreQuery::new(
        BTreeSet::from([index_def("widgets", None, None)]),
        vec![],
        None,
        None,
        BTreeSet::from(["name".to_string()]),
        BTreeMap::new(),
        None,
    )
    .unwrap();

    let config = QueryPlannerConfig::default();
    let ctx = context("widgets__*", None, BTreeSet::new());
    let compiled = compile_request(&query, &ctx, &config).unwrap().unwrap();

    assert!(compiled.body.get("query").is_none());
    assert_eq!(compiled.body["size"], json!(51));
    assert_eq!(compiled.body["sort"], json!([{ "id": { "order": "asc", "missing": "_first" } }]));
}

/// Scenario 2: an `equal_to_any_of` filter on the routing field prunes the
/// routing header to exactly those values, comma-joined.
#[test]
fn equal_to_any_of_on_routing_field_prunes_shards() {
    let query = DatastoreQuery::new(
        BTreeSet::from([index_def("widgets", Some("name"), None)]),
        vec![FilterNode::leaf(
            "name",
            LeafPredicates {
                equal_to_any_of: Some(vec![Value::Text("abc".into()), Value::Text("def".into())]),
                ..Default::default()
            },
        )],
        None,
        None,
        BTreeSet::from(["name".to_string()]),
        BTreeMap::new(),
        None,
    )
    .unwrap();

    let config = QueryPlannerConfig::default();
    let ctx = IndexContext {
        base_pattern: "widgets__*",
        rollover: None,
        known_indices: BTreeSet::new(),
        routing_field_paths: BTreeSet::from(["name".to_string()]),
        ignored_routing_values: BTreeSet::new(),
    };
    let compiled = compile_request(&query, &ctx, &config).unwrap().unwrap();

    assert_eq!(compiled.header.routing.as_deref(), Some("abc,def"));
}

/// Scenario 3: two disjoint `equal_to_any_of` filters on the same routing
/// field intersect to empty; with aggregations present, routing falls back
/// to the configured placeholder shard rather than short-circuiting.
#[test]
fn disjoint_routing_prune_with_aggregations_falls_back_to_placeholder_shard() {
    let filters = vec![
        FilterNode::leaf(
            "name",
            LeafPredicates {
                equal_to_any_of: Some(vec![Value::Text("abc".into()), Value::Text("def".into())]),
                ..Default::default()
            },
        ),
        FilterNode::leaf(
            "name",
            LeafPredicates {
                equal_to_any_of: Some(vec![Value::Text("ghi".into()), Value::Text("jkl".into())]),
                ..Default::default()
            },
        ),
    ];
    let combined = FilterNode::AllOf(filters.clone());

    let decision = resolve_routing(
        &combined,
        &BTreeSet::from(["name".to_string()]),
        &BTreeSet::new(),
        true,
        "fallback_shard_routing_value",
    );
    assert_eq!(decision, RoutingDecision::FallbackShard("fallback_shard_routing_value".to_string()));

    let mut aggregations = BTreeMap::new();
    aggregations.insert(
        "totals".to_string(),
        AggregationQuery {
            name: "totals".to_string(),
            computations: vec![Computation {
                source_field_path: "amount".to_string(),
                function: ComputationFunction::Sum,
                computed_field_name: "sum".to_string(),
                graphql_field_path: "amount".to_string(),
            }],
            groupings: vec![],
            filter: None,
            sub_aggregations: vec![],
            first: None,
            needs_doc_count: false,
            needs_doc_count_error: false,
        },
    );

    let query = DatastoreQuery::new(
        BTreeSet::from([index_def("widgets", Some("name"), None)]),
        filters,
        None,
        None,
        BTreeSet::new(),
        aggregations,
        None,
    )
    .unwrap();

    let config = QueryPlannerConfig::default();
    let ctx = IndexContext {
        base_pattern: "widgets__*",
        rollover: None,
        known_indices: BTreeSet::new(),
        routing_field_paths: BTreeSet::from(["name".to_string()]),
        ignored_routing_values: BTreeSet::new(),
    };
    let compiled = compile_request(&query, &ctx, &config).unwrap().unwrap();
    assert_eq!(compiled.header.routing.as_deref(), Some("fallback_shard_routing_value"));
}

/// Scenario 4: a `gt` bound on a monthly rollover family excludes every
/// known month strictly before the bound, keeping the bound's own month and
/// everything after it (order among the excluded names is immaterial).
#[test]
fn gt_bound_prunes_earlier_known_months_from_index_expression() {
    let rollover = RolloverConfig {
        granularity: RolloverGranularity::Month,
        timestamp_field_path: "created_at".to_string(),
    };
    let known: BTreeSet<String> = (1..=12).map(|m| format!("widgets_rollover__2021-{m:02}")).collect();

    let query = DatastoreQuery::new(
        BTreeSet::from([index_def(
            "widgets_rollover",
            None,
            Some(rollover.clone()),
        )]),
        vec![FilterNode::leaf(
            "created_at",
            LeafPredicates {
                range: Some(shard_query_core::filter::RangeBounds {
                    gt: Some(Value::DateTime(datetime!(2021-04-15 12:30:00 UTC))),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )],
        None,
        None,
        BTreeSet::from(["name".to_string()]),
        BTreeMap::new(),
        None,
    )
    .unwrap();

    let config = QueryPlannerConfig::default();
    let ctx = context("widgets_rollover__*", Some(&rollover), known);
    let compiled = compile_request(&query, &ctx, &config).unwrap().unwrap();

    assert!(compiled.header.index.starts_with("widgets_rollover__*"));
    for excluded_month in ["01", "02", "03"] {
        assert!(compiled.header.index.contains(&format!("-widgets_rollover__2021-{excluded_month}")));
    }
    for kept_month in ["04", "05", "12"] {
        assert!(!compiled.header.index.contains(&format!("-widgets_rollover__2021-{kept_month}")));
    }
}

/// Scenario 5: `equal_to_any_of` with a `nil` entry on a non-id field
/// splits into a `should` of the values clause and a missing-field branch.
#[test]
fn equal_to_any_of_with_nil_splits_into_should_missing_field_shape() {
    let query = DatastoreQuery::new(
        BTreeSet::from([index_def("widgets", None, None)]),
        vec![FilterNode::leaf(
            "age",
            LeafPredicates {
                equal_to_any_of: Some(vec![Value::Null, Value::Int(25), Value::Int(40)]),
                ..Default::default()
            },
        )],
        None,
        None,
        BTreeSet::from(["name".to_string()]),
        BTreeMap::new(),
        None,
    )
    .unwrap();

    let config = QueryPlannerConfig::default();
    let ctx = context("widgets__*", None, BTreeSet::new());
    let compiled = compile_request(&query, &ctx, &config).unwrap().unwrap();

    assert_eq!(
        compiled.body["query"],
        json!({
            "bool": {
                "should": [
                    { "bool": { "filter": [{ "terms": { "age": [25, 40] } }] } },
                    { "bool": { "must_not": [{ "bool": { "filter": [{ "exists": { "field": "age" } }] } }] } },
                ],
                "minimum_should_match": 1,
            }
        })
    );
}

/// Scenario 6: a single grouping with `first = 17` produces a composite
/// aggregation of size 18 with a `missing_bucket` terms source, and the
/// metric child key follows the documented aggregated-value key encoding.
#[test]
fn composite_aggregation_with_one_grouping_and_first_seventeen() {
    let computed_field_name = encode_aggregated_value_key("totals", "amountMoney.amount", "sum");

    let mut aggregations = BTreeMap::new();
    aggregations.insert(
        "totals".to_string(),
        AggregationQuery {
            name: "totals".to_string(),
            computations: vec![Computation {
                source_field_path: "amountMoney.amount".to_string(),
                function: ComputationFunction::Sum,
                computed_field_name: computed_field_name.clone(),
                graphql_field_path: "amountMoney.amount".to_string(),
            }],
            groupings: vec![Grouping::FieldTerm {
                field_path: "options.size".to_string(),
                graphql_path: "options.size".to_string(),
            }],
            filter: None,
            sub_aggregations: vec![],
            first: Some(17),
            needs_doc_count: false,
            needs_doc_count_error: false,
        },
    );

    let query = DatastoreQuery::new(
        BTreeSet::from([index_def("widgets", None, None)]),
        vec![],
        None,
        None,
        BTreeSet::new(),
        aggregations,
        None,
    )
    .unwrap();

    let config = QueryPlannerConfig::default();
    let ctx = context("widgets__*", None, BTreeSet::new());
    let compiled = compile_request(&query, &ctx, &config).unwrap().unwrap();

    let node = &compiled.body["aggs"]["totals"];
    assert_eq!(node["composite"]["size"], json!(18));
    assert_eq!(
        node["composite"]["sources"][0]["options.size"]["terms"],
        json!({ "field": "options.size", "missing_bucket": true })
    );
    assert_eq!(node["aggs"][&computed_field_name]["sum"]["field"], json!("amountMoney.amount"));
    assert_eq!(computed_field_name, "totals:amountMoney.amount:sum");
}

/// Scenario 7: merging two queries with `equal_to_any_of` filters on the
/// same field preserves both filters side by side rather than intersecting
/// them (filters merge by set-union, not by narrowing).
#[test]
fn merge_preserves_both_equal_to_any_of_filters_as_siblings() {
    let index = BTreeSet::from([index_def("widgets", None, None)]);

    let q1 = DatastoreQuery::new(
        index.clone(),
        vec![FilterNode::leaf(
            "age",
            LeafPredicates {
                equal_to_any_of: Some(vec![Value::Int(25), Value::Int(30)]),
                ..Default::default()
            },
        )],
        None,
        None,
        BTreeSet::from(["name".to_string()]),
        BTreeMap::new(),
        None,
    )
    .unwrap();

    let q2 = DatastoreQuery::new(
        index,
        vec![FilterNode::leaf(
            "age",
            LeafPredicates {
                equal_to_any_of: Some(vec![Value::Int(35), Value::Int(30)]),
                ..Default::default()
            },
        )],
        None,
        None,
        BTreeSet::new(),
        BTreeMap::new(),
        None,
    )
    .unwrap();

    let merged = q1.merge(&q2).unwrap();

    let config = QueryPlannerConfig::default();
    let ctx = context("widgets__*", None, BTreeSet::new());
    let compiled = compile_request(&merged, &ctx, &config).unwrap().unwrap();

    assert_eq!(
        compiled.body["query"],
        json!({
            "bool": {
                "filter": [
                    { "terms": { "age": [25, 30] } },
                    { "terms": { "age": [35, 30] } },
                ]
            }
        })
    );
}
