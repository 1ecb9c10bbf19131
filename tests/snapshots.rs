//! Snapshot tests for larger composed payloads: full aggregation trees and
//! merged queries, where literal field-by-field assertions would be mostly
//! noise. Run `cargo insta review` after a deliberate payload-shape change.

use std::collections::{BTreeMap, BTreeSet};

use shard_query_core::aggregation::{AggregationQuery, Computation, ComputationFunction, Grouping, SubAggregation};
use shard_query_core::config::QueryPlannerConfig;
use shard_query_core::executor::{compile_request, IndexContext};
use shard_query_core::filter::{FilterNode, LeafPredicates};
use shard_query_core::query::{DatastoreQuery, IndexDefinitionKey};
use shard_query_core::schema::IndexDefinition;
use shard_query_core::value::Value;

fn index_def() -> IndexDefinitionKey {
    IndexDefinitionKey(IndexDefinition {
        name: "widgets".to_string(),
        cluster_to_query: "main".to_string(),
        route_with: None,
        rollover: None,
        ignored_routing_values: BTreeSet::new(),
        search_index_expression_template: "widgets__*".to_string(),
    })
}

fn context() -> IndexContext<'static> {
    IndexContext {
        base_pattern: "widgets__*",
        rollover: None,
        known_indices: BTreeSet::new(),
        routing_field_paths: BTreeSet::new(),
        ignored_routing_values: BTreeSet::new(),
    }
}

#[test]
fn composite_aggregation_with_nested_sub_aggregation_snapshot() {
    let totals = AggregationQuery {
        name: "totals".to_string(),
        computations: vec![
            Computation {
                source_field_path: "amountMoney.amount".to_string(),
                function: ComputationFunction::Sum,
                computed_field_name: "totals:amountMoney.amount:sum".to_string(),
                graphql_field_path: "amountMoney.amount".to_string(),
            },
            Computation {
                source_field_path: "amountMoney.amount".to_string(),
                function: ComputationFunction::Avg,
                computed_field_name: "totals:amountMoney.amount:avg".to_string(),
                graphql_field_path: "amountMoney.amount".to_string(),
            },
        ],
        groupings: vec![
            Grouping::FieldTerm {
                field_path: "options.size".to_string(),
                graphql_path: "options.size".to_string(),
            },
            Grouping::DateHistogram {
                field_path: "created_at".to_string(),
                calendar_interval: "month".to_string(),
                time_zone: "UTC".to_string(),
                offset: None,
                graphql_path: "createdAt".to_string(),
            },
        ],
        filter: Some(FilterNode::leaf(
            "status",
            LeafPredicates {
                equal_to_any_of: Some(vec![Value::Text("open".into())]),
                ..Default::default()
            },
        )),
        sub_aggregations: vec![SubAggregation {
            path_in_index: vec!["reviews".to_string()],
            query: AggregationQuery {
                name: "reviewStats".to_string(),
                computations: vec![Computation {
                    source_field_path: "rating".to_string(),
                    function: ComputationFunction::Avg,
                    computed_field_name: "reviewStats:reviews.rating:avg".to_string(),
                    graphql_field_path: "reviews.rating".to_string(),
                }],
                groupings: vec![],
                filter: None,
                sub_aggregations: vec![],
                first: None,
                needs_doc_count: false,
                needs_doc_count_error: false,
            },
        }],
        first: Some(10),
        needs_doc_count: true,
        needs_doc_count_error: false,
    };

    let mut aggregations = BTreeMap::new();
    aggregations.insert("totals".to_string(), totals);

    let query = DatastoreQuery::new(
        BTreeSet::from([index_def()]),
        vec![],
        None,
        None,
        BTreeSet::new(),
        aggregations,
        None,
    )
    .unwrap();

    let config = QueryPlannerConfig::default();
    let compiled = compile_request(&query, &context(), &config).unwrap().unwrap();

    insta::assert_json_snapshot!(compiled.body);
}

#[test]
fn merged_query_with_filter_sort_and_aggregation_snapshot() {
    let q1 = DatastoreQuery::new(
        BTreeSet::from([index_def()]),
        vec![FilterNode::leaf(
            "category",
            LeafPredicates {
                equal_to_any_of: Some(vec![Value::Text("tools".into())]),
                ..Default::default()
            },
        )],
        Some(vec![shard_query_core::query::SortClause {
            field_path: "createdAt".to_string(),
            direction: shard_query_core::query::SortDirection::Desc,
        }]),
        None,
        BTreeSet::from(["name".to_string(), "category".to_string()]),
        BTreeMap::new(),
        None,
    )
    .unwrap();

    let mut aggregations = BTreeMap::new();
    aggregations.insert(
        "totals".to_string(),
        AggregationQuery {
            name: "totals".to_string(),
            computations: vec![Computation {
                source_field_path: "amount".to_string(),
                function: ComputationFunction::Sum,
                computed_field_name: "totals::sum".to_string(),
                graphql_field_path: String::new(),
            }],
            groupings: vec![],
            filter: None,
            sub_aggregations: vec![],
            first: None,
            needs_doc_count: false,
            needs_doc_count_error: false,
        },
    );
    let q2 = DatastoreQuery::new(
        BTreeSet::from([index_def()]),
        vec![FilterNode::leaf(
            "in_stock",
            LeafPredicates {
                equal_to_any_of: Some(vec![Value::Bool(true)]),
                ..Default::default()
            },
        )],
        None,
        None,
        BTreeSet::new(),
        aggregations,
        None,
    )
    .unwrap();

    let merged = q1.merge(&q2).unwrap();

    let config = QueryPlannerConfig::default();
    let compiled = compile_request(&merged, &context(), &config).unwrap().unwrap();

    insta::assert_json_snapshot!(compiled.body);
}
