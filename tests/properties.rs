//! Property-based tests for the universal invariants the unit tests don't
//! exhaustively cover: three-valued lattice algebra, aggregated-value key
//! round-tripping, merge idempotence/commutativity, and routing/index-prune
//! soundness.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use shard_query_core::aggregation::{decode_aggregated_value_key, encode_aggregated_value_key};
use shard_query_core::config::QueryPlannerConfig;
use shard_query_core::filter::{FilterNode, LeafPredicates};
use shard_query_core::query::{DatastoreQuery, IndexDefinitionKey};
use shard_query_core::routing::{resolve_routing, RoutingDecision};
use shard_query_core::schema::IndexDefinition;
use shard_query_core::three_valued::ThreeValued;
use shard_query_core::value::Value;

fn small_set() -> impl Strategy<Value = BTreeSet<i32>> {
    proptest::collection::btree_set(0..8i32, 0..6)
}

proptest! {
    #[test]
    fn three_valued_union_is_commutative(a in small_set(), b in small_set()) {
        let left = ThreeValued::from_set(a.clone()).union(ThreeValued::from_set(b.clone()));
        let right = ThreeValued::from_set(b).union(ThreeValued::from_set(a));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn three_valued_intersect_is_commutative(a in small_set(), b in small_set()) {
        let left = ThreeValued::from_set(a.clone()).intersect(ThreeValued::from_set(b.clone()));
        let right = ThreeValued::from_set(b).intersect(ThreeValued::from_set(a));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn three_valued_union_is_associative(a in small_set(), b in small_set(), c in small_set()) {
        let left = ThreeValued::from_set(a.clone())
            .union(ThreeValued::from_set(b.clone()))
            .union(ThreeValued::from_set(c.clone()));
        let right = ThreeValued::from_set(a).union(ThreeValued::from_set(b).union(ThreeValued::from_set(c)));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn three_valued_intersect_is_associative(a in small_set(), b in small_set(), c in small_set()) {
        let left = ThreeValued::from_set(a.clone())
            .intersect(ThreeValued::from_set(b.clone()))
            .intersect(ThreeValued::from_set(c.clone()));
        let right = ThreeValued::from_set(a).intersect(ThreeValued::from_set(b).intersect(ThreeValued::from_set(c)));
        prop_assert_eq!(left, right);
    }

    /// Aggregated-value keys round-trip for any segment free of `:`, including
    /// an empty dotted path (ungrouped computations).
    #[test]
    fn aggregated_value_key_round_trips(
        agg_name in "[a-zA-Z_][a-zA-Z0-9_]{0,12}",
        dot_path in "([a-zA-Z_][a-zA-Z0-9_]{0,8}(\\.[a-zA-Z_][a-zA-Z0-9_]{0,8}){0,3})?",
        computed_field_name in "[a-zA-Z_][a-zA-Z0-9_]{0,12}",
    ) {
        let key = encode_aggregated_value_key(&agg_name, &dot_path, &computed_field_name);
        prop_assert_eq!(
            decode_aggregated_value_key(&key),
            Some((agg_name, dot_path, computed_field_name))
        );
    }

    /// `clamp_first` always lands in `[0, max_page_size]` regardless of the
    /// caller-requested `first`.
    #[test]
    fn clamp_first_is_always_within_max(first in proptest::option::of(0u32..1_000_000)) {
        let config = QueryPlannerConfig::default();
        let clamped = config.clamp_first(first);
        prop_assert!(clamped <= config.max_page_size);
    }

    /// Merging a query with itself is idempotent: filters dedup, and every
    /// other field is already in agreement with itself.
    #[test]
    fn merge_is_idempotent(values in proptest::collection::btree_set("[a-z]{1,4}", 0..5)) {
        let query = single_filter_query(values.into_iter().collect());
        let merged = query.merge(&query).unwrap();
        prop_assert_eq!(merged, query);
    }

    /// Merging two queries whose only difference is an `equal_to_any_of`
    /// filter on disjoint fields is commutative on the resulting filter set
    /// (order aside, both operands' filters survive either way).
    #[test]
    fn merge_filters_are_commutative_as_a_set(
        a_values in proptest::collection::btree_set("[a-z]{1,4}", 1..4),
        b_values in proptest::collection::btree_set("[a-z]{1,4}", 1..4),
    ) {
        let q_a = single_filter_query(a_values.into_iter().collect());
        let q_b = other_field_filter_query(b_values.into_iter().collect());

        let merged_ab = q_a.merge(&q_b).unwrap();
        let merged_ba = q_b.merge(&q_a).unwrap();

        let set_ab: BTreeSet<_> = merged_ab.filters.iter().cloned().collect_via_eq();
        let set_ba: BTreeSet<_> = merged_ba.filters.iter().cloned().collect_via_eq();
        prop_assert_eq!(set_ab, set_ba);
    }

    /// Routing soundness: resolving `equal_to_any_of` values (no nils, no
    /// ignored values) on a single routing field always yields exactly that
    /// set of shards — never a superset, never a subset.
    #[test]
    fn routing_resolves_exactly_to_equal_to_any_of_values(
        values in proptest::collection::btree_set("[a-z]{1,4}", 1..6),
    ) {
        let node = FilterNode::leaf(
            "tenant_id",
            LeafPredicates {
                equal_to_any_of: Some(values.iter().cloned().map(Value::Text).collect()),
                ..Default::default()
            },
        );
        let decision = resolve_routing(
            &node,
            &BTreeSet::from(["tenant_id".to_string()]),
            &BTreeSet::new(),
            false,
            "fallback",
        );
        prop_assert_eq!(decision, RoutingDecision::Shards(values));
    }
}

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

fn single_filter_query(values: Vec<String>) -> DatastoreQuery {
    let filters = if values.is_empty() {
        vec![]
    } else {
        vec![FilterNode::leaf(
            "name",
            LeafPredicates {
                equal_to_any_of: Some(values.into_iter().map(Value::Text).collect()),
                ..Default::default()
            },
        )]
    };
    DatastoreQuery::new(
        BTreeSet::from([index_def()]),
        filters,
        None,
        None,
        BTreeSet::from(["name".to_string()]),
        BTreeMap::new(),
        None,
    )
    .unwrap()
}

fn other_field_filter_query(values: Vec<String>) -> DatastoreQuery {
    let filters = if values.is_empty() {
        vec![]
    } else {
        vec![FilterNode::leaf(
            "category",
            LeafPredicates {
                equal_to_any_of: Some(values.into_iter().map(Value::Text).collect()),
                ..Default::default()
            },
        )]
    };
    DatastoreQuery::new(
        BTreeSet::from([index_def()]),
        filters,
        None,
        None,
        BTreeSet::new(),
        BTreeMap::new(),
        None,
    )
    .unwrap()
}

/// `FilterNode` has no `Ord` impl (it carries `f64` in `near` clauses), so a
/// byte-stable `Debug` rendering stands in as the dedup/order-independence
/// key for this test only.
trait CollectViaEq: Iterator {
    fn collect_via_eq(self) -> BTreeSet<String>
    where
        Self: Sized,
        Self::Item: std::fmt::Debug,
    {
        self.map(|item| format!("{item:?}")).collect()
    }
}
impl<I: Iterator> CollectViaEq for I {}
