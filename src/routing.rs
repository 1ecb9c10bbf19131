//! Routing Picker (§4.3): resolves a normalized filter tree to the set of
//! shard routing values a query must be sent to, using the same
//! three-valued lattice as the Index Expression Builder.

use std::collections::BTreeSet;

use crate::filter::{FilterNode, Operator};
use crate::three_valued::ThreeValued;

/// The resolved routing outcome for one query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoutingDecision {
    /// No `routing` header is emitted; every shard must be searched.
    AllShards,
    /// `routing=v1,v2,...`.
    Shards(BTreeSet<String>),
    /// Pruning produced an empty set and the query has no aggregations:
    /// the caller may short-circuit to an empty result without querying.
    NoShards,
    /// Pruning produced an empty set but the query has aggregations, which
    /// still expect a shaped response; route to one placeholder shard.
    FallbackShard(String),
}

/// Resolve the routing decision for `root` across the given routing field
/// paths (already deduplicated across all indices in the query).
#[must_use]
pub fn resolve_routing(
    root: &FilterNode,
    routing_field_paths: &BTreeSet<String>,
    ignored_routing_values: &BTreeSet<String>,
    has_aggregations: bool,
    fallback_shard_routing_value: &str,
) -> RoutingDecision {
    if routing_field_paths.is_empty() {
        return RoutingDecision::AllShards;
    }

    let per_field: Vec<ThreeValued<String>> = routing_field_paths
        .iter()
        .map(|path| candidates_for_field(root, path, ignored_routing_values))
        .collect();

    let combined = ThreeValued::intersect_all(per_field);

    match combined {
        ThreeValued::All => RoutingDecision::AllShards,
        ThreeValued::None => {
            if has_aggregations {
                RoutingDecision::FallbackShard(fallback_shard_routing_value.to_string())
            } else {
                RoutingDecision::NoShards
            }
        }
        ThreeValued::Some(set) if set.is_empty() => {
            if has_aggregations {
                RoutingDecision::FallbackShard(fallback_shard_routing_value.to_string())
            } else {
                RoutingDecision::NoShards
            }
        }
        ThreeValued::Some(set) => RoutingDecision::Shards(set),
    }
}

/// Candidate routing values for a single routing field path, per §4.3.
fn candidates_for_field(
    node: &FilterNode,
    routing_path: &str,
    ignored: &BTreeSet<String>,
) -> ThreeValued<String> {
    match node {
        FilterNode::AlwaysTrue | FilterNode::AlwaysFalse | FilterNode::ListCount { .. } => {
            ThreeValued::All
        }
        FilterNode::Leaf { field_path, predicates } => {
            if field_path != routing_path {
                return ThreeValued::All;
            }
            leaf_candidates(predicates, ignored)
        }
        FilterNode::Not(inner) => {
            // A standalone negation over the routing field always widens to
            // All (§4.3); the set-difference special case only applies
            // when combined with a sibling equal_to_any_of inside AllOf,
            // handled below.
            let _ = inner;
            ThreeValued::All
        }
        FilterNode::AnyOf(branches) => {
            ThreeValued::union_all(branches.iter().map(|b| candidates_for_field(b, routing_path, ignored)))
        }
        FilterNode::AllOf(branches) => combine_all_of(branches, routing_path, ignored),
        FilterNode::AnySatisfy { .. } => ThreeValued::All,
    }
}

/// `AllOf` branches get special handling beyond plain intersection: a
/// `Not(Leaf{equal_to_any_of})` sibling alongside a concrete
/// `Leaf{equal_to_any_of}` on the same routing field becomes a
/// set-difference rather than an intersection with `All` (§4.3).
fn combine_all_of(
    branches: &[FilterNode],
    routing_path: &str,
    ignored: &BTreeSet<String>,
) -> ThreeValued<String> {
    let mut positive_values: Option<BTreeSet<String>> = None;
    let mut negated_values: BTreeSet<String> = BTreeSet::new();
    let mut other_results = Vec::new();

    for branch in branches {
        match branch {
            FilterNode::Leaf { field_path, predicates } if field_path == routing_path => {
                if let Some(values) = &predicates.equal_to_any_of {
                    let set = clean_values(values, ignored);
                    positive_values = Some(match positive_values.take() {
                        Some(existing) => existing.intersection(&set).cloned().collect(),
                        None => set,
                    });
                } else {
                    other_results.push(ThreeValued::All);
                }
            }
            FilterNode::Not(inner) => {
                if let FilterNode::Leaf { field_path, predicates } = inner.as_ref() {
                    if field_path == routing_path {
                        if let Some(values) = &predicates.equal_to_any_of {
                            negated_values.extend(clean_values(values, ignored));
                            continue;
                        }
                    }
                }
                other_results.push(candidates_for_field(branch, routing_path, ignored));
            }
            other => other_results.push(candidates_for_field(other, routing_path, ignored)),
        }
    }

    let base = match positive_values {
        Some(set) => ThreeValued::from_set(set),
        None => ThreeValued::All,
    };
    let with_negation = if negated_values.is_empty() {
        base
    } else {
        base.difference(&negated_values)
    };

    ThreeValued::intersect_all(std::iter::once(with_negation).chain(other_results))
}

fn leaf_candidates(
    predicates: &crate::filter::LeafPredicates,
    ignored: &BTreeSet<String>,
) -> ThreeValued<String> {
    let Some(values) = &predicates.equal_to_any_of else {
        // Any other (inexact) operator on the routing field.
        return ThreeValued::All;
    };
    if values.is_empty() {
        return ThreeValued::None;
    }
    let contains_nil = values.iter().any(|v| matches!(v, crate::value::Value::Null));
    let cleaned = clean_values(values, ignored);
    if contains_nil || cleaned.is_empty() {
        // A nil routing value lives on every shard, and a non-empty list
        // that resolves to nothing once ignored values are stripped carries
        // no pruning information either way — both widen to `All` rather
        // than under-return shards (§4.3).
        return ThreeValued::All;
    }
    ThreeValued::from_set(cleaned)
}

fn clean_values(values: &[crate::value::Value], ignored: &BTreeSet<String>) -> BTreeSet<String> {
    values
        .iter()
        .filter_map(|v| match v {
            crate::value::Value::Text(s) => Some(s.clone()),
            crate::value::Value::Null => None,
            other => Some(other.to_string()),
        })
        .filter(|s| !ignored.contains(s))
        .collect()
}

/// Operators that make a leaf "inexact" for routing purposes are every
/// [`Operator`] other than `EqualToAnyOf`; retained for documentation at
/// the call sites above rather than used directly (the logic keys off
/// `LeafPredicates` fields instead of op names).
#[allow(dead_code)]
const fn _inexact_operators() -> &'static [Operator] {
    &[
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::Matches,
        Operator::MatchesQuery,
        Operator::MatchesPhrase,
        Operator::Near,
        Operator::TimeOfDay,
    ]
}
