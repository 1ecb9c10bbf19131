//! Filter Interpreter (§4.2): walks a normalized [`FilterNode`] and emits
//! the vendor's JSON filter DSL (`bool`/`filter`/`should`/`must_not`,
//! `terms`/`range`/`match`/`nested`/`exists`/`geo_distance`/`script`).

use serde_json::{json, Value as Json};
use sha2::{Digest, Sha256};

use super::ast::{DistanceUnit, FilterNode, LeafPredicates, RangeBounds};

const ID_FIELD: &str = "id";

/// The canonical always-false clause: `match_all` negated, so it can never
/// match a document regardless of mapping. Reused verbatim everywhere an
/// always-false filter must render as a concrete clause (§4.2, §9).
fn always_false_clause() -> Json {
    json!({ "bool": { "must_not": { "match_all": {} } } })
}

/// Interpret a normalized filter tree into the vendor DSL. Returns `None`
/// when the tree is the identity filter (`AlwaysTrue`), signaling that the
/// caller should omit the `query` key entirely (§4.2 last bullet).
#[must_use]
pub fn interpret(node: &FilterNode) -> Option<Json> {
    match node {
        FilterNode::AlwaysTrue => None,
        other => Some(interpret_non_trivial(other)),
    }
}

fn interpret_non_trivial(node: &FilterNode) -> Json {
    match node {
        FilterNode::AlwaysTrue => json!({ "match_all": {} }),
        FilterNode::AlwaysFalse => always_false_clause(),
        FilterNode::Leaf { field_path, predicates } => interpret_leaf(field_path, predicates),
        FilterNode::Not(inner) => {
            json!({ "bool": { "must_not": [interpret_non_trivial(inner)] } })
        }
        FilterNode::AnyOf(branches) => {
            let should: Vec<Json> = branches.iter().map(interpret_non_trivial).collect();
            json!({ "bool": { "should": should, "minimum_should_match": 1 } })
        }
        FilterNode::AllOf(branches) => interpret_all_of(branches),
        FilterNode::AnySatisfy { field_path, inner } => {
            json!({
                "nested": {
                    "path": field_path,
                    "query": interpret_non_trivial(inner),
                }
            })
        }
        FilterNode::ListCount { field_path, range } => interpret_list_count(field_path, range),
    }
}

/// `AllOf` distribution rule (§4.2): siblings that are `Not(x)` go under
/// `must_not`; everything else goes under `filter`.
fn interpret_all_of(branches: &[FilterNode]) -> Json {
    let mut filter = Vec::new();
    let mut must_not = Vec::new();
    for branch in branches {
        match branch {
            FilterNode::Not(inner) => must_not.push(interpret_non_trivial(inner)),
            other => filter.push(interpret_non_trivial(other)),
        }
    }
    let mut bool_clause = serde_json::Map::new();
    if !filter.is_empty() {
        bool_clause.insert("filter".to_string(), Json::Array(filter));
    }
    if !must_not.is_empty() {
        bool_clause.insert("must_not".to_string(), Json::Array(must_not));
    }
    json!({ "bool": bool_clause })
}

fn interpret_leaf(field_path: &str, predicates: &LeafPredicates) -> Json {
    let mut filter_clauses = Vec::new();
    let mut must_clauses = Vec::new();

    if let Some(values) = &predicates.equal_to_any_of {
        filter_clauses.push(interpret_equal_to_any_of(field_path, values));
    }
    if let Some(range) = &predicates.range {
        if !range.is_empty() {
            filter_clauses.push(interpret_range(field_path, range));
        }
    }
    if let Some(text) = &predicates.matches {
        must_clauses.push(json!({ "match": { field_path: text } }));
    }
    if let Some(clause) = &predicates.matches_query {
        let mut inner = serde_json::Map::new();
        inner.insert("query".to_string(), Json::String(clause.query.clone()));
        if let Some(fuzziness) = clause.fuzziness {
            inner.insert("fuzziness".to_string(), Json::String(fuzziness.as_str().to_string()));
        }
        if let Some(operator) = clause.operator {
            inner.insert("operator".to_string(), Json::String(operator.as_str().to_string()));
        }
        must_clauses.push(json!({ "match": { field_path: inner } }));
    }
    if let Some(phrase) = &predicates.matches_phrase {
        must_clauses.push(json!({
            "match_phrase_prefix": { field_path: { "query": phrase } }
        }));
    }
    if let Some(near) = &predicates.near {
        filter_clauses.push(interpret_near(field_path, near));
    }
    if let Some(time_of_day) = &predicates.time_of_day {
        filter_clauses.push(interpret_time_of_day(field_path, time_of_day));
    }

    if must_clauses.is_empty() {
        if filter_clauses.len() == 1 {
            filter_clauses.into_iter().next().unwrap()
        } else {
            json!({ "bool": { "filter": filter_clauses } })
        }
    } else if filter_clauses.is_empty() {
        json!({ "bool": { "must": must_clauses } })
    } else {
        json!({ "bool": { "filter": filter_clauses, "must": must_clauses } })
    }
}

/// `equal_to_any_of` containing `nil` means `(field IS NULL) OR (field IN
/// {non-nil values})` (§4.1 item 4); `nil` has no representation in the
/// vendor's `terms`/`ids` primitives, so it's split into a `should` of the
/// values clause and a missing-field clause rather than ever emitted as a
/// literal JSON `null`.
fn interpret_equal_to_any_of(field_path: &str, values: &[crate::value::Value]) -> Json {
    let mut deduped = Vec::new();
    let mut has_nil = false;
    for value in values {
        if value.is_null() {
            has_nil = true;
            continue;
        }
        let json = value.to_json();
        if !deduped.contains(&json) {
            deduped.push(json);
        }
    }

    let primitive = if field_path == ID_FIELD {
        json!({ "ids": { "values": deduped } })
    } else {
        json!({ "terms": { field_path: deduped } })
    };

    if !has_nil {
        return primitive;
    }

    let missing_field = json!({
        "bool": { "must_not": [{ "bool": { "filter": [{ "exists": { "field": field_path } }] } }] }
    });

    if deduped.is_empty() {
        return missing_field;
    }

    json!({
        "bool": {
            "should": [{ "bool": { "filter": [primitive] } }, missing_field],
            "minimum_should_match": 1,
        }
    })
}

fn interpret_range(field_path: &str, range: &RangeBounds) -> Json {
    let mut inner = serde_json::Map::new();
    if let Some(v) = &range.gt {
        inner.insert("gt".to_string(), v.to_json());
    }
    if let Some(v) = &range.gte {
        inner.insert("gte".to_string(), v.to_json());
    }
    if let Some(v) = &range.lt {
        inner.insert("lt".to_string(), v.to_json());
    }
    if let Some(v) = &range.lte {
        inner.insert("lte".to_string(), v.to_json());
    }
    json!({ "range": { field_path: inner } })
}

fn interpret_near(field_path: &str, near: &super::ast::NearClause) -> Json {
    json!({
        "geo_distance": {
            "distance": format!("{}{}", format_distance(near.distance), near.unit.abbreviation()),
            field_path: { "lat": near.lat, "lon": near.lon },
        }
    })
}

fn format_distance(distance: f64) -> String {
    if distance.fract() == 0.0 {
        format!("{}", distance as i64)
    } else {
        distance.to_string()
    }
}

/// Stored-script filter id for `time_of_day`: a stable digest of the field
/// path keeps the id deterministic across runs (§4.2) without the store
/// needing one stored script per field.
fn time_of_day_script_id(field_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(field_path.as_bytes());
    let digest = hasher.finalize();
    format!("filter_by_time_of_day_{:x}", digest)
}

fn interpret_time_of_day(field_path: &str, clause: &super::ast::TimeOfDayClause) -> Json {
    let mut params = serde_json::Map::new();
    params.insert("field".to_string(), Json::String(field_path.to_string()));
    if let Some(values) = &clause.equal_to_any_of {
        params.insert(
            "equal_to_any_of".to_string(),
            Json::Array(values.iter().map(|v| json!(v)).collect()),
        );
    }
    if let Some(v) = clause.gt {
        params.insert("gt".to_string(), json!(v));
    }
    if let Some(v) = clause.gte {
        params.insert("gte".to_string(), json!(v));
    }
    if let Some(v) = clause.lt {
        params.insert("lt".to_string(), json!(v));
    }
    if let Some(v) = clause.lte {
        params.insert("lte".to_string(), json!(v));
    }
    if let Some(tz) = &clause.time_zone {
        params.insert("time_zone".to_string(), Json::String(tz.clone()));
    }
    json!({
        "script": {
            "script": {
                "id": time_of_day_script_id(field_path),
                "params": params,
            }
        }
    })
}

/// `ListCount` (§4.1 item 7): ranges that admit zero must also match
/// documents indexed before the counts sidecar existed (which therefore
/// lack the field entirely).
fn interpret_list_count(field_path: &str, range: &RangeBounds) -> Json {
    let range_clause = interpret_range(field_path, range);
    if range_includes_zero(range) {
        json!({
            "bool": {
                "should": [
                    range_clause,
                    { "bool": { "must_not": [{ "exists": { "field": field_path } }] } },
                ],
                "minimum_should_match": 1,
            }
        })
    } else {
        range_clause
    }
}

fn range_includes_zero(range: &RangeBounds) -> bool {
    use crate::value::Value;
    let zero = Value::Int(0);
    let lower_ok = match (&range.gt, &range.gte) {
        (Some(gt), _) if *gt >= zero => false,
        (_, Some(gte)) if *gte > zero => false,
        _ => true,
    };
    let upper_ok = match (&range.lt, &range.lte) {
        (Some(lt), _) if *lt <= zero => false,
        (_, Some(lte)) if *lte < zero => false,
        _ => true,
    };
    lower_ok && upper_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn always_true_omits_query() {
        assert_eq!(interpret(&FilterNode::AlwaysTrue), None);
    }

    #[test]
    fn always_false_renders_marker_clause() {
        let out = interpret(&FilterNode::AlwaysFalse).unwrap();
        assert_eq!(out, always_false_clause());
    }

    #[test]
    fn equal_to_any_of_on_id_uses_ids_values() {
        let node = FilterNode::leaf(
            "id",
            LeafPredicates {
                equal_to_any_of: Some(vec![Value::Text("a".into()), Value::Text("a".into())]),
                ..Default::default()
            },
        );
        let out = interpret(&node).unwrap();
        assert_eq!(out, json!({ "ids": { "values": ["a"] } }));
    }

    #[test]
    fn equal_to_any_of_on_other_field_uses_terms() {
        let node = FilterNode::leaf(
            "status",
            LeafPredicates {
                equal_to_any_of: Some(vec![Value::Text("open".into())]),
                ..Default::default()
            },
        );
        let out = interpret(&node).unwrap();
        assert_eq!(out, json!({ "terms": { "status": ["open"] } }));
    }

    #[test]
    fn equal_to_any_of_with_nil_splits_into_should_with_missing_field_branch() {
        let node = FilterNode::leaf(
            "age",
            LeafPredicates {
                equal_to_any_of: Some(vec![Value::Null, Value::Int(25), Value::Int(40)]),
                ..Default::default()
            },
        );
        let out = interpret(&node).unwrap();
        assert_eq!(
            out,
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

    #[test]
    fn not_emits_must_not() {
        let node = FilterNode::Not(Box::new(FilterNode::leaf(
            "status",
            LeafPredicates {
                equal_to_any_of: Some(vec![Value::Text("closed".into())]),
                ..Default::default()
            },
        )));
        let out = interpret(&node).unwrap();
        assert_eq!(
            out,
            json!({ "bool": { "must_not": [{ "terms": { "status": ["closed"] } }] } })
        );
    }

    #[test]
    fn list_count_including_zero_adds_missing_field_should_clause() {
        let range = RangeBounds { gte: Some(Value::Int(0)), ..Default::default() };
        let node = FilterNode::ListCount { field_path: "__counts.tags".to_string(), range };
        let out = interpret(&node).unwrap();
        assert!(out["bool"]["should"].is_array());
        assert_eq!(out["bool"]["minimum_should_match"], 1);
    }

    #[test]
    fn list_count_excluding_zero_is_plain_range() {
        let range = RangeBounds { gt: Some(Value::Int(0)), ..Default::default() };
        let node = FilterNode::ListCount { field_path: "__counts.tags".to_string(), range };
        let out = interpret(&node).unwrap();
        assert!(out.get("range").is_some());
    }
}
