//! Filter Normalizer (§4.1).
//!
//! Reduces a raw, client-shaped filter predicate map to a canonical
//! [`FilterNode`] tree: no redundant `Not(Not(_))` wrapping, no empty
//! `any_of`/`all_of`, no bare no-op operators, `count` rewritten to
//! [`FilterNode::ListCount`] against its synthetic sidecar field, and ranges
//! on the same field collapsed per [`RangeBounds::merge`].
//!
//! Normalization runs to a fixpoint: each identity rewrite can expose
//! another (for example, flattening a nested `all_of` can produce a new
//! `Not(Not(_))` pair), so [`normalize`] re-applies the rewrite pass until
//! one iteration leaves the tree unchanged.

use crate::error::NormalizeError;
use crate::schema::ListFieldClassifier;
use crate::value::Value;

use super::ast::{FilterNode, LeafPredicates, ListFieldKind, RangeBounds};

/// A non-fatal normalization event surfaced to the caller for logging
/// (§4.1 item 3: unknown operators are dropped, not rejected).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NormalizeWarning {
    UnknownOperator { field_path: String, operator: String },
}

/// The result of normalizing one raw filter map.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedFilter {
    pub root: FilterNode,
    pub warnings: Vec<NormalizeWarning>,
}

/// Normalize a raw filter predicate map into a canonical [`FilterNode`].
///
/// `raw` mirrors the client-supplied JSON shape: a map from field name (or
/// `any_of`/`all_of`/`not`) to either a nested map (more fields, or
/// operators) or a terminal value. Building that raw shape from an actual
/// GraphQL argument value is the caller's responsibility; this function
/// starts from the already-parsed [`RawFilterValue`] tree.
pub fn normalize(
    raw: &RawFilterValue,
    classifier: &dyn ListFieldClassifier,
) -> Result<NormalizedFilter, NormalizeError> {
    let mut warnings = Vec::new();
    let mut node = build_node("", raw, classifier, &mut warnings)?;
    loop {
        let rewritten = rewrite_once(node.clone())?;
        if rewritten == node {
            break;
        }
        node = rewritten;
    }
    Ok(NormalizedFilter { root: node, warnings })
}

/// Parsed-but-not-yet-normalized client filter input: a JSON-like value
/// tree restricted to what filter predicate maps can ever contain.
#[derive(Clone, Debug, PartialEq)]
pub enum RawFilterValue {
    /// A field name (or `any_of` / `all_of` / `not`) to sub-value map.
    Object(Vec<(String, RawFilterValue)>),
    /// A list of filter maps, as the operand of `any_of` / `all_of`, or an
    /// `equal_to_any_of` value list.
    List(Vec<RawFilterValue>),
    Scalar(Value),
    Null,
}

fn build_node(
    field_path: &str,
    raw: &RawFilterValue,
    classifier: &dyn ListFieldClassifier,
    warnings: &mut Vec<NormalizeWarning>,
) -> Result<FilterNode, NormalizeError> {
    match raw {
        RawFilterValue::Object(entries) => build_object(field_path, entries, classifier, warnings),
        // A bare scalar/list/null at a field position is sugar for
        // `{equal_to_any_of: [...]}` is not part of this grammar; callers
        // are expected to have already desugared that at the GraphQL
        // argument-coercion layer. Treat an unexpected shape as no-op.
        RawFilterValue::List(_) | RawFilterValue::Scalar(_) | RawFilterValue::Null => {
            Ok(FilterNode::AlwaysTrue)
        }
    }
}

fn build_object(
    field_path: &str,
    entries: &[(String, RawFilterValue)],
    classifier: &dyn ListFieldClassifier,
    warnings: &mut Vec<NormalizeWarning>,
) -> Result<FilterNode, NormalizeError> {
    let mut branches = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        branches.push(build_entry(field_path, key, value, classifier, warnings)?);
    }
    // §4.1 item 1: a map with more than one key is the implicit AND of each
    // single-key map. A single-entry map reduces to that entry directly so
    // we don't wrap every leaf in a singleton AllOf.
    Ok(match branches.len() {
        0 => FilterNode::AlwaysTrue,
        1 => branches.into_iter().next().unwrap(),
        _ => FilterNode::AllOf(branches),
    })
}

fn build_entry(
    field_path: &str,
    key: &str,
    value: &RawFilterValue,
    classifier: &dyn ListFieldClassifier,
    warnings: &mut Vec<NormalizeWarning>,
) -> Result<FilterNode, NormalizeError> {
    match key {
        "any_of" => {
            let items = as_list(value);
            let mut branches = Vec::with_capacity(items.len());
            for item in items {
                branches.push(build_node(field_path, item, classifier, warnings)?);
            }
            Ok(FilterNode::AnyOf(branches))
        }
        "all_of" => {
            let items = as_list(value);
            let mut branches = Vec::with_capacity(items.len());
            for item in items {
                branches.push(build_node(field_path, item, classifier, warnings)?);
            }
            Ok(FilterNode::AllOf(branches))
        }
        "not" => {
            let inner = build_node(field_path, value, classifier, warnings)?;
            Ok(FilterNode::Not(Box::new(inner)))
        }
        _ if is_known_operator_key(key) => {
            // A leaf operator reached at the top of `build_entry` means the
            // caller handed us a bare operator map directly (field_path
            // already complete); collect it with its siblings via
            // `build_leaf_predicates`.
            build_leaf_from_single_operator(field_path, key, value, warnings)
        }
        _ => {
            // A regular field name: descend, joining the dotted path, and
            // disambiguate between a nested predicate map (possibly another
            // field, or an operator map) versus a list-field `any_satisfy`/
            // `count` wrapper.
            let child_path = join_path(field_path, key);
            build_field(&child_path, value, classifier, warnings)
        }
    }
}

fn build_field(
    field_path: &str,
    value: &RawFilterValue,
    classifier: &dyn ListFieldClassifier,
    warnings: &mut Vec<NormalizeWarning>,
) -> Result<FilterNode, NormalizeError> {
    let RawFilterValue::Object(entries) = value else {
        return Ok(FilterNode::AlwaysTrue);
    };

    // Special-case `any_satisfy` and `count`, which act on the list field
    // itself rather than nested leaf operators.
    if let Some((_, inner)) = entries.iter().find(|(k, _)| k == "any_satisfy") {
        return build_any_satisfy(field_path, entries, inner, classifier, warnings);
    }
    if let Some((_, inner)) = entries.iter().find(|(k, _)| k == "count") {
        return build_count(field_path, inner, classifier, warnings);
    }

    // Otherwise this is either a nested field map (recurse) or a leaf
    // operator map (collect into LeafPredicates). Operators and nested
    // field names never mix at the same level in well-formed input; we
    // distinguish by checking the first key.
    if entries.iter().all(|(k, _)| is_known_operator_key(k) || k == "not" || k == "any_of") {
        build_leaf(field_path, entries, warnings)
    } else {
        build_object(field_path, entries, classifier, warnings)
    }
}

fn build_any_satisfy(
    field_path: &str,
    entries: &[(String, RawFilterValue)],
    inner_raw: &RawFilterValue,
    classifier: &dyn ListFieldClassifier,
    warnings: &mut Vec<NormalizeWarning>,
) -> Result<FilterNode, NormalizeError> {
    // §4.1 item 5: a non-`any_of` sibling alongside `any_satisfy` on a
    // scalar/flattened-object list is unsupported (ambiguous element
    // correlation); a sibling `any_of` branch containing only this field is
    // fine (each branch is independent).
    let other_non_any_of: Vec<&str> = entries
        .iter()
        .filter(|(k, _)| k != "any_satisfy" && k != "any_of")
        .map(|(k, _)| k.as_str())
        .collect();

    let kind = classifier.classify_list_field(field_path);
    let inner = build_node(field_path, inner_raw, classifier, warnings)?;

    match kind {
        Some(ListFieldKind::Nested) => {
            let wrapped = FilterNode::AnySatisfy {
                field_path: field_path.to_string(),
                inner: Box::new(inner),
            };
            if other_non_any_of.is_empty() {
                Ok(wrapped)
            } else {
                Ok(FilterNode::AllOf(vec![
                    wrapped,
                    build_object_excluding(field_path, entries, "any_satisfy", classifier, warnings)?,
                ]))
            }
        }
        // Scalar or flattened-object list (or unknown field): the default
        // list-matching semantics already satisfy `any_satisfy`, so it
        // reduces to the inner filter directly — but only when it is the
        // sole non-`any_of` sibling (§9 open question: preserved as an
        // error rather than silently guessing element correlation).
        _ => {
            if !other_non_any_of.is_empty() {
                return Err(NormalizeError::UnsupportedAnySatisfyCombination {
                    field_path: field_path.to_string(),
                    fragment: other_non_any_of.join(","),
                });
            }
            Ok(inner)
        }
    }
}

fn build_object_excluding(
    field_path: &str,
    entries: &[(String, RawFilterValue)],
    exclude: &str,
    classifier: &dyn ListFieldClassifier,
    warnings: &mut Vec<NormalizeWarning>,
) -> Result<FilterNode, NormalizeError> {
    let filtered: Vec<(String, RawFilterValue)> = entries
        .iter()
        .filter(|(k, _)| k != exclude)
        .cloned()
        .collect();
    build_leaf_or_object(field_path, &filtered, classifier, warnings)
}

fn build_leaf_or_object(
    field_path: &str,
    entries: &[(String, RawFilterValue)],
    classifier: &dyn ListFieldClassifier,
    warnings: &mut Vec<NormalizeWarning>,
) -> Result<FilterNode, NormalizeError> {
    if entries.iter().all(|(k, _)| is_known_operator_key(k) || k == "not" || k == "any_of") {
        build_leaf(field_path, entries, warnings)
    } else {
        build_object(field_path, entries, classifier, warnings)
    }
}

/// Encode the `count` rewrite (§4.1 item 7): `field.count` becomes a
/// `ListCount` against a synthetic sidecar field. Dots in the path are
/// replaced with `|` after the nearest `nested`-mapped ancestor (if any),
/// so the sidecar lives at that nested document's root rather than at the
/// top-level document root (§6).
fn build_count(
    field_path: &str,
    range_raw: &RawFilterValue,
    classifier: &dyn ListFieldClassifier,
    warnings: &mut Vec<NormalizeWarning>,
) -> Result<FilterNode, NormalizeError> {
    let range = parse_range(field_path, range_raw, warnings);
    let counts_field = encode_counts_field(field_path, classifier);
    Ok(FilterNode::ListCount {
        field_path: counts_field,
        range,
    })
}

fn encode_counts_field(field_path: &str, classifier: &dyn ListFieldClassifier) -> String {
    let segments: Vec<&str> = field_path.split('.').collect();
    let mut nearest_nested_end = 0usize;
    let mut prefix = String::new();
    for (idx, segment) in segments.iter().enumerate() {
        if idx > 0 {
            prefix.push('.');
        }
        prefix.push_str(segment);
        if classifier.classify_list_field(&prefix) == Some(ListFieldKind::Nested) {
            nearest_nested_end = idx + 1;
        }
    }
    let suffix = segments[nearest_nested_end..].join("|");
    format!("__counts.{suffix}")
}

fn build_leaf_from_single_operator(
    field_path: &str,
    key: &str,
    value: &RawFilterValue,
    warnings: &mut Vec<NormalizeWarning>,
) -> Result<FilterNode, NormalizeError> {
    build_leaf(field_path, std::slice::from_ref(&(key.to_string(), value.clone())), warnings)
}

fn build_leaf(
    field_path: &str,
    entries: &[(String, RawFilterValue)],
    warnings: &mut Vec<NormalizeWarning>,
) -> Result<FilterNode, NormalizeError> {
    let mut predicates = LeafPredicates::default();
    let mut any_of_wrapper: Option<Vec<FilterNode>> = None;
    let mut not_wrapper: Option<Box<FilterNode>> = None;

    for (key, value) in entries {
        match key.as_str() {
            "equal_to_any_of" => {
                predicates.equal_to_any_of = Some(parse_value_list(value));
            }
            "gt" | "gte" | "lt" | "lte" => {
                let mut range = predicates.range.take().unwrap_or_default();
                set_range_bound(&mut range, key, scalar_value(value));
                predicates.range = Some(range);
            }
            "matches" => predicates.matches = scalar_string(value),
            "matches_phrase" => predicates.matches_phrase = scalar_string(value),
            "matches_query" => predicates.matches_query = parse_matches_query(value),
            "near" => predicates.near = parse_near(value),
            "time_of_day" => predicates.time_of_day = parse_time_of_day(value),
            "any_of" => {
                any_of_wrapper = Some(
                    as_list(value)
                        .iter()
                        .map(|item| build_leaf_value(field_path, item, warnings))
                        .collect(),
                );
            }
            "not" => {
                not_wrapper = Some(Box::new(build_leaf_value(field_path, value, warnings)));
            }
            _ => {
                warnings.push(NormalizeWarning::UnknownOperator {
                    field_path: field_path.to_string(),
                    operator: key.clone(),
                });
            }
        }
    }

    let leaf = if predicates.is_empty() {
        FilterNode::AlwaysTrue
    } else {
        FilterNode::leaf(field_path, predicates)
    };

    let combined = match (any_of_wrapper, not_wrapper) {
        (None, None) => leaf,
        (Some(branches), None) => {
            if matches!(leaf, FilterNode::AlwaysTrue) {
                FilterNode::AnyOf(branches)
            } else {
                FilterNode::AllOf(vec![leaf, FilterNode::AnyOf(branches)])
            }
        }
        (None, Some(inner)) => {
            if matches!(leaf, FilterNode::AlwaysTrue) {
                FilterNode::Not(inner)
            } else {
                FilterNode::AllOf(vec![leaf, FilterNode::Not(inner)])
            }
        }
        (Some(branches), Some(inner)) => {
            FilterNode::AllOf(vec![leaf, FilterNode::AnyOf(branches), FilterNode::Not(inner)])
        }
    };
    Ok(combined)
}

fn build_leaf_value(
    field_path: &str,
    raw: &RawFilterValue,
    warnings: &mut Vec<NormalizeWarning>,
) -> FilterNode {
    match raw {
        RawFilterValue::Object(entries) => build_leaf(field_path, entries, warnings)
            .unwrap_or(FilterNode::AlwaysTrue),
        _ => FilterNode::AlwaysTrue,
    }
}

fn set_range_bound(range: &mut RangeBounds, key: &str, value: Option<Value>) {
    match key {
        "gt" => range.gt = value,
        "gte" => range.gte = value,
        "lt" => range.lt = value,
        "lte" => range.lte = value,
        _ => unreachable!(),
    }
}

fn parse_range(
    field_path: &str,
    raw: &RawFilterValue,
    warnings: &mut Vec<NormalizeWarning>,
) -> RangeBounds {
    let mut range = RangeBounds::default();
    if let RawFilterValue::Object(entries) = raw {
        for (key, value) in entries {
            match key.as_str() {
                "gt" | "gte" | "lt" | "lte" => set_range_bound(&mut range, key, scalar_value(value)),
                _ => warnings.push(NormalizeWarning::UnknownOperator {
                    field_path: field_path.to_string(),
                    operator: key.clone(),
                }),
            }
        }
    }
    range
}

fn parse_matches_query(raw: &RawFilterValue) -> Option<super::ast::MatchesQueryClause> {
    let RawFilterValue::Object(entries) = raw else { return None };
    let mut query = None;
    let mut fuzziness = None;
    let mut operator = None;
    for (key, value) in entries {
        match key.as_str() {
            "query" => query = scalar_string(value),
            "fuzziness" => {
                fuzziness = scalar_string(value).and_then(|s| match s.as_str() {
                    "0" => Some(super::ast::Fuzziness::Zero),
                    "1" => Some(super::ast::Fuzziness::One),
                    "2" => Some(super::ast::Fuzziness::Two),
                    "AUTO" => Some(super::ast::Fuzziness::Auto),
                    _ => None,
                });
            }
            "operator" => {
                operator = scalar_string(value).and_then(|s| match s.as_str() {
                    "OR" => Some(super::ast::TextOperator::Or),
                    "AND" => Some(super::ast::TextOperator::And),
                    _ => None,
                });
            }
            _ => {}
        }
    }
    query.map(|query| super::ast::MatchesQueryClause { query, fuzziness, operator })
}

fn parse_near(raw: &RawFilterValue) -> Option<super::ast::NearClause> {
    let RawFilterValue::Object(entries) = raw else { return None };
    let mut lat = None;
    let mut lon = None;
    let mut distance = None;
    let mut unit = None;
    for (key, value) in entries {
        match key.as_str() {
            "latitude" => lat = scalar_f64(value),
            "longitude" => lon = scalar_f64(value),
            "distance" => distance = scalar_f64(value),
            "unit" => {
                unit = scalar_string(value).and_then(|s| match s.as_str() {
                    "MILE" => Some(super::ast::DistanceUnit::Mile),
                    "YARD" => Some(super::ast::DistanceUnit::Yard),
                    "FOOT" => Some(super::ast::DistanceUnit::Foot),
                    "INCH" => Some(super::ast::DistanceUnit::Inch),
                    "KILOMETER" => Some(super::ast::DistanceUnit::Kilometer),
                    "METER" => Some(super::ast::DistanceUnit::Meter),
                    "CENTIMETER" => Some(super::ast::DistanceUnit::Centimeter),
                    "MILLIMETER" => Some(super::ast::DistanceUnit::Millimeter),
                    "NAUTICAL_MILE" => Some(super::ast::DistanceUnit::NauticalMile),
                    _ => None,
                });
            }
            _ => {}
        }
    }
    Some(super::ast::NearClause {
        lat: lat?,
        lon: lon?,
        distance: distance?,
        unit: unit.unwrap_or(super::ast::DistanceUnit::Meter),
    })
}

fn parse_time_of_day(raw: &RawFilterValue) -> Option<super::ast::TimeOfDayClause> {
    let RawFilterValue::Object(entries) = raw else { return None };
    let mut clause = super::ast::TimeOfDayClause::default();
    for (key, value) in entries {
        match key.as_str() {
            "equal_to_any_of" => {
                clause.equal_to_any_of = Some(
                    as_list(value)
                        .iter()
                        .filter_map(|v| scalar_i64(v))
                        .collect(),
                );
            }
            "gt" => clause.gt = scalar_i64(value),
            "gte" => clause.gte = scalar_i64(value),
            "lt" => clause.lt = scalar_i64(value),
            "lte" => clause.lte = scalar_i64(value),
            "time_zone" => clause.time_zone = scalar_string(value),
            _ => {}
        }
    }
    Some(clause)
}

fn is_known_operator_key(key: &str) -> bool {
    matches!(
        key,
        "equal_to_any_of"
            | "gt"
            | "gte"
            | "lt"
            | "lte"
            | "matches"
            | "matches_query"
            | "matches_phrase"
            | "near"
            | "time_of_day"
    )
}

fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

fn as_list(raw: &RawFilterValue) -> &[RawFilterValue] {
    match raw {
        RawFilterValue::List(items) => items,
        _ => &[],
    }
}

fn scalar_value(raw: &RawFilterValue) -> Option<Value> {
    match raw {
        RawFilterValue::Scalar(v) => Some(v.clone()),
        _ => None,
    }
}

fn scalar_string(raw: &RawFilterValue) -> Option<String> {
    match scalar_value(raw)? {
        Value::Text(s) => Some(s),
        _ => None,
    }
}

fn scalar_f64(raw: &RawFilterValue) -> Option<f64> {
    match scalar_value(raw)? {
        Value::Float(f) => Some(f),
        Value::Int(i) => Some(i as f64),
        _ => None,
    }
}

fn scalar_i64(raw: &RawFilterValue) -> Option<i64> {
    match raw {
        RawFilterValue::Scalar(Value::Int(i)) => Some(*i),
        _ => None,
    }
}

fn parse_value_list(raw: &RawFilterValue) -> Vec<Value> {
    as_list(raw).iter().filter_map(scalar_value_or_null).collect()
}

fn scalar_value_or_null(raw: &RawFilterValue) -> Option<Value> {
    match raw {
        RawFilterValue::Scalar(v) => Some(v.clone()),
        RawFilterValue::Null => Some(Value::Null),
        _ => None,
    }
}

///
/// Rewrite pass
///
/// One application of every semantic identity in §4.1. Called repeatedly
/// by [`normalize`] until it reaches a fixpoint.
///

fn rewrite_once(node: FilterNode) -> Result<FilterNode, NormalizeError> {
    Ok(match node {
        FilterNode::Not(inner) => match rewrite_once(*inner)? {
            // Not(Not(x)) == x
            FilterNode::Not(x) => *x,
            FilterNode::AlwaysTrue => FilterNode::AlwaysFalse,
            FilterNode::AlwaysFalse => FilterNode::AlwaysTrue,
            other => FilterNode::Not(Box::new(other)),
        },
        FilterNode::AnyOf(branches) => {
            let mut rewritten = Vec::with_capacity(branches.len());
            for branch in branches {
                let branch = rewrite_once(branch)?;
                // any_of:[] == always-false (§4.1 item 4, §9).
                match branch {
                    FilterNode::AlwaysFalse => {}
                    FilterNode::AnyOf(nested) => rewritten.extend(nested),
                    other => rewritten.push(other),
                }
            }
            if rewritten.is_empty() {
                FilterNode::AlwaysFalse
            } else if rewritten.len() == 1 {
                rewritten.into_iter().next().unwrap()
            } else if rewritten.iter().any(|b| matches!(b, FilterNode::AlwaysTrue)) {
                FilterNode::AlwaysTrue
            } else {
                FilterNode::AnyOf(rewritten)
            }
        }
        FilterNode::AllOf(branches) => {
            let mut rewritten = Vec::with_capacity(branches.len());
            for branch in branches {
                let branch = rewrite_once(branch)?;
                match branch {
                    FilterNode::AlwaysTrue => {}
                    FilterNode::AllOf(nested) => rewritten.extend(nested),
                    other => rewritten.push(other),
                }
            }
            if rewritten.iter().any(|b| matches!(b, FilterNode::AlwaysFalse)) {
                FilterNode::AlwaysFalse
            } else if rewritten.is_empty() {
                FilterNode::AlwaysTrue
            } else if rewritten.len() == 1 {
                rewritten.into_iter().next().unwrap()
            } else {
                FilterNode::AllOf(merge_sibling_ranges(rewritten))
            }
        }
        FilterNode::AnySatisfy { field_path, inner } => {
            let inner = rewrite_once(*inner)?;
            if matches!(inner, FilterNode::AlwaysTrue) {
                FilterNode::AlwaysTrue
            } else if matches!(inner, FilterNode::AlwaysFalse) {
                FilterNode::AlwaysFalse
            } else {
                FilterNode::AnySatisfy { field_path, inner: Box::new(inner) }
            }
        }
        FilterNode::Leaf { field_path, predicates } => {
            if predicates.is_empty() {
                FilterNode::AlwaysTrue
            } else {
                FilterNode::Leaf { field_path, predicates }
            }
        }
        leaf @ (FilterNode::ListCount { .. } | FilterNode::AlwaysFalse | FilterNode::AlwaysTrue) => {
            leaf
        }
    })
}

/// Merge sibling `Leaf` range predicates on the same field within one
/// `AllOf` (§4.1 item 6), applying [`RangeBounds::merge`].
fn merge_sibling_ranges(branches: Vec<FilterNode>) -> Vec<FilterNode> {
    let mut by_field: indexmap::IndexMap<String, LeafPredicates> = indexmap::IndexMap::new();
    let mut others = Vec::new();
    for branch in branches {
        match branch {
            FilterNode::Leaf { field_path, predicates }
                if predicates.range.is_some() && is_range_only(&predicates) =>
            {
                let entry = by_field.entry(field_path).or_default();
                let mut range = entry.range.take().unwrap_or_default();
                range.merge(predicates.range.as_ref().unwrap());
                entry.range = Some(range);
            }
            other => others.push(other),
        }
    }
    let mut merged: Vec<FilterNode> = by_field
        .into_iter()
        .map(|(field_path, predicates)| FilterNode::leaf(field_path, predicates))
        .collect();
    merged.extend(others);
    merged
}

fn is_range_only(predicates: &LeafPredicates) -> bool {
    predicates.equal_to_any_of.is_none()
        && predicates.matches.is_none()
        && predicates.matches_query.is_none()
        && predicates.matches_phrase.is_none()
        && predicates.near.is_none()
        && predicates.time_of_day.is_none()
}
