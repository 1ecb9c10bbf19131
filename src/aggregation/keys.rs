//! Deterministic encode/decode for aggregated-value keys (§4.5, §6):
//! `"<agg_name>:<dot_path_of_graphql_names>:<computed_field_name>"`.
//!
//! The dotted path segment may itself be empty (an ungrouped computation),
//! but `agg_name` and `computed_field_name` never contain `:` — callers are
//! responsible for that invariant, since it is enforced by the GraphQL
//! schema layer that names aggregations and fields, not by this core.

/// Build the deterministic key for one computed value.
#[must_use]
pub fn encode_aggregated_value_key(agg_name: &str, graphql_dot_path: &str, computed_field_name: &str) -> String {
    format!("{agg_name}:{graphql_dot_path}:{computed_field_name}")
}

/// Inverse of [`encode_aggregated_value_key`]. Splits on the first and last
/// `:` so a dotted path containing no colons of its own round-trips exactly
/// (§8: "round-trip on aggregated-value keys").
#[must_use]
pub fn decode_aggregated_value_key(key: &str) -> Option<(String, String, String)> {
    let first_colon = key.find(':')?;
    let last_colon = key.rfind(':')?;
    if first_colon == last_colon {
        return None;
    }
    let agg_name = &key[..first_colon];
    let graphql_dot_path = &key[first_colon + 1..last_colon];
    let computed_field_name = &key[last_colon + 1..];
    Some((agg_name.to_string(), graphql_dot_path.to_string(), computed_field_name.to_string()))
}
