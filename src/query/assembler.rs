//! Query Assembler (§4.6): composes filter, sort (with tiebreaker),
//! pagination, `_source` projection, `track_total_hits`, and aggregations
//! into one payload.

use serde_json::{json, Map, Value as Json};

use crate::aggregation::build_aggregation;
use crate::config::QueryPlannerConfig;
use crate::error::PlanError;
use crate::filter::interpret;

use super::{DatastoreQuery, SortClause, SortDirection};

/// The assembled request body plus the header fields the Batch Executor
/// needs (§4.7): `size` and whether `sort`/`_source` were included, exposed
/// for the size-contract property test (§8).
#[derive(Clone, Debug, PartialEq)]
pub struct AssembledQuery {
    pub body: Json,
    pub size: u32,
}

/// Assemble the JSON body for `query`. Returns `None` when the query would
/// produce no payload at all (no requested fields, no aggregations, no
/// doc-count) — the Batch Executor drops such queries (§4.7 item 1). Returns
/// `Err` when an aggregation in `query` fails to plan (e.g. a duplicate
/// composite source name, §4.5).
pub fn assemble_body(
    query: &DatastoreQuery,
    config: &QueryPlannerConfig,
) -> Result<Option<AssembledQuery>, PlanError> {
    if !query.individual_docs_needed && !query.has_aggregations() && !query.total_document_count_needed
    {
        return Ok(None);
    }

    let mut body = Map::new();

    if let Some(filter_json) = interpret(&query.combined_filter()) {
        body.insert("query".to_string(), filter_json);
    }

    let size = if query.individual_docs_needed {
        let first = config.clamp_first(query.document_pagination.as_ref().and_then(|p| p.first));
        first + 1
    } else {
        0
    };
    body.insert("size".to_string(), json!(size));

    if query.individual_docs_needed {
        let sort = build_sort(query.sort.as_deref());
        body.insert("sort".to_string(), sort_to_json(&sort));

        let non_id_fields: Vec<&String> = query.requested_fields.iter().filter(|f| f.as_str() != "id").collect();
        if non_id_fields.is_empty() {
            body.insert("_source".to_string(), Json::Bool(false));
        } else {
            body.insert("_source".to_string(), json!({ "includes": non_id_fields }));
        }
    }

    body.insert("track_total_hits".to_string(), Json::Bool(query.total_document_count_needed));

    if query.has_aggregations() {
        let mut aggs = Map::new();
        for agg in query.aggregations.values() {
            if let Some((name, node, _meta)) =
                build_aggregation(agg, config.aggregation_strategy, config.default_page_size)?
            {
                aggs.insert(name, node);
            }
        }
        if !aggs.is_empty() {
            body.insert("aggs".to_string(), Json::Object(aggs));
        }
    }

    Ok(Some(AssembledQuery { body: Json::Object(body), size }))
}

/// Build the final sort clause list: caller-supplied clauses plus a
/// deduplicated tiebreaker (§4.6).
fn build_sort(caller_sort: Option<&[SortClause]>) -> Vec<SortClause> {
    let Some(caller_sort) = caller_sort else {
        return vec![SortClause::tiebreaker(SortDirection::Asc)];
    };

    let mut deduped: Vec<SortClause> = Vec::new();
    for clause in caller_sort {
        if !deduped.iter().any(|existing| existing.field_path == clause.field_path) {
            deduped.push(clause.clone());
        }
    }

    let last_direction = deduped.last().map_or(SortDirection::Asc, |c| c.direction);
    if !deduped.iter().any(|c| c.field_path == "id") {
        deduped.push(SortClause::tiebreaker(last_direction));
    }
    deduped
}

fn sort_to_json(sort: &[SortClause]) -> Json {
    Json::Array(
        sort.iter()
            .map(|clause| {
                json!({
                    clause.field_path.clone(): {
                        "order": clause.direction.as_str(),
                        "missing": clause.direction.missing(),
                    }
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::IndexDefinitionKey;
    use crate::schema::IndexDefinition;
    use std::collections::{BTreeMap, BTreeSet};

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

    fn base_query(requested_fields: BTreeSet<String>) -> DatastoreQuery {
        DatastoreQuery::new(
            BTreeSet::from([index_def()]),
            vec![],
            None,
            None,
            requested_fields,
            BTreeMap::new(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn empty_filter_omits_query_key_and_uses_default_tiebreaker() {
        let query = base_query(BTreeSet::from(["name".to_string()]));
        let config = QueryPlannerConfig::default();
        let assembled = assemble_body(&query, &config).unwrap().unwrap();
        assert!(assembled.body.get("query").is_none());
        assert_eq!(assembled.size, 51);
        assert_eq!(
            assembled.body["sort"],
            json!([{ "id": { "order": "asc", "missing": "_first" } }])
        );
    }

    #[test]
    fn no_docs_no_aggregations_is_dropped() {
        let query = base_query(BTreeSet::new());
        let config = QueryPlannerConfig::default();
        assert!(assemble_body(&query, &config).unwrap().is_none());
    }

    #[test]
    fn size_is_clamped_to_max_page_size_plus_one() {
        let mut query = base_query(BTreeSet::from(["name".to_string()]));
        query.document_pagination = Some(super::super::DocumentPagination {
            first: Some(10_000),
            ..Default::default()
        });
        let config = QueryPlannerConfig::default();
        let assembled = assemble_body(&query, &config).unwrap().unwrap();
        assert_eq!(assembled.size, config.max_page_size + 1);
    }
}
