//! `DatastoreQuery` aggregate root (§3) and its merge semantics (§4.6).

mod assembler;

pub use assembler::{assemble_body, AssembledQuery};

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::aggregation::AggregationQuery;
use crate::error::MergeError;
use crate::filter::FilterNode;
use crate::schema::IndexDefinition;

///
/// SortDirection
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// `missing` is derived from direction: asc sorts missing values first,
    /// desc sorts them last (§3).
    #[must_use]
    pub const fn missing(self) -> &'static str {
        match self {
            Self::Asc => "_first",
            Self::Desc => "_last",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

///
/// SortClause
///

#[derive(Clone, Debug, PartialEq)]
pub struct SortClause {
    pub field_path: String,
    pub direction: SortDirection,
}

impl SortClause {
    #[must_use]
    pub fn tiebreaker(direction: SortDirection) -> Self {
        Self { field_path: "id".to_string(), direction }
    }
}

///
/// Cursor
///
/// Opaque pagination token; this core never decodes it (§10.5).
///

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Cursor(pub String);

///
/// DocumentPagination
///

#[derive(Clone, Debug, PartialEq, Default)]
pub struct DocumentPagination {
    pub first: Option<u32>,
    pub last: Option<u32>,
    pub before: Option<Cursor>,
    pub after: Option<Cursor>,
}

///
/// DatastoreQuery
///

#[derive(Clone, Debug, PartialEq)]
pub struct DatastoreQuery {
    pub search_index_definitions: BTreeSet<IndexDefinitionKey>,
    /// Modeled as a deduplicated `Vec` rather than a `BTreeSet`: `FilterNode`
    /// carries `f64` (in `near` clauses) and so has no total order.
    pub filters: Vec<FilterNode>,
    pub sort: Option<Vec<SortClause>>,
    pub document_pagination: Option<DocumentPagination>,
    pub requested_fields: BTreeSet<String>,
    pub individual_docs_needed: bool,
    pub total_document_count_needed: bool,
    pub aggregations: BTreeMap<String, AggregationQuery>,
    pub monotonic_clock_deadline_millis: Option<u64>,
}

/// `IndexDefinition` isn't `Ord` (it has no natural total order over its
/// optional sub-structures); queries only need set *membership*, so wrap it
/// behind a key that orders by `name` and carries the value along.
#[derive(Clone, Debug)]
pub struct IndexDefinitionKey(pub IndexDefinition);

impl PartialEq for IndexDefinitionKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for IndexDefinitionKey {}
impl PartialOrd for IndexDefinitionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for IndexDefinitionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.name.cmp(&other.0.name)
    }
}

impl DatastoreQuery {
    /// Construct a new query, enforcing the single-cluster invariant (§3)
    /// and the two forcing rules (`requested_fields` ⇒
    /// `individual_docs_needed`; any doc-count-needing aggregation with no
    /// groupings ⇒ `total_document_count_needed`).
    pub fn new(
        search_index_definitions: BTreeSet<IndexDefinitionKey>,
        filters: Vec<FilterNode>,
        sort: Option<Vec<SortClause>>,
        document_pagination: Option<DocumentPagination>,
        requested_fields: BTreeSet<String>,
        aggregations: BTreeMap<String, AggregationQuery>,
        monotonic_clock_deadline_millis: Option<u64>,
    ) -> Result<Self, MergeError> {
        let clusters: BTreeSet<String> = search_index_definitions
            .iter()
            .map(|def| def.0.cluster_to_query.clone())
            .collect();
        if clusters.len() > 1 {
            return Err(MergeError::MultipleClusters { clusters: clusters.into_iter().collect() });
        }

        let individual_docs_needed = !requested_fields.is_empty();
        let total_document_count_needed = aggregations
            .values()
            .any(|agg| agg.needs_doc_count && agg.groupings.is_empty());

        Ok(Self {
            search_index_definitions,
            filters,
            sort,
            document_pagination,
            requested_fields,
            individual_docs_needed,
            total_document_count_needed,
            aggregations,
            monotonic_clock_deadline_millis,
        })
    }

    #[must_use]
    pub fn has_aggregations(&self) -> bool {
        !self.aggregations.is_empty()
    }

    /// The `AllOf` of every top-level filter, ANDed (§3: `filters: Set<FilterNode> // ANDed`).
    #[must_use]
    pub fn combined_filter(&self) -> FilterNode {
        let mut branches = self.filters.clone();
        match branches.len() {
            0 => FilterNode::AlwaysTrue,
            1 => branches.remove(0),
            _ => FilterNode::AllOf(branches),
        }
    }

    /// Merge `self` with `other` per the §4.6 table. Never mutates either
    /// operand; returns a new value.
    pub fn merge(&self, other: &Self) -> Result<Self, MergeError> {
        if self.search_index_definitions != other.search_index_definitions {
            return Err(MergeError::IncompatibleIndexDefinitions {
                left: self.search_index_definitions.iter().map(|d| d.0.name.clone()).collect(),
                right: other.search_index_definitions.iter().map(|d| d.0.name.clone()).collect(),
            });
        }

        let filters = union_preserving_order(&self.filters, &other.filters);

        let sort = merge_right_biased_with_warn(&self.sort, &other.sort, "sort");
        let document_pagination = merge_right_biased_with_warn(
            &self.document_pagination,
            &other.document_pagination,
            "document_pagination",
        );

        let requested_fields = self.requested_fields.union(&other.requested_fields).cloned().collect();
        let individual_docs_needed = self.individual_docs_needed || other.individual_docs_needed;

        let mut aggregations = self.aggregations.clone();
        aggregations.extend(other.aggregations.clone());

        let total_document_count_needed = (self.total_document_count_needed
            || other.total_document_count_needed)
            || aggregations.values().any(|agg| agg.needs_doc_count && agg.groupings.is_empty());

        let monotonic_clock_deadline_millis = match (
            self.monotonic_clock_deadline_millis,
            other.monotonic_clock_deadline_millis,
        ) {
            (None, None) => None,
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (Some(a), Some(b)) => Some(a.min(b)),
        };

        Ok(Self {
            search_index_definitions: self.search_index_definitions.clone(),
            filters,
            sort,
            document_pagination,
            requested_fields,
            individual_docs_needed,
            total_document_count_needed,
            aggregations,
            monotonic_clock_deadline_millis,
        })
    }
}

fn union_preserving_order(a: &[FilterNode], b: &[FilterNode]) -> Vec<FilterNode> {
    let mut out = a.to_vec();
    for node in b {
        if !out.contains(node) {
            out.push(node.clone());
        }
    }
    out
}

fn merge_right_biased_with_warn<T: Clone + PartialEq>(
    a: &Option<T>,
    b: &Option<T>,
    field_name: &'static str,
) -> Option<T> {
    match (a, b) {
        (None, None) => None,
        (Some(a), None) => Some(a.clone()),
        (None, Some(b)) => Some(b.clone()),
        (Some(a), Some(b)) => {
            if a == b {
                Some(a.clone())
            } else {
                warn!(field = field_name, "conflicting values on merge; right operand wins");
                Some(b.clone())
            }
        }
    }
}
