//! Aggregation request data model (§3, §4.5).

use crate::filter::FilterNode;

///
/// ComputationFunction
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ComputationFunction {
    Sum,
    Avg,
    Min,
    Max,
    Cardinality,
}

impl ComputationFunction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Cardinality => "cardinality",
        }
    }
}

///
/// Computation
///
/// One metric computed over the documents in a bucket (or the whole
/// result set, for an ungrouped aggregation).
///

#[derive(Clone, Debug, PartialEq)]
pub struct Computation {
    pub source_field_path: String,
    pub function: ComputationFunction,
    pub computed_field_name: String,
    /// Dotted GraphQL-visible path this computation answers, used to build
    /// the aggregated-value key (§4.5, §6).
    pub graphql_field_path: String,
}

///
/// Grouping
///

#[derive(Clone, Debug, PartialEq)]
pub enum Grouping {
    FieldTerm {
        field_path: String,
        graphql_path: String,
    },
    DateHistogram {
        field_path: String,
        calendar_interval: String,
        time_zone: String,
        offset: Option<String>,
        graphql_path: String,
    },
    /// Used for derived groupings like `as_day_of_week` / `as_time_of_day`.
    Script {
        script_id: String,
        params: std::collections::BTreeMap<String, crate::value::Value>,
        field_path: String,
        graphql_path: String,
    },
}

impl Grouping {
    #[must_use]
    pub fn graphql_path(&self) -> &str {
        match self {
            Self::FieldTerm { graphql_path, .. }
            | Self::DateHistogram { graphql_path, .. }
            | Self::Script { graphql_path, .. } => graphql_path,
        }
    }

    /// The composite-source / terms-aggregation name for this grouping,
    /// derived from its field path (§8 scenario 6: `options.size`).
    #[must_use]
    pub fn source_name(&self) -> &str {
        match self {
            Self::FieldTerm { field_path, .. }
            | Self::DateHistogram { field_path, .. }
            | Self::Script { field_path, .. } => field_path,
        }
    }
}

///
/// SubAggregation
///
/// A `nested`-mapped list field's own aggregation, planned recursively with
/// `path_in_index` as its field-path prefix.
///

#[derive(Clone, Debug, PartialEq)]
pub struct SubAggregation {
    pub path_in_index: Vec<String>,
    pub query: AggregationQuery,
}

///
/// AggregationQuery
///

#[derive(Clone, Debug, PartialEq)]
pub struct AggregationQuery {
    pub name: String,
    pub computations: Vec<Computation>,
    pub groupings: Vec<Grouping>,
    pub filter: Option<FilterNode>,
    pub sub_aggregations: Vec<SubAggregation>,
    /// Page size for the top grouping; `None` uses the default (50).
    /// `Some(0)` omits the node from the payload entirely (§4.5 last
    /// bullet).
    pub first: Option<u32>,
    pub needs_doc_count: bool,
    pub needs_doc_count_error: bool,
}

impl AggregationQuery {
    #[must_use]
    pub const fn is_omitted(&self) -> bool {
        matches!(self.first, Some(0))
    }
}
