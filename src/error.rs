//! Structured, classified error taxonomy for the query core.
//!
//! Every fallible boundary returns one of the leaf error enums below, or the
//! top-level [`QueryCoreError`] that unifies them. Leaves carry enough
//! structure (offending field path, offending fragment) that a caller can
//! build a user-facing error without string-parsing.

use thiserror::Error as ThisError;

///
/// QueryCoreError
///
/// Top-level error produced by this crate. Each variant boxes a leaf error
/// from the component that raised it.
///

#[derive(Debug, ThisError)]
pub enum QueryCoreError {
    #[error(transparent)]
    Normalize(Box<NormalizeError>),

    #[error(transparent)]
    Merge(Box<MergeError>),

    #[error(transparent)]
    Plan(Box<PlanError>),

    #[error(transparent)]
    Executor(Box<ExecutorError>),
}

impl From<NormalizeError> for QueryCoreError {
    fn from(err: NormalizeError) -> Self {
        Self::Normalize(Box::new(err))
    }
}

impl From<MergeError> for QueryCoreError {
    fn from(err: MergeError) -> Self {
        Self::Merge(Box::new(err))
    }
}

impl From<ExecutorError> for QueryCoreError {
    fn from(err: ExecutorError) -> Self {
        Self::Executor(Box::new(err))
    }
}

impl From<PlanError> for QueryCoreError {
    fn from(err: PlanError) -> Self {
        Self::Plan(Box::new(err))
    }
}

///
/// NormalizeError
///
/// `UserInputError` cases raised while normalizing a client-supplied filter
/// tree (§4.1 item 5).
///

#[derive(Debug, ThisError, Clone, Eq, PartialEq)]
pub enum NormalizeError {
    /// `any_satisfy` on a list-of-scalars (or object-mapped list) field
    /// produced more than one non-`any_of` sibling clause; this combination
    /// has no sound translation to the store's default list-matching
    /// semantics.
    #[error(
        "`any_satisfy` on field `{field_path}` combines multiple sibling clauses, which is not \
         supported for list-of-scalars fields: {fragment}"
    )]
    UnsupportedAnySatisfyCombination { field_path: String, fragment: String },
}

///
/// MergeError
///
/// Raised when two [`crate::query::DatastoreQuery`] values cannot be merged.
///

#[derive(Debug, ThisError, Clone, Eq, PartialEq)]
pub enum MergeError {
    /// The two queries' `search_index_definitions` disagree on
    /// `cluster_to_query`, or on the set of indices addressed; merge has no
    /// defined result.
    #[error(
        "cannot merge queries: search_index_definitions are not equal (left={left:?}, \
         right={right:?})"
    )]
    IncompatibleIndexDefinitions { left: Vec<String>, right: Vec<String> },

    /// A `DatastoreQuery` was constructed (not merged) with
    /// `search_index_definitions` spanning more than one `cluster_to_query`.
    #[error("search_index_definitions span multiple clusters: {clusters:?}")]
    MultipleClusters { clusters: Vec<String> },
}

///
/// PlanError
///
/// Raised by the Aggregation Planner (§4.5) and Query Assembler (§4.6) when
/// a query shape has no sound translation to the vendor DSL.
///

#[derive(Debug, ThisError, Clone, Eq, PartialEq)]
pub enum PlanError {
    /// A `SubAggregation` named a `Grouping` that does not exist among its
    /// parent's groupings, so its generated clause would have nothing to
    /// nest under.
    #[error("sub-aggregation `{sub_aggregation_name}` references unknown grouping `{grouping_name}`")]
    UnknownGroupingReference {
        sub_aggregation_name: String,
        grouping_name: String,
    },

    /// Composite aggregation composite-key field collision: two groupings
    /// produced the same composite source name.
    #[error("duplicate composite aggregation source name `{name}`")]
    DuplicateCompositeSourceName { name: String },
}

///
/// ExecutorError
///
/// Raised by the Batch Executor (§4.7) at response-reconciliation time.
///

#[derive(Debug, ThisError, Clone, Eq, PartialEq)]
pub enum ExecutorError {
    /// The transport callback's response map was missing an entry for one or
    /// more of the non-dropped queries it was given.
    #[error("search failed: transport response missing {missing_count} of {expected_count} queries: {debug_descriptions:?}")]
    SearchFailed {
        missing_count: usize,
        expected_count: usize,
        debug_descriptions: Vec<String>,
    },
}
