//! Schema Catalog: the resolved, read-only input this core consumes but
//! never produces. The GraphQL parser and schema-artifact generator are out
//! of scope (§1); this module is the narrow surface this core needs from
//! them — index/routing/rollover configuration — not a schema DSL.

use std::collections::BTreeSet;
use std::fmt;

use crate::filter::ListFieldKind;

///
/// ListFieldClassifier
///
/// The narrow schema lookup the Filter Normalizer needs to resolve
/// `any_satisfy` and `count` (§4.1 items 5 and 7): for a dotted list-field
/// path, is it mapped as a `nested` document or as scalars/flattened
/// objects? Implemented by the host application over its real schema
/// catalog; a `BTreeMap`-backed implementation is provided for tests.
///
pub trait ListFieldClassifier {
    /// `field_path` is the full dotted path to a list field (not a leaf
    /// inside it). Returns `None` if `field_path` does not name a list
    /// field at all, in which case callers treat it as a plain scalar path.
    fn classify_list_field(&self, field_path: &str) -> Option<ListFieldKind>;
}

impl ListFieldClassifier for std::collections::BTreeMap<String, ListFieldKind> {
    fn classify_list_field(&self, field_path: &str) -> Option<ListFieldKind> {
        self.get(field_path).copied()
    }
}

///
/// RolloverGranularity
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RolloverGranularity {
    Day,
    Month,
    Year,
}

///
/// RolloverConfig
///
/// Identifies the time-partitioning scheme of an [`IndexDefinition`]: the
/// field holding the partitioning timestamp, and the bucket width.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RolloverConfig {
    pub granularity: RolloverGranularity,
    pub timestamp_field_path: String,
}

///
/// IndexDefinition
///
/// Two definitions are "compatible for merge" iff their `name`s are equal
/// (§3). All definitions within one `DatastoreQuery` must share
/// `cluster_to_query` (§3 invariant).
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    pub cluster_to_query: String,
    pub route_with: Option<String>,
    pub rollover: Option<RolloverConfig>,
    pub ignored_routing_values: BTreeSet<String>,
    pub search_index_expression_template: String,
}

impl IndexDefinition {
    /// Two definitions are compatible for merge iff their `name`s are equal
    /// (§3) — `cluster_to_query` is not part of the identifier because the
    /// `DatastoreQuery`-level invariant already guarantees all definitions
    /// in a single query share one cluster.
    #[must_use]
    pub fn is_compatible_for_merge(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Display for IndexDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (cluster={})", self.name, self.cluster_to_query)
    }
}
