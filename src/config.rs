//! Configuration surface owned by this core. Config *loading* (files, env,
//! CLI) is out of scope (§1) and belongs to the surrounding application —
//! this is just the small set of knobs the planner and assembler consult,
//! collected into one value and passed explicitly (no globals).

///
/// AggregationStrategy
///
/// Selects which adapter (§4.5) the Aggregation Planner uses. Both
/// implementations of the same interface; callers of the planner do not
/// know which is active.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum AggregationStrategy {
    /// Single `composite` bucket over all groupings.
    #[default]
    Composite,
    /// Nested `terms`/`date_histogram` tree.
    NonComposite,
}

///
/// QueryPlannerConfig
///

#[derive(Clone, Debug, PartialEq)]
pub struct QueryPlannerConfig {
    /// `first` used when the caller specifies no page size.
    pub default_page_size: u32,
    /// Upper clamp on `first` regardless of caller request (§4.6).
    pub max_page_size: u32,
    /// Strategy the Aggregation Planner uses (§4.5, §9).
    pub aggregation_strategy: AggregationStrategy,
    /// Literal routing value substituted when shard pruning yields an empty
    /// set for an aggregation query (§4.3).
    pub fallback_shard_routing_value: String,
}

impl Default for QueryPlannerConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 500,
            aggregation_strategy: AggregationStrategy::default(),
            fallback_shard_routing_value: "fallback_shard_routing_value".to_string(),
        }
    }
}

impl QueryPlannerConfig {
    #[must_use]
    pub fn clamp_first(&self, first: Option<u32>) -> u32 {
        first.unwrap_or(self.default_page_size).min(self.max_page_size)
    }
}
