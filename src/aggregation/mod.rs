//! Aggregation Planner (§4.5): translates an [`AggregationQuery`] into the
//! datastore aggregation DSL under either the `Composite` or `NonComposite`
//! strategy, while emitting the `meta` side-channel the Response Decoder
//! (§4.9 / [`crate::response`]) needs to walk the resulting buckets back
//! into typed shapes.

mod keys;
mod plan;
mod types;

pub use keys::{decode_aggregated_value_key, encode_aggregated_value_key};
pub use plan::{build_aggregation, AggregationMeta};
pub use types::{AggregationQuery, Computation, ComputationFunction, Grouping, SubAggregation};
