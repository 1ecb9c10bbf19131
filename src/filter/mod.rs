//! Filter AST, Normalizer, and Interpreter (§4.1, §4.2).

mod ast;
mod interpret;
mod normalize;

pub use ast::{
    DistanceUnit, FilterNode, Fuzziness, LeafPredicates, ListFieldKind, MatchesQueryClause,
    NearClause, Operator, RangeBounds, TextOperator, TimeOfDayClause,
};
pub use interpret::interpret;
pub use normalize::{normalize, NormalizeWarning, NormalizedFilter};
