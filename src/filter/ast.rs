//! Filter AST.
//!
//! Pure, schema-agnostic representation of client-supplied filter
//! predicates. This layer contains no type validation or execution
//! semantics; interpretation happens in later passes:
//!
//! - normalization ([`super::normalize`])
//! - interpretation into the vendor DSL ([`super::interpret`])
//! - routing-value extraction ([`crate::routing`])
//! - index-expression extraction ([`crate::index_expr`])

use crate::value::Value;

///
/// Operator
///
/// Every operator the GraphQL layer may supply in a filter predicate map.
/// Operators not recognized for a given datastore-field type are simply
/// absent from [`LeafPredicates`] after normalization; an operator name the
/// normalizer does not recognize at all is dropped with a warning (§4.1
/// item 3) before it ever reaches this enum.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Operator {
    EqualToAnyOf,
    Gt,
    Gte,
    Lt,
    Lte,
    Matches,
    MatchesQuery,
    MatchesPhrase,
    Near,
    TimeOfDay,
    AnySatisfy,
    AllOf,
    AnyOf,
    Not,
    Count,
}

impl Operator {
    /// Parse a raw operator name as it appears in the client-supplied map.
    /// Returns `None` for anything unrecognized — callers must log and drop
    /// per §4.1 item 3, not fail.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "equal_to_any_of" => Self::EqualToAnyOf,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "matches" => Self::Matches,
            "matches_query" => Self::MatchesQuery,
            "matches_phrase" => Self::MatchesPhrase,
            "near" => Self::Near,
            "time_of_day" => Self::TimeOfDay,
            "any_satisfy" => Self::AnySatisfy,
            "all_of" => Self::AllOf,
            "any_of" => Self::AnyOf,
            "not" => Self::Not,
            "count" => Self::Count,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EqualToAnyOf => "equal_to_any_of",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Matches => "matches",
            Self::MatchesQuery => "matches_query",
            Self::MatchesPhrase => "matches_phrase",
            Self::Near => "near",
            Self::TimeOfDay => "time_of_day",
            Self::AnySatisfy => "any_satisfy",
            Self::AllOf => "all_of",
            Self::AnyOf => "any_of",
            Self::Not => "not",
            Self::Count => "count",
        }
    }
}

///
/// RangeBounds
///
/// A merged `gt`/`gte`/`lt`/`lte` clause on one field. Collapsing rule
/// (§4.1 item 6): when both `gt` and `gte` are present the larger bound
/// wins; when both `lt` and `lte` are present the smaller bound wins.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RangeBounds {
    pub gt: Option<Value>,
    pub gte: Option<Value>,
    pub lt: Option<Value>,
    pub lte: Option<Value>,
}

impl RangeBounds {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gt.is_none() && self.gte.is_none() && self.lt.is_none() && self.lte.is_none()
    }

    /// Merge another range clause on the same field into this one, applying
    /// the §4.1 item 6 collapsing rule. `cmp` orders the underlying `Value`s
    /// (callers pass [`Value::cmp`] or a schema-aware numeric comparator).
    pub fn merge(&mut self, other: &Self) {
        self.gt = merge_lower(self.gt.take(), other.gt.clone(), false);
        self.gte = merge_lower(self.gte.take(), other.gte.clone(), true);
        self.lt = merge_upper(self.lt.take(), other.lt.clone(), false);
        self.lte = merge_upper(self.lte.take(), other.lte.clone(), true);

        // gt vs gte: the larger (more restrictive) lower bound wins overall,
        // demoting the other field to None so only one of {gt, gte} survives
        // once both are present for the same field.
        collapse_lower(&mut self.gt, &mut self.gte);
        collapse_upper(&mut self.lt, &mut self.lte);
    }
}

fn merge_lower(a: Option<Value>, b: Option<Value>, _inclusive: bool) -> Option<Value> {
    match (a, b) {
        (None, x) | (x, None) => x,
        (Some(a), Some(b)) => Some(if a >= b { a } else { b }),
    }
}

fn merge_upper(a: Option<Value>, b: Option<Value>, _inclusive: bool) -> Option<Value> {
    match (a, b) {
        (None, x) | (x, None) => x,
        (Some(a), Some(b)) => Some(if a <= b { a } else { b }),
    }
}

fn collapse_lower(gt: &mut Option<Value>, gte: &mut Option<Value>) {
    if let (Some(g), Some(ge)) = (gt.clone(), gte.clone()) {
        if g >= ge {
            *gte = None;
        } else {
            *gt = None;
        }
    }
}

fn collapse_upper(lt: &mut Option<Value>, lte: &mut Option<Value>) {
    if let (Some(l), Some(le)) = (lt.clone(), lte.clone()) {
        if l <= le {
            *lte = None;
        } else {
            *lt = None;
        }
    }
}

///
/// Fuzziness
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Fuzziness {
    Zero,
    One,
    Two,
    Auto,
}

impl Fuzziness {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::One => "1",
            Self::Two => "2",
            Self::Auto => "AUTO",
        }
    }
}

///
/// TextOperator
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TextOperator {
    Or,
    And,
}

impl TextOperator {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Or => "OR",
            Self::And => "AND",
        }
    }
}

///
/// MatchesQueryClause
///

#[derive(Clone, Debug, PartialEq)]
pub struct MatchesQueryClause {
    pub query: String,
    pub fuzziness: Option<Fuzziness>,
    pub operator: Option<TextOperator>,
}

///
/// DistanceUnit
///
/// Abbreviations per §6.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DistanceUnit {
    Mile,
    Yard,
    Foot,
    Inch,
    Kilometer,
    Meter,
    Centimeter,
    Millimeter,
    NauticalMile,
}

impl DistanceUnit {
    #[must_use]
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Self::Mile => "mi",
            Self::Yard => "yd",
            Self::Foot => "ft",
            Self::Inch => "in",
            Self::Kilometer => "km",
            Self::Meter => "m",
            Self::Centimeter => "cm",
            Self::Millimeter => "mm",
            Self::NauticalMile => "nmi",
        }
    }
}

///
/// NearClause
///

#[derive(Clone, Debug, PartialEq)]
pub struct NearClause {
    pub lat: f64,
    pub lon: f64,
    pub distance: f64,
    pub unit: DistanceUnit,
}

///
/// TimeOfDayClause
///
/// All bounds are nanoseconds-of-day integers (§4.2); conversion from
/// wall-clock time literals happens before construction.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeOfDayClause {
    pub equal_to_any_of: Option<Vec<i64>>,
    pub gt: Option<i64>,
    pub gte: Option<i64>,
    pub lt: Option<i64>,
    pub lte: Option<i64>,
    pub time_zone: Option<String>,
}

///
/// LeafPredicates
///
/// The predicate map on one [`FilterNode::Leaf`], after per-operator
/// parsing but before cross-operator normalization (§4.1).
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LeafPredicates {
    pub equal_to_any_of: Option<Vec<Value>>,
    pub range: Option<RangeBounds>,
    pub matches: Option<String>,
    pub matches_query: Option<MatchesQueryClause>,
    pub matches_phrase: Option<String>,
    pub near: Option<NearClause>,
    pub time_of_day: Option<TimeOfDayClause>,
}

impl LeafPredicates {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.equal_to_any_of.is_none()
            && self.range.as_ref().is_none_or(RangeBounds::is_empty)
            && self.matches.is_none()
            && self.matches_query.is_none()
            && self.matches_phrase.is_none()
            && self.near.is_none()
            && self.time_of_day.is_none()
    }
}

///
/// ListFieldKind
///
/// Schema-derived classification of a list field, consulted by the
/// normalizer when handling `any_satisfy` (§4.1 item 5).
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ListFieldKind {
    /// Indexed as a `nested` document; `any_satisfy` must become a `nested`
    /// query so multi-field predicates apply to the same element.
    Nested,
    /// A list of scalars, or a list of objects mapped without `nested`; the
    /// store's default list matching already provides `any_satisfy`
    /// semantics, so the wrapper reduces to its inner filter.
    ScalarOrFlattenedObject,
}

///
/// FilterNode
///

#[derive(Clone, Debug, PartialEq)]
pub enum FilterNode {
    Leaf {
        field_path: String,
        predicates: LeafPredicates,
    },
    Not(Box<FilterNode>),
    /// Semantic OR.
    AnyOf(Vec<FilterNode>),
    /// Semantic AND; the implicit form of a map of siblings.
    AllOf(Vec<FilterNode>),
    /// Applied to list fields.
    AnySatisfy {
        field_path: String,
        inner: Box<FilterNode>,
    },
    /// Filter on indexed list-size, rewritten from `count` (§4.1 item 7).
    ListCount {
        field_path: String,
        range: RangeBounds,
    },
    /// The canonical always-false filter (§4.1, §9).
    AlwaysFalse,
    /// The canonical always-true filter (identity for `AllOf`/no-op).
    AlwaysTrue,
}

impl FilterNode {
    #[must_use]
    pub fn leaf(field_path: impl Into<String>, predicates: LeafPredicates) -> Self {
        Self::Leaf {
            field_path: field_path.into(),
            predicates,
        }
    }
}
