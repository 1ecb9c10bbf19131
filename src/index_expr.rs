//! Index Expression Builder (§4.4): walks a normalized filter tree to
//! compute the comma-separated index expression against a time-partitioned
//! ("rollover") index family, pruning indices the filter's time range
//! cannot touch.
//!
//! Shares the [`ThreeValued`] lattice with [`crate::routing`], applied to
//! half-open time intervals instead of routing-value sets.

use std::collections::BTreeSet;

use time::{Duration, Month, OffsetDateTime};

use crate::filter::FilterNode;
use crate::schema::{RolloverConfig, RolloverGranularity};
use crate::three_valued::ThreeValued;
use crate::value::Value;

/// A half-open `[lo, hi)` instant interval, or the unbounded/empty
/// extremes folded into [`ThreeValued`].
type TimeDomain = ThreeValued<MonthBucket>;

/// One calendar bucket at the index's rollover granularity, used as the
/// atomic unit of the three-valued set so union/intersect/difference stay
/// exact regardless of sub-bucket interval arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonthBucket {
    year: i32,
    ordinal: u32,
}

impl MonthBucket {
    fn from_instant(instant: OffsetDateTime, granularity: RolloverGranularity) -> Self {
        match granularity {
            RolloverGranularity::Day => Self { year: instant.year(), ordinal: instant.ordinal() as u32 },
            RolloverGranularity::Month => Self { year: instant.year(), ordinal: u8::from(instant.month()) as u32 },
            RolloverGranularity::Year => Self { year: instant.year(), ordinal: 0 },
        }
    }

    fn start(self, granularity: RolloverGranularity) -> OffsetDateTime {
        match granularity {
            RolloverGranularity::Day => {
                OffsetDateTime::UNIX_EPOCH
                    .replace_year(self.year)
                    .unwrap()
                    .replace_ordinal(1)
                    .unwrap()
                    .saturating_add(Duration::days(i64::from(self.ordinal) - 1))
            }
            RolloverGranularity::Month => OffsetDateTime::UNIX_EPOCH
                .replace_year(self.year)
                .unwrap()
                .replace_month(Month::try_from(self.ordinal as u8).unwrap())
                .unwrap()
                .replace_day(1)
                .unwrap(),
            RolloverGranularity::Year => OffsetDateTime::UNIX_EPOCH
                .replace_year(self.year)
                .unwrap()
                .replace_month(Month::January)
                .unwrap()
                .replace_day(1)
                .unwrap(),
        }
    }

    /// Renders the concrete index name suffix for this bucket, e.g.
    /// `2024-03` for `Month`, `2024-03-07` for `Day`, `2024` for `Year`.
    fn index_suffix(self, granularity: RolloverGranularity) -> String {
        match granularity {
            RolloverGranularity::Day => {
                let start = self.start(granularity);
                format!("{:04}-{:02}-{:02}", start.year(), u8::from(start.month()), start.day())
            }
            RolloverGranularity::Month => format!("{:04}-{:02}", self.year, self.ordinal),
            RolloverGranularity::Year => format!("{:04}", self.year),
        }
    }
}

/// Parse a known index name's bucket suffix back into a [`MonthBucket`],
/// given the literal prefix shared by every index in the family (the
/// `base_pattern` with its trailing `*` stripped). Returns `None` for names
/// that don't share the prefix or whose suffix doesn't parse at the
/// expected granularity.
fn parse_bucket_suffix(prefix: &str, name: &str, granularity: RolloverGranularity) -> Option<MonthBucket> {
    let suffix = name.strip_prefix(prefix)?;
    match granularity {
        RolloverGranularity::Year => {
            let year: i32 = suffix.parse().ok()?;
            Some(MonthBucket { year, ordinal: 0 })
        }
        RolloverGranularity::Month => {
            let mut parts = suffix.splitn(2, '-');
            let year: i32 = parts.next()?.parse().ok()?;
            let ordinal: u32 = parts.next()?.parse().ok()?;
            Some(MonthBucket { year, ordinal })
        }
        RolloverGranularity::Day => {
            let mut parts = suffix.splitn(3, '-');
            let year: i32 = parts.next()?.parse().ok()?;
            let month: u8 = parts.next()?.parse().ok()?;
            let day: u8 = parts.next()?.parse().ok()?;
            let date = time::Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()?;
            Some(MonthBucket { year, ordinal: date.ordinal() as u32 })
        }
    }
}

/// Compute the allowed set of index-name suffixes for `root` against
/// `rollover`, then render the inclusion/exclusion expression against the
/// concrete index names that currently exist (`known_indices`, already
/// sorted). `has_aggregations` controls the empty-prune fallback (§4.4
/// last time-range bullet).
#[must_use]
pub fn build_index_expression(
    root: &FilterNode,
    rollover: &RolloverConfig,
    base_pattern: &str,
    known_indices: &BTreeSet<String>,
    has_aggregations: bool,
) -> String {
    let prefix = base_pattern.trim_end_matches('*');
    let universe: BTreeSet<MonthBucket> = known_indices
        .iter()
        .filter_map(|name| parse_bucket_suffix(prefix, name, rollover.granularity))
        .collect();

    let allowed =
        allowed_buckets(root, &rollover.timestamp_field_path, rollover.granularity, &universe);

    let allowed_suffixes: Option<BTreeSet<String>> = match allowed {
        ThreeValued::All => None,
        ThreeValued::None => Some(BTreeSet::new()),
        ThreeValued::Some(buckets) => {
            Some(buckets.into_iter().map(|b| b.index_suffix(rollover.granularity)).collect())
        }
    };

    match allowed_suffixes {
        None => base_pattern.to_string(),
        Some(suffixes) => {
            let excluded: Vec<&String> = known_indices
                .iter()
                .filter(|name| !suffixes.iter().any(|s| name.ends_with(s.as_str())))
                .collect();

            if excluded.len() == known_indices.len() {
                // Every known index was pruned.
                if has_aggregations {
                    known_indices
                        .iter()
                        .next()
                        .cloned()
                        .unwrap_or_default()
                } else {
                    String::new()
                }
            } else {
                let mut expr = base_pattern.to_string();
                for name in excluded {
                    expr.push_str(&format!(",-{name}"));
                }
                expr
            }
        }
    }
}

/// Three-valued time-range reduction over `root` restricted to
/// `timestamp_field_path` (§4.4). `universe` is the set of buckets any
/// currently known index actually covers; a one-sided range bound (`gt`
/// with no upper, or `lt` with no lower) has no finite closed-world
/// complement on its own, so it's resolved against `universe` instead of
/// widening to `All` (§9 Open Question on one-sided pruning).
fn allowed_buckets(
    node: &FilterNode,
    timestamp_field_path: &str,
    granularity: RolloverGranularity,
    universe: &BTreeSet<MonthBucket>,
) -> TimeDomain {
    match node {
        FilterNode::AlwaysTrue | FilterNode::ListCount { .. } => ThreeValued::All,
        FilterNode::AlwaysFalse => ThreeValued::None,
        FilterNode::Leaf { field_path, predicates } => {
            if field_path != timestamp_field_path {
                return ThreeValued::All;
            }
            leaf_buckets(predicates, granularity, universe)
        }
        FilterNode::Not(inner) => {
            complement(allowed_buckets(inner, timestamp_field_path, granularity, universe))
        }
        FilterNode::AnyOf(branches) => ThreeValued::union_all(
            branches.iter().map(|b| allowed_buckets(b, timestamp_field_path, granularity, universe)),
        ),
        FilterNode::AllOf(branches) => ThreeValued::intersect_all(
            branches.iter().map(|b| allowed_buckets(b, timestamp_field_path, granularity, universe)),
        ),
        FilterNode::AnySatisfy { .. } => ThreeValued::All,
    }
}

/// Complement is only well-defined relative to a closed universe; since we
/// don't bound the calendar a priori, `Not` over the timestamp field widens
/// to `All` except when negating a fully-resolved concrete set, in which
/// case there's no finite closed-world complement to compute either — so,
/// matching the routing picker's treatment of standalone negation, `Not`
/// widens to `All`. `equal_to_any_of` handles its own `not` semantics
/// inline when paired as a direct sibling (not via this generic path).
fn complement(domain: TimeDomain) -> TimeDomain {
    match domain {
        ThreeValued::None => ThreeValued::All,
        ThreeValued::All => ThreeValued::None,
        ThreeValued::Some(_) => ThreeValued::All,
    }
}

fn leaf_buckets(
    predicates: &crate::filter::LeafPredicates,
    granularity: RolloverGranularity,
    universe: &BTreeSet<MonthBucket>,
) -> TimeDomain {
    let mut domain = ThreeValued::All;

    if let Some(values) = &predicates.equal_to_any_of {
        let mut has_nil = false;
        let mut instants = BTreeSet::new();
        for v in values {
            match v {
                Value::Null => has_nil = true,
                Value::DateTime(dt) => {
                    instants.insert(MonthBucket::from_instant(*dt, granularity));
                }
                Value::Date(d) => {
                    let midnight = d.midnight().assume_utc();
                    instants.insert(MonthBucket::from_instant(midnight, granularity));
                }
                _ => {}
            }
        }
        domain = if has_nil {
            ThreeValued::All
        } else if values.is_empty() {
            ThreeValued::None
        } else {
            ThreeValued::from_set(instants)
        };
    }

    if let Some(range) = &predicates.range {
        if !range.is_empty() {
            domain = domain.intersect(range_domain(range, granularity, universe));
        }
    }

    domain
}

/// Reduce a range clause to the bucket set it can match. A one-sided bound
/// (only `gt`/`gte`, or only `lt`/`lte`) is closed against `universe` on its
/// open side — the widest and narrowest known bucket stand in for the
/// missing bound — rather than giving up and widening to `All`; a fully
/// unbounded range (`range.is_empty()`, already filtered by the caller)
/// never reaches here.
fn range_domain(
    range: &crate::filter::RangeBounds,
    granularity: RolloverGranularity,
    universe: &BTreeSet<MonthBucket>,
) -> TimeDomain {
    let lower = range.gte.as_ref().or(range.gt.as_ref()).and_then(value_instant);
    let upper = range.lte.as_ref().or(range.lt.as_ref()).and_then(value_instant);

    let lower_exclusive = range.gt.is_some() && range.gte.is_none();
    let upper_exclusive = range.lt.is_some() && range.lte.is_none();

    let Some((&universe_min, &universe_max)) = universe.iter().min().zip(universe.iter().max()) else {
        // Nothing known yet to prune against.
        return ThreeValued::All;
    };

    let mut bucket = match lower {
        Some(instant) => MonthBucket::from_instant(instant, granularity),
        None => universe_min,
    };
    let upper_bucket = match upper {
        Some(instant) => MonthBucket::from_instant(instant, granularity),
        None => universe_max,
    };

    // A bucket whose start equals an exclusive upper bound is excluded; a
    // bucket whose start equals the lower bound is included even when the
    // lower bound is exclusive, unless the bound falls exactly on the
    // bucket start (a point bound at a bucket boundary excludes that
    // bucket entirely per §4.4).
    if let Some(instant) = lower {
        if lower_exclusive && bucket.start(granularity) == instant {
            bucket = next_bucket(bucket, granularity);
        }
    }

    let mut buckets = BTreeSet::new();
    loop {
        if bucket > upper_bucket {
            break;
        }
        if let Some(instant) = upper {
            if bucket == upper_bucket && upper_exclusive && bucket.start(granularity) == instant {
                break;
            }
        }
        buckets.insert(bucket);
        if bucket == upper_bucket {
            break;
        }
        bucket = next_bucket(bucket, granularity);
    }

    ThreeValued::from_set(buckets)
}

fn next_bucket(bucket: MonthBucket, granularity: RolloverGranularity) -> MonthBucket {
    match granularity {
        RolloverGranularity::Day => {
            let next = bucket.start(granularity).saturating_add(Duration::days(1));
            MonthBucket::from_instant(next, granularity)
        }
        RolloverGranularity::Month => {
            if bucket.ordinal == 12 {
                MonthBucket { year: bucket.year + 1, ordinal: 1 }
            } else {
                MonthBucket { year: bucket.year, ordinal: bucket.ordinal + 1 }
            }
        }
        RolloverGranularity::Year => MonthBucket { year: bucket.year + 1, ordinal: 0 },
    }
}

fn value_instant(value: &Value) -> Option<OffsetDateTime> {
    match value {
        Value::DateTime(dt) => Some(*dt),
        Value::Date(d) => Some(d.midnight().assume_utc()),
        _ => None,
    }
}
