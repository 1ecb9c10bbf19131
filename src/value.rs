//! Scalar literal values used as filter operands and aggregation operands.
//!
//! Pure, schema-agnostic representation: no type validation, index logic, or
//! execution semantics. This layer carries exactly the variants the filter
//! AST, routing picker, and index pruner need to reason about literal
//! values; it is not a general-purpose GraphQL scalar representation.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use time::{Date, OffsetDateTime};

///
/// Value
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// A calendar date with no time component (`YYYY-MM-DD`).
    Date(#[serde(with = "date_as_string")] Date),
    /// An instant (`YYYY-MM-DDTHH:MM:SSZ`), always normalized to UTC.
    DateTime(#[serde(with = "time::serde::rfc3339")] OffsetDateTime),
    List(Vec<Value>),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Render this value the way it must appear in the emitted JSON DSL
    /// (`terms`, `range`, script params, …).
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
            Self::Text(s) => JsonValue::String(s.clone()),
            Self::Date(d) => JsonValue::String(format_date(*d)),
            Self::DateTime(dt) => JsonValue::String(
                dt.format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_default(),
            ),
            Self::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
        }
    }

    /// A stable, deterministic string key for this value, used for sorting
    /// and deduplication — never for display or serialization.
    #[must_use]
    pub fn sort_key(&self) -> String {
        match self {
            Self::Null => "0:null".to_string(),
            Self::Bool(b) => format!("1:bool:{b}"),
            Self::Int(i) => format!("2:int:{i:020}"),
            Self::Float(f) => format!("3:float:{f}"),
            Self::Text(s) => format!("4:text:{s}"),
            Self::Date(d) => format!("5:date:{}", format_date(*d)),
            Self::DateTime(dt) => format!(
                "6:datetime:{}",
                dt.format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_default()
            ),
            Self::List(items) => {
                let mut out = String::from("7:list[");
                for item in items {
                    out.push_str(&item.sort_key());
                    out.push(';');
                }
                out.push(']');
                out
            }
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.sort_key().hash(state);
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Date(d) => write!(f, "{}", format_date(*d)),
            Self::DateTime(dt) => write!(
                f,
                "{}",
                dt.format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_default()
            ),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

fn format_date(date: Date) -> String {
    let format = time::macros::format_description!("[year]-[month]-[day]");
    date.format(&format).unwrap_or_default()
}

mod date_as_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let format = time::macros::format_description!("[year]-[month]-[day]");
        Date::parse(&raw, &format).map_err(serde::de::Error::custom)
    }
}
