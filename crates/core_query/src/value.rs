//! Dynamic scalar values exchanged between entities and the store
//!
//! The access layer is generic over entity types, so column values cross its
//! boundary as a closed set of scalar variants rather than as concrete field
//! types. `Value` covers every column type the row structs in this workspace
//! use: booleans, integers, floats, fixed-point decimals, text, UUIDs, dates
//! and UTC timestamps, plus SQL NULL.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single column value
///
/// `Value` carries a deterministic total ordering (see [`Value::compare`])
/// so that in-memory sorting produces the same row order as the store for
/// homogeneous columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Uuid(Uuid),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Returns true for the `Null` variant
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric variants widened to `Decimal` for cross-variant comparison
    fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int(i) => Some(Decimal::from(*i)),
            Value::Float(f) => Decimal::from_f64_retain(*f),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Rank used to order values of different variants
    ///
    /// NULL sorts before everything. The store layer pins its `ORDER BY`
    /// null placement (`NULLS FIRST` ascending, `NULLS LAST` descending)
    /// to the same rule, overriding PostgreSQL's opposite default.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) | Value::Decimal(_) => 2,
            Value::Text(_) => 3,
            Value::Uuid(_) => 4,
            Value::Date(_) => 5,
            Value::Timestamp(_) => 6,
        }
    }

    /// Total ordering over values
    ///
    /// Same-variant values compare naturally; the numeric variants compare
    /// numerically with each other. Mixed non-numeric variants fall back to
    /// a fixed type rank so sorting never panics on a heterogeneous column.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Uuid(a), Value::Uuid(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (a, b) => match (a.as_decimal(), b.as_decimal()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => a.type_rank().cmp(&b.type_rank()),
            },
        }
    }

    /// Equality under [`Value::compare`] semantics
    ///
    /// Unlike `PartialEq`, `Value::Int(1)` and `Value::Decimal(1)` are equal
    /// here, the same way the store coerces numeric comparisons.
    pub fn same_as(&self, other: &Value) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Uuid(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(v: Option<V>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn null_sorts_first() {
        assert_eq!(Value::Null.compare(&Value::Int(0)), Ordering::Less);
        assert_eq!(Value::Text("a".into()).compare(&Value::Null), Ordering::Greater);
        assert_eq!(Value::Null.compare(&Value::Null), Ordering::Equal);
    }

    #[test]
    fn numeric_variants_compare_numerically() {
        assert_eq!(Value::Int(2).compare(&Value::Decimal(dec!(2.0))), Ordering::Equal);
        assert_eq!(Value::Int(1).compare(&Value::Float(1.5)), Ordering::Less);
        assert_eq!(Value::Decimal(dec!(3.25)).compare(&Value::Int(3)), Ordering::Greater);
        assert!(Value::Int(2).same_as(&Value::Float(2.0)));
    }

    #[test]
    fn text_compares_lexicographically() {
        assert_eq!(
            Value::Text("alpha".into()).compare(&Value::Text("beta".into())),
            Ordering::Less
        );
    }

    #[test]
    fn option_conversion_maps_none_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(7i64)), Value::Int(7));
    }

    #[test]
    fn timestamps_order_chronologically() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::seconds(5);
        assert_eq!(Value::from(earlier).compare(&Value::from(later)), Ordering::Less);
    }
}
