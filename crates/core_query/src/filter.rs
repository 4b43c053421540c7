//! Filter predicates
//!
//! Two kinds of filter exist. [`Condition`] is a composable data tree over
//! column names and values; it can be rendered to a parameterized `WHERE`
//! clause by the store layer or evaluated directly against entities in
//! memory, and both interpretations agree. [`Filter::Predicate`] wraps an
//! arbitrary caller closure for logic the store cannot express; it only
//! participates in the in-memory evaluation mode.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::QueryError;
use crate::value::Value;

/// A translatable predicate tree over one entity's columns
///
/// Comparison nodes follow SQL three-valued logic against NULL: a NULL
/// column value never satisfies `Eq`/`Ne`/ordering/`Like`/`In`; use
/// [`Condition::is_null`] to match NULLs explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Eq(String, Value),
    Ne(String, Value),
    Lt(String, Value),
    Le(String, Value),
    Gt(String, Value),
    Ge(String, Value),
    /// SQL `LIKE` with `%` and `_` wildcards, case-sensitive
    Like(String, String),
    In(String, Vec<Value>),
    IsNull(String),
    IsNotNull(String),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Eq(column.into(), value.into())
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Ne(column.into(), value.into())
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Lt(column.into(), value.into())
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Le(column.into(), value.into())
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Gt(column.into(), value.into())
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Ge(column.into(), value.into())
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Condition::Like(column.into(), pattern.into())
    }

    pub fn is_in(column: impl Into<String>, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Condition::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Condition::IsNull(column.into())
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Condition::IsNotNull(column.into())
    }

    /// Conjunction with another condition
    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::And(mut parts) => {
                parts.push(other);
                Condition::And(parts)
            }
            first => Condition::And(vec![first, other]),
        }
    }

    /// Disjunction with another condition
    pub fn or(self, other: Condition) -> Self {
        match self {
            Condition::Or(mut parts) => {
                parts.push(other);
                Condition::Or(parts)
            }
            first => Condition::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        Condition::Not(Box::new(self))
    }

    /// Checks every referenced column against the entity's declared set
    ///
    /// Runs before any store round trip so a typo fails the call instead
    /// of producing a store-side syntax error.
    pub fn validate<T: Entity>(&self) -> Result<(), QueryError> {
        match self {
            Condition::Eq(c, _)
            | Condition::Ne(c, _)
            | Condition::Lt(c, _)
            | Condition::Le(c, _)
            | Condition::Gt(c, _)
            | Condition::Ge(c, _)
            | Condition::Like(c, _)
            | Condition::In(c, _)
            | Condition::IsNull(c)
            | Condition::IsNotNull(c) => {
                if T::has_column(c) {
                    Ok(())
                } else {
                    Err(QueryError::unknown_column(c))
                }
            }
            Condition::And(parts) | Condition::Or(parts) => {
                parts.iter().try_for_each(Condition::validate::<T>)
            }
            Condition::Not(inner) => inner.validate::<T>(),
        }
    }

    /// In-memory evaluation against one entity
    ///
    /// An UNKNOWN result (a NULL-involving comparison, possibly wrapped in
    /// `Not`/`And`/`Or`) does not match, exactly as a SQL `WHERE` clause
    /// drops it.
    pub fn matches<T: Entity>(&self, entity: &T) -> Result<bool, QueryError> {
        Ok(self.evaluate(entity)? == Some(true))
    }

    /// Three-valued evaluation: `None` is SQL UNKNOWN
    ///
    /// Comparisons against NULL are UNKNOWN, not false; the distinction
    /// matters once `Not` wraps them, since `NOT UNKNOWN` stays UNKNOWN
    /// while `NOT false` would flip to true.
    fn evaluate<T: Entity>(&self, entity: &T) -> Result<Option<bool>, QueryError> {
        match self {
            Condition::Eq(c, v) => compare_field(entity, c, v, |o| o == Ordering::Equal),
            Condition::Ne(c, v) => compare_field(entity, c, v, |o| o != Ordering::Equal),
            Condition::Lt(c, v) => compare_field(entity, c, v, |o| o == Ordering::Less),
            Condition::Le(c, v) => compare_field(entity, c, v, |o| o != Ordering::Greater),
            Condition::Gt(c, v) => compare_field(entity, c, v, |o| o == Ordering::Greater),
            Condition::Ge(c, v) => compare_field(entity, c, v, |o| o != Ordering::Less),
            Condition::Like(c, pattern) => match field_value(entity, c)? {
                Value::Null => Ok(None),
                Value::Text(text) => Ok(Some(like_match(pattern, &text))),
                _ => Ok(Some(false)),
            },
            Condition::In(c, values) => {
                let field = field_value(entity, c)?;
                if field.is_null() {
                    return Ok(None);
                }
                if values.iter().any(|v| field.same_as(v)) {
                    Ok(Some(true))
                } else if values.iter().any(Value::is_null) {
                    // x IN (.., NULL) with no match is UNKNOWN, not false.
                    Ok(None)
                } else {
                    Ok(Some(false))
                }
            }
            Condition::IsNull(c) => Ok(Some(field_value(entity, c)?.is_null())),
            Condition::IsNotNull(c) => Ok(Some(!field_value(entity, c)?.is_null())),
            Condition::And(parts) => {
                let mut unknown = false;
                for part in parts {
                    match part.evaluate(entity)? {
                        Some(false) => return Ok(Some(false)),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                Ok(if unknown { None } else { Some(true) })
            }
            Condition::Or(parts) => {
                let mut unknown = false;
                for part in parts {
                    match part.evaluate(entity)? {
                        Some(true) => return Ok(Some(true)),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                Ok(if unknown { None } else { Some(false) })
            }
            Condition::Not(inner) => Ok(inner.evaluate(entity)?.map(|b| !b)),
        }
    }
}

fn field_value<T: Entity>(entity: &T, column: &str) -> Result<Value, QueryError> {
    entity
        .field(column)
        .ok_or_else(|| QueryError::unknown_column(column))
}

fn compare_field<T: Entity>(
    entity: &T,
    column: &str,
    value: &Value,
    accept: impl FnOnce(Ordering) -> bool,
) -> Result<Option<bool>, QueryError> {
    let field = field_value(entity, column)?;
    // SQL semantics: comparisons involving NULL are UNKNOWN.
    if field.is_null() || value.is_null() {
        return Ok(None);
    }
    Ok(Some(accept(field.compare(value))))
}

/// SQL `LIKE` matching in memory: `%` matches any run, `_` one character
fn like_match(pattern: &str, text: &str) -> bool {
    fn matches(pat: &[char], text: &[char]) -> bool {
        match pat.split_first() {
            None => text.is_empty(),
            Some(('%', rest)) => (0..=text.len()).any(|i| matches(rest, &text[i..])),
            Some(('_', rest)) => !text.is_empty() && matches(rest, &text[1..]),
            Some((c, rest)) => text.first() == Some(c) && matches(rest, &text[1..]),
        }
    }
    let pat: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    matches(&pat, &text)
}

/// The filter slot of a query specification
///
/// Absent (`All`), translatable (`Where`), or an opaque caller closure
/// (`Predicate`). Closures are accepted only by the in-memory evaluation
/// mode; the store-evaluated path rejects them at validation time.
#[derive(Clone, Default)]
pub enum Filter<T> {
    /// No filtering; every row matches
    #[default]
    All,
    Where(Condition),
    Predicate(Arc<dyn Fn(&T) -> bool + Send + Sync>),
}

impl<T: Entity> Filter<T> {
    /// Wraps a caller closure as an in-memory-only predicate
    pub fn from_fn(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Filter::Predicate(Arc::new(predicate))
    }

    /// The condition tree, when this filter can be pushed to the store
    pub fn condition(&self) -> Option<&Condition> {
        match self {
            Filter::Where(condition) => Some(condition),
            _ => None,
        }
    }

    pub fn is_translatable(&self) -> bool {
        !matches!(self, Filter::Predicate(_))
    }

    /// Column-name validation for the translatable variants
    pub fn validate(&self) -> Result<(), QueryError> {
        match self {
            Filter::Where(condition) => condition.validate::<T>(),
            _ => Ok(()),
        }
    }

    /// Whether the entity passes this filter, evaluated in memory
    pub fn accepts(&self, entity: &T) -> Result<bool, QueryError> {
        match self {
            Filter::All => Ok(true),
            Filter::Where(condition) => condition.matches(entity),
            Filter::Predicate(predicate) => Ok(predicate(entity)),
        }
    }
}

impl<T> From<Condition> for Filter<T> {
    fn from(condition: Condition) -> Self {
        Filter::Where(condition)
    }
}

impl<T> fmt::Debug for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => write!(f, "Filter::All"),
            Filter::Where(condition) => write!(f, "Filter::Where({:?})", condition),
            Filter::Predicate(_) => write!(f, "Filter::Predicate(..)"),
        }
    }
}
