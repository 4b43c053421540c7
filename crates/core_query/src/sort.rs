//! Sort orders
//!
//! A sorter names a primary key, an optional tie-break key, and one
//! direction. The direction applies uniformly to both keys; independent
//! per-key directions are deliberately unsupported, matching the behavior
//! callers already depend on.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::entity::Entity;
use crate::error::QueryError;
use crate::value::Value;

/// One sort key: a column name the store can order by, or an extractor
/// closure usable only in memory
#[derive(Clone)]
pub enum SortKey<T> {
    Column(String),
    Extract(Arc<dyn Fn(&T) -> Value + Send + Sync>),
}

impl<T: Entity> SortKey<T> {
    fn value(&self, entity: &T) -> Result<Value, QueryError> {
        match self {
            SortKey::Column(column) => entity
                .field(column)
                .ok_or_else(|| QueryError::unknown_column(column)),
            SortKey::Extract(extract) => Ok(extract(entity)),
        }
    }

    fn validate(&self) -> Result<(), QueryError> {
        match self {
            SortKey::Column(column) if !T::has_column(column) => {
                Err(QueryError::unknown_column(column))
            }
            _ => Ok(()),
        }
    }
}

impl<T> fmt::Debug for SortKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Column(column) => write!(f, "SortKey::Column({:?})", column),
            SortKey::Extract(_) => write!(f, "SortKey::Extract(..)"),
        }
    }
}

/// A primary sort key with an optional tie-break, applied in one direction
#[derive(Debug, Clone)]
pub struct Sorter<T> {
    key: SortKey<T>,
    then: Option<SortKey<T>>,
    ascending: bool,
}

impl<T: Entity> Sorter<T> {
    /// Ascending sort on a column
    pub fn by_column(column: impl Into<String>) -> Self {
        Self {
            key: SortKey::Column(column.into()),
            then: None,
            ascending: true,
        }
    }

    /// Ascending sort on an extracted key; in-memory evaluation only
    pub fn by(extract: impl Fn(&T) -> Value + Send + Sync + 'static) -> Self {
        Self {
            key: SortKey::Extract(Arc::new(extract)),
            then: None,
            ascending: true,
        }
    }

    /// Tie-break on a column, same direction as the primary key
    pub fn then_by_column(mut self, column: impl Into<String>) -> Self {
        self.then = Some(SortKey::Column(column.into()));
        self
    }

    /// Tie-break on an extracted key; in-memory evaluation only
    pub fn then_by(mut self, extract: impl Fn(&T) -> Value + Send + Sync + 'static) -> Self {
        self.then = Some(SortKey::Extract(Arc::new(extract)));
        self
    }

    /// Flips both keys to descending
    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    /// Column names for store-side `ORDER BY`, when both keys are columns
    pub fn columns(&self) -> Option<(&str, Option<&str>)> {
        let primary = match &self.key {
            SortKey::Column(column) => column.as_str(),
            SortKey::Extract(_) => return None,
        };
        let secondary = match &self.then {
            None => None,
            Some(SortKey::Column(column)) => Some(column.as_str()),
            Some(SortKey::Extract(_)) => return None,
        };
        Some((primary, secondary))
    }

    pub fn is_translatable(&self) -> bool {
        self.columns().is_some()
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        self.key.validate()?;
        if let Some(then) = &self.then {
            then.validate()?;
        }
        Ok(())
    }

    /// Extracts the (primary, tie-break) key pair used for sorting
    pub fn sort_keys(&self, entity: &T) -> Result<(Value, Option<Value>), QueryError> {
        let primary = self.key.value(entity)?;
        let secondary = match &self.then {
            Some(key) => Some(key.value(entity)?),
            None => None,
        };
        Ok((primary, secondary))
    }

    /// Orders two extracted key pairs under this sorter's direction
    pub fn compare_keys(a: &(Value, Option<Value>), b: &(Value, Option<Value>), ascending: bool) -> Ordering {
        let ordering = a.0.compare(&b.0).then_with(|| match (&a.1, &b.1) {
            (Some(x), Some(y)) => x.compare(y),
            _ => Ordering::Equal,
        });
        if ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }

    /// Orders two entities; extraction failures surface as `UnknownColumn`
    pub fn compare(&self, a: &T, b: &T) -> Result<Ordering, QueryError> {
        let ka = self.sort_keys(a)?;
        let kb = self.sort_keys(b)?;
        Ok(Self::compare_keys(&ka, &kb, self.ascending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Gizmo;

    #[test]
    fn primary_key_orders_ascending_by_default() {
        let sorter = Sorter::<Gizmo>::by_column("rating");
        let low = Gizmo::new(1, "a", 5);
        let high = Gizmo::new(2, "b", 9);
        assert_eq!(sorter.compare(&low, &high).unwrap(), Ordering::Less);
        assert_eq!(sorter.compare(&high, &low).unwrap(), Ordering::Greater);
    }

    #[test]
    fn tie_break_applies_only_on_equal_primary() {
        let sorter = Sorter::<Gizmo>::by_column("rating").then_by_column("name");
        let a = Gizmo::new(1, "alpha", 5);
        let b = Gizmo::new(2, "beta", 5);
        let c = Gizmo::new(3, "aaa", 9);
        assert_eq!(sorter.compare(&a, &b).unwrap(), Ordering::Less);
        // Primary key dominates even when the tie-break would disagree.
        assert_eq!(sorter.compare(&c, &a).unwrap(), Ordering::Greater);
    }

    #[test]
    fn descending_reverses_both_keys() {
        let sorter = Sorter::<Gizmo>::by_column("rating")
            .then_by_column("name")
            .descending();
        let a = Gizmo::new(1, "alpha", 5);
        let b = Gizmo::new(2, "beta", 5);
        assert_eq!(sorter.compare(&a, &b).unwrap(), Ordering::Greater);
    }

    #[test]
    fn extractor_keys_are_not_translatable() {
        let sorter = Sorter::<Gizmo>::by(|g| Value::Int(g.rating));
        assert!(!sorter.is_translatable());
        assert!(sorter.columns().is_none());

        let mixed = Sorter::<Gizmo>::by_column("rating").then_by(|g| g.name.clone().into());
        assert!(!mixed.is_translatable());
    }

    #[test]
    fn unknown_sort_column_fails_validation() {
        let sorter = Sorter::<Gizmo>::by_column("bogus");
        assert_eq!(sorter.validate(), Err(QueryError::unknown_column("bogus")));
    }
}
