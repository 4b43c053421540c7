//! Query specifications
//!
//! A [`QuerySpec`] is the immutable description of one read: a filter, an
//! optional sort order, a page request, and the relation names to attach
//! eagerly. Specifications hold no connection and are built fresh per call.

use crate::entity::Entity;
use crate::error::QueryError;
use crate::filter::{Condition, Filter};
use crate::page::Pager;
use crate::sort::Sorter;

/// The shape of one paged read
#[derive(Debug, Clone)]
pub struct QuerySpec<T> {
    pub filter: Filter<T>,
    pub sorter: Option<Sorter<T>>,
    pub pager: Pager,
    /// Relation names to eagerly attach, in application order
    pub relations: Vec<String>,
}

impl<T: Entity> QuerySpec<T> {
    /// A specification matching all rows on the given page
    pub fn new(pager: Pager) -> Self {
        Self {
            filter: Filter::All,
            sorter: None,
            pager,
            relations: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: Filter<T>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.filter = Filter::Where(condition);
        self
    }

    pub fn with_sorter(mut self, sorter: Sorter<T>) -> Self {
        self.sorter = Some(sorter);
        self
    }

    /// Adds a relation to eagerly attach to each result row
    pub fn include(mut self, relation: impl Into<String>) -> Self {
        self.relations.push(relation.into());
        self
    }

    /// Whether filter and sorter can both be pushed to the store
    pub fn is_translatable(&self) -> bool {
        self.filter.is_translatable()
            && self.sorter.as_ref().map_or(true, Sorter::is_translatable)
    }

    /// Column-name validation of filter and sorter
    pub fn validate(&self) -> Result<(), QueryError> {
        self.filter.validate()?;
        if let Some(sorter) = &self.sorter {
            sorter.validate()?;
        }
        Ok(())
    }

    /// Validation for the store-evaluated path, which additionally requires
    /// a fully translatable specification
    pub fn validate_for_store(&self) -> Result<(), QueryError> {
        self.validate()?;
        if !self.filter.is_translatable() {
            return Err(QueryError::NotTranslatable("a closure filter"));
        }
        if self.sorter.as_ref().is_some_and(|s| !s.is_translatable()) {
            return Err(QueryError::NotTranslatable("a closure sort key"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Gizmo;
    use crate::value::Value;

    fn pager() -> Pager {
        Pager::new(1, 10).unwrap()
    }

    #[test]
    fn default_spec_is_translatable() {
        let spec = QuerySpec::<Gizmo>::new(pager());
        assert!(spec.is_translatable());
        spec.validate_for_store().unwrap();
    }

    #[test]
    fn closure_filter_rejected_by_store_validation() {
        let spec =
            QuerySpec::<Gizmo>::new(pager()).with_filter(Filter::from_fn(|g: &Gizmo| g.rating > 3));
        assert!(!spec.is_translatable());
        assert_eq!(
            spec.validate_for_store(),
            Err(QueryError::NotTranslatable("a closure filter"))
        );
        // The in-memory validation path still accepts it.
        spec.validate().unwrap();
    }

    #[test]
    fn closure_sorter_rejected_by_store_validation() {
        let spec = QuerySpec::<Gizmo>::new(pager())
            .with_sorter(Sorter::by(|g: &Gizmo| Value::Int(g.rating)));
        assert_eq!(
            spec.validate_for_store(),
            Err(QueryError::NotTranslatable("a closure sort key"))
        );
    }

    #[test]
    fn unknown_columns_caught_before_any_round_trip() {
        let spec = QuerySpec::<Gizmo>::new(pager()).with_condition(Condition::eq("nope", 1i64));
        assert_eq!(spec.validate(), Err(QueryError::unknown_column("nope")));
    }

    #[test]
    fn include_preserves_order() {
        let spec = QuerySpec::<Gizmo>::new(pager()).include("readings").include("tags");
        assert_eq!(spec.relations, vec!["readings".to_string(), "tags".to_string()]);
    }
}
