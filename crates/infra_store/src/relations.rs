//! Navigation-aware query building
//!
//! Entities may declare named relations: related collections or references
//! loaded eagerly onto a batch of parents, one follow-up query per
//! relation. A relation's loader is a plain function that knows the
//! concrete child type; the generic layer only validates names and
//! sequences the loads.
//!
//! Name validation happens when the [`IncludePlan`] is built, never at
//! execution time, so a typo fails the call before any round trip. An
//! empty relation list leaves the base query untouched. Load order follows
//! the caller's declared order; it changes the number and sequence of
//! round trips, never the result set.

use futures::future::BoxFuture;
use sqlx::PgPool;
use tracing::debug;

use core_query::Entity;

use crate::error::StoreError;

/// Loader signature: attach one relation onto a batch of parents
pub type RelationLoader<T> =
    for<'a> fn(&'a PgPool, &'a mut [T]) -> BoxFuture<'a, Result<(), StoreError>>;

/// One declared relation of an entity
pub struct Relation<T> {
    pub name: &'static str,
    pub load: RelationLoader<T>,
}

impl<T> Clone for Relation<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Relation<T> {}

impl<T> std::fmt::Debug for Relation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relation").field("name", &self.name).finish()
    }
}

/// An entity with declared relations; the default set is empty
pub trait Related: Entity {
    fn relations() -> &'static [Relation<Self>] {
        &[]
    }
}

/// A validated, ordered list of relations to attach
#[derive(Debug)]
pub struct IncludePlan<T: Related> {
    relations: Vec<Relation<T>>,
}

impl<T: Related> IncludePlan<T> {
    /// Resolves relation names against the entity's declared set
    ///
    /// # Errors
    ///
    /// `StoreError::InvalidRelation` for any undeclared name.
    pub fn build(names: &[String]) -> Result<Self, StoreError> {
        let mut relations = Vec::with_capacity(names.len());
        for name in names {
            let relation = T::relations()
                .iter()
                .find(|r| r.name == name)
                .ok_or_else(|| StoreError::invalid_relation(T::table_name(), name))?;
            relations.push(*relation);
        }
        Ok(Self { relations })
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Runs each loader over the batch, in declared order
    pub async fn attach(&self, pool: &PgPool, items: &mut [T]) -> Result<(), StoreError> {
        if items.is_empty() || self.relations.is_empty() {
            return Ok(());
        }
        for relation in &self.relations {
            (relation.load)(pool, items).await?;
            debug!(
                table = T::table_name(),
                relation = relation.name,
                parents = items.len(),
                "relation attached"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Widget;

    #[test]
    fn empty_name_list_builds_an_empty_plan() {
        let plan = IncludePlan::<Widget>::build(&[]).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn known_names_resolve_in_declared_order() {
        let names = vec!["tags".to_string(), "readings".to_string()];
        let plan = IncludePlan::<Widget>::build(&names).unwrap();
        let resolved: Vec<&str> = plan.relations.iter().map(|r| r.name).collect();
        assert_eq!(resolved, vec!["tags", "readings"]);
    }

    #[test]
    fn unknown_name_fails_at_construction() {
        let names = vec!["readings".to_string(), "bogus".to_string()];
        let error = IncludePlan::<Widget>::build(&names).unwrap_err();
        assert!(matches!(error, StoreError::InvalidRelation(_)));
        assert!(error.to_string().contains("bogus"));
    }
}
