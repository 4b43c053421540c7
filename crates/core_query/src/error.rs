//! Kernel error types for query specifications

use thiserror::Error;

/// Errors raised while building or validating a query specification
///
/// These are caller errors: they are detected before any store round trip
/// and are never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// Page numbers are 1-based; zero is rejected at construction
    #[error("page index must be at least 1, got {0}")]
    InvalidPageIndex(u64),

    /// A zero page size would make page arithmetic meaningless
    #[error("page size must be at least 1, got {0}")]
    InvalidPageSize(u64),

    /// A filter or sorter referenced a column the entity does not declare
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// A relation name not declared by the entity
    #[error("unknown relation '{0}'")]
    UnknownRelation(String),

    /// A closure-bearing filter or sorter was handed to the store-evaluated
    /// path, which can only push down condition trees and column names
    #[error("{0} cannot be translated for store evaluation")]
    NotTranslatable(&'static str),
}

impl QueryError {
    pub fn unknown_column(column: impl Into<String>) -> Self {
        QueryError::UnknownColumn(column.into())
    }

    pub fn unknown_relation(relation: impl Into<String>) -> Self {
        QueryError::UnknownRelation(relation.into())
    }
}
