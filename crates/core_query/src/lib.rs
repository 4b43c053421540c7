//! Core Query - engine-agnostic kernel of the generic data-access layer
//!
//! This crate defines the contract between callers and any relational store
//! backend:
//! - The [`Entity`] trait: plain records with a key, declared columns, an
//!   optional optimistic-concurrency version token, and a by-name field
//!   accessor.
//! - Query specification value objects: [`Pager`], [`Sorter`], [`Filter`]
//!   and [`Condition`], composed into a [`QuerySpec`].
//! - The paged result container [`TableInfo`] and its page arithmetic.
//! - [`pipeline::paginate`], the in-memory evaluation mode that mirrors the
//!   store-evaluated filter/sort/count/slice order exactly.
//! - The [`ChangeObserver`] seam notified on every persisted change.
//!
//! Nothing in this crate touches a database; the store backend lives in
//! `infra_store`.

pub mod entity;
pub mod error;
pub mod filter;
pub mod observer;
pub mod page;
pub mod pipeline;
pub mod sort;
pub mod spec;
pub mod value;

pub use entity::Entity;
pub use error::QueryError;
pub use filter::{Condition, Filter};
pub use observer::{ChangeKind, ChangeObserver, LogObserver, NullObserver};
pub use page::{Pager, TableInfo};
pub use sort::{SortKey, Sorter};
pub use spec::QuerySpec;
pub use value::Value;
