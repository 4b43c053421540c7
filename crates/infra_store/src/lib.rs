//! Infrastructure store layer
//!
//! PostgreSQL backend for the generic data-access layer, built on sqlx.
//!
//! # Architecture
//!
//! The crate implements the store side of the contract defined in
//! `core_query`:
//! - [`pool`] - connection pool configuration and creation
//! - [`sql`] - rendering of translatable specifications into
//!   parameterized SQL
//! - [`repository`] - the generic CRUD store with staged changes
//! - [`save`] - the concurrency-safe save loop and its commit seam
//! - [`relations`] - navigation-aware query building and relation loaders
//! - [`query`] - paged reads under either evaluation mode
//! - [`raw`] - the raw query executor
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_store::{create_pool, EvalMode, Repository, StoreConfig};
//! use core_query::{Pager, QuerySpec, Sorter};
//!
//! let pool = create_pool(StoreConfig::from_env()?).await?;
//! let mut repo = Repository::<Device>::new(pool);
//! let spec = QuerySpec::new(Pager::new(2, 10)?)
//!     .with_sorter(Sorter::by_column("name"));
//! let page = repo.query_page(&spec, EvalMode::Store, None).await?;
//! ```

pub mod error;
pub mod pool;
pub mod query;
pub mod raw;
pub mod relations;
pub mod repository;
pub mod save;
pub mod sql;

pub use error::StoreError;
pub use pool::{create_pool, create_pool_from_url, StoreConfig, StorePool};
pub use query::EvalMode;
pub use raw::{execute_raw, execute_raw_scalar};
pub use relations::{IncludePlan, Related, Relation, RelationLoader};
pub use repository::{BatchOutcome, ChunkedOutcome, Repository};
pub use save::{ChangeSet, Commit, CommitOutcome, Pending, RetryPolicy};

#[cfg(test)]
pub(crate) mod testing {
    //! Shared test fixture entity

    use futures::future::BoxFuture;
    use sqlx::PgPool;

    use core_query::{Entity, Value};

    use crate::error::StoreError;
    use crate::relations::{Related, Relation};

    #[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
    pub struct Widget {
        pub id: i64,
        pub name: String,
        pub rating: i64,
        pub label: Option<String>,
        pub version: i64,
    }

    impl Widget {
        pub fn new(id: i64, name: impl Into<String>, rating: i64) -> Self {
            Self {
                id,
                name: name.into(),
                rating,
                label: None,
                version: 1,
            }
        }
    }

    impl Entity for Widget {
        fn table_name() -> &'static str {
            "widgets"
        }

        fn key_column() -> &'static str {
            "id"
        }

        fn columns() -> &'static [&'static str] {
            &["id", "name", "rating", "label", "version"]
        }

        fn key(&self) -> Value {
            Value::Int(self.id)
        }

        fn field(&self, column: &str) -> Option<Value> {
            match column {
                "id" => Some(Value::Int(self.id)),
                "name" => Some(Value::Text(self.name.clone())),
                "rating" => Some(Value::Int(self.rating)),
                "label" => Some(self.label.clone().into()),
                "version" => Some(Value::Int(self.version)),
                _ => None,
            }
        }

        fn version_column() -> Option<&'static str> {
            Some("version")
        }

        fn version(&self) -> Option<i64> {
            Some(self.version)
        }

        fn set_version(&mut self, version: i64) {
            self.version = version;
        }
    }

    fn load_noop<'a>(
        _pool: &'a PgPool,
        _items: &'a mut [Widget],
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async { Ok(()) })
    }

    static WIDGET_RELATIONS: &[Relation<Widget>] = &[
        Relation { name: "readings", load: load_noop },
        Relation { name: "tags", load: load_noop },
    ];

    impl Related for Widget {
        fn relations() -> &'static [Relation<Widget>] {
            WIDGET_RELATIONS
        }
    }
}
