//! Paged queries and relation-aware reads
//!
//! Two evaluation strategies exist for the same logical operation, chosen
//! explicitly by the caller:
//!
//! - [`EvalMode::Store`]: filter, order, count and slice are rendered to
//!   SQL and run inside PostgreSQL. Requires a translatable specification
//!   (condition trees and column sort keys, no closures).
//! - [`EvalMode::InMemory`]: the whole table is materialized and the
//!   kernel pipeline evaluates the specification in memory. The only
//!   option for closure filters and extractor sort keys; cost scales with
//!   the table.
//!
//! For a fixed snapshot and a translatable specification both modes return
//! identical items, totals and page counts.

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use core_query::{pipeline, Entity, Filter, QuerySpec, TableInfo};

use crate::error::StoreError;
use crate::relations::{IncludePlan, Related};
use crate::repository::{cancellable, Repository};
use crate::sql;

/// Where a query specification is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvalMode {
    /// Push filter/sort/count/slice down to the store
    #[default]
    Store,
    /// Materialize, then evaluate with the kernel pipeline
    InMemory,
}

impl<T> Repository<T>
where
    T: Related + for<'r> FromRow<'r, PgRow>,
{
    /// Runs one paged read under the chosen evaluation mode
    ///
    /// Requested relations are attached to the returned page in declared
    /// order; relation names are validated before any round trip.
    pub async fn query_page(
        &self,
        spec: &QuerySpec<T>,
        mode: EvalMode,
        cancel: Option<&CancellationToken>,
    ) -> Result<TableInfo<T>, StoreError> {
        let plan = IncludePlan::<T>::build(&spec.relations)?;
        let mut table = match mode {
            EvalMode::Store => self.query_page_store(spec, cancel).await?,
            EvalMode::InMemory => self.query_page_memory(spec, cancel).await?,
        };
        plan.attach(self.pool(), &mut table.items).await?;
        Ok(table)
    }

    async fn query_page_store(
        &self,
        spec: &QuerySpec<T>,
        cancel: Option<&CancellationToken>,
    ) -> Result<TableInfo<T>, StoreError> {
        spec.validate_for_store()?;
        let condition = spec.filter.condition();

        // Count after filtering, before paging.
        let count = sql::count::<T>(condition);
        let count_args = sql::arguments(&count.binds)?;
        let total_items = cancellable(cancel, async {
            let row = sqlx::query_with(&count.sql, count_args)
                .fetch_one(self.pool())
                .await?;
            let count: i64 = row.try_get(0).map_err(StoreError::from)?;
            Ok(count as u64)
        })
        .await?;
        let page_count = spec.pager.page_count(total_items);

        let select = sql::select_page::<T>(condition, spec.sorter.as_ref(), &spec.pager);
        let select_args = sql::arguments(&select.binds)?;
        let items = cancellable(cancel, async {
            sqlx::query_as_with::<_, T, _>(&select.sql, select_args)
                .fetch_all(self.pool())
                .await
                .map_err(StoreError::from)
        })
        .await?;

        debug!(
            table = T::table_name(),
            total_items,
            page_count,
            page = spec.pager.index(),
            returned = items.len(),
            "evaluated query at the store"
        );

        Ok(TableInfo {
            items,
            total_items,
            page_count,
        })
    }

    async fn query_page_memory(
        &self,
        spec: &QuerySpec<T>,
        cancel: Option<&CancellationToken>,
    ) -> Result<TableInfo<T>, StoreError> {
        spec.validate()?;
        let statement = sql::select_all::<T>();
        let args = sql::arguments(&statement.binds)?;
        let rows = cancellable(cancel, async {
            sqlx::query_as_with::<_, T, _>(&statement.sql, args)
                .fetch_all(self.pool())
                .await
                .map_err(StoreError::from)
        })
        .await?;
        Ok(pipeline::paginate(rows, spec)?)
    }

    /// Point lookup with eagerly attached relations
    pub async fn find_with_relations(
        &self,
        filter: &Filter<T>,
        relations: &[String],
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<T>, StoreError> {
        let plan = IncludePlan::<T>::build(relations)?;
        let Some(entity) = self.get(filter, cancel).await? else {
            return Ok(None);
        };
        let mut batch = [entity];
        plan.attach(self.pool(), &mut batch).await?;
        let [entity] = batch;
        Ok(Some(entity))
    }

    /// All matching rows with eagerly attached relations, unpaged
    pub async fn list_with_relations(
        &self,
        filter: &Filter<T>,
        relations: &[String],
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<T>, StoreError> {
        filter.validate()?;
        let plan = IncludePlan::<T>::build(relations)?;

        let mut rows = if filter.is_translatable() {
            let statement = sql::select_where::<T>(filter.condition());
            let args = sql::arguments(&statement.binds)?;
            cancellable(cancel, async {
                sqlx::query_as_with::<_, T, _>(&statement.sql, args)
                    .fetch_all(self.pool())
                    .await
                    .map_err(StoreError::from)
            })
            .await?
        } else {
            let statement = sql::select_all::<T>();
            let args = sql::arguments(&statement.binds)?;
            let all = cancellable(cancel, async {
                sqlx::query_as_with::<_, T, _>(&statement.sql, args)
                    .fetch_all(self.pool())
                    .await
                    .map_err(StoreError::from)
            })
            .await?;
            let mut matched = Vec::with_capacity(all.len());
            for row in all {
                if filter.accepts(&row)? {
                    matched.push(row);
                }
            }
            matched
        };

        plan.attach(self.pool(), &mut rows).await?;
        Ok(rows)
    }
}
