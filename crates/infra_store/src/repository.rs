//! Generic repository over one entity table
//!
//! A [`Repository`] stages mutations in a change set and commits them
//! through the concurrency-safe save loop. Reads are always detached row
//! copies. Predicate-scoped bulk operations (`delete_where`,
//! `bulk_update_where`, `bulk_upsert`) bypass the change set and execute
//! directly at the store.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use core_query::{ChangeObserver, Entity, Filter, NullObserver, Value};

use crate::error::StoreError;
use crate::save::{self, ChangeSet, Commit, CommitOutcome, Pending, RetryPolicy};
use crate::sql;

/// Rows bound per statement stay under PostgreSQL's parameter limit
const MAX_BIND_PARAMS: usize = 60_000;

/// Result of one batch within a chunked range operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Entities staged in this batch
    pub staged: usize,
    /// Rows the batch's save reported
    pub affected: u64,
}

/// Result of a chunked range operation
///
/// Each batch commits independently; on failure, earlier batches stay
/// committed and the outcome returned so far is authoritative. Callers
/// needing atomicity across the whole range must use the unchunked
/// variants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkedOutcome {
    pub batches: Vec<BatchOutcome>,
    pub total_affected: u64,
}

impl ChunkedOutcome {
    fn record(&mut self, staged: usize, affected: u64) {
        self.batches.push(BatchOutcome { staged, affected });
        self.total_affected += affected;
    }
}

/// Generic CRUD store for one entity type
pub struct Repository<T: Entity> {
    pool: PgPool,
    changes: ChangeSet<T>,
    observer: Arc<dyn ChangeObserver>,
    retry: RetryPolicy,
}

impl<T> Repository<T>
where
    T: Entity + for<'r> FromRow<'r, PgRow>,
{
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            changes: ChangeSet::new(),
            observer: Arc::new(NullObserver),
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the change observer notified on every persisted change
    pub fn with_observer(mut self, observer: Arc<dyn ChangeObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Staged-but-uncommitted entries
    pub fn pending(&self) -> usize {
        self.changes.len()
    }

    /// Stages an entity for insertion, returning it unchanged
    pub async fn add(&mut self, entity: T, save_immediately: bool) -> Result<T, StoreError> {
        self.changes.push(Pending::Insert(entity.clone()));
        if save_immediately {
            self.save_changes(None).await?;
        }
        Ok(entity)
    }

    /// Stages a batch for insertion
    ///
    /// Returns the saved row count when saving immediately, otherwise the
    /// staged count (the batch is assumed to be committed eventually).
    pub async fn add_range(
        &mut self,
        entities: Vec<T>,
        save_immediately: bool,
    ) -> Result<u64, StoreError> {
        let staged = entities.len() as u64;
        for entity in entities {
            self.changes.push(Pending::Insert(entity));
        }
        if save_immediately {
            self.save_changes(None).await
        } else {
            Ok(staged)
        }
    }

    /// Point lookup: first match under store default ordering
    ///
    /// Callers needing a deterministic result must supply a uniquely
    /// matching filter. Translatable filters push down with `LIMIT 1`;
    /// closure predicates scan the table in memory.
    pub async fn get(
        &self,
        filter: &Filter<T>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<T>, StoreError> {
        filter.validate()?;
        if filter.is_translatable() {
            let statement = sql::select_first::<T>(filter.condition());
            let args = sql::arguments(&statement.binds)?;
            let row = cancellable(cancel, async {
                sqlx::query_as_with::<_, T, _>(&statement.sql, args)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(StoreError::from)
            })
            .await?;
            return Ok(row);
        }

        let statement = sql::select_all::<T>();
        let rows = cancellable(cancel, async {
            sqlx::query_as_with::<_, T, _>(&statement.sql, sql::arguments(&statement.binds)?)
                .fetch_all(&self.pool)
                .await
                .map_err(StoreError::from)
        })
        .await?;
        for row in rows {
            if filter.accepts(&row)? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    /// Stages a full-value update
    ///
    /// Reports 1 affected row when not saving immediately, on the
    /// assumption the staged change eventually commits.
    pub async fn update(&mut self, entity: T, save_immediately: bool) -> Result<u64, StoreError> {
        self.changes.push(Pending::Update(entity));
        if save_immediately {
            self.save_changes(None).await
        } else {
            Ok(1)
        }
    }

    pub async fn update_range(
        &mut self,
        entities: Vec<T>,
        save_immediately: bool,
    ) -> Result<u64, StoreError> {
        let staged = entities.len() as u64;
        for entity in entities {
            self.changes.push(Pending::Update(entity));
        }
        if save_immediately {
            self.save_changes(None).await
        } else {
            Ok(staged)
        }
    }

    /// Updates in fixed-size batches, each batch with its own save
    ///
    /// Batches follow input order. A failed batch aborts the remainder;
    /// earlier batches stay committed (see [`ChunkedOutcome`]).
    pub async fn update_range_chunked(
        &mut self,
        entities: Vec<T>,
        chunk_size: NonZeroUsize,
        save_immediately: bool,
    ) -> Result<ChunkedOutcome, StoreError> {
        self.range_chunked(entities, chunk_size, save_immediately, Pending::Update)
            .await
    }

    /// Stages a delete of a loaded entity
    pub async fn delete(&mut self, entity: T, save_immediately: bool) -> Result<u64, StoreError> {
        self.changes.push(Pending::Delete(entity));
        if save_immediately {
            self.save_changes(None).await
        } else {
            Ok(1)
        }
    }

    pub async fn delete_range(
        &mut self,
        entities: Vec<T>,
        save_immediately: bool,
    ) -> Result<u64, StoreError> {
        let staged = entities.len() as u64;
        for entity in entities {
            self.changes.push(Pending::Delete(entity));
        }
        if save_immediately {
            self.save_changes(None).await
        } else {
            Ok(staged)
        }
    }

    pub async fn delete_range_chunked(
        &mut self,
        entities: Vec<T>,
        chunk_size: NonZeroUsize,
        save_immediately: bool,
    ) -> Result<ChunkedOutcome, StoreError> {
        self.range_chunked(entities, chunk_size, save_immediately, Pending::Delete)
            .await
    }

    async fn range_chunked(
        &mut self,
        entities: Vec<T>,
        chunk_size: NonZeroUsize,
        save_immediately: bool,
        stage: fn(T) -> Pending<T>,
    ) -> Result<ChunkedOutcome, StoreError> {
        let mut outcome = ChunkedOutcome::default();
        let mut remaining = entities;
        while !remaining.is_empty() {
            let rest = remaining.split_off(chunk_size.get().min(remaining.len()));
            let batch = std::mem::replace(&mut remaining, rest);
            let staged = batch.len();
            for entity in batch {
                self.changes.push(stage(entity));
            }
            let affected = if save_immediately {
                self.save_changes(None).await?
            } else {
                staged as u64
            };
            outcome.record(staged, affected);
        }
        Ok(outcome)
    }

    /// Deletes every row matching the condition, store-side
    ///
    /// No rows are materialized and no per-row observer notification is
    /// emitted; version guards do not apply.
    pub async fn delete_where(&self, condition: &core_query::Condition) -> Result<u64, StoreError> {
        condition.validate::<T>()?;
        let statement = sql::delete_where::<T>(condition);
        let args = sql::arguments(&statement.binds)?;
        let result = sqlx::query_with(&statement.sql, args)
            .execute(&self.pool)
            .await?;
        debug!(
            table = T::table_name(),
            affected = result.rows_affected(),
            "predicate-scoped delete"
        );
        Ok(result.rows_affected())
    }

    /// Applies field assignments to every matching row in one statement
    ///
    /// Versioned entities get their token bumped so concurrent savers
    /// still detect the change. Rows are not loaded into memory.
    pub async fn bulk_update_where(
        &self,
        condition: &core_query::Condition,
        assignments: &[(&str, Value)],
    ) -> Result<u64, StoreError> {
        condition.validate::<T>()?;
        if assignments.is_empty() {
            // Rendering an empty SET list would ship malformed SQL.
            return Err(StoreError::QueryFailed(
                "bulk update requires at least one assignment".to_string(),
            ));
        }
        for (column, _) in assignments {
            if !T::has_column(column) {
                return Err(core_query::QueryError::unknown_column(*column).into());
            }
        }
        let statement = sql::bulk_update_where::<T>(condition, assignments);
        let args = sql::arguments(&statement.binds)?;
        let result = sqlx::query_with(&statement.sql, args)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Store-native bulk load: insert-or-update without change tracking
    ///
    /// Large batches are chunked to stay under the bind-parameter limit;
    /// each chunk is one statement.
    pub async fn bulk_upsert(&self, entities: &[T]) -> Result<u64, StoreError> {
        if entities.is_empty() {
            return Ok(0);
        }
        let rows_per_chunk = (MAX_BIND_PARAMS / T::columns().len().max(1)).max(1);
        let mut affected = 0u64;
        for chunk in entities.chunks(rows_per_chunk) {
            let statement = sql::upsert_many(chunk);
            let args = sql::arguments(&statement.binds)?;
            let result = sqlx::query_with(&statement.sql, args)
                .execute(&self.pool)
                .await?;
            affected += result.rows_affected();
        }
        Ok(affected)
    }

    /// Commits all staged changes through the concurrency-safe save loop
    ///
    /// Conflicting rows are reloaded and retried per the retry policy; on
    /// success the observer is notified once per persisted entry and the
    /// change set is cleared.
    pub async fn save_changes(
        &mut self,
        cancel: Option<&CancellationToken>,
    ) -> Result<u64, StoreError> {
        let notifications: Vec<(Value, core_query::ChangeKind)> = self
            .changes
            .entries()
            .iter()
            .map(|p| (p.key(), p.kind()))
            .collect();

        let mut committer = PgCommit {
            pool: self.pool.clone(),
        };
        let affected =
            save::save_with_retry(&mut self.changes, &mut committer, &self.retry, cancel).await?;

        for (key, kind) in &notifications {
            self.observer.entity_changed(T::table_name(), key, *kind);
        }
        Ok(affected)
    }
}

/// PostgreSQL implementation of the commit seam
///
/// All entries apply inside one transaction. A versioned update or delete
/// that affects zero rows marks its key as conflicting; any conflict rolls
/// the whole transaction back.
struct PgCommit {
    pool: PgPool,
}

#[async_trait]
impl<T> Commit<T> for PgCommit
where
    T: Entity + for<'r> FromRow<'r, PgRow>,
{
    async fn apply(&mut self, pending: &[Pending<T>]) -> Result<CommitOutcome, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        let mut affected = 0u64;
        let mut conflicts = Vec::new();
        for entry in pending {
            let statement = match entry {
                Pending::Insert(e) => sql::insert(e),
                Pending::Update(e) => sql::update_by_key(e),
                Pending::Delete(e) => sql::delete_by_key(e),
            };
            let args = sql::arguments(&statement.binds)?;
            let result = sqlx::query_with(&statement.sql, args)
                .execute(&mut *tx)
                .await?;
            let rows = result.rows_affected();
            if rows == 0 && !matches!(entry, Pending::Insert(_)) {
                // Stale version token or vanished row; reconciliation
                // decides which.
                conflicts.push(entry.key());
            } else {
                affected += rows;
            }
        }

        if conflicts.is_empty() {
            tx.commit()
                .await
                .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;
            Ok(CommitOutcome::Applied(affected))
        } else {
            tx.rollback()
                .await
                .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;
            Ok(CommitOutcome::Conflicts(conflicts))
        }
    }

    async fn reload(&mut self, key: &Value) -> Result<Option<T>, StoreError> {
        let statement = sql::select_by_keys::<T>(std::slice::from_ref(key));
        let args = sql::arguments(&statement.binds)?;
        let row = sqlx::query_as_with::<_, T, _>(&statement.sql, args)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

/// Races a store round trip against the caller's cancellation token
pub(crate) async fn cancellable<F, O>(
    cancel: Option<&CancellationToken>,
    operation: F,
) -> Result<O, StoreError>
where
    F: std::future::Future<Output = Result<O, StoreError>>,
{
    match cancel {
        None => operation.await,
        Some(token) => tokio::select! {
            _ = token.cancelled() => Err(StoreError::Cancelled),
            result = operation => result,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Widget;

    fn lazy_repo() -> Repository<Widget> {
        // connect_lazy builds a pool without touching the network; these
        // tests exercise staging logic only.
        let pool = PgPool::connect_lazy("postgres://localhost/unused").expect("lazy pool");
        Repository::new(pool)
    }

    #[tokio::test]
    async fn staged_mutations_accumulate_without_saving() {
        let mut repo = lazy_repo();

        let added = repo.add(Widget::new(1, "a", 1), false).await.unwrap();
        assert_eq!(added.id, 1);
        assert_eq!(repo.pending(), 1);

        let count = repo
            .add_range(vec![Widget::new(2, "b", 2), Widget::new(3, "c", 3)], false)
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(repo.pending(), 3);

        let affected = repo.update(Widget::new(2, "b2", 2), false).await.unwrap();
        assert_eq!(affected, 1);
        let affected = repo.delete(Widget::new(3, "c", 3), false).await.unwrap();
        assert_eq!(affected, 1);
        assert_eq!(repo.pending(), 5);
    }

    #[tokio::test]
    async fn unchunked_ranges_report_staged_counts() {
        let mut repo = lazy_repo();
        let widgets: Vec<Widget> = (1..=4).map(|i| Widget::new(i, "w", 0)).collect();
        assert_eq!(repo.update_range(widgets.clone(), false).await.unwrap(), 4);
        assert_eq!(repo.delete_range(widgets, false).await.unwrap(), 4);
        assert_eq!(repo.pending(), 8);
    }

    #[tokio::test]
    async fn chunked_update_splits_batches_in_input_order() {
        let mut repo = lazy_repo();
        let widgets: Vec<Widget> = (1..=23).map(|i| Widget::new(i, "w", 0)).collect();

        let outcome = repo
            .update_range_chunked(widgets, NonZeroUsize::new(10).unwrap(), false)
            .await
            .unwrap();

        let sizes: Vec<usize> = outcome.batches.iter().map(|b| b.staged).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
        assert_eq!(outcome.total_affected, 23);
    }

    #[tokio::test]
    async fn chunk_size_larger_than_input_is_one_batch() {
        let mut repo = lazy_repo();
        let widgets: Vec<Widget> = (1..=5).map(|i| Widget::new(i, "w", 0)).collect();
        let outcome = repo
            .delete_range_chunked(widgets, NonZeroUsize::new(100).unwrap(), false)
            .await
            .unwrap();
        assert_eq!(outcome.batches.len(), 1);
        assert_eq!(outcome.total_affected, 5);
    }

    #[tokio::test]
    async fn bulk_update_rejects_unknown_assignment_column() {
        let repo = lazy_repo();
        let error = repo
            .bulk_update_where(
                &core_query::Condition::eq("rating", 1i64),
                &[("bogus", Value::Int(0))],
            )
            .await
            .unwrap_err();
        assert!(matches!(error, StoreError::Spec(_)));
    }

    #[tokio::test]
    async fn bulk_update_rejects_empty_assignments() {
        let repo = lazy_repo();
        let error = repo
            .bulk_update_where(&core_query::Condition::eq("rating", 1i64), &[])
            .await
            .unwrap_err();
        assert!(matches!(error, StoreError::QueryFailed(_)));
    }

    #[tokio::test]
    async fn bulk_upsert_of_nothing_is_a_noop() {
        let repo = lazy_repo();
        assert_eq!(repo.bulk_upsert(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn save_of_empty_change_set_is_a_noop() {
        let mut repo = lazy_repo();
        assert_eq!(repo.save_changes(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cancellable_returns_cancelled_for_fired_token() {
        let token = CancellationToken::new();
        token.cancel();
        let result = cancellable(Some(&token), std::future::pending::<Result<(), StoreError>>())
            .await;
        assert!(matches!(result, Err(StoreError::Cancelled)));
    }

    #[tokio::test]
    async fn cancellable_passes_through_without_token() {
        let result = cancellable(None, async { Ok(7u64) }).await.unwrap();
        assert_eq!(result, 7);
    }
}
