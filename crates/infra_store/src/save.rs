//! Concurrency-safe save
//!
//! Staged changes commit through a retry loop that absorbs
//! optimistic-concurrency conflicts: a commit attempt that finds stale
//! version tokens rolls back, the conflicting rows are reloaded so the
//! pending entries adopt the current tokens (the caller's new field values
//! are kept), and the commit is attempted again. Non-concurrency errors
//! propagate immediately without reconciliation.
//!
//! The loop is generic over the [`Commit`] seam so the state machine can be
//! exercised without a database; the PostgreSQL implementation lives in the
//! repository module.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use core_query::{ChangeKind, Entity, Value};

use crate::error::StoreError;

/// One staged mutation
#[derive(Debug, Clone)]
pub enum Pending<T> {
    Insert(T),
    Update(T),
    Delete(T),
}

impl<T: Entity> Pending<T> {
    pub fn entity(&self) -> &T {
        match self {
            Pending::Insert(e) | Pending::Update(e) | Pending::Delete(e) => e,
        }
    }

    pub fn key(&self) -> Value {
        self.entity().key()
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Pending::Insert(_) => ChangeKind::Added,
            Pending::Update(_) => ChangeKind::Modified,
            Pending::Delete(_) => ChangeKind::Removed,
        }
    }
}

/// Staged-but-uncommitted changes, in staging order
#[derive(Debug, Clone, Default)]
pub struct ChangeSet<T> {
    entries: Vec<Pending<T>>,
}

impl<T: Entity> ChangeSet<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn push(&mut self, pending: Pending<T>) {
        self.entries.push(pending);
    }

    pub fn entries(&self) -> &[Pending<T>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Outcome of one commit attempt
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// All entries applied; the count is affected rows
    Applied(u64),
    /// The transaction rolled back; these keys carried stale version tokens
    Conflicts(Vec<Value>),
}

/// The commit seam of the save loop
///
/// `apply` must be transactional: either every entry applies or none do,
/// with every stale-token row reported in the conflict list. `reload`
/// fetches the current persisted state of one row by key.
#[async_trait]
pub trait Commit<T: Entity>: Send {
    async fn apply(&mut self, pending: &[Pending<T>]) -> Result<CommitOutcome, StoreError>;
    async fn reload(&mut self, key: &Value) -> Result<Option<T>, StoreError>;
}

/// Bounds and backoff for the save loop
///
/// The default caps attempts and backs off exponentially between retries;
/// [`RetryPolicy::unbounded`] removes the cap and retries until the commit
/// succeeds or a non-concurrency error occurs, at the cost of looping
/// forever under a permanently-conflicting writer.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(50),
            base_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Retry forever, as the pre-hardening behavior did
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            ..Self::default()
        }
    }

    /// No sleeping between attempts; used by tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(6);
        self.base_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Commits a change set, reconciling and retrying on conflicts
///
/// On success the change set is cleared and the affected row count
/// returned. The cancellation token is checked between attempts only; an
/// in-flight commit is never interrupted mid-transaction.
pub async fn save_with_retry<T, C>(
    changes: &mut ChangeSet<T>,
    committer: &mut C,
    policy: &RetryPolicy,
    cancel: Option<&CancellationToken>,
) -> Result<u64, StoreError>
where
    T: Entity,
    C: Commit<T>,
{
    if changes.is_empty() {
        return Ok(0);
    }

    let mut attempts = 0u32;
    loop {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(StoreError::Cancelled);
        }
        attempts += 1;

        match committer.apply(changes.entries()).await? {
            CommitOutcome::Applied(count) => {
                debug!(
                    table = T::table_name(),
                    entries = changes.len(),
                    affected = count,
                    attempts,
                    "change set committed"
                );
                changes.clear();
                return Ok(count);
            }
            CommitOutcome::Conflicts(keys) => {
                warn!(
                    table = T::table_name(),
                    conflicts = keys.len(),
                    attempts,
                    "optimistic concurrency conflict, reconciling"
                );
                if policy.max_attempts.is_some_and(|max| attempts >= max) {
                    return Err(StoreError::Concurrency { attempts });
                }
                reconcile(changes, committer, &keys).await?;
                if changes.is_empty() {
                    // Every conflicting entry turned out to be a delete of
                    // an already-deleted row.
                    return Ok(0);
                }
                let backoff = policy.backoff(attempts);
                if !backoff.is_zero() {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Reloads each conflicting row and adopts its current version token
///
/// The pending entry keeps the caller's new field values; only the stale
/// token is replaced. An update of a vanished row is fatal; a delete of a
/// vanished row is already done and drops out of the change set.
async fn reconcile<T, C>(
    changes: &mut ChangeSet<T>,
    committer: &mut C,
    keys: &[Value],
) -> Result<(), StoreError>
where
    T: Entity,
    C: Commit<T>,
{
    for key in keys {
        let Some(position) = changes.entries.iter().position(|p| p.key().same_as(key)) else {
            continue;
        };
        let current = committer.reload(key).await?;
        match (&mut changes.entries[position], current) {
            (Pending::Update(entity) | Pending::Delete(entity), Some(row)) => {
                if let Some(version) = row.version() {
                    entity.set_version(version);
                }
            }
            (Pending::Update(_), None) => {
                return Err(StoreError::not_found(T::table_name(), key));
            }
            (Pending::Delete(_), None) => {
                changes.entries.remove(position);
            }
            (Pending::Insert(_), _) => {}
        }
    }
    Ok(())
}
