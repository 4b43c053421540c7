//! Raw query execution
//!
//! Escape hatch for statements the generic layer cannot express: the
//! caller supplies parameterized SQL text and positional [`Value`]
//! parameters, and each result row maps onto a typed record (via its
//! derived `FromRow` mapper) or a scalar.
//!
//! Each call acquires one pooled connection scoped to the call; the
//! connection returns to the pool on every exit path, including errors,
//! when the guard drops.

use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use tracing::debug;

use core_query::Value;

use crate::error::StoreError;
use crate::sql;

/// Runs a parameterized query, mapping each row onto a record type
///
/// Parameters bind positionally in argument order. Column/field matching
/// is the record's `FromRow` mapping: columns without a matching field and
/// fields without a matching column behave as that derive configures
/// (`#[sqlx(default)]` keeps the field's default).
///
/// # Errors
///
/// `StoreError::QueryFailed` for malformed SQL or connectivity failure;
/// `StoreError::Mapping` when a row cannot be decoded into the target.
pub async fn execute_raw<R>(
    pool: &PgPool,
    sql_text: &str,
    params: &[Value],
) -> Result<Vec<R>, StoreError>
where
    R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let args = sql::arguments(params)?;
    let mut conn = pool.acquire().await?;
    let rows = sqlx::query_as_with::<_, R, _>(sql_text, args)
        .fetch_all(&mut *conn)
        .await?;
    debug!(rows = rows.len(), "raw query executed");
    Ok(rows)
}

/// Runs a parameterized query returning one scalar per row, taken from the
/// first column
pub async fn execute_raw_scalar<S>(
    pool: &PgPool,
    sql_text: &str,
    params: &[Value],
) -> Result<Vec<S>, StoreError>
where
    S: for<'r> sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres> + Send + Unpin,
{
    let args = sql::arguments(params)?;
    let mut conn = pool.acquire().await?;
    let rows = sqlx::query_with(sql_text, args)
        .fetch_all(&mut *conn)
        .await?;
    let mut scalars = Vec::with_capacity(rows.len());
    for row in rows {
        scalars.push(row.try_get::<S, _>(0)?);
    }
    Ok(scalars)
}
