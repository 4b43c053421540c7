//! SQL rendering for translatable query specifications
//!
//! The generic layer cannot use compile-time-checked query macros: the
//! statements depend on entity metadata and caller-built condition trees.
//! This module renders those into parameterized PostgreSQL text plus an
//! ordered bind list, and binds [`Value`]s onto runtime sqlx queries.
//!
//! Rendering is pure and fully unit-tested; execution lives in the
//! repository and executor modules.

use core_query::{Condition, Entity, Pager, Sorter, Value};
use sqlx::postgres::PgArguments;
use sqlx::Arguments;

use crate::error::StoreError;

/// A rendered statement: SQL text plus positional binds, in order
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<Value>,
}

impl Statement {
    fn new(sql: String, binds: Vec<Value>) -> Self {
        Self { sql, binds }
    }
}

fn placeholder(binds: &mut Vec<Value>, value: Value) -> String {
    binds.push(value);
    format!("${}", binds.len())
}

/// Renders a condition tree into `sql`, appending binds positionally
///
/// Sub-expressions are parenthesized so operator precedence never depends
/// on the tree shape.
fn render_condition(condition: &Condition, sql: &mut String, binds: &mut Vec<Value>) {
    match condition {
        Condition::Eq(c, v) => {
            sql.push_str(c);
            sql.push_str(" = ");
            let p = placeholder(binds, v.clone());
            sql.push_str(&p);
        }
        Condition::Ne(c, v) => {
            sql.push_str(c);
            sql.push_str(" <> ");
            let p = placeholder(binds, v.clone());
            sql.push_str(&p);
        }
        Condition::Lt(c, v) => {
            sql.push_str(c);
            sql.push_str(" < ");
            let p = placeholder(binds, v.clone());
            sql.push_str(&p);
        }
        Condition::Le(c, v) => {
            sql.push_str(c);
            sql.push_str(" <= ");
            let p = placeholder(binds, v.clone());
            sql.push_str(&p);
        }
        Condition::Gt(c, v) => {
            sql.push_str(c);
            sql.push_str(" > ");
            let p = placeholder(binds, v.clone());
            sql.push_str(&p);
        }
        Condition::Ge(c, v) => {
            sql.push_str(c);
            sql.push_str(" >= ");
            let p = placeholder(binds, v.clone());
            sql.push_str(&p);
        }
        Condition::Like(c, pattern) => {
            sql.push_str(c);
            sql.push_str(" LIKE ");
            let p = placeholder(binds, Value::Text(pattern.clone()));
            sql.push_str(&p);
        }
        Condition::In(c, values) => {
            if values.is_empty() {
                // An empty IN list matches nothing.
                sql.push_str("FALSE");
                return;
            }
            sql.push_str(c);
            sql.push_str(" IN (");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                let p = placeholder(binds, value.clone());
                sql.push_str(&p);
            }
            sql.push(')');
        }
        Condition::IsNull(c) => {
            sql.push_str(c);
            sql.push_str(" IS NULL");
        }
        Condition::IsNotNull(c) => {
            sql.push_str(c);
            sql.push_str(" IS NOT NULL");
        }
        Condition::And(parts) => render_composite(parts, " AND ", "TRUE", sql, binds),
        Condition::Or(parts) => render_composite(parts, " OR ", "FALSE", sql, binds),
        Condition::Not(inner) => {
            sql.push_str("NOT (");
            render_condition(inner, sql, binds);
            sql.push(')');
        }
    }
}

fn render_composite(
    parts: &[Condition],
    joiner: &str,
    empty: &str,
    sql: &mut String,
    binds: &mut Vec<Value>,
) {
    if parts.is_empty() {
        sql.push_str(empty);
        return;
    }
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            sql.push_str(joiner);
        }
        sql.push('(');
        render_condition(part, sql, binds);
        sql.push(')');
    }
}

fn where_clause(condition: Option<&Condition>, sql: &mut String, binds: &mut Vec<Value>) {
    if let Some(condition) = condition {
        sql.push_str(" WHERE ");
        render_condition(condition, sql, binds);
    }
}

fn order_clause<T: Entity>(sorter: Option<&Sorter<T>>, sql: &mut String) {
    let Some(sorter) = sorter else { return };
    let Some((primary, secondary)) = sorter.columns() else {
        return;
    };
    // PostgreSQL defaults to NULLS LAST under ASC and NULLS FIRST under
    // DESC; the in-memory comparator sorts NULL below everything, so the
    // placement is pinned explicitly to keep both modes identical.
    let direction = if sorter.is_ascending() {
        "ASC NULLS FIRST"
    } else {
        "DESC NULLS LAST"
    };
    sql.push_str(" ORDER BY ");
    sql.push_str(primary);
    sql.push(' ');
    sql.push_str(direction);
    if let Some(secondary) = secondary {
        sql.push_str(", ");
        sql.push_str(secondary);
        sql.push(' ');
        sql.push_str(direction);
    }
}

fn column_list<T: Entity>() -> String {
    T::columns().join(", ")
}

/// `SELECT` of one page: filter, order, count-free slice
pub fn select_page<T: Entity>(
    condition: Option<&Condition>,
    sorter: Option<&Sorter<T>>,
    pager: &Pager,
) -> Statement {
    let mut binds = Vec::new();
    let mut sql = format!("SELECT {} FROM {}", column_list::<T>(), T::table_name());
    where_clause(condition, &mut sql, &mut binds);
    order_clause(sorter, &mut sql);

    // Pager::new bounds both the size and the skip to the i64 range.
    let limit = placeholder(&mut binds, Value::Int(pager.size() as i64));
    sql.push_str(" LIMIT ");
    sql.push_str(&limit);
    if pager.skip() > 0 {
        let offset = placeholder(&mut binds, Value::Int(pager.skip() as i64));
        sql.push_str(" OFFSET ");
        sql.push_str(&offset);
    }
    Statement::new(sql, binds)
}

/// `SELECT COUNT(*)` with the same filter as the page select
pub fn count<T: Entity>(condition: Option<&Condition>) -> Statement {
    let mut binds = Vec::new();
    let mut sql = format!("SELECT COUNT(*) FROM {}", T::table_name());
    where_clause(condition, &mut sql, &mut binds);
    Statement::new(sql, binds)
}

/// Full-table select used by the in-memory evaluation mode
pub fn select_all<T: Entity>() -> Statement {
    Statement::new(
        format!("SELECT {} FROM {}", column_list::<T>(), T::table_name()),
        Vec::new(),
    )
}

/// Filtered select without paging; used by list reads
pub fn select_where<T: Entity>(condition: Option<&Condition>) -> Statement {
    let mut binds = Vec::new();
    let mut sql = format!("SELECT {} FROM {}", column_list::<T>(), T::table_name());
    where_clause(condition, &mut sql, &mut binds);
    Statement::new(sql, binds)
}

/// Point lookup: first matching row under store default order
pub fn select_first<T: Entity>(condition: Option<&Condition>) -> Statement {
    let mut statement = select_where::<T>(condition);
    statement.sql.push_str(" LIMIT 1");
    statement
}

/// Rows whose key is in the given set; used by relation loaders and
/// conflict reconciliation
pub fn select_by_keys<T: Entity>(keys: &[Value]) -> Statement {
    let mut binds = Vec::new();
    let mut sql = format!("SELECT {} FROM {}", column_list::<T>(), T::table_name());
    let condition = Condition::In(T::key_column().to_string(), keys.to_vec());
    sql.push_str(" WHERE ");
    render_condition(&condition, &mut sql, &mut binds);
    Statement::new(sql, binds)
}

/// `INSERT` of one staged entity, all declared columns
pub fn insert<T: Entity>(entity: &T) -> Statement {
    let mut binds = Vec::new();
    let mut values = String::new();
    for (i, column) in T::columns().iter().enumerate() {
        if i > 0 {
            values.push_str(", ");
        }
        let value = entity.field(column).unwrap_or(Value::Null);
        let p = placeholder(&mut binds, value);
        values.push_str(&p);
    }
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        T::table_name(),
        column_list::<T>(),
        values
    );
    Statement::new(sql, binds)
}

/// Full-value `UPDATE` by key
///
/// Versioned entities bump their token and guard the `WHERE` with the old
/// one, so a stale token updates zero rows and reports as a conflict.
pub fn update_by_key<T: Entity>(entity: &T) -> Statement {
    let mut binds = Vec::new();
    let mut assignments = String::new();
    let version_column = T::version_column();
    let old_version = entity.version();

    for column in T::columns() {
        if *column == T::key_column() {
            continue;
        }
        if !assignments.is_empty() {
            assignments.push_str(", ");
        }
        assignments.push_str(column);
        assignments.push_str(" = ");
        let value = if version_column == Some(*column) {
            Value::Int(old_version.unwrap_or(0) + 1)
        } else {
            entity.field(column).unwrap_or(Value::Null)
        };
        let p = placeholder(&mut binds, value);
        assignments.push_str(&p);
    }

    let mut sql = format!("UPDATE {} SET {} WHERE ", T::table_name(), assignments);
    sql.push_str(T::key_column());
    sql.push_str(" = ");
    let key = placeholder(&mut binds, entity.key());
    sql.push_str(&key);
    if let (Some(column), Some(version)) = (version_column, old_version) {
        sql.push_str(" AND ");
        sql.push_str(column);
        sql.push_str(" = ");
        let p = placeholder(&mut binds, Value::Int(version));
        sql.push_str(&p);
    }
    Statement::new(sql, binds)
}

/// `DELETE` by key, version-guarded for versioned entities
pub fn delete_by_key<T: Entity>(entity: &T) -> Statement {
    let mut binds = Vec::new();
    let mut sql = format!("DELETE FROM {} WHERE ", T::table_name());
    sql.push_str(T::key_column());
    sql.push_str(" = ");
    let key = placeholder(&mut binds, entity.key());
    sql.push_str(&key);
    if let (Some(column), Some(version)) = (T::version_column(), entity.version()) {
        sql.push_str(" AND ");
        sql.push_str(column);
        sql.push_str(" = ");
        let p = placeholder(&mut binds, Value::Int(version));
        sql.push_str(&p);
    }
    Statement::new(sql, binds)
}

/// Predicate-scoped `DELETE` without materializing rows
pub fn delete_where<T: Entity>(condition: &Condition) -> Statement {
    let mut binds = Vec::new();
    let mut sql = format!("DELETE FROM {} WHERE ", T::table_name());
    render_condition(condition, &mut sql, &mut binds);
    Statement::new(sql, binds)
}

/// Predicate-scoped field assignment in one statement
///
/// Versioned entities get their token bumped alongside the assignments so
/// concurrent savers still detect the change.
pub fn bulk_update_where<T: Entity>(
    condition: &Condition,
    assignments: &[(&str, Value)],
) -> Statement {
    let mut binds = Vec::new();
    let mut set = String::new();
    for (column, value) in assignments {
        if !set.is_empty() {
            set.push_str(", ");
        }
        set.push_str(column);
        set.push_str(" = ");
        let p = placeholder(&mut binds, value.clone());
        set.push_str(&p);
    }
    if let Some(version_column) = T::version_column() {
        if !set.is_empty() {
            set.push_str(", ");
        }
        set.push_str(version_column);
        set.push_str(" = ");
        set.push_str(version_column);
        set.push_str(" + 1");
    }
    let mut sql = format!("UPDATE {} SET {} WHERE ", T::table_name(), set);
    render_condition(condition, &mut sql, &mut binds);
    Statement::new(sql, binds)
}

/// Multi-row `INSERT ... ON CONFLICT (key) DO UPDATE` for one chunk
pub fn upsert_many<T: Entity>(entities: &[T]) -> Statement {
    let mut binds = Vec::new();
    let mut rows = String::new();
    for (r, entity) in entities.iter().enumerate() {
        if r > 0 {
            rows.push_str(", ");
        }
        rows.push('(');
        for (i, column) in T::columns().iter().enumerate() {
            if i > 0 {
                rows.push_str(", ");
            }
            let value = entity.field(column).unwrap_or(Value::Null);
            let p = placeholder(&mut binds, value);
            rows.push_str(&p);
        }
        rows.push(')');
    }

    let updates: Vec<String> = T::columns()
        .iter()
        .filter(|c| **c != T::key_column())
        .map(|c| format!("{} = EXCLUDED.{}", c, c))
        .collect();
    let resolution = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    let sql = format!(
        "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({}) {}",
        T::table_name(),
        column_list::<T>(),
        rows,
        T::key_column(),
        resolution
    );
    Statement::new(sql, binds)
}

/// Encodes a statement's binds as PostgreSQL arguments, in order
///
/// Used with `sqlx::query_with` and friends; values are encoded owned so
/// the arguments outlive the statement.
pub fn arguments(binds: &[Value]) -> Result<PgArguments, StoreError> {
    let mut args = PgArguments::default();
    for value in binds {
        let added = match value {
            Value::Null => args.add(Option::<String>::None),
            Value::Bool(v) => args.add(*v),
            Value::Int(v) => args.add(*v),
            Value::Float(v) => args.add(*v),
            Value::Decimal(v) => args.add(*v),
            Value::Text(v) => args.add(v.clone()),
            Value::Uuid(v) => args.add(*v),
            Value::Date(v) => args.add(*v),
            Value::Timestamp(v) => args.add(*v),
        };
        added.map_err(|e| StoreError::QueryFailed(format!("failed to bind parameter: {}", e)))?;
    }
    Ok(args)
}
