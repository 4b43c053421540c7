//! The entity contract
//!
//! An entity is a plain record persisted in one table, identified by a
//! single key column. The trait exposes just enough metadata for the
//! generic layer to render SQL and evaluate filters in memory: the table
//! and column names, the key, an optional optimistic-concurrency version
//! token, and a by-name field accessor.
//!
//! The `field` method is an explicit per-type mapping table: each entity
//! lists its own `column name -> value` arms once, and both SQL parameter
//! binding and in-memory filter/sort evaluation read through it. There is
//! no runtime reflection anywhere in the layer.

use crate::value::Value;

/// A typed record persisted in the store
///
/// # Example
///
/// ```
/// use core_query::{Entity, Value};
///
/// #[derive(Clone)]
/// struct Device {
///     id: i64,
///     name: String,
///     version: i64,
/// }
///
/// impl Entity for Device {
///     fn table_name() -> &'static str { "devices" }
///     fn key_column() -> &'static str { "id" }
///     fn columns() -> &'static [&'static str] { &["id", "name", "version"] }
///     fn key(&self) -> Value { Value::Int(self.id) }
///     fn field(&self, column: &str) -> Option<Value> {
///         match column {
///             "id" => Some(Value::Int(self.id)),
///             "name" => Some(Value::Text(self.name.clone())),
///             "version" => Some(Value::Int(self.version)),
///             _ => None,
///         }
///     }
///     fn version_column() -> Option<&'static str> { Some("version") }
///     fn version(&self) -> Option<i64> { Some(self.version) }
///     fn set_version(&mut self, v: i64) { self.version = v; }
/// }
/// ```
pub trait Entity: Clone + Send + Sync + Unpin + 'static {
    /// Table this entity is persisted in
    fn table_name() -> &'static str;

    /// Name of the identity column
    fn key_column() -> &'static str;

    /// All persisted columns, including the key and version columns
    fn columns() -> &'static [&'static str];

    /// The identity value of this record
    fn key(&self) -> Value;

    /// Value of the named column, `None` for undeclared columns
    fn field(&self, column: &str) -> Option<Value>;

    /// Version column used for optimistic conflict detection, if any
    ///
    /// Entities without a version column update and delete by key alone
    /// and never report concurrency conflicts.
    fn version_column() -> Option<&'static str> {
        None
    }

    /// Current version token, when the entity is versioned
    fn version(&self) -> Option<i64> {
        None
    }

    /// Adopts a reloaded version token after conflict reconciliation
    fn set_version(&mut self, _version: i64) {}

    /// Whether the entity declares the named column
    fn has_column(column: &str) -> bool {
        Self::columns().contains(&column)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::Gizmo;
    use crate::{Entity, Value};

    #[test]
    fn field_accessor_covers_declared_columns() {
        let gizmo = Gizmo::new(1, "probe", 10);
        for column in Gizmo::columns() {
            assert!(gizmo.field(column).is_some(), "no accessor for {column}");
        }
        assert_eq!(gizmo.field("no_such_column"), None);
    }

    #[test]
    fn key_matches_key_column_field() {
        let gizmo = Gizmo::new(42, "probe", 10);
        assert_eq!(gizmo.key(), Value::Int(42));
        assert_eq!(gizmo.field(Gizmo::key_column()), Some(Value::Int(42)));
    }

    #[test]
    fn has_column_checks_declared_set() {
        assert!(Gizmo::has_column("name"));
        assert!(!Gizmo::has_column("undeclared"));
    }
}
