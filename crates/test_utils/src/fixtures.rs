//! Pre-built Test Fixtures
//!
//! Provides a concrete entity pair, `Device` and its child `Reading`,
//! wired through the full store contract: column metadata, version
//! tokens, and an eager-loaded relation. Tests across the workspace use
//! these instead of inventing ad-hoc entities.

use futures::future::BoxFuture;
use sqlx::PgPool;
use std::collections::HashMap;

use core_query::{Entity, Value};
use infra_store::{Related, Relation, StoreError};

/// Schema for the fixture tables, applied by the test database harness
pub const DEVICE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS devices (
    id      BIGINT PRIMARY KEY,
    name    TEXT NOT NULL,
    rating  BIGINT NOT NULL,
    label   TEXT,
    version BIGINT NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS readings (
    id        BIGINT PRIMARY KEY,
    device_id BIGINT NOT NULL REFERENCES devices (id) ON DELETE CASCADE,
    value     BIGINT NOT NULL
);
"#;

/// A child record eager-loaded onto its parent device
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Reading {
    pub id: i64,
    pub device_id: i64,
    pub value: i64,
}

/// The fixture entity used throughout the test suite
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub rating: i64,
    pub label: Option<String>,
    pub version: i64,
    #[sqlx(skip)]
    pub readings: Vec<Reading>,
}

impl Device {
    pub fn new(id: i64, name: impl Into<String>, rating: i64) -> Self {
        Self {
            id,
            name: name.into(),
            rating,
            label: None,
            version: 1,
            readings: Vec::new(),
        }
    }
}

impl Entity for Device {
    fn table_name() -> &'static str {
        "devices"
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

fn load_readings<'a>(
    pool: &'a PgPool,
    parents: &'a mut [Device],
) -> BoxFuture<'a, Result<(), StoreError>> {
    Box::pin(async move {
        let keys: Vec<i64> = parents.iter().map(|d| d.id).collect();
        let rows: Vec<Reading> = sqlx::query_as(
            "SELECT id, device_id, value FROM readings WHERE device_id = ANY($1) ORDER BY id",
        )
        .bind(&keys)
        .fetch_all(pool)
        .await?;

        let mut by_parent: HashMap<i64, Vec<Reading>> = HashMap::new();
        for row in rows {
            by_parent.entry(row.device_id).or_default().push(row);
        }
        for parent in parents {
            parent.readings = by_parent.remove(&parent.id).unwrap_or_default();
        }
        Ok(())
    })
}

static DEVICE_RELATIONS: &[Relation<Device>] =
    &[Relation { name: "readings", load: load_readings }];

impl Related for Device {
    fn relations() -> &'static [Relation<Device>] {
        DEVICE_RELATIONS
    }
}

/// Creates `count` devices with deterministic names and varied ratings
///
/// Names are `device-001`, `device-002`, ... so lexicographic name order
/// matches id order. Ratings cycle `0..7`; every third device carries a
/// label.
pub fn sample_devices(count: i64) -> Vec<Device> {
    (1..=count)
        .map(|i| {
            let mut device = Device::new(i, format!("device-{i:03}"), i % 7);
            if i % 3 == 0 {
                device.label = Some(format!("batch-{}", i / 3));
            }
            device
        })
        .collect()
}
