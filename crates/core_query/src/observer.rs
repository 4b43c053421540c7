//! Change notification seam
//!
//! Every successful mutation notifies a [`ChangeObserver`] with the table,
//! key and kind of change. The repository calls the observer
//! unconditionally; whether notifications reach an audit sink, an event
//! bus, or nothing at all is a wiring decision made at deployment.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::value::Value;

/// What happened to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// Receives one notification per persisted entity change
pub trait ChangeObserver: Send + Sync {
    fn entity_changed(&self, table: &str, key: &Value, kind: ChangeKind);
}

/// Discards all notifications; the default observer
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ChangeObserver for NullObserver {
    fn entity_changed(&self, _table: &str, _key: &Value, _kind: ChangeKind) {}
}

/// Emits each change as a structured `tracing` event
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl ChangeObserver for LogObserver {
    fn entity_changed(&self, table: &str, key: &Value, kind: ChangeKind) {
        info!(table, key = %key, kind = ?kind, "entity changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records notifications for assertions
    #[derive(Default)]
    pub struct RecordingObserver {
        pub seen: Mutex<Vec<(String, Value, ChangeKind)>>,
    }

    impl ChangeObserver for RecordingObserver {
        fn entity_changed(&self, table: &str, key: &Value, kind: ChangeKind) {
            self.seen
                .lock()
                .unwrap()
                .push((table.to_string(), key.clone(), kind));
        }
    }

    #[test]
    fn observer_receives_table_key_and_kind() {
        let observer = RecordingObserver::default();
        observer.entity_changed("gizmos", &Value::Int(7), ChangeKind::Added);
        let seen = observer.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], ("gizmos".to_string(), Value::Int(7), ChangeKind::Added));
    }
}
