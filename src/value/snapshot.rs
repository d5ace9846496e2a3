//! Best-effort structural copies of call inputs and outcomes.
//!
//! A snapshot freezes a value before the intercepted call can mutate it.
//! Copying is fallible; callers that must not fail use [`snapshot_or_null`]
//! and record a null in place of the value.

use serde::Serialize;

use super::{Object, Value};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("value of type {type_name} cannot be copied")]
    Uncopyable { type_name: String },

    #[error("cyclic reference at {path}")]
    Cycle { path: String },

    #[error("serialization failed: {0}")]
    Serialize(String),
}

pub trait Snapshot {
    fn snapshot(&self) -> Result<serde_json::Value, SnapshotError>;
}

/// Snapshot `value`, substituting `null` when it cannot be copied
pub fn snapshot_or_null<T: Snapshot + ?Sized>(value: &T) -> serde_json::Value {
    match value.snapshot() {
        Ok(copy) => copy,
        Err(err) => {
            tracing::debug!(error = %err, "snapshot failed, recording null");
            serde_json::Value::Null
        }
    }
}

/// Snapshot any serializable value
pub fn snapshot_serialize<T: Serialize + ?Sized>(
    value: &T,
) -> Result<serde_json::Value, SnapshotError> {
    serde_json::to_value(value).map_err(|e| SnapshotError::Serialize(e.to_string()))
}

impl Snapshot for serde_json::Value {
    fn snapshot(&self) -> Result<serde_json::Value, SnapshotError> {
        Ok(self.clone())
    }
}

impl Snapshot for Value {
    fn snapshot(&self) -> Result<serde_json::Value, SnapshotError> {
        let mut visiting = Vec::new();
        copy_value(self, &mut visiting, "$")
    }
}

impl Snapshot for Object {
    fn snapshot(&self) -> Result<serde_json::Value, SnapshotError> {
        let mut visiting = Vec::new();
        copy_object(self, &mut visiting, "$")
    }
}

impl Snapshot for [Value] {
    fn snapshot(&self) -> Result<serde_json::Value, SnapshotError> {
        let mut visiting = Vec::new();
        self.iter()
            .enumerate()
            .map(|(idx, value)| copy_value(value, &mut visiting, &format!("$[{idx}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(serde_json::Value::Array)
    }
}

fn copy_value(
    value: &Value,
    visiting: &mut Vec<usize>,
    path: &str,
) -> Result<serde_json::Value, SnapshotError> {
    match value {
        Value::Data(data) => Ok(data.clone()),
        Value::Object(object) => copy_object(object, visiting, path),
        Value::Opaque(opaque) => Err(SnapshotError::Uncopyable {
            type_name: opaque.type_name().to_string(),
        }),
    }
}

fn copy_object(
    object: &Object,
    visiting: &mut Vec<usize>,
    path: &str,
) -> Result<serde_json::Value, SnapshotError> {
    let addr = object.addr();
    if visiting.contains(&addr) {
        return Err(SnapshotError::Cycle {
            path: path.to_string(),
        });
    }
    visiting.push(addr);

    // Clone the field handles out so no lock is held while descending.
    let fields: Vec<(String, Value)> = object.update(|fields| {
        fields
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    });

    let mut map = serde_json::Map::with_capacity(fields.len());
    for (key, value) in fields {
        let child = format!("{path}.{key}");
        let copy = copy_value(&value, visiting, &child)?;
        map.insert(key, copy);
    }

    visiting.pop();
    Ok(serde_json::Value::Object(map))
}
