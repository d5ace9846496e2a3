use serde::{Deserialize, Serialize};

use crate::value::{snapshot_serialize, Snapshot, SnapshotError};

/// Error raised by an intercepted member.
///
/// Carries a name (`Error`, `TypeError`, or anything the callee picks), a
/// message and optional structured data. The same value is returned to the
/// caller and recorded as the fixture's error outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{name}: {message}")]
pub struct CallError {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl CallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::named("Error", message)
    }

    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            data: None,
        }
    }

    /// Misuse of a callable: wrong calling style, missing member
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::named("TypeError", message)
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl Snapshot for CallError {
    fn snapshot(&self) -> Result<serde_json::Value, SnapshotError> {
        snapshot_serialize(self)
    }
}
