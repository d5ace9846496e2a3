use serde::{Deserialize, Serialize};

/// Value of the header's `type` field
pub const FIXTURE_TYPE: &str = "unit";

/// Written after the last record to close the `tests` array and the document
pub const FOOTER: &str = "\n]}\n";

/// Separator written before every record except the first in a stream
pub const SEPARATOR: &str = ",\n";

/// Opening of a fixture document, up to and including the `tests` array
/// bracket.
pub fn header(require: &str) -> Result<String, serde_json::Error> {
    Ok(format!(
        "{{\"type\":{},\"require\":{},\"tests\":[\n",
        serde_json::to_string(FIXTURE_TYPE)?,
        serde_json::to_string(require)?
    ))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureRequest {
    pub payload: Vec<serde_json::Value>,
    pub construct: bool,
    pub method: String,
}

/// Recorded outcome: `{"output": ..}` or `{"error": ..}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureOutput {
    Output(serde_json::Value),
    Error(serde_json::Value),
}

impl FixtureOutput {
    pub fn is_error(&self) -> bool {
        matches!(self, FixtureOutput::Error(_))
    }

    pub fn value(&self) -> &serde_json::Value {
        match self {
            FixtureOutput::Output(value) | FixtureOutput::Error(value) => value,
        }
    }
}

/// One captured invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureRecord {
    /// Receiver snapshot (the unit's static object for static calls and
    /// construction)
    pub require: serde_json::Value,
    pub request: FixtureRequest,
    pub output: FixtureOutput,
}

impl FixtureRecord {
    pub fn new(
        method: impl Into<String>,
        construct: bool,
        receiver: serde_json::Value,
        payload: Vec<serde_json::Value>,
        output: FixtureOutput,
    ) -> Self {
        Self {
            require: receiver,
            request: FixtureRequest {
                payload,
                construct,
                method: method.into(),
            },
            output,
        }
    }
}

/// A complete fixture file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureDocument {
    #[serde(rename = "type")]
    pub kind: String,
    pub require: String,
    pub tests: Vec<FixtureRecord>,
}
