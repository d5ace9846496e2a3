use regex::Regex;

use crate::fixture::record::{FixtureOutput, FixtureRecord};

const REDACTED: &str = "[REDACTED]";

/// Redacts secrets from snapshots before they reach disk
#[derive(Debug, Clone)]
pub struct ScrubConfig {
    patterns: Vec<Regex>,
}

impl ScrubConfig {
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    pub fn default_patterns() -> Vec<Regex> {
        // No look-behind in the `regex` crate, keep these plain.
        let raw = [
            r"sk-[A-Za-z0-9]{10,}",
            r"Bearer\s+[A-Za-z0-9._-]{10,}",
            r"(?i)api[_-]?key\s*[=:]\s*[A-Za-z0-9._-]{10,}",
            r"(?i)password\s*[=:]\s*\S+",
        ];
        raw.into_iter().filter_map(|p| Regex::new(p).ok()).collect()
    }

    pub fn default_shareable() -> Self {
        Self::new(Self::default_patterns())
    }

    /// Defaults plus user-supplied patterns
    pub fn with_extra_patterns<S: AsRef<str>>(extra: &[S]) -> Result<Self, regex::Error> {
        let mut patterns = Self::default_patterns();
        for raw in extra {
            patterns.push(Regex::new(raw.as_ref())?);
        }
        Ok(Self::new(patterns))
    }

    pub fn scrub_string(&self, input: &str) -> String {
        let mut out = input.to_string();
        for re in &self.patterns {
            out = re.replace_all(&out, REDACTED).into_owned();
        }
        out
    }

    /// Scrub every string in `value`, keys included
    pub fn scrub_json(&self, value: &mut serde_json::Value) {
        match value {
            serde_json::Value::String(text) => *text = self.scrub_string(text),
            serde_json::Value::Array(items) => {
                for item in items {
                    self.scrub_json(item);
                }
            }
            serde_json::Value::Object(map) => {
                let entries = std::mem::take(map);
                for (key, mut item) in entries {
                    self.scrub_json(&mut item);
                    map.insert(self.scrub_string(&key), item);
                }
            }
            _ => {}
        }
    }

    pub fn scrub_record(&self, record: &mut FixtureRecord) {
        self.scrub_json(&mut record.require);
        for arg in &mut record.request.payload {
            self.scrub_json(arg);
        }
        match &mut record.output {
            FixtureOutput::Output(value) | FixtureOutput::Error(value) => self.scrub_json(value),
        }
    }
}
