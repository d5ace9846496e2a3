//! Reading, checking and repairing fixture files on disk

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::fixture::record::{FixtureDocument, FOOTER};

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is not a fixture document: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// State of a fixture file
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureStatus {
    /// Parses as-is
    Complete(FixtureDocument),
    /// Missing only its footer (the writer was stopped mid-stream)
    Unterminated(FixtureDocument),
    /// Not recoverable by appending a footer
    Corrupt(String),
}

impl FixtureStatus {
    pub fn document(&self) -> Option<&FixtureDocument> {
        match self {
            FixtureStatus::Complete(doc) | FixtureStatus::Unterminated(doc) => Some(doc),
            FixtureStatus::Corrupt(_) => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FixtureStatus::Complete(_) => "complete",
            FixtureStatus::Unterminated(_) => "unterminated",
            FixtureStatus::Corrupt(_) => "corrupt",
        }
    }
}

pub fn inspect_str(contents: &str) -> FixtureStatus {
    match serde_json::from_str::<FixtureDocument>(contents) {
        Ok(doc) => FixtureStatus::Complete(doc),
        Err(original) => {
            let closed = format!("{}{}", contents.trim_end(), FOOTER);
            match serde_json::from_str::<FixtureDocument>(&closed) {
                Ok(doc) => FixtureStatus::Unterminated(doc),
                Err(_) => FixtureStatus::Corrupt(original.to_string()),
            }
        }
    }
}

pub fn inspect_file(path: &Path) -> Result<FixtureStatus, InspectError> {
    let contents = fs::read_to_string(path).map_err(|source| InspectError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(inspect_str(&contents))
}

/// Load a document, tolerating a missing footer
pub fn load_document(path: &Path) -> Result<FixtureDocument, InspectError> {
    match inspect_file(path)? {
        FixtureStatus::Complete(doc) | FixtureStatus::Unterminated(doc) => Ok(doc),
        FixtureStatus::Corrupt(reason) => Err(InspectError::Corrupt {
            path: path.to_path_buf(),
            reason,
        }),
    }
}

/// Append the footer to an unterminated file.
///
/// Returns `Ok(true)` when the file was repaired and `Ok(false)` when it was
/// already complete. Do not run this on a stream a live recorder still
/// writes to.
pub fn repair_file(path: &Path) -> Result<bool, InspectError> {
    let io_err = |source| InspectError::Io {
        path: path.to_path_buf(),
        source,
    };
    match inspect_file(path)? {
        FixtureStatus::Complete(_) => Ok(false),
        FixtureStatus::Unterminated(_) => {
            let mut file = OpenOptions::new()
                .append(true)
                .open(path)
                .map_err(io_err)?;
            file.write_all(FOOTER.as_bytes()).map_err(io_err)?;
            file.flush().map_err(io_err)?;
            tracing::info!(path = %path.display(), "appended missing fixture footer");
            Ok(true)
        }
        FixtureStatus::Corrupt(reason) => Err(InspectError::Corrupt {
            path: path.to_path_buf(),
            reason,
        }),
    }
}

/// All `*.json` files under `dir`, sorted
pub fn fixture_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    collect_json(dir, &mut files);
    files.sort();
    files
}

fn collect_json(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_json(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.push(path);
        }
    }
}
