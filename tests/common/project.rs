//! Temporary project layouts for capture tests
//!
//! A `TestProject` owns a scratch directory with `src/` and `fixtures/`
//! roots and a manually driven clock, so fixture names are predictable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use fixcap::fixture::clock::FixedClock;
use fixcap::fixture::inspect::fixture_files;
use fixcap::{FixtureDocument, Instrumenter};
use tempfile::TempDir;

pub const START_DAY: (i32, u32, u32) = (2024, 3, 9);

pub struct TestProject {
    /// TempDir handle (keeps directory alive until dropped)
    _dir: TempDir,
    /// Project root
    pub root: PathBuf,
    pub clock: Arc<FixedClock>,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let root = dir.path().to_path_buf();
        std::fs::create_dir_all(root.join("src")).unwrap();
        let (y, m, d) = START_DAY;
        Self {
            _dir: dir,
            root,
            clock: Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(y, m, d).unwrap())),
        }
    }

    pub fn srcdir(&self) -> PathBuf {
        self.root.join("src")
    }

    pub fn destdir(&self) -> PathBuf {
        self.root.join("fixtures")
    }

    /// Create an (empty) source file and return its absolute path
    pub fn write_source(&self, relative: &str) -> PathBuf {
        let path = self.srcdir().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "// unit\n").unwrap();
        path
    }

    pub fn write_config(&self, contents: &str) {
        std::fs::write(self.root.join("fixcap.toml"), contents).unwrap();
    }

    pub fn instrumenter(&self) -> Instrumenter {
        Instrumenter::new(self.srcdir(), self.destdir()).with_clock(self.clock.clone())
    }

    pub fn fixtures(&self) -> Vec<PathBuf> {
        fixture_files(&self.destdir())
    }

    pub fn day(&self, d: u32) -> NaiveDate {
        let (y, m, _) = START_DAY;
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }
}

pub fn read_document(path: &Path) -> FixtureDocument {
    let text = std::fs::read_to_string(path).expect("fixture file should exist");
    serde_json::from_str(&text).expect("fixture file should be a complete document")
}
