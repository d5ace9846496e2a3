//! Source discovery and loading of units ahead of instrumentation

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::capture::instrument::{InterceptedUnit, Instrumenter};
use crate::capture::unit::{Export, Unit};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no module registered for {0}")]
    NotFound(PathBuf),

    #[error("failed to load {path}: {reason}")]
    Failed { path: PathBuf, reason: String },
}

/// Turns a source path into whatever that source exports
pub trait ModuleLoader {
    fn load(&mut self, path: &Path) -> Result<Export, LoadError>;
}

impl<F> ModuleLoader for F
where
    F: FnMut(&Path) -> Result<Export, LoadError>,
{
    fn load(&mut self, path: &Path) -> Result<Export, LoadError> {
        self(path)
    }
}

/// In-process loader backed by exports registered up front
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: HashMap<PathBuf, Export>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, path: impl Into<PathBuf>, export: impl Into<Export>) {
        self.modules.insert(path.into(), export.into());
    }

    pub fn with(mut self, path: impl Into<PathBuf>, export: impl Into<Export>) -> Self {
        self.register(path, export);
        self
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleLoader for ModuleRegistry {
    fn load(&mut self, path: &Path) -> Result<Export, LoadError> {
        self.modules
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(path.to_path_buf()))
    }
}

/// Source files under `srcdir` with one of `extensions`, sorted.
///
/// Hidden directories and `target/` are skipped.
pub fn discover_sources(srcdir: &Path, extensions: &[String]) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    walk(srcdir, extensions, &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, extensions: &[String], out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if entry.file_type()?.is_dir() {
            if name.starts_with('.') || name == "target" {
                continue;
            }
            walk(&path, extensions, out)?;
        } else if path
            .extension()
            .is_some_and(|ext| extensions.iter().any(|want| ext == want.as_str()))
        {
            out.push(path);
        }
    }
    Ok(())
}

/// A loaded unit export, instrumented unless capture is off
#[derive(Debug)]
pub struct LoadedUnit {
    pub unit: Unit,
    pub intercepted: Option<InterceptedUnit>,
}

/// Load and instrument each source, keyed by source path.
///
/// Sources that fail to load are logged and skipped; exports that are not
/// units are dropped. With capture off the units come back untouched.
pub fn instrument_all<L>(
    paths: &[PathBuf],
    loader: &mut L,
    instrumenter: &Instrumenter,
) -> BTreeMap<PathBuf, LoadedUnit>
where
    L: ModuleLoader + ?Sized,
{
    let mut units = BTreeMap::new();
    for path in paths {
        let mut export = match loader.load(path) {
            Ok(export) => export,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unloadable source");
                continue;
            }
        };
        let intercepted = instrumenter.instrument(path, &mut export);
        if let Some(unit) = export.into_unit() {
            units.insert(path.clone(), LoadedUnit { unit, intercepted });
        }
    }
    tracing::info!(
        sources = paths.len(),
        units = units.len(),
        instrumented = units.values().filter(|u| u.intercepted.is_some()).count(),
        "loaded sources"
    );
    units
}
