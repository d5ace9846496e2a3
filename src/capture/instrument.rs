//! Unit instrumentation: swap every member of a unit for a recording wrapper.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::capture::interceptor::Interceptor;
use crate::capture::unit::{CallableUnit, Export, MemberKind, CONSTRUCTOR};
use crate::config::{CaptureConfig, ConfigError};
use crate::fixture::clock::{Clock, SystemClock};
use crate::fixture::recorder::FixtureRecorder;
use crate::fixture::scrub::ScrubConfig;
use crate::util::paths::{relative_to, slash_path, source_stem, unit_label};

/// Static members that are reflection artifacts, never intercepted
pub const IGNORED_STATICS: [&str; 3] = ["length", "prototype", "name"];

/// A unit after instrumentation: where it came from and what was wrapped
#[derive(Debug, Clone)]
pub struct InterceptedUnit {
    pub source: PathBuf,
    pub label: String,
    pub static_members: Vec<String>,
    pub instance_members: Vec<String>,
    pub recorder: Arc<FixtureRecorder>,
}

#[derive(Debug, Clone)]
pub struct Instrumenter {
    srcdir: PathBuf,
    destdir: PathBuf,
    enabled: bool,
    clock: Arc<dyn Clock>,
    scrub: Option<ScrubConfig>,
}

impl Instrumenter {
    pub fn new(srcdir: impl Into<PathBuf>, destdir: impl Into<PathBuf>) -> Self {
        Self {
            srcdir: srcdir.into(),
            destdir: destdir.into(),
            enabled: true,
            clock: Arc::new(SystemClock),
            scrub: None,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(&config.srcdir, &config.destdir)
            .with_enabled(config.is_recording())
            .with_scrub(config.scrub_config()?))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_scrub(mut self, scrub: Option<ScrubConfig>) -> Self {
        self.scrub = scrub;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn srcdir(&self) -> &Path {
        &self.srcdir
    }

    pub fn destdir(&self) -> &Path {
        &self.destdir
    }

    /// Recorder for `source`: files land in the mirror of the source's
    /// directory under `destdir`, named after the source file.
    pub fn recorder_for(&self, source: &Path, unit_name: &str) -> FixtureRecorder {
        let relative = relative_to(source, &self.srcdir);
        let dir = match relative.parent() {
            Some(parent) if relative.is_relative() => self.destdir.join(parent),
            _ => self.destdir.clone(),
        };
        let require = format!("{}#{unit_name}", slash_path(&relative));
        FixtureRecorder::new(dir, source_stem(&relative), require)
            .with_clock(Arc::clone(&self.clock))
            .with_scrub(self.scrub.clone())
    }

    /// Instrument a loaded export. Non-unit exports, and everything while
    /// capture is off, are left alone.
    ///
    /// Not idempotent: a unit instrumented twice records every call twice.
    pub fn instrument(&self, source: &Path, export: &mut Export) -> Option<InterceptedUnit> {
        if !self.enabled {
            tracing::debug!(source = %source.display(), "capture off, skipping");
            return None;
        }
        match export.as_unit_mut() {
            Some(unit) => Some(self.instrument_unit(source, unit)),
            None => {
                tracing::debug!(source = %source.display(), "export is not a unit, skipping");
                None
            }
        }
    }

    pub fn instrument_unit<U>(&self, source: &Path, unit: &mut U) -> InterceptedUnit
    where
        U: CallableUnit + ?Sized,
    {
        let recorder = Arc::new(self.recorder_for(source, unit.unit_name()));
        let label = unit_label(&relative_to(source, &self.srcdir));

        let mut static_members = Vec::new();
        for name in unit.list_static_members() {
            if IGNORED_STATICS.contains(&name.as_str()) {
                continue;
            }
            if let Some(original) = unit.member(MemberKind::Static, &name) {
                let wrapped = Interceptor::new(Arc::clone(&recorder), &name, false).wrap(original);
                if unit.replace_member(MemberKind::Static, &name, wrapped) {
                    static_members.push(name);
                }
            }
        }

        let mut instance_members = Vec::new();
        for name in unit.list_instance_members() {
            let is_constructor = name == CONSTRUCTOR;
            if let Some(original) = unit.member(MemberKind::Instance, &name) {
                let wrapped =
                    Interceptor::new(Arc::clone(&recorder), &name, is_constructor).wrap(original);
                if unit.replace_member(MemberKind::Instance, &name, wrapped) {
                    instance_members.push(name);
                }
            }
        }

        tracing::debug!(
            label = %label,
            statics = static_members.len(),
            methods = instance_members.len(),
            "instrumented unit"
        );

        InterceptedUnit {
            source: source.to_path_buf(),
            label,
            static_members,
            instance_members,
            recorder,
        }
    }
}
