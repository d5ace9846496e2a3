use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::fixture::scrub::ScrubConfig;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("fixcap.toml.example");

/// Name of the package-level configuration file
pub const CONFIG_FILE_NAME: &str = "fixcap.toml";

const ENV_MODE: &str = "FIXCAP_MODE";
const ENV_SRCDIR: &str = "FIXCAP_SRCDIR";
const ENV_DESTDIR: &str = "FIXCAP_DESTDIR";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown capture mode {0:?} (expected \"off\" or \"record\")")]
    InvalidMode(String),

    #[error("invalid redaction pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Whether instrumentation records anything
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    Off,
    #[default]
    Record,
}

impl CaptureMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "0" | "false" => Some(CaptureMode::Off),
            "record" | "1" | "true" => Some(CaptureMode::Record),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::Off => "off",
            CaptureMode::Record => "record",
        }
    }
}

/// Resolved capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Root of the sources being instrumented
    pub srcdir: PathBuf,
    /// Root fixture files are written under
    pub destdir: PathBuf,
    /// File extensions unit discovery picks up
    pub extensions: Vec<String>,
    pub mode: CaptureMode,
    /// Redact secrets from snapshots before writing
    pub redact: bool,
    /// Extra redaction regexes on top of the defaults
    pub redact_patterns: Vec<String>,
    /// File the configuration was read from, if any
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TomlConfig {
    capture: Option<TomlCaptureConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TomlCaptureConfig {
    srcdir: Option<PathBuf>,
    destdir: Option<PathBuf>,
    extensions: Option<Vec<String>>,
    mode: Option<CaptureMode>,
    redact: Option<bool>,
    redact_patterns: Option<Vec<String>>,
}

impl CaptureConfig {
    /// Defaults rooted at `root`: `src/` in, `fixtures/` out
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            srcdir: root.join("src"),
            destdir: root.join("fixtures"),
            extensions: vec!["rs".to_string()],
            mode: CaptureMode::Record,
            redact: false,
            redact_patterns: Vec::new(),
            config_path: None,
        }
    }

    /// Find `fixcap.toml` in `start` or its nearest ancestor
    pub fn find_config_file(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Package-level resolution: nearest config file (or defaults rooted at
    /// `start`), then `FIXCAP_*` environment overrides.
    pub fn resolve(start: &Path) -> Result<Self, ConfigError> {
        let mut config = match Self::find_config_file(start) {
            Some(path) => Self::load_from(&path)?,
            None => Self::rooted_at(start),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        let mut config = Self::from_toml_str(&contents, root).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse configuration text; relative directories resolve against `root`
    pub fn from_toml_str(contents: &str, root: &Path) -> Result<Self, toml::de::Error> {
        let toml_config: TomlConfig = toml::from_str(contents)?;
        let mut config = Self::rooted_at(root);

        if let Some(capture) = toml_config.capture {
            if let Some(srcdir) = capture.srcdir {
                config.srcdir = root.join(srcdir);
            }
            if let Some(destdir) = capture.destdir {
                config.destdir = root.join(destdir);
            }
            if let Some(extensions) = capture.extensions {
                config.extensions = extensions
                    .into_iter()
                    .map(|ext| ext.trim_start_matches('.').to_string())
                    .collect();
            }
            if let Some(mode) = capture.mode {
                config.mode = mode;
            }
            if let Some(redact) = capture.redact {
                config.redact = redact;
            }
            if let Some(patterns) = capture.redact_patterns {
                config.redact_patterns = patterns;
            }
        }

        Ok(config)
    }

    /// Apply `FIXCAP_MODE`, `FIXCAP_SRCDIR` and `FIXCAP_DESTDIR` from `lookup`
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = lookup(ENV_MODE).filter(|v| !v.trim().is_empty()) {
            self.mode = CaptureMode::parse(&raw).ok_or(ConfigError::InvalidMode(raw))?;
        }
        if let Some(srcdir) = lookup(ENV_SRCDIR).filter(|v| !v.is_empty()) {
            self.srcdir = PathBuf::from(srcdir);
        }
        if let Some(destdir) = lookup(ENV_DESTDIR).filter(|v| !v.is_empty()) {
            self.destdir = PathBuf::from(destdir);
        }
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.mode == CaptureMode::Record
    }

    /// Redaction rules, or `None` when redaction is off
    pub fn scrub_config(&self) -> Result<Option<ScrubConfig>, ConfigError> {
        if !self.redact {
            return Ok(None);
        }
        Ok(Some(ScrubConfig::with_extra_patterns(&self.redact_patterns)?))
    }

    pub fn with_srcdir(mut self, dir: PathBuf) -> Self {
        self.srcdir = dir;
        self
    }

    pub fn with_destdir(mut self, dir: PathBuf) -> Self {
        self.destdir = dir;
        self
    }

    /// Write the example config into `dir` unless one already exists
    pub fn write_example(dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            return Ok(None);
        }
        fs::write(&path, EXAMPLE_CONFIG).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Some(path))
    }
}
