mod settings;

pub use settings::{
    CaptureConfig, CaptureMode, ConfigError, CONFIG_FILE_NAME, EXAMPLE_CONFIG,
};
