pub mod capture;
pub mod config;
pub mod fixture;
pub mod util;
pub mod value;

pub use capture::{
    discover_sources, instrument_all, CallError, CallStyle, Callable, CallableUnit, Export,
    InterceptedUnit, Instrumenter, LoadedUnit, ModuleLoader, ModuleRegistry, Unit,
};
pub use config::{CaptureConfig, CaptureMode, ConfigError};
pub use fixture::{FixtureDocument, FixtureRecord, FixtureRecorder, FixtureStatus};
pub use value::{Object, Opaque, Value};
