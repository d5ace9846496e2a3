//! Call capture: wrapping unit members so each invocation is recorded

pub mod error;
pub mod executor;
pub mod instrument;
pub mod interceptor;
pub mod loader;
pub mod unit;

pub use error::CallError;
pub use executor::{execute, Completion, CompletionState, Outcome, Returned};
pub use instrument::{InterceptedUnit, Instrumenter, IGNORED_STATICS};
pub use interceptor::{Interceptor, PendingInvocation};
pub use loader::{
    discover_sources, instrument_all, LoadError, LoadedUnit, ModuleLoader, ModuleRegistry,
};
pub use unit::{
    CallStyle, Callable, CallableUnit, Callback, Deferred, Export, MemberKind, Unit, CONSTRUCTOR,
};
