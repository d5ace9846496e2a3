//! Fixture files: record format, the rotating per-source recorder and
//! tooling for checking what it left on disk.

pub mod clock;
pub mod inspect;
pub mod record;
pub mod recorder;
pub mod scrub;

pub use clock::{Clock, FixedClock, SystemClock};
pub use inspect::{inspect_file, load_document, repair_file, FixtureStatus, InspectError};
pub use record::{FixtureDocument, FixtureOutput, FixtureRecord, FixtureRequest};
pub use recorder::{FixtureRecorder, RecorderError};
pub use scrub::ScrubConfig;
