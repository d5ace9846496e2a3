//! Per-source fixture recorder with daily stream rotation.
//!
//! Each recorder owns at most one open stream. A stream is a JSON document
//! (`{"type":"unit","require":..,"tests":[ .. ]}`) written incrementally:
//! the header on open, one record per settled call, the footer on rotation
//! or close. Until the footer lands the file is not valid JSON; see
//! [`crate::fixture::inspect`] for repairing files left open by a killed
//! process.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::fixture::clock::{Clock, SystemClock};
use crate::fixture::record::{self, FixtureOutput, FixtureRecord, FOOTER, SEPARATOR};
use crate::fixture::scrub::ScrubConfig;

/// Attempts at finding a free file name for one day before giving up
const MAX_STREAM_SUFFIX: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("fixture I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("fixture serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no free fixture file name for {stem} on {day}")]
    NamesExhausted { stem: String, day: NaiveDate },
}

struct FixtureStream {
    day: NaiveDate,
    path: PathBuf,
    file: File,
    /// Bytes known to form a valid document prefix
    len: u64,
    records: u64,
    /// A rollback failed; the file may hold a partial record
    torn: bool,
}

impl FixtureStream {
    fn append(&mut self, record: &FixtureRecord) -> Result<(), RecorderError> {
        let json = serde_json::to_string(record)?;
        let mut chunk = String::with_capacity(json.len() + SEPARATOR.len());
        if self.records > 0 {
            chunk.push_str(SEPARATOR);
        }
        chunk.push_str(&json);
        self.commit(chunk.as_bytes())?;
        self.records += 1;
        Ok(())
    }

    fn commit(&mut self, bytes: &[u8]) -> Result<(), RecorderError> {
        match write_committed(&mut self.file, self.len, bytes) {
            Ok(len) => {
                self.len = len;
                Ok(())
            }
            Err(CommitError::RolledBack(err)) => Err(err.into()),
            Err(CommitError::Torn { write, rollback }) => {
                self.torn = true;
                tracing::warn!(
                    path = %self.path.display(),
                    error = %rollback,
                    "failed to roll back partial fixture write"
                );
                Err(write.into())
            }
        }
    }

    fn finish(mut self) -> Result<PathBuf, RecorderError> {
        self.commit(FOOTER.as_bytes())?;
        Ok(self.path)
    }
}

/// A sink that can be cut back to a known length
trait Truncate {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len))?;
        Ok(())
    }
}

#[derive(Debug)]
enum CommitError {
    /// The write failed and the sink is back at its committed length
    RolledBack(io::Error),
    /// The write failed and so did the rollback
    Torn { write: io::Error, rollback: io::Error },
}

/// Write `bytes` after `committed` bytes. On failure the sink is cut back to
/// `committed` so a half-written record never stays in the document.
fn write_committed<W>(sink: &mut W, committed: u64, bytes: &[u8]) -> Result<u64, CommitError>
where
    W: Write + Truncate,
{
    match sink.write_all(bytes).and_then(|()| sink.flush()) {
        Ok(()) => Ok(committed + bytes.len() as u64),
        Err(write) => match sink.truncate_to(committed) {
            Ok(()) => Err(CommitError::RolledBack(write)),
            Err(rollback) => Err(CommitError::Torn { write, rollback }),
        },
    }
}

/// Append-only writer for one source file's captured invocations
pub struct FixtureRecorder {
    dir: PathBuf,
    stem: String,
    require: String,
    clock: Arc<dyn Clock>,
    scrub: Option<ScrubConfig>,
    stream: Mutex<Option<FixtureStream>>,
}

impl FixtureRecorder {
    /// Create a recorder writing `<dir>/<stem>.<date>.json` files whose header
    /// names `require`.
    ///
    /// The directory is created up front; failure is tolerated and retried
    /// when a stream is opened.
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>, require: impl Into<String>) -> Self {
        let dir = dir.into();
        if let Err(err) = fs::create_dir_all(&dir) {
            tracing::debug!(
                dir = %dir.display(),
                error = %err,
                "failed to create fixture directory"
            );
        }
        Self {
            dir,
            stem: stem.into(),
            require: require.into(),
            clock: Arc::new(SystemClock),
            scrub: None,
            stream: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_scrub(mut self, scrub: Option<ScrubConfig>) -> Self {
        self.scrub = scrub;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn require(&self) -> &str {
        &self.require
    }

    /// File name of the stream for `day`
    pub fn stream_name(&self, day: NaiveDate) -> String {
        format!("{}.{}.json", self.stem, day.format("%Y-%m-%d"))
    }

    /// Path of the currently open stream, if any
    pub fn current_path(&self) -> Option<PathBuf> {
        self.stream.lock().as_ref().map(|s| s.path.clone())
    }

    /// Record one settled invocation. Failures are logged and dropped: the
    /// host program never sees them.
    pub fn log(
        &self,
        method: &str,
        construct: bool,
        receiver: serde_json::Value,
        payload: Vec<serde_json::Value>,
        output: FixtureOutput,
    ) {
        let record = FixtureRecord::new(method, construct, receiver, payload, output);
        if let Err(err) = self.append(record) {
            tracing::debug!(
                require = %self.require,
                method,
                error = %err,
                "failed to append fixture record"
            );
        }
    }

    /// Append a record to today's stream, rotating first if the day changed
    pub fn append(&self, mut record: FixtureRecord) -> Result<(), RecorderError> {
        if let Some(scrub) = &self.scrub {
            scrub.scrub_record(&mut record);
        }
        let mut slot = self.stream.lock();
        let stream = self.ensure_current(&mut slot)?;
        let result = stream.append(&record);
        if stream.torn {
            // Abandon the damaged file; the next record opens a fresh one.
            *slot = None;
        }
        result
    }

    /// Close the open stream, writing its footer
    pub fn close(&self) -> Result<Option<PathBuf>, RecorderError> {
        let stream = self.stream.lock().take();
        match stream {
            Some(stream) => {
                let path = stream.finish()?;
                tracing::info!(path = %path.display(), "closed fixture stream");
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }

    fn ensure_current<'a>(
        &self,
        slot: &'a mut Option<FixtureStream>,
    ) -> Result<&'a mut FixtureStream, RecorderError> {
        let today = self.clock.today();
        let stream = match slot.take() {
            Some(current) if current.day == today => current,
            Some(previous) => {
                let path = previous.finish()?;
                tracing::info!(path = %path.display(), "rotated fixture stream");
                self.open_stream(today)?
            }
            None => self.open_stream(today)?,
        };
        Ok(slot.insert(stream))
    }

    fn open_stream(&self, day: NaiveDate) -> Result<FixtureStream, RecorderError> {
        fs::create_dir_all(&self.dir)?;
        let header = record::header(&self.require)?;
        let (path, file) = self.create_unused(day)?;
        let mut stream = FixtureStream {
            day,
            path,
            file,
            len: 0,
            records: 0,
            torn: false,
        };
        if let Err(err) = stream.commit(header.as_bytes()) {
            if let Err(remove) = fs::remove_file(&stream.path) {
                tracing::debug!(path = %stream.path.display(), error = %remove, "failed to remove empty fixture file");
            }
            return Err(err);
        }
        tracing::info!(path = %stream.path.display(), require = %self.require, "opened fixture stream");
        Ok(stream)
    }

    /// Never append a second header into an existing document: a restart on
    /// the same day gets `<stem>.<date>.<n>.json`.
    fn create_unused(&self, day: NaiveDate) -> Result<(PathBuf, File), RecorderError> {
        for attempt in 0..MAX_STREAM_SUFFIX {
            let name = if attempt == 0 {
                self.stream_name(day)
            } else {
                format!("{}.{}.{}.json", self.stem, day.format("%Y-%m-%d"), attempt)
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(RecorderError::NamesExhausted {
            stem: self.stem.clone(),
            day,
        })
    }
}

impl Drop for FixtureRecorder {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::debug!(require = %self.require, error = %err, "failed to close fixture stream");
        }
    }
}

impl std::fmt::Debug for FixtureRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureRecorder")
            .field("dir", &self.dir)
            .field("stem", &self.stem)
            .field("require", &self.require)
            .finish()
    }
}
