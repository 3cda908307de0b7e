//! Console and per-run log file output.
//!
//! The console shows `info` and above (override with `REP_LOG`). The run log
//! receives `debug` and above once [`RunLog::attach`] has pointed it at a file
//! inside the output directory; events emitted before that are not kept.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rep_core::{ErrorInfo, RepError};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::{self, time::Uptime, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Environment variable holding the console filter directive.
pub const LOG_ENV: &str = "REP_LOG";

#[derive(Debug, Default)]
struct Sink {
    file: Option<File>,
    path: Option<PathBuf>,
}

/// Shared handle to the log file of the current run.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    sink: Arc<Mutex<Sink>>,
}

impl RunLog {
    /// Detached log; writes are discarded until [`RunLog::attach`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends further events to `path`, replacing any previous file.
    pub fn attach(&self, path: &Path) -> Result<(), RepError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| {
                RepError::Store(
                    ErrorInfo::new("log-open", err.to_string())
                        .with_context("path", path.display().to_string()),
                )
            })?;
        let mut sink = self.lock();
        sink.file = Some(file);
        sink.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Path of the attached file, if any.
    pub fn path(&self) -> Option<PathBuf> {
        self.lock().path.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Sink> {
        self.sink
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Writer handed out to the fmt layer for one event.
pub struct RunLogWriter<'a>(MutexGuard<'a, Sink>);

impl Write for RunLogWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.0.file.as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.0.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for RunLog {
    type Writer = RunLogWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RunLogWriter(self.lock())
    }
}

/// Installs the global subscriber feeding the console and `run_log`.
///
/// Returns `false` when a subscriber was already installed, which leaves the
/// existing one in place.
pub fn init(run_log: &RunLog) -> bool {
    let console_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer()
        .with_timer(Uptime::default())
        .with_target(false)
        .with_filter(console_filter);
    let file = fmt::layer()
        .with_timer(Uptime::default())
        .with_ansi(false)
        .with_writer(run_log.clone())
        .with_filter(LevelFilter::DEBUG);
    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .is_ok()
}
