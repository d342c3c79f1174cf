//! Logging sinks.
//!
//! Records always go to a persistent log file. The console (stderr) sink is only
//! attached in verbose mode, or when the log file cannot be created.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Environment variable overriding the log directory.
pub const LOG_DIR_ENV: &str = "VEMULATOR_LOG_DIR";

/// Minimum severity that gets recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn from_debug_flag(debug: bool) -> Self {
        if debug {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
        }
    }
}

pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("vemulator-cli").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

pub fn log_file_name(at: OffsetDateTime) -> String {
    let stamp = at
        .format(time::macros::format_description!(
            "[year][month][day]T[hour][minute][second]Z"
        ))
        .unwrap_or_else(|_| at.unix_timestamp().to_string());
    format!("vemulator-{stamp}.log")
}

/// Create a fresh log file in `dir`, creating the directory if needed.
pub fn create_log_file(dir: &Path) -> io::Result<(PathBuf, File)> {
    fs::create_dir_all(dir)?;
    let path = dir.join(log_file_name(OffsetDateTime::now_utc()));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

/// Build the subscriber for the given sinks.
///
/// `store` is the persistent sink, `console` the interactive one. Either may be absent.
pub fn build_subscriber<S, C>(
    level: LogLevel,
    store: Option<S>,
    console: Option<C>,
    console_ansi: bool,
) -> impl Subscriber + Send + Sync
where
    S: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    C: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let store_layer = store.map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(writer)
    });
    let console_layer = console.map(|writer| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_ansi(console_ansi)
            .with_target(false)
            .with_writer(writer)
    });

    tracing_subscriber::registry()
        .with(EnvFilter::new(level.to_string()))
        .with(store_layer)
        .with(console_layer)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex, PoisonError};
    use tracing_subscriber::fmt::MakeWriter;

    /// In-memory log sink.
    #[derive(Clone, Default)]
    pub(crate) struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        pub(crate) fn contents(&self) -> String {
            let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    pub(crate) struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = CaptureWriter;

        fn make_writer(&'a self) -> Self::Writer {
            CaptureWriter(Arc::clone(&self.0))
        }
    }
}
