//! Process-wide invocation context shared by every subcommand.

use crate::logging::{self, LogLevel};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Handle to the logging setup of this invocation.
#[derive(Debug, Clone)]
pub struct LoggerHandle {
    target: &'static str,
    log_file: Option<PathBuf>,
}

impl LoggerHandle {
    pub fn new(target: &'static str, log_file: Option<PathBuf>) -> Self {
        Self { target, log_file }
    }

    /// Module the handle was created for.
    pub fn target(&self) -> &'static str {
        self.target
    }

    /// Persistent log file, if one could be created.
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }
}

/// The console carries records when asked to, or when no log file could be created.
fn console_enabled(verbose: bool, store_ok: bool) -> bool {
    verbose || !store_ok
}

/// Global flags and logger, read-only once created.
#[derive(Debug, Clone)]
pub struct Session {
    verbose: bool,
    debug: bool,
    logger: LoggerHandle,
}

impl Session {
    /// Install the process-wide logging sinks and create the session.
    ///
    /// `target` is the module path of the caller. Never fails: when the log file
    /// cannot be created, records go to the console instead.
    pub fn initialize(
        target: &'static str,
        verbose: bool,
        debug: bool,
        log_dir: Option<PathBuf>,
    ) -> Self {
        let dir = log_dir.unwrap_or_else(logging::default_log_dir);
        let (log_file, store, store_error) = match logging::create_log_file(&dir) {
            Ok((path, file)) => (Some(path), Some(Mutex::new(file)), None),
            Err(e) => (None, None, Some(e)),
        };
        let console = console_enabled(verbose, store.is_some()).then_some(std::io::stderr);

        let subscriber = logging::build_subscriber(
            LogLevel::from_debug_flag(debug),
            store,
            console,
            std::io::stderr().is_terminal(),
        );
        // A subscriber installed earlier in the process stays in place.
        let _ = tracing::subscriber::set_global_default(subscriber);

        if let Some(e) = store_error {
            tracing::warn!(dir = %dir.display(), error = %e, "could not create log file, logging to console");
        }

        Self::start(verbose, debug, LoggerHandle::new(target, log_file))
    }

    /// Create the session on top of an already installed subscriber.
    pub fn start(verbose: bool, debug: bool, logger: LoggerHandle) -> Self {
        if verbose {
            tracing::info!("Verbose mode enabled.");
        }
        Self {
            verbose,
            debug,
            logger,
        }
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn logger(&self) -> &LoggerHandle {
        &self.logger
    }
}
