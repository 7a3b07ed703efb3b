//! Bridge from the `log` facade to a host-provided logger.
//!
//! Embedders that do not run their own `log` backend (a browser extension
//! shell, a mobile app) implement [`Logger`] and call [`set_logger`] once at
//! startup. Debug and trace records from other crates are dropped so the
//! host only sees PromptKit's own diagnostics plus warnings and errors.

use std::sync::{Arc, OnceLock};

/// Receiver for log messages emitted by this crate.
///
/// # Examples
///
/// ```rust
/// use promptkit_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Records `message` at `level`.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Very detailed tracing, such as lock hand-offs.
    Trace,
    /// Diagnostic detail, such as verified writes and container kinds.
    Debug,
    /// Notable events, such as a restored backup.
    Info,
    /// Recoverable problems, such as a failed verification attempt.
    Warn,
    /// Failures reported to the caller.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

/// Module prefix whose debug and trace records are forwarded.
const CRATE_PREFIX: &str = "promptkit";

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// `log::Log` implementation forwarding to [`LOGGER_INSTANCE`].
struct ForeignLogger;

/// Returns `true` if a record from `module_path` at `level` should reach the host.
fn should_forward(level: log::Level, module_path: Option<&str>) -> bool {
    let verbose = matches!(level, log::Level::Debug | log::Level::Trace);
    !verbose || module_path.is_some_and(|path| path.starts_with(CRATE_PREFIX))
}

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if !should_forward(record.level(), record.module_path()) {
            return;
        }
        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(record.level().into(), record.args().to_string());
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

/// Installs `logger` as the destination of this crate's log output.
///
/// Only the first call takes effect. If another `log` backend is already
/// installed in the process, the call reports that on stderr and leaves
/// the existing backend in place.
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("Logger already set");
        return;
    }

    static LOGGER: ForeignLogger = ForeignLogger;
    match log::set_logger(&LOGGER) {
        Ok(()) => log::set_max_level(log::LevelFilter::Trace),
        Err(e) => eprintln!("Failed to set logger: {e}"),
    }
}
