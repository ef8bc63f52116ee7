//! Level-gated diagnostics logging.
//!
//! One process-wide context holds the severity threshold and the output
//! handler. The message for a suppressed level is never formatted: every
//! entry point takes a deferred provider closure that only runs after the
//! level check passes.
//!
//! Logging may happen from many threads at once, including during abnormal
//! process termination, so threshold reads are a single atomic load and the
//! handler lock is held only long enough to clone a reference. The default
//! handler formats into a fixed stack buffer and issues one write to
//! stderr; it never allocates.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::fmt::{self, Write as _};
use std::io::Write as _;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Severity levels, ordered from most to least restrictive.
///
/// A message is emitted when its level does not outrank the current
/// threshold; `Verbose` as threshold permits everything, `Off` nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warning = 2,
    Debug = 3,
    Verbose = 4,
}

impl LogLevel {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LogLevel::Error,
            2 => LogLevel::Warning,
            3 => LogLevel::Debug,
            4 => LogLevel::Verbose,
            _ => LogLevel::Off,
        }
    }

    /// Canonical label used by the default handler.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Off => "OFF",
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Debug => "DEBUG",
            LogLevel::Verbose => "VERBOSE",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source location of a log call, captured by the logging macros.
#[derive(Debug, Clone, Copy)]
pub struct CallSite {
    pub file: &'static str,
    pub function: &'static str,
    pub line: u32,
}

/// Registered output handler. Receives only messages that passed the
/// level check.
pub type LogHandler = Arc<dyn Fn(LogLevel, &str, &CallSite) + Send + Sync>;

struct LogContext {
    threshold: AtomicU8,
    handler: RwLock<LogHandler>,
}

const DEFAULT_LEVEL: LogLevel = LogLevel::Warning;

static CONTEXT: Lazy<LogContext> = Lazy::new(|| LogContext {
    threshold: AtomicU8::new(DEFAULT_LEVEL as u8),
    handler: RwLock::new(Arc::new(default_handler)),
});

/// Returns the current severity threshold.
pub fn log_level() -> LogLevel {
    LogLevel::from_u8(CONTEXT.threshold.load(Ordering::Relaxed))
}

/// Sets the process-wide severity threshold.
pub fn set_log_level(level: LogLevel) {
    CONTEXT.threshold.store(level as u8, Ordering::Relaxed);
}

/// Installs an output handler, replacing any previous one.
pub fn set_log_handler<H>(handler: H)
where
    H: Fn(LogLevel, &str, &CallSite) + Send + Sync + 'static,
{
    *CONTEXT.handler.write() = Arc::new(handler);
}

/// Restores the default handler and threshold. Tests call this in
/// teardown so state does not leak across cases.
pub fn reset_log_handler() {
    *CONTEXT.handler.write() = Arc::new(default_handler);
    set_log_level(DEFAULT_LEVEL);
}

/// Core entry point behind the logging macros.
///
/// `provider` is invoked at most once, and never when `level` outranks
/// the current threshold.
pub fn log_message<F>(provider: F, level: LogLevel, site: &CallSite)
where
    F: FnOnce() -> String,
{
    if level == LogLevel::Off || level > log_level() {
        return;
    }

    let message = provider();
    // Clone the handler out of the lock so the callback runs unlocked.
    let handler = CONTEXT.handler.read().clone();
    handler(level, &message, site);
}

const HANDLER_BUF_LEN: usize = 1024;

/// Fixed-capacity byte buffer implementing `fmt::Write`, truncating on
/// overflow. Keeps the default handler free of heap allocation.
struct FixedBuf {
    buf: [u8; HANDLER_BUF_LEN],
    len: usize,
}

impl FixedBuf {
    fn new() -> Self {
        Self {
            buf: [0; HANDLER_BUF_LEN],
            len: 0,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl fmt::Write for FixedBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = HANDLER_BUF_LEN - self.len;
        let take = room.min(s.len());
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

/// Default handler: fixed buffer, single write to the diagnostic stream.
fn default_handler(level: LogLevel, message: &str, site: &CallSite) {
    let mut line = FixedBuf::new();
    let _ = write!(
        line,
        "[{level}] {}:{} ({}) {message}\n",
        site.file, site.line, site.function
    );
    let _ = std::io::stderr().write_all(line.as_bytes());
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::log::log_message(
            || ::std::format!($($arg)*),
            $crate::log::LogLevel::Error,
            &$crate::log::CallSite {
                file: ::std::file!(),
                function: ::std::module_path!(),
                line: ::std::line!(),
            },
        )
    };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        $crate::log::log_message(
            || ::std::format!($($arg)*),
            $crate::log::LogLevel::Warning,
            &$crate::log::CallSite {
                file: ::std::file!(),
                function: ::std::module_path!(),
                line: ::std::line!(),
            },
        )
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::log::log_message(
            || ::std::format!($($arg)*),
            $crate::log::LogLevel::Debug,
            &$crate::log::CallSite {
                file: ::std::file!(),
                function: ::std::module_path!(),
                line: ::std::line!(),
            },
        )
    };
}

#[macro_export]
macro_rules! log_verbose {
    ($($arg:tt)*) => {
        $crate::log::log_message(
            || ::std::format!($($arg)*),
            $crate::log::LogLevel::Verbose,
            &$crate::log::CallSite {
                file: ::std::file!(),
                function: ::std::module_path!(),
                line: ::std::line!(),
            },
        )
    };
}
