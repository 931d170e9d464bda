//! Diagnostic side channel
//!
//! Evaluators report data-quality problems (wrong series variant, inconsistent
//! offsets, non-finite values) through a [`LogSink`]. Sinks never influence
//! computed output. The default sink forwards to `tracing`.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use tasig::logging::{FnSink, LogLevel, LogSink};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let captured = Arc::clone(&seen);
//! let sink = FnSink(move |msg: &str, level: LogLevel| {
//!     captured.lock().unwrap().push((level, msg.to_string()));
//! });
//! sink.log("hello", LogLevel::Warn);
//! assert_eq!(seen.lock().unwrap().len(), 1);
//! ```

use std::fmt;

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        })
    }
}

/// Receiver for diagnostics
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str, level: LogLevel);
}

/// Forwards to `tracing` under the `tasig` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str, level: LogLevel) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "tasig", "{}", message),
            LogLevel::Info => tracing::info!(target: "tasig", "{}", message),
            LogLevel::Warn => tracing::warn!(target: "tasig", "{}", message),
            LogLevel::Error => tracing::error!(target: "tasig", "{}", message),
        }
    }
}

/// Adapts a caller-supplied `onLog(message, level)` closure
pub struct FnSink<F>(pub F);

impl<F> LogSink for FnSink<F>
where
    F: Fn(&str, LogLevel) + Send + Sync,
{
    fn log(&self, message: &str, level: LogLevel) {
        (self.0)(message, level)
    }
}

impl<F> fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnSink(..)")
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _message: &str, _level: LogLevel) {}
}

pub(crate) static TRACING_SINK: TracingSink = TracingSink;
