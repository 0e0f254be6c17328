//! Tracing macros that compile to nothing when tracing is disabled.
//!
//! Tracing is enabled when either:
//! - The `tracing` feature is enabled
//! - Running unit tests (`cfg(test)`)

/// Emit a trace-level log message.
macro_rules! trace {
    ($($arg:tt)*) => {
        #[cfg(any(test, feature = "tracing"))]
        tracing::trace!($($arg)*);
    };
}

/// Emit a debug-level log message.
macro_rules! debug {
    ($($arg:tt)*) => {
        #[cfg(any(test, feature = "tracing"))]
        tracing::debug!($($arg)*);
    };
}

pub(crate) use debug;
pub(crate) use trace;
