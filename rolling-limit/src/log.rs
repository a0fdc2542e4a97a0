use std::fmt::Debug;

use tracing::Level;

/// Where the limiter sends its diagnostics.
///
/// The limiter never picks a sink on its own; whoever assembles it passes one
/// in. [`TracingSink`] is the usual choice.
pub trait LogSink: Debug + Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Forwards every message to the `tracing` dispatcher installed by the
/// application.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "rolling_limit", "{message}"),
            Level::WARN => tracing::warn!(target: "rolling_limit", "{message}"),
            Level::INFO => tracing::info!(target: "rolling_limit", "{message}"),
            Level::DEBUG => tracing::debug!(target: "rolling_limit", "{message}"),
            _ => tracing::trace!(target: "rolling_limit", "{message}"),
        }
    }
}
