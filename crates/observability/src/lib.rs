//! Tracing/logging setup shared by binaries, tests and benches.

/// Environment-driven logging configuration.
pub mod config;

/// Subscriber installation.
pub mod tracing;

pub use config::{LogFormat, ObservabilityConfig, ParseLogFormatError};

/// Initialize process-wide tracing/logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(config: &ObservabilityConfig) {
    tracing::init(config);
}
