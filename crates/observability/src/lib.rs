//! Tracing and logging setup shared by the login binaries.

/// Initialize process-wide tracing with the format from `LOGIN_LOG_FORMAT`.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

/// Tracing configuration (filters, layers).
pub mod tracing;
