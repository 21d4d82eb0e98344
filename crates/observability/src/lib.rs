//! Shared tracing setup for the API server and the subscription sweeper.

/// Initialize JSON logging with an `info` default.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init_with_default("info");
}

/// Log filter and subscriber configuration.
pub mod tracing;
