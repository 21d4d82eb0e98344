//! Tracing/logging initialization.
//!
//! JSON lines on stdout, filtered by `RUST_LOG`. Business events are logged
//! with structured fields (`company`, `plan`, `origin`, ...) rather than
//! interpolated into the message.

use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, falling back to `default_directive`.
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install the global JSON subscriber.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_with_default(default_directive: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directive))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .with_current_span(true)
        .try_init();
}
