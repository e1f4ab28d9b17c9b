//! Subscriber installation.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or malformed.
pub const DEFAULT_FILTER: &str = "info";

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// JSON logs with timestamps, filtered by `RUST_LOG` (default `info`).
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(DEFAULT_FILTER))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

/// Compact, human-readable output routed through the test harness so it is
/// only shown for failing tests. Defaults to `debug`.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("debug"))
        .compact()
        .with_test_writer()
        .try_init();
}
