//! Tracing setup shared by binaries and tests embedding the engine.
//!
//! The engine crates only emit `tracing` events; nothing is printed unless the
//! host installs a subscriber, e.g. through [`init`].

/// Initialize process-wide tracing (JSON, filtered by `RUST_LOG`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, formatters).
pub mod tracing;
