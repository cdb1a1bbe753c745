//! Tracing for tests
//!
//! Honors `RUST_LOG`; defaults to `warn` so failing postings are visible.

use tracing_subscriber::EnvFilter;

/// Installs a test-friendly subscriber once per process
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
