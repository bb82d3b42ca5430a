//! Log output for tests.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs a test-friendly `tracing` subscriber once per process.
///
/// Output goes through the test harness's capture, so it only shows for
/// failing tests (or with `--nocapture`). The filter is read from
/// `RUST_LOG` and defaults to `warn`.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
