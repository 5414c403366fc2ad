//! Shared helpers for virtual actor integration tests.

use std::future::Future;
use std::time::Duration;

/// Run a future on a current-thread runtime inside a `LocalSet`, the
/// execution model the layer expects.
pub fn run_local<F: Future>(future: F) -> F::Output {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("failed to build runtime");
    tokio::task::LocalSet::new().block_on(&runtime, future)
}

/// Give background tasks (discovery listener, sweeps) a chance to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
