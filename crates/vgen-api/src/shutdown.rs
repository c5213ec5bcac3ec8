//! Graceful shutdown.
//!
//! The scheduler is stopped as soon as the signal arrives, before the server
//! waits on open requests. Trigger requests for queued jobs then resolve with
//! 503 instead of holding the server open until those jobs would have run.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};
use vgen_pipeline::RenderScheduler;

/// Wait for `signal`, then stop `scheduler` within `timeout`.
///
/// Returns whether every in-flight job finished in time.
pub async fn drain_on_signal<F>(signal: F, scheduler: RenderScheduler, timeout: Duration) -> bool
where
    F: Future<Output = ()>,
{
    signal.await;

    let status = scheduler.status();
    info!(
        queued = status.queued,
        running = status.running,
        "Shutdown requested, draining render queue"
    );

    let finished = scheduler.stop(timeout).await;
    if !finished {
        warn!(timeout_secs = timeout.as_secs(), "Render jobs still running at shutdown");
    }
    finished
}

/// Resolves on ctrl-c.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
