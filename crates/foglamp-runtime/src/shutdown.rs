//! Graceful shutdown signalling, grounded on the teacher's
//! `AlloyRuntime::wait_for_shutdown`: SIGTERM on unix, Ctrl+C everywhere.

use tokio::signal;
use tracing::info;

/// Resolves once SIGTERM (unix) or Ctrl+C is received.
///
/// Per `spec.md` §4.4 step 8, this flips the Sending Process's
/// `stop_execution` flag; the caller is responsible for propagating that
/// into the fetcher/sender loop (see `foglamp-core::ring`).
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .expect("failed to listen for Ctrl+C");
        info!("received Ctrl+C, shutting down");
    }
}
