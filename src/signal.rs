//! Signal handling for graceful shutdown.

use tracing::{error, info, warn};

/// Wait for SIGINT (Ctrl+C) or, on Unix, SIGTERM.
///
/// If no handler can be installed this never returns, so the caller keeps
/// running until it is stopped some other way.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => on_ctrl_c(result).await,
                    _ = sigterm.recv() => {
                        info!(signal = "SIGTERM", "Signal received");
                    }
                }
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler, only Ctrl+C will stop: {e}"),
        }
    }

    on_ctrl_c(tokio::signal::ctrl_c().await).await;
}

async fn on_ctrl_c(result: std::io::Result<()>) {
    match result {
        Ok(()) => info!(signal = "SIGINT", "Signal received"),
        Err(e) => {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    }
}
