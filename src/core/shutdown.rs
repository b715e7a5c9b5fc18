use tokio::signal;
use tokio::sync::watch;

pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

/// Broadcast channel flipped to `true` once shutdown begins.
///
/// Receivers are handed to worker loops and to the retry backoff so that a
/// pending sleep ends as soon as the process starts draining.
pub(crate) fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Waits for an OS signal, then notifies every receiver of `tx`.
pub(crate) async fn broadcast_on_signal(tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = tx.send(true);
}

pub(crate) fn is_shutting_down(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}
