use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Detects signals sent to the process and cancels `cancelation` on the first one.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Can't listen for SIGTERM {e:?}");
                wait_for_ctrl_c(&cancelation).await;
                return;
            }
        };
        select! {
            _ = tokio::signal::ctrl_c() => (),
            _ = terminate.recv() => (),
            _ = cancelation.cancelled() => return,
        };
        info!("Received shutdown signal");
        cancelation.cancel();
    }
    #[cfg(not(unix))]
    wait_for_ctrl_c(&cancelation).await;
}

async fn wait_for_ctrl_c(cancelation: &CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received ctrl-c");
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}
