use tokio_util::sync::CancellationToken;

// Wait for either SIGINT (Ctrl+C) or SIGTERM
#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                result = tokio::signal::ctrl_c() => result,
                _ = sigterm.recv() => Ok(()),
            }
        }
        Err(_) => {
            // SIGTERM registration failed — fall back to SIGINT only
            tokio::signal::ctrl_c().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// First signal cancels `cancel` so the running transfer stops and flushes;
/// a second one exits immediately.
pub async fn wait_for_ctrl_c(cancel: CancellationToken) {
    if wait_for_signal().await.is_err() {
        return;
    }

    eprintln!("\n  ⚠ Stopping transfer... (press Ctrl+C again to force quit)");
    cancel.cancel();

    if wait_for_signal().await.is_ok() {
        eprintln!("\n  ✖ Force quit.");
        std::process::exit(130);
    }
}

pub fn spawn_signal_handler(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(wait_for_ctrl_c(cancel))
}
