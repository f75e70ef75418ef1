// Worker Shutdown Token

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Shutdown signal for graceful termination
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for shutdown signal
    pub async fn wait(&mut self) {
        let _ = self.rx.changed().await;
    }

    /// Resolve once shutdown is requested. Pends forever if the sender is
    /// dropped without signalling.
    ///
    /// Takes `&self` so an in-flight request can race against it.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Shutdown sender
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Signal shutdown to all workers
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

/// Signal shutdown and wait up to `grace` for the task to finish.
///
/// Returns false (and logs) on timeout; a slow stop is never fatal.
pub async fn shutdown_with_grace<T>(
    sender: &ShutdownSender,
    handle: JoinHandle<T>,
    grace: Duration,
) -> bool {
    sender.shutdown();
    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(_)) => {
            info!("Task stopped gracefully");
            true
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Task ended abnormally during shutdown");
            true
        }
        Err(_) => {
            warn!(grace_secs = grace.as_secs(), "Shutdown grace period elapsed");
            false
        }
    }
}
