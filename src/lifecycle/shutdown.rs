//! Shutdown coordination.

use tokio::sync::broadcast;

/// Broadcasts one shutdown signal to every long-running task (HTTP server,
/// config reload loop).
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Trigger once Ctrl+C is received.
    pub async fn trigger_on_ctrl_c(self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                self.trigger();
            }
            Err(e) => tracing::error!(error = %e, "Failed to install Ctrl+C handler"),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.clone().subscribe();
        shutdown.trigger();
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }
}
