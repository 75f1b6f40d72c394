//! Process shutdown on SIGINT / SIGTERM

use tokio::sync::watch;
use tracing::{info, warn};

/// Cloneable handle that resolves once the process should stop
#[derive(Debug, Clone)]
pub struct Trigger {
    rx: watch::Receiver<bool>,
}

impl Trigger {
    /// Listen for termination signals in a background task
    pub fn install() -> Self {
        let (tx, trigger) = Self::manual();
        tokio::spawn(async move {
            let signal = wait_for_signal().await;
            info!("Received shutdown signal: {}", signal);
            let _ = tx.send(true);
        });
        trigger
    }

    /// A trigger fired by hand through the returned sender
    pub fn manual() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// Wait until shutdown is requested (or the sender is gone)
    pub async fn wait(mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

async fn wait_for_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                return tokio::select! {
                    _ = tokio::signal::ctrl_c() => "SIGINT",
                    _ = terminate.recv() => "SIGTERM",
                };
            }
            Err(e) => warn!("Cannot listen for SIGTERM: {}", e),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => "SIGINT",
        Err(e) => {
            warn!("Cannot listen for SIGINT: {}", e);
            std::future::pending().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_manual_trigger_wakes_every_clone() {
        let (tx, trigger) = Trigger::manual();
        let first = tokio::spawn(trigger.clone().wait());
        let second = tokio::spawn(trigger.wait());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!first.is_finished());

        tx.send(true).expect("no waiters");
        timeout(Duration::from_secs(1), first)
            .await
            .expect("first waiter stuck")
            .expect("first waiter panicked");
        timeout(Duration::from_secs(1), second)
            .await
            .expect("second waiter stuck")
            .expect("second waiter panicked");
    }
}
