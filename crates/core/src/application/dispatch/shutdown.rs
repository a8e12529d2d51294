// Stop signal for the notification scheduler

use tokio::sync::watch;

/// Receiving side, polled by the scheduler loop between cycles.
/// A dropped sender counts as a stop request, so losing the handle
/// cannot leave the loop running forever.
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once stop is requested (returns immediately if it already was)
    pub async fn requested(&mut self) {
        // wait_for errs only when the sender is gone
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    pub fn request(&self) {
        self.tx.send_replace(true);
    }
}

pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_request_wakes_waiter() {
        let (sender, mut token) = shutdown_channel();
        assert!(!token.is_requested());

        let waiter = tokio::spawn(async move {
            token.requested().await;
            token.is_requested()
        });
        sender.request();

        let observed = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(observed);
    }

    #[tokio::test]
    async fn test_late_waiter_returns_immediately() {
        let (sender, mut token) = shutdown_channel();
        sender.request();

        tokio::time::timeout(Duration::from_millis(100), token.requested())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_sender_counts_as_request() {
        let (sender, mut token) = shutdown_channel();
        drop(sender);

        assert!(token.is_requested());
        tokio::time::timeout(Duration::from_millis(100), token.requested())
            .await
            .unwrap();
    }
}
