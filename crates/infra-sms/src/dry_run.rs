// Dry-run transport: logs instead of sending

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;
use walkin_core::application::message::mask_address;
use walkin_core::port::{NotificationTransport, SendReceipt, TransportError};

/// Always succeeds; used for local runs and `walkin notify --once` without credentials
#[derive(Default)]
pub struct LogTransport {
    sent: AtomicU64,
}

impl LogTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn send(&self, address: &str, message: &str) -> Result<SendReceipt, TransportError> {
        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        let delivery_id = format!("dry-run-{}", n);
        info!(
            to = %mask_address(address),
            delivery_id = %delivery_id,
            message = %message,
            "SMS (dry run)"
        );
        Ok(SendReceipt { delivery_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_transport_counts_sends() {
        let transport = LogTransport::new();
        let first = transport.send("+15550001111", "hi").await.unwrap();
        let second = transport.send("+15550002222", "hi").await.unwrap();

        assert_eq!(first.delivery_id, "dry-run-1");
        assert_eq!(second.delivery_id, "dry-run-2");
        assert_eq!(transport.sent_count(), 2);
    }
}
