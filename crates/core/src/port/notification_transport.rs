// Notification Transport Port
// Abstraction over the SMS provider

use async_trait::async_trait;
use thiserror::Error;

/// Confirmation returned by the transport on a successful send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub delivery_id: String,
}

/// Transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Message rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid transport response: {0}")]
    InvalidResponse(String),
}

/// Notification Transport trait
///
/// Implementations:
/// - TwilioTransport: Twilio REST API
/// - LogTransport: dry run, logs the message only
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Send `message` to `address` (E.164 phone number)
    ///
    /// # Errors
    /// - TransportError::Rejected if the provider refused the message
    /// - TransportError::Unavailable if the provider could not be reached
    async fn send(&self, address: &str, message: &str) -> Result<SendReceipt, TransportError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Mock transport behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed
        Success,
        /// Always fail with message
        Fail(String),
        /// Fail for one address, succeed for others
        FailFor(String),
    }

    /// Mock Notification Transport for testing
    pub struct MockTransport {
        behavior: Arc<Mutex<MockBehavior>>,
        sent: Arc<Mutex<Vec<(String, String)>>>,
        delay: Option<Duration>,
    }

    impl MockTransport {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                sent: Arc::new(Mutex::new(Vec::new())),
                delay: None,
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }

        /// Hold every send for `delay` (widens race windows in tests)
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        /// Attempts made, successful or not
        pub fn call_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        /// (address, message) pairs in call order
        pub fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }

        pub fn sends_to(&self, address: &str) -> usize {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(to, _)| to == address)
                .count()
        }
    }

    #[async_trait]
    impl NotificationTransport for MockTransport {
        async fn send(&self, address: &str, message: &str) -> Result<SendReceipt, TransportError> {
            let attempt = {
                let mut sent = self.sent.lock().unwrap();
                sent.push((address.to_string(), message.to_string()));
                sent.len()
            };

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let behavior = self.behavior.lock().unwrap().clone();
            match behavior {
                MockBehavior::Success => Ok(SendReceipt {
                    delivery_id: format!("mock-{}", attempt),
                }),
                MockBehavior::Fail(msg) => Err(TransportError::Unavailable(msg)),
                MockBehavior::FailFor(to) if to == address => Err(TransportError::Rejected {
                    status: 400,
                    message: "mock rejection".to_string(),
                }),
                MockBehavior::FailFor(_) => Ok(SendReceipt {
                    delivery_id: format!("mock-{}", attempt),
                }),
            }
        }
    }
}
