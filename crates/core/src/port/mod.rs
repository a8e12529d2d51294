// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod notification_transport;
pub mod provider_store;
pub mod queue_store;
pub mod shop_store;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use notification_transport::{NotificationTransport, SendReceipt, TransportError};
pub use provider_store::{DurationLookup, ProviderStore};
pub use queue_store::{ClaimOutcome, MarkOutcome, NotificationClaim, QueueStore};
pub use shop_store::ShopStore;
pub use time_provider::TimeProvider;
