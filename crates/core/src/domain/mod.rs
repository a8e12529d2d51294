// Domain Layer - Pure business logic and entities

pub mod entry;
pub mod error;
pub mod provider;
pub mod shop;

// Re-exports
pub use entry::{Affinity, EntryId, EntryStatus, QueueEntry};
pub use error::DomainError;
pub use provider::{Provider, ProviderId, DEFAULT_SERVICE_MINUTES};
pub use shop::{ShopConfig, ShopId};
