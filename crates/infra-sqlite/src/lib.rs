// Walkin Infrastructure - SQLite Adapter
// Implements: QueueStore, ProviderStore, ShopStore

mod connection;
mod error;
mod migration;
mod provider_store;
mod queue_store;
mod shop_store;

pub use connection::create_pool;
pub use migration::run_migrations;
pub use provider_store::SqliteProviderStore;
pub use queue_store::SqliteQueueStore;
pub use shop_store::SqliteShopStore;
pub use sqlx::SqlitePool;
