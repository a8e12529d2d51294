// Queue Service - front desk and admin use cases

pub mod admin;
pub mod board;
pub mod join;


pub use board::{BoardRow, PartitionCount};
pub use join::JoinRequest;

use crate::application::estimate::WaitTimeEstimator;
use crate::domain::{EntryStatus, Provider, QueueEntry, ShopConfig};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, ProviderStore, QueueStore, ShopStore, TimeProvider};
use std::sync::Arc;
use tracing::info;

/// Everything outside the notification loop: joining, leaving, the board,
/// and shop/provider settings
pub struct QueueService {
    queue_store: Arc<dyn QueueStore>,
    provider_store: Arc<dyn ProviderStore>,
    shop_store: Arc<dyn ShopStore>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    estimator: WaitTimeEstimator,
}

impl QueueService {
    pub fn new(
        queue_store: Arc<dyn QueueStore>,
        provider_store: Arc<dyn ProviderStore>,
        shop_store: Arc<dyn ShopStore>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            queue_store,
            estimator: WaitTimeEstimator::new(Arc::clone(&provider_store)),
            provider_store,
            shop_store,
            id_provider,
            time_provider,
        }
    }

    /// Add a customer to the queue
    pub async fn join(&self, req: JoinRequest) -> Result<QueueEntry> {
        let entry = join::execute(
            self.queue_store.as_ref(),
            self.provider_store.as_ref(),
            self.shop_store.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            req,
        )
        .await?;
        info!(
            entry_id = %entry.id,
            shop_id = %entry.shop_id,
            affinity = %entry.affinity(),
            "Customer joined queue"
        );
        Ok(entry)
    }

    /// Customer left without being served
    pub async fn remove(&self, entry_id: &str) -> Result<QueueEntry> {
        self.finish(entry_id, EntryStatus::Removed).await
    }

    /// Customer was served
    pub async fn serve(&self, entry_id: &str) -> Result<QueueEntry> {
        self.finish(entry_id, EntryStatus::Served).await
    }

    async fn finish(&self, entry_id: &str, status: EntryStatus) -> Result<QueueEntry> {
        let id = entry_id.to_string();
        let mut entry = self
            .queue_store
            .find_by_id(&id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Entry {} not found", entry_id)))?;

        match status {
            EntryStatus::Served => entry.serve()?,
            _ => entry.remove()?,
        }
        self.queue_store.finish(&id, status).await?;

        info!(entry_id = %entry_id, status = %status, "Queue entry finished");
        Ok(entry)
    }

    pub async fn board(&self, shop_id: &str) -> Result<Vec<BoardRow>> {
        board::board(
            self.queue_store.as_ref(),
            self.shop_store.as_ref(),
            self.provider_store.as_ref(),
            &self.estimator,
            shop_id,
            self.time_provider.now_millis(),
        )
        .await
    }

    pub async fn customers_ahead(&self, shop_id: &str) -> Result<Vec<PartitionCount>> {
        board::customers_ahead(
            self.queue_store.as_ref(),
            self.provider_store.as_ref(),
            shop_id,
        )
        .await
    }

    /// Create or replace a shop
    pub async fn init_shop(&self, config: ShopConfig) -> Result<ShopConfig> {
        self.shop_store.upsert(&config).await?;
        info!(shop_id = %config.id, "Shop saved");
        Ok(config)
    }

    pub async fn set_notify_threshold(&self, shop_id: &str, threshold: u32) -> Result<ShopConfig> {
        admin::set_notify_threshold(self.shop_store.as_ref(), shop_id, threshold).await
    }

    pub async fn set_default_service_minutes(
        &self,
        shop_id: &str,
        minutes: u32,
    ) -> Result<ShopConfig> {
        admin::set_default_service_minutes(self.shop_store.as_ref(), shop_id, minutes).await
    }

    /// Add a provider with a generated ID
    pub async fn add_provider(&self, shop_id: &str, name: &str) -> Result<Provider> {
        let provider = Provider::new(self.id_provider.generate_id(), shop_id, name.trim());
        admin::add_provider(
            self.provider_store.as_ref(),
            self.shop_store.as_ref(),
            provider,
        )
        .await
    }

    pub async fn list_providers(&self, shop_id: &str) -> Result<Vec<Provider>> {
        self.provider_store.list_by_shop(shop_id).await
    }

    pub async fn set_provider_duration(&self, provider_id: &str, minutes: u32) -> Result<Provider> {
        admin::set_provider_duration(self.provider_store.as_ref(), provider_id, minutes).await
    }

    pub async fn set_provider_active(&self, provider_id: &str, active: bool) -> Result<Provider> {
        admin::set_provider_active(self.provider_store.as_ref(), provider_id, active).await
    }
}
