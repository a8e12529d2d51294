// Shop and provider administration

use crate::domain::provider::validate_duration;
use crate::domain::shop::validate_threshold;
use crate::domain::{Provider, ShopConfig};
use crate::error::{AppError, Result};
use crate::port::{ProviderStore, ShopStore};
use tracing::info;

async fn load_shop(shop_store: &dyn ShopStore, shop_id: &str) -> Result<ShopConfig> {
    shop_store
        .get_config(shop_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Shop {} not found", shop_id)))
}

async fn load_provider(provider_store: &dyn ProviderStore, provider_id: &str) -> Result<Provider> {
    provider_store
        .find_by_id(&provider_id.to_string())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Provider {} not found", provider_id)))
}

pub async fn set_notify_threshold(
    shop_store: &dyn ShopStore,
    shop_id: &str,
    threshold: u32,
) -> Result<ShopConfig> {
    let mut shop = load_shop(shop_store, shop_id).await?;
    shop.notify_threshold = validate_threshold(threshold)?;
    shop_store.upsert(&shop).await?;
    info!(shop_id = %shop_id, threshold = threshold, "Notify threshold updated");
    Ok(shop)
}

pub async fn set_default_service_minutes(
    shop_store: &dyn ShopStore,
    shop_id: &str,
    minutes: u32,
) -> Result<ShopConfig> {
    let mut shop = load_shop(shop_store, shop_id).await?;
    shop.default_service_minutes = validate_duration(minutes)?;
    shop_store.upsert(&shop).await?;
    info!(shop_id = %shop_id, minutes = minutes, "Default service duration updated");
    Ok(shop)
}

/// New providers start at the default average duration and active
pub async fn add_provider(
    provider_store: &dyn ProviderStore,
    shop_store: &dyn ShopStore,
    provider: Provider,
) -> Result<Provider> {
    load_shop(shop_store, &provider.shop_id).await?;
    if provider.name.trim().is_empty() {
        return Err(AppError::Validation(
            "Provider name cannot be empty".to_string(),
        ));
    }
    provider_store.insert(&provider).await?;
    info!(provider_id = %provider.id, shop_id = %provider.shop_id, "Provider added");
    Ok(provider)
}

pub async fn set_provider_duration(
    provider_store: &dyn ProviderStore,
    provider_id: &str,
    minutes: u32,
) -> Result<Provider> {
    let mut provider = load_provider(provider_store, provider_id).await?;
    provider.set_average_service_minutes(minutes)?;
    provider_store.update(&provider).await?;
    info!(provider_id = %provider_id, minutes = minutes, "Provider duration updated");
    Ok(provider)
}

pub async fn set_provider_active(
    provider_store: &dyn ProviderStore,
    provider_id: &str,
    active: bool,
) -> Result<Provider> {
    let mut provider = load_provider(provider_store, provider_id).await?;
    provider.active = active;
    provider_store.update(&provider).await?;
    info!(provider_id = %provider_id, active = active, "Provider availability changed");
    Ok(provider)
}
