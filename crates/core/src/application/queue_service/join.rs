// Join Use Case

use crate::domain::{ProviderId, QueueEntry};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, ProviderStore, QueueStore, ShopStore, TimeProvider};
use serde::{Deserialize, Serialize};

/// Longest accepted customer name (characters)
pub const MAX_NAME_LEN: usize = 100;

/// Join request from the front desk or a customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub shop_id: String,
    pub customer_name: String,
    pub phone_number: String,

    #[serde(default)]
    pub requested_provider: Option<ProviderId>,
}

/// Validate request fields that need no store access
pub fn validate_request(req: &JoinRequest) -> Result<()> {
    let name = req.customer_name.trim();
    if name.is_empty() {
        return Err(AppError::Validation(
            "Customer name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Customer name too long (max {} characters)",
            MAX_NAME_LEN
        )));
    }
    if !is_e164(&req.phone_number) {
        return Err(AppError::Validation(format!(
            "Phone number must be E.164 ('+' and 10-15 digits), got '{}'",
            req.phone_number
        )));
    }
    Ok(())
}

/// `+` followed by 10 to 15 ASCII digits
pub fn is_e164(phone: &str) -> bool {
    match phone.strip_prefix('+') {
        Some(digits) => {
            (10..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// Execute join use case
///
/// # Arguments
///
/// * `id_provider` - Entry ID generator (injected for determinism)
/// * `time_provider` - Join timestamp source (injected for determinism)
pub async fn execute(
    queue_store: &dyn QueueStore,
    provider_store: &dyn ProviderStore,
    shop_store: &dyn ShopStore,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    req: JoinRequest,
) -> Result<QueueEntry> {
    validate_request(&req)?;

    if shop_store.get_config(&req.shop_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Shop {} not found", req.shop_id)));
    }

    if let Some(provider_id) = &req.requested_provider {
        match provider_store.find_by_id(provider_id).await? {
            Some(p) if p.shop_id == req.shop_id && p.active => {}
            Some(p) if p.shop_id == req.shop_id => {
                return Err(AppError::Validation(format!(
                    "Provider {} is not currently available",
                    p.name
                )));
            }
            _ => {
                return Err(AppError::Validation(format!(
                    "Provider {} does not work at shop {}",
                    provider_id, req.shop_id
                )));
            }
        }
    }

    let entry = QueueEntry::new(
        id_provider.generate_id(),
        time_provider.now_millis(),
        req.shop_id,
        req.customer_name.trim(),
        req.phone_number,
        req.requested_provider,
    );

    queue_store.insert(&entry).await?;
    Ok(entry)
}
