// Provider Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::shop::ShopId;
use serde::{Deserialize, Serialize};

/// Provider identifier
pub type ProviderId = String;

/// Average service duration assigned to newly added providers (minutes)
pub const DEFAULT_SERVICE_MINUTES: u32 = 20;

/// Service provider. Read-only from the notification engine's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub shop_id: ShopId,
    pub name: String,
    pub average_service_minutes: u32,
    pub active: bool,
}

impl Provider {
    pub fn new(id: impl Into<String>, shop_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            shop_id: shop_id.into(),
            name: name.into(),
            average_service_minutes: DEFAULT_SERVICE_MINUTES,
            active: true,
        }
    }

    pub fn set_average_service_minutes(&mut self, minutes: u32) -> Result<()> {
        self.average_service_minutes = validate_duration(minutes)?;
        Ok(())
    }
}

/// Service durations are positive whole minutes
pub fn validate_duration(minutes: u32) -> Result<u32> {
    if minutes == 0 {
        return Err(DomainError::InvalidDuration(minutes));
    }
    Ok(minutes)
}
