// Shop Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::provider::validate_duration;
use serde::{Deserialize, Serialize};

/// Shop identifier
pub type ShopId = String;

/// Shop-level notification configuration.
///
/// `notify_threshold` is minutes of estimated wait or a position count,
/// depending on the configured threshold policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopConfig {
    pub id: ShopId,
    pub name: String,
    pub notify_threshold: u32,
    pub default_service_minutes: u32,
}

impl ShopConfig {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        notify_threshold: u32,
        default_service_minutes: u32,
    ) -> Result<Self> {
        Ok(Self {
            id: id.into(),
            name: name.into(),
            notify_threshold: validate_threshold(notify_threshold)?,
            default_service_minutes: validate_duration(default_service_minutes)?,
        })
    }
}

pub fn validate_threshold(threshold: u32) -> Result<u32> {
    if threshold == 0 {
        return Err(DomainError::ValidationError(
            "notify threshold must be at least 1".to_string(),
        ));
    }
    Ok(threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shop_config_rejects_zero_values() {
        assert!(ShopConfig::new("s", "Fade Lab", 0, 15).is_err());
        assert!(ShopConfig::new("s", "Fade Lab", 15, 0).is_err());
        assert!(ShopConfig::new("s", "Fade Lab", 15, 15).is_ok());
    }
}
