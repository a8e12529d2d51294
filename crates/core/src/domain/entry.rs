// Queue Entry Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::provider::ProviderId;
use crate::domain::shop::ShopId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Entry ID (UUID v4)
pub type EntryId = String;

/// Entry status. Only `Waiting` entries take part in ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Waiting,
    Removed,
    Served,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Waiting => "waiting",
            EntryStatus::Removed => "removed",
            EntryStatus::Served => "served",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "waiting" => Ok(EntryStatus::Waiting),
            "removed" => Ok(EntryStatus::Removed),
            "served" => Ok(EntryStatus::Served),
            other => Err(DomainError::ValidationError(format!(
                "unknown entry status: {}",
                other
            ))),
        }
    }
}

/// Affinity partition key.
///
/// Entries that requested the same provider share a partition; entries with no
/// request form the "any provider" partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Affinity {
    AnyProvider,
    Provider(ProviderId),
}

impl Affinity {
    pub fn of(requested_provider: Option<&str>) -> Self {
        match requested_provider {
            Some(id) => Affinity::Provider(id.to_string()),
            None => Affinity::AnyProvider,
        }
    }

    pub fn provider_id(&self) -> Option<&str> {
        match self {
            Affinity::AnyProvider => None,
            Affinity::Provider(id) => Some(id),
        }
    }
}

impl std::fmt::Display for Affinity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Affinity::AnyProvider => f.write_str("any"),
            Affinity::Provider(id) => f.write_str(id),
        }
    }
}

/// Queue Entry Entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: EntryId,
    pub shop_id: ShopId,
    pub customer_name: String,
    pub phone_number: String,
    pub requested_provider: Option<ProviderId>,
    pub status: EntryStatus,
    pub joined_at: i64, // epoch ms
    pub notified: bool,
}

impl QueueEntry {
    /// Create a new waiting entry
    ///
    /// # Arguments
    ///
    /// * `id` - Unique entry ID (injected, not generated)
    /// * `joined_at` - Join timestamp in epoch ms (injected, not system time)
    pub fn new(
        id: impl Into<String>,
        joined_at: i64,
        shop_id: impl Into<String>,
        customer_name: impl Into<String>,
        phone_number: impl Into<String>,
        requested_provider: Option<ProviderId>,
    ) -> Self {
        Self {
            id: id.into(),
            shop_id: shop_id.into(),
            customer_name: customer_name.into(),
            phone_number: phone_number.into(),
            requested_provider,
            status: EntryStatus::Waiting,
            joined_at,
            notified: false,
        }
    }

    pub fn affinity(&self) -> Affinity {
        Affinity::of(self.requested_provider.as_deref())
    }

    pub fn is_waiting(&self) -> bool {
        self.status == EntryStatus::Waiting
    }

    /// Leave the queue without being served
    pub fn remove(&mut self) -> Result<()> {
        self.finish(EntryStatus::Removed)
    }

    /// Mark as served
    pub fn serve(&mut self) -> Result<()> {
        self.finish(EntryStatus::Served)
    }

    fn finish(&mut self, to: EntryStatus) -> Result<()> {
        if self.status != EntryStatus::Waiting {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}
