// Wait time estimation
use crate::domain::ProviderId;
use crate::port::{DurationLookup, ProviderStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Where a service duration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationSource {
    /// Provider's own average
    Provider,
    /// No provider requested: shop default
    ShopDefault,
    /// Requested provider does not exist: shop default
    FallbackMissing,
    /// Provider lookup errored: shop default
    FallbackError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDuration {
    pub minutes: u32,
    pub source: DurationSource,
}

/// `position × average service duration`, in minutes
pub fn estimated_wait(position: u32, average_service_minutes: u32) -> u32 {
    position.saturating_mul(average_service_minutes)
}

/// Resolves per-entry service durations, degrading to the shop default
///
/// Lookups are memoised for the lifetime of one `DurationCache`, which the
/// dispatch cycle creates fresh every pass.
pub struct WaitTimeEstimator {
    provider_store: Arc<dyn ProviderStore>,
}

/// Per-cycle memo of provider lookups
pub type DurationCache = HashMap<ProviderId, ServiceDuration>;

impl WaitTimeEstimator {
    pub fn new(provider_store: Arc<dyn ProviderStore>) -> Self {
        Self { provider_store }
    }

    /// Average service duration for an entry's requested provider.
    ///
    /// Never fails: a missing provider or a lookup error yields the default.
    pub async fn service_duration(
        &self,
        requested_provider: Option<&str>,
        default_minutes: u32,
        cache: &mut DurationCache,
    ) -> ServiceDuration {
        let Some(provider_id) = requested_provider else {
            return ServiceDuration {
                minutes: default_minutes,
                source: DurationSource::ShopDefault,
            };
        };

        if let Some(cached) = cache.get(provider_id) {
            return *cached;
        }

        let resolved = match self
            .provider_store
            .average_service_duration(&provider_id.to_string())
            .await
        {
            Ok(DurationLookup::Found(minutes)) if minutes > 0 => ServiceDuration {
                minutes,
                source: DurationSource::Provider,
            },
            Ok(DurationLookup::Found(_)) | Ok(DurationLookup::NotFound) => {
                warn!(
                    provider_id = %provider_id,
                    default_minutes = default_minutes,
                    "Provider duration unavailable, using shop default"
                );
                ServiceDuration {
                    minutes: default_minutes,
                    source: DurationSource::FallbackMissing,
                }
            }
            Err(e) => {
                warn!(
                    provider_id = %provider_id,
                    error = %e,
                    "Provider lookup failed, using shop default"
                );
                ServiceDuration {
                    minutes: default_minutes,
                    source: DurationSource::FallbackError,
                }
            }
        };

        cache.insert(provider_id.to_string(), resolved);
        resolved
    }
}
