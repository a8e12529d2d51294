// Queue board and partition counts
// Same ranking and estimation the dispatch cycle uses

use crate::application::estimate::{estimated_wait, DurationCache, WaitTimeEstimator};
use crate::application::partition::{partition_by_affinity, rank_by_affinity};
use crate::domain::{Affinity, EntryId, Provider, ProviderId};
use crate::error::{AppError, Result};
use crate::port::{ProviderStore, QueueStore, ShopStore};
use serde::Serialize;
use std::collections::HashMap;

/// One waiting customer as shown on the shop's board
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardRow {
    pub entry_id: EntryId,
    pub customer_name: String,
    pub affinity: Affinity,
    pub provider_name: Option<String>,
    pub position: u32,
    pub estimated_wait: u32,
    pub minutes_waited: i64,
    pub notified: bool,
}

/// Waiting count of one partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionCount {
    pub affinity: Affinity,
    pub provider_name: Option<String>,
    pub waiting: usize,
}

fn names_by_id(providers: &[Provider]) -> HashMap<&str, &str> {
    providers
        .iter()
        .map(|p| (p.id.as_str(), p.name.as_str()))
        .collect()
}

pub async fn board(
    queue_store: &dyn QueueStore,
    shop_store: &dyn ShopStore,
    provider_store: &dyn ProviderStore,
    estimator: &WaitTimeEstimator,
    shop_id: &str,
    now_millis: i64,
) -> Result<Vec<BoardRow>> {
    let shop = shop_store
        .get_config(shop_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Shop {} not found", shop_id)))?;

    let providers = provider_store.list_by_shop(shop_id).await?;
    let names = names_by_id(&providers);

    let snapshot = queue_store.fetch_waiting(shop_id).await?;
    let mut cache = DurationCache::new();
    let mut rows = Vec::with_capacity(snapshot.len());

    for ranked in rank_by_affinity(&snapshot) {
        let duration = estimator
            .service_duration(
                ranked.entry.requested_provider.as_deref(),
                shop.default_service_minutes,
                &mut cache,
            )
            .await;

        rows.push(BoardRow {
            provider_name: ranked
                .affinity
                .provider_id()
                .and_then(|id| names.get(id))
                .map(|name| name.to_string()),
            position: ranked.position,
            estimated_wait: estimated_wait(ranked.position, duration.minutes),
            minutes_waited: (now_millis - ranked.entry.joined_at).max(0) / 60_000,
            notified: ranked.entry.notified,
            entry_id: ranked.entry.id,
            customer_name: ranked.entry.customer_name,
            affinity: ranked.affinity,
        });
    }

    Ok(rows)
}

/// Any-provider partition, every active provider, and any inactive provider
/// that still has customers waiting
pub async fn customers_ahead(
    queue_store: &dyn QueueStore,
    provider_store: &dyn ProviderStore,
    shop_id: &str,
) -> Result<Vec<PartitionCount>> {
    let providers = provider_store.list_by_shop(shop_id).await?;
    let snapshot = queue_store.fetch_waiting(shop_id).await?;
    let partitions = partition_by_affinity(&snapshot);

    let count = |affinity: &Affinity| partitions.get(affinity).map_or(0, Vec::len);

    let mut counts = vec![PartitionCount {
        affinity: Affinity::AnyProvider,
        provider_name: None,
        waiting: count(&Affinity::AnyProvider),
    }];

    let mut listed: Vec<&ProviderId> = Vec::new();
    for provider in &providers {
        let affinity = Affinity::Provider(provider.id.clone());
        let waiting = count(&affinity);
        if provider.active || waiting > 0 {
            listed.push(&provider.id);
            counts.push(PartitionCount {
                affinity,
                provider_name: Some(provider.name.clone()),
                waiting,
            });
        }
    }

    // Requests naming a provider the shop no longer lists
    for (affinity, members) in &partitions {
        if let Affinity::Provider(id) = affinity {
            if !listed.contains(&id) {
                counts.push(PartitionCount {
                    affinity: affinity.clone(),
                    provider_name: None,
                    waiting: members.len(),
                });
            }
        }
    }

    Ok(counts)
}
