// Dispatch Cycle - one notification pass over a shop's queue

pub mod constants;
mod scheduler;
mod shutdown;

pub use scheduler::{NotificationScheduler, SchedulerHandle};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::estimate::{estimated_wait, DurationCache, WaitTimeEstimator};
use crate::application::gate::{GateOutcome, NotificationGate};
use crate::application::message::reminder_text;
use crate::application::partition::{rank_by_affinity, RankedEntry};
use crate::application::threshold::{Candidate, Eligibility, ThresholdEvaluator};
use crate::domain::{EntryId, ProviderId, ShopConfig, ShopId};
use crate::error::{AppError, Result};
use crate::port::{ProviderStore, QueueStore, ShopStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Idle between ticks, Running while a pass is in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Running,
}

/// Counters for one completed pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Waiting entries in the snapshot
    pub waiting: usize,
    /// Of those, not yet notified
    pub pending: usize,
    pub eligible: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub already_notified: usize,
    pub transport_failures: usize,
    /// Entries whose processing failed with a store error
    pub entry_errors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another pass of this cycle was still running
    Skipped,
}

/// One shop's notification pass: fetch -> rank -> estimate -> evaluate -> dispatch
pub struct DispatchCycle {
    shop_id: ShopId,
    shop_store: Arc<dyn ShopStore>,
    queue_store: Arc<dyn QueueStore>,
    provider_store: Arc<dyn ProviderStore>,
    estimator: WaitTimeEstimator,
    evaluator: Arc<dyn ThresholdEvaluator>,
    gate: NotificationGate,
    run_lock: Mutex<()>,
}

impl DispatchCycle {
    pub fn new(
        shop_id: impl Into<String>,
        shop_store: Arc<dyn ShopStore>,
        queue_store: Arc<dyn QueueStore>,
        provider_store: Arc<dyn ProviderStore>,
        evaluator: Arc<dyn ThresholdEvaluator>,
        gate: NotificationGate,
    ) -> Self {
        Self {
            shop_id: shop_id.into(),
            shop_store,
            queue_store,
            estimator: WaitTimeEstimator::new(Arc::clone(&provider_store)),
            provider_store,
            evaluator,
            gate,
            run_lock: Mutex::new(()),
        }
    }

    pub fn shop_id(&self) -> &str {
        &self.shop_id
    }

    pub fn state(&self) -> CycleState {
        match self.run_lock.try_lock() {
            Ok(_) => CycleState::Idle,
            Err(_) => CycleState::Running,
        }
    }

    /// Run one pass.
    ///
    /// # Errors
    /// - `AppError::Config` if the shop has no configuration
    /// - store errors while fetching the shop or the queue snapshot
    ///
    /// Per-entry failures are counted in the report, never returned.
    pub async fn run_once(&self) -> Result<CycleOutcome> {
        let Ok(_running) = self.run_lock.try_lock() else {
            debug!(shop_id = %self.shop_id, "Dispatch cycle already running, skipping");
            return Ok(CycleOutcome::Skipped);
        };

        let shop = self
            .shop_store
            .get_config(&self.shop_id)
            .await?
            .ok_or_else(|| {
                AppError::Config(format!("Shop {} has no configuration", self.shop_id))
            })?;

        let snapshot = self.queue_store.fetch_waiting(&self.shop_id).await?;
        let ranked = rank_by_affinity(&snapshot);

        let mut report = CycleReport {
            waiting: ranked.len(),
            ..Default::default()
        };
        let mut durations = DurationCache::new();
        let mut names = ProviderNames::new();

        for ranked_entry in ranked.iter().filter(|r| !r.entry.notified) {
            report.pending += 1;

            match self.process_entry(&shop, ranked_entry, &mut durations, &mut names).await {
                Ok(None) => {}
                Ok(Some(outcome)) => {
                    report.eligible += 1;
                    match outcome {
                        GateOutcome::Delivered { .. } => report.delivered += 1,
                        GateOutcome::Skipped => report.skipped += 1,
                        GateOutcome::AlreadyNotified { .. } | GateOutcome::Settled => {
                            report.already_notified += 1
                        }
                        GateOutcome::TransportFailed { .. } => report.transport_failures += 1,
                    }
                }
                Err(e) => {
                    report.entry_errors += 1;
                    error!(
                        shop_id = %self.shop_id,
                        entry_id = %ranked_entry.entry.id,
                        error = %e,
                        "Failed to process queue entry"
                    );
                }
            }
        }

        info!(
            shop_id = %self.shop_id,
            policy = %self.evaluator.policy(),
            threshold = shop.notify_threshold,
            waiting = report.waiting,
            pending = report.pending,
            eligible = report.eligible,
            delivered = report.delivered,
            transport_failures = report.transport_failures,
            entry_errors = report.entry_errors,
            "Dispatch cycle completed"
        );

        Ok(CycleOutcome::Completed(report))
    }

    /// Returns the gate outcome if the entry was eligible
    async fn process_entry(
        &self,
        shop: &ShopConfig,
        ranked: &RankedEntry,
        durations: &mut DurationCache,
        names: &mut ProviderNames,
    ) -> Result<Option<GateOutcome>> {
        let entry = &ranked.entry;
        let duration = self
            .estimator
            .service_duration(
                entry.requested_provider.as_deref(),
                shop.default_service_minutes,
                durations,
            )
            .await;

        let candidate = Candidate {
            position: ranked.position,
            estimated_wait: estimated_wait(ranked.position, duration.minutes),
            notified: entry.notified,
        };

        let eligibility = self.evaluator.evaluate(&candidate, shop.notify_threshold);
        debug!(
            entry_id = %entry.id,
            affinity = %ranked.affinity,
            position = candidate.position,
            estimated_wait = candidate.estimated_wait,
            duration_source = ?duration.source,
            eligibility = ?eligibility,
            "Evaluated queue entry"
        );

        if eligibility != Eligibility::Eligible {
            return Ok(None);
        }

        let provider_name = match entry.requested_provider.as_ref() {
            Some(provider_id) => self.provider_name(&entry.id, provider_id, names).await,
            None => None,
        };

        let message = reminder_text(
            entry,
            shop,
            candidate.estimated_wait,
            provider_name.as_deref(),
        );
        self.gate.dispatch(entry, &message).await.map(Some)
    }

    /// Display name for the message; a failed lookup drops the name, not the message
    async fn provider_name(
        &self,
        entry_id: &EntryId,
        provider_id: &ProviderId,
        names: &mut ProviderNames,
    ) -> Option<String> {
        if let Some(cached) = names.get(provider_id) {
            return cached.clone();
        }

        let name = match self.provider_store.find_by_id(provider_id).await {
            Ok(found) => found.map(|p| p.name),
            Err(e) => {
                warn!(
                    entry_id = %entry_id,
                    provider_id = %provider_id,
                    error = %e,
                    "Provider name lookup failed, sending without it"
                );
                None
            }
        };
        names.insert(provider_id.clone(), name.clone());
        name
    }
}

/// Per-cycle memo of provider display names, next to `DurationCache`
type ProviderNames = HashMap<ProviderId, Option<String>>;
