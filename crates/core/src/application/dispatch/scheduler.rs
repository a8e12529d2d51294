// Notification Scheduler
// Runs the dispatch cycle on a fixed tick until shutdown

use super::shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
use super::{CycleOutcome, DispatchCycle};
use crate::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Periodic driver for one `DispatchCycle`
///
/// Each tick awaits its cycle inline, so passes never overlap. Ticks missed
/// while a slow pass runs are skipped rather than replayed.
pub struct NotificationScheduler {
    cycle: Arc<DispatchCycle>,
    tick: Duration,
}

impl NotificationScheduler {
    /// Create a new scheduler
    ///
    /// # Arguments
    /// * `cycle` - Dispatch cycle to drive
    /// * `tick` - Time between cycle starts
    pub fn new(cycle: Arc<DispatchCycle>, tick: Duration) -> Self {
        Self { cycle, tick }
    }

    /// Spawn the scheduler loop on the current runtime
    pub fn start(self) -> SchedulerHandle {
        let (shutdown, token) = shutdown_channel();
        let join = tokio::spawn(self.run(token));
        SchedulerHandle { shutdown, join }
    }

    /// Scheduler loop; returns once `shutdown` fires
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            shop_id = %self.cycle.shop_id(),
            tick_secs = self.tick.as_secs_f64(),
            "Notification scheduler started"
        );

        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.requested() => break,
                _ = ticker.tick() => {}
            }

            match self.cycle.run_once().await {
                Ok(CycleOutcome::Completed(report)) => {
                    debug!(delivered = report.delivered, "Tick finished");
                }
                Ok(CycleOutcome::Skipped) => {
                    warn!("Previous dispatch cycle still running, tick skipped");
                }
                Err(AppError::Config(msg)) => {
                    error!(error = %msg, "Dispatch cycle aborted: configuration missing");
                }
                Err(e) => {
                    error!(error = ?e, "Dispatch cycle aborted");
                }
            }

            if shutdown.is_requested() {
                break;
            }
        }

        info!(shop_id = %self.cycle.shop_id(), "Notification scheduler stopped");
    }
}

/// Handle to a spawned scheduler
pub struct SchedulerHandle {
    shutdown: ShutdownSender,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal shutdown and wait up to `grace` for an in-flight cycle.
    ///
    /// Returns `false` if the loop had to be aborted. Aborting mid-cycle is
    /// safe: an entry is only flagged after a confirmed send, and a stranded
    /// claim lapses after its lease.
    pub async fn stop(self, grace: Duration) -> bool {
        self.shutdown.request();

        let mut join = self.join;
        match timeout(grace, &mut join).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(error = %e, "Notification scheduler task failed");
                true
            }
            Err(_) => {
                warn!(
                    grace_secs = grace.as_secs_f64(),
                    "Scheduler shutdown timeout, aborting in-flight cycle"
                );
                join.abort();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::gate::NotificationGate;
    use crate::application::threshold::ThresholdPolicy;
    use crate::domain::{EntryId, EntryStatus, QueueEntry, ShopConfig};
    use crate::error::Result;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::notification_transport::mocks::MockTransport;
    use crate::port::provider_store::mocks::InMemoryProviderStore;
    use crate::port::queue_store::mocks::InMemoryQueueStore;
    use crate::port::shop_store::mocks::InMemoryShopStore;
    use crate::port::time_provider::mocks::ManualTimeProvider;
    use crate::port::{ClaimOutcome, MarkOutcome, NotificationClaim, QueueStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Delegating store whose snapshot read is slow and tracks concurrency
    struct SlowFetchStore {
        inner: InMemoryQueueStore,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl QueueStore for SlowFetchStore {
        async fn insert(&self, entry: &QueueEntry) -> Result<()> {
            self.inner.insert(entry).await
        }

        async fn find_by_id(&self, id: &EntryId) -> Result<Option<QueueEntry>> {
            self.inner.find_by_id(id).await
        }

        async fn fetch_waiting(&self, shop_id: &str) -> Result<Vec<QueueEntry>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.inner.fetch_waiting(shop_id).await
        }

        async fn finish(&self, id: &EntryId, status: EntryStatus) -> Result<()> {
            self.inner.finish(id, status).await
        }

        async fn claim_for_notification(
            &self,
            id: &EntryId,
            claim: &NotificationClaim,
        ) -> Result<ClaimOutcome> {
            self.inner.claim_for_notification(id, claim).await
        }

        async fn release_claim(&self, id: &EntryId, token: &str) -> Result<()> {
            self.inner.release_claim(id, token).await
        }

        async fn mark_notified(&self, id: &EntryId) -> Result<MarkOutcome> {
            self.inner.mark_notified(id).await
        }

        async fn record_sent(&self, id: &EntryId, token: &str, sent_at: i64) -> Result<()> {
            self.inner.record_sent(id, token, sent_at).await
        }
    }

    fn build_cycle(
        queue: Arc<dyn QueueStore>,
        transport: Arc<MockTransport>,
    ) -> Arc<DispatchCycle> {
        let shops = Arc::new(InMemoryShopStore::with_shop(
            ShopConfig::new("shop", "Fade Lab", 15, 15).unwrap(),
        ));
        let gate = NotificationGate::new(
            queue.clone(),
            transport,
            Arc::new(SequentialIdProvider::new("claim")),
            Arc::new(ManualTimeProvider::new(0)),
            Duration::from_secs(60),
        );
        Arc::new(DispatchCycle::new(
            "shop",
            shops,
            queue,
            Arc::new(InMemoryProviderStore::new()),
            ThresholdPolicy::Wait.evaluator(),
            gate,
        ))
    }

    #[tokio::test]
    async fn test_scheduler_notifies_once_across_ticks() {
        let queue = Arc::new(InMemoryQueueStore::with_entries([QueueEntry::new(
            "a",
            1,
            "shop",
            "Ana",
            "+15550001111",
            None,
        )]));
        let transport = Arc::new(MockTransport::new_success());
        let cycle = build_cycle(queue.clone(), transport.clone());

        let handle = NotificationScheduler::new(cycle, Duration::from_millis(10)).start();
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(handle.stop(Duration::from_secs(1)).await);
        assert_eq!(transport.call_count(), 1);
        assert_eq!(queue.marked_count(), 1);
    }

    #[tokio::test]
    async fn test_slow_cycles_never_overlap() {
        let store = Arc::new(SlowFetchStore {
            inner: InMemoryQueueStore::new(),
            delay: Duration::from_millis(30),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        });
        let cycle = build_cycle(store.clone(), Arc::new(MockTransport::new_success()));

        let handle = NotificationScheduler::new(cycle, Duration::from_millis(5)).start();
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.stop(Duration::from_secs(1)).await;

        assert!(store.fetches.load(Ordering::SeqCst) >= 2);
        assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_aborts_cycle_exceeding_grace() {
        let queue = Arc::new(InMemoryQueueStore::with_entries([QueueEntry::new(
            "a",
            1,
            "shop",
            "Ana",
            "+15550001111",
            None,
        )]));
        let transport =
            Arc::new(MockTransport::new_success().with_delay(Duration::from_secs(10)));
        let cycle = build_cycle(queue.clone(), transport.clone());

        let handle = NotificationScheduler::new(cycle, Duration::from_millis(10)).start();
        // Let the first tick reach the transport
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(!handle.stop(Duration::from_millis(50)).await);
        assert_eq!(transport.call_count(), 1);
        // Send never confirmed: the entry is not flagged
        assert!(!queue.get("a").unwrap().notified);
    }
}
