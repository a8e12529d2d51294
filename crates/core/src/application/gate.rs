//! Notification gate - at-most-once dispatch per entry
//!
//! Sequence for one eligible entry:
//! 1. claim the entry (atomic conditional update, expires after the lease)
//! 2. send through the transport
//! 3. on success: conditional `notified: false -> true`, retried briefly;
//!    if the store still refuses, the send is recorded against the claim so
//!    the entry can never be claimed for sending again
//!    on failure: release the claim, flag untouched, next cycle retries
//!
//! The notified flag is never set without a confirmed send, so aborting a
//! cycle at any point leaves no entry half-notified.

use crate::application::dispatch::constants::{MARK_ATTEMPTS, MARK_RETRY_BACKOFF};
use crate::application::message::mask_address;
use crate::domain::{EntryId, QueueEntry};
use crate::error::{AppError, Result};
use crate::port::{
    ClaimOutcome, IdProvider, MarkOutcome, NotificationClaim, NotificationTransport, QueueStore,
    TimeProvider,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// What happened to one dispatch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Sent and flagged
    Delivered { delivery_id: String },
    /// Another cycle holds the entry, or it changed since the snapshot; nothing sent
    Skipped,
    /// Sent, but the flag had already flipped (success of intent)
    AlreadyNotified { delivery_id: String },
    /// An earlier cycle sent but could not flag the entry; flagged now, nothing sent
    Settled,
    /// Transport refused or errored; claim released, retried next cycle
    TransportFailed { reason: String },
}

pub struct NotificationGate {
    queue_store: Arc<dyn QueueStore>,
    transport: Arc<dyn NotificationTransport>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    claim_lease: Duration,
}

impl NotificationGate {
    /// Create a new gate
    ///
    /// # Arguments
    /// * `claim_lease` - How long a claim blocks other cycles; must exceed the
    ///   transport timeout
    pub fn new(
        queue_store: Arc<dyn QueueStore>,
        transport: Arc<dyn NotificationTransport>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        claim_lease: Duration,
    ) -> Self {
        Self {
            queue_store,
            transport,
            id_provider,
            time_provider,
            claim_lease,
        }
    }

    /// Attempt to notify `entry` with `message`
    ///
    /// # Errors
    /// Store failures while claiming, or while flagging after every retry
    /// and the fallback record failed. Transport failures are not errors;
    /// they come back as `GateOutcome::TransportFailed`.
    pub async fn dispatch(&self, entry: &QueueEntry, message: &str) -> Result<GateOutcome> {
        let now = self.time_provider.now_millis();
        let claim = NotificationClaim {
            token: self.id_provider.generate_id(),
            now_millis: now,
            expires_at: now + self.claim_lease.as_millis() as i64,
        };

        match self
            .queue_store
            .claim_for_notification(&entry.id, &claim)
            .await?
        {
            ClaimOutcome::Claimed => {}
            ClaimOutcome::SentUnflagged => return self.settle(&entry.id).await,
            ClaimOutcome::Conflict => {
                info!(entry_id = %entry.id, "Entry claimed elsewhere or no longer pending, skipping");
                return Ok(GateOutcome::Skipped);
            }
        }

        let receipt = match self.transport.send(&entry.phone_number, message).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(
                    entry_id = %entry.id,
                    to = %mask_address(&entry.phone_number),
                    error = %e,
                    "Notification send failed, will retry next cycle"
                );
                if let Err(release_err) = self.queue_store.release_claim(&entry.id, &claim.token).await {
                    // Claim lapses on its own after the lease
                    error!(entry_id = %entry.id, error = %release_err, "Failed to release claim");
                }
                return Ok(GateOutcome::TransportFailed {
                    reason: e.to_string(),
                });
            }
        };

        match retry_store(|| self.queue_store.mark_notified(&entry.id)).await {
            Ok(MarkOutcome::Marked) => {
                info!(
                    entry_id = %entry.id,
                    to = %mask_address(&entry.phone_number),
                    delivery_id = %receipt.delivery_id,
                    "Customer notified"
                );
                Ok(GateOutcome::Delivered {
                    delivery_id: receipt.delivery_id,
                })
            }
            Ok(MarkOutcome::Conflict) => {
                warn!(
                    entry_id = %entry.id,
                    delivery_id = %receipt.delivery_id,
                    "Entry already flagged notified by a concurrent writer"
                );
                Ok(GateOutcome::AlreadyNotified {
                    delivery_id: receipt.delivery_id,
                })
            }
            Err(e) => {
                let sent_at = self.time_provider.now_millis();
                match retry_store(|| self.queue_store.record_sent(&entry.id, &claim.token, sent_at)).await {
                    Ok(()) => error!(
                        entry_id = %entry.id,
                        delivery_id = %receipt.delivery_id,
                        error = %e,
                        "Sent but failed to flag entry; send recorded, flag retried next cycle"
                    ),
                    Err(record_err) => error!(
                        entry_id = %entry.id,
                        delivery_id = %receipt.delivery_id,
                        error = %e,
                        record_error = %record_err,
                        "Sent but failed to flag or record entry; a resend is possible after the lease"
                    ),
                }
                Err(e)
            }
        }
    }

    /// Flag an entry whose send was recorded by an earlier cycle
    async fn settle(&self, id: &EntryId) -> Result<GateOutcome> {
        let outcome = retry_store(|| self.queue_store.mark_notified(id)).await?;
        info!(entry_id = %id, outcome = ?outcome, "Flagged entry sent by an earlier cycle");
        Ok(GateOutcome::Settled)
    }
}

/// Retry transient store failures with a short doubling backoff
async fn retry_store<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = MARK_RETRY_BACKOFF;
    let mut attempt = 1;
    loop {
        match op().await {
            Err(AppError::Database(msg)) if attempt < MARK_ATTEMPTS => {
                warn!(attempt = attempt, error = %msg, "Store write failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::notification_transport::mocks::MockTransport;
    use crate::port::queue_store::mocks::InMemoryQueueStore;
    use crate::port::time_provider::mocks::ManualTimeProvider;

    const LEASE: Duration = Duration::from_secs(60);

    fn entry(id: &str) -> QueueEntry {
        QueueEntry::new(id, 1_000, "shop", "Ana", "+15550001111", None)
    }

    fn gate(
        store: Arc<InMemoryQueueStore>,
        transport: Arc<MockTransport>,
        clock: Arc<ManualTimeProvider>,
    ) -> NotificationGate {
        NotificationGate::new(
            store,
            transport,
            Arc::new(SequentialIdProvider::new("claim")),
            clock,
            LEASE,
        )
    }

    #[tokio::test]
    async fn test_successful_send_marks_entry() {
        let store = Arc::new(InMemoryQueueStore::with_entries([entry("a")]));
        let transport = Arc::new(MockTransport::new_success());
        let gate = gate(store.clone(), transport.clone(), Arc::new(ManualTimeProvider::new(0)));

        let outcome = gate.dispatch(&entry("a"), "hi").await.unwrap();

        assert!(matches!(outcome, GateOutcome::Delivered { .. }));
        assert!(store.get("a").unwrap().notified);
        assert!(!store.is_claimed("a"));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_flag_and_releases_claim() {
        let store = Arc::new(InMemoryQueueStore::with_entries([entry("a")]));
        let transport = Arc::new(MockTransport::new_fail("twilio down"));
        let gate = gate(store.clone(), transport.clone(), Arc::new(ManualTimeProvider::new(0)));

        let outcome = gate.dispatch(&entry("a"), "hi").await.unwrap();

        assert!(matches!(outcome, GateOutcome::TransportFailed { .. }));
        assert!(!store.get("a").unwrap().notified);
        assert!(!store.is_claimed("a"));

        // Next attempt may claim again
        transport.set_behavior(crate::port::notification_transport::mocks::MockBehavior::Success);
        let retry = gate.dispatch(&entry("a"), "hi").await.unwrap();
        assert!(matches!(retry, GateOutcome::Delivered { .. }));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_already_notified_entry_is_not_sent() {
        let mut notified = entry("a");
        notified.notified = true;
        let store = Arc::new(InMemoryQueueStore::with_entries([notified]));
        let transport = Arc::new(MockTransport::new_success());
        let gate = gate(store.clone(), transport.clone(), Arc::new(ManualTimeProvider::new(0)));

        // Stale snapshot still says notified = false
        let outcome = gate.dispatch(&entry("a"), "hi").await.unwrap();

        assert_eq!(outcome, GateOutcome::Skipped);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_live_claim_blocks_second_sender() {
        let store = Arc::new(InMemoryQueueStore::with_entries([entry("a")]));
        let clock = Arc::new(ManualTimeProvider::new(0));
        let claim = NotificationClaim {
            token: "other-cycle".to_string(),
            now_millis: 0,
            expires_at: LEASE.as_millis() as i64,
        };
        assert_eq!(
            store.claim_for_notification(&"a".to_string(), &claim).await.unwrap(),
            ClaimOutcome::Claimed
        );

        let transport = Arc::new(MockTransport::new_success());
        let gate = gate(store.clone(), transport.clone(), clock.clone());

        assert_eq!(gate.dispatch(&entry("a"), "hi").await.unwrap(), GateOutcome::Skipped);
        assert_eq!(transport.call_count(), 0);

        // Holder crashed; the lease runs out and the entry is claimable again
        clock.advance(LEASE.as_millis() as i64 + 1);
        let outcome = gate.dispatch(&entry("a"), "hi").await.unwrap();
        assert!(matches!(outcome, GateOutcome::Delivered { .. }));
    }

    #[tokio::test]
    async fn test_removed_entry_is_not_sent() {
        let store = Arc::new(InMemoryQueueStore::with_entries([entry("a")]));
        store
            .finish(&"a".to_string(), crate::domain::EntryStatus::Removed)
            .await
            .unwrap();
        let transport = Arc::new(MockTransport::new_success());
        let gate = gate(store, transport.clone(), Arc::new(ManualTimeProvider::new(0)));

        assert_eq!(gate.dispatch(&entry("a"), "hi").await.unwrap(), GateOutcome::Skipped);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_transient_mark_failure_is_retried() {
        let store = Arc::new(InMemoryQueueStore::with_entries([entry("a")]));
        store.fail_next_marks(1);
        let transport = Arc::new(MockTransport::new_success());
        let gate = gate(store.clone(), transport.clone(), Arc::new(ManualTimeProvider::new(0)));

        let outcome = gate.dispatch(&entry("a"), "hi").await.unwrap();

        assert!(matches!(outcome, GateOutcome::Delivered { .. }));
        assert!(store.get("a").unwrap().notified);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unflagged_send_is_never_repeated() {
        let store = Arc::new(InMemoryQueueStore::with_entries([entry("a")]));
        store.fail_next_marks(MARK_ATTEMPTS as usize);
        let clock = Arc::new(ManualTimeProvider::new(0));
        let transport = Arc::new(MockTransport::new_success());
        let gate = gate(store.clone(), transport.clone(), clock.clone());

        let first = gate.dispatch(&entry("a"), "hi").await;
        assert!(matches!(first, Err(AppError::Database(_))));
        assert!(!store.get("a").unwrap().notified);
        assert_eq!(store.sent_at("a"), Some(0));

        // Well past the lease: the entry is flagged, not sent again
        clock.advance(LEASE.as_millis() as i64 + 1);
        let second = gate.dispatch(&entry("a"), "hi").await.unwrap();

        assert_eq!(second, GateOutcome::Settled);
        assert_eq!(transport.sends_to("+15550001111"), 1);
        assert!(store.get("a").unwrap().notified);

        let third = gate.dispatch(&entry("a"), "hi").await.unwrap();
        assert_eq!(third, GateOutcome::Skipped);
        assert_eq!(transport.call_count(), 1);
    }
}
