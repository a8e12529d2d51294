// Queue Store Port (Interface)

use crate::domain::{EntryId, EntryStatus, QueueEntry};
use crate::error::Result;
use async_trait::async_trait;

/// Short-lived exclusive right to notify one entry.
///
/// Taken before the transport call so overlapping cycles cannot both send.
/// Expires at `expires_at` so a crashed holder never strands the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationClaim {
    pub token: String,
    pub now_millis: i64,
    pub expires_at: i64,
}

/// Result of `claim_for_notification`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    /// An earlier holder sent but could not flag the entry: flag it, never resend
    SentUnflagged,
    /// Entry already notified, no longer waiting, or claimed by a live holder
    Conflict,
}

/// Result of the conditional `notified: false -> true` transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Marked,
    /// Precondition `notified = false` no longer held
    Conflict,
}

/// Store interface for queue entries.
///
/// Every method is its own short-lived operation; no lock is held across calls.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert a new entry (join flow)
    async fn insert(&self, entry: &QueueEntry) -> Result<()>;

    /// Find entry by ID
    async fn find_by_id(&self, id: &EntryId) -> Result<Option<QueueEntry>>;

    /// All waiting entries of a shop, ascending by (joined_at, id)
    async fn fetch_waiting(&self, shop_id: &str) -> Result<Vec<QueueEntry>>;

    /// Move a waiting entry to `removed` or `served`
    ///
    /// # Errors
    /// - `AppError::NotFound` if the entry does not exist
    /// - `AppError::InvalidState` if the entry is no longer waiting
    async fn finish(&self, id: &EntryId, status: EntryStatus) -> Result<()>;

    /// Atomically claim a waiting, unnotified, unclaimed (or expired) entry
    async fn claim_for_notification(
        &self,
        id: &EntryId,
        claim: &NotificationClaim,
    ) -> Result<ClaimOutcome>;

    /// Drop a claim held under `token` (no-op if the token no longer matches)
    async fn release_claim(&self, id: &EntryId, token: &str) -> Result<()>;

    /// Conditional `notified: false -> true`, keyed on the entry ID
    async fn mark_notified(&self, id: &EntryId) -> Result<MarkOutcome>;

    /// Record a confirmed send under the claim held as `token` when the flag
    /// could not be set. The claim stops expiring: later claims get
    /// `ClaimOutcome::SentUnflagged` until the entry is flagged.
    async fn record_sent(&self, id: &EntryId, token: &str, sent_at: i64) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Stored {
        entry: QueueEntry,
        claim: Option<(String, i64)>,
        sent_at: Option<i64>,
    }

    /// In-memory QueueStore with the same conditional semantics as SQLite
    #[derive(Default)]
    pub struct InMemoryQueueStore {
        rows: Mutex<HashMap<EntryId, Stored>>,
        fail_fetch: AtomicBool,
        marked: AtomicUsize,
        mark_conflicts: AtomicUsize,
        failing_marks: AtomicUsize,
    }

    impl InMemoryQueueStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_entries(entries: impl IntoIterator<Item = QueueEntry>) -> Self {
            let store = Self::new();
            {
                let mut rows = store.rows.lock().unwrap();
                for entry in entries {
                    rows.insert(
                        entry.id.clone(),
                        Stored {
                            entry,
                            claim: None,
                            sent_at: None,
                        },
                    );
                }
            }
            store
        }

        /// Make `fetch_waiting` fail (simulates an unavailable store)
        pub fn set_fail_fetch(&self, fail: bool) {
            self.fail_fetch.store(fail, Ordering::SeqCst);
        }

        /// Make the next `count` calls to `mark_notified` fail with a store error
        pub fn fail_next_marks(&self, count: usize) {
            self.failing_marks.store(count, Ordering::SeqCst);
        }

        pub fn sent_at(&self, id: &str) -> Option<i64> {
            self.rows.lock().unwrap().get(id).and_then(|s| s.sent_at)
        }

        pub fn get(&self, id: &str) -> Option<QueueEntry> {
            self.rows.lock().unwrap().get(id).map(|s| s.entry.clone())
        }

        pub fn is_claimed(&self, id: &str) -> bool {
            self.rows
                .lock()
                .unwrap()
                .get(id)
                .map(|s| s.claim.is_some())
                .unwrap_or(false)
        }

        /// Number of successful `mark_notified` transitions
        pub fn marked_count(&self) -> usize {
            self.marked.load(Ordering::SeqCst)
        }

        pub fn mark_conflict_count(&self) -> usize {
            self.mark_conflicts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QueueStore for InMemoryQueueStore {
        async fn insert(&self, entry: &QueueEntry) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            if rows.contains_key(&entry.id) {
                return Err(AppError::Conflict(format!("entry {} exists", entry.id)));
            }
            rows.insert(
                entry.id.clone(),
                Stored {
                    entry: entry.clone(),
                    claim: None,
                    sent_at: None,
                },
            );
            Ok(())
        }

        async fn find_by_id(&self, id: &EntryId) -> Result<Option<QueueEntry>> {
            Ok(self.get(id))
        }

        async fn fetch_waiting(&self, shop_id: &str) -> Result<Vec<QueueEntry>> {
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(AppError::Database("store unavailable".to_string()));
            }
            let rows = self.rows.lock().unwrap();
            let mut waiting: Vec<QueueEntry> = rows
                .values()
                .map(|s| &s.entry)
                .filter(|e| e.shop_id == shop_id && e.is_waiting())
                .cloned()
                .collect();
            waiting.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)));
            Ok(waiting)
        }

        async fn finish(&self, id: &EntryId, status: EntryStatus) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            let stored = rows
                .get_mut(id)
                .ok_or_else(|| AppError::NotFound(format!("Entry {} not found", id)))?;
            let result = match status {
                EntryStatus::Removed => stored.entry.remove(),
                EntryStatus::Served => stored.entry.serve(),
                EntryStatus::Waiting => {
                    return Err(AppError::InvalidState(format!(
                        "Cannot move entry {} back to waiting",
                        id
                    )))
                }
            };
            result.map_err(|e| AppError::InvalidState(e.to_string()))
        }

        async fn claim_for_notification(
            &self,
            id: &EntryId,
            claim: &NotificationClaim,
        ) -> Result<ClaimOutcome> {
            let mut rows = self.rows.lock().unwrap();
            let Some(stored) = rows.get_mut(id) else {
                return Ok(ClaimOutcome::Conflict);
            };
            if !stored.entry.is_waiting() || stored.entry.notified {
                return Ok(ClaimOutcome::Conflict);
            }
            if stored.sent_at.is_some() {
                return Ok(ClaimOutcome::SentUnflagged);
            }
            let live_claim = matches!(&stored.claim, Some((_, until)) if *until >= claim.now_millis);
            if live_claim {
                return Ok(ClaimOutcome::Conflict);
            }
            stored.claim = Some((claim.token.clone(), claim.expires_at));
            Ok(ClaimOutcome::Claimed)
        }

        async fn release_claim(&self, id: &EntryId, token: &str) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(stored) = rows.get_mut(id) {
                if matches!(&stored.claim, Some((t, _)) if t == token) {
                    stored.claim = None;
                }
            }
            Ok(())
        }

        async fn mark_notified(&self, id: &EntryId) -> Result<MarkOutcome> {
            let failing = self
                .failing_marks
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if failing.is_ok() {
                return Err(AppError::Database("database is locked".to_string()));
            }
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(id) {
                Some(stored) if !stored.entry.notified => {
                    stored.entry.notified = true;
                    stored.claim = None;
                    self.marked.fetch_add(1, Ordering::SeqCst);
                    Ok(MarkOutcome::Marked)
                }
                _ => {
                    self.mark_conflicts.fetch_add(1, Ordering::SeqCst);
                    Ok(MarkOutcome::Conflict)
                }
            }
        }

        async fn record_sent(&self, id: &EntryId, token: &str, sent_at: i64) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(stored) = rows.get_mut(id) {
                if matches!(&stored.claim, Some((t, _)) if t == token) {
                    stored.sent_at = Some(sent_at);
                }
            }
            Ok(())
        }
    }
}
