// SQLite QueueStore Implementation
//
// Every state change is a single conditional UPDATE checked via
// rows_affected, so concurrent cycles (or processes) sharing the database
// serialize on SQLite's write lock instead of on an in-process mutex.

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use sqlx::SqlitePool;
use walkin_core::domain::{EntryId, EntryStatus, QueueEntry};
use walkin_core::error::{AppError, Result};
use walkin_core::port::{ClaimOutcome, MarkOutcome, NotificationClaim, QueueStore};

const ENTRY_COLUMNS: &str =
    "id, shop_id, customer_name, phone_number, requested_provider, status, joined_at, notified";

pub struct SqliteQueueStore {
    pool: SqlitePool,
}

impl SqliteQueueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: String,
    shop_id: String,
    customer_name: String,
    phone_number: String,
    requested_provider: Option<String>,
    status: String,
    joined_at: i64,
    notified: bool,
}

impl EntryRow {
    fn into_entry(self) -> Result<QueueEntry> {
        let status: EntryStatus = self.status.parse()?;
        Ok(QueueEntry {
            id: self.id,
            shop_id: self.shop_id,
            customer_name: self.customer_name,
            phone_number: self.phone_number,
            requested_provider: self.requested_provider,
            status,
            joined_at: self.joined_at,
            notified: self.notified,
        })
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn insert(&self, entry: &QueueEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO queue_entries (
                id, shop_id, customer_name, phone_number, requested_provider,
                status, joined_at, notified
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.shop_id)
        .bind(&entry.customer_name)
        .bind(&entry.phone_number)
        .bind(&entry.requested_provider)
        .bind(entry.status.as_str())
        .bind(entry.joined_at)
        .bind(entry.notified)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &EntryId) -> Result<Option<QueueEntry>> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {} FROM queue_entries WHERE id = ?",
            ENTRY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(EntryRow::into_entry).transpose()
    }

    async fn fetch_waiting(&self, shop_id: &str) -> Result<Vec<QueueEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            SELECT {}
            FROM queue_entries
            WHERE shop_id = ? AND status = 'waiting'
            ORDER BY joined_at ASC, id ASC
            "#,
            ENTRY_COLUMNS
        ))
        .bind(shop_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(EntryRow::into_entry).collect()
    }

    async fn finish(&self, id: &EntryId, status: EntryStatus) -> Result<()> {
        if status == EntryStatus::Waiting {
            return Err(AppError::InvalidState(format!(
                "Cannot move entry {} back to waiting",
                id
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE queue_entries
            SET status = ?, claim_token = NULL, claimed_until = NULL
            WHERE id = ? AND status = 'waiting'
            "#,
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            let current: Option<String> =
                sqlx::query_scalar("SELECT status FROM queue_entries WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

            return match current {
                None => Err(AppError::NotFound(format!("Entry {} not found", id))),
                Some(current) => Err(AppError::InvalidState(format!(
                    "Cannot move entry {} from {} to {}",
                    id, current, status
                ))),
            };
        }
        Ok(())
    }

    async fn claim_for_notification(
        &self,
        id: &EntryId,
        claim: &NotificationClaim,
    ) -> Result<ClaimOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE queue_entries
            SET claim_token = ?, claimed_until = ?
            WHERE id = ?
              AND status = 'waiting'
              AND notified = 0
              AND sent_at IS NULL
              AND (claim_token IS NULL OR claimed_until < ?)
            "#,
        )
        .bind(&claim.token)
        .bind(claim.expires_at)
        .bind(id)
        .bind(claim.now_millis)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 1 {
            return Ok(ClaimOutcome::Claimed);
        }

        let sent_unflagged: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT sent_at IS NOT NULL
            FROM queue_entries
            WHERE id = ? AND status = 'waiting' AND notified = 0
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(if sent_unflagged == Some(true) {
            ClaimOutcome::SentUnflagged
        } else {
            ClaimOutcome::Conflict
        })
    }

    async fn release_claim(&self, id: &EntryId, token: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE queue_entries
            SET claim_token = NULL, claimed_until = NULL
            WHERE id = ? AND claim_token = ?
            "#,
        )
        .bind(id)
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn record_sent(&self, id: &EntryId, token: &str, sent_at: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE queue_entries
            SET sent_at = ?, claimed_until = NULL
            WHERE id = ? AND claim_token = ?
            "#,
        )
        .bind(sent_at)
        .bind(id)
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn mark_notified(&self, id: &EntryId) -> Result<MarkOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE queue_entries
            SET notified = 1, claim_token = NULL, claimed_until = NULL
            WHERE id = ? AND notified = 0
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(if result.rows_affected() == 1 {
            MarkOutcome::Marked
        } else {
            MarkOutcome::Conflict
        })
    }
}
