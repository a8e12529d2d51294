// Migration Runner

use crate::error::map_sqlx_error;
use sqlx::SqlitePool;
use tracing::{debug, info};
use walkin_core::error::Result;

/// Versioned schema steps; each file records its own version in `schema_version`
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (
        1,
        "initial schema",
        include_str!("../migrations/001_initial_schema.sql"),
    ),
    (2, "sent_at", include_str!("../migrations/002_sent_at.sql")),
];

/// Bring the schema up to the latest version. Safe to call on every start.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current = schema_version(pool).await?;
    debug!(current_version = current, "Checking schema");

    for (version, name, sql) in MIGRATIONS.iter().filter(|(v, _, _)| *v > current) {
        info!(version = version, name = name, "Applying migration");
        apply_migration(pool, sql).await?;
    }

    Ok(())
}

async fn schema_version(pool: &SqlitePool) -> Result<i64> {
    let has_table: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
    )
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)?;

    if !has_table {
        return Ok(0);
    }

    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(map_sqlx_error)?;
    Ok(version.unwrap_or(0))
}

/// Statements are split on `;`, with `--` comment lines dropped, and run in one transaction
async fn apply_migration(pool: &SqlitePool, sql: &str) -> Result<()> {
    let mut tx = pool.begin().await.map_err(map_sqlx_error)?;

    let statements = sql.split(';').map(|chunk| {
        chunk
            .lines()
            .filter(|line| !line.trim_start().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n")
    });
    for statement in statements.filter(|s| !s.trim().is_empty()) {
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
    }

    tx.commit().await.map_err(map_sqlx_error)
}
