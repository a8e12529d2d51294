// SQLite ShopStore Implementation

use crate::error::{corrupt_column, map_sqlx_error};
use async_trait::async_trait;
use sqlx::SqlitePool;
use walkin_core::domain::ShopConfig;
use walkin_core::error::Result;
use walkin_core::port::ShopStore;

pub struct SqliteShopStore {
    pool: SqlitePool,
}

impl SqliteShopStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ShopRow {
    id: String,
    name: String,
    notify_threshold: i64,
    default_service_minutes: i64,
}

impl ShopRow {
    fn into_config(self) -> Result<ShopConfig> {
        let threshold = u32::try_from(self.notify_threshold)
            .map_err(|_| corrupt_column("notify_threshold", self.notify_threshold))?;
        let minutes = u32::try_from(self.default_service_minutes)
            .map_err(|_| corrupt_column("default_service_minutes", self.default_service_minutes))?;
        Ok(ShopConfig::new(self.id, self.name, threshold, minutes)?)
    }
}

#[async_trait]
impl ShopStore for SqliteShopStore {
    async fn get_config(&self, shop_id: &str) -> Result<Option<ShopConfig>> {
        let row = sqlx::query_as::<_, ShopRow>(
            "SELECT id, name, notify_threshold, default_service_minutes FROM shops WHERE id = ?",
        )
        .bind(shop_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(ShopRow::into_config).transpose()
    }

    async fn upsert(&self, config: &ShopConfig) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shops (id, name, notify_threshold, default_service_minutes)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                notify_threshold = excluded.notify_threshold,
                default_service_minutes = excluded.default_service_minutes
            "#,
        )
        .bind(&config.id)
        .bind(&config.name)
        .bind(i64::from(config.notify_threshold))
        .bind(i64::from(config.default_service_minutes))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
