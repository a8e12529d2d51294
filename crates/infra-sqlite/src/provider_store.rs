// SQLite ProviderStore Implementation

use crate::error::{corrupt_column, map_sqlx_error};
use async_trait::async_trait;
use sqlx::SqlitePool;
use walkin_core::domain::{Provider, ProviderId};
use walkin_core::error::{AppError, Result};
use walkin_core::port::{DurationLookup, ProviderStore};

pub struct SqliteProviderStore {
    pool: SqlitePool,
}

impl SqliteProviderStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn minutes_from_column(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| corrupt_column("average_service_minutes", value))
}

#[derive(Debug, sqlx::FromRow)]
struct ProviderRow {
    id: String,
    shop_id: String,
    name: String,
    average_service_minutes: i64,
    active: bool,
}

impl ProviderRow {
    fn into_provider(self) -> Result<Provider> {
        Ok(Provider {
            average_service_minutes: minutes_from_column(self.average_service_minutes)?,
            id: self.id,
            shop_id: self.shop_id,
            name: self.name,
            active: self.active,
        })
    }
}

#[async_trait]
impl ProviderStore for SqliteProviderStore {
    async fn average_service_duration(&self, id: &ProviderId) -> Result<DurationLookup> {
        // Inactive providers still report their duration for customers already waiting
        let minutes: Option<i64> =
            sqlx::query_scalar("SELECT average_service_minutes FROM providers WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        match minutes {
            Some(m) => Ok(DurationLookup::Found(minutes_from_column(m)?)),
            None => Ok(DurationLookup::NotFound),
        }
    }

    async fn insert(&self, provider: &Provider) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO providers (id, shop_id, name, average_service_minutes, active)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&provider.id)
        .bind(&provider.shop_id)
        .bind(&provider.name)
        .bind(i64::from(provider.average_service_minutes))
        .bind(provider.active)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &ProviderId) -> Result<Option<Provider>> {
        let row = sqlx::query_as::<_, ProviderRow>(
            "SELECT id, shop_id, name, average_service_minutes, active FROM providers WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(ProviderRow::into_provider).transpose()
    }

    async fn list_by_shop(&self, shop_id: &str) -> Result<Vec<Provider>> {
        let rows = sqlx::query_as::<_, ProviderRow>(
            r#"
            SELECT id, shop_id, name, average_service_minutes, active
            FROM providers
            WHERE shop_id = ?
            ORDER BY name ASC, id ASC
            "#,
        )
        .bind(shop_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(ProviderRow::into_provider).collect()
    }

    async fn update(&self, provider: &Provider) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE providers
            SET name = ?, average_service_minutes = ?, active = ?
            WHERE id = ?
            "#,
        )
        .bind(&provider.name)
        .bind(i64::from(provider.average_service_minutes))
        .bind(provider.active)
        .bind(&provider.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Provider {} not found",
                provider.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations, SqliteShopStore};
    use walkin_core::domain::{ShopConfig, DEFAULT_SERVICE_MINUTES};
    use walkin_core::port::ShopStore;

    async fn setup_test_db() -> SqlitePool {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteShopStore::new(pool.clone())
            .upsert(&ShopConfig::new("shop", "Fade Lab", 15, 15).unwrap())
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_insert_find_and_duration() {
        let store = SqliteProviderStore::new(setup_test_db().await);
        let marco = Provider::new("p1", "shop", "Marco");
        store.insert(&marco).await.unwrap();

        assert_eq!(store.find_by_id(&"p1".to_string()).await.unwrap(), Some(marco));
        assert_eq!(
            store
                .average_service_duration(&"p1".to_string())
                .await
                .unwrap(),
            DurationLookup::Found(DEFAULT_SERVICE_MINUTES)
        );
        assert_eq!(
            store
                .average_service_duration(&"ghost".to_string())
                .await
                .unwrap(),
            DurationLookup::NotFound
        );
    }

    #[tokio::test]
    async fn test_inactive_provider_keeps_duration() {
        let store = SqliteProviderStore::new(setup_test_db().await);
        let mut zoe = Provider::new("p2", "shop", "Zoe");
        zoe.average_service_minutes = 30;
        store.insert(&zoe).await.unwrap();

        zoe.active = false;
        store.update(&zoe).await.unwrap();

        assert_eq!(
            store
                .average_service_duration(&"p2".to_string())
                .await
                .unwrap(),
            DurationLookup::Found(30)
        );
        assert!(!store.find_by_id(&"p2".to_string()).await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn test_list_by_shop_ordered_by_name() {
        let store = SqliteProviderStore::new(setup_test_db().await);
        store.insert(&Provider::new("p2", "shop", "Zoe")).await.unwrap();
        store.insert(&Provider::new("p1", "shop", "Marco")).await.unwrap();

        let names: Vec<String> = store
            .list_by_shop("shop")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Marco", "Zoe"]);
        assert!(store.list_by_shop("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_provider() {
        let store = SqliteProviderStore::new(setup_test_db().await);
        let result = store.update(&Provider::new("ghost", "shop", "Ghost")).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_provider_for_unknown_shop_rejected() {
        let store = SqliteProviderStore::new(setup_test_db().await);
        let result = store.insert(&Provider::new("p", "nowhere", "Ann")).await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }
}
