//! Shared fixtures: a file-backed database per test and store wiring

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use walkin_core::application::{DispatchCycle, NotificationGate, QueueService, ThresholdPolicy};
use walkin_core::domain::ShopConfig;
use walkin_core::port::id_provider::UuidProvider;
use walkin_core::port::time_provider::SystemTimeProvider;
use walkin_core::port::{NotificationTransport, TimeProvider};
use walkin_infra_sqlite::{
    create_pool, run_migrations, SqlitePool, SqliteProviderStore, SqliteQueueStore,
    SqliteShopStore,
};

pub const SHOP: &str = "fade-lab";
pub const LEASE: Duration = Duration::from_secs(60);

pub struct TestDb {
    // Dropping the directory deletes the database
    _dir: TempDir,
    pub path: String,
    pub pool: SqlitePool,
    pub queue: Arc<SqliteQueueStore>,
    pub providers: Arc<SqliteProviderStore>,
    pub shops: Arc<SqliteShopStore>,
}

impl TestDb {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("walkin.db").to_string_lossy().into_owned();
        let pool = open(&path).await;
        Self {
            _dir: dir,
            path,
            queue: Arc::new(SqliteQueueStore::new(pool.clone())),
            providers: Arc::new(SqliteProviderStore::new(pool.clone())),
            shops: Arc::new(SqliteShopStore::new(pool.clone())),
            pool,
        }
    }

    /// Close and reopen the same file, as after a restart
    pub async fn reopen(mut self) -> Self {
        self.pool.close().await;
        let pool = open(&self.path).await;
        self.queue = Arc::new(SqliteQueueStore::new(pool.clone()));
        self.providers = Arc::new(SqliteProviderStore::new(pool.clone()));
        self.shops = Arc::new(SqliteShopStore::new(pool.clone()));
        self.pool = pool;
        self
    }

    pub fn service(&self) -> QueueService {
        QueueService::new(
            self.queue.clone(),
            self.providers.clone(),
            self.shops.clone(),
            Arc::new(UuidProvider),
            Arc::new(SystemTimeProvider),
        )
    }

    pub fn gate(&self, transport: Arc<dyn NotificationTransport>) -> NotificationGate {
        self.gate_at(transport, Arc::new(SystemTimeProvider))
    }

    pub fn gate_at(
        &self,
        transport: Arc<dyn NotificationTransport>,
        clock: Arc<dyn TimeProvider>,
    ) -> NotificationGate {
        NotificationGate::new(
            self.queue.clone(),
            transport,
            Arc::new(UuidProvider),
            clock,
            LEASE,
        )
    }

    pub fn cycle(
        &self,
        policy: ThresholdPolicy,
        transport: Arc<dyn NotificationTransport>,
    ) -> DispatchCycle {
        DispatchCycle::new(
            SHOP,
            self.shops.clone(),
            self.queue.clone(),
            self.providers.clone(),
            policy.evaluator(),
            self.gate(transport),
        )
    }

    pub async fn init_shop(&self, threshold: u32, default_minutes: u32) {
        self.service()
            .init_shop(ShopConfig::new(SHOP, "Fade Lab", threshold, default_minutes).unwrap())
            .await
            .unwrap();
    }
}

async fn open(path: &str) -> SqlitePool {
    let pool = create_pool(path).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}
