//! Walk-in Queue Notifier - Main Entry Point
//! Runs the dispatch cycle for one shop on a fixed tick until Ctrl+C

mod config;
mod telemetry;

use anyhow::{Context, Result};
use crate::config::{Settings, TransportKind};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use walkin_core::application::{DispatchCycle, NotificationGate, NotificationScheduler};
use walkin_core::port::id_provider::UuidProvider;
use walkin_core::port::time_provider::SystemTimeProvider;
use walkin_core::port::{NotificationTransport, ShopStore};
use walkin_infra_sms::{LogTransport, TwilioTransport};
use walkin_infra_sqlite::{
    create_pool, run_migrations, SqliteProviderStore, SqliteQueueStore, SqliteShopStore,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    telemetry::init_tracing()?;
    info!("Walk-in notifier v{} starting...", VERSION);

    // 2. Configuration
    let settings = Settings::load().context("Failed to load configuration")?;
    let db_path = settings.database_path();

    info!(
        db_path = %db_path,
        shop_id = %settings.shop_id,
        policy = %settings.threshold_policy,
        threshold_unit = settings.threshold_policy.threshold_unit(),
        tick_secs = settings.tick_interval_secs,
        "Configuration loaded"
    );

    // 3. Database
    if let Some(parent) = Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let pool = create_pool(&db_path)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 4. Dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let queue_store = Arc::new(SqliteQueueStore::new(pool.clone()));
    let provider_store = Arc::new(SqliteProviderStore::new(pool.clone()));
    let shop_store = Arc::new(SqliteShopStore::new(pool.clone()));
    let transport = build_transport(&settings)?;

    match shop_store.get_config(&settings.shop_id).await? {
        Some(shop) => info!(
            shop_id = %shop.id,
            notify_threshold = shop.notify_threshold,
            threshold_unit = settings.threshold_policy.threshold_unit(),
            "Notifying customers within {} {}",
            shop.notify_threshold,
            settings.threshold_policy.threshold_unit()
        ),
        None => warn!(
            shop_id = %settings.shop_id,
            "Shop not configured yet; cycles will abort until it is (walkin shop init)"
        ),
    }

    let gate = NotificationGate::new(
        queue_store.clone(),
        transport,
        id_provider,
        time_provider,
        settings.claim_lease(),
    );
    let cycle = Arc::new(DispatchCycle::new(
        settings.shop_id.clone(),
        shop_store,
        queue_store,
        provider_store,
        settings.threshold_policy.evaluator(),
        gate,
    ));

    // 5. Scheduler
    let handle = NotificationScheduler::new(cycle, settings.tick_interval()).start();

    info!("System ready. Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown
    if !handle.stop(settings.shutdown_timeout()).await {
        warn!("In-flight cycle aborted; unconfirmed sends stay pending");
    }
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}

fn build_transport(settings: &Settings) -> Result<Arc<dyn NotificationTransport>> {
    match settings.transport.kind {
        TransportKind::Log => {
            warn!("Dry-run transport: messages are logged, not sent");
            Ok(Arc::new(LogTransport::new()))
        }
        TransportKind::Twilio => {
            let twilio = settings
                .transport
                .twilio()
                .context("Twilio transport selected without credentials")?;
            Ok(Arc::new(
                TwilioTransport::new(twilio).context("Failed to create Twilio transport")?,
            ))
        }
    }
}
