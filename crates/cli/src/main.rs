//! Walkin CLI - front desk and admin commands over the shop database

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tabled::{Table, Tabled};
use tracing_subscriber::EnvFilter;

use walkin_core::application::dispatch::constants::{DEFAULT_CLAIM_LEASE, DEFAULT_SHUTDOWN_TIMEOUT};
use walkin_core::application::{
    BoardRow, CycleOutcome, DispatchCycle, JoinRequest, NotificationGate, NotificationScheduler,
    PartitionCount, QueueService, ThresholdPolicy,
};
use walkin_core::domain::{Provider, QueueEntry, ShopConfig};
use walkin_core::port::id_provider::UuidProvider;
use walkin_core::port::time_provider::SystemTimeProvider;
use walkin_core::port::{NotificationTransport, ShopStore};
use walkin_infra_sms::{LogTransport, TwilioConfig, TwilioTransport, TWILIO_API_BASE};
use walkin_infra_sqlite::{
    create_pool, run_migrations, SqlitePool, SqliteProviderStore, SqliteQueueStore,
    SqliteShopStore,
};

const DEFAULT_DB_PATH: &str = "~/.walkin/walkin.db";

#[derive(Parser)]
#[command(name = "walkin")]
#[command(about = "Walk-in queue CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database path
    #[arg(long, global = true, env = "WALKIN_DATABASE_URL", default_value = DEFAULT_DB_PATH)]
    db: String,

    /// Shop ID
    #[arg(long, global = true, env = "WALKIN_SHOP_ID", default_value = "default")]
    shop: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Shop settings
    Shop {
        #[command(subcommand)]
        command: ShopCommand,
    },

    /// Service providers
    Provider {
        #[command(subcommand)]
        command: ProviderCommand,
    },

    /// Add a customer to the queue
    Join {
        /// Customer name
        name: String,

        /// Phone number, E.164 (e.g. +15551234567)
        phone: String,

        /// Requested provider ID (omit for any provider)
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Show the waiting queue with positions and estimates
    Board,

    /// Customer left without being served
    Remove {
        /// Entry ID
        entry_id: String,
    },

    /// Customer was served
    Serve {
        /// Entry ID
        entry_id: String,
    },

    /// Run the notification cycle
    Notify {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,

        /// Seconds between cycles when not running once
        #[arg(long, default_value = "60")]
        interval_secs: u64,

        /// Eligibility policy
        #[arg(long, env = "WALKIN_THRESHOLD_POLICY", default_value = "wait")]
        policy: ThresholdPolicy,

        #[arg(long, value_enum, default_value_t = TransportArg::Log)]
        transport: TransportArg,

        #[arg(long, env = "WALKIN_TRANSPORT__ACCOUNT_SID")]
        account_sid: Option<String>,

        #[arg(long, env = "WALKIN_TRANSPORT__AUTH_TOKEN", hide_env_values = true)]
        auth_token: Option<String>,

        #[arg(long, env = "WALKIN_TRANSPORT__FROM_NUMBER")]
        from_number: Option<String>,
    },
}

#[derive(Subcommand)]
enum ShopCommand {
    /// Create or replace the shop
    Init {
        /// Display name used in messages
        name: String,

        /// Notify threshold (minutes or positions, per policy)
        #[arg(long, default_value = "15")]
        threshold: u32,

        /// Service minutes when no provider duration applies
        #[arg(long, default_value = "15")]
        default_minutes: u32,
    },

    /// Change the notify threshold
    SetThreshold { threshold: u32 },

    /// Change the default service duration
    SetDefaultDuration { minutes: u32 },
}

#[derive(Subcommand)]
enum ProviderCommand {
    /// Add a provider (starts active, 20 minute average)
    Add { name: String },

    /// List the shop's providers
    List,

    /// Change a provider's average service minutes
    SetDuration { provider_id: String, minutes: u32 },

    /// Make a provider available for new requests
    Activate { provider_id: String },

    /// Stop new requests for a provider
    Deactivate { provider_id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum TransportArg {
    Log,
    Twilio,
}

#[derive(Tabled)]
struct BoardLine {
    #[tabled(rename = "Entry")]
    entry_id: String,
    #[tabled(rename = "Customer")]
    customer: String,
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Pos")]
    position: u32,
    #[tabled(rename = "Est. wait")]
    estimated_wait: String,
    #[tabled(rename = "Waited")]
    waited: String,
    #[tabled(rename = "Notified")]
    notified: String,
}

impl From<BoardRow> for BoardLine {
    fn from(row: BoardRow) -> Self {
        Self {
            provider: row
                .provider_name
                .unwrap_or_else(|| row.affinity.to_string()),
            entry_id: row.entry_id,
            customer: row.customer_name,
            position: row.position,
            estimated_wait: format!("~{} min", row.estimated_wait),
            waited: format!("{} min", row.minutes_waited),
            notified: if row.notified { "yes" } else { "no" }.to_string(),
        }
    }
}

#[derive(Tabled)]
struct ProviderLine {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Avg min")]
    minutes: u32,
    #[tabled(rename = "Active")]
    active: String,
}

impl From<Provider> for ProviderLine {
    fn from(p: Provider) -> Self {
        Self {
            id: p.id,
            name: p.name,
            minutes: p.average_service_minutes,
            active: if p.active { "yes" } else { "no" }.to_string(),
        }
    }
}

#[derive(Tabled)]
struct WaitingLine {
    #[tabled(rename = "Queue")]
    queue: String,
    #[tabled(rename = "Waiting")]
    waiting: usize,
}

impl From<PartitionCount> for WaitingLine {
    fn from(c: PartitionCount) -> Self {
        Self {
            queue: c
                .provider_name
                .unwrap_or_else(|| c.affinity.to_string()),
            waiting: c.waiting,
        }
    }
}

struct Stores {
    pool: SqlitePool,
    queue: Arc<SqliteQueueStore>,
    providers: Arc<SqliteProviderStore>,
    shops: Arc<SqliteShopStore>,
}

async fn open_stores(db: &str) -> Result<Stores> {
    let path = shellexpand::tilde(db).into_owned();
    if let Some(parent) = Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let pool = create_pool(&path)
        .await
        .with_context(|| format!("Failed to open database {}", path))?;
    run_migrations(&pool).await.context("Migration failed")?;

    Ok(Stores {
        queue: Arc::new(SqliteQueueStore::new(pool.clone())),
        providers: Arc::new(SqliteProviderStore::new(pool.clone())),
        shops: Arc::new(SqliteShopStore::new(pool.clone())),
        pool,
    })
}

fn queue_service(stores: &Stores) -> QueueService {
    QueueService::new(
        stores.queue.clone(),
        stores.providers.clone(),
        stores.shops.clone(),
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
    )
}

fn print_shop(shop: &ShopConfig) {
    println!("  {} {}", "Shop:".bold(), shop.name);
    println!("  {} {}", "ID:".bold(), shop.id);
    println!("  {} {}", "Notify threshold:".bold(), shop.notify_threshold);
    println!(
        "  {} {} min",
        "Default service:".bold(),
        shop.default_service_minutes
    );
}

fn print_entry(entry: &QueueEntry) {
    println!("  {} {}", "Entry:".bold(), entry.id);
    println!("  {} {}", "Customer:".bold(), entry.customer_name);
    println!("  {} {}", "Queue:".bold(), entry.affinity());
}

fn build_transport(
    kind: TransportArg,
    account_sid: Option<String>,
    auth_token: Option<String>,
    from_number: Option<String>,
) -> Result<Arc<dyn NotificationTransport>> {
    match kind {
        TransportArg::Log => Ok(Arc::new(LogTransport::new())),
        TransportArg::Twilio => {
            let config = TwilioConfig {
                account_sid: account_sid.context("--account-sid is required for twilio")?,
                auth_token: auth_token.context("--auth-token is required for twilio")?,
                from_number: from_number.context("--from-number is required for twilio")?,
                base_url: TWILIO_API_BASE.to_string(),
                timeout: Duration::from_secs(10),
            };
            Ok(Arc::new(TwilioTransport::new(config)?))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("walkin=warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let stores = open_stores(&cli.db).await?;
    let service = queue_service(&stores);
    let shop_id = cli.shop;

    match cli.command {
        Commands::Shop { command } => {
            let shop = match command {
                ShopCommand::Init {
                    name,
                    threshold,
                    default_minutes,
                } => {
                    let config = ShopConfig::new(shop_id.as_str(), name, threshold, default_minutes)?;
                    service.init_shop(config).await?
                }
                ShopCommand::SetThreshold { threshold } => {
                    service.set_notify_threshold(&shop_id, threshold).await?
                }
                ShopCommand::SetDefaultDuration { minutes } => {
                    service.set_default_service_minutes(&shop_id, minutes).await?
                }
            };
            println!("{}", "✓ Shop saved".green().bold());
            print_shop(&shop);
        }

        Commands::Provider { command } => match command {
            ProviderCommand::Add { name } => {
                let p = service.add_provider(&shop_id, &name).await?;
                println!("{}", format!("✓ Provider {} added", p.name).green().bold());
                println!("{}", Table::new(vec![ProviderLine::from(p)]));
            }
            ProviderCommand::List => {
                let providers = service.list_providers(&shop_id).await?;
                if providers.is_empty() {
                    println!("{}", "No providers".yellow());
                } else {
                    let lines: Vec<ProviderLine> = providers.into_iter().map(Into::into).collect();
                    println!("{}", Table::new(lines));
                }
            }
            ProviderCommand::SetDuration {
                provider_id,
                minutes,
            } => {
                let p = service.set_provider_duration(&provider_id, minutes).await?;
                println!(
                    "{}",
                    format!("✓ {} now averages {} min", p.name, p.average_service_minutes)
                        .green()
                        .bold()
                );
            }
            ProviderCommand::Activate { provider_id } => {
                let p = service.set_provider_active(&provider_id, true).await?;
                println!("{}", format!("✓ {} is active", p.name).green().bold());
            }
            ProviderCommand::Deactivate { provider_id } => {
                let p = service.set_provider_active(&provider_id, false).await?;
                println!("{}", format!("○ {} is inactive", p.name).yellow().bold());
            }
        },

        Commands::Join {
            name,
            phone,
            provider,
        } => {
            let entry = service
                .join(JoinRequest {
                    shop_id: shop_id.clone(),
                    customer_name: name,
                    phone_number: phone,
                    requested_provider: provider,
                })
                .await?;
            println!("{}", "✓ Joined queue".green().bold());
            print_entry(&entry);
        }

        Commands::Board => {
            let rows = service.board(&shop_id).await?;
            let counts = service.customers_ahead(&shop_id).await?;

            println!("{}", format!("Queue for {}", shop_id).cyan().bold());
            println!();
            if rows.is_empty() {
                println!("{}", "Nobody waiting".yellow());
            } else {
                let lines: Vec<BoardLine> = rows.into_iter().map(Into::into).collect();
                println!("{}", Table::new(lines));
            }
            println!();
            let lines: Vec<WaitingLine> = counts.into_iter().map(Into::into).collect();
            println!("{}", Table::new(lines));
        }

        Commands::Remove { entry_id } => {
            let entry = service.remove(&entry_id).await?;
            println!("{}", "✓ Entry removed".green().bold());
            print_entry(&entry);
        }

        Commands::Serve { entry_id } => {
            let entry = service.serve(&entry_id).await?;
            println!("{}", "✓ Entry served".green().bold());
            print_entry(&entry);
        }

        Commands::Notify {
            once,
            interval_secs,
            policy,
            transport,
            account_sid,
            auth_token,
            from_number,
        } => {
            let transport = build_transport(transport, account_sid, auth_token, from_number)?;
            let gate = NotificationGate::new(
                stores.queue.clone(),
                transport,
                Arc::new(UuidProvider),
                Arc::new(SystemTimeProvider),
                DEFAULT_CLAIM_LEASE,
            );
            let cycle = Arc::new(DispatchCycle::new(
                shop_id.clone(),
                stores.shops.clone(),
                stores.queue.clone(),
                stores.providers.clone(),
                policy.evaluator(),
                gate,
            ));

            match stores.shops.get_config(&shop_id).await? {
                Some(shop) => println!(
                    "  {} {} (notify within {} {})",
                    "Policy:".bold(),
                    policy,
                    shop.notify_threshold,
                    policy.threshold_unit()
                ),
                None => println!(
                    "{}",
                    format!("○ Shop {} is not configured (walkin shop init)", shop_id).yellow()
                ),
            }

            if once {
                match cycle.run_once().await? {
                    CycleOutcome::Completed(report) => {
                        println!("{}", "✓ Cycle completed".green().bold());
                        println!("  {} {}", "Waiting:".bold(), report.waiting);
                        println!("  {} {}", "Eligible:".bold(), report.eligible);
                        println!("  {} {}", "Delivered:".bold(), report.delivered);
                        if report.transport_failures > 0 || report.entry_errors > 0 {
                            println!(
                                "  {} {} send failures, {} entry errors (retried next cycle)",
                                "✗".red(),
                                report.transport_failures,
                                report.entry_errors
                            );
                        }
                    }
                    CycleOutcome::Skipped => {
                        println!("{}", "○ Another cycle is running".yellow());
                    }
                }
            } else {
                if interval_secs == 0 {
                    anyhow::bail!("--interval-secs must be at least 1");
                }
                println!(
                    "{}",
                    format!("Notifying every {}s, Ctrl+C to stop", interval_secs).cyan()
                );
                let handle =
                    NotificationScheduler::new(cycle, Duration::from_secs(interval_secs)).start();
                tokio::signal::ctrl_c().await?;
                if !handle.stop(DEFAULT_SHUTDOWN_TIMEOUT).await {
                    println!("{}", "○ In-flight cycle aborted".yellow());
                }
            }
        }
    }

    stores.pool.close().await;
    Ok(())
}
