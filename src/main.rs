//! Rodeo keeper
//!
//! One-shot batch job, meant to be started by cron every few minutes:
//! - Mirrors positions, pools and strategy APYs into Postgres
//! - Ingests investor and strategy events and posts chat alerts
//! - Liquidates unhealthy positions, refreshes stale oracles, harvests strategies
//!
//! Each invocation runs whatever tasks are due and exits.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use keeper_api::{ApyClient, TelegramClient};
use keeper_chain::AlloyChainClient;
use keeper_core::{
    build_tasks, ChainCatalog, KeeperConfig, KeeperContext, KeeperSettings, LogNotifier, Notifier,
    SystemClock, TaskScheduler, TelegramNotifier,
};
use keeper_store::{IdGenerator, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let config = KeeperConfig::from_env().context("invalid keeper configuration")?;
    info!(?config, "Starting Rodeo keeper");

    let settings = match &config.settings_path {
        Some(path) => KeeperSettings::from_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => KeeperSettings::default(),
    };
    settings.log_settings();

    let catalog = ChainCatalog::load(config.chain_id, config.config_dir.as_deref())
        .context("failed to load chain catalog")?;

    // Store
    let store = PgStore::connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    store.ensure_schema().await.context("failed to prepare database schema")?;
    info!("Database ready");

    // Chain
    // No network io here: an unreachable rpc fails the chain tasks, not the run
    let chain = AlloyChainClient::new(
        &config.rpc_url,
        config.chain_id,
        &config.private_key,
        catalog.gas.clone(),
    )
    .context("invalid chain client configuration")?;

    // Alerts
    let notifier: Arc<dyn Notifier> = match &config.telegram {
        Some(telegram) => Arc::new(TelegramNotifier::new(TelegramClient::new(
            telegram.bot_token.clone(),
            telegram.chat_id.clone(),
        ))),
        None => {
            warn!("Telegram not configured, alerts go to the log");
            Arc::new(LogNotifier)
        }
    };

    let ctx = KeeperContext {
        chain: Arc::new(chain),
        store: Arc::new(store),
        notifier,
        apy: Arc::new(ApyClient::new(config.api_url.clone())),
        clock: Arc::new(SystemClock),
        ids: Arc::new(IdGenerator::new()),
        catalog,
        settings,
        investor: config.investor,
        helper: config.investor_helper,
    };

    let scheduler = TaskScheduler::new(
        build_tasks(&ctx),
        ctx.store.clone(),
        ctx.clock.clone(),
        ctx.ids.clone(),
    )
    .with_forced(config.force_tasks.iter().cloned());

    let summary = scheduler.run_due_tasks().await?;
    for outcome in &summary.executed {
        if let Some(err) = &outcome.error {
            error!(task = %outcome.id, error = %err, "Task finished with error");
        }
    }

    info!(
        executed = summary.executed.len(),
        failed = summary.failed(),
        skipped = summary.skipped.len(),
        "All done!"
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,keeper_core=debug,keeper_chain=debug"));

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}
