use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use multifeed_core::{CommandDispatcher, RedirectionLifecycle};
use multifeed_store::{MemoryStore, RedirectionStore, SqliteStore};
use multifeed_telegram::{poll_loop, TelegramApi, TelegramTransport};
use multifeed_types::BotConfig;

/// MultiFeed -- Telegram bot for channel-to-channel message redirections.
#[derive(Parser, Debug)]
#[command(name = "multifeed", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bot until interrupted
    Run {
        /// Path to the config file (default: ./multifeed.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Load and validate the configuration, then exit
    ConfigCheck {
        /// Path to the config file (default: ./multifeed.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with env filter (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(config.as_deref()).await,
        Commands::ConfigCheck { config } => config_check(config.as_deref()),
    }
}

async fn run(config_path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let config = BotConfig::load(config_path).context("failed to load configuration")?;
    config.require_token()?;

    let store: Arc<dyn RedirectionStore> = match &config.database_path {
        Some(path) => {
            info!(path = %path.display(), "opening SQLite store");
            Arc::new(SqliteStore::open(path).context("failed to open database")?)
        }
        None => {
            warn!("no database_path configured; records will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let api = Arc::new(TelegramApi::with_base_url(
        &config.bot_token,
        &config.api_base_url,
    ));
    let transport = Arc::new(TelegramTransport::new(api.clone()));
    let lifecycle = RedirectionLifecycle::new(store, transport.clone());
    let dispatcher = Arc::new(CommandDispatcher::new(lifecycle));

    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    let poller = tokio::spawn(poll_loop(
        api,
        dispatcher,
        transport,
        config.poll_timeout_secs,
        cancel_rx,
    ));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    // Unblock the long poll and wait for the loop to drain.
    let _ = cancel_tx.send(true);
    poller.await.context("poller task panicked")?;

    Ok(())
}

fn config_check(config_path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let config = BotConfig::load(config_path).context("failed to load configuration")?;
    config.require_token()?;

    println!("configuration OK");
    println!(
        "  database: {}",
        config
            .database_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "in-memory".to_string())
    );
    println!("  poll timeout: {}s", config.poll_timeout_secs);
    Ok(())
}
