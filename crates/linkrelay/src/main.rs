use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use linkrelay::Config;
use linkrelay::bookmark::{ServiceRegistry, Submitter};
use linkrelay::engine::ConversationEngine;
use linkrelay::gateway::{CHANNEL_CAPACITY, EventHandler, GatewaySender, route_events};
use linkrelay_gateway_telegram::{TelegramConfig, TelegramGateway};

#[derive(Parser)]
#[command(name = "linkrelay", version, about = "Save links to Linkding or Readeck from Telegram")]
struct Cli {
    /// Path to the YAML config file. Missing file means env-only configuration.
    #[arg(short, long, default_value = "linkrelay.yaml")]
    config: PathBuf,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .compact()
        .init();

    let config = match Config::load(&cli.config).await {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, path = %cli.config.display(), "Invalid configuration");
            std::process::exit(1);
        }
    };

    let registry =
        ServiceRegistry::from_config(&config).context("failed to build HTTP client")?;
    let engine = ConversationEngine::new(config.mode, Submitter::new(registry));
    let handler: Arc<dyn EventHandler> = Arc::new(config.access_gate().wrap(engine));

    info!(
        mode = ?config.mode,
        chat_id = config.access.chat_id,
        thread_id = ?config.access.thread_id,
        "Starting linkrelay"
    );

    let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let router = tokio::spawn(route_events(
        event_rx,
        handler,
        GatewaySender::new(cmd_tx),
    ));

    let gateway = TelegramGateway::new(TelegramConfig {
        bot_token: config.bot_token,
    });
    gateway.run(event_tx, cmd_rx).await;

    router.await.context("event router panicked")?;
    info!("linkrelay stopped");
    Ok(())
}
