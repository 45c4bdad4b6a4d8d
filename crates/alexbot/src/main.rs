use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use alexbot_core::config::CONFIG_ENV_VAR;
use alexbot_core::BotConfig;
use alexbot_discord::DiscordAdapter;

mod app;

const DEFAULT_LOG_FILTER: &str = "alexbot=info,alexbot_agent=info,alexbot_discord=info";

/// Discord chat bot backed by OpenAI chat, image and speech models.
#[derive(Debug, Parser)]
#[command(
    name = "alexbot",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("ALEXBOT_GIT_SHA"), ")")
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<String>,

    /// Load and validate the config, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config / ALEXBOT_CONFIG > ./config.toml
    let config = match BotConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(code = e.code(), error = %e, "config load failed");
            return Err(e.into());
        }
    };
    info!(
        server_id = config.discord.server_id,
        chat_model = %config.openai.chat_model,
        scope = ?config.bot.session_scope,
        output_dir = %config.bot.output_dir,
        "configuration loaded"
    );

    if cli.check {
        info!("configuration is valid");
        return Ok(());
    }

    let state = Arc::new(app::AppState::from_config(config)?);
    let adapter = DiscordAdapter::new(&state.config, Arc::clone(&state))?;

    info!(version = env!("CARGO_PKG_VERSION"), "alexbot starting");

    tokio::select! {
        _ = adapter.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}
