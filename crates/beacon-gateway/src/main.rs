//! Beacon bot entry point
//!
//! Run with:
//! ```bash
//! DISCORD_TOKEN=... cargo run -p beacon-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use beacon_common::{try_init_tracing_with_config, BotConfig, TracingConfig};
use beacon_gateway::{Bot, CommandContext, GatewayError, HandlerResult};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing
    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_bot(&config)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "Bot stopped");
        std::process::exit(1);
    }
}

async fn run(config: BotConfig) -> Result<(), GatewayError> {
    info!(
        app = %config.app.name,
        env = ?config.app.env,
        api = %config.discord.api_base_url,
        "Configuration loaded"
    );

    let mut bot = Bot::new(config);
    bot.command("ping", ping).command("characters", characters);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                signal.cancel();
            }
            Err(e) => warn!(error = %e, "Cannot listen for shutdown signal"),
        }
    });

    bot.start(shutdown).await
}

async fn ping(ctx: CommandContext) -> HandlerResult<()> {
    ctx.send_content("PONG").await
}

async fn characters(ctx: CommandContext) -> HandlerResult<()> {
    ctx.send_content("kuromi, keropi, hello kitty").await
}
