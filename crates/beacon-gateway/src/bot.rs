//! Bot facade
//!
//! Collects command handlers, then hands them to the connection manager.

use crate::connection::{ConnectionManager, GatewayError, GatewayResult};
use crate::handlers::{CommandDispatcher, CommandHandler, CommandRegistry};
use crate::rest::RestClient;
use beacon_common::BotConfig;
use tokio_util::sync::CancellationToken;

/// A gateway bot
///
/// ```no_run
/// # async fn example() -> Result<(), beacon_gateway::GatewayError> {
/// use beacon_common::BotConfig;
/// use beacon_gateway::{Bot, CommandContext};
/// use tokio_util::sync::CancellationToken;
///
/// let mut bot = Bot::new(BotConfig::new("token"));
/// bot.command("ping", |ctx: CommandContext| async move { ctx.send_content("PONG").await });
/// bot.start(CancellationToken::new()).await
/// # }
/// ```
#[derive(Debug)]
pub struct Bot {
    config: BotConfig,
    registry: CommandRegistry,
}

impl Bot {
    #[must_use]
    pub fn new(config: BotConfig) -> Self {
        Self {
            config,
            registry: CommandRegistry::new(),
        }
    }

    /// Register a command handler
    pub fn command<H>(&mut self, name: impl Into<String>, handler: H) -> &mut Self
    where
        H: CommandHandler,
    {
        self.registry.register(name, handler);
        self
    }

    /// Registered commands
    #[must_use]
    pub fn commands(&self) -> &CommandRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Freeze the registry and build the connection manager
    pub fn into_manager(self) -> GatewayResult<ConnectionManager> {
        let rest = RestClient::new(&self.config.discord).map_err(GatewayError::Bootstrap)?;
        let dispatcher = CommandDispatcher::new(self.registry);
        Ok(ConnectionManager::new(self.config, rest, dispatcher))
    }

    /// Connect and run until `shutdown` is cancelled or the session ends
    pub async fn start(self, shutdown: CancellationToken) -> GatewayResult<()> {
        tracing::info!(commands = ?self.registry.names(), "Starting bot");
        self.into_manager()?.run(shutdown).await
    }
}
