//! Bot configuration structs
//!
//! Loads configuration from environment variables, or builds it explicitly.

use serde::Deserialize;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Main bot configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub app: AppSettings,
    pub discord: DiscordConfig,
    pub gateway: GatewayConfig,
    pub presence: PresenceConfig,
    pub log: LogConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Credentials and REST endpoint of the remote service
#[derive(Clone, Deserialize)]
pub struct DiscordConfig {
    pub token: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Gateway intents bitfield requested on identify
    #[serde(default)]
    pub intents: u64,
}

impl fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("intents", &self.intents)
            .finish()
    }
}

/// Gateway connection tuning
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Gateway protocol version (`v` query parameter)
    #[serde(default = "default_gateway_version")]
    pub version: u8,
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    /// `None` retries forever
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,
    /// Outbound queue capacity per connection
    #[serde(default = "default_writer_capacity")]
    pub writer_capacity: usize,
    #[serde(default = "default_enqueue_timeout_ms")]
    pub enqueue_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl GatewayConfig {
    #[must_use]
    pub fn reconnect_base(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_ms)
    }

    #[must_use]
    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }

    #[must_use]
    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: default_gateway_version(),
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            max_reconnect_attempts: None,
            writer_capacity: default_writer_capacity(),
            enqueue_timeout_ms: default_enqueue_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Static presence sent with identify
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "default_activity_name")]
    pub activity_name: String,
    /// Activity type (0 = Playing, 2 = Listening, 3 = Watching)
    #[serde(default)]
    pub activity_type: u8,
    #[serde(default = "default_status")]
    pub status: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            activity_name: default_activity_name(),
            activity_type: 0,
            status: default_status(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Debug-level logging
    #[serde(default)]
    pub verbose: bool,
}

// Default value functions
fn default_app_name() -> String {
    "beacon".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_api_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_gateway_version() -> u8 {
    10
}

fn default_reconnect_base_ms() -> u64 {
    1_000
}

fn default_reconnect_max_ms() -> u64 {
    60_000
}

fn default_writer_capacity() -> usize {
    100
}

fn default_enqueue_timeout_ms() -> u64 {
    5_000
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

fn default_activity_name() -> String {
    "with the gateway".to_string()
}

fn default_status() -> String {
    "online".to_string()
}

impl BotConfig {
    /// Build a configuration with defaults for everything but the token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: default_env(),
            },
            discord: DiscordConfig {
                token: token.into(),
                api_base_url: default_api_base_url(),
                intents: 0,
            },
            gateway: GatewayConfig::default(),
            presence: PresenceConfig::default(),
            log: LogConfig::default(),
        }
    }

    /// Override the REST base URL (e.g. `https://discord.com/api/v10`)
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.discord.api_base_url = url.into();
        self
    }

    /// Set the requested gateway intents
    #[must_use]
    pub fn with_intents(mut self, intents: u64) -> Self {
        self.discord.intents = intents;
        self
    }

    /// Replace the gateway tuning section
    #[must_use]
    pub fn with_gateway(mut self, gateway: GatewayConfig) -> Self {
        self.gateway = gateway;
        self
    }

    /// Toggle debug logging
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.log.verbose = verbose;
        self
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `DISCORD_TOKEN` is missing or a numeric variable is malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("DISCORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingVar("DISCORD_TOKEN"))?;

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .and_then(|s| Environment::parse(&s))
                    .unwrap_or_default(),
            },
            discord: DiscordConfig {
                token,
                api_base_url: lookup("DISCORD_API_BASE_URL")
                    .map(|s| s.trim_end_matches('/').to_string())
                    .unwrap_or_else(default_api_base_url),
                intents: parse_var(&lookup, "DISCORD_INTENTS", 0)?,
            },
            gateway: GatewayConfig {
                version: parse_var(&lookup, "GATEWAY_VERSION", default_gateway_version())?,
                reconnect_base_ms: parse_var(
                    &lookup,
                    "GATEWAY_RECONNECT_BASE_MS",
                    default_reconnect_base_ms(),
                )?,
                reconnect_max_ms: parse_var(
                    &lookup,
                    "GATEWAY_RECONNECT_MAX_MS",
                    default_reconnect_max_ms(),
                )?,
                max_reconnect_attempts: lookup("GATEWAY_MAX_RECONNECT_ATTEMPTS")
                    .map(|s| {
                        s.parse()
                            .map_err(|_| ConfigError::InvalidValue("GATEWAY_MAX_RECONNECT_ATTEMPTS", s))
                    })
                    .transpose()?,
                writer_capacity: parse_var(
                    &lookup,
                    "GATEWAY_WRITER_CAPACITY",
                    default_writer_capacity(),
                )?,
                enqueue_timeout_ms: parse_var(
                    &lookup,
                    "GATEWAY_ENQUEUE_TIMEOUT_MS",
                    default_enqueue_timeout_ms(),
                )?,
                connect_timeout_ms: parse_var(
                    &lookup,
                    "GATEWAY_CONNECT_TIMEOUT_MS",
                    default_connect_timeout_ms(),
                )?,
            },
            presence: PresenceConfig {
                activity_name: lookup("BOT_ACTIVITY_NAME").unwrap_or_else(default_activity_name),
                activity_type: parse_var(&lookup, "BOT_ACTIVITY_TYPE", 0)?,
                status: lookup("BOT_STATUS").unwrap_or_else(default_status),
            },
            log: LogConfig {
                verbose: lookup("LOG_LEVEL").is_some_and(|s| s.eq_ignore_ascii_case("debug")),
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
