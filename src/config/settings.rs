//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Durable log configuration (Redis Streams or in-process)
    pub broker: BrokerSettings,

    /// User directory configuration
    pub directory: DirectorySettings,

    /// JWT settings used to resolve connection identities
    pub jwt: JwtSettings,

    /// Relay fan-out and publish policy
    pub relay: RelaySettings,

    /// WebSocket configuration
    pub websocket: WebSocketSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// Which broker implementation backs the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerBackend {
    Redis,
    Memory,
}

/// Durable log configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerSettings {
    pub backend: BrokerBackend,

    /// Redis connection URL
    pub redis_url: String,

    /// Prefix prepended to every stream key
    pub stream_prefix: String,

    /// Consumer group name. Every relay node needs its own group to see every record.
    pub consumer_group: String,

    /// Consumer name inside the group
    pub consumer_name: String,

    /// Maximum records returned by one read
    pub batch_size: usize,

    /// How long a read blocks waiting for records, in milliseconds
    pub block_ms: u64,

    /// Approximate stream length kept by the broker
    pub max_len: usize,

    /// Read the whole retained stream when the group is first created
    pub start_from_earliest: bool,

    /// Pause after a failed read before polling again, in milliseconds
    pub read_retry_backoff_ms: u64,
}

/// Which directory implementation resolves identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryBackend {
    Memory,
    Postgres,
}

/// A user known to the in-memory directory.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub user_id: String,
    pub username: String,
}

/// User directory configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectorySettings {
    pub backend: DirectoryBackend,

    /// PostgreSQL connection URL (postgres backend only)
    pub database_url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,

    /// Users loaded into the in-memory directory
    #[serde(default)]
    pub seed_users: Vec<SeedUser>,
}

/// JWT configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key tokens are signed with
    pub secret: String,

    /// Expected `iss` claim, if any
    pub issuer: Option<String>,

    /// Expected `aud` claim, if any
    pub audience: Option<String>,
}

/// Relay fan-out and publish policy.
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    /// Upper bound for a single delivery into a connection's outbound queue
    pub delivery_timeout_ms: u64,

    /// Capacity of each connection's outbound queue
    pub outbound_buffer: usize,

    /// Extra publish attempts for chat messages
    pub publish_retries: u32,

    /// Pause between publish attempts, in milliseconds
    pub publish_retry_backoff_ms: u64,
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum message size in bytes (default: 64KB)
    pub max_message_size: usize,

    /// Maximum frame size in bytes (default: 16KB)
    pub max_frame_size: usize,

    /// Heartbeat interval in milliseconds (default: 45000)
    pub heartbeat_interval_ms: u64,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if a cross-field check fails.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Self::builder(&environment)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("broker.redis_url", std::env::var("REDIS_URL").ok())?
            .set_override_option("directory.database_url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .build()?
            .try_deserialize()
            .and_then(Self::validate)
    }

    /// Defaults plus explicit overrides; reads neither files nor the environment.
    pub fn from_overrides(overrides: &[(&str, &str)]) -> Result<Self, ConfigError> {
        let mut builder = Self::builder("test")?;
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        builder.build()?.try_deserialize().and_then(Self::validate)
    }

    /// Base builder holding every default value.
    fn builder(
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", environment)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("broker.backend", "redis")?
            .set_default("broker.redis_url", "redis://127.0.0.1:6379")?
            .set_default("broker.stream_prefix", "")?
            .set_default("broker.consumer_group", "chat-relay")?
            .set_default("broker.consumer_name", "relay-1")?
            .set_default("broker.batch_size", 64)?
            .set_default("broker.block_ms", 400)?
            .set_default("broker.max_len", 100_000)?
            .set_default("broker.start_from_earliest", false)?
            .set_default("broker.read_retry_backoff_ms", 500)?
            .set_default("directory.backend", "memory")?
            .set_default("directory.max_connections", 5)?
            .set_default("directory.acquire_timeout", 30)?
            .set_default("directory.seed_users", default_seed_users())?
            .set_default("relay.delivery_timeout_ms", 250)?
            .set_default("relay.outbound_buffer", 256)?
            .set_default("relay.publish_retries", 2)?
            .set_default("relay.publish_retry_backoff_ms", 100)?
            .set_default("websocket.max_message_size", 65536_i64)? // 64KB
            .set_default("websocket.max_frame_size", 16384_i64)? // 16KB
            .set_default("websocket.heartbeat_interval_ms", 45000_i64)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters for security. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        if self.directory.backend == DirectoryBackend::Postgres
            && self.directory.database_url.is_none()
        {
            return Err(ConfigError::Message(
                "directory.database_url is required for the postgres directory".into(),
            ));
        }
        if self.relay.outbound_buffer == 0 {
            return Err(ConfigError::Message(
                "relay.outbound_buffer must be greater than zero".into(),
            ));
        }
        Ok(self)
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn default_seed_users() -> Vec<config::Value> {
    [
        ("0f6c1c52-4a4e-4bb1-9a55-3d1f4c1a0001", "alice"),
        ("0f6c1c52-4a4e-4bb1-9a55-3d1f4c1a0002", "bob"),
        ("0f6c1c52-4a4e-4bb1-9a55-3d1f4c1a0003", "charlie"),
    ]
    .into_iter()
    .map(|(user_id, username)| {
        let mut table = config::Map::new();
        table.insert("user_id".to_string(), config::Value::from(user_id));
        table.insert("username".to_string(), config::Value::from(username));
        config::Value::from(table)
    })
    .collect()
}

impl ServerSettings {
    /// Get the socket address for binding.
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}
