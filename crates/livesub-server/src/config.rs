use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use livesub_core::config::{
    DEFAULT_MAILBOX_CAPACITY, DEFAULT_MAX_SESSIONS, DEFAULT_OUTBOUND_CAPACITY,
};
use livesub_core::{BrokerConfig, OverflowPolicy};

/// Default address to bind to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port to listen on.
pub const DEFAULT_PORT: u16 = 8080;

/// Default capacity of the queue behind `POST /changes/enqueue`.
pub const DEFAULT_CDC_BUFFER: usize = 1024;

/// How WebSocket clients are authenticated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum AuthMode {
    /// Every connection is anonymous.
    #[default]
    None,
    /// Static bearer tokens from `LIVESUB_TOKENS`.
    Token,
    /// HS256 JWTs verified with `LIVESUB_JWT_SECRET`.
    Jwt,
}

#[derive(Debug, Parser)]
#[command(name = "livesub-server")]
#[command(about = "livesub - live change subscriptions over WebSocket")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind to
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// JSON file declaring subscribable models
    #[arg(short, long)]
    pub schema: Option<PathBuf>,

    /// Events buffered per session before the overflow policy applies
    #[arg(long, default_value_t = DEFAULT_MAILBOX_CAPACITY)]
    pub mailbox_capacity: usize,

    /// What to do when a session's mailbox is full (drop-oldest, disconnect)
    #[arg(long, default_value_t = OverflowPolicy::DropOldest)]
    pub overflow_policy: OverflowPolicy,

    /// Messages buffered between a session and its socket
    #[arg(long, default_value_t = DEFAULT_OUTBOUND_CAPACITY)]
    pub outbound_capacity: usize,

    /// Maximum concurrent sessions
    #[arg(long, default_value_t = DEFAULT_MAX_SESSIONS)]
    pub max_sessions: usize,

    /// Capacity of the change ingestion queue
    #[arg(long, default_value_t = DEFAULT_CDC_BUFFER)]
    pub cdc_buffer: usize,

    /// Authentication mode
    #[arg(long, value_enum, default_value_t = AuthMode::None)]
    pub auth: AuthMode,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Model schema file; `None` starts with an empty registry.
    pub schema_path: Option<PathBuf>,
    pub broker: BrokerConfig,
    pub cdc_buffer: usize,
    pub auth: AuthMode,
}

impl ServerConfig {
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            schema_path: None,
            broker: BrokerConfig::default(),
            cdc_buffer: DEFAULT_CDC_BUFFER,
            auth: AuthMode::None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = Some(path.into());
        self
    }

    pub fn with_broker(mut self, broker: BrokerConfig) -> Self {
        self.broker = broker;
        self
    }

    pub fn with_cdc_buffer(mut self, size: usize) -> Self {
        self.cdc_buffer = size.max(1);
        self
    }

    pub fn with_auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        let broker = BrokerConfig::new()
            .with_mailbox_capacity(args.mailbox_capacity)
            .with_overflow_policy(args.overflow_policy)
            .with_outbound_capacity(args.outbound_capacity)
            .with_max_sessions(args.max_sessions);

        Self {
            host: args.host,
            port: args.port,
            schema_path: args.schema,
            broker,
            cdc_buffer: args.cdc_buffer.max(1),
            auth: args.auth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr(), "127.0.0.1:8080");
        assert_eq!(config.auth, AuthMode::None);
        assert!(config.schema_path.is_none());
        assert_eq!(config.broker.mailbox_capacity, DEFAULT_MAILBOX_CAPACITY);
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::new()
            .with_host("0.0.0.0")
            .with_port(9000)
            .with_schema_path("models.json")
            .with_cdc_buffer(0)
            .with_auth(AuthMode::Jwt);

        assert_eq!(config.listen_addr(), "0.0.0.0:9000");
        assert_eq!(config.schema_path, Some(PathBuf::from("models.json")));
        assert_eq!(config.cdc_buffer, 1);
        assert_eq!(config.auth, AuthMode::Jwt);
    }

    #[test]
    fn test_args_conversion() {
        let args = Args::parse_from([
            "livesub-server",
            "--port",
            "9001",
            "--schema",
            "models.json",
            "--mailbox-capacity",
            "16",
            "--overflow-policy",
            "disconnect",
            "--max-sessions",
            "3",
            "--auth",
            "token",
        ]);
        let config: ServerConfig = args.into();

        assert_eq!(config.port, 9001);
        assert_eq!(config.broker.mailbox_capacity, 16);
        assert_eq!(config.broker.overflow_policy, OverflowPolicy::Disconnect);
        assert_eq!(config.broker.max_sessions, 3);
        assert_eq!(config.auth, AuthMode::Token);
    }

    #[test]
    fn test_bad_overflow_policy_rejected() {
        let result = Args::try_parse_from(["livesub-server", "--overflow-policy", "block"]);
        assert!(result.is_err());
    }
}
