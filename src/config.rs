//! Server configuration via CLI args and environment variables.

use std::time::Duration;

use board_service::ServiceConfig;
use clap::{ArgAction, Parser, ValueEnum};

/// Where posts are kept.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process log, lost on restart.
    Memory,
    /// PostgREST-compatible remote table.
    Rest,
}

/// Message board server with an anti-abuse write gate.
#[derive(Parser, Debug, Clone)]
#[command(name = "board-server", version, about)]
pub struct Config {
    /// Bind address.
    #[arg(long, default_value = "0.0.0.0", env = "BOARD_HOST")]
    pub host: String,

    /// Bind port.
    #[arg(long, default_value_t = 3000, env = "PORT")]
    pub port: u16,

    /// Accept new posts. When false every POST gets 503.
    #[arg(long, default_value_t = true, action = ArgAction::Set, env = "BOARD_POST_ENABLED")]
    pub post_enabled: bool,

    /// Posts per rate-limit window and client (0 = no window count; the
    /// minimum gap still applies).
    #[arg(long, default_value_t = 6, env = "BOARD_RL_LIMIT")]
    pub rl_limit: u64,

    /// Rate-limit window in milliseconds.
    #[arg(long, default_value_t = 60_000, env = "BOARD_RL_WINDOW_MS")]
    pub rl_window_ms: u64,

    /// Minimum gap between two posts from one client, in milliseconds.
    #[arg(long, default_value_t = 8_000, env = "BOARD_MIN_INTERVAL_MS")]
    pub min_interval_ms: u64,

    /// Minimum gap between any two posts, in milliseconds (0 = off).
    #[arg(long, default_value_t = 1_500, env = "BOARD_GLOBAL_COOLDOWN_MS")]
    pub global_cooldown_ms: u64,

    /// How long an identical body is refused, in milliseconds (0 = off).
    #[arg(long, default_value_t = 900_000, env = "BOARD_TEXT_WINDOW_MS")]
    pub text_window_ms: u64,

    /// Refuse bodies that contain links.
    #[arg(long, default_value_t = true, action = ArgAction::Set, env = "BOARD_BLOCK_URLS")]
    pub block_urls: bool,

    /// Origins allowed to post (comma-separated).
    #[arg(
        long,
        default_value = "http://localhost:3000",
        env = "BOARD_ALLOWED_ORIGINS",
        value_delimiter = ','
    )]
    pub allowed_origins: Vec<String>,

    /// Mark the CSRF cookie `Secure` (set behind HTTPS).
    #[arg(long, default_value_t = false, action = ArgAction::Set, env = "BOARD_SECURE_COOKIE")]
    pub secure_cookie: bool,

    /// Storage backend.
    #[arg(long, value_enum, default_value_t = StoreBackend::Memory, env = "BOARD_STORE")]
    pub store: StoreBackend,

    /// Base URL of the remote store (rest backend).
    #[arg(long, env = "BOARD_STORE_URL")]
    pub store_url: Option<String>,

    /// API key for the remote store (rest backend).
    #[arg(long, env = "BOARD_STORE_KEY", hide_env_values = true)]
    pub store_key: Option<String>,

    /// Table holding the posts (rest backend).
    #[arg(long, default_value = "messages", env = "BOARD_STORE_TABLE")]
    pub store_table: String,

    /// Log level.
    #[arg(long, default_value = "info", env = "BOARD_LOG_LEVEL")]
    pub log_level: String,

    /// Log format: "text" or "json".
    #[arg(long, default_value = "text", env = "BOARD_LOG_FORMAT")]
    pub log_format: String,
}

impl Config {
    /// Parses configuration from CLI args and env vars.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Service-layer settings derived from this config.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            post_enabled: self.post_enabled,
            rate_limit: self.rl_limit,
            rate_limit_window: Duration::from_millis(self.rl_window_ms),
            min_interval: Duration::from_millis(self.min_interval_ms),
            global_cooldown: Duration::from_millis(self.global_cooldown_ms),
            duplicate_window: Duration::from_millis(self.text_window_ms),
            block_urls: self.block_urls,
            allowed_origins: self
                .allowed_origins
                .iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_defaults() {
        let config = Config::try_parse_from(["board-server"]).unwrap();
        let service = config.service_config();
        let expected = ServiceConfig::default();

        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(service.rate_limit, expected.rate_limit);
        assert_eq!(service.rate_limit_window, expected.rate_limit_window);
        assert_eq!(service.min_interval, expected.min_interval);
        assert_eq!(service.global_cooldown, expected.global_cooldown);
        assert_eq!(service.duplicate_window, expected.duplicate_window);
        assert_eq!(service.allowed_origins, expected.allowed_origins);
        assert!(service.post_enabled && service.block_urls);
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "board-server",
            "--post-enabled",
            "false",
            "--allowed-origins",
            "https://a.example, https://b.example",
            "--store",
            "rest",
        ])
        .unwrap();
        let service = config.service_config();

        assert!(!service.post_enabled);
        assert_eq!(
            service.allowed_origins,
            ["https://a.example", "https://b.example"]
        );
        assert_eq!(config.store, StoreBackend::Rest);
    }
}
