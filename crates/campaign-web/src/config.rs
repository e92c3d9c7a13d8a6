//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;

/// Campaign API server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Messaging provider base URL.
    pub gateway_url: String,
    /// Messaging provider bearer token.
    pub gateway_token: Option<String>,
    /// Default sender identity for outbound messages.
    pub sender_id: Option<String>,
    /// Directory where uploaded recipient files are stored.
    pub upload_dir: String,
    /// Country code applied to bare national phone numbers.
    pub default_country_code: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `API_ADDR` | Server bind address | `127.0.0.1:8790` |
    /// | `SQLITE_PATH` | SQLite database URL | `sqlite:courier.db?mode=rwc` |
    /// | `GATEWAY_URL` | Messaging provider base URL | `http://127.0.0.1:8900` |
    /// | `GATEWAY_TOKEN` | Provider bearer token | (none) |
    /// | `SENDER_ID` | Default sender identity | (none) |
    /// | `UPLOAD_DIR` | Upload storage directory | `uploads` |
    /// | `DEFAULT_COUNTRY_CODE` | Country code for national numbers | `1` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("API_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8790".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url = env::var("SQLITE_PATH")
            .unwrap_or_else(|_| "sqlite:courier.db?mode=rwc".to_string());

        let gateway_url = env::var("GATEWAY_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8900".to_string());

        let gateway_token = env::var("GATEWAY_TOKEN").ok().filter(|t| !t.is_empty());

        let sender_id = env::var("SENDER_ID").ok().filter(|s| !s.is_empty());

        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());

        let default_country_code = env::var("DEFAULT_COUNTRY_CODE")
            .ok()
            .filter(|c| !c.is_empty() && c.chars().all(|ch| ch.is_ascii_digit()))
            .unwrap_or_else(|| "1".to_string());

        Ok(Self {
            addr,
            database_url,
            gateway_url,
            gateway_token,
            sender_id,
            upload_dir,
            default_country_code,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid API_ADDR format")]
    InvalidAddr,
}
