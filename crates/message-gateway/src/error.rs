//! Error types for message-gateway.

use thiserror::Error;

/// Errors that can occur when interacting with the messaging provider.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed (includes timeouts).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error response from the provider.
    #[error("Provider error {code}: {message}")]
    Provider { code: String, message: String },

    /// Connection to the provider failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Provider health check failed.
    #[error("Health check failed")]
    HealthCheckFailed,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}
