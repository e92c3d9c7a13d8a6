//! Configuration types for message-gateway.

/// Configuration for connecting to the messaging provider API.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the provider API (e.g., "https://gateway.example.com").
    pub base_url: String,
    /// Bearer token for authentication.
    pub api_token: Option<String>,
    /// Default sender identity used when a send carries no override.
    pub sender_id: Option<String>,
}

impl GatewayConfig {
    /// Create a new configuration with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            sender_id: None,
        }
    }

    /// Set the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Set the default sender identity.
    pub fn with_sender(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    /// Get the template-send endpoint URL.
    pub fn send_url(&self) -> String {
        format!("{}/v1/messages/template", self.base_url)
    }

    /// Get the health check endpoint URL.
    pub fn health_url(&self) -> String {
        format!("{}/v1/health", self.base_url)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new("http://localhost:8900")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_derive_from_base() {
        let config = GatewayConfig::new("https://gw.example.com");
        assert_eq!(config.send_url(), "https://gw.example.com/v1/messages/template");
        assert_eq!(config.health_url(), "https://gw.example.com/v1/health");
    }
}
