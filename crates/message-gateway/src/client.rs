//! Messaging provider HTTP client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::types::{ProviderErrorBody, TemplateSend, TemplateSendResult};

/// Fixed timeout for all provider calls. A timed-out send is treated the
/// same as any other send failure by callers.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the business-messaging provider API.
#[derive(Clone)]
pub struct GatewayClient {
    http: Client,
    config: GatewayConfig,
    connected: Arc<AtomicBool>,
}

impl GatewayClient {
    /// Connect to the provider and verify reachability.
    pub async fn connect(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Self::new(config)?;

        // Verify connection with health check
        if client.health_check().await? {
            client.connected.store(true, Ordering::SeqCst);
            info!("Connected to messaging provider at {}", client.config.base_url);
        } else {
            return Err(GatewayError::HealthCheckFailed);
        }

        Ok(client)
    }

    /// Build a client without probing the provider. Useful when the
    /// provider may be temporarily unreachable at startup.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(GatewayError::Http)?;

        Ok(Self {
            http,
            config,
            connected: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Check if the last health probe succeeded.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Perform a health check against the provider.
    pub async fn health_check(&self) -> Result<bool, GatewayError> {
        let url = self.config.health_url();
        debug!("Health check: {}", url);

        match self.request(self.http.get(&url)).send().await {
            Ok(resp) => {
                let ok = resp.status().is_success();
                self.connected.store(ok, Ordering::SeqCst);
                Ok(ok)
            }
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(GatewayError::Http(e))
            }
        }
    }

    /// Send a template message.
    ///
    /// Fills in the configured default sender when the params carry no
    /// override. Provider errors, network errors, and timeouts are all
    /// returned as [`GatewayError`] for the caller's failure path.
    pub async fn send_template(
        &self,
        mut params: TemplateSend,
    ) -> Result<TemplateSendResult, GatewayError> {
        if params.sender_id.is_none() {
            params.sender_id = self.config.sender_id.clone();
        }

        let url = self.config.send_url();
        debug!(
            to = %params.to,
            template = %params.template_name,
            "Sending template message"
        );

        let response = self
            .request(self.http.post(&url))
            .json(&params)
            .send()
            .await
            .map_err(GatewayError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed: Option<ProviderErrorBody> = serde_json::from_str(&body).ok();
            let detail = parsed.map(|b| b.error).unwrap_or_default();

            return Err(GatewayError::Provider {
                code: detail.code.unwrap_or_else(|| status.as_u16().to_string()),
                message: detail.message.unwrap_or(body),
            });
        }

        let result: TemplateSendResult = response.json().await.map_err(GatewayError::Http)?;
        Ok(result)
    }

    /// Get the configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Attach the bearer token, when configured.
    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}
