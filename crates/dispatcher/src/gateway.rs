//! The gateway seam.

use async_trait::async_trait;

use message_gateway::{GatewayClient, GatewayError, TemplateSend, TemplateSendResult};

/// A trait for sending template messages through the provider.
///
/// The engine depends on this instead of the concrete client so tests can
/// substitute a scripted gateway. This trait is object-safe and used as
/// `Arc<dyn TemplateSender>`.
#[async_trait]
pub trait TemplateSender: Send + Sync {
    /// Send one template message.
    async fn send_template(
        &self,
        params: TemplateSend,
    ) -> Result<TemplateSendResult, GatewayError>;
}

#[async_trait]
impl TemplateSender for GatewayClient {
    async fn send_template(
        &self,
        params: TemplateSend,
    ) -> Result<TemplateSendResult, GatewayError> {
        GatewayClient::send_template(self, params).await
    }
}
