//! Client for the third-party business-messaging provider.
//!
//! Provides a typed HTTP client for the provider's template-send endpoint
//! with bearer authentication, a bounded request timeout, and a health
//! probe. The dispatch engine drives this client through its
//! `TemplateSender` seam so tests can substitute a mock.
//!
//! # Example
//!
//! ```no_run
//! use message_gateway::{GatewayClient, GatewayConfig, TemplateSend};
//!
//! # async fn example() -> Result<(), message_gateway::GatewayError> {
//! let config = GatewayConfig::new("https://gateway.example.com")
//!     .with_token("secret")
//!     .with_sender("acct-main");
//! let client = GatewayClient::connect(config).await?;
//!
//! let result = client
//!     .send_template(
//!         TemplateSend::new("15550001111", "renewal_notice", "en")
//!             .with_variable("1", "Alice")
//!             .with_correlation("campaign-1:item-7"),
//!     )
//!     .await?;
//! println!("message id: {}", result.message_id);
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod types;

pub use client::GatewayClient;
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use types::{TemplateSend, TemplateSendResult};
