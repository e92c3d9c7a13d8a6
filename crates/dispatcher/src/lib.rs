//! Bulk-campaign dispatch engine for Courier.
//!
//! Given a spreadsheet of recipients and a message template, this crate
//! sends one message per recipient, at most once per attempt, with
//! retry-on-failure, and without duplicate sends when multiple dispatch
//! invocations run concurrently. Exclusivity comes from the store's
//! atomic claim transition, not from lock inspection; the engine itself
//! keeps no state between invocations.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use database::Database;
//! use dispatcher::{Dispatcher, RunOptions};
//! use message_gateway::{GatewayClient, GatewayConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("sqlite:courier.db?mode=rwc").await?;
//! let gateway = GatewayClient::connect(GatewayConfig::default()).await?;
//! let dispatcher = Dispatcher::new(db, Arc::new(gateway));
//!
//! let report = dispatcher
//!     .run_batch("campaign-id", &RunOptions::default())
//!     .await?;
//! println!("sent {} of {} claimed", report.sent, report.claimed);
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod ingest;
pub mod parser;
pub mod phone;

pub use backoff::{backoff_delay_ms, BACKOFF_BASE_MS, BACKOFF_CAP_MS};
pub use engine::{
    DispatchReport, Dispatcher, RetryReport, RunOptions, DEFAULT_BATCH_LIMIT,
    DEFAULT_LOCK_TTL_MS, MAX_BATCH_LIMIT,
};
pub use error::{DispatchError, RejectReason, Result};
pub use gateway::TemplateSender;
pub use ingest::{ingest_rows, IngestReport};
pub use parser::{parse_recipient_rows, RecipientRow};
pub use phone::{canonicalize, PhoneOptions};

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
