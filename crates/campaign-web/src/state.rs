//! Application state shared across handlers.

use database::Database;
use dispatcher::{Dispatcher, PhoneOptions};
use message_gateway::GatewayClient;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection.
    pub db: Database,
    /// Dispatch engine.
    pub dispatcher: Dispatcher,
    /// Provider client, used directly for the health probe.
    pub gateway: GatewayClient,
    /// Upload storage directory.
    pub upload_dir: String,
    /// Phone canonicalization settings.
    pub phone_options: PhoneOptions,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        db: Database,
        dispatcher: Dispatcher,
        gateway: GatewayClient,
        upload_dir: String,
        phone_options: PhoneOptions,
    ) -> Self {
        Self {
            db,
            dispatcher,
            gateway,
            upload_dir,
            phone_options,
        }
    }
}
