//! HTTP API for the Courier campaign backend.
//!
//! Exposes campaign creation (multipart upload + ingestion), lifecycle
//! commands, synchronous dispatch invocations, and item inspection.

mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use database::Database;
use dispatcher::{Dispatcher, PhoneOptions};
use message_gateway::{GatewayClient, GatewayConfig};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!(addr = %config.addr, "Starting campaign API server");

    // Connect to database
    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    // Build the provider client. Startup does not require the provider
    // to be reachable; the health endpoint reports its state.
    let mut gateway_config = GatewayConfig::new(&config.gateway_url);
    if let Some(token) = &config.gateway_token {
        gateway_config = gateway_config.with_token(token);
    }
    if let Some(sender) = &config.sender_id {
        gateway_config = gateway_config.with_sender(sender);
    }
    let gateway = GatewayClient::new(gateway_config)?;

    // Ensure the upload directory exists
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    // Build application state
    let dispatcher = Dispatcher::new(db.clone(), Arc::new(gateway.clone()));
    let phone_options = PhoneOptions {
        default_country_code: config.default_country_code.clone(),
    };
    let state = AppState::new(
        db,
        dispatcher,
        gateway,
        config.upload_dir.clone(),
        phone_options,
    );

    // Build router
    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    info!(addr = %config.addr, "Campaign API server listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
