//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct Health {
    pub status: String,
    pub gateway_connected: bool,
}

/// Health check endpoint. Probes the messaging provider as well.
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    let gateway_connected = state.gateway.health_check().await.unwrap_or(false);
    Json(Health {
        status: "ok".to_string(),
        gateway_connected,
    })
}
