//! Route handlers for the campaign API.

pub mod campaigns;
pub mod health;
pub mod items;

use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::state::AppState;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health::health))
        // Campaigns
        .route("/campaigns", post(campaigns::create_campaign))
        .route("/campaigns", get(campaigns::list_campaigns))
        .route("/campaigns/:id", get(campaigns::get_campaign))
        .route("/campaigns/:id", delete(campaigns::delete_campaign))
        .route("/campaigns/:id/pause", patch(campaigns::pause_campaign))
        .route("/campaigns/:id/resume", patch(campaigns::resume_campaign))
        .route("/campaigns/:id/cancel", patch(campaigns::cancel_campaign))
        .route("/campaigns/:id/dispatch", post(campaigns::dispatch_campaign))
        .route("/campaigns/:id/items", get(items::list_items))
        // Items
        .route("/items/:id", get(items::get_item))
        .route("/items/:id/retry", post(items::retry_item))
        .route("/items/:id/status", patch(items::set_item_status))
}
