//! Item routes: inspection, operator retry, and the administrative
//! status override.

use axum::extract::{Path, Query, State};
use axum::Json;
use database::{campaign, item, CampaignItem, ItemStatus};
use dispatcher::RunOptions;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Query parameters for item listing.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Item list response.
#[derive(Serialize)]
pub struct ListResponse {
    pub items: Vec<CampaignItem>,
    pub page: i64,
    pub per_page: i64,
}

/// Body of an operator retry.
#[derive(Debug, Default, Deserialize)]
pub struct RetryRequest {
    pub sender_id: Option<String>,
    pub language: Option<String>,
    pub lock_ttl_secs: Option<i64>,
}

/// Retry response.
#[derive(Serialize)]
pub struct RetryResponse {
    pub sent: bool,
    pub item: CampaignItem,
}

/// Body of the administrative status override.
#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

/// List a campaign's items in source order.
pub async fn list_items(
    State(state): State<AppState>,
    Path(campaign_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>> {
    // 404 for unknown campaigns rather than an empty listing.
    campaign::get_campaign(state.db.pool(), &campaign_id).await?;

    let status = match query.status.as_deref() {
        None => None,
        Some(s) => Some(
            ItemStatus::parse(s)
                .ok_or_else(|| ApiError::Validation(format!("unknown status: {s}")))?,
        ),
    };
    let page = query.page.unwrap_or(0).max(0);
    let per_page = query.per_page.unwrap_or(50).clamp(1, 500);

    let items = item::list_items(state.db.pool(), &campaign_id, status, page, per_page).await?;

    Ok(Json(ListResponse {
        items,
        page,
        per_page,
    }))
}

/// Fetch one item.
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CampaignItem>> {
    let item = item::get_item(state.db.pool(), &id).await?;
    Ok(Json(item))
}

/// Retry a single item under the claim discipline.
pub async fn retry_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<RetryRequest>>,
) -> Result<Json<RetryResponse>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let options = RunOptions {
        limit: None,
        lock_ttl_ms: request.lock_ttl_secs.map(|s| s.saturating_mul(1_000)),
        sender_id: request.sender_id,
        language: request.language,
    };

    let report = state.dispatcher.retry_item(&id, &options).await?;
    info!(item_id = %id, sent = report.sent, "Item retried");

    Ok(Json(RetryResponse {
        sent: report.sent,
        item: report.item,
    }))
}

/// Administrative status override. Bypasses locking; debug only.
pub async fn set_item_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SetStatusRequest>,
) -> Result<Json<CampaignItem>> {
    let status = ItemStatus::parse(&request.status)
        .ok_or_else(|| ApiError::Validation(format!("unknown status: {}", request.status)))?;

    warn!(item_id = %id, status = %status, "Administrative item status override");
    item::set_status(state.db.pool(), &id, status).await?;

    let item = item::get_item(state.db.pool(), &id).await?;
    Ok(Json(item))
}
