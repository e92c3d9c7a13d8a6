//! Campaign routes: creation with ingestion, lifecycle commands, and
//! dispatch invocations.

use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use chrono::Utc;
use database::{
    campaign, Campaign, CampaignStatus, NewCampaign, ScheduleMode, VariableBinding,
};
use dispatcher::{ingest_rows, parse_recipient_rows, DispatchReport, RunOptions};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Campaign configuration carried in the `config` multipart part.
#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub created_by: String,
    pub agent_id: String,
    pub title: String,
    pub template_name: String,
    #[serde(default = "default_language")]
    pub template_language: String,
    pub sender_id: Option<String>,
    pub max_attempts: Option<i64>,
    pub priority: Option<i64>,
    pub phone_column: String,
    pub name_column: Option<String>,
    pub key_column: Option<String>,
    #[serde(default)]
    pub variable_bindings: Vec<VariableBinding>,
    #[serde(default)]
    pub schedule_mode: Option<ScheduleMode>,
    /// Epoch milliseconds.
    pub scheduled_at: Option<i64>,
    pub timezone: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

/// Query parameters for campaign listing.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Campaign list response.
#[derive(Serialize)]
pub struct ListResponse {
    pub campaigns: Vec<Campaign>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

/// Body of a dispatch invocation.
#[derive(Debug, Default, Deserialize)]
pub struct DispatchRequest {
    pub limit: Option<i64>,
    pub lock_ttl_secs: Option<i64>,
    pub sender_id: Option<String>,
    pub language: Option<String>,
}

const MAX_ATTEMPTS_DEFAULT: i64 = 5;
const MAX_ATTEMPTS_CEILING: i64 = 25;

/// Create a campaign from a multipart upload (`config` JSON part plus
/// the recipient `file`) and ingest its rows synchronously.
pub async fn create_campaign(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Campaign>> {
    let mut config: Option<CreateCampaignRequest> = None;
    let mut file_name: Option<String> = None;
    let mut file_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let part_name = field.name().map(str::to_string);
        match part_name.as_deref() {
            Some("config") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable config part: {e}")))?;
                let parsed = serde_json::from_str(&text)
                    .map_err(|e| ApiError::BadRequest(format!("invalid config JSON: {e}")))?;
                config = Some(parsed);
            }
            Some("file") => {
                file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable file part: {e}")))?;
                file_bytes = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let config = config.ok_or_else(|| ApiError::BadRequest("missing config part".to_string()))?;
    let file_bytes =
        file_bytes.ok_or_else(|| ApiError::BadRequest("missing file part".to_string()))?;
    let file_name = file_name.unwrap_or_else(|| "recipients.csv".to_string());

    // Required configuration is validated before anything touches
    // storage; a malformed file also rejects the whole request here.
    validate_config(&config)?;
    let rows = parse_recipient_rows(file_bytes.as_slice())?;

    let campaign_id = Uuid::new_v4().to_string();
    let stored_path = format!(
        "{}/{}_{}",
        state.upload_dir,
        campaign_id,
        sanitize_file_name(&file_name)
    );
    tokio::fs::write(&stored_path, &file_bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to store upload: {e}")))?;

    let new_campaign = NewCampaign {
        id: campaign_id.clone(),
        created_by: config.created_by,
        agent_id: config.agent_id,
        title: config.title,
        template_name: config.template_name,
        template_language: config.template_language,
        sender_id: config.sender_id,
        max_attempts: config
            .max_attempts
            .unwrap_or(MAX_ATTEMPTS_DEFAULT)
            .clamp(1, MAX_ATTEMPTS_CEILING),
        priority: config.priority.unwrap_or(0),
        file_name,
        file_path: Some(stored_path),
        phone_column: config.phone_column,
        name_column: config.name_column,
        key_column: config.key_column,
        variable_bindings: config.variable_bindings,
        schedule_mode: config.schedule_mode.unwrap_or(ScheduleMode::Immediate),
        scheduled_at: config.scheduled_at,
        timezone: config.timezone,
    };

    campaign::create_campaign(state.db.pool(), &new_campaign).await?;
    let created = campaign::get_campaign(state.db.pool(), &campaign_id).await?;

    let report = ingest_rows(
        &state.db,
        &created,
        &rows,
        &state.phone_options,
        Utc::now().timestamp_millis(),
    )
    .await?;

    info!(
        campaign_id = %campaign_id,
        total = report.total,
        queued = report.queued,
        ignored = report.ignored,
        "Campaign created"
    );

    let campaign = campaign::get_campaign(state.db.pool(), &campaign_id).await?;
    Ok(Json(campaign))
}

/// List campaigns.
pub async fn list_campaigns(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>> {
    let status = parse_status_filter(query.status.as_deref())?;
    let page = query.page.unwrap_or(0).max(0);
    let per_page = query.per_page.unwrap_or(50).clamp(1, 200);

    let campaigns =
        campaign::list_campaigns(state.db.pool(), status, page, per_page).await?;
    let total = campaign::count_campaigns(state.db.pool(), status).await?;

    Ok(Json(ListResponse {
        campaigns,
        page,
        per_page,
        total,
    }))
}

/// Fetch one campaign.
pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Campaign>> {
    let campaign = campaign::get_campaign(state.db.pool(), &id).await?;
    Ok(Json(campaign))
}

/// Pause a campaign unconditionally, even mid-run.
pub async fn pause_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Campaign>> {
    campaign::pause_campaign(state.db.pool(), &id).await?;
    info!(campaign_id = %id, "Campaign paused");
    let campaign = campaign::get_campaign(state.db.pool(), &id).await?;
    Ok(Json(campaign))
}

/// Resume a paused campaign, recomputing its status from the schedule.
pub async fn resume_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Campaign>> {
    let existing = campaign::get_campaign(state.db.pool(), &id).await?;

    let now_ms = Utc::now().timestamp_millis();
    let status = if existing.schedule_mode == ScheduleMode::Scheduled
        && existing.scheduled_at.is_some_and(|at| at > now_ms)
    {
        CampaignStatus::Scheduled
    } else {
        CampaignStatus::Queued
    };

    campaign::resume_campaign(state.db.pool(), &id, status).await?;
    info!(campaign_id = %id, status = %status, "Campaign resumed");
    let campaign = campaign::get_campaign(state.db.pool(), &id).await?;
    Ok(Json(campaign))
}

/// Cancel a campaign. Completed campaigns cannot be cancelled.
pub async fn cancel_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Campaign>> {
    let existing = campaign::get_campaign(state.db.pool(), &id).await?;
    if existing.status == CampaignStatus::Completed {
        return Err(ApiError::Validation(
            "completed campaigns cannot be cancelled".to_string(),
        ));
    }

    campaign::cancel_campaign(state.db.pool(), &id).await?;
    info!(campaign_id = %id, "Campaign cancelled");
    let campaign = campaign::get_campaign(state.db.pool(), &id).await?;
    Ok(Json(campaign))
}

/// Run one dispatch-loop invocation synchronously.
pub async fn dispatch_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<DispatchRequest>>,
) -> Result<Json<DispatchReport>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let options = RunOptions {
        limit: request.limit,
        lock_ttl_ms: request.lock_ttl_secs.map(|s| s.saturating_mul(1_000)),
        sender_id: request.sender_id,
        language: request.language,
    };

    let report = state.dispatcher.run_batch(&id, &options).await?;
    Ok(Json(report))
}

/// Delete a campaign: items cascade, then the stored upload, then the
/// campaign itself. Not reversible.
pub async fn delete_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let existing = campaign::get_campaign(state.db.pool(), &id).await?;

    if let Some(path) = &existing.file_path {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(campaign_id = %id, path = %path, error = %e, "Failed to remove stored upload");
        }
    }

    campaign::delete_campaign(state.db.pool(), &id).await?;
    info!(campaign_id = %id, "Campaign deleted");

    Ok(Json(serde_json::json!({ "deleted": id })))
}

/// Validate required configuration fields.
fn validate_config(config: &CreateCampaignRequest) -> Result<()> {
    let required = [
        ("created_by", &config.created_by),
        ("agent_id", &config.agent_id),
        ("title", &config.title),
        ("template_name", &config.template_name),
        ("phone_column", &config.phone_column),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            return Err(ApiError::Validation(format!("{name} is required")));
        }
    }
    Ok(())
}

/// Parse an optional status filter.
fn parse_status_filter(status: Option<&str>) -> Result<Option<CampaignStatus>> {
    match status {
        None => Ok(None),
        Some(s) => CampaignStatus::parse(s)
            .map(Some)
            .ok_or_else(|| ApiError::Validation(format!("unknown status: {s}"))),
    }
}

/// Keep stored file names to a safe character set.
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_separators() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name("march renewals.csv"), "march_renewals.csv");
    }

    #[test]
    fn status_filter_rejects_unknown_names() {
        assert!(parse_status_filter(Some("queued")).unwrap().is_some());
        assert!(parse_status_filter(None).unwrap().is_none());
        assert!(parse_status_filter(Some("bogus")).is_err());
    }
}
