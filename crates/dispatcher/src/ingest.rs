//! Ingestion pipeline: parsed rows to recipient items at rest.

use database::{
    campaign, item, Campaign, CampaignStatus, Database, ItemStatus, NewItem, ScheduleMode,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::parser::RecipientRow;
use crate::phone::{self, PhoneOptions};

/// Outcome of ingesting one uploaded file into a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Rows seen in the file.
    pub total: i64,
    /// Items created in `queued` status.
    pub queued: i64,
    /// Items created in `ignored` status (phone failed canonicalization).
    pub ignored: i64,
    /// Rows whose insert failed outright.
    pub insert_failed: i64,
    /// Campaign status derived from the outcome.
    pub status: CampaignStatus,
}

/// Build and insert one item per parsed row, then derive the campaign's
/// initial runnable status and seed its stats.
///
/// Row order is preserved through `row_index`. Insert failures are
/// tallied per row, never aborting the batch.
pub async fn ingest_rows(
    db: &Database,
    campaign: &Campaign,
    rows: &[RecipientRow],
    phone_options: &PhoneOptions,
    now_ms: i64,
) -> Result<IngestReport> {
    let bindings = campaign
        .bindings()
        .map_err(|source| database::DatabaseError::CorruptPayload {
            entity: "Campaign",
            column: "variable_bindings",
            id: campaign.id.clone(),
            source,
        })?;

    let mut items = Vec::with_capacity(rows.len());
    let mut queued = 0_i64;
    let mut ignored = 0_i64;

    for row in rows {
        let raw_phone = row.get(&campaign.phone_column).unwrap_or("").to_string();
        let canonical = phone::canonicalize(&raw_phone, phone_options);

        let display_name = campaign
            .name_column
            .as_deref()
            .and_then(|col| row.get(col))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let external_key = campaign
            .key_column
            .as_deref()
            .and_then(|col| row.get(col))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let mut variables = serde_json::Map::new();
        for binding in &bindings {
            let resolved = row
                .get(&binding.source_column)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .or_else(|| binding.fallback.clone())
                .unwrap_or_default();
            variables.insert(
                binding.template_var.clone(),
                serde_json::Value::String(resolved),
            );
        }

        let status = if canonical.is_some() {
            queued += 1;
            ItemStatus::Queued
        } else {
            ignored += 1;
            ItemStatus::Ignored
        };

        items.push(NewItem {
            id: Uuid::new_v4().to_string(),
            row_index: row.index as i64,
            raw_row: row.to_json(),
            variables: serde_json::Value::Object(variables).to_string(),
            raw_phone,
            phone: canonical,
            display_name,
            external_key,
            status,
        });
    }

    let insert = item::insert_items(db.pool(), &campaign.id, &items).await?;
    if insert.failed > 0 {
        warn!(
            campaign_id = %campaign.id,
            failed = insert.failed,
            "Some rows failed to insert"
        );
    }

    let total = rows.len() as i64;
    let (status, last_error) = if queued == 0 {
        (
            CampaignStatus::Error,
            Some("no rows produced a sendable phone number"),
        )
    } else if campaign.schedule_mode == ScheduleMode::Scheduled
        && campaign.scheduled_at.is_some_and(|at| at > now_ms)
    {
        (CampaignStatus::Scheduled, None)
    } else {
        (CampaignStatus::Queued, None)
    };

    campaign::finish_ingest(db.pool(), &campaign.id, status, total, queued, ignored, last_error)
        .await?;

    info!(
        campaign_id = %campaign.id,
        total,
        queued,
        ignored,
        status = %status,
        "Ingestion complete"
    );

    Ok(IngestReport {
        total,
        queued,
        ignored,
        insert_failed: insert.failed,
        status,
    })
}
