//! Campaign CRUD and run-state operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{Campaign, CampaignStatus, NewCampaign};

/// Column list shared by every campaign SELECT.
const CAMPAIGN_COLS: &str = "id, created_by, agent_id, title, template_name, template_language, \
     sender_id, max_attempts, priority, file_name, file_path, phone_column, name_column, \
     key_column, variable_bindings, schedule_mode, scheduled_at, timezone, status, paused, \
     last_error, stats_total, stats_queued, stats_in_flight, stats_sent, stats_failed, \
     stats_ignored, stats_processed, started_at, finished_at, lock_owner, lock_locked_at, \
     lock_heartbeat_at, created_at, updated_at";

/// Create a new campaign in `processing` status.
pub async fn create_campaign(pool: &SqlitePool, campaign: &NewCampaign) -> Result<()> {
    let bindings = serde_json::to_string(&campaign.variable_bindings).map_err(|source| {
        DatabaseError::CorruptPayload {
            entity: "Campaign",
            column: "variable_bindings",
            id: campaign.id.clone(),
            source,
        }
    })?;

    sqlx::query(
        r#"
        INSERT INTO campaigns (
            id, created_by, agent_id, title, template_name, template_language,
            sender_id, max_attempts, priority, file_name, file_path,
            phone_column, name_column, key_column, variable_bindings,
            schedule_mode, scheduled_at, timezone, status
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'processing')
        "#,
    )
    .bind(&campaign.id)
    .bind(&campaign.created_by)
    .bind(&campaign.agent_id)
    .bind(&campaign.title)
    .bind(&campaign.template_name)
    .bind(&campaign.template_language)
    .bind(&campaign.sender_id)
    .bind(campaign.max_attempts)
    .bind(campaign.priority)
    .bind(&campaign.file_name)
    .bind(&campaign.file_path)
    .bind(&campaign.phone_column)
    .bind(&campaign.name_column)
    .bind(&campaign.key_column)
    .bind(bindings)
    .bind(campaign.schedule_mode)
    .bind(campaign.scheduled_at)
    .bind(&campaign.timezone)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "Campaign",
                    id: campaign.id.clone(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    Ok(())
}

/// Get a campaign by ID.
pub async fn get_campaign(pool: &SqlitePool, id: &str) -> Result<Campaign> {
    sqlx::query_as::<_, Campaign>(&format!(
        "SELECT {CAMPAIGN_COLS} FROM campaigns WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Campaign",
        id: id.to_string(),
    })
}

/// List campaigns, optionally filtered by status, newest first.
pub async fn list_campaigns(
    pool: &SqlitePool,
    status: Option<CampaignStatus>,
    page: i64,
    per_page: i64,
) -> Result<Vec<Campaign>> {
    let offset = page.max(0) * per_page;

    let campaigns = match status {
        Some(status) => {
            sqlx::query_as::<_, Campaign>(&format!(
                "SELECT {CAMPAIGN_COLS} FROM campaigns WHERE status = ? \
                 ORDER BY created_at DESC LIMIT ? OFFSET ?"
            ))
            .bind(status)
            .bind(per_page)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Campaign>(&format!(
                "SELECT {CAMPAIGN_COLS} FROM campaigns \
                 ORDER BY created_at DESC LIMIT ? OFFSET ?"
            ))
            .bind(per_page)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
    };

    Ok(campaigns)
}

/// Pause a campaign unconditionally. A running dispatch loop observes this
/// at its next invocation, not mid-batch.
pub async fn pause_campaign(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE campaigns
        SET paused = 1, status = 'paused', updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Campaign",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Clear the paused flag and restore the given runnable status
/// (`queued` or `scheduled`, chosen by the caller from the schedule).
pub async fn resume_campaign(
    pool: &SqlitePool,
    id: &str,
    status: CampaignStatus,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE campaigns
        SET paused = 0, status = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(status)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Campaign",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Cancel a campaign. Sets the paused flag as well so a concurrent loop
/// invocation stops claiming at its next precondition check.
pub async fn cancel_campaign(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE campaigns
        SET paused = 1, status = 'cancelled', updated_at = datetime('now')
        WHERE id = ? AND status != 'completed'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Campaign",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Delete a campaign. Items are removed by the `ON DELETE CASCADE` FK.
pub async fn delete_campaign(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM campaigns WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Campaign",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Record the outcome of ingestion: derived status plus initial stats.
pub async fn finish_ingest(
    pool: &SqlitePool,
    id: &str,
    status: CampaignStatus,
    total: i64,
    queued: i64,
    ignored: i64,
    last_error: Option<&str>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE campaigns
        SET status = ?, stats_total = ?, stats_queued = ?, stats_ignored = ?,
            last_error = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(status)
    .bind(total)
    .bind(queued)
    .bind(ignored)
    .bind(last_error)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Campaign",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Mark a dispatch invocation as holding the campaign: `running` status,
/// advisory worker lock, and a first-start timestamp.
pub async fn begin_run(
    pool: &SqlitePool,
    id: &str,
    owner_id: &str,
    now_ms: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE campaigns
        SET status = 'running',
            lock_owner = ?, lock_locked_at = ?, lock_heartbeat_at = ?,
            started_at = COALESCE(started_at, ?),
            updated_at = datetime('now')
        WHERE id = ? AND paused = 0
        "#,
    )
    .bind(owner_id)
    .bind(now_ms)
    .bind(now_ms)
    .bind(now_ms)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Refresh the worker-lock heartbeat. Pure liveness signal.
pub async fn heartbeat(pool: &SqlitePool, id: &str, owner_id: &str, now_ms: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE campaigns
        SET lock_heartbeat_at = ?
        WHERE id = ? AND lock_owner = ?
        "#,
    )
    .bind(now_ms)
    .bind(id)
    .bind(owner_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Apply one invocation's net counter deltas and settle the campaign.
///
/// `remaining_queued` comes from a live recount and is authoritative: it
/// overwrites `stats_queued` and decides completion. The incremented
/// counters stay display-only. Deltas apply unconditionally so a
/// concurrent invocation's progress is never dropped; the status
/// transition only touches runnable states, leaving a pause or cancel
/// issued mid-run in place.
#[allow(clippy::too_many_arguments)]
pub async fn finish_run(
    pool: &SqlitePool,
    id: &str,
    owner_id: &str,
    sent_delta: i64,
    failed_delta: i64,
    remaining_queued: i64,
    in_flight: i64,
    now_ms: i64,
) -> Result<()> {
    let completed = remaining_queued == 0;
    let status = if completed {
        CampaignStatus::Completed
    } else {
        CampaignStatus::Queued
    };

    sqlx::query(
        r#"
        UPDATE campaigns
        SET stats_sent = stats_sent + ?,
            stats_failed = stats_failed + ?,
            stats_processed = stats_processed + ?,
            stats_queued = ?,
            stats_in_flight = ?,
            status = CASE WHEN status IN ('running', 'queued', 'completed')
                     THEN ? ELSE status END,
            finished_at = CASE WHEN ? AND status IN ('running', 'queued', 'completed')
                          THEN ? ELSE finished_at END,
            lock_owner = CASE WHEN lock_owner = ? THEN NULL ELSE lock_owner END,
            updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(sent_delta)
    .bind(failed_delta)
    .bind(sent_delta + failed_delta)
    .bind(remaining_queued)
    .bind(in_flight)
    .bind(status)
    .bind(completed)
    .bind(now_ms)
    .bind(owner_id)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Overwrite campaign status. Administrative escape hatch.
pub async fn set_status(pool: &SqlitePool, id: &str, status: CampaignStatus) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE campaigns
        SET status = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(status)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Campaign",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Count campaigns, optionally filtered by status.
pub async fn count_campaigns(pool: &SqlitePool, status: Option<CampaignStatus>) -> Result<i64> {
    let count = match status {
        Some(status) => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM campaigns WHERE status = ?")
                .bind(status)
                .fetch_one(pool)
                .await?
        }
        None => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM campaigns")
                .fetch_one(pool)
                .await?
        }
    };

    Ok(count)
}
