//! Campaign item operations: bulk insert, atomic claim, finalize.
//!
//! The claim functions are the only writers that move an item into
//! `claimed`. Each is a single conditional `UPDATE ... RETURNING`
//! statement, so SQLite's write serialization guarantees that when two
//! invocations race for the same item, exactly one succeeds. The lock
//! columns stamped here are diagnostic metadata; exclusivity comes from
//! the statement, not from inspecting them.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{CampaignItem, ItemStatus, NewItem};

/// Column list shared by every item SELECT/RETURNING.
const ITEM_COLS: &str = "id, campaign_id, row_index, raw_row, variables, raw_phone, phone, \
     display_name, external_key, status, attempts, last_attempt_at, next_retry_at, \
     reserved_at, finished_at, lock_owner, lock_locked_at, lock_expires_at, contact_id, \
     message_id, sent_at, delivery_status, error_code, error_message, error_detail, \
     error_at, created_at";

/// An item is claimable when it is queued, when it failed and its retry
/// timer has elapsed (below the attempt ceiling), or when a previous
/// claimer's lock has expired without the item being finalized.
const CLAIMABLE: &str = "(
        status = 'queued'
        OR (status = 'failed' AND attempts < ?
            AND (next_retry_at IS NULL OR next_retry_at <= ?))
        OR (status = 'claimed' AND lock_expires_at IS NOT NULL AND lock_expires_at <= ?)
    )";

/// Outcome of a bulk insert. Failures are counted per row, never
/// silently dropped and never aborting the remainder of the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: i64,
    pub failed: i64,
}

/// Bulk-insert recipient items for a campaign, preserving row order via
/// `row_index`. Rows that fail to insert are logged and tallied.
pub async fn insert_items(
    pool: &SqlitePool,
    campaign_id: &str,
    items: &[NewItem],
) -> Result<InsertOutcome> {
    let mut outcome = InsertOutcome::default();

    for item in items {
        let result = sqlx::query(
            r#"
            INSERT INTO campaign_items (
                id, campaign_id, row_index, raw_row, variables, raw_phone,
                phone, display_name, external_key, status
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(campaign_id)
        .bind(item.row_index)
        .bind(&item.raw_row)
        .bind(&item.variables)
        .bind(&item.raw_phone)
        .bind(&item.phone)
        .bind(&item.display_name)
        .bind(&item.external_key)
        .bind(item.status)
        .execute(pool)
        .await;

        match result {
            Ok(_) => outcome.inserted += 1,
            Err(e) => {
                outcome.failed += 1;
                tracing::warn!(
                    campaign_id = %campaign_id,
                    row_index = item.row_index,
                    error = %e,
                    "Failed to insert campaign item"
                );
            }
        }
    }

    Ok(outcome)
}

/// Get an item by ID.
pub async fn get_item(pool: &SqlitePool, id: &str) -> Result<CampaignItem> {
    sqlx::query_as::<_, CampaignItem>(&format!(
        "SELECT {ITEM_COLS} FROM campaign_items WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "CampaignItem",
        id: id.to_string(),
    })
}

/// List a campaign's items in source order, optionally filtered by status.
pub async fn list_items(
    pool: &SqlitePool,
    campaign_id: &str,
    status: Option<ItemStatus>,
    page: i64,
    per_page: i64,
) -> Result<Vec<CampaignItem>> {
    let offset = page.max(0) * per_page;

    let items = match status {
        Some(status) => {
            sqlx::query_as::<_, CampaignItem>(&format!(
                "SELECT {ITEM_COLS} FROM campaign_items \
                 WHERE campaign_id = ? AND status = ? \
                 ORDER BY row_index ASC LIMIT ? OFFSET ?"
            ))
            .bind(campaign_id)
            .bind(status)
            .bind(per_page)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, CampaignItem>(&format!(
                "SELECT {ITEM_COLS} FROM campaign_items \
                 WHERE campaign_id = ? ORDER BY row_index ASC LIMIT ? OFFSET ?"
            ))
            .bind(campaign_id)
            .bind(per_page)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
    };

    Ok(items)
}

/// Live count of a campaign's items in the given status. This is the
/// authoritative signal for completion, not the cached campaign stats.
pub async fn count_items(
    pool: &SqlitePool,
    campaign_id: &str,
    status: ItemStatus,
) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM campaign_items WHERE campaign_id = ? AND status = ?",
    )
    .bind(campaign_id)
    .bind(status)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Atomically claim the next eligible item of a campaign.
///
/// Selects the lowest `row_index` among claimable items and transitions
/// it to `claimed`, stamping the reservation and lock fields. Returns
/// `None` when no item is eligible.
pub async fn claim_next_item(
    pool: &SqlitePool,
    campaign_id: &str,
    owner_id: &str,
    now_ms: i64,
    lock_ttl_ms: i64,
    max_attempts: i64,
) -> Result<Option<CampaignItem>> {
    let item = sqlx::query_as::<_, CampaignItem>(&format!(
        "UPDATE campaign_items SET \
             status = 'claimed', reserved_at = ?, \
             lock_owner = ?, lock_locked_at = ?, lock_expires_at = ? \
         WHERE id = ( \
             SELECT id FROM campaign_items \
             WHERE campaign_id = ? AND {CLAIMABLE} \
             ORDER BY row_index ASC LIMIT 1 \
         ) AND {CLAIMABLE} \
         RETURNING {ITEM_COLS}"
    ))
    .bind(now_ms)
    .bind(owner_id)
    .bind(now_ms)
    .bind(now_ms + lock_ttl_ms)
    .bind(campaign_id)
    .bind(max_attempts)
    .bind(now_ms)
    .bind(now_ms)
    .bind(max_attempts)
    .bind(now_ms)
    .bind(now_ms)
    .fetch_optional(pool)
    .await?;

    Ok(item)
}

/// Atomically claim one specific item for the retry path.
///
/// Admits `queued` and `failed` items regardless of their retry timer or
/// attempt count (an operator asked for this item), plus `claimed` items
/// whose lock expired without a finalize — the recovery path for crashed
/// claimers. `sent` and `ignored` items are never claimable.
pub async fn claim_item(
    pool: &SqlitePool,
    item_id: &str,
    owner_id: &str,
    now_ms: i64,
    lock_ttl_ms: i64,
) -> Result<Option<CampaignItem>> {
    let item = sqlx::query_as::<_, CampaignItem>(&format!(
        "UPDATE campaign_items SET \
             status = 'claimed', reserved_at = ?, \
             lock_owner = ?, lock_locked_at = ?, lock_expires_at = ? \
         WHERE id = ? AND ( \
             status IN ('queued', 'failed') \
             OR (status = 'claimed' AND lock_expires_at IS NOT NULL AND lock_expires_at <= ?) \
         ) \
         RETURNING {ITEM_COLS}"
    ))
    .bind(now_ms)
    .bind(owner_id)
    .bind(now_ms)
    .bind(now_ms + lock_ttl_ms)
    .bind(item_id)
    .bind(now_ms)
    .fetch_optional(pool)
    .await?;

    Ok(item)
}

/// Finalize a claimed item as sent: record provider identifiers, clear
/// error/retry state and the lock, bump the attempt counter.
pub async fn finalize_sent(
    pool: &SqlitePool,
    item_id: &str,
    owner_id: &str,
    now_ms: i64,
    contact_id: Option<&str>,
    message_id: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE campaign_items
        SET status = 'sent', attempts = attempts + 1,
            last_attempt_at = ?, finished_at = ?, sent_at = ?,
            contact_id = ?, message_id = ?,
            next_retry_at = NULL,
            error_code = NULL, error_message = NULL, error_detail = NULL, error_at = NULL,
            lock_owner = NULL, lock_locked_at = NULL, lock_expires_at = NULL
        WHERE id = ? AND status = 'claimed' AND lock_owner = ?
        "#,
    )
    .bind(now_ms)
    .bind(now_ms)
    .bind(now_ms)
    .bind(contact_id)
    .bind(message_id)
    .bind(item_id)
    .bind(owner_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Finalize a claimed item as failed: record the error, clear the lock,
/// bump the attempt counter, and arm the retry timer.
#[allow(clippy::too_many_arguments)]
pub async fn finalize_failed(
    pool: &SqlitePool,
    item_id: &str,
    owner_id: &str,
    now_ms: i64,
    next_retry_at: i64,
    error_code: Option<&str>,
    error_message: &str,
    error_detail: Option<&str>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE campaign_items
        SET status = 'failed', attempts = attempts + 1,
            last_attempt_at = ?, finished_at = ?, next_retry_at = ?,
            error_code = ?, error_message = ?, error_detail = ?, error_at = ?,
            lock_owner = NULL, lock_locked_at = NULL, lock_expires_at = NULL
        WHERE id = ? AND status = 'claimed' AND lock_owner = ?
        "#,
    )
    .bind(now_ms)
    .bind(now_ms)
    .bind(next_retry_at)
    .bind(error_code)
    .bind(error_message)
    .bind(error_detail)
    .bind(now_ms)
    .bind(item_id)
    .bind(owner_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Revert a claimed item back to `failed` without bumping attempts. Used
/// when a retry claim succeeds but the campaign-level preconditions then
/// reject the send.
pub async fn release_claim(
    pool: &SqlitePool,
    item_id: &str,
    owner_id: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE campaign_items
        SET status = 'failed',
            lock_owner = NULL, lock_locked_at = NULL, lock_expires_at = NULL
        WHERE id = ? AND status = 'claimed' AND lock_owner = ?
        "#,
    )
    .bind(item_id)
    .bind(owner_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Administrative status override. Bypasses the claim discipline
/// entirely; debug tooling only.
pub async fn set_status(pool: &SqlitePool, item_id: &str, status: ItemStatus) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE campaign_items
        SET status = ?,
            lock_owner = NULL, lock_locked_at = NULL, lock_expires_at = NULL
        WHERE id = ?
        "#,
    )
    .bind(status)
    .bind(item_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "CampaignItem",
            id: item_id.to_string(),
        });
    }

    Ok(())
}
