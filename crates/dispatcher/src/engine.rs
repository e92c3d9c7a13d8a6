//! The claim/dispatch loop and the single-item retry path.

use std::sync::Arc;

use chrono::Utc;
use database::{
    campaign, item, Campaign, CampaignItem, CampaignStatus, Database, ItemStatus, ScheduleMode,
};
use message_gateway::{GatewayError, TemplateSend};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backoff::backoff_delay_ms;
use crate::error::{DispatchError, RejectReason, Result};
use crate::gateway::TemplateSender;

/// Iterations per invocation when the caller supplies no limit.
pub const DEFAULT_BATCH_LIMIT: i64 = 50;

/// Hard ceiling on the caller-supplied batch limit.
pub const MAX_BATCH_LIMIT: i64 = 500;

/// Item lock TTL when the caller supplies none.
pub const DEFAULT_LOCK_TTL_MS: i64 = 300_000;

const MIN_LOCK_TTL_MS: i64 = 5_000;
const MAX_LOCK_TTL_MS: i64 = 3_600_000;

/// Current wall clock, epoch milliseconds.
fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Caller-supplied knobs for one dispatch or retry invocation.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Max items to claim this invocation. Clamped to `1..=MAX_BATCH_LIMIT`.
    pub limit: Option<i64>,
    /// Item lock TTL in milliseconds.
    pub lock_ttl_ms: Option<i64>,
    /// Provider sender override for this invocation's sends only.
    pub sender_id: Option<String>,
    /// Template language override for this invocation's sends only.
    pub language: Option<String>,
}

/// What one dispatch-loop invocation accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DispatchReport {
    pub claimed: i64,
    pub sent: i64,
    pub failed: i64,
    /// Live count of still-queued items after the loop. Authoritative.
    pub remaining_queued: i64,
    pub completed: bool,
}

/// Outcome of a single-item retry.
#[derive(Debug, Clone)]
pub struct RetryReport {
    pub sent: bool,
    /// The item as finalized by this retry.
    pub item: CampaignItem,
}

/// The bulk-campaign dispatch engine.
///
/// Holds no in-process state between invocations: the document store is
/// the only shared resource, and every invocation generates its own
/// worker identity. Parallelism across recipients comes from running
/// multiple invocations concurrently; claim exclusivity in the store
/// prevents duplicate sends.
#[derive(Clone)]
pub struct Dispatcher {
    db: Database,
    gateway: Arc<dyn TemplateSender>,
}

impl Dispatcher {
    /// Create a dispatcher over the given store and gateway seam.
    pub fn new(db: Database, gateway: Arc<dyn TemplateSender>) -> Self {
        Self { db, gateway }
    }

    /// Get the underlying database handle.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Run one dispatch-loop invocation against a campaign.
    ///
    /// Preconditions (exists, not paused, schedule due) are checked once,
    /// before any claim; violating them rejects the whole invocation with
    /// no side effects. The loop then claims, sends, and finalizes one
    /// item at a time until the limit is reached or no item is eligible.
    /// Per-item send failures are contained in the finalize step; only
    /// storage errors abort the loop.
    pub async fn run_batch(
        &self,
        campaign_id: &str,
        options: &RunOptions,
    ) -> Result<DispatchReport> {
        let pool = self.db.pool();
        let campaign = campaign::get_campaign(pool, campaign_id).await?;
        check_runnable(&campaign, now_ms())?;

        let owner_id = Uuid::new_v4().to_string();
        let limit = options
            .limit
            .unwrap_or(DEFAULT_BATCH_LIMIT)
            .clamp(1, MAX_BATCH_LIMIT);
        let lock_ttl_ms = options
            .lock_ttl_ms
            .unwrap_or(DEFAULT_LOCK_TTL_MS)
            .clamp(MIN_LOCK_TTL_MS, MAX_LOCK_TTL_MS);

        campaign::begin_run(pool, campaign_id, &owner_id, now_ms()).await?;
        info!(
            campaign_id = %campaign_id,
            owner_id = %owner_id,
            limit,
            "Dispatch loop starting"
        );

        let mut claimed = 0_i64;
        let mut sent = 0_i64;
        let mut failed = 0_i64;

        for _ in 0..limit {
            let claim = item::claim_next_item(
                pool,
                campaign_id,
                &owner_id,
                now_ms(),
                lock_ttl_ms,
                campaign.max_attempts,
            )
            .await?;

            let Some(claimed_item) = claim else {
                debug!(campaign_id = %campaign_id, "No eligible item; loop ending early");
                break;
            };
            claimed += 1;

            if self
                .send_claimed(&campaign, &claimed_item, &owner_id, options)
                .await?
            {
                sent += 1;
            } else {
                failed += 1;
            }

            campaign::heartbeat(pool, campaign_id, &owner_id, now_ms()).await?;
        }

        // The live count is authoritative for completion; the cached
        // stats only display.
        let remaining_queued = item::count_items(pool, campaign_id, ItemStatus::Queued).await?;
        let in_flight = item::count_items(pool, campaign_id, ItemStatus::Claimed).await?;
        campaign::finish_run(
            pool,
            campaign_id,
            &owner_id,
            sent,
            failed,
            remaining_queued,
            in_flight,
            now_ms(),
        )
        .await?;
        let completed = remaining_queued == 0;

        info!(
            campaign_id = %campaign_id,
            owner_id = %owner_id,
            claimed,
            sent,
            failed,
            remaining_queued,
            completed,
            "Dispatch loop finished"
        );

        Ok(DispatchReport {
            claimed,
            sent,
            failed,
            remaining_queued,
            completed,
        })
    }

    /// Retry one specific item under the same claim discipline as the
    /// batch loop, including reclaim of items whose lock expired under a
    /// crashed claimer.
    pub async fn retry_item(&self, item_id: &str, options: &RunOptions) -> Result<RetryReport> {
        let pool = self.db.pool();
        let existing = item::get_item(pool, item_id).await?;

        let owner_id = Uuid::new_v4().to_string();
        let lock_ttl_ms = options
            .lock_ttl_ms
            .unwrap_or(DEFAULT_LOCK_TTL_MS)
            .clamp(MIN_LOCK_TTL_MS, MAX_LOCK_TTL_MS);

        let claim = item::claim_item(pool, item_id, &owner_id, now_ms(), lock_ttl_ms).await?;
        let Some(claimed_item) = claim else {
            return Err(DispatchError::ItemNotRetryable {
                id: item_id.to_string(),
                status: existing.status,
            });
        };

        // Campaign preconditions propagate; the claim is reverted so the
        // item is not left parked in `claimed`.
        let campaign = match campaign::get_campaign(pool, &claimed_item.campaign_id).await {
            Ok(campaign) => campaign,
            Err(err) => {
                item::release_claim(pool, item_id, &owner_id).await?;
                return Err(err.into());
            }
        };
        if let Err(reject) = check_runnable(&campaign, now_ms()) {
            item::release_claim(pool, item_id, &owner_id).await?;
            return Err(reject);
        }

        info!(
            campaign_id = %campaign.id,
            item_id = %item_id,
            owner_id = %owner_id,
            attempts = claimed_item.attempts,
            "Retrying item"
        );

        let sent = self
            .send_claimed(&campaign, &claimed_item, &owner_id, options)
            .await?;
        let item = item::get_item(pool, item_id).await?;

        Ok(RetryReport { sent, item })
    }

    /// Send one claimed item and finalize it. Returns whether the send
    /// succeeded; provider failures are recorded on the item with a
    /// backoff timer and never propagate.
    async fn send_claimed(
        &self,
        campaign: &Campaign,
        claimed_item: &CampaignItem,
        owner_id: &str,
        options: &RunOptions,
    ) -> Result<bool> {
        let Some(phone) = claimed_item.phone.as_deref().filter(|p| !p.is_empty()) else {
            self.finalize_failure(
                claimed_item,
                owner_id,
                Some("invalid_phone"),
                "missing or invalid phone number",
                None,
            )
            .await?;
            return Ok(false);
        };

        let variables = match claimed_item.variables_map() {
            Ok(variables) => variables,
            Err(err) => {
                self.finalize_failure(
                    claimed_item,
                    owner_id,
                    Some("corrupt_variables"),
                    "stored template variables failed to decode",
                    Some(&err.to_string()),
                )
                .await?;
                return Ok(false);
            }
        };

        let language = options
            .language
            .as_deref()
            .unwrap_or(&campaign.template_language);
        let mut params = TemplateSend::new(phone, &campaign.template_name, language)
            .with_variables(variables)
            .with_correlation(format!("{}:{}", campaign.id, claimed_item.id));
        if let Some(sender) = options.sender_id.as_deref().or(campaign.sender_id.as_deref()) {
            params = params.with_sender(sender);
        }

        match self.gateway.send_template(params).await {
            Ok(result) => {
                let applied = item::finalize_sent(
                    self.db.pool(),
                    &claimed_item.id,
                    owner_id,
                    now_ms(),
                    result.contact_id.as_deref(),
                    &result.message_id,
                )
                .await?;
                if !applied {
                    warn!(
                        campaign_id = %campaign.id,
                        item_id = %claimed_item.id,
                        "Sent item was no longer held at finalize"
                    );
                }
                debug!(
                    campaign_id = %campaign.id,
                    item_id = %claimed_item.id,
                    message_id = %result.message_id,
                    "Item sent"
                );
                Ok(true)
            }
            Err(err) => {
                warn!(
                    campaign_id = %campaign.id,
                    item_id = %claimed_item.id,
                    attempts = claimed_item.attempts + 1,
                    error = %err,
                    "Send failed"
                );
                let code = error_code(&err);
                self.finalize_failure(
                    claimed_item,
                    owner_id,
                    Some(&code),
                    &err.to_string(),
                    None,
                )
                .await?;
                Ok(false)
            }
        }
    }

    /// Finalize a claimed item as failed and arm its retry timer from
    /// the attempt count this failure brings it to.
    async fn finalize_failure(
        &self,
        claimed_item: &CampaignItem,
        owner_id: &str,
        code: Option<&str>,
        message: &str,
        detail: Option<&str>,
    ) -> Result<()> {
        let now = now_ms();
        let next_retry_at = now + backoff_delay_ms(claimed_item.attempts + 1);
        let applied = item::finalize_failed(
            self.db.pool(),
            &claimed_item.id,
            owner_id,
            now,
            next_retry_at,
            code,
            message,
            detail,
        )
        .await?;
        if !applied {
            warn!(
                item_id = %claimed_item.id,
                "Failed item was no longer held at finalize"
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("db", &self.db).finish()
    }
}

/// Campaign-level preconditions, checked once per invocation.
fn check_runnable(campaign: &Campaign, now_ms: i64) -> Result<()> {
    if campaign.status == CampaignStatus::Cancelled {
        return Err(DispatchError::Rejected {
            id: campaign.id.clone(),
            reason: RejectReason::Cancelled,
        });
    }
    if campaign.paused || campaign.status == CampaignStatus::Paused {
        return Err(DispatchError::Rejected {
            id: campaign.id.clone(),
            reason: RejectReason::Paused,
        });
    }
    if campaign.schedule_mode == ScheduleMode::Scheduled {
        if let Some(scheduled_at) = campaign.scheduled_at {
            if scheduled_at > now_ms {
                return Err(DispatchError::Rejected {
                    id: campaign.id.clone(),
                    reason: RejectReason::NotYetScheduled { scheduled_at },
                });
            }
        }
    }
    Ok(())
}

/// Short classification of a gateway failure for the item's error code.
fn error_code(err: &GatewayError) -> String {
    match err {
        GatewayError::Provider { code, .. } => code.clone(),
        GatewayError::Http(e) if e.is_timeout() => "timeout".to_string(),
        GatewayError::Http(_) | GatewayError::Connection(_) => "network".to_string(),
        _ => "gateway".to_string(),
    }
}
