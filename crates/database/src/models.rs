//! Database models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Campaign lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CampaignStatus {
    /// Created but not yet ingested.
    Draft,
    /// Ingestion in progress.
    Processing,
    /// Waiting for its scheduled start time.
    Scheduled,
    /// Has queued items, ready for a dispatch invocation.
    Queued,
    /// A dispatch invocation currently holds the campaign.
    Running,
    /// Paused by operator command.
    Paused,
    /// Cancelled by operator command. Terminal.
    Cancelled,
    /// No queued items remain. Terminal.
    Completed,
    /// Ingestion produced no sendable items.
    Error,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Processing => "processing",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Queued => "queued",
            CampaignStatus::Running => "running",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Cancelled => "cancelled",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Error => "error",
        }
    }

    /// Parse a lowercase status name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(CampaignStatus::Draft),
            "processing" => Some(CampaignStatus::Processing),
            "scheduled" => Some(CampaignStatus::Scheduled),
            "queued" => Some(CampaignStatus::Queued),
            "running" => Some(CampaignStatus::Running),
            "paused" => Some(CampaignStatus::Paused),
            "cancelled" => Some(CampaignStatus::Cancelled),
            "completed" => Some(CampaignStatus::Completed),
            "error" => Some(CampaignStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-recipient item status.
///
/// Transitions: `queued -> claimed -> sent | failed`; a failed item becomes
/// claimable again once its retry timer elapses. `ignored` is terminal from
/// creation (the phone never canonicalized).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ItemStatus {
    Queued,
    Claimed,
    Sent,
    Failed,
    Ignored,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Queued => "queued",
            ItemStatus::Claimed => "claimed",
            ItemStatus::Sent => "sent",
            ItemStatus::Failed => "failed",
            ItemStatus::Ignored => "ignored",
        }
    }

    /// Parse a lowercase status name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(ItemStatus::Queued),
            "claimed" => Some(ItemStatus::Claimed),
            "sent" => Some(ItemStatus::Sent),
            "failed" => Some(ItemStatus::Failed),
            "ignored" => Some(ItemStatus::Ignored),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the campaign start is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ScheduleMode {
    Immediate,
    Scheduled,
}

/// Maps one template variable to a source-file column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableBinding {
    /// Template variable name (e.g., "1" or "first_name").
    pub template_var: String,
    /// Column in the uploaded file that supplies the value.
    pub source_column: String,
    /// Value used when the column is missing or empty.
    #[serde(default)]
    pub fallback: Option<String>,
}

/// A bulk-send campaign: configuration plus aggregate run state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Campaign {
    pub id: String,

    pub created_by: String,
    pub agent_id: String,
    pub title: String,
    pub template_name: String,
    pub template_language: String,
    /// Provider sender identity override, if any.
    pub sender_id: Option<String>,
    pub max_attempts: i64,
    pub priority: i64,
    pub file_name: String,
    /// Local path of the stored upload, if kept.
    pub file_path: Option<String>,
    pub phone_column: String,
    pub name_column: Option<String>,
    pub key_column: Option<String>,
    /// JSON array of [`VariableBinding`]s.
    pub variable_bindings: String,

    pub schedule_mode: ScheduleMode,
    /// Epoch milliseconds, only meaningful when `schedule_mode` is scheduled.
    pub scheduled_at: Option<i64>,
    pub timezone: Option<String>,

    pub status: CampaignStatus,
    pub paused: bool,
    pub last_error: Option<String>,

    pub stats_total: i64,
    pub stats_queued: i64,
    pub stats_in_flight: i64,
    pub stats_sent: i64,
    pub stats_failed: i64,
    pub stats_ignored: i64,
    pub stats_processed: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,

    pub lock_owner: Option<String>,
    pub lock_locked_at: Option<i64>,
    pub lock_heartbeat_at: Option<i64>,

    pub created_at: String,
    pub updated_at: String,
}

impl Campaign {
    /// Decode the stored variable-binding spec.
    pub fn bindings(&self) -> Result<Vec<VariableBinding>, serde_json::Error> {
        serde_json::from_str(&self.variable_bindings)
    }
}

/// One recipient's unit of work within a campaign.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CampaignItem {
    pub id: String,
    pub campaign_id: String,
    /// Position of the row in the source file. Immutable.
    pub row_index: i64,

    /// JSON object of the raw source row (column -> value).
    pub raw_row: String,
    /// JSON object of resolved template variables (name -> value).
    pub variables: String,
    pub raw_phone: String,
    /// Canonicalized phone, absent when canonicalization failed.
    pub phone: Option<String>,
    pub display_name: Option<String>,
    pub external_key: Option<String>,

    pub status: ItemStatus,
    pub attempts: i64,
    pub last_attempt_at: Option<i64>,
    /// Only meaningful while `status` is failed.
    pub next_retry_at: Option<i64>,
    pub reserved_at: Option<i64>,
    pub finished_at: Option<i64>,

    pub lock_owner: Option<String>,
    pub lock_locked_at: Option<i64>,
    pub lock_expires_at: Option<i64>,

    pub contact_id: Option<String>,
    pub message_id: Option<String>,
    pub sent_at: Option<i64>,
    pub delivery_status: Option<String>,

    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub error_detail: Option<String>,
    pub error_at: Option<i64>,

    pub created_at: String,
}

impl CampaignItem {
    /// Decode the resolved template variables.
    pub fn variables_map(&self) -> Result<BTreeMap<String, String>, serde_json::Error> {
        serde_json::from_str(&self.variables)
    }
}

/// Input for creating a campaign. Runtime state starts at its defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaign {
    pub id: String,
    pub created_by: String,
    pub agent_id: String,
    pub title: String,
    pub template_name: String,
    pub template_language: String,
    pub sender_id: Option<String>,
    pub max_attempts: i64,
    pub priority: i64,
    pub file_name: String,
    pub file_path: Option<String>,
    pub phone_column: String,
    pub name_column: Option<String>,
    pub key_column: Option<String>,
    pub variable_bindings: Vec<VariableBinding>,
    pub schedule_mode: ScheduleMode,
    pub scheduled_at: Option<i64>,
    pub timezone: Option<String>,
}

/// Input for bulk-inserting one recipient item at ingestion.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub id: String,
    pub row_index: i64,
    pub raw_row: String,
    pub variables: String,
    pub raw_phone: String,
    pub phone: Option<String>,
    pub display_name: Option<String>,
    pub external_key: Option<String>,
    pub status: ItemStatus,
}
