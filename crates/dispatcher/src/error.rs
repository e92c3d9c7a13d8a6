//! Error types for the dispatch engine.

use database::{DatabaseError, ItemStatus};
use thiserror::Error;

/// Why a dispatch invocation was rejected before any claim was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The campaign is paused.
    Paused,
    /// The campaign was cancelled.
    Cancelled,
    /// The campaign's scheduled start time has not been reached.
    NotYetScheduled { scheduled_at: i64 },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Paused => write!(f, "campaign is paused"),
            RejectReason::Cancelled => write!(f, "campaign is cancelled"),
            RejectReason::NotYetScheduled { scheduled_at } => {
                write!(f, "campaign is scheduled for {scheduled_at}")
            }
        }
    }
}

/// Errors that can occur in the dispatch engine.
///
/// Per-item send failures never surface here; they are contained in the
/// finalize step and recorded on the item. Only campaign-level
/// preconditions and storage failures abort an invocation.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Storage error, including typed not-found outcomes.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// The uploaded file could not be parsed.
    #[error("file parse error: {0}")]
    Parse(#[from] csv::Error),

    /// Campaign-level precondition failed; nothing was claimed.
    #[error("campaign {id} cannot run: {reason}")]
    Rejected { id: String, reason: RejectReason },

    /// The item is not in a claimable state (already sent, ignored, or
    /// still held by a live claimer).
    #[error("item {id} is not retryable (status: {status})")]
    ItemNotRetryable { id: String, status: ItemStatus },
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;
