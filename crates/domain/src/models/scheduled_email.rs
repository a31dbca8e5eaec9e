//! Batch-level audit record for sends deferred past the provider ceiling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::email_type::EmailType;

/// Lifecycle of a deferred batch send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledEmailStatus {
    /// Waiting until the send time falls inside the provider ceiling.
    Pending,
    /// Handed to the provider on a later run.
    Scheduled,
    /// Every attempt failed, or the grace period elapsed first.
    Failed,
    /// The event was cancelled before the send happened.
    Cancelled,
}

impl ScheduledEmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduledEmailStatus::Pending => "pending",
            ScheduledEmailStatus::Scheduled => "scheduled",
            ScheduledEmailStatus::Failed => "failed",
            ScheduledEmailStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the record has reached a final state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScheduledEmailStatus::Pending)
    }
}

impl std::fmt::Display for ScheduledEmailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduledEmailStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScheduledEmailStatus::Pending),
            "scheduled" => Ok(ScheduledEmailStatus::Scheduled),
            "failed" => Ok(ScheduledEmailStatus::Failed),
            "cancelled" => Ok(ScheduledEmailStatus::Cancelled),
            other => Err(format!("Unknown scheduled email status: {}", other)),
        }
    }
}

/// One deferred (event, email type) send.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ScheduledEmail {
    pub id: Uuid,
    pub event_id: Uuid,
    pub email_type: EmailType,
    pub recipient_list_ids: Vec<i64>,
    pub scheduled_for: DateTime<Utc>,
    pub status: ScheduledEmailStatus,
    pub brevo_message_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ScheduledEmailStatus::Pending,
            ScheduledEmailStatus::Scheduled,
            ScheduledEmailStatus::Failed,
            ScheduledEmailStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<ScheduledEmailStatus>(), Ok(status));
        }
        assert!("sent".parse::<ScheduledEmailStatus>().is_err());
    }

    #[test]
    fn test_only_pending_is_open() {
        assert!(!ScheduledEmailStatus::Pending.is_terminal());
        assert!(ScheduledEmailStatus::Scheduled.is_terminal());
        assert!(ScheduledEmailStatus::Failed.is_terminal());
        assert!(ScheduledEmailStatus::Cancelled.is_terminal());
    }
}
