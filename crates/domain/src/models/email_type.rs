//! The four lifecycle email types.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lifecycle email kinds sent for a registration.
///
/// Each kind has its own sent-timestamp on the registration row; the kinds are
/// independent of each other and are not sent in any fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    Registration,
    Reminder,
    Join,
    Followup,
}

impl EmailType {
    /// All email types.
    pub const ALL: [EmailType; 4] = [
        EmailType::Registration,
        EmailType::Reminder,
        EmailType::Join,
        EmailType::Followup,
    ];

    /// Email types handled by the daily batch.
    pub const SCHEDULED: [EmailType; 3] =
        [EmailType::Reminder, EmailType::Join, EmailType::Followup];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::Registration => "registration",
            EmailType::Reminder => "reminder",
            EmailType::Join => "join",
            EmailType::Followup => "followup",
        }
    }

    /// Name of the sent-timestamp column backing this type.
    pub fn sent_at_column(&self) -> &'static str {
        match self {
            EmailType::Registration => "registration_email_sent_at",
            EmailType::Reminder => "reminder_email_sent_at",
            EmailType::Join => "join_email_sent_at",
            EmailType::Followup => "followup_email_sent_at",
        }
    }
}

impl std::fmt::Display for EmailType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration" => Ok(EmailType::Registration),
            "reminder" => Ok(EmailType::Reminder),
            "join" => Ok(EmailType::Join),
            "followup" => Ok(EmailType::Followup),
            other => Err(format!("Unknown email type: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_type_round_trips_through_str() {
        for email_type in EmailType::ALL {
            assert_eq!(email_type.as_str().parse::<EmailType>(), Ok(email_type));
        }
        assert!("digest".parse::<EmailType>().is_err());
    }

    #[test]
    fn test_scheduled_types_exclude_registration() {
        assert!(!EmailType::SCHEDULED.contains(&EmailType::Registration));
        assert_eq!(EmailType::SCHEDULED.len(), 3);
    }

    #[test]
    fn test_sent_at_columns_are_distinct() {
        let columns: std::collections::HashSet<_> =
            EmailType::ALL.iter().map(|t| t.sent_at_column()).collect();
        assert_eq!(columns.len(), 4);
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&EmailType::Followup).unwrap();
        assert_eq!(json, "\"followup\"");
    }
}
