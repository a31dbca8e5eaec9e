//! Record of an email accepted by the provider for one registration.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::email_type::EmailType;

/// Provider acceptance of one per-registration send.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EmailDispatch {
    pub id: Uuid,
    pub registration_id: Uuid,
    pub event_id: Uuid,
    pub email_type: EmailType,
    pub message_id: String,
    /// Delivery time handed to the provider; `None` for immediate sends.
    pub scheduled_for: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl EmailDispatch {
    /// Whether the provider still holds this message for later delivery.
    pub fn is_cancellable(&self, now: DateTime<Utc>) -> bool {
        self.cancelled_at.is_none() && self.scheduled_for.map_or(false, |at| at > now)
    }
}

/// Data needed to record a dispatch.
#[derive(Debug, Clone)]
pub struct NewEmailDispatch {
    pub registration_id: Uuid,
    pub event_id: Uuid,
    pub email_type: EmailType,
    pub message_id: String,
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dispatch(scheduled_for: Option<DateTime<Utc>>) -> EmailDispatch {
        EmailDispatch {
            id: Uuid::new_v4(),
            registration_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            email_type: EmailType::Join,
            message_id: "<msg@smtp-relay>".to_string(),
            scheduled_for,
            cancelled_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_only_future_scheduled_dispatches_are_cancellable() {
        let now = Utc::now();
        assert!(dispatch(Some(now + Duration::hours(3))).is_cancellable(now));
        assert!(!dispatch(Some(now - Duration::hours(3))).is_cancellable(now));
        assert!(!dispatch(None).is_cancellable(now));

        let mut cancelled = dispatch(Some(now + Duration::hours(3)));
        cancelled.cancelled_at = Some(now);
        assert!(!cancelled.is_cancellable(now));
    }
}
