//! Scheduled email entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{EmailType, ScheduledEmailStatus};
use domain::services::StoreError;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the scheduled_emails table.
#[derive(Debug, Clone, FromRow)]
pub struct ScheduledEmailEntity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub email_type: String,
    pub recipient_list_ids: Vec<i64>,
    pub scheduled_for: DateTime<Utc>,
    pub status: String,
    pub brevo_message_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ScheduledEmailEntity> for domain::models::ScheduledEmail {
    type Error = StoreError;

    fn try_from(entity: ScheduledEmailEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            event_id: entity.event_id,
            email_type: entity.email_type.parse::<EmailType>().map_err(StoreError::Backend)?,
            recipient_list_ids: entity.recipient_list_ids,
            scheduled_for: entity.scheduled_for,
            status: entity.status.parse::<ScheduledEmailStatus>().map_err(StoreError::Backend)?,
            brevo_message_id: entity.brevo_message_id,
            error_message: entity.error_message,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{ScheduledEmail, ScheduledEmailStatus};

    #[test]
    fn test_scheduled_email_entity_to_domain() {
        let entity = ScheduledEmailEntity {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            email_type: "join".to_string(),
            recipient_list_ids: vec![3, 4],
            scheduled_for: Utc::now(),
            status: "failed".to_string(),
            brevo_message_id: None,
            error_message: Some("grace period elapsed".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let record = ScheduledEmail::try_from(entity).unwrap();
        assert_eq!(record.status, ScheduledEmailStatus::Failed);
        assert_eq!(record.recipient_list_ids, vec![3, 4]);
    }
}
