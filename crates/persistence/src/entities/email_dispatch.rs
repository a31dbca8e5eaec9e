//! Email dispatch entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::EmailType;
use domain::services::StoreError;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the email_dispatches table.
#[derive(Debug, Clone, FromRow)]
pub struct EmailDispatchEntity {
    pub id: Uuid,
    pub registration_id: Uuid,
    pub event_id: Uuid,
    pub email_type: String,
    pub message_id: String,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<EmailDispatchEntity> for domain::models::EmailDispatch {
    type Error = StoreError;

    fn try_from(entity: EmailDispatchEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            registration_id: entity.registration_id,
            event_id: entity.event_id,
            email_type: entity.email_type.parse::<EmailType>().map_err(StoreError::Backend)?,
            message_id: entity.message_id,
            scheduled_for: entity.scheduled_for,
            cancelled_at: entity.cancelled_at,
            created_at: entity.created_at,
        })
    }
}
