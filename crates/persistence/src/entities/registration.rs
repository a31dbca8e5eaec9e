//! Registration entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the registrations table.
#[derive(Debug, Clone, FromRow)]
pub struct RegistrationEntity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub join_token: String,
    pub clicked_join_link: bool,
    pub registration_email_sent_at: Option<DateTime<Utc>>,
    pub reminder_email_sent_at: Option<DateTime<Utc>>,
    pub join_email_sent_at: Option<DateTime<Utc>>,
    pub followup_email_sent_at: Option<DateTime<Utc>>,
}

impl From<RegistrationEntity> for domain::models::Registration {
    fn from(entity: RegistrationEntity) -> Self {
        Self {
            id: entity.id,
            event_id: entity.event_id,
            name: entity.name,
            email: entity.email,
            phone: entity.phone,
            registered_at: entity.registered_at,
            join_token: entity.join_token.trim_end().to_string(),
            clicked_join_link: entity.clicked_join_link,
            registration_email_sent_at: entity.registration_email_sent_at,
            reminder_email_sent_at: entity.reminder_email_sent_at,
            join_email_sent_at: entity.join_email_sent_at,
            followup_email_sent_at: entity.followup_email_sent_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::EmailType;
    use fake::faker::internet::en::SafeEmail;
    use fake::Fake;

    #[test]
    fn test_registration_entity_to_domain() {
        let email: String = SafeEmail().fake();
        let entity = RegistrationEntity {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: email.clone(),
            phone: None,
            registered_at: Utc::now(),
            join_token: "a".repeat(64),
            clicked_join_link: false,
            registration_email_sent_at: Some(Utc::now()),
            reminder_email_sent_at: None,
            join_email_sent_at: None,
            followup_email_sent_at: None,
        };
        let registration: domain::models::Registration = entity.into();
        assert_eq!(registration.email, email);
        assert!(!registration.needs(EmailType::Registration));
        assert!(registration.needs(EmailType::Join));
        assert_eq!(registration.join_token.len(), 64);
    }
}
