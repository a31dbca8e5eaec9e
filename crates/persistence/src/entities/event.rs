//! Event entity (database row mapping).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use domain::models::EmailTemplates;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the events table.
#[derive(Debug, Clone, FromRow)]
pub struct EventEntity {
    pub id: Uuid,
    pub title: String,
    pub start_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<i32>,
    pub join_url: Option<String>,
    pub categories: Vec<String>,
    pub registration_template_id: Option<i64>,
    pub reminder_template_id: Option<i64>,
    pub join_template_id: Option<i64>,
    pub followup_template_id: Option<i64>,
    pub list_id: Option<i64>,
    pub cancelled: bool,
    pub emails_cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EventEntity> for domain::models::Event {
    fn from(entity: EventEntity) -> Self {
        Self {
            id: entity.id,
            title: entity.title,
            start_date: entity.start_date,
            start_time: entity.start_time,
            duration_minutes: entity.duration_minutes,
            join_url: entity.join_url,
            categories: entity.categories,
            templates: EmailTemplates {
                registration: entity.registration_template_id,
                reminder: entity.reminder_template_id,
                join: entity.join_template_id,
                followup: entity.followup_template_id,
            },
            list_id: entity.list_id,
            cancelled: entity.cancelled,
            emails_cancelled: entity.emails_cancelled,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
