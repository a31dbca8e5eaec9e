//! Scheduled email repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{EmailType, ScheduledEmail};
use domain::services::{ScheduledEmailStore, StoreError};
use sqlx::PgPool;
use uuid::Uuid;

use super::store_error;
use crate::entities::ScheduledEmailEntity;
use crate::metrics::QueryTimer;

const SCHEDULED_EMAIL_COLUMNS: &str = r#"
    id, event_id, email_type, recipient_list_ids, scheduled_for, status,
    brevo_message_id, error_message, created_at, updated_at
"#;

/// Repository for scheduled email audit records.
#[derive(Clone)]
pub struct ScheduledEmailRepository {
    pool: PgPool,
}

impl ScheduledEmailRepository {
    /// Creates a new ScheduledEmailRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the pending record for (event, type), or refreshes the open one.
    pub async fn upsert(
        &self,
        event_id: Uuid,
        email_type: EmailType,
        recipient_list_ids: &[i64],
        scheduled_for: DateTime<Utc>,
    ) -> Result<ScheduledEmailEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_pending_scheduled_email");
        let result = sqlx::query_as::<_, ScheduledEmailEntity>(&format!(
            r#"
            INSERT INTO scheduled_emails (event_id, email_type, recipient_list_ids, scheduled_for)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id, email_type) WHERE status = 'pending' DO UPDATE SET
                recipient_list_ids = EXCLUDED.recipient_list_ids,
                scheduled_for = EXCLUDED.scheduled_for,
                updated_at = NOW()
            RETURNING {}
            "#,
            SCHEDULED_EMAIL_COLUMNS
        ))
        .bind(event_id)
        .bind(email_type.as_str())
        .bind(recipient_list_ids)
        .bind(scheduled_for)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_open(
        &self,
        event_id: Uuid,
        email_type: EmailType,
    ) -> Result<Option<ScheduledEmailEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_pending_scheduled_email");
        let result = sqlx::query_as::<_, ScheduledEmailEntity>(&format!(
            r#"
            SELECT {}
            FROM scheduled_emails
            WHERE event_id = $1 AND email_type = $2 AND status = 'pending'
            "#,
            SCHEDULED_EMAIL_COLUMNS
        ))
        .bind(event_id)
        .bind(email_type.as_str())
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Moves a pending record to a terminal status.
    pub async fn close(
        &self,
        id: Uuid,
        status: &str,
        brevo_message_id: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new(format!("mark_scheduled_email_{}", status));
        let result = sqlx::query(
            r#"
            UPDATE scheduled_emails
            SET status = $2,
                brevo_message_id = COALESCE($3, brevo_message_id),
                error_message = COALESCE($4, error_message),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(brevo_message_id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    pub async fn cancel_pending(&self, event_id: Uuid) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("cancel_pending_scheduled_emails");
        let result = sqlx::query(
            r#"
            UPDATE scheduled_emails SET status = 'cancelled', updated_at = NOW()
            WHERE event_id = $1 AND status = 'pending'
            "#,
        )
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    pub async fn list_by_event(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<ScheduledEmailEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_scheduled_emails_by_event");
        let result = sqlx::query_as::<_, ScheduledEmailEntity>(&format!(
            "SELECT {} FROM scheduled_emails WHERE event_id = $1 ORDER BY scheduled_for",
            SCHEDULED_EMAIL_COLUMNS
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}

#[async_trait]
impl ScheduledEmailStore for ScheduledEmailRepository {
    async fn upsert_pending(
        &self,
        event_id: Uuid,
        email_type: EmailType,
        recipient_list_ids: Vec<i64>,
        scheduled_for: DateTime<Utc>,
    ) -> Result<ScheduledEmail, StoreError> {
        self.upsert(event_id, email_type, &recipient_list_ids, scheduled_for)
            .await
            .map_err(store_error)?
            .try_into()
    }

    async fn find_pending(
        &self,
        event_id: Uuid,
        email_type: EmailType,
    ) -> Result<Option<ScheduledEmail>, StoreError> {
        self.find_open(event_id, email_type)
            .await
            .map_err(store_error)?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn mark_scheduled(
        &self,
        id: Uuid,
        brevo_message_id: Option<String>,
    ) -> Result<(), StoreError> {
        self.close(id, "scheduled", brevo_message_id.as_deref(), None)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<(), StoreError> {
        self.close(id, "failed", None, Some(error_message))
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn cancel_for_event(&self, event_id: Uuid) -> Result<u64, StoreError> {
        self.cancel_pending(event_id).await.map_err(store_error)
    }

    async fn list_for_event(&self, event_id: Uuid) -> Result<Vec<ScheduledEmail>, StoreError> {
        self.list_by_event(event_id)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(TryInto::try_into)
            .collect()
    }
}
