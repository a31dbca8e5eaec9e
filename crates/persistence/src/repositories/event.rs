//! Event repository for database operations.

use async_trait::async_trait;
use chrono::NaiveDate;
use domain::models::{Event, NewEvent};
use domain::services::{EventCatalog, StoreError};
use sqlx::PgPool;
use uuid::Uuid;

use super::store_error;
use crate::entities::EventEntity;
use crate::metrics::QueryTimer;

const EVENT_COLUMNS: &str = r#"
    id, title, start_date, start_time, duration_minutes, join_url, categories,
    registration_template_id, reminder_template_id, join_template_id, followup_template_id,
    list_id, cancelled, emails_cancelled, created_at, updated_at
"#;

/// Repository for event database operations.
#[derive(Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    /// Creates a new EventRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_event_by_id");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            "SELECT {} FROM events WHERE id = $1",
            EVENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Events whose start date lies in `[from, to]`, earliest first.
    pub async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_events_between");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            r#"
            SELECT {}
            FROM events
            WHERE start_date BETWEEN $1 AND $2
            ORDER BY start_date, start_time NULLS FIRST
            "#,
            EVENT_COLUMNS
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn create(&self, event: &NewEvent) -> Result<EventEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_event");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            r#"
            INSERT INTO events (
                title, start_date, start_time, duration_minutes, join_url, categories,
                registration_template_id, reminder_template_id, join_template_id,
                followup_template_id, list_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(&event.title)
        .bind(event.start_date)
        .bind(event.start_time)
        .bind(event.duration_minutes)
        .bind(&event.join_url)
        .bind(&event.categories)
        .bind(event.templates.registration)
        .bind(event.templates.reminder)
        .bind(event.templates.join)
        .bind(event.templates.followup)
        .bind(event.list_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn update_cancelled(
        &self,
        id: Uuid,
        cancelled: bool,
    ) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_event_cancelled");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            r#"
            UPDATE events SET cancelled = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(id)
        .bind(cancelled)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn update_emails_cancelled(
        &self,
        id: Uuid,
        emails_cancelled: bool,
    ) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_event_emails_cancelled");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            r#"
            UPDATE events SET emails_cancelled = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(id)
        .bind(emails_cancelled)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }
}

#[async_trait]
impl EventCatalog for EventRepository {
    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.find_by_id(id).await.map_err(store_error)?.map(Into::into))
    }

    async fn events_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Event>, StoreError> {
        let rows = self.list_between(from, to).await.map_err(store_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_event(&self, event: NewEvent) -> Result<Event, StoreError> {
        Ok(self.create(&event).await.map_err(store_error)?.into())
    }

    async fn set_cancelled(&self, id: Uuid, cancelled: bool) -> Result<Event, StoreError> {
        self.update_cancelled(id, cancelled)
            .await
            .map_err(store_error)?
            .map(Into::into)
            .ok_or(StoreError::NotFound)
    }

    async fn set_emails_cancelled(
        &self,
        id: Uuid,
        emails_cancelled: bool,
    ) -> Result<Event, StoreError> {
        self.update_emails_cancelled(id, emails_cancelled)
            .await
            .map_err(store_error)?
            .map(Into::into)
            .ok_or(StoreError::NotFound)
    }
}
