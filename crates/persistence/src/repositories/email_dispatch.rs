//! Email dispatch repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{EmailDispatch, NewEmailDispatch};
use domain::services::{DispatchLog, StoreError};
use sqlx::PgPool;
use uuid::Uuid;

use super::store_error;
use crate::entities::EmailDispatchEntity;
use crate::metrics::QueryTimer;

/// Repository for email dispatch database operations.
#[derive(Clone)]
pub struct EmailDispatchRepository {
    pool: PgPool,
}

impl EmailDispatchRepository {
    /// Creates a new EmailDispatchRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        dispatch: &NewEmailDispatch,
    ) -> Result<EmailDispatchEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_email_dispatch");
        let result = sqlx::query_as::<_, EmailDispatchEntity>(
            r#"
            INSERT INTO email_dispatches
                (registration_id, event_id, email_type, message_id, scheduled_for)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, registration_id, event_id, email_type, message_id,
                      scheduled_for, cancelled_at, created_at
            "#,
        )
        .bind(dispatch.registration_id)
        .bind(dispatch.event_id)
        .bind(dispatch.email_type.as_str())
        .bind(&dispatch.message_id)
        .bind(dispatch.scheduled_for)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Uncancelled dispatches of an event still due after `after`.
    pub async fn list_scheduled_after(
        &self,
        event_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<Vec<EmailDispatchEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_email_dispatches_scheduled_after");
        let result = sqlx::query_as::<_, EmailDispatchEntity>(
            r#"
            SELECT id, registration_id, event_id, email_type, message_id,
                   scheduled_for, cancelled_at, created_at
            FROM email_dispatches
            WHERE event_id = $1
              AND cancelled_at IS NULL
              AND scheduled_for > $2
            ORDER BY scheduled_for
            "#,
        )
        .bind(event_id)
        .bind(after)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn set_cancelled(&self, id: Uuid, at: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("cancel_email_dispatch");
        let result = sqlx::query(
            r#"
            UPDATE email_dispatches SET cancelled_at = $2
            WHERE id = $1 AND cancelled_at IS NULL
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl DispatchLog for EmailDispatchRepository {
    async fn record(&self, dispatch: NewEmailDispatch) -> Result<EmailDispatch, StoreError> {
        self.insert(&dispatch).await.map_err(store_error)?.try_into()
    }

    async fn scheduled_after(
        &self,
        event_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<Vec<EmailDispatch>, StoreError> {
        self.list_scheduled_after(event_id, after)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(TryInto::try_into)
            .collect()
    }

    async fn mark_cancelled(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.set_cancelled(id, at).await.map_err(store_error)?;
        Ok(())
    }
}
