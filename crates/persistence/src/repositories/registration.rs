//! Registration repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{EmailType, NewRegistration, Registration};
use domain::services::{RegistrationStore, StoreError};
use sqlx::PgPool;
use uuid::Uuid;

use super::store_error;
use crate::entities::RegistrationEntity;
use crate::metrics::QueryTimer;

const REGISTRATION_COLUMNS: &str = r#"
    id, event_id, name, email, phone, registered_at, join_token, clicked_join_link,
    registration_email_sent_at, reminder_email_sent_at, join_email_sent_at, followup_email_sent_at
"#;

/// Repository for registration database operations.
#[derive(Clone)]
pub struct RegistrationRepository {
    pool: PgPool,
}

impl RegistrationRepository {
    /// Creates a new RegistrationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts a registration. Fails with a unique violation (23505) when the
    /// (event_id, email) pair or the join token already exists.
    pub async fn insert(
        &self,
        registration: &NewRegistration,
    ) -> Result<RegistrationEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_registration");
        let result = sqlx::query_as::<_, RegistrationEntity>(&format!(
            r#"
            INSERT INTO registrations (event_id, email, name, phone, join_token, registered_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(registration.event_id)
        .bind(&registration.email)
        .bind(&registration.name)
        .bind(&registration.phone)
        .bind(&registration.join_token)
        .bind(registration.registered_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_join_token(
        &self,
        join_token: &str,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_registration_by_join_token");
        let result = sqlx::query_as::<_, RegistrationEntity>(&format!(
            "SELECT {} FROM registrations WHERE join_token = $1",
            REGISTRATION_COLUMNS
        ))
        .bind(join_token)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_uuid(&self, id: Uuid) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_registration_by_id");
        let result = sqlx::query_as::<_, RegistrationEntity>(&format!(
            "SELECT {} FROM registrations WHERE id = $1",
            REGISTRATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_pair(
        &self,
        event_id: Uuid,
        email: &str,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_registration_by_event_and_email");
        let result = sqlx::query_as::<_, RegistrationEntity>(&format!(
            "SELECT {} FROM registrations WHERE event_id = $1 AND email = $2",
            REGISTRATION_COLUMNS
        ))
        .bind(event_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Registrations of an event still missing the given email type.
    pub async fn list_needing_email(
        &self,
        event_id: Uuid,
        email_type: EmailType,
        registered_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new(format!("list_registrations_needing_{}", email_type));
        let result = sqlx::query_as::<_, RegistrationEntity>(&format!(
            r#"
            SELECT {}
            FROM registrations
            WHERE event_id = $1
              AND {} IS NULL
              AND ($2::timestamptz IS NULL OR registered_at <= $2)
            ORDER BY registered_at
            "#,
            REGISTRATION_COLUMNS,
            email_type.sent_at_column()
        ))
        .bind(event_id)
        .bind(registered_before)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Sets the sent-timestamp only while it is still null.
    pub async fn set_email_sent(
        &self,
        id: Uuid,
        email_type: EmailType,
        at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let column = email_type.sent_at_column();
        let timer = QueryTimer::new(format!("mark_{}_email_sent", email_type));
        let result = sqlx::query(&format!(
            "UPDATE registrations SET {column} = $2 WHERE id = $1 AND {column} IS NULL"
        ))
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    pub async fn set_join_clicked(&self, id: Uuid) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("mark_join_link_clicked");
        let result = sqlx::query(
            r#"
            UPDATE registrations SET clicked_join_link = TRUE
            WHERE id = $1 AND clicked_join_link = FALSE
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RegistrationStore for RegistrationRepository {
    async fn create(&self, registration: NewRegistration) -> Result<Registration, StoreError> {
        Ok(self.insert(&registration).await.map_err(store_error)?.into())
    }

    async fn is_registered(&self, event_id: Uuid, email: &str) -> Result<bool, StoreError> {
        Ok(self
            .find_by_pair(event_id, email)
            .await
            .map_err(store_error)?
            .is_some())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Registration>, StoreError> {
        Ok(self.find_by_uuid(id).await.map_err(store_error)?.map(Into::into))
    }

    async fn find_by_event_and_email(
        &self,
        event_id: Uuid,
        email: &str,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self
            .find_by_pair(event_id, email)
            .await
            .map_err(store_error)?
            .map(Into::into))
    }

    async fn find_by_token(&self, join_token: &str) -> Result<Option<Registration>, StoreError> {
        Ok(self
            .find_by_join_token(join_token)
            .await
            .map_err(store_error)?
            .map(Into::into))
    }

    async fn needing_email(
        &self,
        event_id: Uuid,
        email_type: EmailType,
        registered_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Registration>, StoreError> {
        let rows = self
            .list_needing_email(event_id, email_type, registered_before)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_email_sent(
        &self,
        id: Uuid,
        email_type: EmailType,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let affected = self
            .set_email_sent(id, email_type, at)
            .await
            .map_err(store_error)?;
        Ok(affected == 1)
    }

    async fn mark_join_clicked(&self, id: Uuid) -> Result<bool, StoreError> {
        let affected = self.set_join_clicked(id).await.map_err(store_error)?;
        Ok(affected == 1)
    }
}
