//! Instant-email guard claims.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use domain::services::{SendGuard, StoreError};
use sqlx::PgPool;

use super::store_error;
use crate::metrics::QueryTimer;

/// Repository for the email_send_claims table.
#[derive(Clone)]
pub struct SendClaimRepository {
    pool: PgPool,
}

impl SendClaimRepository {
    /// Creates a new SendClaimRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Claims `key_hash` until `expires_at` unless an unexpired claim exists.
    ///
    /// The conditional upsert makes check-and-set a single statement, so two
    /// concurrent claimants cannot both succeed.
    pub async fn try_claim(
        &self,
        key_hash: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("claim_email_send");
        let result = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO email_send_claims (key_hash, claimed_at, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key_hash) DO UPDATE SET
                claimed_at = EXCLUDED.claimed_at,
                expires_at = EXCLUDED.expires_at
            WHERE email_send_claims.expires_at <= EXCLUDED.claimed_at
            RETURNING key_hash
            "#,
        )
        .bind(key_hash)
        .bind(now)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.is_some())
    }

    /// Delete expired claims.
    /// Returns the number of deleted records.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_expired_email_send_claims");
        let result = sqlx::query(
            r#"
            DELETE FROM email_send_claims
            WHERE expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SendGuard for SendClaimRepository {
    async fn claim(
        &self,
        key: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.try_claim(key, now, now + ttl)
            .await
            .map_err(store_error)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.delete_expired(now).await.map_err(store_error)
    }
}
