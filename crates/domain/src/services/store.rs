//! Storage seams consumed by the scheduling engine and registration service.
//!
//! PostgreSQL repositories implement these traits in the persistence crate;
//! [`InMemoryStore`](super::memory::InMemoryStore) implements them for tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    EmailDispatch, EmailType, Event, NewEmailDispatch, NewEvent, NewRegistration, Registration,
    ScheduledEmail,
};

/// Storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("Record already exists")]
    Duplicate,

    #[error("Record not found")]
    NotFound,

    /// Driver or connection failure, carrying the driver message.
    #[error("Storage error: {0}")]
    Backend(String),
}

/// Per-event, per-address registration records.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Inserts a registration; `Duplicate` if the (event, email) pair exists.
    async fn create(&self, registration: NewRegistration) -> Result<Registration, StoreError>;

    async fn is_registered(&self, event_id: Uuid, email: &str) -> Result<bool, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Registration>, StoreError>;

    async fn find_by_event_and_email(
        &self,
        event_id: Uuid,
        email: &str,
    ) -> Result<Option<Registration>, StoreError>;

    async fn find_by_token(&self, join_token: &str) -> Result<Option<Registration>, StoreError>;

    /// Registrations of an event whose sent-timestamp for `email_type` is
    /// still null, oldest first. With `registered_before` set, only rows with
    /// `registered_at <= registered_before` are returned.
    async fn needing_email(
        &self,
        event_id: Uuid,
        email_type: EmailType,
        registered_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Registration>, StoreError>;

    /// Sets the sent-timestamp if still null. Returns true when this call
    /// performed the transition.
    async fn mark_email_sent(
        &self,
        id: Uuid,
        email_type: EmailType,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Records the first join-link click. Returns true on the first call.
    async fn mark_join_clicked(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Event records.
#[async_trait]
pub trait EventCatalog: Send + Sync {
    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError>;

    /// Events whose local start date lies in `[from, to]`.
    async fn events_between(&self, from: NaiveDate, to: NaiveDate)
        -> Result<Vec<Event>, StoreError>;

    async fn create_event(&self, event: NewEvent) -> Result<Event, StoreError>;

    async fn set_cancelled(&self, id: Uuid, cancelled: bool) -> Result<Event, StoreError>;

    async fn set_emails_cancelled(
        &self,
        id: Uuid,
        emails_cancelled: bool,
    ) -> Result<Event, StoreError>;
}

/// Log of messages accepted by the email provider.
#[async_trait]
pub trait DispatchLog: Send + Sync {
    async fn record(&self, dispatch: NewEmailDispatch) -> Result<EmailDispatch, StoreError>;

    /// Uncancelled dispatches of an event scheduled for delivery after `after`.
    async fn scheduled_after(
        &self,
        event_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<Vec<EmailDispatch>, StoreError>;

    async fn mark_cancelled(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Audit records for batch sends deferred past the provider ceiling.
#[async_trait]
pub trait ScheduledEmailStore: Send + Sync {
    /// Creates the pending record for (event, type) or refreshes its send time.
    async fn upsert_pending(
        &self,
        event_id: Uuid,
        email_type: EmailType,
        recipient_list_ids: Vec<i64>,
        scheduled_for: DateTime<Utc>,
    ) -> Result<ScheduledEmail, StoreError>;

    async fn find_pending(
        &self,
        event_id: Uuid,
        email_type: EmailType,
    ) -> Result<Option<ScheduledEmail>, StoreError>;

    async fn mark_scheduled(
        &self,
        id: Uuid,
        brevo_message_id: Option<String>,
    ) -> Result<(), StoreError>;

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<(), StoreError>;

    /// Cancels every pending record of an event. Returns how many changed.
    async fn cancel_for_event(&self, event_id: Uuid) -> Result<u64, StoreError>;

    async fn list_for_event(&self, event_id: Uuid) -> Result<Vec<ScheduledEmail>, StoreError>;
}

/// Short-lived claims guarding against duplicate instant emails.
#[async_trait]
pub trait SendGuard: Send + Sync {
    /// Atomically claims `key` for `ttl`. Returns false while an unexpired
    /// claim on the same key exists.
    async fn claim(&self, key: &str, ttl: Duration, now: DateTime<Utc>)
        -> Result<bool, StoreError>;

    /// Deletes expired claims. Returns how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// The storage seams bundled for injection.
#[derive(Clone)]
pub struct Stores {
    pub events: Arc<dyn EventCatalog>,
    pub registrations: Arc<dyn RegistrationStore>,
    pub dispatches: Arc<dyn DispatchLog>,
    pub scheduled_emails: Arc<dyn ScheduledEmailStore>,
    pub send_guard: Arc<dyn SendGuard>,
}

impl Stores {
    /// Uses one backend for every seam.
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: EventCatalog
            + RegistrationStore
            + DispatchLog
            + ScheduledEmailStore
            + SendGuard
            + 'static,
    {
        Self {
            events: backend.clone(),
            registrations: backend.clone(),
            dispatches: backend.clone(),
            scheduled_emails: backend.clone(),
            send_guard: backend,
        }
    }
}
