//! In-memory implementation of every storage seam, for tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::{
    DispatchLog, EventCatalog, RegistrationStore, ScheduledEmailStore, SendGuard, StoreError,
};
use crate::models::{
    EmailDispatch, EmailType, Event, NewEmailDispatch, NewEvent, NewRegistration, Registration,
    ScheduledEmail, ScheduledEmailStatus,
};

#[derive(Default)]
struct State {
    events: HashMap<Uuid, Event>,
    registrations: Vec<Registration>,
    dispatches: Vec<EmailDispatch>,
    scheduled_emails: Vec<ScheduledEmail>,
    claims: HashMap<String, DateTime<Utc>>,
}

/// Process-local store mirroring the PostgreSQL constraints.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fully-formed event, keeping its id.
    pub async fn insert_event(&self, event: Event) {
        self.state.lock().await.events.insert(event.id, event);
    }

    /// Inserts a fully-formed registration, bypassing the uniqueness check.
    pub async fn insert_registration(&self, registration: Registration) {
        self.state.lock().await.registrations.push(registration);
    }

    pub async fn registrations(&self) -> Vec<Registration> {
        self.state.lock().await.registrations.clone()
    }

    pub async fn dispatches(&self) -> Vec<EmailDispatch> {
        self.state.lock().await.dispatches.clone()
    }
}

#[async_trait]
impl RegistrationStore for InMemoryStore {
    async fn create(&self, new: NewRegistration) -> Result<Registration, StoreError> {
        let mut state = self.state.lock().await;
        let taken = state.registrations.iter().any(|r| {
            (r.event_id == new.event_id && r.email == new.email) || r.join_token == new.join_token
        });
        if taken {
            return Err(StoreError::Duplicate);
        }
        let registration = Registration {
            id: Uuid::new_v4(),
            event_id: new.event_id,
            name: new.name,
            email: new.email,
            phone: new.phone,
            registered_at: new.registered_at,
            join_token: new.join_token,
            clicked_join_link: false,
            registration_email_sent_at: None,
            reminder_email_sent_at: None,
            join_email_sent_at: None,
            followup_email_sent_at: None,
        };
        state.registrations.push(registration.clone());
        Ok(registration)
    }

    async fn is_registered(&self, event_id: Uuid, email: &str) -> Result<bool, StoreError> {
        Ok(self.find_by_event_and_email(event_id, email).await?.is_some())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Registration>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.registrations.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_event_and_email(
        &self,
        event_id: Uuid,
        email: &str,
    ) -> Result<Option<Registration>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .registrations
            .iter()
            .find(|r| r.event_id == event_id && r.email == email)
            .cloned())
    }

    async fn find_by_token(&self, join_token: &str) -> Result<Option<Registration>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .registrations
            .iter()
            .find(|r| r.join_token == join_token)
            .cloned())
    }

    async fn needing_email(
        &self,
        event_id: Uuid,
        email_type: EmailType,
        registered_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Registration>, StoreError> {
        let state = self.state.lock().await;
        let mut rows: Vec<Registration> = state
            .registrations
            .iter()
            .filter(|r| r.event_id == event_id && r.needs(email_type))
            .filter(|r| registered_before.map_or(true, |cutoff| r.registered_at <= cutoff))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.registered_at);
        Ok(rows)
    }

    async fn mark_email_sent(
        &self,
        id: Uuid,
        email_type: EmailType,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let registration = state
            .registrations
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound)?;
        Ok(registration.mark_sent(email_type, at))
    }

    async fn mark_join_clicked(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let registration = state
            .registrations
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound)?;
        if registration.clicked_join_link {
            return Ok(false);
        }
        registration.clicked_join_link = true;
        Ok(true)
    }
}

#[async_trait]
impl EventCatalog for InMemoryStore {
    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.state.lock().await.events.get(&id).cloned())
    }

    async fn events_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Event>, StoreError> {
        let state = self.state.lock().await;
        let mut events: Vec<Event> = state
            .events
            .values()
            .filter(|e| e.start_date.map_or(false, |d| d >= from && d <= to))
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.start_date, e.start_time));
        Ok(events)
    }

    async fn create_event(&self, new: NewEvent) -> Result<Event, StoreError> {
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            title: new.title,
            start_date: new.start_date,
            start_time: new.start_time,
            duration_minutes: new.duration_minutes,
            join_url: new.join_url,
            categories: new.categories,
            templates: new.templates,
            list_id: new.list_id,
            cancelled: false,
            emails_cancelled: false,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .await
            .events
            .insert(event.id, event.clone());
        Ok(event)
    }

    async fn set_cancelled(&self, id: Uuid, cancelled: bool) -> Result<Event, StoreError> {
        let mut state = self.state.lock().await;
        let event = state.events.get_mut(&id).ok_or(StoreError::NotFound)?;
        event.cancelled = cancelled;
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    async fn set_emails_cancelled(
        &self,
        id: Uuid,
        emails_cancelled: bool,
    ) -> Result<Event, StoreError> {
        let mut state = self.state.lock().await;
        let event = state.events.get_mut(&id).ok_or(StoreError::NotFound)?;
        event.emails_cancelled = emails_cancelled;
        event.updated_at = Utc::now();
        Ok(event.clone())
    }
}

#[async_trait]
impl DispatchLog for InMemoryStore {
    async fn record(&self, new: NewEmailDispatch) -> Result<EmailDispatch, StoreError> {
        let dispatch = EmailDispatch {
            id: Uuid::new_v4(),
            registration_id: new.registration_id,
            event_id: new.event_id,
            email_type: new.email_type,
            message_id: new.message_id,
            scheduled_for: new.scheduled_for,
            cancelled_at: None,
            created_at: Utc::now(),
        };
        self.state.lock().await.dispatches.push(dispatch.clone());
        Ok(dispatch)
    }

    async fn scheduled_after(
        &self,
        event_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<Vec<EmailDispatch>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .dispatches
            .iter()
            .filter(|d| d.event_id == event_id && d.is_cancellable(after))
            .cloned()
            .collect())
    }

    async fn mark_cancelled(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let dispatch = state
            .dispatches
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(StoreError::NotFound)?;
        dispatch.cancelled_at.get_or_insert(at);
        Ok(())
    }
}

#[async_trait]
impl ScheduledEmailStore for InMemoryStore {
    async fn upsert_pending(
        &self,
        event_id: Uuid,
        email_type: EmailType,
        recipient_list_ids: Vec<i64>,
        scheduled_for: DateTime<Utc>,
    ) -> Result<ScheduledEmail, StoreError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        if let Some(existing) = state.scheduled_emails.iter_mut().find(|s| {
            s.event_id == event_id
                && s.email_type == email_type
                && s.status == ScheduledEmailStatus::Pending
        }) {
            existing.scheduled_for = scheduled_for;
            existing.recipient_list_ids = recipient_list_ids;
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let record = ScheduledEmail {
            id: Uuid::new_v4(),
            event_id,
            email_type,
            recipient_list_ids,
            scheduled_for,
            status: ScheduledEmailStatus::Pending,
            brevo_message_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        state.scheduled_emails.push(record.clone());
        Ok(record)
    }

    async fn find_pending(
        &self,
        event_id: Uuid,
        email_type: EmailType,
    ) -> Result<Option<ScheduledEmail>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .scheduled_emails
            .iter()
            .find(|s| {
                s.event_id == event_id
                    && s.email_type == email_type
                    && s.status == ScheduledEmailStatus::Pending
            })
            .cloned())
    }

    async fn mark_scheduled(
        &self,
        id: Uuid,
        brevo_message_id: Option<String>,
    ) -> Result<(), StoreError> {
        self.transition(id, |record| {
            record.status = ScheduledEmailStatus::Scheduled;
            record.brevo_message_id = brevo_message_id;
        })
        .await
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<(), StoreError> {
        self.transition(id, |record| {
            record.status = ScheduledEmailStatus::Failed;
            record.error_message = Some(error_message.to_string());
        })
        .await
    }

    async fn cancel_for_event(&self, event_id: Uuid) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut changed = 0;
        for record in state
            .scheduled_emails
            .iter_mut()
            .filter(|s| s.event_id == event_id && s.status == ScheduledEmailStatus::Pending)
        {
            record.status = ScheduledEmailStatus::Cancelled;
            record.updated_at = now;
            changed += 1;
        }
        Ok(changed)
    }

    async fn list_for_event(&self, event_id: Uuid) -> Result<Vec<ScheduledEmail>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .scheduled_emails
            .iter()
            .filter(|s| s.event_id == event_id)
            .cloned()
            .collect())
    }
}

impl InMemoryStore {
    async fn transition<F>(&self, id: Uuid, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut ScheduledEmail),
    {
        let mut state = self.state.lock().await;
        let record = state
            .scheduled_emails
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound)?;
        apply(record);
        record.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl SendGuard for InMemoryStore {
    async fn claim(
        &self,
        key: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.claims.get(key) {
            Some(expires_at) if *expires_at > now => Ok(false),
            _ => {
                state.claims.insert(key.to_string(), now + ttl);
                Ok(true)
            }
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.claims.len();
        state.claims.retain(|_, expires_at| *expires_at > now);
        Ok((before - state.claims.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_registration(event_id: Uuid, email: &str) -> NewRegistration {
        NewRegistration {
            event_id,
            email: email.to_string(),
            name: "Test".to_string(),
            phone: None,
            join_token: format!("token-{}", email),
            registered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_pair_rejected() {
        let store = InMemoryStore::new();
        let event_id = Uuid::new_v4();
        store
            .create(new_registration(event_id, "a@x.com"))
            .await
            .unwrap();

        let mut again = new_registration(event_id, "a@x.com");
        again.join_token = "other".to_string();
        let result = store.create(again).await;
        assert!(matches!(result, Err(StoreError::Duplicate)));
        assert!(store.is_registered(event_id, "a@x.com").await.unwrap());
        assert_eq!(store.registrations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_needing_email_honours_flag_and_cutoff() {
        let store = InMemoryStore::new();
        let event_id = Uuid::new_v4();
        let early = store
            .create(new_registration(event_id, "early@x.com"))
            .await
            .unwrap();
        let mut late = new_registration(event_id, "late@x.com");
        late.registered_at = early.registered_at + Duration::hours(5);
        store.create(late).await.unwrap();

        let all = store
            .needing_email(event_id, EmailType::Reminder, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let cutoff = early.registered_at + Duration::hours(1);
        let qualified = store
            .needing_email(event_id, EmailType::Reminder, Some(cutoff))
            .await
            .unwrap();
        assert_eq!(qualified.len(), 1);
        assert_eq!(qualified[0].email, "early@x.com");

        assert!(store
            .mark_email_sent(early.id, EmailType::Reminder, Utc::now())
            .await
            .unwrap());
        assert!(!store
            .mark_email_sent(early.id, EmailType::Reminder, Utc::now())
            .await
            .unwrap());
        let remaining = store
            .needing_email(event_id, EmailType::Reminder, None)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].email, "late@x.com");
    }

    #[tokio::test]
    async fn test_claim_blocks_until_expiry() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let ttl = Duration::seconds(30);
        assert!(store.claim("k", ttl, now).await.unwrap());
        assert!(!store.claim("k", ttl, now + Duration::seconds(10)).await.unwrap());
        assert!(store.claim("k", ttl, now + Duration::seconds(31)).await.unwrap());
        assert_eq!(store.purge_expired(now + Duration::minutes(5)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_pending_record_upserts_in_place() {
        let store = InMemoryStore::new();
        let event_id = Uuid::new_v4();
        let first_at = Utc::now() + Duration::days(5);
        let first = store
            .upsert_pending(event_id, EmailType::Join, vec![2], first_at)
            .await
            .unwrap();
        let second = store
            .upsert_pending(event_id, EmailType::Join, vec![2], first_at + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);

        store
            .mark_scheduled(first.id, Some("<m1>".to_string()))
            .await
            .unwrap();
        assert!(store
            .find_pending(event_id, EmailType::Join)
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.cancel_for_event(event_id).await.unwrap(), 0);
    }
}
