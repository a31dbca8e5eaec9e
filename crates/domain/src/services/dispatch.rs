//! Per-registration delivery: build the email, hand it to the provider, flip
//! the sent-flag.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use super::calendar::ics_attachment;
use super::store::{DispatchLog, RegistrationStore, StoreError};
use super::transport::{EmailTransport, Recipient, TransactionalEmail, TransportError};
use crate::models::{EmailSettings, EmailType, Event, NewEmailDispatch, Registration};

/// Why a single delivery failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The provider accepted the email but the sent-flag could not be written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of an accepted delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message_id: String,
    /// False when another path had already set the sent-flag.
    pub marked: bool,
}

/// Builds and sends lifecycle emails for single registrations.
#[derive(Clone)]
pub struct EmailDispatcher {
    transport: Arc<dyn EmailTransport>,
    registrations: Arc<dyn RegistrationStore>,
    dispatches: Arc<dyn DispatchLog>,
    settings: Arc<EmailSettings>,
}

impl EmailDispatcher {
    pub fn new(
        transport: Arc<dyn EmailTransport>,
        registrations: Arc<dyn RegistrationStore>,
        dispatches: Arc<dyn DispatchLog>,
        settings: Arc<EmailSettings>,
    ) -> Self {
        Self {
            transport,
            registrations,
            dispatches,
            settings,
        }
    }

    /// Personalized join link, or the event's shared link when no public base
    /// URL is configured.
    pub fn join_link(&self, event: &Event, registration: &Registration) -> Option<String> {
        if !self.settings.join_base_url.is_empty() {
            Some(self.settings.join_url(&registration.join_token))
        } else {
            event.join_url.clone()
        }
    }

    /// Template parameters injected into every lifecycle email.
    pub fn params(
        &self,
        event: &Event,
        event_instant: DateTime<Utc>,
        registration: &Registration,
    ) -> BTreeMap<String, String> {
        let local = event_instant.with_timezone(&self.settings.timezone);
        let mut params = BTreeMap::new();
        params.insert("NAME".to_string(), registration.display_name().to_string());
        params.insert("EMAIL".to_string(), registration.email.clone());
        params.insert("EVENT_ID".to_string(), event.id.to_string());
        params.insert("EVENT_TITLE".to_string(), event.title.clone());
        params.insert("EVENT_DATE".to_string(), local.format("%Y-%m-%d").to_string());
        params.insert("EVENT_TIME".to_string(), local.format("%H:%M").to_string());
        params.insert(
            "JOIN_URL".to_string(),
            self.join_link(event, registration).unwrap_or_default(),
        );
        params
    }

    /// Assembles the provider request for one registration and type.
    #[allow(clippy::too_many_arguments)]
    pub fn build_email(
        &self,
        event: &Event,
        event_instant: DateTime<Utc>,
        registration: &Registration,
        email_type: EmailType,
        template_id: i64,
        scheduled_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> TransactionalEmail {
        let attachment = match email_type {
            EmailType::Registration => Some(ics_attachment(
                event,
                event_instant,
                self.join_link(event, registration).as_deref(),
                now,
            )),
            _ => None,
        };
        TransactionalEmail {
            template_id,
            to: vec![Recipient {
                email: registration.email.clone(),
                name: Some(registration.display_name().to_string()),
            }],
            params: self.params(event, event_instant, registration),
            scheduled_at,
            tags: vec![format!("event-{}", event.id), email_type.to_string()],
            attachment,
        }
    }

    /// Sends (or schedules, when `scheduled_at` is set) one email and marks it
    /// sent on acceptance.
    ///
    /// The sent-flag write is the only guard against resending, so its
    /// failure is returned. Failing to log the dispatch is not.
    #[allow(clippy::too_many_arguments)]
    pub async fn deliver(
        &self,
        event: &Event,
        event_instant: DateTime<Utc>,
        registration: &Registration,
        email_type: EmailType,
        template_id: i64,
        scheduled_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Delivery, DeliveryError> {
        let email = self.build_email(
            event,
            event_instant,
            registration,
            email_type,
            template_id,
            scheduled_at,
            now,
        );

        let message_id = match self.transport.schedule_email(&email).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(
                    event_id = %event.id,
                    registration_id = %registration.id,
                    email_type = %email_type,
                    template_id = template_id,
                    error = %e,
                    "Email provider rejected send"
                );
                return Err(e.into());
            }
        };

        let marked = self
            .registrations
            .mark_email_sent(registration.id, email_type, now)
            .await
            .map_err(|e| {
                tracing::error!(
                    registration_id = %registration.id,
                    email_type = %email_type,
                    message_id = %message_id,
                    error = %e,
                    "Failed to mark email as sent after provider accepted it"
                );
                e
            })?;

        if let Err(e) = self
            .dispatches
            .record(NewEmailDispatch {
                registration_id: registration.id,
                event_id: event.id,
                email_type,
                message_id: message_id.clone(),
                scheduled_for: scheduled_at,
            })
            .await
        {
            tracing::warn!(
                registration_id = %registration.id,
                message_id = %message_id,
                error = %e,
                "Failed to record email dispatch"
            );
        }

        tracing::info!(
            event_id = %event.id,
            registration_id = %registration.id,
            email_type = %email_type,
            message_id = %message_id,
            scheduled_at = ?scheduled_at,
            "Email accepted by provider"
        );

        Ok(Delivery { message_id, marked })
    }
}
