//! Signup-time entry point: persist the registration, sync the CRM contact,
//! send the instant email and schedule this registration's own join and
//! follow-up emails ahead of the batch.

use chrono::{DateTime, Duration, Utc};
use shared::crypto::sha256_hex;
use shared::validation::normalize_email;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use super::dispatch::EmailDispatcher;
use super::store::{StoreError, Stores};
use super::timing::{decide, event_datetime, is_in_join_window, SendDecision};
use super::transport::EmailTransport;
use crate::models::{
    generate_join_token, Contact, EmailSettings, EmailType, Event, NewRegistration,
    RegisterRequest, RegisterResponse, Registration,
};

/// Registration failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Event not found")]
    EventNotFound,

    #[error("Event has been cancelled")]
    EventCancelled,

    #[error("Invalid or unknown join link")]
    InvalidJoinToken,

    #[error("No join link is available for this event")]
    JoinUnavailable,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of the instant email attempt.
#[derive(Debug, Default)]
struct InstantOutcome {
    sent: Option<EmailType>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct RegistrationService {
    stores: Stores,
    dispatcher: EmailDispatcher,
    transport: Arc<dyn EmailTransport>,
    settings: Arc<EmailSettings>,
}

impl RegistrationService {
    pub fn new(
        stores: Stores,
        transport: Arc<dyn EmailTransport>,
        settings: Arc<EmailSettings>,
    ) -> Self {
        let dispatcher = EmailDispatcher::new(
            transport.clone(),
            stores.registrations.clone(),
            stores.dispatches.clone(),
            settings.clone(),
        );
        Self {
            stores,
            dispatcher,
            transport,
            settings,
        }
    }

    /// Registers an address for an event.
    ///
    /// Repeat submissions for the same (event, email) pair, including ones
    /// that lose an insert race, never create a second row: they resend the
    /// instant email and report `already_registered`. A cancelled event still
    /// acknowledges existing registrations but sends nothing; only new
    /// registrations are refused. CRM sync and email
    /// delivery are best-effort and never fail the registration.
    pub async fn register(
        &self,
        event_id: Uuid,
        request: RegisterRequest,
        now: DateTime<Utc>,
    ) -> Result<RegisterResponse, RegistrationError> {
        request.validate()?;
        let email = normalize_email(&request.email);

        let event = self
            .stores
            .events
            .find_event(event_id)
            .await?
            .ok_or(RegistrationError::EventNotFound)?;

        if let Some(existing) = self
            .stores
            .registrations
            .find_by_event_and_email(event_id, &email)
            .await?
        {
            return Ok(self.resend(&event, &existing, now).await);
        }
        if event.cancelled {
            return Err(RegistrationError::EventCancelled);
        }

        let phone = Some(request.phone.trim().to_string()).filter(|p| !p.is_empty());
        let new_registration = NewRegistration {
            event_id,
            join_token: generate_join_token(event_id, &email, now),
            email: email.clone(),
            name: request.name.trim().to_string(),
            phone,
            registered_at: now,
        };

        let registration = match self.stores.registrations.create(new_registration).await {
            Ok(registration) => registration,
            Err(StoreError::Duplicate) => {
                tracing::info!(
                    event_id = %event_id,
                    "Concurrent registration detected, falling back to resend"
                );
                let existing = self
                    .stores
                    .registrations
                    .find_by_event_and_email(event_id, &email)
                    .await?
                    .ok_or(StoreError::NotFound)?;
                return Ok(self.resend(&event, &existing, now).await);
            }
            Err(e) => {
                tracing::error!(event_id = %event_id, error = %e, "Failed to store registration");
                return Err(e.into());
            }
        };

        tracing::info!(
            event_id = %event_id,
            registration_id = %registration.id,
            "Registration created"
        );

        self.sync_contact(&event, &registration, &request.attributes)
            .await;

        let outcome = match event_datetime(&event, self.settings.timezone) {
            Some(event_instant) => {
                let outcome = self
                    .send_instant(&event, event_instant, &registration, now)
                    .await;
                self.schedule_upcoming(&event, event_instant, registration.id, now)
                    .await;
                outcome
            }
            None => {
                tracing::warn!(
                    event_id = %event_id,
                    "Event start is not determinable, no emails sent"
                );
                InstantOutcome::default()
            }
        };

        Ok(RegisterResponse {
            success: true,
            registration_id: registration.id,
            event_id,
            already_registered: false,
            instant_email: outcome.sent,
            email_error: outcome.error,
            message: "Registration successful".to_string(),
        })
    }

    async fn resend(
        &self,
        event: &Event,
        registration: &Registration,
        now: DateTime<Utc>,
    ) -> RegisterResponse {
        let outcome = match event_datetime(event, self.settings.timezone) {
            _ if event.cancelled => InstantOutcome::default(),
            Some(event_instant) => {
                self.send_instant(event, event_instant, registration, now)
                    .await
            }
            None => InstantOutcome::default(),
        };

        RegisterResponse {
            success: true,
            registration_id: registration.id,
            event_id: event.id,
            already_registered: true,
            instant_email: outcome.sent,
            email_error: outcome.error,
            message: "You are already registered for this event".to_string(),
        }
    }

    /// Sends the join-link email inside the join window, otherwise the
    /// confirmation. Guarded per (event, email) against double submissions.
    async fn send_instant(
        &self,
        event: &Event,
        event_instant: DateTime<Utc>,
        registration: &Registration,
        now: DateTime<Utc>,
    ) -> InstantOutcome {
        let email_type = if is_in_join_window(event_instant, now, &self.settings) {
            EmailType::Join
        } else {
            EmailType::Registration
        };

        let Some(template_id) = event.template_for(email_type, &self.settings) else {
            tracing::debug!(
                event_id = %event.id,
                email_type = %email_type,
                "No template configured for instant email"
            );
            return InstantOutcome::default();
        };

        let key = sha256_hex(&format!("{}:{}", event.id, registration.email));
        let ttl = Duration::seconds(self.settings.instant_email_guard_secs);
        match self.stores.send_guard.claim(&key, ttl, now).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(
                    event_id = %event.id,
                    registration_id = %registration.id,
                    "Instant email already sent moments ago, skipping"
                );
                return InstantOutcome::default();
            }
            Err(e) => {
                tracing::warn!(
                    event_id = %event.id,
                    registration_id = %registration.id,
                    error = %e,
                    "Failed to claim instant email guard"
                );
                return InstantOutcome {
                    sent: None,
                    error: Some(e.to_string()),
                };
            }
        }

        match self
            .dispatcher
            .deliver(event, event_instant, registration, email_type, template_id, None, now)
            .await
        {
            Ok(_) => InstantOutcome {
                sent: Some(email_type),
                error: None,
            },
            Err(e) => InstantOutcome {
                sent: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Schedules (or sends in grace) this registration's join and follow-up
    /// emails so a signup just before the join window opens is not missed.
    async fn schedule_upcoming(
        &self,
        event: &Event,
        event_instant: DateTime<Utc>,
        registration_id: Uuid,
        now: DateTime<Utc>,
    ) {
        if event.emails_cancelled {
            return;
        }

        for email_type in [EmailType::Join, EmailType::Followup] {
            let Some(template_id) = event.template_for(email_type, &self.settings) else {
                continue;
            };
            let scheduled_at = match decide(email_type, event_instant, now, &self.settings) {
                Some(SendDecision::Schedule(at)) => Some(at),
                Some(SendDecision::SendNow) => None,
                _ => continue,
            };

            let registration = match self.stores.registrations.find_by_id(registration_id).await
            {
                Ok(Some(r)) if r.needs(email_type) => r,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(
                        registration_id = %registration_id,
                        error = %e,
                        "Failed to reload registration"
                    );
                    return;
                }
            };

            if let Err(e) = self
                .dispatcher
                .deliver(
                    event,
                    event_instant,
                    &registration,
                    email_type,
                    template_id,
                    scheduled_at,
                    now,
                )
                .await
            {
                tracing::warn!(
                    registration_id = %registration_id,
                    email_type = %email_type,
                    error = %e,
                    "Proactive scheduling failed, leaving it to the batch"
                );
            }
        }
    }

    /// Upserts the CRM contact with the accumulated event attributes.
    async fn sync_contact(
        &self,
        event: &Event,
        registration: &Registration,
        extra: &BTreeMap<String, serde_json::Value>,
    ) {
        let existing = match self.transport.get_contact(&registration.email).await {
            Ok(contact) => contact,
            Err(e) => {
                tracing::warn!(
                    registration_id = %registration.id,
                    error = %e,
                    "Contact lookup failed, skipping CRM sync"
                );
                return;
            }
        };

        let attributes = Contact::merged_attributes(
            existing.as_ref(),
            &registration.name,
            registration.phone.as_deref(),
            extra,
            &event.title,
            &event.categories,
            self.settings.attribute_max_length,
        );
        let list_id = event.list_id_or_default(&self.settings);

        if let Err(e) = self
            .transport
            .add_contact_to_list(&registration.email, list_id, &attributes)
            .await
        {
            tracing::warn!(
                registration_id = %registration.id,
                list_id = ?list_id,
                error = %e,
                "Contact sync failed"
            );
        }
    }

    /// Resolves a join-link click to the event's join URL.
    pub async fn follow_join_link(&self, join_token: &str) -> Result<String, RegistrationError> {
        let registration = self
            .stores
            .registrations
            .find_by_token(join_token)
            .await?
            .ok_or(RegistrationError::InvalidJoinToken)?;
        let event = self
            .stores
            .events
            .find_event(registration.event_id)
            .await?
            .ok_or(RegistrationError::EventNotFound)?;
        if event.cancelled {
            return Err(RegistrationError::EventCancelled);
        }
        let url = event
            .join_url
            .filter(|u| !u.is_empty())
            .ok_or(RegistrationError::JoinUnavailable)?;

        if !registration.clicked_join_link {
            self.stores
                .registrations
                .mark_join_clicked(registration.id)
                .await?;
            tracing::info!(registration_id = %registration.id, "Join link clicked");
        }
        Ok(url)
    }
}
