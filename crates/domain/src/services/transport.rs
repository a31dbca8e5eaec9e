//! Outbound email provider seam.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::Contact;

/// One addressee of a transactional email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipient {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// File attached to an email, already base64 encoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub name: String,
    pub content: String,
}

/// A templated email ready for the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionalEmail {
    pub template_id: i64,
    pub to: Vec<Recipient>,
    pub params: BTreeMap<String, String>,
    /// Future delivery instant; `None` sends immediately.
    pub scheduled_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub attachment: Option<Attachment>,
}

/// Provider failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network failure or timeout.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-2xx response with the provider's message.
    #[error("Provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Email provider is not configured")]
    NotConfigured,
}

/// Transactional email and CRM contact operations.
///
/// Implementations do not retry; the daily batch re-evaluates instead.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Sends or schedules an email. Returns the provider message id.
    async fn schedule_email(&self, email: &TransactionalEmail) -> Result<String, TransportError>;

    /// Cancels a scheduled message that has not been delivered yet.
    async fn cancel_scheduled(&self, message_id: &str) -> Result<(), TransportError>;

    /// Fetches a contact; `None` if the provider does not know the address.
    async fn get_contact(&self, email: &str) -> Result<Option<Contact>, TransportError>;

    /// Creates or updates a contact and adds it to `list_id` when given.
    async fn add_contact_to_list(
        &self,
        email: &str,
        list_id: Option<i64>,
        attributes: &Map<String, Value>,
    ) -> Result<bool, TransportError>;
}

/// UTC ISO-8601 form the provider expects for `scheduledAt`.
pub fn format_scheduled_at(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Contact upsert captured by [`MockEmailTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct ContactUpsert {
    pub email: String,
    pub list_id: Option<i64>,
    pub attributes: Map<String, Value>,
}

/// Transport that records calls instead of talking to a provider.
#[derive(Debug, Default)]
pub struct MockEmailTransport {
    /// Whether to simulate provider failures.
    simulate_failure: AtomicBool,
    /// Recipients whose sends are rejected.
    failing_recipients: Mutex<HashSet<String>>,
    next_id: AtomicU64,
    sent: Mutex<Vec<TransactionalEmail>>,
    cancelled: Mutex<Vec<String>>,
    contacts: Mutex<HashMap<String, Contact>>,
    upserts: Mutex<Vec<ContactUpsert>>,
}

impl MockEmailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport whose every call fails.
    pub fn failing() -> Self {
        let transport = Self::default();
        transport.set_failing(true);
        transport
    }

    pub fn set_failing(&self, failing: bool) {
        self.simulate_failure.store(failing, Ordering::SeqCst);
    }

    /// Rejects sends addressed to `email`; other recipients go through.
    pub async fn fail_for_recipient(&self, email: &str) {
        self.failing_recipients
            .lock()
            .await
            .insert(email.to_string());
    }

    pub async fn sent(&self) -> Vec<TransactionalEmail> {
        self.sent.lock().await.clone()
    }

    pub async fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().await.clone()
    }

    pub async fn upserts(&self) -> Vec<ContactUpsert> {
        self.upserts.lock().await.clone()
    }

    pub async fn insert_contact(&self, contact: Contact) {
        self.contacts
            .lock()
            .await
            .insert(contact.email.clone(), contact);
    }

    fn check_failure(&self) -> Result<(), TransportError> {
        if self.simulate_failure.load(Ordering::SeqCst) {
            return Err(TransportError::Api {
                status: 500,
                message: "Simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EmailTransport for MockEmailTransport {
    async fn schedule_email(&self, email: &TransactionalEmail) -> Result<String, TransportError> {
        self.check_failure()?;
        let failing = self.failing_recipients.lock().await;
        if let Some(recipient) = email.to.iter().find(|r| failing.contains(&r.email)) {
            return Err(TransportError::Api {
                status: 400,
                message: format!("Simulated rejection for {}", recipient.email),
            });
        }
        drop(failing);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().await.push(email.clone());
        tracing::debug!(
            template_id = email.template_id,
            scheduled_at = ?email.scheduled_at.map(format_scheduled_at),
            "Mock: recorded transactional email"
        );
        Ok(format!("<mock-{}@smtp-relay>", id))
    }

    async fn cancel_scheduled(&self, message_id: &str) -> Result<(), TransportError> {
        self.check_failure()?;
        self.cancelled.lock().await.push(message_id.to_string());
        Ok(())
    }

    async fn get_contact(&self, email: &str) -> Result<Option<Contact>, TransportError> {
        self.check_failure()?;
        Ok(self.contacts.lock().await.get(email).cloned())
    }

    async fn add_contact_to_list(
        &self,
        email: &str,
        list_id: Option<i64>,
        attributes: &Map<String, Value>,
    ) -> Result<bool, TransportError> {
        self.check_failure()?;
        self.upserts.lock().await.push(ContactUpsert {
            email: email.to_string(),
            list_id,
            attributes: attributes.clone(),
        });

        let mut contacts = self.contacts.lock().await;
        let contact = contacts.entry(email.to_string()).or_insert_with(|| Contact {
            email: email.to_string(),
            ..Contact::default()
        });
        for (key, value) in attributes {
            contact.attributes.insert(key.clone(), value.clone());
        }
        if let Some(list_id) = list_id {
            if !contact.list_ids.contains(&list_id) {
                contact.list_ids.push(list_id);
            }
        }
        Ok(true)
    }
}
