//! Registration domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::crypto::{random_alphanumeric, sha256_hex};
use shared::validation::{validate_email_address, validate_phone};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use super::email_type::EmailType;

/// One person registered for one event.
///
/// The (event_id, email) pair is unique. After creation only the four
/// sent-timestamps and `clicked_join_link` change, each at most once.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Registration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub registered_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub join_token: String,
    pub clicked_join_link: bool,
    pub registration_email_sent_at: Option<DateTime<Utc>>,
    pub reminder_email_sent_at: Option<DateTime<Utc>>,
    pub join_email_sent_at: Option<DateTime<Utc>>,
    pub followup_email_sent_at: Option<DateTime<Utc>>,
}

impl Registration {
    /// When the given email type was sent, if ever.
    pub fn sent_at(&self, email_type: EmailType) -> Option<DateTime<Utc>> {
        match email_type {
            EmailType::Registration => self.registration_email_sent_at,
            EmailType::Reminder => self.reminder_email_sent_at,
            EmailType::Join => self.join_email_sent_at,
            EmailType::Followup => self.followup_email_sent_at,
        }
    }

    /// Whether the given email type still has to go out.
    pub fn needs(&self, email_type: EmailType) -> bool {
        self.sent_at(email_type).is_none()
    }

    /// Sets the sent-timestamp unless one is already present.
    ///
    /// Returns true when this call performed the transition.
    pub fn mark_sent(&mut self, email_type: EmailType, at: DateTime<Utc>) -> bool {
        let slot = match email_type {
            EmailType::Registration => &mut self.registration_email_sent_at,
            EmailType::Reminder => &mut self.reminder_email_sent_at,
            EmailType::Join => &mut self.join_email_sent_at,
            EmailType::Followup => &mut self.followup_email_sent_at,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(at);
        true
    }

    /// Name used in greetings, falling back to the mailbox part of the address.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.email.split('@').next().unwrap_or(&self.email)
        } else {
            self.name.trim()
        }
    }
}

/// Data needed to insert a registration.
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub event_id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub join_token: String,
    pub registered_at: DateTime<Utc>,
}

/// Generates the token authenticating join-link clicks.
///
/// Hashes the event id, the address, random material and the creation time,
/// so tokens are unguessable and distinct per registration.
pub fn generate_join_token(event_id: Uuid, email: &str, now: DateTime<Utc>) -> String {
    let material = format!(
        "{}|{}|{}|{}",
        event_id,
        email,
        random_alphanumeric(32),
        now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp())
    );
    sha256_hex(&material)
}

/// Registration form submission.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RegisterRequest {
    #[validate(custom(function = "validate_email_address"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(max = 200, message = "Name is too long"))]
    pub name: String,

    #[serde(default)]
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,

    /// Extra CRM attributes to merge into the contact.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// Response to a registration submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RegisterResponse {
    pub success: bool,
    pub registration_id: Uuid,
    pub event_id: Uuid,
    pub already_registered: bool,
    /// Which instant email went out, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instant_email: Option<EmailType>,
    /// Soft failure of the instant email; the registration itself succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_error: Option<String>,
    pub message: String,
}

/// Per-type delivery state of one registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RegistrationStatus {
    pub registration: Registration,
    pub emails: BTreeMap<EmailType, Option<DateTime<Utc>>>,
}

impl From<Registration> for RegistrationStatus {
    fn from(registration: Registration) -> Self {
        let emails = EmailType::ALL
            .iter()
            .map(|t| (*t, registration.sent_at(*t)))
            .collect();
        Self {
            registration,
            emails,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registration() -> Registration {
        Registration {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            registered_at: Utc::now(),
            join_token: "token".to_string(),
            clicked_join_link: false,
            registration_email_sent_at: None,
            reminder_email_sent_at: None,
            join_email_sent_at: None,
            followup_email_sent_at: None,
        }
    }

    #[test]
    fn test_mark_sent_is_first_write_wins() {
        let mut registration = test_registration();
        let first = Utc::now();
        let later = first + chrono::Duration::minutes(5);

        assert!(registration.mark_sent(EmailType::Reminder, first));
        assert!(!registration.mark_sent(EmailType::Reminder, later));
        assert_eq!(registration.sent_at(EmailType::Reminder), Some(first));
        assert!(registration.needs(EmailType::Join));
    }

    #[test]
    fn test_display_name_falls_back_to_mailbox() {
        let mut registration = test_registration();
        assert_eq!(registration.display_name(), "Ada");
        registration.name = "  ".to_string();
        assert_eq!(registration.display_name(), "ada");
    }

    #[test]
    fn test_join_tokens_are_unique_hex() {
        let event_id = Uuid::new_v4();
        let now = Utc::now();
        let a = generate_join_token(event_id, "a@x.com", now);
        let b = generate_join_token(event_id, "a@x.com", now);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_register_request_validation() {
        let valid = RegisterRequest {
            email: "a@x.com".to_string(),
            name: "A".to_string(),
            phone: "+1 555 0100".to_string(),
            attributes: BTreeMap::new(),
        };
        assert!(valid.validate().is_ok());

        let invalid = RegisterRequest {
            email: "nope".to_string(),
            name: String::new(),
            phone: "abc".to_string(),
            attributes: BTreeMap::new(),
        };
        let errors = invalid.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
        assert!(errors.field_errors().contains_key("phone"));
    }

    #[test]
    fn test_generated_contacts_pass_validation() {
        use fake::faker::internet::en::SafeEmail;
        use fake::faker::name::en::Name;
        use fake::Fake;

        for _ in 0..20 {
            let request = RegisterRequest {
                email: SafeEmail().fake(),
                name: Name().fake(),
                phone: String::new(),
                attributes: BTreeMap::new(),
            };
            assert!(request.validate().is_ok(), "{:?}", request);
        }
    }

    #[test]
    fn test_join_token_not_serialized() {
        let json = serde_json::to_value(test_registration()).unwrap();
        assert!(json.get("join_token").is_none());
        assert_eq!(json["email"], "ada@example.com");
    }

    #[test]
    fn test_registration_status_lists_all_types() {
        let mut registration = test_registration();
        registration.mark_sent(EmailType::Registration, Utc::now());
        let status = RegistrationStatus::from(registration);
        assert_eq!(status.emails.len(), 4);
        assert!(status.emails[&EmailType::Registration].is_some());
        assert!(status.emails[&EmailType::Followup].is_none());
    }
}
