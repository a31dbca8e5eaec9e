//! Event domain model.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::email_type::EmailType;
use super::settings::EmailSettings;

/// Template ids per email type. `None` means "not configured".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmailTemplates {
    pub registration: Option<i64>,
    pub reminder: Option<i64>,
    pub join: Option<i64>,
    pub followup: Option<i64>,
}

impl EmailTemplates {
    pub fn get(&self, email_type: EmailType) -> Option<i64> {
        match email_type {
            EmailType::Registration => self.registration,
            EmailType::Reminder => self.reminder,
            EmailType::Join => self.join,
            EmailType::Followup => self.followup,
        }
    }
}

/// An event people register for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    /// Local start date in the configured timezone.
    pub start_date: Option<NaiveDate>,
    /// Local start time; midnight when unset.
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<i32>,
    /// Where the join-link redirect sends registrants.
    pub join_url: Option<String>,
    pub categories: Vec<String>,
    /// Per-event template overrides.
    pub templates: EmailTemplates,
    /// Per-event CRM target list.
    pub list_id: Option<i64>,
    /// Permanently cancelled: no email of any type goes out.
    pub cancelled: bool,
    /// Administrative switch that only pauses the batch scheduler.
    pub emails_cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Template for the given type, falling back to the global default.
    pub fn template_for(&self, email_type: EmailType, settings: &EmailSettings) -> Option<i64> {
        self.templates
            .get(email_type)
            .or_else(|| settings.templates.get(email_type))
    }

    /// CRM list for contacts of this event, falling back to the global default.
    pub fn list_id_or_default(&self, settings: &EmailSettings) -> Option<i64> {
        self.list_id.or(settings.default_list_id)
    }

    /// Whether the daily batch may act on this event.
    pub fn accepts_scheduled_emails(&self) -> bool {
        !self.cancelled && !self.emails_cancelled
    }
}

/// Data needed to insert an event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub start_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<i32>,
    pub join_url: Option<String>,
    pub categories: Vec<String>,
    pub templates: EmailTemplates,
    pub list_id: Option<i64>,
}

/// Request payload for creating an event through the admin API.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    pub start_date: NaiveDate,

    pub start_time: Option<NaiveTime>,

    #[validate(range(min = 1, max = 1440, message = "Duration must be 1-1440 minutes"))]
    pub duration_minutes: Option<i32>,

    #[validate(url(message = "Invalid join URL"))]
    pub join_url: Option<String>,

    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default)]
    pub templates: EmailTemplates,

    pub list_id: Option<i64>,
}

impl From<CreateEventRequest> for NewEvent {
    fn from(request: CreateEventRequest) -> Self {
        Self {
            title: request.title.trim().to_string(),
            start_date: Some(request.start_date),
            start_time: request.start_time,
            duration_minutes: request.duration_minutes,
            join_url: request.join_url,
            categories: request
                .categories
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            templates: request.templates,
            list_id: request.list_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_event() -> Event {
        Event {
            id: Uuid::new_v4(),
            title: "Webinar".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 3, 10),
            start_time: NaiveTime::from_hms_opt(14, 0, 0),
            duration_minutes: Some(60),
            join_url: Some("https://meet.example.com/room".to_string()),
            categories: vec!["Workshop".to_string()],
            templates: EmailTemplates {
                join: Some(77),
                ..EmailTemplates::default()
            },
            list_id: None,
            cancelled: false,
            emails_cancelled: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_template_override_wins_over_default() {
        let settings = EmailSettings {
            templates: EmailTemplates {
                registration: Some(1),
                reminder: Some(2),
                join: Some(3),
                followup: None,
            },
            ..EmailSettings::default()
        };
        let event = test_event();
        assert_eq!(event.template_for(EmailType::Join, &settings), Some(77));
        assert_eq!(event.template_for(EmailType::Reminder, &settings), Some(2));
        assert_eq!(event.template_for(EmailType::Followup, &settings), None);
    }

    #[test]
    fn test_list_id_falls_back_to_default() {
        let settings = EmailSettings {
            default_list_id: Some(9),
            ..EmailSettings::default()
        };
        let mut event = test_event();
        assert_eq!(event.list_id_or_default(&settings), Some(9));
        event.list_id = Some(4);
        assert_eq!(event.list_id_or_default(&settings), Some(4));
    }

    #[test]
    fn test_cancellation_flags_are_independent() {
        let mut event = test_event();
        assert!(event.accepts_scheduled_emails());
        event.emails_cancelled = true;
        assert!(!event.accepts_scheduled_emails());
        event.emails_cancelled = false;
        event.cancelled = true;
        assert!(!event.accepts_scheduled_emails());
    }

    #[test]
    fn test_create_event_request_validation() {
        let request = CreateEventRequest {
            title: "".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            start_time: None,
            duration_minutes: Some(0),
            join_url: Some("not a url".to_string()),
            categories: vec![],
            templates: EmailTemplates::default(),
            list_id: None,
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("duration_minutes"));
        assert!(fields.contains_key("join_url"));
    }

    #[test]
    fn test_new_event_trims_categories() {
        let request = CreateEventRequest {
            title: "  Launch ".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            start_time: None,
            duration_minutes: None,
            join_url: None,
            categories: vec![" Talk ".to_string(), "  ".to_string()],
            templates: EmailTemplates::default(),
            list_id: None,
        };
        let new_event = NewEvent::from(request);
        assert_eq!(new_event.title, "Launch");
        assert_eq!(new_event.categories, vec!["Talk".to_string()]);
    }
}
