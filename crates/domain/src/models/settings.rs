//! Global email settings consumed by the scheduling engine and registration service.

use chrono_tz::Tz;

use super::email_type::EmailType;
use super::event::EmailTemplates;

/// Minutes relative to the event start used to compute send times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmailTiming {
    /// Minutes before the event the reminder goes out.
    pub time_before_event: i64,
    /// Minutes before the event the join link goes out.
    pub time_join_event: i64,
    /// Minutes after the event the follow-up goes out.
    pub time_after_event: i64,
}

impl Default for EmailTiming {
    fn default() -> Self {
        Self {
            time_before_event: 1440,
            time_join_event: 10,
            time_after_event: 120,
        }
    }
}

impl EmailTiming {
    /// Offset in minutes for the given type; `None` for the registration email.
    pub fn minutes_for(&self, email_type: EmailType) -> Option<i64> {
        match email_type {
            EmailType::Registration => None,
            EmailType::Reminder => Some(self.time_before_event),
            EmailType::Join => Some(self.time_join_event),
            EmailType::Followup => Some(self.time_after_event),
        }
    }
}

/// Settings passed explicitly into the engine and service at construction.
#[derive(Debug, Clone)]
pub struct EmailSettings {
    /// Default template ids, used when an event carries no override.
    pub templates: EmailTemplates,
    pub timing: EmailTiming,
    /// CRM list used when an event has no target list.
    pub default_list_id: Option<i64>,
    /// Timezone in which event dates and times are interpreted.
    pub timezone: Tz,
    /// Provider ceiling for advance scheduling.
    pub max_schedule_hours: i64,
    pub join_grace_hours: i64,
    pub followup_grace_days: i64,
    /// Registrations made later than this before the event never get a reminder.
    pub min_registration_hours_for_reminder: i64,
    /// Lifetime of the duplicate-submission guard for instant emails.
    pub instant_email_guard_secs: i64,
    /// Maximum serialized length of accumulated CRM attributes.
    pub attribute_max_length: usize,
    /// Days before and after today covered by the daily batch.
    pub batch_window_days: i64,
    /// Public base URL used to build personalized join links.
    pub join_base_url: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            templates: EmailTemplates::default(),
            timing: EmailTiming::default(),
            default_list_id: None,
            timezone: chrono_tz::UTC,
            max_schedule_hours: 48,
            join_grace_hours: 1,
            followup_grace_days: 7,
            min_registration_hours_for_reminder: 24,
            instant_email_guard_secs: 30,
            attribute_max_length: 255,
            batch_window_days: 7,
            join_base_url: String::new(),
        }
    }
}

impl EmailSettings {
    /// Personalized join link for a registration token.
    pub fn join_url(&self, join_token: &str) -> String {
        format!("{}/join/{}", self.join_base_url.trim_end_matches('/'), join_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing() {
        let timing = EmailTiming::default();
        assert_eq!(timing.minutes_for(EmailType::Reminder), Some(1440));
        assert_eq!(timing.minutes_for(EmailType::Join), Some(10));
        assert_eq!(timing.minutes_for(EmailType::Followup), Some(120));
        assert_eq!(timing.minutes_for(EmailType::Registration), None);
    }

    #[test]
    fn test_default_settings_limits() {
        let settings = EmailSettings::default();
        assert_eq!(settings.max_schedule_hours, 48);
        assert_eq!(settings.join_grace_hours, 1);
        assert_eq!(settings.followup_grace_days, 7);
        assert_eq!(settings.min_registration_hours_for_reminder, 24);
        assert_eq!(settings.instant_email_guard_secs, 30);
    }

    #[test]
    fn test_join_url_trims_trailing_slash() {
        let settings = EmailSettings {
            join_base_url: "https://events.example.com/".to_string(),
            ..EmailSettings::default()
        };
        assert_eq!(
            settings.join_url("abc123"),
            "https://events.example.com/join/abc123"
        );
    }
}
