//! iCalendar attachment for the registration confirmation.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};

use super::transport::Attachment;
use crate::models::Event;

const DEFAULT_DURATION_MINUTES: i64 = 60;
const ICS_TIMESTAMP: &str = "%Y%m%dT%H%M%SZ";

/// Renders a single-VEVENT calendar for an event.
pub fn build_ics(
    event: &Event,
    event_instant: DateTime<Utc>,
    join_link: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let duration = event
        .duration_minutes
        .map(i64::from)
        .filter(|m| *m > 0)
        .unwrap_or(DEFAULT_DURATION_MINUTES);
    let end = event_instant + Duration::minutes(duration);

    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//Event Mailer//EN".to_string(),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}@event-mailer", event.id),
        format!("DTSTAMP:{}", now.format(ICS_TIMESTAMP)),
        format!("DTSTART:{}", event_instant.format(ICS_TIMESTAMP)),
        format!("DTEND:{}", end.format(ICS_TIMESTAMP)),
        format!("SUMMARY:{}", escape_text(&event.title)),
    ];
    if let Some(link) = join_link.filter(|l| !l.is_empty()) {
        lines.push(format!("URL:{}", link));
        lines.push(format!("DESCRIPTION:{}", escape_text(&format!("Join: {}", link))));
    }
    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());

    let mut ics = lines.join("\r\n");
    ics.push_str("\r\n");
    ics
}

/// The calendar as a base64 `event.ics` attachment.
pub fn ics_attachment(
    event: &Event,
    event_instant: DateTime<Utc>,
    join_link: Option<&str>,
    now: DateTime<Utc>,
) -> Attachment {
    Attachment {
        name: "event.ics".to_string(),
        content: STANDARD.encode(build_ics(event, event_instant, join_link, now)),
    }
}

fn escape_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace("\r\n", "\\n")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmailTemplates;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn event() -> Event {
        Event {
            id: Uuid::nil(),
            title: "Rust, Async; Basics".to_string(),
            start_date: None,
            start_time: None,
            duration_minutes: Some(90),
            join_url: None,
            categories: vec![],
            templates: EmailTemplates::default(),
            list_id: None,
            cancelled: false,
            emails_cancelled: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_ics_contains_utc_times_and_escaped_summary() {
        let start = Utc.with_ymd_and_hms(2026, 3, 10, 13, 0, 0).unwrap();
        let ics = build_ics(&event(), start, Some("https://x.test/join/abc"), start);
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.contains("DTSTART:20260310T130000Z\r\n"));
        assert!(ics.contains("DTEND:20260310T143000Z\r\n"));
        assert!(ics.contains("SUMMARY:Rust\\, Async\\; Basics\r\n"));
        assert!(ics.contains("URL:https://x.test/join/abc\r\n"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
    }

    #[test]
    fn test_attachment_is_base64() {
        let start = Utc.with_ymd_and_hms(2026, 3, 10, 13, 0, 0).unwrap();
        let attachment = ics_attachment(&event(), start, None, start);
        assert_eq!(attachment.name, "event.ics");
        let decoded = STANDARD.decode(&attachment.content).unwrap();
        let text = String::from_utf8(decoded).unwrap();
        assert!(text.contains("UID:00000000-0000-0000-0000-000000000000@event-mailer"));
        assert!(!text.contains("URL:"));
    }
}
