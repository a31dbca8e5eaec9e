//! Send-time policy.
//!
//! Pure functions deciding when each lifecycle email is due, whether the
//! provider can accept it for advance scheduling yet, and how long a missed
//! send is still worth delivering late.

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;

use crate::models::{EmailSettings, EmailType, Event};

/// Absolute start instant of an event.
///
/// The local date and time (midnight when no time is set) are interpreted in
/// `tz`. Ambiguous local times resolve to the earlier instant; local times
/// skipped by a DST jump, and events without a date, yield `None`.
pub fn event_datetime(event: &Event, tz: Tz) -> Option<DateTime<Utc>> {
    let date = event.start_date?;
    let local = match event.start_time {
        Some(time) => date.and_time(time),
        None => date.and_hms_opt(0, 0, 0)?,
    };
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// When the given email type is due. The registration email has no send time.
pub fn calculate_send_time(
    email_type: EmailType,
    event_instant: DateTime<Utc>,
    settings: &EmailSettings,
) -> Option<DateTime<Utc>> {
    let offset = Duration::minutes(settings.timing.minutes_for(email_type)?);
    match email_type {
        EmailType::Registration => None,
        EmailType::Reminder | EmailType::Join => Some(event_instant - offset),
        EmailType::Followup => Some(event_instant + offset),
    }
}

/// `now < send_time <= now + ceiling`.
pub fn is_in_schedule_window(
    send_time: DateTime<Utc>,
    now: DateTime<Utc>,
    settings: &EmailSettings,
) -> bool {
    now < send_time && send_time <= now + Duration::hours(settings.max_schedule_hours)
}

/// Whether a send time that has already passed is still worth sending now.
///
/// Always false while the send time lies in the future.
pub fn is_in_grace_period(
    email_type: EmailType,
    send_time: DateTime<Utc>,
    event_instant: DateTime<Utc>,
    now: DateTime<Utc>,
    settings: &EmailSettings,
) -> bool {
    if send_time > now {
        return false;
    }
    match grace_end(email_type, event_instant, settings) {
        Some(end) => now < end,
        None => false,
    }
}

fn grace_end(
    email_type: EmailType,
    event_instant: DateTime<Utc>,
    settings: &EmailSettings,
) -> Option<DateTime<Utc>> {
    match email_type {
        EmailType::Registration => None,
        EmailType::Reminder => Some(event_instant),
        EmailType::Join => Some(event_instant + Duration::hours(settings.join_grace_hours)),
        EmailType::Followup => {
            Some(event_instant + Duration::days(settings.followup_grace_days))
        }
    }
}

/// `join_send_time <= now < event_instant`.
pub fn is_in_join_window(
    event_instant: DateTime<Utc>,
    now: DateTime<Utc>,
    settings: &EmailSettings,
) -> bool {
    match calculate_send_time(EmailType::Join, event_instant, settings) {
        Some(join_send) => join_send <= now && now < event_instant,
        None => false,
    }
}

/// Latest registration instant that still qualifies for a reminder.
pub fn reminder_cutoff(event_instant: DateTime<Utc>, settings: &EmailSettings) -> DateTime<Utc> {
    event_instant - Duration::hours(settings.min_registration_hours_for_reminder)
}

/// Whether a registration made at `registered_at` qualifies for a reminder.
pub fn meets_reminder_lead(
    registered_at: DateTime<Utc>,
    event_instant: DateTime<Utc>,
    settings: &EmailSettings,
) -> bool {
    registered_at <= reminder_cutoff(event_instant, settings)
}

/// What to do with one email type on one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendDecision {
    /// Hand to the provider for delivery at the given instant.
    Schedule(DateTime<Utc>),
    /// The window closed but grace is still open: deliver immediately.
    SendNow,
    /// Beyond the provider ceiling; re-evaluate on a later run.
    Defer(DateTime<Utc>),
    /// Past grace; never send.
    Skip,
}

/// Evaluates the policy for one scheduled email type at `now`.
///
/// Returns `None` for the registration email, which is only ever sent from
/// the signup path.
pub fn decide(
    email_type: EmailType,
    event_instant: DateTime<Utc>,
    now: DateTime<Utc>,
    settings: &EmailSettings,
) -> Option<SendDecision> {
    let send_time = calculate_send_time(email_type, event_instant, settings)?;
    let decision = if is_in_schedule_window(send_time, now, settings) {
        SendDecision::Schedule(send_time)
    } else if send_time > now {
        SendDecision::Defer(send_time)
    } else if is_in_grace_period(email_type, send_time, event_instant, now, settings) {
        SendDecision::SendNow
    } else {
        SendDecision::Skip
    };
    Some(decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmailTemplates;
    use chrono::{NaiveDate, NaiveTime};
    use uuid::Uuid;

    fn settings() -> EmailSettings {
        EmailSettings::default()
    }

    fn event_at(date: NaiveDate, time: Option<NaiveTime>) -> Event {
        Event {
            id: Uuid::new_v4(),
            title: "Webinar".to_string(),
            start_date: Some(date),
            start_time: time,
            duration_minutes: None,
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

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_event_datetime_in_configured_timezone() {
        let event = event_at(
            NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            NaiveTime::from_hms_opt(14, 0, 0),
        );
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        assert_eq!(
            event_datetime(&event, tz),
            Some(Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_event_datetime_defaults_to_midnight() {
        let event = event_at(NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(), None);
        assert_eq!(
            event_datetime(&event, chrono_tz::UTC),
            Some(Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_event_datetime_without_date_or_in_dst_gap() {
        let mut event = event_at(NaiveDate::from_ymd_opt(2026, 3, 29).unwrap(), None);
        event.start_date = None;
        assert_eq!(event_datetime(&event, chrono_tz::UTC), None);

        let gap = event_at(
            NaiveDate::from_ymd_opt(2026, 3, 29).unwrap(),
            NaiveTime::from_hms_opt(2, 30, 0),
        );
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        assert_eq!(event_datetime(&gap, tz), None);
    }

    #[test]
    fn test_send_times() {
        let t = instant();
        let s = settings();
        assert_eq!(
            calculate_send_time(EmailType::Reminder, t, &s),
            Some(t - Duration::hours(24))
        );
        assert_eq!(
            calculate_send_time(EmailType::Join, t, &s),
            Some(t - Duration::minutes(10))
        );
        assert_eq!(
            calculate_send_time(EmailType::Followup, t, &s),
            Some(t + Duration::hours(2))
        );
        assert_eq!(calculate_send_time(EmailType::Registration, t, &s), None);
    }

    #[test]
    fn test_schedule_window_bounds() {
        let now = instant();
        let s = settings();
        assert!(!is_in_schedule_window(now, now, &s));
        assert!(is_in_schedule_window(now + Duration::seconds(1), now, &s));
        assert!(is_in_schedule_window(now + Duration::hours(48), now, &s));
        assert!(!is_in_schedule_window(
            now + Duration::hours(48) + Duration::seconds(1),
            now,
            &s
        ));
        assert!(!is_in_schedule_window(now - Duration::minutes(1), now, &s));
    }

    #[test]
    fn test_grace_only_after_send_time() {
        let t = instant();
        let s = settings();
        let send = t - Duration::hours(24);
        assert!(!is_in_grace_period(EmailType::Reminder, send, t, send - Duration::seconds(1), &s));
        assert!(is_in_grace_period(EmailType::Reminder, send, t, send, &s));
    }

    #[test]
    fn test_grace_ends_per_type() {
        let t = instant();
        let s = settings();
        let reminder = t - Duration::hours(24);
        assert!(is_in_grace_period(EmailType::Reminder, reminder, t, t - Duration::seconds(1), &s));
        assert!(!is_in_grace_period(EmailType::Reminder, reminder, t, t, &s));

        let join = t - Duration::minutes(10);
        assert!(is_in_grace_period(EmailType::Join, join, t, t + Duration::minutes(59), &s));
        assert!(!is_in_grace_period(EmailType::Join, join, t, t + Duration::hours(1), &s));

        let followup = t + Duration::hours(2);
        assert!(is_in_grace_period(EmailType::Followup, followup, t, t + Duration::days(6), &s));
        assert!(!is_in_grace_period(EmailType::Followup, followup, t, t + Duration::days(7), &s));
    }

    #[test]
    fn test_reminder_inside_window_is_scheduled_not_sent() {
        let t = instant();
        assert_eq!(
            decide(EmailType::Reminder, t, t - Duration::hours(25), &settings()),
            Some(SendDecision::Schedule(t - Duration::hours(24)))
        );
    }

    #[test]
    fn test_missed_reminder_sends_immediately_before_event() {
        let t = instant();
        assert_eq!(
            decide(EmailType::Reminder, t, t - Duration::hours(23), &settings()),
            Some(SendDecision::SendNow)
        );
    }

    #[test]
    fn test_send_time_beyond_ceiling_is_deferred() {
        let now = instant();
        let t = now + Duration::hours(50) + Duration::hours(24);
        let send = t - Duration::hours(24);
        assert_eq!(send, now + Duration::hours(50));
        assert_eq!(
            decide(EmailType::Reminder, t, now, &settings()),
            Some(SendDecision::Defer(send))
        );
    }

    #[test]
    fn test_join_two_hours_after_start_is_skipped() {
        let t = instant();
        assert_eq!(
            decide(EmailType::Join, t, t + Duration::hours(2), &settings()),
            Some(SendDecision::Skip)
        );
    }

    #[test]
    fn test_followup_decisions_over_time() {
        let t = instant();
        let s = settings();
        assert_eq!(
            decide(EmailType::Followup, t, t - Duration::days(3), &s),
            Some(SendDecision::Defer(t + Duration::hours(2)))
        );
        assert_eq!(
            decide(EmailType::Followup, t, t, &s),
            Some(SendDecision::Schedule(t + Duration::hours(2)))
        );
        assert_eq!(
            decide(EmailType::Followup, t, t + Duration::days(1), &s),
            Some(SendDecision::SendNow)
        );
        assert_eq!(
            decide(EmailType::Followup, t, t + Duration::days(8), &s),
            Some(SendDecision::Skip)
        );
        assert_eq!(decide(EmailType::Registration, t, t, &s), None);
    }

    #[test]
    fn test_join_window() {
        let t = instant();
        let s = settings();
        assert!(!is_in_join_window(t, t - Duration::minutes(11), &s));
        assert!(is_in_join_window(t, t - Duration::minutes(10), &s));
        assert!(is_in_join_window(t, t - Duration::minutes(5), &s));
        assert!(!is_in_join_window(t, t, &s));
    }

    #[test]
    fn test_reminder_lead() {
        let t = instant();
        let s = settings();
        assert!(meets_reminder_lead(t - Duration::hours(24), t, &s));
        assert!(!meets_reminder_lead(t - Duration::hours(2), t, &s));
    }
}
