//! The daily batch that schedules reminder, join and follow-up emails.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::dispatch::EmailDispatcher;
use super::store::{StoreError, Stores};
use super::timing::{decide, event_datetime, reminder_cutoff, SendDecision};
use super::transport::EmailTransport;
use crate::models::{EmailSettings, EmailType, Event};

/// Counters for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub events_processed: u32,
    /// Cancelled events, paused events and events without a start instant.
    pub events_skipped: u32,
    /// Emails handed to the provider with a future delivery time.
    pub scheduled: u32,
    /// Emails sent immediately inside a grace period.
    pub sent: u32,
    /// (event, type) pairs still beyond the provider ceiling.
    pub deferred: u32,
    /// (event, type) pairs whose grace period has elapsed.
    pub expired: u32,
    pub errors: u32,
}

/// Result of cancelling an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancellationReport {
    pub event_id: Uuid,
    pub scheduled_records_cancelled: u64,
    pub remote_cancelled: u32,
    pub remote_failed: u32,
}

/// Re-evaluates every event in the rolling window on each run.
///
/// Each send is per registration because join links are personalized. The
/// run is fail-soft: one failed registration, type or event never stops the
/// rest of the batch.
#[derive(Clone)]
pub struct SchedulingEngine {
    stores: Stores,
    dispatcher: EmailDispatcher,
    transport: Arc<dyn EmailTransport>,
    settings: Arc<EmailSettings>,
}

impl SchedulingEngine {
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

    /// Runs the batch for every event starting within the window around `now`.
    ///
    /// Only failing to load the event list aborts the run.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<BatchReport, StoreError> {
        let today = now.with_timezone(&self.settings.timezone).date_naive();
        let window = Duration::days(self.settings.batch_window_days);
        let events = self
            .stores
            .events
            .events_between(today - window, today + window)
            .await?;

        tracing::info!(events = events.len(), "Starting email schedule batch");

        let mut report = BatchReport::default();
        for event in events {
            if !event.accepts_scheduled_emails() {
                tracing::debug!(
                    event_id = %event.id,
                    cancelled = event.cancelled,
                    emails_cancelled = event.emails_cancelled,
                    "Skipping event with cancelled emails"
                );
                report.events_skipped += 1;
                continue;
            }

            let Some(event_instant) = event_datetime(&event, self.settings.timezone) else {
                tracing::warn!(
                    event_id = %event.id,
                    start_date = ?event.start_date,
                    start_time = ?event.start_time,
                    "Skipping event without a determinable start"
                );
                report.events_skipped += 1;
                continue;
            };

            report.events_processed += 1;
            for email_type in EmailType::SCHEDULED {
                let Some(template_id) = event.template_for(email_type, &self.settings) else {
                    continue;
                };
                if let Err(e) = self
                    .process_type(&event, event_instant, email_type, template_id, now, &mut report)
                    .await
                {
                    tracing::error!(
                        event_id = %event.id,
                        email_type = %email_type,
                        error = %e,
                        "Failed to process email type"
                    );
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            events_processed = report.events_processed,
            events_skipped = report.events_skipped,
            scheduled = report.scheduled,
            sent = report.sent,
            deferred = report.deferred,
            expired = report.expired,
            errors = report.errors,
            "Email schedule batch completed"
        );

        Ok(report)
    }

    async fn process_type(
        &self,
        event: &Event,
        event_instant: DateTime<Utc>,
        email_type: EmailType,
        template_id: i64,
        now: DateTime<Utc>,
        report: &mut BatchReport,
    ) -> Result<(), StoreError> {
        let Some(decision) = decide(email_type, event_instant, now, &self.settings) else {
            return Ok(());
        };

        match decision {
            SendDecision::Schedule(at) => {
                self.deliver_all(event, event_instant, email_type, template_id, Some(at), now, report)
                    .await
            }
            SendDecision::SendNow => {
                self.deliver_all(event, event_instant, email_type, template_id, None, now, report)
                    .await
            }
            SendDecision::Defer(at) => {
                let list_ids = event
                    .list_id_or_default(&self.settings)
                    .into_iter()
                    .collect();
                self.stores
                    .scheduled_emails
                    .upsert_pending(event.id, email_type, list_ids, at)
                    .await?;
                tracing::debug!(
                    event_id = %event.id,
                    email_type = %email_type,
                    send_time = %at,
                    "Send time beyond provider ceiling, deferred"
                );
                report.deferred += 1;
                Ok(())
            }
            SendDecision::Skip => {
                if let Some(pending) = self
                    .stores
                    .scheduled_emails
                    .find_pending(event.id, email_type)
                    .await?
                {
                    self.stores
                        .scheduled_emails
                        .mark_failed(pending.id, "grace period elapsed")
                        .await?;
                }
                report.expired += 1;
                Ok(())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn deliver_all(
        &self,
        event: &Event,
        event_instant: DateTime<Utc>,
        email_type: EmailType,
        template_id: i64,
        scheduled_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        report: &mut BatchReport,
    ) -> Result<(), StoreError> {
        let cutoff = match email_type {
            EmailType::Reminder => Some(reminder_cutoff(event_instant, &self.settings)),
            _ => None,
        };
        let recipients = self
            .stores
            .registrations
            .needing_email(event.id, email_type, cutoff)
            .await?;
        let pending = self
            .stores
            .scheduled_emails
            .find_pending(event.id, email_type)
            .await?;

        let mut first_message_id = None;
        let mut last_error = None;
        for registration in &recipients {
            match self
                .dispatcher
                .deliver(
                    event,
                    event_instant,
                    registration,
                    email_type,
                    template_id,
                    scheduled_at,
                    now,
                )
                .await
            {
                Ok(delivery) => {
                    if scheduled_at.is_some() {
                        report.scheduled += 1;
                    } else {
                        report.sent += 1;
                    }
                    first_message_id.get_or_insert(delivery.message_id);
                }
                Err(e) => {
                    report.errors += 1;
                    last_error = Some(e.to_string());
                }
            }
        }

        if let Some(pending) = pending {
            match (first_message_id, last_error) {
                (None, Some(error)) => {
                    self.stores
                        .scheduled_emails
                        .mark_failed(pending.id, &error)
                        .await?
                }
                (message_id, _) => {
                    self.stores
                        .scheduled_emails
                        .mark_scheduled(pending.id, message_id)
                        .await?
                }
            }
        }

        Ok(())
    }

    /// Permanently cancels an event.
    ///
    /// Pending audit records are cancelled and provider-side scheduled
    /// messages are cancelled best-effort; the batch skips the event from now
    /// on regardless of the remote outcome.
    pub async fn cancel_event(
        &self,
        event_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<CancellationReport, StoreError> {
        self.stores.events.set_cancelled(event_id, true).await?;
        let scheduled_records_cancelled = self
            .stores
            .scheduled_emails
            .cancel_for_event(event_id)
            .await?;

        let mut report = CancellationReport {
            event_id,
            scheduled_records_cancelled,
            remote_cancelled: 0,
            remote_failed: 0,
        };

        let dispatches = self.stores.dispatches.scheduled_after(event_id, now).await?;
        for dispatch in dispatches {
            match self.transport.cancel_scheduled(&dispatch.message_id).await {
                Ok(()) => {
                    report.remote_cancelled += 1;
                    if let Err(e) = self.stores.dispatches.mark_cancelled(dispatch.id, now).await {
                        tracing::warn!(
                            message_id = %dispatch.message_id,
                            error = %e,
                            "Failed to record remote cancellation"
                        );
                    }
                }
                Err(e) => {
                    report.remote_failed += 1;
                    tracing::warn!(
                        event_id = %event_id,
                        message_id = %dispatch.message_id,
                        error = %e,
                        "Failed to cancel scheduled email"
                    );
                }
            }
        }

        tracing::info!(
            event_id = %event_id,
            scheduled_records_cancelled = report.scheduled_records_cancelled,
            remote_cancelled = report.remote_cancelled,
            remote_failed = report.remote_failed,
            "Event cancelled"
        );

        Ok(report)
    }
}
