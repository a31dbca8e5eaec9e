//! The nightly email batch.

use chrono::{NaiveTime, Utc};
use chrono_tz::Tz;
use domain::services::SchedulingEngine;
use tracing::info;

use super::scheduler::{Job, JobFrequency};
use crate::middleware::metrics::record_batch;

/// Runs the scheduling engine once a day at a fixed local time.
pub struct EmailScheduleJob {
    engine: SchedulingEngine,
    run_at: NaiveTime,
    timezone: Tz,
}

impl EmailScheduleJob {
    pub fn new(engine: SchedulingEngine, run_at: NaiveTime, timezone: Tz) -> Self {
        Self {
            engine,
            run_at,
            timezone,
        }
    }
}

#[async_trait::async_trait]
impl Job for EmailScheduleJob {
    fn name(&self) -> &'static str {
        "email_schedule"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::DailyAt(self.run_at, self.timezone)
    }

    async fn execute(&self) -> Result<(), String> {
        let report = self.engine.run(Utc::now()).await.map_err(|e| e.to_string())?;
        record_batch(&report);
        info!(
            events = report.events_processed,
            scheduled = report.scheduled,
            sent = report.sent,
            deferred = report.deferred,
            expired = report.expired,
            errors = report.errors,
            "Email batch finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::EmailSettings;
    use domain::services::{InMemoryStore, MockEmailTransport, Stores};
    use std::sync::Arc;

    fn job() -> EmailScheduleJob {
        let engine = SchedulingEngine::new(
            Stores::from_backend(Arc::new(InMemoryStore::new())),
            Arc::new(MockEmailTransport::new()),
            Arc::new(EmailSettings::default()),
        );
        EmailScheduleJob::new(
            engine,
            NaiveTime::from_hms_opt(3, 0, 0).unwrap(),
            chrono_tz::Europe::Vienna,
        )
    }

    #[test]
    fn test_job_runs_daily_at_configured_time() {
        let job = job();
        assert_eq!(job.name(), "email_schedule");
        assert_eq!(
            job.frequency(),
            JobFrequency::DailyAt(
                NaiveTime::from_hms_opt(3, 0, 0).unwrap(),
                chrono_tz::Europe::Vienna
            )
        );
    }

    #[tokio::test]
    async fn test_execute_with_no_events_succeeds() {
        assert!(job().execute().await.is_ok());
    }
}
