//! Purges expired instant-email send claims.

use chrono::Utc;
use domain::services::SendGuard;
use std::sync::Arc;
use tracing::debug;

use super::scheduler::{Job, JobFrequency};

pub struct SendClaimCleanupJob {
    guard: Arc<dyn SendGuard>,
    interval_minutes: u64,
}

impl SendClaimCleanupJob {
    pub fn new(guard: Arc<dyn SendGuard>, interval_minutes: u64) -> Self {
        Self {
            guard,
            interval_minutes: interval_minutes.max(1),
        }
    }
}

#[async_trait::async_trait]
impl Job for SendClaimCleanupJob {
    fn name(&self) -> &'static str {
        "send_claim_cleanup"
    }

    fn frequency(&self) -> JobFrequency {
        if self.interval_minutes == 60 {
            JobFrequency::Hourly
        } else {
            JobFrequency::Minutes(self.interval_minutes)
        }
    }

    async fn execute(&self) -> Result<(), String> {
        let purged = self
            .guard
            .purge_expired(Utc::now())
            .await
            .map_err(|e| e.to_string())?;
        debug!(purged = purged, "Expired send claims purged");
        Ok(())
    }
}
