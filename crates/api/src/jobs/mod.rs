//! Background job scheduler and job implementations.

mod claim_cleanup;
mod email_schedule;
mod scheduler;

pub use claim_cleanup::SendClaimCleanupJob;
pub use email_schedule::EmailScheduleJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
