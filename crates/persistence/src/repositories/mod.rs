//! Repository implementations for database operations.
//!
//! Each repository exposes row-level queries returning `sqlx::Error` and
//! implements the matching domain store trait on top of them.

pub mod email_dispatch;
pub mod event;
pub mod registration;
pub mod scheduled_email;
pub mod send_claim;

pub use email_dispatch::EmailDispatchRepository;
pub use event::EventRepository;
pub use registration::RegistrationRepository;
pub use scheduled_email::ScheduledEmailRepository;
pub use send_claim::SendClaimRepository;

use domain::services::{StoreError, Stores};
use sqlx::PgPool;
use std::sync::Arc;

/// PostgreSQL unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Maps driver errors onto the domain storage taxonomy.
pub(crate) fn store_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::Duplicate;
        }
    }
    if matches!(e, sqlx::Error::RowNotFound) {
        return StoreError::NotFound;
    }
    tracing::error!(error = %e, "Database error");
    StoreError::Backend(e.to_string())
}

/// Builds every domain store seam on one connection pool.
pub fn pg_stores(pool: PgPool) -> Stores {
    Stores {
        events: Arc::new(EventRepository::new(pool.clone())),
        registrations: Arc::new(RegistrationRepository::new(pool.clone())),
        dispatches: Arc::new(EmailDispatchRepository::new(pool.clone())),
        scheduled_emails: Arc::new(ScheduledEmailRepository::new(pool.clone())),
        send_guard: Arc::new(SendClaimRepository::new(pool)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            store_error(sqlx::Error::RowNotFound),
            StoreError::NotFound
        ));
    }

    #[test]
    fn test_other_errors_map_to_backend() {
        let err = store_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Backend(msg) if msg.contains("timed out")));
    }
}
