//! Query timing and connection pool gauges.

use metrics::{gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

const QUERY_DURATION: &str = "database_query_duration_seconds";

/// Measures one repository query from construction until [`record`].
///
/// Names follow `<verb>_<table>[_<qualifier>]`, e.g. `mark_join_email_sent`.
///
/// [`record`]: QueryTimer::record
pub struct QueryTimer {
    query_name: String,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: impl Into<String>) -> Self {
        Self {
            query_name: query_name.into(),
            start: Instant::now(),
        }
    }

    /// Records the elapsed time whether or not the query succeeded.
    pub fn record(self) {
        histogram!(QUERY_DURATION, "query" => self.query_name)
            .record(self.start.elapsed().as_secs_f64());
    }
}

/// Publishes pool occupancy; refreshed by the health probe.
pub fn record_pool_state(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();

    gauge!("database_connections_total").set(size as f64);
    gauge!("database_connections_idle").set(idle as f64);
    gauge!("database_connections_active").set(size.saturating_sub(idle) as f64);
}
