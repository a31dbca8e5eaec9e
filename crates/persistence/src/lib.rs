//! Persistence layer for the event mailer backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations of the domain store traits
//! - Query timing metrics

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;

pub use repositories::pg_stores;
