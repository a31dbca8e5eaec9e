//! Domain layer for the event mailer backend.
//!
//! This crate contains:
//! - Domain models (Event, Registration, ScheduledEmail, EmailSettings)
//! - The send-time policy and the email scheduling state machine
//! - Store and transport traits with in-memory implementations

pub mod models;
pub mod services;
