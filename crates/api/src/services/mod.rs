//! External service integrations.

pub mod brevo;

pub use brevo::BrevoClient;
