//! Custom Axum extractors.

pub mod registration_payload;

pub use registration_payload::RegistrationPayload;
