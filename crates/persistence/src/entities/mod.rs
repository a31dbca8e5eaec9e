//! Entity definitions (database row mappings).

pub mod email_dispatch;
pub mod event;
pub mod registration;
pub mod scheduled_email;

pub use email_dispatch::EmailDispatchEntity;
pub use event::EventEntity;
pub use registration::RegistrationEntity;
pub use scheduled_email::ScheduledEmailEntity;
