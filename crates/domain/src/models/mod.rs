//! Domain models for the event mailer.

pub mod contact;
pub mod dispatch;
pub mod email_type;
pub mod event;
pub mod registration;
pub mod scheduled_email;
pub mod settings;

pub use contact::{AttributeLog, Contact, EVENTS_ATTRIBUTE, EVENT_CATEGORY_ATTRIBUTE};
pub use dispatch::{EmailDispatch, NewEmailDispatch};
pub use email_type::EmailType;
pub use event::{CreateEventRequest, EmailTemplates, Event, NewEvent};
pub use registration::{
    generate_join_token, NewRegistration, RegisterRequest, RegisterResponse, Registration,
    RegistrationStatus,
};
pub use scheduled_email::{ScheduledEmail, ScheduledEmailStatus};
pub use settings::{EmailSettings, EmailTiming};
