//! Domain services for the event mailer.
//!
//! The time policy, the per-registration dispatcher, the nightly scheduling
//! engine and the signup-time registration service, plus the storage and
//! transport seams they run against.

pub mod calendar;
pub mod dispatch;
pub mod memory;
pub mod registration;
pub mod scheduling;
pub mod store;
pub mod timing;
pub mod transport;

pub use dispatch::{Delivery, DeliveryError, EmailDispatcher};
pub use memory::InMemoryStore;
pub use registration::{RegistrationError, RegistrationService};
pub use scheduling::{BatchReport, CancellationReport, SchedulingEngine};
pub use store::{
    DispatchLog, EventCatalog, RegistrationStore, ScheduledEmailStore, SendGuard, StoreError,
    Stores,
};
pub use timing::SendDecision;
pub use transport::{
    format_scheduled_at, Attachment, ContactUpsert, EmailTransport, MockEmailTransport, Recipient,
    TransactionalEmail, TransportError,
};
