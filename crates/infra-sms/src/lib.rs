// Walkin Infrastructure - SMS Transports
// Implements: NotificationTransport

mod dry_run;
mod twilio;

pub use dry_run::LogTransport;
pub use twilio::{TwilioConfig, TwilioTransport, TWILIO_API_BASE};
