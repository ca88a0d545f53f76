//! Notification composition and delivery.
//!
//! Sinks are selected at construction time: [`SendmailSink`] delivers through
//! a local MTA, [`SimulatorSink`] records deliveries to a file or the log,
//! and [`MemorySink`] keeps them in memory.

mod error;
mod message;
mod sendmail;
mod sink;

pub use error::DeliveryError;
pub use message::{Notification, NOTIFICATION_SUBJECT};
pub use sendmail::{compose_mail, SendmailSink, DEFAULT_SENDMAIL};
pub use sink::{Delivery, MemorySink, NotificationSink, SimulatorSink};
