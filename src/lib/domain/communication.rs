//! Outbound email: message model, mailers, sender configuration and senders.

mod context;

pub mod configuration;
pub mod mailer;
pub mod message;
pub mod senders;

pub use context::{Interrupted, SendContext};
pub use message::Message;
