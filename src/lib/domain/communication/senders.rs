//! Email senders
//!
//! An [`EmailSender`] decides which identity and which [`Mailer`] a message is
//! sent with. Two variants exist: [`StaticEmailSender`] with one fixed mailer,
//! and [`ConfigServiceEmailSender`] which resolves them per namespace.
//!
//! [`Mailer`]: crate::domain::communication::mailer::Mailer

mod config_service;
mod errors;
mod static_sender;

use async_trait::async_trait;

use crate::domain::communication::{Message, SendContext};

pub use config_service::ConfigServiceEmailSender;
pub use errors::SenderError;
pub use static_sender::StaticEmailSender;

/// Sends messages on behalf of callers
#[async_trait]
pub trait EmailSender: Send + Sync + 'static {
    /// Sends a message.
    ///
    /// # Arguments
    /// * `ctx` - The [`SendContext`] carrying the access token and cancellation.
    /// * `message` - The [`Message`] to send.
    ///
    /// # Returns
    /// A [`Result`] which is [`Ok`] once the provider accepted the message,
    /// or an [`Err`] containing a [`SenderError`].
    async fn send_email(&self, ctx: &SendContext, message: Message) -> Result<(), SenderError>;
}
