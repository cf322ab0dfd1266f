//! Mailer module
//!
//! A [`Mailer`] delivers one [`Message`] through one email provider.

mod errors;

use async_trait::async_trait;

#[cfg(test)]
use mockall::mock;

use crate::domain::communication::{Message, SendContext};

pub use errors::MailerError;

/// Email provider client
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    /// Sends a message.
    ///
    /// # Arguments
    /// * `ctx` - The [`SendContext`] bounding the provider call.
    /// * `message` - The [`Message`] to send, with defaults already applied.
    ///
    /// # Returns
    /// A [`Result`] which is [`Ok`] when the provider accepted the message,
    /// or an [`Err`] containing a [`MailerError`] otherwise.
    async fn send(&self, ctx: &SendContext, message: &Message) -> Result<(), MailerError>;
}

/// Builds a [`Mailer`] bound to one provider api key
pub trait MailerFactory: Send + Sync + 'static {
    /// The mailer type produced by this factory
    type Mailer: Mailer;

    /// Builds a mailer for `api_key`.
    fn build(&self, api_key: &str) -> Result<Self::Mailer, MailerError>;
}

#[cfg(test)]
mock! {
    pub Mailer {}

    #[async_trait]
    impl Mailer for Mailer {
        async fn send(&self, ctx: &SendContext, message: &Message) -> Result<(), MailerError>;
    }
}

#[cfg(test)]
mock! {
    pub MailerFactory {}

    impl MailerFactory for MailerFactory {
        type Mailer = MockMailer;

        fn build(&self, api_key: &str) -> Result<MockMailer, MailerError>;
    }
}
