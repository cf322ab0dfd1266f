//! Sender with one fixed mailer and identity

use async_trait::async_trait;
use tracing::debug;

use crate::domain::communication::{mailer::Mailer, Message, SendContext};

use super::{EmailSender, SenderError};

/// Sends every message through the same mailer and sender identity.
///
/// The configured identity always wins over whatever the message carries.
#[derive(Debug)]
pub struct StaticEmailSender<M>
where
    M: Mailer,
{
    mailer: M,
    from_address: String,
    from_name: Option<String>,
}

impl<M> StaticEmailSender<M>
where
    M: Mailer,
{
    /// Creates a new static sender.
    pub fn new(mailer: M, from_address: impl Into<String>, from_name: Option<String>) -> Self {
        Self {
            mailer,
            from_address: from_address.into(),
            from_name,
        }
    }

    /// The underlying mailer
    pub fn mailer(&self) -> &M {
        &self.mailer
    }
}

#[async_trait]
impl<M> EmailSender for StaticEmailSender<M>
where
    M: Mailer,
{
    async fn send_email(&self, ctx: &SendContext, mut message: Message) -> Result<(), SenderError> {
        message.apply_template_defaults();
        message.from = Some(self.from_address.clone());
        message.from_name = self.from_name.clone();

        debug!(to = %message.to, "sending email with static sender");

        self.mailer.send(ctx, &message).await?;

        Ok(())
    }
}
