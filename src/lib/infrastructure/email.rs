//! Email provider clients
//!
//! - [`SendGridMailer`]: SendGrid v3 dynamic templates over HTTP
//! - [`MandrillApiMailer`]: Mandrill `send-template` over HTTP
//! - [`MandrillSmtpMailer`]: Mandrill templates over SMTP

mod mandrill;
mod sendgrid;
mod smtp;

use std::{fmt, str::FromStr, time::Duration};

use async_trait::async_trait;

use crate::domain::communication::{
    mailer::{Mailer, MailerError, MailerFactory},
    Message, SendContext,
};

pub use mandrill::{MandrillApiMailer, DEFAULT_MANDRILL_API_URL};
pub use sendgrid::{SendGridMailer, DEFAULT_SENDGRID_API_HOST};
pub use smtp::{
    MandrillSmtpMailer, SmtpCredentials, DEFAULT_MANDRILL_SMTP_HOST, DEFAULT_MANDRILL_SMTP_PORT,
};

/// Timeout applied to every provider and config service HTTP call
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Supported email providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformId {
    /// SendGrid
    SendGrid,

    /// Mandrill (Mailchimp Transactional)
    Mandrill,
}

impl PlatformId {
    /// The identifier used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformId::SendGrid => "sendgrid",
            PlatformId::Mandrill => "mandrill",
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlatformId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sendgrid" => Ok(PlatformId::SendGrid),
            "mandrill" => Ok(PlatformId::Mandrill),
            other => Err(format!("{} email sender platform is not valid", other)),
        }
    }
}

/// One of the supported provider clients
#[derive(Debug)]
pub enum SenderPlatform {
    /// SendGrid over HTTP
    SendGrid(SendGridMailer),

    /// Mandrill over HTTP
    MandrillApi(MandrillApiMailer),

    /// Mandrill over SMTP
    MandrillSmtp(MandrillSmtpMailer),
}

impl SenderPlatform {
    /// The provider behind this client
    pub fn platform_id(&self) -> PlatformId {
        match self {
            SenderPlatform::SendGrid(_) => PlatformId::SendGrid,
            SenderPlatform::MandrillApi(_) | SenderPlatform::MandrillSmtp(_) => {
                PlatformId::Mandrill
            }
        }
    }
}

#[async_trait]
impl Mailer for SenderPlatform {
    async fn send(&self, ctx: &SendContext, message: &Message) -> Result<(), MailerError> {
        match self {
            SenderPlatform::SendGrid(mailer) => mailer.send(ctx, message).await,
            SenderPlatform::MandrillApi(mailer) => mailer.send(ctx, message).await,
            SenderPlatform::MandrillSmtp(mailer) => mailer.send(ctx, message).await,
        }
    }
}

/// Builds a SendGrid client per namespace api key.
///
/// Only SendGrid is reachable through the config service today. New providers
/// are added as [`SenderPlatform`] variants without touching the mailer cache.
#[derive(Debug, Clone)]
pub struct SendGridMailerFactory {
    host: String,
}

impl SendGridMailerFactory {
    /// Creates a factory for clients talking to `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl Default for SendGridMailerFactory {
    fn default() -> Self {
        Self::new(DEFAULT_SENDGRID_API_HOST)
    }
}

impl MailerFactory for SendGridMailerFactory {
    type Mailer = SenderPlatform;

    fn build(&self, api_key: &str) -> Result<SenderPlatform, MailerError> {
        if api_key.is_empty() {
            return Err(MailerError::InvalidConfiguration(
                "sendgrid api key is empty".to_string(),
            ));
        }

        Ok(SenderPlatform::SendGrid(
            SendGridMailer::new(api_key, None).with_host(&self.host),
        ))
    }
}
