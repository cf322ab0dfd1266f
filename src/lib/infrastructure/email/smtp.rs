//! Mandrill SMTP mailer
//!
//! Mandrill renders the template server side, so the submitted message is a
//! header block only: the template and merge variables travel in the
//! `X-MC-Template` and `X-MC-MergeVars` headers.

use std::fmt;

use async_trait::async_trait;
use lettre::{
    address::Envelope,
    message::Mailbox,
    transport::smtp::authentication::{Credentials, Mechanism},
    Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use tracing::{debug, error};

use crate::domain::communication::{
    mailer::{Mailer, MailerError},
    Message, SendContext,
};

use super::DEFAULT_HTTP_TIMEOUT;

/// Default Mandrill SMTP host
pub const DEFAULT_MANDRILL_SMTP_HOST: &str = "smtp.mandrillapp.com";

/// Default Mandrill SMTP port
pub const DEFAULT_MANDRILL_SMTP_PORT: u16 = 587;

/// SMTP connection details
#[derive(Clone)]
pub struct SmtpCredentials {
    /// The SMTP host
    pub host: String,

    /// The SMTP port
    pub port: u16,

    /// The SMTP username
    pub username: String,

    /// The SMTP password
    pub password: String,
}

impl fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// Mandrill SMTP mailer
pub struct MandrillSmtpMailer {
    host: String,
    port: u16,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl MandrillSmtpMailer {
    /// Creates a mailer submitting over STARTTLS with PLAIN authentication.
    pub fn new(credentials: SmtpCredentials) -> Result<Self, MailerError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&credentials.host)
            .map_err(|e| MailerError::InvalidConfiguration(e.to_string()))?
            .port(credentials.port)
            .credentials(Credentials::new(
                credentials.username.clone(),
                credentials.password.clone(),
            ))
            .authentication(vec![Mechanism::Plain])
            .timeout(Some(DEFAULT_HTTP_TIMEOUT))
            .build();

        Ok(Self {
            host: credentials.host,
            port: credentials.port,
            transport,
        })
    }

    /// The SMTP server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for MandrillSmtpMailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MandrillSmtpMailer")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

fn parse_address(address: &str) -> Result<Address, MailerError> {
    address.parse().map_err(|_| MailerError::InvalidAddress {
        address: address.to_string(),
    })
}

/// Header values must stay on one line.
fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// The addresses and raw header block of a message
#[derive(Debug)]
struct SmtpSubmission {
    envelope: Envelope,
    raw: String,
}

fn build_submission(message: &Message) -> Result<SmtpSubmission, MailerError> {
    let from_address = parse_address(message.from.as_deref().unwrap_or_default())?;
    let to_address = parse_address(&message.to)?;

    let from_name = message
        .from_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .map(single_line);
    let from = Mailbox::new(from_name, from_address.clone());
    let to = Mailbox::new(None, to_address.clone());

    let mut headers = vec![
        ("Return-Path", from_address.to_string()),
        ("From", from.to_string()),
        ("To", to.to_string()),
    ];

    if !message.subject.is_empty() {
        headers.push(("Subject", single_line(&message.subject)));
    }

    headers.extend([
        ("MIME-Version", "1.0".to_string()),
        ("Content-Type", "text/plain; charset=\"utf-8\"".to_string()),
        ("Content-Transfer-Encoding", "base64".to_string()),
    ]);

    if let Some(template) = message.template.as_deref().filter(|t| !t.is_empty()) {
        let merge_vars = serde_json::to_string(&message.merge_vars).map_err(|source| {
            MailerError::Serialization {
                to: message.to.clone(),
                source,
            }
        })?;

        headers.push(("X-MC-Template", single_line(template)));
        headers.push(("X-MC-MergeVars", merge_vars));
    }

    if let Some(reply_to) = message.reply_to.as_deref().filter(|r| !r.is_empty()) {
        headers.push(("Reply-To", parse_address(reply_to)?.to_string()));
    }

    let mut raw = headers
        .iter()
        .map(|(name, value)| format!("{}: {}\r\n", name, value))
        .collect::<String>();
    raw.push_str("\r\n");

    let envelope = Envelope::new(Some(from_address), vec![to_address])
        .map_err(|e| MailerError::transport(&message.to, e))?;

    Ok(SmtpSubmission { envelope, raw })
}

#[async_trait]
impl Mailer for MandrillSmtpMailer {
    async fn send(&self, ctx: &SendContext, message: &Message) -> Result<(), MailerError> {
        let to = message.to.as_str();

        let submission = build_submission(message).map_err(|e| {
            error!(to, "error building mandrill smtp message: {}", e);
            e
        })?;

        let result = ctx
            .run(
                DEFAULT_HTTP_TIMEOUT,
                self.transport
                    .send_raw(&submission.envelope, submission.raw.as_bytes()),
            )
            .await
            .map_err(|interrupted| {
                error!(to, "error sending email using mandrill smtp: {}", interrupted);
                MailerError::interrupted(to, interrupted)
            })?;

        match result {
            Ok(_) => {
                debug!(to, server = %self.address(), "email accepted by mandrill smtp");
                Ok(())
            }
            Err(e) => {
                error!(to, "error sending email using mandrill smtp: {}", e);
                match e.status() {
                    Some(code) => Err(MailerError::Rejected {
                        to: to.to_string(),
                        status: code.to_string().parse().unwrap_or_default(),
                        body: e.to_string(),
                    }),
                    None if e.is_timeout() => Err(MailerError::TimedOut { to: to.to_string() }),
                    None => Err(MailerError::transport(to, e)),
                }
            }
        }
    }
}
