//! SendGrid mailer

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::domain::communication::{
    mailer::{Mailer, MailerError},
    Message, SendContext,
};

use super::DEFAULT_HTTP_TIMEOUT;

/// Default SendGrid API host
pub const DEFAULT_SENDGRID_API_HOST: &str = "https://api.sendgrid.com";

const SEND_EMAIL_PATH: &str = "/v3/mail/send";

#[derive(Debug, Serialize)]
struct Mail<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

impl<'a> Mail<'a> {
    fn address(email: &'a str) -> Self {
        Self { email, name: None }
    }
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<Mail<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc: Vec<Mail<'a>>,
    dynamic_template_data: &'a BTreeMap<String, Value>,
}

#[derive(Debug, Serialize)]
struct EmailPayload<'a> {
    subject: &'a str,
    from: Mail<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<Mail<'a>>,
    personalizations: Vec<Personalization<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    categories: Vec<&'a str>,
}

/// SendGrid v3 mail send client
#[derive(Debug, Clone)]
pub struct SendGridMailer {
    host: String,
    api_key: String,
    default_categories: Vec<String>,
    http_client: Client,
    timeout: Duration,
}

impl SendGridMailer {
    /// Creates a client for `api_key`.
    ///
    /// `default_categories` is a comma-separated list of categories attached
    /// to every message before the message's own categories.
    pub fn new(api_key: impl Into<String>, default_categories: Option<&str>) -> Self {
        let default_categories = default_categories
            .map(|categories| {
                categories
                    .split(',')
                    .map(str::trim)
                    .filter(|category| !category.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            host: DEFAULT_SENDGRID_API_HOST.to_string(),
            api_key: api_key.into(),
            default_categories,
            http_client: Client::new(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Overrides the API host.
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.trim_end_matches('/').to_string();
        self
    }

    /// Overrides the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn payload<'a>(&'a self, message: &'a Message) -> EmailPayload<'a> {
        let categories = self
            .default_categories
            .iter()
            .chain(message.categories.iter())
            .map(String::as_str)
            .collect();

        EmailPayload {
            subject: &message.subject,
            from: Mail {
                email: message.from.as_deref().unwrap_or_default(),
                name: message.from_name.as_deref().filter(|name| !name.is_empty()),
            },
            reply_to: message
                .reply_to
                .as_deref()
                .filter(|reply_to| !reply_to.is_empty())
                .map(Mail::address),
            personalizations: vec![Personalization {
                to: vec![Mail::address(&message.to)],
                cc: message
                    .carbon_copy
                    .iter()
                    .map(|cc| Mail::address(cc))
                    .collect(),
                dynamic_template_data: &message.merge_vars,
            }],
            template_id: message.template.as_deref().filter(|id| !id.is_empty()),
            categories,
        }
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, ctx: &SendContext, message: &Message) -> Result<(), MailerError> {
        let to = message.to.as_str();

        let body = serde_json::to_vec(&self.payload(message)).map_err(|source| {
            error!(to, "error serializing sendgrid payload: {}", source);
            MailerError::Serialization {
                to: to.to_string(),
                source,
            }
        })?;

        let request = async {
            let response = self
                .http_client
                .post(format!("{}{}", self.host, SEND_EMAIL_PATH))
                .bearer_auth(&self.api_key)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .timeout(self.timeout)
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;

            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = ctx
            .run(self.timeout, request)
            .await
            .map_err(|interrupted| {
                error!(to, "error sending email using sendgrid: {}", interrupted);
                MailerError::interrupted(to, interrupted)
            })?
            .map_err(|e| {
                error!(to, "error sending email using sendgrid: {}", e);
                if e.is_timeout() {
                    MailerError::TimedOut { to: to.to_string() }
                } else {
                    MailerError::transport(to, e)
                }
            })?;

        if status != StatusCode::ACCEPTED {
            error!(
                to,
                status = status.as_u16(),
                "error sending email using sendgrid: {}",
                body
            );
            return Err(MailerError::Rejected {
                to: to.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        debug!(to, "email accepted by sendgrid");

        Ok(())
    }
}
