//! Mandrill HTTP API mailer

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

/// Default Mandrill API URL
pub const DEFAULT_MANDRILL_API_URL: &str = "https://mandrillapp.com";

const SEND_EMAIL_PATH: &str = "/api/1.0/messages/send-template.json";

#[derive(Debug, Serialize)]
struct MailTo<'a> {
    email: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize, PartialEq)]
struct MergeVar {
    name: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct TemplateContent {
    name: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct MandrillMessage<'a> {
    subject: &'a str,
    from_email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_name: Option<&'a str>,
    to: Vec<MailTo<'a>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<&'static str, &'a str>,
    global_merge_vars: Vec<MergeVar>,
}

#[derive(Debug, Serialize)]
struct EmailPayload<'a> {
    key: &'a str,
    template_name: &'a str,
    template_content: Vec<TemplateContent>,
    message: MandrillMessage<'a>,
    #[serde(rename = "async")]
    is_async: bool,
}

/// Renders merge variables the way Mandrill expects them: every value as text,
/// strings without their JSON quotes.
fn global_merge_vars(merge_vars: &BTreeMap<String, Value>) -> Vec<MergeVar> {
    merge_vars
        .iter()
        .map(|(name, value)| MergeVar {
            name: name.clone(),
            content: match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            },
        })
        .collect()
}

/// Mandrill `messages/send-template` client
#[derive(Debug, Clone)]
pub struct MandrillApiMailer {
    host: String,
    api_key: String,
    http_client: Client,
    timeout: Duration,
}

impl MandrillApiMailer {
    /// Creates a client for the Mandrill API at `api_url`.
    pub fn new(api_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            host: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http_client: Client::new(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Overrides the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn payload<'a>(&'a self, message: &'a Message) -> EmailPayload<'a> {
        let to = std::iter::once(MailTo {
            email: &message.to,
            kind: "to",
        })
        .chain(message.carbon_copy.iter().map(|cc| MailTo {
            email: cc,
            kind: "cc",
        }))
        .collect();

        let mut headers = BTreeMap::new();
        if let Some(reply_to) = message.reply_to.as_deref().filter(|r| !r.is_empty()) {
            headers.insert("Reply-To", reply_to);
        }

        EmailPayload {
            key: &self.api_key,
            template_name: message.template.as_deref().unwrap_or_default(),
            template_content: Vec::new(),
            message: MandrillMessage {
                subject: &message.subject,
                from_email: message.from.as_deref().unwrap_or_default(),
                from_name: message.from_name.as_deref().filter(|name| !name.is_empty()),
                to,
                headers,
                global_merge_vars: global_merge_vars(&message.merge_vars),
            },
            is_async: false,
        }
    }
}

#[async_trait]
impl Mailer for MandrillApiMailer {
    async fn send(&self, ctx: &SendContext, message: &Message) -> Result<(), MailerError> {
        let to = message.to.as_str();

        let body = serde_json::to_vec(&self.payload(message)).map_err(|source| {
            error!(to, "error serializing mandrill payload: {}", source);
            MailerError::Serialization {
                to: to.to_string(),
                source,
            }
        })?;

        let request = async {
            let response = self
                .http_client
                .post(format!("{}{}", self.host, SEND_EMAIL_PATH))
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
                error!(to, "error sending email using mandrill api: {}", interrupted);
                MailerError::interrupted(to, interrupted)
            })?
            .map_err(|e| {
                error!(to, "error sending email using mandrill api: {}", e);
                if e.is_timeout() {
                    MailerError::TimedOut { to: to.to_string() }
                } else {
                    MailerError::transport(to, e)
                }
            })?;

        if status != StatusCode::OK {
            error!(
                to,
                status = status.as_u16(),
                "error sending email using mandrill api: {}",
                body
            );
            return Err(MailerError::Rejected {
                to: to.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        debug!(to, "email accepted by mandrill api");

        Ok(())
    }
}
