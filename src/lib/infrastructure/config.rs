//! Environment configuration
//!
//! Everything is read once at startup through clap's `env` support. Static mode
//! validates eagerly: [`StaticSenderConfig::build`] fails on the first missing
//! required variable.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::infrastructure::email::{
    MandrillApiMailer, MandrillSmtpMailer, PlatformId, SendGridMailer, SenderPlatform,
    SmtpCredentials, DEFAULT_MANDRILL_API_URL, DEFAULT_MANDRILL_SMTP_HOST,
    DEFAULT_MANDRILL_SMTP_PORT, DEFAULT_SENDGRID_API_HOST,
};

/// Default config service host
pub const DEFAULT_CONFIG_SERVICE_HOST: &str = "http://justice-config-service/config";

/// Where sender configuration comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigSource {
    /// A single provider configured from the environment
    #[value(name = "static")]
    Static,

    /// Per-namespace configuration from the config service
    #[value(name = "configservice")]
    ConfigService,
}

/// Errors in the static sender configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StaticConfigError {
    /// A required environment variable is not set
    #[error("{0} environment variable is not set")]
    MissingVariable(&'static str),

    /// `APP_EMAIL_SENDER_NAME` names an unknown provider
    #[error("{0}")]
    InvalidPlatform(String),

    /// Neither Mandrill API nor SMTP credentials are complete.
    ///
    /// SMTP is only chosen when both `MANDRILL_USERNAME` and
    /// `MANDRILL_PASSWORD` are set. The default SMTP host and port alone are
    /// not enough.
    #[error("required mandrill environment variables are not set. For API key: MANDRILL_API_URL, MANDRILL_API_KEY. For SMTP: MANDRILL_SMTP_HOST, MANDRILL_SMTP_PORT, MANDRILL_USERNAME, MANDRILL_PASSWORD")]
    IncompleteMandrillConfig,

    /// The provider client could not be built
    #[error("invalid provider configuration: {0}")]
    InvalidProvider(String),
}

/// Static sender configuration
#[derive(Clone, Default, Debug, Parser)]
pub struct StaticSenderConfig {
    /// The provider to send with: `sendgrid` or `mandrill`
    #[clap(long, env = "APP_EMAIL_SENDER_NAME")]
    pub sender_platform: Option<String>,

    /// The sender address
    #[clap(long, env = "FROM_EMAIL_ADDRESS")]
    pub from_address: Option<String>,

    /// The sender display name
    #[clap(long, env = "FROM_EMAIL_NAME")]
    pub from_name: Option<String>,

    /// The SendGrid api key
    #[clap(long, env = "SENDGRID_API_KEY", hide_env_values = true)]
    pub sendgrid_api_key: Option<String>,

    /// Comma-separated categories attached to every SendGrid message
    #[clap(long, env = "SENDGRID_EMAIL_CATEGORIES")]
    pub sendgrid_email_categories: Option<String>,

    /// The SendGrid API host
    #[clap(long, env = "SENDGRID_API_HOST", default_value = DEFAULT_SENDGRID_API_HOST)]
    pub sendgrid_api_host: String,

    /// The Mandrill API URL
    #[clap(long, env = "MANDRILL_API_URL", default_value = DEFAULT_MANDRILL_API_URL)]
    pub mandrill_api_url: String,

    /// The Mandrill api key
    #[clap(long, env = "MANDRILL_API_KEY", hide_env_values = true)]
    pub mandrill_api_key: Option<String>,

    /// The Mandrill SMTP host
    #[clap(long, env = "MANDRILL_SMTP_HOST", default_value = DEFAULT_MANDRILL_SMTP_HOST)]
    pub mandrill_smtp_host: String,

    /// The Mandrill SMTP port
    #[clap(long, env = "MANDRILL_SMTP_PORT", default_value_t = DEFAULT_MANDRILL_SMTP_PORT)]
    pub mandrill_smtp_port: u16,

    /// The Mandrill SMTP username
    #[clap(long, env = "MANDRILL_USERNAME")]
    pub mandrill_username: Option<String>,

    /// The Mandrill SMTP password
    #[clap(long, env = "MANDRILL_PASSWORD", hide_env_values = true)]
    pub mandrill_password: Option<String>,
}

/// A validated static sender setup
#[derive(Debug)]
pub struct StaticSenderSettings {
    /// The provider client
    pub platform: SenderPlatform,

    /// The sender address every message is sent from
    pub from_address: String,

    /// The sender display name
    pub from_name: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

impl StaticSenderConfig {
    /// Validates the configuration and builds the provider client.
    ///
    /// Mandrill prefers the HTTP API when an api key is set and falls back to
    /// SMTP when a username and password are set.
    pub fn build(&self) -> Result<StaticSenderSettings, StaticConfigError> {
        let platform_id: PlatformId = non_empty(&self.sender_platform)
            .ok_or(StaticConfigError::MissingVariable("APP_EMAIL_SENDER_NAME"))?
            .parse()
            .map_err(StaticConfigError::InvalidPlatform)?;

        let from_address = non_empty(&self.from_address)
            .ok_or(StaticConfigError::MissingVariable("FROM_EMAIL_ADDRESS"))?
            .to_string();

        let platform = match platform_id {
            PlatformId::SendGrid => {
                let api_key = non_empty(&self.sendgrid_api_key)
                    .ok_or(StaticConfigError::MissingVariable("SENDGRID_API_KEY"))?;

                SenderPlatform::SendGrid(
                    SendGridMailer::new(api_key, non_empty(&self.sendgrid_email_categories))
                        .with_host(&self.sendgrid_api_host),
                )
            }
            PlatformId::Mandrill => self.mandrill_platform()?,
        };

        Ok(StaticSenderSettings {
            platform,
            from_address,
            from_name: non_empty(&self.from_name).map(str::to_string),
        })
    }

    fn mandrill_platform(&self) -> Result<SenderPlatform, StaticConfigError> {
        if let Some(api_key) = non_empty(&self.mandrill_api_key) {
            if !self.mandrill_api_url.is_empty() {
                return Ok(SenderPlatform::MandrillApi(MandrillApiMailer::new(
                    &self.mandrill_api_url,
                    api_key,
                )));
            }
        }

        match (
            non_empty(&self.mandrill_username),
            non_empty(&self.mandrill_password),
        ) {
            (Some(username), Some(password)) if !self.mandrill_smtp_host.is_empty() => {
                let mailer = MandrillSmtpMailer::new(SmtpCredentials {
                    host: self.mandrill_smtp_host.clone(),
                    port: self.mandrill_smtp_port,
                    username: username.to_string(),
                    password: password.to_string(),
                })
                .map_err(|e| StaticConfigError::InvalidProvider(e.to_string()))?;

                Ok(SenderPlatform::MandrillSmtp(mailer))
            }
            _ => Err(StaticConfigError::IncompleteMandrillConfig),
        }
    }
}

/// Config service sender configuration
#[derive(Clone, Debug, Parser)]
pub struct ConfigServiceConfig {
    /// The config service host
    #[clap(
        long,
        env = "APP_CONFIG_SERVICE_REMOTE_HOST",
        default_value = DEFAULT_CONFIG_SERVICE_HOST
    )]
    pub config_service_host: String,

    /// How long sender configurations are cached, in seconds
    #[clap(long, env = "APP_CONFIG_SERVICE_CACHE_EXPIRE", default_value_t = 60)]
    pub config_service_cache_expire: u64,

    /// How long provider clients are cached, in seconds
    #[clap(long, env = "APP_EMAIL_SENDER_CACHE_EXPIRE", default_value_t = 60)]
    pub email_sender_cache_expire: u64,

    /// The SendGrid API host used for namespace clients
    #[clap(
        long = "config-service-sendgrid-host",
        env = "SENDGRID_API_HOST",
        default_value = DEFAULT_SENDGRID_API_HOST
    )]
    pub sendgrid_host: String,
}

impl ConfigServiceConfig {
    /// Sender configuration cache TTL
    pub fn configuration_ttl(&self) -> Duration {
        Duration::from_secs(self.config_service_cache_expire)
    }

    /// Provider client cache TTL
    pub fn mailer_ttl(&self) -> Duration {
        Duration::from_secs(self.email_sender_cache_expire)
    }
}

/// Email sender configuration
#[derive(Clone, Debug, Parser)]
pub struct EmailSenderConfig {
    /// Where sender configuration comes from
    #[clap(long, env = "APP_EMAIL_CONFIG_SOURCE", value_enum, default_value = "static")]
    pub config_source: ConfigSource,

    /// Static mode configuration
    #[clap(flatten)]
    pub static_sender: StaticSenderConfig,

    /// Config service mode configuration
    #[clap(flatten)]
    pub config_service: ConfigServiceConfig,
}
