//! Email sender selection
//!
//! Picks the [`EmailSender`] variant once at startup from the configured
//! [`ConfigSource`].

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::{
    domain::communication::{
        senders::{ConfigServiceEmailSender, EmailSender, SenderError, StaticEmailSender},
        Message, SendContext,
    },
    infrastructure::{
        config::{
            ConfigServiceConfig, ConfigSource, EmailSenderConfig, StaticConfigError,
            StaticSenderConfig,
        },
        config_service::ConfigServiceProxy,
        email::{SendGridMailerFactory, SenderPlatform},
    },
};

/// Errors that can occur when building an email sender
#[derive(Debug, Error)]
pub enum BuildSenderError {
    /// The static sender configuration is incomplete or invalid
    #[error(transparent)]
    StaticConfig(#[from] StaticConfigError),
}

/// The configured email sender
#[derive(Debug)]
pub enum EmailSenders {
    /// One provider configured from the environment
    Static(StaticEmailSender<SenderPlatform>),

    /// Per-namespace providers resolved through the config service
    ConfigService(ConfigServiceEmailSender<ConfigServiceProxy, SendGridMailerFactory>),
}

impl EmailSenders {
    /// Builds the sender selected by `config.config_source`.
    pub fn from_config(config: &EmailSenderConfig) -> Result<Self, BuildSenderError> {
        match config.config_source {
            ConfigSource::Static => Self::new_static(&config.static_sender),
            ConfigSource::ConfigService => Ok(Self::new_config_service(&config.config_service)),
        }
    }

    /// Builds a static sender, failing on any missing required variable.
    pub fn new_static(config: &StaticSenderConfig) -> Result<Self, BuildSenderError> {
        let settings = config.build()?;

        info!(platform = %settings.platform.platform_id(), "using static email sender");

        Ok(EmailSenders::Static(StaticEmailSender::new(
            settings.platform,
            settings.from_address,
            settings.from_name,
        )))
    }

    /// Builds a config service sender.
    pub fn new_config_service(config: &ConfigServiceConfig) -> Self {
        let proxy =
            ConfigServiceProxy::new(&config.config_service_host, config.configuration_ttl());

        info!(host = %proxy.host(), "using config service email sender");

        EmailSenders::ConfigService(ConfigServiceEmailSender::new(
            Arc::new(proxy),
            SendGridMailerFactory::new(&config.sendgrid_host),
            config.mailer_ttl(),
        ))
    }
}

#[async_trait]
impl EmailSender for EmailSenders {
    async fn send_email(&self, ctx: &SendContext, message: Message) -> Result<(), SenderError> {
        match self {
            EmailSenders::Static(sender) => sender.send_email(ctx, message).await,
            EmailSenders::ConfigService(sender) => sender.send_email(ctx, message).await,
        }
    }
}
