//! Sender errors

use thiserror::Error;

use crate::domain::communication::{configuration::ConfigServiceError, mailer::MailerError};

/// Errors that can occur when sending a message
#[derive(Debug, Error)]
pub enum SenderError {
    /// The message has no namespace
    #[error("namespace is not specified")]
    NamespaceNotSpecified,

    /// The namespace has no sender configuration
    #[error("email sender configuration is not found")]
    ConfigurationNotFound,

    /// The namespace's sender domain is not authenticated yet
    #[error("email sender configuration is not valid")]
    ConfigurationNotValid,

    /// No mailer could be built for the namespace's configuration
    #[error("email sender platform does not exist")]
    SenderPlatformNotExist,

    /// The sender configuration could not be resolved
    #[error(transparent)]
    ConfigService(#[from] ConfigServiceError),

    /// The mailer failed to deliver the message
    #[error(transparent)]
    Mailer(#[from] MailerError),
}
