//! Mailer errors

use thiserror::Error;

use crate::domain::communication::Interrupted;

/// Errors returned by a [`Mailer`](super::Mailer)
#[derive(Debug, Error)]
pub enum MailerError {
    /// An address in the message could not be used
    #[error("invalid email address {address:?}")]
    InvalidAddress {
        /// The offending address
        address: String,
    },

    /// The provider payload could not be serialized
    #[error("failed to serialize email to {to}: {source}")]
    Serialization {
        /// The recipient
        to: String,

        /// The underlying error
        #[source]
        source: serde_json::Error,
    },

    /// The provider could not be reached
    #[error("failed to send email to {to}: {source}")]
    Transport {
        /// The recipient
        to: String,

        /// The underlying error
        #[source]
        source: anyhow::Error,
    },

    /// The provider call did not finish in time
    #[error("sending email to {to} timed out")]
    TimedOut {
        /// The recipient
        to: String,
    },

    /// The caller cancelled the provider call
    #[error("sending email to {to} was cancelled")]
    Cancelled {
        /// The recipient
        to: String,
    },

    /// The provider answered with something other than its success status
    #[error("provider rejected email to {to} with status {status}: {body}")]
    Rejected {
        /// The recipient
        to: String,

        /// The HTTP status, or SMTP reply code
        status: u16,

        /// The raw response body
        body: String,
    },

    /// The mailer could not be constructed
    #[error("invalid mailer configuration: {0}")]
    InvalidConfiguration(String),
}

impl MailerError {
    /// Maps an interrupted provider call to an error for recipient `to`.
    pub fn interrupted(to: &str, interrupted: Interrupted) -> Self {
        let to = to.to_string();

        match interrupted {
            Interrupted::TimedOut => MailerError::TimedOut { to },
            Interrupted::Cancelled => MailerError::Cancelled { to },
        }
    }

    /// Wraps a transport failure for recipient `to`.
    pub fn transport(to: &str, source: impl Into<anyhow::Error>) -> Self {
        MailerError::Transport {
            to: to.to_string(),
            source: source.into(),
        }
    }
}
