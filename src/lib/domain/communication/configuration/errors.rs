//! Config service errors

use thiserror::Error;

use crate::domain::communication::Interrupted;

/// Config service error code meaning "no sender configuration for namespace"
pub const CONFIGURATION_NOT_FOUND_CODE: i64 = 20008;

/// Errors that can occur when resolving a sender configuration
#[derive(Debug, Error)]
pub enum ConfigServiceError {
    /// No service access token in the [`SendContext`](crate::domain::communication::SendContext)
    #[error("no access token specified in the send context")]
    MissingAccessToken,

    /// The namespace has no sender configuration
    #[error("email sender configuration for namespace {0} is not found")]
    NotFound(String),

    /// The config service did not answer in time
    #[error("config service request timed out")]
    TimedOut,

    /// The caller cancelled the request
    #[error("config service request was cancelled")]
    Cancelled,

    /// The config service could not be reached
    #[error("failed to reach config service: {0}")]
    Transport(#[source] anyhow::Error),

    /// The config service answered with an unexpected status
    #[error("config service responded with {status}: {body}")]
    UnexpectedResponse {
        /// The HTTP status
        status: u16,

        /// The raw response body
        body: String,
    },

    /// The config service response body could not be parsed
    #[error("unable to parse email sender configuration: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl From<Interrupted> for ConfigServiceError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::TimedOut => ConfigServiceError::TimedOut,
            Interrupted::Cancelled => ConfigServiceError::Cancelled,
        }
    }
}
