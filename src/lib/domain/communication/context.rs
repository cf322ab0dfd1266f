//! Per-call context for network operations

use std::{future::Future, time::Duration};

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a bounded operation did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    /// The internal timeout or the caller's deadline elapsed first
    #[error("operation timed out")]
    TimedOut,

    /// The caller cancelled the operation
    #[error("operation was cancelled")]
    Cancelled,
}

/// Caller-supplied state for a send: the service access token used to call the
/// config service, plus a cancellation token and optional deadline that bound
/// every network call made on the caller's behalf.
#[derive(Debug, Clone, Default)]
pub struct SendContext {
    access_token: Option<String>,
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl SendContext {
    /// Creates an empty context with no token, deadline or cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the service access token.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Attaches a cancellation token.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Attaches an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The service access token, if present and non-empty
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|token| !token.is_empty())
    }

    /// The cancellation token
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// The caller's deadline
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Runs `future` until it completes, `timeout` elapses, the caller's
    /// deadline passes, or the context is cancelled, whichever comes first.
    pub async fn run<F>(&self, timeout: Duration, future: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        // A timeout past the end of the clock leaves only the caller's deadline.
        let deadline = Instant::now()
            .checked_add(timeout)
            .into_iter()
            .chain(self.deadline)
            .min();

        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(Interrupted::Cancelled),
            _ = expired => Err(Interrupted::TimedOut),
            output = future => Ok(output),
        }
    }
}
