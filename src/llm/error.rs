//! Cortex completion failures

use std::time::Duration;
use thiserror::Error;

/// A completion call that failed to start or broke mid-stream
#[derive(Debug, Error)]
#[error("{message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
    /// Server-provided backoff from a `Retry-After` header
    pub retry_after: Option<Duration>,
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Network, message)
    }

    /// The service answered, but not in the shape Cortex documents
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Malformed, message)
    }

    /// Classify a non-success HTTP response. `detail` is the body's message.
    pub fn from_status(status: u16, detail: &str) -> Self {
        let kind = LlmErrorKind::from_status(status);
        let message = match kind {
            LlmErrorKind::Auth => format!("Authentication failed: {detail}"),
            LlmErrorKind::RateLimited => format!("Rate limited: {detail}"),
            LlmErrorKind::Rejected => format!("Request rejected ({status}): {detail}"),
            LlmErrorKind::Service => format!("Cortex service error ({status}): {detail}"),
            LlmErrorKind::Network | LlmErrorKind::Malformed => {
                format!("Unexpected HTTP {status}: {detail}")
            }
        };
        Self::new(kind, message)
    }

    pub fn with_retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Connect failures, timeouts, broken event streams
    Network,
    /// 429
    RateLimited,
    /// 5xx, or an error event inside the stream
    Service,
    /// 401, 403
    Auth,
    /// Other 4xx: unknown model, guardrail rejection, bad prompt
    Rejected,
    /// Unparseable body or event, or a status outside 4xx/5xx
    Malformed,
}

impl LlmErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth,
            429 => Self::RateLimited,
            400..=499 => Self::Rejected,
            500..=599 => Self::Service,
            _ => Self::Malformed,
        }
    }

    /// Whether asking the same question again could succeed.
    ///
    /// Turns are never retried automatically; this only picks the log level.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::RateLimited | Self::Service)
    }
}
