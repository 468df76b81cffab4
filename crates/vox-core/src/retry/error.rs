//! Failure types seen by the retry loop: what an attempt reports, what the
//! classifier produces, and what the executor finally returns.

use crate::retry::policy::ErrorKind;
use crate::retry::retry_after::RetryAfter;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;

/// Status, headers and body of a response, kept for classification and
/// header inspection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Header lines in arrival order (name, value).
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// First header value matching `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A failed network round trip, with or without a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// Nothing came back (DNS, connect, timeout, reset).
    NoResponse { message: String },
    /// The server answered with a non-success status.
    Response(HttpResponse),
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::NoResponse { message } => write!(f, "no response: {}", message),
            TransportFailure::Response(resp) => write!(f, "HTTP {}", resp.status),
        }
    }
}

impl std::error::Error for TransportFailure {}

/// Error returned by one invocation of the caller's operation.
///
/// Only `Transport` failures are classified and considered for retry;
/// anything else ends the retry loop immediately.
#[derive(Debug)]
pub enum AttemptError {
    Transport(TransportFailure),
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl AttemptError {
    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        AttemptError::Other(err.into())
    }
}

impl From<TransportFailure> for AttemptError {
    fn from(f: TransportFailure) -> Self {
        AttemptError::Transport(f)
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Transport(t) => write!(f, "{}", t),
            AttemptError::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AttemptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttemptError::Transport(t) => Some(t),
            AttemptError::Other(e) => Some(e.as_ref()),
        }
    }
}

/// Outcome of classifying a failed attempt.
///
/// `kind` depends only on `status` and on whether a response existed; `status`
/// is 0 when nothing came back.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} ({status}): {message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub status: u16,
    pub message: String,
    /// Response body decoded as a JSON object, when it was one.
    pub error_data: Option<Map<String, Value>>,
    pub response: Option<HttpResponse>,
}

impl ClassifiedError {
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Parsed `Retry-After` header, if the response carried a valid one.
    pub fn retry_after(&self) -> Option<RetryAfter> {
        self.response
            .as_ref()
            .and_then(|r| r.header("retry-after"))
            .and_then(RetryAfter::parse)
    }

    /// `Retry-After` expressed in whole seconds from now.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        self.retry_after_seconds_at(Utc::now())
    }

    pub fn retry_after_seconds_at(&self, now: DateTime<Utc>) -> Option<u64> {
        self.retry_after().map(|hint| hint.delay_from(now).as_secs())
    }
}

/// Final error from [`crate::retry::RetryExecutor`].
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    /// The last classified failure (non-retryable, or the budget ran out).
    #[error(transparent)]
    Classified(ClassifiedError),
    /// The operation failed with something that is not a transport failure.
    #[error("{label}: {source}")]
    Operation {
        label: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The abort token was set before the next attempt or during a wait.
    #[error("{label}: aborted after {attempts} attempt(s)")]
    Aborted { label: String, attempts: u32 },
}

impl ExecuteError {
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            ExecuteError::Classified(e) => Some(e),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.classified().map(|e| e.kind)
    }
}

impl From<ClassifiedError> for ExecuteError {
    fn from(e: ClassifiedError) -> Self {
        ExecuteError::Classified(e)
    }
}
