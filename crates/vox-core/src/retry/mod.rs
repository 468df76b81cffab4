//! Retry and backoff for API calls.
//!
//! This module encapsulates failure classification (rate limiting, server
//! errors, client errors, missing responses), backoff decisions honoring
//! `Retry-After`, and the loop that ties them together so every endpoint
//! shares one policy.

mod classify;
mod error;
mod policy;
mod retry_after;
mod run;

pub use classify::{classify, classify_http_status};
pub use error::{AttemptError, ClassifiedError, ExecuteError, HttpResponse, TransportFailure};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use retry_after::RetryAfter;
pub use run::{Attempt, AttemptOutcome, RetryExecutor};
