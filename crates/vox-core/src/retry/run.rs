//! Retry loop: run an operation until success, a non-retryable failure, or
//! the attempt budget runs out.

use super::classify;
use super::error::{AttemptError, ExecuteError};
use super::policy::{RetryDecision, RetryPolicy};
use crate::http_log::HttpLogger;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest single sleep while an abort token is being watched.
const ABORT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure,
}

/// One invocation of the operation within a retry sequence.
#[derive(Debug, Clone, Copy)]
pub struct Attempt {
    number: u32,
    started: Instant,
    /// Set once the operation returns; `elapsed` is frozen at that point.
    finished: Option<(AttemptOutcome, Duration)>,
}

impl Attempt {
    fn start(number: u32) -> Self {
        Self {
            number,
            started: Instant::now(),
            finished: None,
        }
    }

    fn finish(&mut self, outcome: AttemptOutcome) {
        if self.finished.is_none() {
            self.finished = Some((outcome, self.started.elapsed()));
        }
    }

    /// 1-based attempt number.
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// `None` while the operation is still running.
    pub fn outcome(&self) -> Option<AttemptOutcome> {
        self.finished.map(|(outcome, _)| outcome)
    }

    pub fn elapsed(&self) -> Duration {
        match self.finished {
            Some((_, elapsed)) => elapsed,
            None => self.started.elapsed(),
        }
    }
}

/// Runs caller-supplied operations under a [`RetryPolicy`], logging through an
/// [`HttpLogger`].
///
/// Holds no per-call state, so one executor can be shared by concurrent callers.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    logger: HttpLogger,
    abort: Option<Arc<AtomicBool>>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, logger: HttpLogger) -> Self {
        Self {
            policy,
            logger,
            abort: None,
        }
    }

    /// Stop before the next attempt (or mid-wait) once `token` is set.
    pub fn with_abort_token(mut self, token: Arc<AtomicBool>) -> Self {
        self.abort = Some(token);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn logger(&self) -> &HttpLogger {
        &self.logger
    }

    /// Runs `op` until it succeeds or the policy says stop, sleeping the
    /// current thread between attempts.
    ///
    /// Call from `spawn_blocking` if used from async code, or use
    /// [`RetryExecutor::execute_async`].
    pub fn execute<T, F>(&self, label: &str, mut op: F) -> Result<T, ExecuteError>
    where
        F: FnMut() -> Result<T, AttemptError>,
    {
        let mut number = 1u32;
        loop {
            self.check_abort(label, number - 1)?;
            let mut attempt = Attempt::start(number);
            match op() {
                Ok(value) => {
                    attempt.finish(AttemptOutcome::Success);
                    self.logger.attempt_succeeded(label, attempt.number(), attempt.elapsed());
                    return Ok(value);
                }
                Err(e) => {
                    attempt.finish(AttemptOutcome::Failure);
                    let delay = self.after_failure(label, &attempt, e)?;
                    self.wait_blocking(label, number, delay)?;
                    number += 1;
                }
            }
        }
    }

    /// Same state machine as [`RetryExecutor::execute`], awaiting a tokio timer
    /// between attempts instead of blocking the thread.
    pub async fn execute_async<T, F, Fut>(
        &self,
        label: &str,
        mut op: F,
    ) -> Result<T, ExecuteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let mut number = 1u32;
        loop {
            self.check_abort(label, number - 1)?;
            let mut attempt = Attempt::start(number);
            match op().await {
                Ok(value) => {
                    attempt.finish(AttemptOutcome::Success);
                    self.logger.attempt_succeeded(label, attempt.number(), attempt.elapsed());
                    return Ok(value);
                }
                Err(e) => {
                    attempt.finish(AttemptOutcome::Failure);
                    let delay = self.after_failure(label, &attempt, e)?;
                    self.wait_async(label, number, delay).await?;
                    number += 1;
                }
            }
        }
    }

    /// Classifies a failure and returns the delay before the next attempt, or
    /// the terminal error.
    fn after_failure(
        &self,
        label: &str,
        attempt: &Attempt,
        err: AttemptError,
    ) -> Result<Duration, ExecuteError> {
        let failure = match err {
            AttemptError::Transport(f) => f,
            AttemptError::Other(source) => {
                self.logger.operation_failed(label, attempt.number(), source.as_ref());
                return Err(ExecuteError::Operation {
                    label: label.to_string(),
                    source,
                });
            }
        };

        let classified = classify::classify(&failure);
        match self.policy.decide(attempt.number(), &classified) {
            RetryDecision::RetryAfter(delay) => {
                self.logger.retry_attempted(
                    label,
                    attempt.number(),
                    self.policy.max_attempts(),
                    &classified,
                    delay,
                );
                Ok(delay)
            }
            RetryDecision::NoRetry => {
                if self.policy.should_retry(&classified) {
                    self.logger.retry_exhausted(label, attempt.number(), &classified);
                } else {
                    self.logger.not_retryable(label, attempt.number(), &classified);
                }
                Err(ExecuteError::Classified(classified))
            }
        }
    }

    fn check_abort(&self, label: &str, attempts: u32) -> Result<(), ExecuteError> {
        match &self.abort {
            Some(token) if token.load(Ordering::Relaxed) => {
                self.logger.aborted(label, attempts);
                Err(ExecuteError::Aborted {
                    label: label.to_string(),
                    attempts,
                })
            }
            _ => Ok(()),
        }
    }

    fn wait_blocking(
        &self,
        label: &str,
        attempts: u32,
        delay: Duration,
    ) -> Result<(), ExecuteError> {
        if self.abort.is_none() {
            std::thread::sleep(delay);
            return Ok(());
        }
        let deadline = Instant::now() + delay;
        loop {
            self.check_abort(label, attempts)?;
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Ok(());
            }
            std::thread::sleep(left.min(ABORT_POLL_INTERVAL));
        }
    }

    async fn wait_async(
        &self,
        label: &str,
        attempts: u32,
        delay: Duration,
    ) -> Result<(), ExecuteError> {
        if self.abort.is_none() {
            tokio::time::sleep(delay).await;
            return Ok(());
        }
        let deadline = Instant::now() + delay;
        loop {
            self.check_abort(label, attempts)?;
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Ok(());
            }
            tokio::time::sleep(left.min(ABORT_POLL_INTERVAL)).await;
        }
    }
}
