use crate::config::RetryConfig;
use crate::retry::error::ClassifiedError;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::fmt;
use std::time::Duration;

/// Largest exponent applied to the base delay; keeps `2^n` inside a `u32`.
const MAX_BACKOFF_EXPONENT: u32 = 31;

/// Jitter spread as a fraction of the computed delay (applied as +/- this much).
const JITTER_RATIO: f64 = 0.10;

/// High-level classification of a failed attempt for retry purposes.
///
/// The kind is derived only from the response status, or from the absence of
/// any response at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Server asked us to slow down (429).
    RateLimited,
    /// Any 5xx status.
    ServerError,
    /// Other 4xx and unexpected statuses.
    ClientError,
    /// No response was obtained (DNS, connect, timeout, reset).
    TransportError,
}

impl ErrorKind {
    /// True for the kinds that are retried within the attempt budget.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::RateLimited | ErrorKind::ServerError)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ServerError => "server_error",
            ErrorKind::ClientError => "client_error",
            ErrorKind::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff policy with jitter, a delay cap and `Retry-After` support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first). 0 behaves like 1.
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on any delay, including server-supplied hints.
    pub max_delay: Duration,
    /// Use the server's `Retry-After` header for rate-limited responses.
    pub respect_retry_after: bool,
    /// Add +/-10% uniform jitter to computed backoff.
    pub jitter: bool,
    /// Also retry failures where no response was received.
    pub retry_transport_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            respect_retry_after: cfg.respect_retry_after,
            jitter: cfg.jitter,
            retry_transport_errors: cfg.retry_transport_errors,
        }
    }
}

impl RetryPolicy {
    /// Effective attempt budget (never below 1).
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Whether this error is eligible for another attempt, ignoring the budget.
    pub fn should_retry(&self, err: &ClassifiedError) -> bool {
        err.is_retryable() || (self.retry_transport_errors && err.kind == ErrorKind::TransportError)
    }

    /// Decide what to do after failed attempt number `attempt` (1-based).
    pub fn decide(&self, attempt: u32, err: &ClassifiedError) -> RetryDecision {
        if attempt >= self.max_attempts() || !self.should_retry(err) {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.delay(err, attempt))
    }

    /// Delay before the attempt that follows failed attempt `attempt`.
    pub fn delay(&self, err: &ClassifiedError, attempt: u32) -> Duration {
        self.delay_at(err, attempt, Utc::now())
    }

    /// Same as [`RetryPolicy::delay`] with an explicit clock for HTTP-date hints.
    pub fn delay_at(&self, err: &ClassifiedError, attempt: u32, now: DateTime<Utc>) -> Duration {
        if self.respect_retry_after && err.kind == ErrorKind::RateLimited {
            if let Some(hint) = err.retry_after() {
                return hint.delay_from(now).min(self.max_delay);
            }
        }

        let raw = self.exponential_delay(attempt);
        let delay = if self.jitter { apply_jitter(raw) } else { raw };
        delay.min(self.max_delay)
    }

    /// `base_delay * 2^(attempt-1)` without jitter or cap.
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(1u32 << exp)
    }

    /// Jitter-free delays between consecutive attempts, capped at `max_delay`.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts())
            .map(|attempt| self.exponential_delay(attempt).min(self.max_delay))
            .collect()
    }
}

/// Adds a uniform offset in `[-10%, +10%]` of `delay`; never goes below zero.
fn apply_jitter(delay: Duration) -> Duration {
    let millis = delay.as_secs_f64() * 1000.0;
    if millis <= 0.0 {
        return delay;
    }
    let range = millis * JITTER_RATIO;
    let offset = rand::thread_rng().gen_range(-range..=range);
    let jittered = (millis + offset).max(0.0) / 1000.0;
    Duration::try_from_secs_f64(jittered).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::classify::classify;
    use crate::retry::error::{HttpResponse, TransportFailure};
    use chrono::TimeZone;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(60_000),
            respect_retry_after: true,
            jitter: false,
            retry_transport_errors: false,
        }
    }

    fn http_error(status: u16, headers: &[(&str, &str)]) -> ClassifiedError {
        classify(&TransportFailure::Response(HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: Vec::new(),
        }))
    }

    fn transport_error() -> ClassifiedError {
        classify(&TransportFailure::NoResponse {
            message: "Couldn't connect to server".into(),
        })
    }

    #[test]
    fn exponential_backoff_without_jitter() {
        let p = policy();
        let err = http_error(500, &[]);
        assert_eq!(p.delay(&err, 1), Duration::from_millis(1000));
        assert_eq!(p.delay(&err, 2), Duration::from_millis(2000));
        assert_eq!(p.delay(&err, 3), Duration::from_millis(4000));
    }

    #[test]
    fn backoff_is_capped_at_max_delay() {
        let p = policy();
        let err = http_error(503, &[]);
        assert_eq!(p.delay(&err, 7), Duration::from_millis(60_000));
        // Exponent saturates instead of overflowing.
        assert_eq!(p.delay(&err, u32::MAX), Duration::from_millis(60_000));
    }

    #[test]
    fn retry_after_seconds_overrides_backoff() {
        let p = policy();
        let err = http_error(429, &[("Retry-After", "5")]);
        assert_eq!(p.delay(&err, 1), Duration::from_secs(5));
        assert_eq!(p.delay(&err, 3), Duration::from_secs(5));
    }

    #[test]
    fn retry_after_is_capped() {
        let mut p = policy();
        p.max_delay = Duration::from_secs(2);
        let err = http_error(429, &[("retry-after", "120")]);
        assert_eq!(p.delay(&err, 1), Duration::from_secs(2));
    }

    #[test]
    fn retry_after_http_date_uses_remaining_time() {
        let p = policy();
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 50).unwrap();
        let err = http_error(429, &[("Retry-After", "Wed, 21 Oct 2015 07:28:00 GMT")]);
        assert_eq!(p.delay_at(&err, 1, now), Duration::from_secs(10));

        let later = Utc.with_ymd_and_hms(2015, 10, 21, 8, 0, 0).unwrap();
        assert_eq!(p.delay_at(&err, 1, later), Duration::ZERO);
    }

    #[test]
    fn retry_after_ignored_when_disabled_or_not_rate_limited() {
        let mut p = policy();
        let server = http_error(503, &[("Retry-After", "30")]);
        assert_eq!(p.delay(&server, 1), Duration::from_millis(1000));

        p.respect_retry_after = false;
        let limited = http_error(429, &[("Retry-After", "30")]);
        assert_eq!(p.delay(&limited, 2), Duration::from_millis(2000));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let mut p = policy();
        p.jitter = true;
        let err = http_error(500, &[]);
        for _ in 0..200 {
            let d = p.delay(&err, 2);
            assert!(d >= Duration::from_millis(1799), "{d:?} below range");
            assert!(d <= Duration::from_millis(2201), "{d:?} above range");
        }
    }

    #[test]
    fn jitter_never_exceeds_cap() {
        let mut p = policy();
        p.jitter = true;
        p.max_delay = Duration::from_millis(1000);
        let err = http_error(500, &[]);
        for _ in 0..100 {
            assert!(p.delay(&err, 1) <= Duration::from_millis(1000));
        }
    }

    #[test]
    fn decide_respects_max_attempts() {
        let p = policy();
        let err = http_error(429, &[]);
        assert!(matches!(p.decide(1, &err), RetryDecision::RetryAfter(_)));
        assert!(matches!(p.decide(2, &err), RetryDecision::RetryAfter(_)));
        assert_eq!(p.decide(3, &err), RetryDecision::NoRetry);
    }

    #[test]
    fn no_retry_for_client_and_transport_errors() {
        let p = policy();
        assert_eq!(p.decide(1, &http_error(400, &[])), RetryDecision::NoRetry);
        assert_eq!(p.decide(1, &http_error(404, &[])), RetryDecision::NoRetry);
        assert_eq!(p.decide(1, &transport_error()), RetryDecision::NoRetry);
    }

    #[test]
    fn transport_errors_retried_when_enabled() {
        let mut p = policy();
        p.retry_transport_errors = true;
        assert_eq!(
            p.decide(1, &transport_error()),
            RetryDecision::RetryAfter(Duration::from_millis(1000))
        );
        assert_eq!(p.decide(1, &http_error(401, &[])), RetryDecision::NoRetry);
    }

    #[test]
    fn zero_max_attempts_means_single_attempt() {
        let mut p = policy();
        p.max_attempts = 0;
        assert_eq!(p.max_attempts(), 1);
        assert_eq!(p.decide(1, &http_error(500, &[])), RetryDecision::NoRetry);
        assert!(p.schedule().is_empty());
    }

    #[test]
    fn schedule_lists_delays_between_attempts() {
        let mut p = policy();
        p.max_attempts = 4;
        p.max_delay = Duration::from_millis(3000);
        assert_eq!(
            p.schedule(),
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(3000),
            ]
        );
    }

    #[test]
    fn default_policy_matches_config_defaults() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.base_delay, Duration::from_millis(1000));
        assert_eq!(p.max_delay, Duration::from_millis(60_000));
        assert!(p.respect_retry_after);
        assert!(p.jitter);
        assert!(!p.retry_transport_errors);
    }
}
