//! `Retry-After` header values: delta-seconds or an HTTP-date.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::time::Duration;

/// Obsolete HTTP-date forms: RFC 850 and asctime.
const LEGACY_DATE_FORMATS: [&str; 2] = ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAfter {
    Seconds(u64),
    At(DateTime<Utc>),
}

impl RetryAfter {
    /// Parses `"120"` or `"Wed, 21 Oct 2015 07:28:00 GMT"`. Anything else is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if let Ok(secs) = value.parse::<u64>() {
            return Some(RetryAfter::Seconds(secs));
        }
        if let Ok(at) = DateTime::parse_from_rfc2822(value) {
            return Some(RetryAfter::At(at.with_timezone(&Utc)));
        }
        LEGACY_DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
            .map(|at| RetryAfter::At(at.and_utc()))
    }

    /// Time left to wait as of `now`; dates in the past give zero.
    pub fn delay_from(&self, now: DateTime<Utc>) -> Duration {
        match self {
            RetryAfter::Seconds(secs) => Duration::from_secs(*secs),
            RetryAfter::At(at) => (*at - now).to_std().unwrap_or(Duration::ZERO),
        }
    }
}
