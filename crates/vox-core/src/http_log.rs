//! Request/response/retry event logging with credential redaction.
//!
//! Every value that leaves this module through `tracing` has been sanitized:
//! secret-bearing keys are masked, binary bodies are summarized, and long
//! bodies are truncated. When logging is disabled in config, each event
//! method returns before doing any formatting.

use crate::config::LoggingConfig;
use crate::retry::ClassifiedError;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Bodies longer than this many characters are truncated.
pub const MAX_BODY_CHARS: usize = 5000;

/// Successful responses up to this size have their body logged.
const SMALL_BODY_BYTES: usize = 1024;

const MASK: &str = "***";
const TRUNCATED_MARKER: &str = "... [truncated]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Requests,
    Responses,
    Retries,
}

/// Redacting event logger for API calls.
#[derive(Debug, Clone)]
pub struct HttpLogger {
    enabled: bool,
    log_requests: bool,
    log_responses: bool,
    log_retries: bool,
    /// Lowercased key fragments.
    sensitive_keys: Vec<String>,
}

impl HttpLogger {
    pub fn new(cfg: &LoggingConfig) -> Self {
        Self {
            enabled: cfg.enabled,
            log_requests: cfg.log_requests,
            log_responses: cfg.log_responses,
            log_retries: cfg.log_retries,
            sensitive_keys: cfg
                .sensitive_keys
                .iter()
                .map(|k| k.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Logger that never emits anything.
    pub fn disabled() -> Self {
        Self::new(&LoggingConfig {
            enabled: false,
            ..LoggingConfig::default()
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn should_log(&self, category: Category) -> bool {
        self.enabled
            && match category {
                Category::Requests => self.log_requests,
                Category::Responses => self.log_responses,
                Category::Retries => self.log_retries,
            }
    }

    /// True when `key` contains one of the sensitive fragments (case-insensitive).
    pub fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        self.sensitive_keys
            .iter()
            .any(|fragment| !fragment.is_empty() && key.contains(fragment.as_str()))
    }

    /// Masks values under sensitive keys, recursing into objects and arrays.
    pub fn sanitize_value(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| {
                        let v = if self.is_sensitive(k) {
                            mask_value(v)
                        } else {
                            self.sanitize_value(v)
                        };
                        (k.clone(), v)
                    })
                    .collect(),
            ),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.sanitize_value(v)).collect())
            }
            other => other.clone(),
        }
    }

    pub fn sanitize_headers(&self, headers: &[(String, String)]) -> Vec<(String, String)> {
        headers
            .iter()
            .map(|(k, v)| {
                let v = if self.is_sensitive(k) {
                    mask_secret(v)
                } else {
                    v.clone()
                };
                (k.clone(), v)
            })
            .collect()
    }

    /// JSON bodies are sanitized structurally; anything else goes through
    /// [`sanitize_body`].
    pub fn sanitize_payload(&self, body: &[u8]) -> String {
        match serde_json::from_slice::<Value>(body) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => {
                truncate_chars(&self.sanitize_value(&value).to_string())
            }
            _ => sanitize_body(body),
        }
    }

    /// Masks sensitive query parameter values and any password in the userinfo.
    /// Strings that do not parse as a URL go through [`HttpLogger::redact_text`].
    pub fn redact_url(&self, raw: &str) -> String {
        let Ok(mut url) = Url::parse(raw) else {
            return self.redact_text(raw);
        };
        if url.password().is_some() {
            let _ = url.set_password(Some(MASK));
        }
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if pairs.iter().any(|(k, _)| self.is_sensitive(k)) {
            url.query_pairs_mut().clear().extend_pairs(pairs.iter().map(|(k, v)| {
                let v = if self.is_sensitive(k) {
                    mask_secret(v)
                } else {
                    v.clone()
                };
                (k.clone(), v)
            }));
        }
        url.to_string()
    }

    /// Free-form text (error messages): masks the value in `key=value` and
    /// `key: value` pairs whose key is sensitive, then truncates.
    pub fn redact_text(&self, text: &str) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut mask_next = false;
        for word in text.split(' ') {
            if mask_next && !word.is_empty() {
                // `Authorization: Bearer <token>` keeps the scheme.
                if word.eq_ignore_ascii_case("bearer") || word.eq_ignore_ascii_case("basic") {
                    out.push(word.to_string());
                } else {
                    out.push(mask_secret(word));
                    mask_next = false;
                }
                continue;
            }
            let split = ['=', ':']
                .iter()
                .filter_map(|sep| word.find(*sep))
                .find(|pos| self.is_sensitive(&word[..*pos]));
            match split {
                Some(pos) => {
                    let (key, value) = word.split_at(pos + 1);
                    if value.is_empty() {
                        mask_next = true;
                        out.push(word.to_string());
                    } else {
                        out.push(format!("{}{}", key, mask_secret(value)));
                    }
                }
                None => out.push(word.to_string()),
            }
        }
        truncate_chars(&out.join(" "))
    }

    pub fn request_started(
        &self,
        label: &str,
        method: &str,
        url: &str,
        headers: &[(String, String)],
        body: Option<&[u8]>,
    ) {
        if !self.should_log(Category::Requests) {
            return;
        }
        let headers = self.sanitize_headers(headers);
        let body = body.map(|b| self.sanitize_payload(b));
        let url = self.redact_url(url);
        tracing::info!(
            label,
            method,
            url = %url,
            headers = ?headers,
            body = body.as_deref().unwrap_or(""),
            "API request"
        );
    }

    pub fn response_received(&self, label: &str, status: u16, duration: Duration, body: &[u8]) {
        if !self.should_log(Category::Responses) {
            return;
        }
        let duration_ms = duration.as_millis() as u64;
        if status >= 400 || body.len() <= SMALL_BODY_BYTES {
            let body = self.sanitize_payload(body);
            if status >= 400 {
                tracing::warn!(label, status, duration_ms, body = %body, "API response");
            } else {
                tracing::info!(label, status, duration_ms, body = %body, "API response");
            }
        } else {
            tracing::info!(label, status, duration_ms, body_bytes = body.len(), "API response");
        }
    }

    pub fn attempt_succeeded(&self, label: &str, attempt: u32, elapsed: Duration) {
        if !self.should_log(Category::Responses) {
            return;
        }
        tracing::debug!(
            label,
            attempt,
            elapsed_ms = elapsed.as_millis() as u64,
            "request succeeded"
        );
    }

    pub fn retry_attempted(
        &self,
        label: &str,
        attempt: u32,
        max_attempts: u32,
        err: &ClassifiedError,
        delay: Duration,
    ) {
        if !self.should_log(Category::Retries) {
            return;
        }
        tracing::warn!(
            label,
            attempt,
            max_attempts,
            kind = %err.kind,
            status = err.status,
            delay_ms = delay.as_millis() as u64,
            "retrying after error: {}",
            self.redact_text(&err.message)
        );
    }

    pub fn retry_exhausted(&self, label: &str, attempts: u32, err: &ClassifiedError) {
        if !self.should_log(Category::Retries) {
            return;
        }
        tracing::error!(
            label,
            attempts,
            kind = %err.kind,
            status = err.status,
            "retries exhausted: {}",
            self.redact_text(&err.message)
        );
    }

    pub fn not_retryable(&self, label: &str, attempt: u32, err: &ClassifiedError) {
        if !self.should_log(Category::Retries) {
            return;
        }
        tracing::warn!(
            label,
            attempt,
            kind = %err.kind,
            status = err.status,
            "not retrying: {}",
            self.redact_text(&err.message)
        );
    }

    /// The operation failed with an error that is not a transport failure.
    pub fn operation_failed(
        &self,
        label: &str,
        attempt: u32,
        err: &(dyn std::error::Error + Send + Sync),
    ) {
        if !self.should_log(Category::Retries) {
            return;
        }
        tracing::warn!(
            label,
            attempt,
            "operation failed: {}",
            self.redact_text(&err.to_string())
        );
    }

    pub fn aborted(&self, label: &str, attempts: u32) {
        if !self.should_log(Category::Retries) {
            return;
        }
        tracing::info!(label, attempts, "retry loop aborted");
    }
}

/// `sk_abcdef1234567890` -> `sk_a***7890`; eight characters or fewer -> `***`.
pub fn mask_secret(value: &str) -> String {
    let count = value.chars().count();
    if count <= 8 {
        return MASK.to_string();
    }
    let head: String = value.chars().take(4).collect();
    let tail: String = value.chars().skip(count - 4).collect();
    format!("{}{}{}", head, MASK, tail)
}

fn mask_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(mask_secret(s)),
        _ => Value::String(MASK.to_string()),
    }
}

/// Binary bodies become `[Binary data - N bytes]`; text is truncated.
pub fn sanitize_body(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => truncate_chars(text),
        Err(_) => format!("[Binary data - {} bytes]", body.len()),
    }
}

fn truncate_chars(text: &str) -> String {
    match text.char_indices().nth(MAX_BODY_CHARS) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATED_MARKER),
        None => text.to_string(),
    }
}
