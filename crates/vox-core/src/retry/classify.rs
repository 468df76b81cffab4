//! Classify failed attempts (HTTP status or no response) into retry error kinds.

use crate::retry::error::{ClassifiedError, HttpResponse, TransportFailure};
use crate::retry::policy::ErrorKind;
use serde_json::{Map, Value};

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u16) -> ErrorKind {
    match code {
        429 => ErrorKind::RateLimited,
        500..=599 => ErrorKind::ServerError,
        _ => ErrorKind::ClientError,
    }
}

/// Classify a transport failure. Pure: the same failure always yields the same value.
pub fn classify(failure: &TransportFailure) -> ClassifiedError {
    match failure {
        TransportFailure::NoResponse { message } => ClassifiedError {
            kind: ErrorKind::TransportError,
            status: 0,
            message: message.clone(),
            error_data: None,
            response: None,
        },
        TransportFailure::Response(resp) => classify_response(resp),
    }
}

fn classify_response(resp: &HttpResponse) -> ClassifiedError {
    let error_data = decode_error_data(&resp.body);
    let message = error_message(resp.status, error_data.as_ref());
    ClassifiedError {
        kind: classify_http_status(resp.status),
        status: resp.status,
        message,
        error_data,
        response: Some(resp.clone()),
    }
}

/// Body as a JSON object, or `None` for empty, non-JSON, or non-object bodies.
fn decode_error_data(body: &[u8]) -> Option<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Prefer the API's own message (`detail.message`, `detail`, `message`).
fn error_message(status: u16, data: Option<&Map<String, Value>>) -> String {
    let from_payload = data.and_then(|d| {
        let detail = match d.get("detail") {
            Some(Value::Object(detail)) => detail.get("message").and_then(Value::as_str),
            Some(Value::String(s)) => Some(s.as_str()),
            _ => None,
        };
        detail.or_else(|| d.get("message").and_then(Value::as_str))
    });

    match (from_payload, reason_phrase(status)) {
        (Some(msg), _) => msg.to_string(),
        (None, Some(reason)) => format!("HTTP {} {}", status, reason),
        (None, None) => format!("HTTP {}", status),
    }
}

fn reason_phrase(status: u16) -> Option<&'static str> {
    Some(match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => return None,
    })
}
