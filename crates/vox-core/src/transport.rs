//! Blocking HTTP transport on libcurl.
//!
//! One call to [`HttpClient::send`] is one network round trip. Failures are
//! reported as [`TransportFailure`] so the retry layer can classify them:
//! curl errors mean no response was obtained, non-2xx statuses carry the
//! full response.

use crate::retry::{HttpResponse, TransportFailure};
use std::str;
use std::time::Duration;

/// A fully-built request: absolute URL, method, headers and optional body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

/// Timeouts applied to every request.
#[derive(Debug, Clone, Copy)]
pub struct HttpClient {
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            timeout: Duration::from_secs(30),
        }
    }
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Performs one request. 2xx responses are `Ok`.
    ///
    /// Runs in the current thread; call from `spawn_blocking` if used from async code.
    pub fn send(&self, req: &HttpRequest) -> Result<HttpResponse, TransportFailure> {
        let resp = self.perform(req).map_err(|e| TransportFailure::NoResponse {
            message: e.to_string(),
        })?;
        if resp.is_success() {
            Ok(resp)
        } else {
            Err(TransportFailure::Response(resp))
        }
    }

    fn perform(&self, req: &HttpRequest) -> Result<HttpResponse, curl::Error> {
        let mut header_lines: Vec<String> = Vec::new();
        let mut body: Vec<u8> = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(&req.url)?;
        easy.follow_location(true)?;
        easy.max_redirections(5)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.timeout)?;

        let method = req.method.to_ascii_uppercase();
        match (method.as_str(), &req.body) {
            ("GET", None) => easy.get(true)?,
            ("HEAD", _) => easy.nobody(true)?,
            ("POST", Some(b)) => {
                easy.post(true)?;
                easy.post_fields_copy(b)?;
            }
            (m, Some(b)) => {
                easy.post_fields_copy(b)?;
                easy.custom_request(m)?;
            }
            (m, None) => easy.custom_request(m)?,
        }

        let mut list = curl::easy::List::new();
        for (k, v) in &req.headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        if !req.headers.is_empty() {
            easy.http_headers(list)?;
        }

        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    let line = s.trim_end();
                    // A new status line starts a new header block (redirects, 100-continue).
                    if line.starts_with("HTTP/") {
                        header_lines.clear();
                    } else if !line.is_empty() {
                        header_lines.push(line.to_string());
                    }
                }
                true
            })?;
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        let status = easy.response_code()? as u16;
        Ok(HttpResponse {
            status,
            headers: parse_header_lines(&header_lines),
            body,
        })
    }
}

/// Split `Name: value` lines; lines without a colon are dropped.
pub(crate) fn parse_header_lines(lines: &[String]) -> Vec<(String, String)> {
    lines
        .iter()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}
