//! API client: builds requests against the configured base URL and runs each
//! round trip through the retry executor.

use crate::config::VoxConfig;
use crate::http_log::HttpLogger;
use crate::retry::{
    AttemptError, ExecuteError, HttpResponse, RetryExecutor, RetryPolicy, TransportFailure,
};
use crate::transport::{HttpClient, HttpRequest};
use anyhow::{Context, Result};
use serde_json::Value;
use std::time::{Duration, Instant};
use url::Url;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "xi-api-key";

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    api_key: Option<String>,
    http: HttpClient,
    executor: RetryExecutor,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        http: HttpClient,
        executor: RetryExecutor,
    ) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid base URL {base_url}"))?;
        Ok(Self {
            base_url,
            api_key,
            http,
            executor,
        })
    }

    /// Client with retry policy, logging and timeouts taken from `cfg`.
    pub fn from_config(cfg: &VoxConfig) -> Result<Self> {
        let executor = RetryExecutor::new(
            RetryPolicy::from(&cfg.retry),
            HttpLogger::new(&cfg.logging),
        );
        Self::new(
            &cfg.base_url,
            cfg.api_key.clone(),
            HttpClient::new(Duration::from_secs(cfg.timeout_secs)),
            executor,
        )
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    pub fn get(&self, path: &str) -> Result<HttpResponse, ExecuteError> {
        self.request("GET", path, None)
    }

    pub fn delete(&self, path: &str) -> Result<HttpResponse, ExecuteError> {
        self.request("DELETE", path, None)
    }

    pub fn post_json(&self, path: &str, body: &Value) -> Result<HttpResponse, ExecuteError> {
        let bytes = serde_json::to_vec(body).map_err(|e| ExecuteError::Operation {
            label: label("POST", path),
            source: Box::new(e),
        })?;
        self.request("POST", path, Some(bytes))
    }

    /// Sends `method path` with retries. The label used for logging is
    /// `"METHOD path"`.
    pub fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, ExecuteError> {
        let label = label(method, path);
        let url = self.base_url.join(path).map_err(|e| ExecuteError::Operation {
            label: label.clone(),
            source: Box::new(e),
        })?;
        let req = HttpRequest {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            headers: self.headers(body.is_some()),
            body,
        };

        let logger = self.executor.logger();
        self.executor.execute(&label, || {
            logger.request_started(
                &label,
                &req.method,
                &req.url,
                &req.headers,
                req.body.as_deref(),
            );
            let started = Instant::now();
            match self.http.send(&req) {
                Ok(resp) => {
                    logger.response_received(&label, resp.status, started.elapsed(), &resp.body);
                    Ok(resp)
                }
                Err(TransportFailure::Response(resp)) => {
                    logger.response_received(&label, resp.status, started.elapsed(), &resp.body);
                    Err(AttemptError::Transport(TransportFailure::Response(resp)))
                }
                Err(failure) => Err(failure.into()),
            }
        })
    }

    fn headers(&self, has_body: bool) -> Vec<(String, String)> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if has_body {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        if let Some(key) = &self.api_key {
            headers.push((API_KEY_HEADER.to_string(), key.clone()));
        }
        headers
    }
}

fn label(method: &str, path: &str) -> String {
    format!("{} {}", method.to_ascii_uppercase(), path)
}
