//! Shared data-access client for the hosted backend.
//!
//! Built once at startup from [`BackendConfig`] and handed to the storage and
//! repository clients behind an `Arc`, so each of them can be pointed at a
//! substitute backend in tests.

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::time::Duration;
use tracing::info;
use url::Url;

/// Authenticated HTTP client bound to one backend base URL.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl BackendClient {
    /// Create the client. Fails with [`Error::Configuration`] when the base
    /// URL or the anonymous token is missing or malformed.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        config.validate()?;

        let parsed = Url::parse(config.url.trim())
            .map_err(|e| Error::Configuration(format!("invalid backend url: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Configuration(format!(
                "backend url must be http(s), got {}",
                parsed.scheme()
            )));
        }

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.anon_key.trim()))
            .map_err(|_| Error::Configuration("invalid anon key".to_string()))?;
        let apikey = HeaderValue::from_str(config.anon_key.trim())
            .map_err(|_| Error::Configuration("invalid anon key".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("apikey", apikey);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(format!("memories-service/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        let base_url = config.url.trim().trim_end_matches('/').to_string();

        info!(base_url = %base_url, "Backend client initialized");

        Ok(Self {
            http,
            base_url,
            timeout: config.request_timeout(),
        })
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute URL for a backend path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

/// Best human-readable message from a failed backend response.
pub(crate) async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    message_from_body(&body)
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| "Network error".to_string())
}

fn message_from_body(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error", "msg"] {
            if let Some(serde_json::Value::String(message)) = map.get(key) {
                if !message.is_empty() {
                    return Some(message.clone());
                }
            }
        }
    }

    Some(body.to_string())
}
