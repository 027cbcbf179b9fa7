//! Upstream request execution.
//!
//! A single attempt per caller request. Transport failures become
//! [`AppError::Network`]; non-2xx answers become [`AppError::Upstream`] with
//! the message lifted from the provider's own error envelope.

use crate::core::config::AppConfig;
use crate::core::error::{AppError, Result};
use crate::core::logging::get_request_id;
use crate::core::metrics::get_metrics;
use crate::transformer::UpstreamRequest;
use serde_json::Value;
use std::error::Error;
use std::time::{Duration, Instant};

const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Client for the fixed upstream chat completions endpoint.
#[derive(Clone)]
pub struct UpstreamClient {
    http_client: reqwest::Client,
    url: String,
}

impl UpstreamClient {
    pub fn new(http_client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
        }
    }

    /// Create a pooled client from the application configuration.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_ssl)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_max_idle_per_host(100)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;
        Ok(Self::new(http_client, config.upstream_url.clone()))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send `payload` with the caller's bearer token.
    ///
    /// Returns the response once headers arrive and the status is 2xx.
    /// `kind` labels logs and metrics (`chat`, `image`).
    pub async fn send(
        &self,
        token: &str,
        payload: &UpstreamRequest,
        kind: &'static str,
    ) -> Result<reqwest::Response> {
        let request_id = get_request_id();
        let start = Instant::now();

        tracing::debug!(
            request_id = %request_id,
            url = %self.url,
            model = ?payload.model,
            stream = payload.is_streaming(),
            kind,
            "Sending upstream request"
        );

        let response = self
            .http_client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", token))
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                record_latency(kind, "network_error", start);
                tracing::error!(
                    request_id = %request_id,
                    url = %self.url,
                    error = %e,
                    error_source = ?e.source(),
                    is_timeout = e.is_timeout(),
                    is_connect = e.is_connect(),
                    "HTTP request failed to upstream"
                );
                AppError::Network(e)
            })?;

        let status = response.status();
        tracing::debug!(
            request_id = %request_id,
            status = %status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Upstream responded"
        );

        if status.is_success() {
            record_latency(kind, "ok", start);
            return Ok(response);
        }

        record_latency(kind, "upstream_error", start);
        let message = read_upstream_error(response).await;
        tracing::warn!(
            request_id = %request_id,
            status = status.as_u16(),
            message = %message,
            "Upstream returned error status"
        );
        Err(AppError::Upstream {
            status: status.as_u16(),
            message,
        })
    }
}

fn record_latency(kind: &str, outcome: &str, start: Instant) {
    get_metrics()
        .upstream_latency
        .with_label_values(&[kind, outcome])
        .observe(start.elapsed().as_secs_f64());
}

fn truncate_message(message: &str) -> String {
    let mut chars = message.chars();
    let truncated: String = chars.by_ref().take(MAX_ERROR_MESSAGE_LEN).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// Extract canonical error message from an upstream error payload.
pub fn extract_error_message(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
        .or_else(|| {
            body.get("error")
                .and_then(|e| e.as_str())
                .map(|s| s.to_string())
        })
        .or_else(|| {
            body.get("message")
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
        })
}

/// Derive the caller-facing message from an upstream error body.
pub fn upstream_error_message(status: u16, bytes: &[u8]) -> String {
    let parsed = serde_json::from_slice::<Value>(bytes).ok();
    if let Some(message) = parsed.as_ref().and_then(extract_error_message) {
        return message;
    }

    let raw_text = String::from_utf8_lossy(bytes);
    let raw_text = raw_text.trim();
    if raw_text.is_empty() || parsed.is_some() {
        format!("Upstream request failed with status {}", status)
    } else {
        truncate_message(raw_text)
    }
}

async fn read_upstream_error(response: reqwest::Response) -> String {
    let status = response.status().as_u16();
    match response.bytes().await {
        Ok(bytes) => upstream_error_message(status, &bytes),
        Err(error) => {
            tracing::debug!(error = %error, "Failed to read upstream error body");
            format!("Upstream request failed with status {}", status)
        }
    }
}
