//! Compute transport - live endpoint access
//!
//! The scheduler talks to the compute backend through the
//! [`ComputeTransport`] trait so tests can substitute an in-memory
//! implementation. The production implementation posts the override
//! map as JSON and runs the startup health probe that decides live vs
//! static mode.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use footprint_core::{ComputeResult, OverrideMap};

use crate::types::{Result, TallyError};

/// Request body for the live compute endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComputeRequest {
    pub profile_id: String,
    pub overrides: OverrideMap,
}

/// Access to the live compute backend.
#[async_trait]
pub trait ComputeTransport: Send + Sync {
    /// Lightweight health probe. `false` on failure or timeout; never
    /// errors.
    async fn probe(&self) -> bool;

    /// Run a compute request against the live endpoint.
    async fn compute(&self, request: &ComputeRequest) -> Result<ComputeResult>;
}

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Compute endpoint URL (POST)
    pub compute_url: String,
    /// Health endpoint URL (GET)
    pub health_url: String,
    /// Probe timeout; expiry counts as probe failure
    pub probe_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            compute_url: "http://localhost:8090/api/compute".to_string(),
            health_url: "http://localhost:8090/api/health".to_string(),
            probe_timeout: Duration::from_millis(800),
        }
    }
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to create HTTP client");
        Self { client, config }
    }
}

#[async_trait]
impl ComputeTransport for HttpTransport {
    async fn probe(&self) -> bool {
        let request = self.client.get(&self.config.health_url).send();
        match tokio::time::timeout(self.config.probe_timeout, request).await {
            Ok(Ok(response)) => {
                let healthy = response.status().is_success();
                debug!(url = %self.config.health_url, healthy, "Health probe completed");
                healthy
            }
            Ok(Err(e)) => {
                warn!(url = %self.config.health_url, error = %e, "Health probe failed");
                false
            }
            Err(_) => {
                warn!(
                    url = %self.config.health_url,
                    timeout_ms = self.config.probe_timeout.as_millis() as u64,
                    "Health probe timed out"
                );
                false
            }
        }
    }

    async fn compute(&self, request: &ComputeRequest) -> Result<ComputeResult> {
        let response = self
            .client
            .post(&self.config.compute_url)
            .json(request)
            .send()
            .await
            .map_err(|e| TallyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // Non-2xx bodies are surfaced verbatim as the error message.
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body
            };
            return Err(TallyError::Compute(message));
        }

        response
            .json::<ComputeResult>()
            .await
            .map_err(|e| TallyError::Parse {
                path: self.config.compute_url.clone(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_profile_and_overrides() {
        let request = ComputeRequest {
            profile_id: "default".to_string(),
            overrides: OverrideMap::from([("streaming.hours_per_week".to_string(), 14.0)]),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["profile_id"], "default");
        assert_eq!(json["overrides"]["streaming.hours_per_week"], 14.0);
    }

    #[tokio::test]
    async fn probe_fails_fast_against_unroutable_endpoint() {
        let transport = HttpTransport::new(HttpTransportConfig {
            compute_url: "http://127.0.0.1:1/api/compute".to_string(),
            health_url: "http://127.0.0.1:1/api/health".to_string(),
            probe_timeout: Duration::from_millis(200),
        });
        assert!(!transport.probe().await);
    }
}
