//! Single bounded health check against one service

use crate::errors::{MonitorError, Result};
use crate::models::{HealthCheckResult, ServiceTarget};
use async_trait::async_trait;
use reqwest::{Client, header};
use serde_json::{Map, Value};
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Anything that can check one target. Implementations never fail: every
/// failure mode ends up in `HealthCheckResult::success == false`.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: &ServiceTarget) -> HealthCheckResult;
}

/// HTTP GET probe
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("service_monitor/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(MonitorError::Http)?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, url: &str) -> std::result::Result<(u16, Option<Value>), reqwest::Error> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status().as_u16();
        // Body is informational only; a non-JSON body does not change the outcome.
        let body = response.json::<Value>().await.ok();
        Ok((status, body))
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, target: &ServiceTarget) -> HealthCheckResult {
        let url = target.health_url();
        let limit = target.timeout();
        let started = Instant::now();

        match timeout(limit, self.fetch(&url)).await {
            Ok(Ok((status, body))) if status == target.expected_status_code => {
                let result = HealthCheckResult::success(&target.name, started.elapsed(), status);
                debug!(
                    "Service {} healthy ({}ms)",
                    target.name, result.response_time_ms
                );
                match body.as_ref().and_then(extract_metadata) {
                    Some(metadata) => result.with_metadata(metadata),
                    None => result,
                }
            }
            Ok(Ok((status, _))) => {
                warn!("Service {} returned status {}", target.name, status);
                HealthCheckResult::failure(
                    &target.name,
                    started.elapsed(),
                    Some(status),
                    format!("unexpected status code {}", status),
                )
            }
            Ok(Err(e)) => {
                warn!("Health check for {} failed: {}", target.name, e);
                HealthCheckResult::failure(
                    &target.name,
                    started.elapsed(),
                    e.status().map(|s| s.as_u16()),
                    e.to_string(),
                )
            }
            Err(_) => {
                warn!(
                    "Health check for {} timed out after {}ms",
                    target.name, target.timeout_ms
                );
                HealthCheckResult::failure(
                    &target.name,
                    started.elapsed(),
                    None,
                    format!("timeout of {}ms exceeded", target.timeout_ms),
                )
            }
        }
    }
}

/// Keep the well-known descriptive fields of a health payload
fn extract_metadata(body: &Value) -> Option<Map<String, Value>> {
    let object = body.as_object()?;
    let metadata: Map<String, Value> = ["version", "uptime"]
        .iter()
        .filter_map(|key| object.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect();

    if metadata.is_empty() { None } else { Some(metadata) }
}
