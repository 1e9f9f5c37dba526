//! Business metrics reported by partner services

use crate::config::PartnerEndpoints;
use crate::errors::{MonitorError, Result};
use reqwest::{Client, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserMetrics {
    pub active_users: u64,
    pub total_users: u64,
    pub users_by_language: HashMap<String, u64>,
    pub average_user_level: HashMap<String, f64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationMetrics {
    pub new_conversations: u64,
    pub completed_conversations: u64,
    pub failed_conversations: u64,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentMetrics {
    pub successful_payments: u64,
    pub failed_payments: u64,
    pub pending_payments: u64,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TokenUsage {
    pub provider: String,
    pub model: String,
    pub tokens: u64,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TokenMetrics {
    pub usage: Vec<TokenUsage>,
}

/// HTTP client for partner metrics endpoints
#[derive(Debug, Clone)]
pub struct PartnerClient {
    client: Client,
    endpoints: PartnerEndpoints,
    timeout: Duration,
}

impl PartnerClient {
    pub fn new(endpoints: PartnerEndpoints, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("service_monitor/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(MonitorError::Http)?;

        Ok(Self {
            client,
            endpoints,
            timeout: request_timeout,
        })
    }

    pub async fn user_metrics(&self) -> Result<UserMetrics> {
        self.fetch(&self.endpoints.auth_url, "/api/v1/metrics/users").await
    }

    pub async fn conversation_metrics(&self) -> Result<ConversationMetrics> {
        self.fetch(&self.endpoints.ai_url, "/api/v1/metrics/conversations").await
    }

    pub async fn token_metrics(&self) -> Result<TokenMetrics> {
        self.fetch(&self.endpoints.ai_url, "/api/v1/metrics/tokens").await
    }

    pub async fn payment_metrics(&self) -> Result<PaymentMetrics> {
        self.fetch(&self.endpoints.payment_url, "/api/v1/metrics/payments").await
    }

    async fn fetch<T: DeserializeOwned>(&self, base_url: &str, path: &str) -> Result<T> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);
        debug!("Fetching partner metrics from {}", url);

        let response = timeout(
            self.timeout,
            self.client
                .get(&url)
                .header(header::ACCEPT, "application/json")
                .send(),
        )
        .await
        .map_err(|_| MonitorError::Timeout(self.timeout))?
        .map_err(MonitorError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Partner {
                url,
                status: status.as_u16(),
            });
        }

        let body = timeout(self.timeout, response.json::<T>())
            .await
            .map_err(|_| MonitorError::Timeout(self.timeout))?
            .map_err(MonitorError::Http)?;

        Ok(body)
    }
}
