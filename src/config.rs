//! Configuration management for the service monitor

use crate::errors::{MonitorError, Result};
use crate::metrics::DEFAULT_MAX_SERIES_PER_METRIC;
use crate::models::{DEFAULT_HEALTH_PATH, DEFAULT_TIMEOUT_MS, ServiceTarget};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_AUTH_SERVICE_URL: &str = "http://auth-service:3002";
pub const DEFAULT_DB_SERVICE_URL: &str = "http://db-service:3001";
pub const DEFAULT_AI_SERVICE_URL: &str = "http://ai-service:3003";
pub const DEFAULT_PAYMENT_SERVICE_URL: &str = "http://payment-service:3004";

/// Base URLs of the services that also report business metrics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartnerEndpoints {
    pub auth_url: String,
    pub ai_url: String,
    pub payment_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Services polled for health, in reporting order
    pub services: Vec<ServiceTarget>,

    /// Where business metrics are fetched from
    pub partners: PartnerEndpoints,

    /// Time between two collection cycles
    pub collection_interval: Duration,

    /// HTTP timeout for partner metrics requests
    pub partner_timeout: Duration,

    /// Distinct label sets kept per metric
    pub max_series_per_metric: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key/value source. Unset or
    /// unparsable keys fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let auth_url = url("AUTH_SERVICE_URL", DEFAULT_AUTH_SERVICE_URL);
        let db_url = url("DB_SERVICE_URL", DEFAULT_DB_SERVICE_URL);
        let ai_url = url("AI_SERVICE_URL", DEFAULT_AI_SERVICE_URL);
        let payment_url = url("PAYMENT_SERVICE_URL", DEFAULT_PAYMENT_SERVICE_URL);
        let health_path = url("HEALTH_PATH", DEFAULT_HEALTH_PATH);

        let health_timeout_ms = lookup("HEALTH_CHECK_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        let partner_timeout_ms = lookup("PARTNER_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        let interval_seconds = lookup("COLLECTION_INTERVAL_SECONDS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let max_series_per_metric = lookup("METRICS_MAX_SERIES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_SERIES_PER_METRIC);

        let services = [
            ("auth-service", &auth_url),
            ("db-service", &db_url),
            ("ai-service", &ai_url),
            ("payment-service", &payment_url),
        ]
        .into_iter()
        .map(|(name, base)| {
            ServiceTarget::new(name, base.as_str())
                .with_health_path(health_path.as_str())
                .with_timeout_ms(health_timeout_ms)
        })
        .collect();

        Self {
            services,
            partners: PartnerEndpoints {
                auth_url,
                ai_url,
                payment_url,
            },
            collection_interval: Duration::from_secs(interval_seconds),
            partner_timeout: Duration::from_millis(partner_timeout_ms),
            max_series_per_metric,
        }
    }

    pub fn with_services_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.services = load_services(path)?;
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            return Err(MonitorError::Config(
                "at least one service must be configured".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for service in &self.services {
            if service.name.trim().is_empty() {
                return Err(MonitorError::Config("service name cannot be empty".to_string()));
            }
            if !names.insert(service.name.as_str()) {
                return Err(MonitorError::Config(format!(
                    "duplicate service name: {}",
                    service.name
                )));
            }
            check_url(&format!("{} base URL", service.name), &service.base_url)?;
            if service.timeout_ms == 0 {
                return Err(MonitorError::Config(format!(
                    "{} timeout must be greater than 0",
                    service.name
                )));
            }
        }

        check_url("auth service URL", &self.partners.auth_url)?;
        check_url("AI service URL", &self.partners.ai_url)?;
        check_url("payment service URL", &self.partners.payment_url)?;

        if self.collection_interval.is_zero() {
            return Err(MonitorError::Config(
                "collection interval must be greater than 0".to_string(),
            ));
        }

        if self.partner_timeout.is_zero() {
            return Err(MonitorError::Config(
                "partner timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_series_per_metric == 0 {
            return Err(MonitorError::Config(
                "metrics series limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_url(what: &str, url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(MonitorError::Config(format!("{} must be an http(s) URL, got {:?}", what, url)))
    }
}

/// Read a JSON list of targets
fn load_services(path: impl AsRef<Path>) -> Result<Vec<ServiceTarget>> {
    let raw = std::fs::read_to_string(path)?;
    let services: Vec<ServiceTarget> = serde_json::from_str(&raw)?;
    Ok(services)
}
