//! Health data structures shared by the probe, aggregator and status views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

pub const DEFAULT_HEALTH_PATH: &str = "/api/v1/health";
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// A downstream service to poll
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTarget {
    pub name: String,
    pub base_url: String,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_expected_status")]
    pub expected_status_code: u16,
}

fn default_health_path() -> String {
    DEFAULT_HEALTH_PATH.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_expected_status() -> u16 {
    DEFAULT_EXPECTED_STATUS
}

impl ServiceTarget {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            health_path: default_health_path(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            expected_status_code: DEFAULT_EXPECTED_STATUS,
        }
    }

    pub fn with_health_path(mut self, health_path: impl Into<String>) -> Self {
        self.health_path = health_path.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_expected_status(mut self, status: u16) -> Self {
        self.expected_status_code = status;
        self
    }

    /// Full URL probed for this target
    pub fn health_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.health_path.starts_with('/') {
            format!("{}{}", base, self.health_path)
        } else {
            format!("{}/{}", base, self.health_path)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Outcome of a single probe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResult {
    pub service: String,
    pub success: bool,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    pub timestamp: DateTime<Utc>,
}

impl HealthCheckResult {
    pub fn success(service: &str, elapsed: Duration, status_code: u16) -> Self {
        Self {
            service: service.to_string(),
            success: true,
            response_time_ms: round_millis(elapsed),
            status_code: Some(status_code),
            error: None,
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(
        service: &str,
        elapsed: Duration,
        status_code: Option<u16>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            service: service.to_string(),
            success: false,
            response_time_ms: round_millis(elapsed),
            status_code,
            error: Some(error.into()),
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        if !metadata.is_empty() {
            self.metadata = Some(metadata);
        }
        self
    }
}

/// Wall-clock duration rounded to the nearest whole millisecond
pub fn round_millis(elapsed: Duration) -> u64 {
    (elapsed.as_secs_f64() * 1000.0).round() as u64
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::Healthy => write!(f, "healthy"),
            ServiceStatus::Unhealthy => write!(f, "unhealthy"),
            ServiceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub name: String,
    pub url: String,
    pub status: ServiceStatus,
    pub response_time_ms: u64,
    pub last_checked: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ServiceHealth {
    pub fn from_result(target: &ServiceTarget, result: HealthCheckResult) -> Self {
        Self {
            name: target.name.clone(),
            url: target.health_url(),
            status: if result.success {
                ServiceStatus::Healthy
            } else {
                ServiceStatus::Unhealthy
            },
            response_time_ms: result.response_time_ms,
            last_checked: result.timestamp,
            error: result.error,
            metadata: result.metadata,
        }
    }

    /// A service without any completed probe
    pub fn unknown(target: &ServiceTarget) -> Self {
        Self {
            name: target.name.clone(),
            url: target.health_url(),
            status: ServiceStatus::Unknown,
            response_time_ms: 0,
            last_checked: Utc::now(),
            error: None,
            metadata: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status == ServiceStatus::Healthy
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Healthy,
    Degraded,
    Critical,
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemStatus::Healthy => write!(f, "healthy"),
            SystemStatus::Degraded => write!(f, "degraded"),
            SystemStatus::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthSummary {
    pub total_services: usize,
    pub healthy_services: usize,
    pub unhealthy_services: usize,
    pub percentage: u32,
    pub average_response_time_ms: u64,
    pub system_status: SystemStatus,
    pub last_update: DateTime<Utc>,
}

/// Summary plus the per-service results it was computed from
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub summary: HealthSummary,
    pub services: Vec<ServiceHealth>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warning,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ServiceDown,
    SlowResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub severity: AlertSeverity,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub service: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_url_joins_base_and_path() {
        let target = ServiceTarget::new("auth-service", "http://auth-service:3002/");
        assert_eq!(target.health_url(), "http://auth-service:3002/api/v1/health");

        let target = ServiceTarget::new("db", "http://db:3001").with_health_path("health");
        assert_eq!(target.health_url(), "http://db:3001/health");
    }

    #[test]
    fn test_target_defaults_when_deserialized() {
        let target: ServiceTarget =
            serde_json::from_str(r#"{"name": "ai-service", "baseUrl": "http://ai:3003"}"#).unwrap();

        assert_eq!(target.health_path, DEFAULT_HEALTH_PATH);
        assert_eq!(target.timeout_ms, 5000);
        assert_eq!(target.expected_status_code, 200);
    }

    #[test]
    fn test_round_millis() {
        assert_eq!(round_millis(Duration::from_micros(1499)), 1);
        assert_eq!(round_millis(Duration::from_micros(1500)), 2);
        assert_eq!(round_millis(Duration::ZERO), 0);
    }

    #[test]
    fn test_service_health_serialization() {
        let target = ServiceTarget::new("db-service", "http://db-service:3001");
        let result = HealthCheckResult::failure(
            "db-service",
            Duration::from_millis(12),
            None,
            "Connection refused",
        );
        let health = ServiceHealth::from_result(&target, result);

        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["responseTimeMs"], 12);
        assert_eq!(json["error"], "Connection refused");
        assert!(json.get("metadata").is_none());
    }

    #[test]
    fn test_alert_type_serialization() {
        let alert = Alert {
            severity: AlertSeverity::Warning,
            alert_type: AlertType::SlowResponse,
            service: "ai-service".to_string(),
            message: "slow".to_string(),
            timestamp: Utc::now(),
            error: None,
        };

        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["type"], "slow_response");
    }
}
