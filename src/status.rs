//! System status tiers and alert derivation

use crate::models::{Alert, AlertSeverity, AlertType, ServiceHealth, ServiceStatus, SystemStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Healthy services slower than this raise a `slow_response` warning
pub const SLOW_RESPONSE_THRESHOLD_MS: u64 = 5000;

/// Lowest healthy percentage still reported as degraded rather than critical
pub const DEGRADED_THRESHOLD_PERCENT: f64 = 50.0;

/// Map a healthy percentage (0-100) to a system tier.
pub fn system_status(percentage: f64) -> SystemStatus {
    if percentage >= 100.0 {
        SystemStatus::Healthy
    } else if percentage >= DEGRADED_THRESHOLD_PERCENT {
        SystemStatus::Degraded
    } else {
        SystemStatus::Critical
    }
}

/// Share of healthy services in percent. Zero services count as 0%.
pub fn health_percentage(healthy: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    healthy as f64 / total as f64 * 100.0
}

/// Build the current alert list. Stateless: the same input always yields the same alerts.
pub fn derive_alerts(services: &[ServiceHealth]) -> Vec<Alert> {
    let now = Utc::now();

    services
        .iter()
        .filter_map(|service| match service.status {
            ServiceStatus::Unhealthy => Some(Alert {
                severity: AlertSeverity::Critical,
                alert_type: AlertType::ServiceDown,
                service: service.name.clone(),
                message: format!("Service {} is down", service.name),
                timestamp: now,
                error: service.error.clone(),
            }),
            ServiceStatus::Healthy if service.response_time_ms > SLOW_RESPONSE_THRESHOLD_MS => {
                Some(Alert {
                    severity: AlertSeverity::Warning,
                    alert_type: AlertType::SlowResponse,
                    service: service.name.clone(),
                    message: format!(
                        "Service {} is responding slowly ({}ms)",
                        service.name, service.response_time_ms
                    ),
                    timestamp: now,
                    error: None,
                })
            }
            _ => None,
        })
        .collect()
}

/// Alerts with their severity tallies
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertReport {
    pub timestamp: DateTime<Utc>,
    pub total: usize,
    pub critical: usize,
    pub warnings: usize,
    pub alerts: Vec<Alert>,
}

impl AlertReport {
    pub fn new(alerts: Vec<Alert>) -> Self {
        let critical = alerts
            .iter()
            .filter(|a| a.severity == AlertSeverity::Critical)
            .count();

        Self {
            timestamp: Utc::now(),
            total: alerts.len(),
            critical,
            warnings: alerts.len() - critical,
            alerts,
        }
    }

    pub fn from_services(services: &[ServiceHealth]) -> Self {
        Self::new(derive_alerts(services))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HealthCheckResult, ServiceTarget};
    use std::time::Duration;

    fn healthy(name: &str, ms: u64) -> ServiceHealth {
        let target = ServiceTarget::new(name, format!("http://{}", name));
        ServiceHealth::from_result(
            &target,
            HealthCheckResult::success(name, Duration::from_millis(ms), 200),
        )
    }

    fn unhealthy(name: &str, error: &str) -> ServiceHealth {
        let target = ServiceTarget::new(name, format!("http://{}", name));
        ServiceHealth::from_result(
            &target,
            HealthCheckResult::failure(name, Duration::from_millis(5000), None, error),
        )
    }

    #[test]
    fn test_system_status_thresholds() {
        assert_eq!(system_status(100.0), SystemStatus::Healthy);
        assert_eq!(system_status(75.0), SystemStatus::Degraded);
        assert_eq!(system_status(50.0), SystemStatus::Degraded);
        assert_eq!(system_status(49.9), SystemStatus::Critical);
        assert_eq!(system_status(25.0), SystemStatus::Critical);
        assert_eq!(system_status(0.0), SystemStatus::Critical);
    }

    #[test]
    fn test_health_percentage() {
        assert_eq!(health_percentage(0, 0), 0.0);
        assert_eq!(health_percentage(3, 4), 75.0);
        assert_eq!(health_percentage(4, 4), 100.0);
    }

    #[test]
    fn test_unhealthy_service_raises_critical_alert() {
        let services = vec![healthy("auth-service", 120), unhealthy("db-service", "Connection timeout")];
        let report = AlertReport::from_services(&services);

        assert_eq!(report.critical, 1);
        assert_eq!(report.warnings, 0);
        assert_eq!(report.total, report.critical + report.warnings);

        let alert = &report.alerts[0];
        assert_eq!(alert.alert_type, AlertType::ServiceDown);
        assert_eq!(alert.service, "db-service");
        assert_eq!(alert.error.as_deref(), Some("Connection timeout"));
    }

    #[test]
    fn test_slow_healthy_service_raises_warning() {
        let services = vec![healthy("slow-service", 6000), healthy("edge-service", 5000)];
        let alerts = derive_alerts(&services);

        // exactly at the threshold is not slow
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Warning);
        assert_eq!(alerts[0].alert_type, AlertType::SlowResponse);
        assert_eq!(alerts[0].service, "slow-service");
        assert!(alerts[0].error.is_none());
    }

    #[test]
    fn test_no_alerts_for_fast_or_unknown_services() {
        let target = ServiceTarget::new("new-service", "http://new-service");
        let services = vec![healthy("auth-service", 10), ServiceHealth::unknown(&target)];

        assert!(derive_alerts(&services).is_empty());
    }

    #[test]
    fn test_alerts_are_regenerated_each_call() {
        let services = vec![unhealthy("db-service", "down")];

        assert_eq!(derive_alerts(&services).len(), 1);
        assert_eq!(derive_alerts(&services).len(), 1);
    }
}
