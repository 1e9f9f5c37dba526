//! Concurrent fan-out over all registered targets

use crate::models::{HealthReport, HealthSummary, ServiceHealth, ServiceTarget};
use crate::probe::Probe;
use crate::status::{health_percentage, system_status};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, instrument};

pub struct HealthAggregator {
    targets: Vec<ServiceTarget>,
    probe: Arc<dyn Probe>,
}

impl HealthAggregator {
    pub fn new(targets: Vec<ServiceTarget>, probe: Arc<dyn Probe>) -> Self {
        Self { targets, probe }
    }

    pub fn targets(&self) -> &[ServiceTarget] {
        &self.targets
    }

    /// Probe every registered target
    pub async fn check_all(&self) -> Vec<ServiceHealth> {
        self.check_targets(&self.targets).await
    }

    /// Probe `targets` concurrently, one task each. The returned list has
    /// one entry per target, in the order given.
    #[instrument(skip_all, fields(targets = targets.len()))]
    pub async fn check_targets(&self, targets: &[ServiceTarget]) -> Vec<ServiceHealth> {
        let handles: Vec<_> = targets
            .iter()
            .cloned()
            .map(|target| {
                let probe = Arc::clone(&self.probe);
                tokio::spawn(async move {
                    let result = probe.probe(&target).await;
                    ServiceHealth::from_result(&target, result)
                })
            })
            .collect();

        let services: Vec<ServiceHealth> = join_all(handles)
            .await
            .into_iter()
            .zip(targets)
            .map(|(joined, target)| match joined {
                Ok(health) => health,
                Err(e) => {
                    error!("Probe task for {} did not complete: {}", target.name, e);
                    ServiceHealth::unknown(target).with_error(format!("probe task failed: {}", e))
                }
            })
            .collect();

        debug!(
            "Checked {} services, {} healthy",
            services.len(),
            services.iter().filter(|s| s.is_healthy()).count()
        );

        services
    }

    pub fn summarize(&self, services: &[ServiceHealth]) -> HealthSummary {
        summarize(services)
    }

    /// Read-through health view: probe everything and summarize it
    pub async fn report(&self) -> HealthReport {
        let services = self.check_all().await;
        HealthReport {
            summary: summarize(&services),
            services,
            timestamp: Utc::now(),
        }
    }
}

/// Aggregate counts for a set of results. Anything not healthy (including
/// never-probed services) counts as unhealthy.
pub fn summarize(services: &[ServiceHealth]) -> HealthSummary {
    let total = services.len();
    let healthy = services.iter().filter(|s| s.is_healthy()).count();
    let percentage = health_percentage(healthy, total);

    let average_response_time_ms = if total == 0 {
        0
    } else {
        let sum: u64 = services.iter().map(|s| s.response_time_ms).sum();
        (sum as f64 / total as f64).round() as u64
    };

    HealthSummary {
        total_services: total,
        healthy_services: healthy,
        unhealthy_services: total - healthy,
        percentage: percentage.round() as u32,
        average_response_time_ms,
        system_status: system_status(percentage),
        last_update: Utc::now(),
    }
}
