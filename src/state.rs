use std::sync::Arc;
use std::time::Instant;

use crate::aggregator::HealthAggregator;
use crate::collector::MetricsCollector;
use crate::metrics::MetricsRegistry;

// App state
pub struct AppState {
    pub aggregator: Arc<HealthAggregator>,
    pub registry: Arc<MetricsRegistry>,
    pub collector: Arc<MetricsCollector>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        aggregator: Arc<HealthAggregator>,
        registry: Arc<MetricsRegistry>,
        collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            aggregator,
            registry,
            collector,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
