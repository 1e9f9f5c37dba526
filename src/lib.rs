//! Service Monitor Library
//!
//! Polls a fixed set of downstream services for health, derives system
//! status and alerts from the results, and republishes health and business
//! metrics in the Prometheus text format.

pub mod aggregator;
pub mod collector;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod partners;
pub mod probe;
pub mod server;
pub mod state;
pub mod status;

pub use aggregator::{HealthAggregator, summarize};
pub use collector::{CollectorHandle, MetricsCollector};
pub use config::Config;
pub use errors::{MonitorError, Result};
pub use metrics::MetricsRegistry;
pub use models::{Alert, HealthCheckResult, HealthSummary, ServiceHealth, ServiceTarget};
pub use probe::{HttpProbe, Probe};
pub use status::{AlertReport, derive_alerts, system_status};
