//! Process-wide metrics registry and Prometheus text exposition
//!
//! Every series is registered up front with a fixed label set. Writers go
//! through the generic `increment_counter` / `set_gauge` / `observe_duration`
//! calls (validated against the registered label names) or through the typed
//! helpers below. Values are stored in the prometheus crate's atomics, so
//! concurrent writers never lose updates and `export` never sees a torn value.
//!
//! Each labeled metric admits at most `max_series` distinct label sets. Writes
//! for new label sets past that limit land in a single overflow series whose
//! label values are all `other`, so totals stay correct while the exposition
//! stays bounded.

use crate::errors::{MonitorError, Result};
use prometheus::core::Collector;
use prometheus::proto::Metric;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const SERVICE_HEALTH_STATUS: &str = "service_health_status";
pub const SERVICE_RESPONSE_TIME_MS: &str = "service_response_time_ms";
pub const ACTIVE_USERS: &str = "penpal_active_users";
pub const TOTAL_USERS: &str = "penpal_total_users";
pub const USERS_BY_LANGUAGE: &str = "penpal_users_by_language";
pub const AVERAGE_USER_LEVEL: &str = "penpal_average_user_level";
pub const CONVERSATIONS_TOTAL: &str = "penpal_conversations_total";
pub const PAYMENTS_TOTAL: &str = "penpal_payments_total";
pub const PAYMENT_AMOUNT_TOTAL: &str = "penpal_payment_amount_total";
pub const TOKENS_CONSUMED_TOTAL: &str = "penpal_tokens_consumed_total";

/// Label values longer than this are truncated
pub const MAX_LABEL_VALUE_LEN: usize = 64;

/// Distinct label sets admitted per metric before writes overflow
pub const DEFAULT_MAX_SERIES_PER_METRIC: usize = 1000;

/// Label value of the overflow series
pub const OVERFLOW_LABEL_VALUE: &str = "other";

const KNOWN_METHODS: &[&str] = &["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"];

const DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationStatus {
    Created,
    Completed,
    Failed,
}

impl ConversationStatus {
    fn as_label(&self) -> &'static str {
        match self {
            ConversationStatus::Created => "created",
            ConversationStatus::Completed => "completed",
            ConversationStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Success,
    Failed,
    Pending,
}

impl PaymentStatus {
    fn as_label(&self) -> &'static str {
        match self {
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone)]
enum GaugeSeries {
    Plain(Gauge),
    Labeled(GaugeVec),
}

#[derive(Debug)]
pub struct MetricsRegistry {
    registry: Registry,
    counters: HashMap<&'static str, (CounterVec, &'static [&'static str])>,
    gauges: HashMap<&'static str, (GaugeSeries, &'static [&'static str])>,
    histograms: HashMap<&'static str, (HistogramVec, &'static [&'static str])>,
    series: HashMap<&'static str, Mutex<HashSet<Vec<String>>>>,
    max_series: usize,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        Self::with_series_limit(DEFAULT_MAX_SERIES_PER_METRIC)
    }

    pub fn with_series_limit(max_series: usize) -> Result<Self> {
        if max_series == 0 {
            return Err(MonitorError::Config(
                "metrics series limit must be greater than 0".to_string(),
            ));
        }

        let mut metrics = Self {
            registry: Registry::new(),
            counters: HashMap::new(),
            gauges: HashMap::new(),
            histograms: HashMap::new(),
            series: HashMap::new(),
            max_series,
        };

        metrics.register_counter(
            HTTP_REQUESTS_TOTAL,
            "Total number of HTTP requests",
            &["method", "route", "status_code", "service"],
        )?;
        metrics.register_histogram(
            HTTP_REQUEST_DURATION_SECONDS,
            "Duration of HTTP requests in seconds",
            &["method", "route", "service"],
        )?;
        metrics.register_gauge(
            SERVICE_HEALTH_STATUS,
            "Health status of monitored services (1 = healthy, 0 = unhealthy)",
            &["service_name", "service_url"],
        )?;
        metrics.register_gauge(
            SERVICE_RESPONSE_TIME_MS,
            "Last health check response time in milliseconds",
            &["service_name"],
        )?;
        metrics.register_gauge(ACTIVE_USERS, "Number of active users", &[])?;
        metrics.register_gauge(TOTAL_USERS, "Total number of registered users", &[])?;
        metrics.register_gauge(USERS_BY_LANGUAGE, "Number of users per learning language", &["language"])?;
        metrics.register_gauge(
            AVERAGE_USER_LEVEL,
            "Average user level per learning language",
            &["language"],
        )?;
        metrics.register_counter(CONVERSATIONS_TOTAL, "Total number of conversations", &["status"])?;
        metrics.register_counter(PAYMENTS_TOTAL, "Total number of payments", &["status"])?;
        metrics.register_counter(PAYMENT_AMOUNT_TOTAL, "Total payment amount", &["status"])?;
        metrics.register_counter(
            TOKENS_CONSUMED_TOTAL,
            "Total number of AI tokens consumed",
            &["provider", "model"],
        )?;

        Ok(metrics)
    }

    fn register_counter(
        &mut self,
        name: &'static str,
        help: &str,
        labels: &'static [&'static str],
    ) -> Result<()> {
        let counter = CounterVec::new(Opts::new(name, help), labels)?;
        self.registry.register(Box::new(counter.clone()))?;
        self.counters.insert(name, (counter, labels));
        self.series.insert(name, Mutex::default());
        Ok(())
    }

    fn register_gauge(
        &mut self,
        name: &'static str,
        help: &str,
        labels: &'static [&'static str],
    ) -> Result<()> {
        let series = if labels.is_empty() {
            let gauge = Gauge::with_opts(Opts::new(name, help))?;
            self.registry.register(Box::new(gauge.clone()))?;
            GaugeSeries::Plain(gauge)
        } else {
            let gauge = GaugeVec::new(Opts::new(name, help), labels)?;
            self.registry.register(Box::new(gauge.clone()))?;
            GaugeSeries::Labeled(gauge)
        };
        self.gauges.insert(name, (series, labels));
        self.series.insert(name, Mutex::default());
        Ok(())
    }

    fn register_histogram(
        &mut self,
        name: &'static str,
        help: &str,
        labels: &'static [&'static str],
    ) -> Result<()> {
        let histogram = HistogramVec::new(
            HistogramOpts::new(name, help).buckets(DURATION_BUCKETS.to_vec()),
            labels,
        )?;
        self.registry.register(Box::new(histogram.clone()))?;
        self.histograms.insert(name, (histogram, labels));
        self.series.insert(name, Mutex::default());
        Ok(())
    }

    /// Add `delta` to a counter series. Deltas must be finite and non-negative.
    pub fn increment_counter(&self, name: &str, labels: &[&str], delta: f64) -> Result<()> {
        let (counter, names) = self
            .counters
            .get(name)
            .ok_or_else(|| MonitorError::UnknownMetric(name.to_string()))?;
        check_labels(name, names, labels)?;

        if !delta.is_finite() || delta < 0.0 {
            return Err(MonitorError::InvalidValue {
                metric: name.to_string(),
                value: delta,
            });
        }

        let values = self.admit(name, labels);
        let refs = as_refs(&values);
        counter.get_metric_with_label_values(&refs[..])?.inc_by(delta);
        Ok(())
    }

    /// Overwrite a gauge series
    pub fn set_gauge(&self, name: &str, labels: &[&str], value: f64) -> Result<()> {
        let (series, names) = self
            .gauges
            .get(name)
            .ok_or_else(|| MonitorError::UnknownMetric(name.to_string()))?;
        check_labels(name, names, labels)?;

        if !value.is_finite() {
            return Err(MonitorError::InvalidValue {
                metric: name.to_string(),
                value,
            });
        }

        match series {
            GaugeSeries::Plain(gauge) => gauge.set(value),
            GaugeSeries::Labeled(gauge) => {
                let values = self.admit(name, labels);
                let refs = as_refs(&values);
                gauge.get_metric_with_label_values(&refs[..])?.set(value);
            }
        }
        Ok(())
    }

    pub fn observe_duration(&self, name: &str, labels: &[&str], seconds: f64) -> Result<()> {
        let (histogram, names) = self
            .histograms
            .get(name)
            .ok_or_else(|| MonitorError::UnknownMetric(name.to_string()))?;
        check_labels(name, names, labels)?;

        if !seconds.is_finite() || seconds < 0.0 {
            return Err(MonitorError::InvalidValue {
                metric: name.to_string(),
                value: seconds,
            });
        }

        let values = self.admit(name, labels);
        let refs = as_refs(&values);
        histogram.get_metric_with_label_values(&refs[..])?.observe(seconds);
        Ok(())
    }

    /// Current value of one counter series, if it has been written
    pub fn counter_value(&self, name: &str, labels: &[&str]) -> Option<f64> {
        let (counter, names) = self.counters.get(name)?;
        if names.len() != labels.len() {
            return None;
        }
        let values = normalize_values(labels);
        let families = counter.collect();
        families
            .iter()
            .flat_map(|family| family.get_metric())
            .find(|metric| labels_match(metric, names, &values))
            .map(|metric| metric.get_counter().value())
    }

    pub fn gauge_value(&self, name: &str, labels: &[&str]) -> Option<f64> {
        let (series, names) = self.gauges.get(name)?;
        if names.len() != labels.len() {
            return None;
        }
        match series {
            GaugeSeries::Plain(gauge) => Some(gauge.get()),
            GaugeSeries::Labeled(gauge) => {
                let values = normalize_values(labels);
                let families = gauge.collect();
                families
                    .iter()
                    .flat_map(|family| family.get_metric())
                    .find(|metric| labels_match(metric, names, &values))
                    .map(|metric| metric.get_gauge().value())
            }
        }
    }

    /// Number of label sets currently tracked for a metric
    pub fn series_count(&self, name: &str) -> usize {
        self.series
            .get(name)
            .map(|known| known.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    /// Render every registered series in the Prometheus text format
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| MonitorError::Other(e.to_string()))
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Normalized label values for a write, or the overflow label set once
    /// the metric has reached its series limit
    fn admit(&self, name: &str, labels: &[&str]) -> Vec<String> {
        let values = normalize_values(labels);
        let Some(known) = self.series.get(name) else {
            return values;
        };
        if values.is_empty() {
            return values;
        }

        let mut known = known.lock().unwrap_or_else(PoisonError::into_inner);
        if known.contains(&values) {
            return values;
        }
        if known.len() < self.max_series {
            known.insert(values.clone());
            return values;
        }

        let overflow = vec![OVERFLOW_LABEL_VALUE.to_string(); values.len()];
        if known.insert(overflow.clone()) {
            warn!(
                "Metric {} reached {} series, new label sets are folded into {:?}",
                name, self.max_series, OVERFLOW_LABEL_VALUE
            );
        }
        overflow
    }


    pub fn record_http_request(
        &self,
        method: &str,
        route: &str,
        status_code: u16,
        service: &str,
        seconds: f64,
    ) {
        let method = normalize_method(method);
        let route = normalize_route(route);
        let status = status_code.to_string();
        log_write(
            HTTP_REQUESTS_TOTAL,
            self.increment_counter(
                HTTP_REQUESTS_TOTAL,
                &[method, route.as_str(), status.as_str(), service],
                1.0,
            ),
        );
        log_write(
            HTTP_REQUEST_DURATION_SECONDS,
            self.observe_duration(
                HTTP_REQUEST_DURATION_SECONDS,
                &[method, route.as_str(), service],
                seconds,
            ),
        );
    }

    pub fn set_service_health(&self, service_name: &str, service_url: &str, healthy: bool) {
        let value = if healthy { 1.0 } else { 0.0 };
        log_write(
            SERVICE_HEALTH_STATUS,
            self.set_gauge(SERVICE_HEALTH_STATUS, &[service_name, service_url], value),
        );
    }

    pub fn set_service_response_time(&self, service_name: &str, response_time_ms: u64) {
        log_write(
            SERVICE_RESPONSE_TIME_MS,
            self.set_gauge(SERVICE_RESPONSE_TIME_MS, &[service_name], response_time_ms as f64),
        );
    }

    pub fn set_active_users(&self, count: u64) {
        log_write(ACTIVE_USERS, self.set_gauge(ACTIVE_USERS, &[], count as f64));
    }

    pub fn set_total_users(&self, count: u64) {
        log_write(TOTAL_USERS, self.set_gauge(TOTAL_USERS, &[], count as f64));
    }

    pub fn set_users_by_language(&self, language: &str, count: u64) {
        log_write(
            USERS_BY_LANGUAGE,
            self.set_gauge(USERS_BY_LANGUAGE, &[language], count as f64),
        );
    }

    pub fn set_average_user_level(&self, language: &str, level: f64) {
        log_write(
            AVERAGE_USER_LEVEL,
            self.set_gauge(AVERAGE_USER_LEVEL, &[language], level),
        );
    }

    pub fn increment_conversations(&self, status: ConversationStatus, count: u64) {
        log_write(
            CONVERSATIONS_TOTAL,
            self.increment_counter(CONVERSATIONS_TOTAL, &[status.as_label()], count as f64),
        );
    }

    pub fn increment_payments(&self, status: PaymentStatus, count: u64, amount: Option<f64>) {
        log_write(
            PAYMENTS_TOTAL,
            self.increment_counter(PAYMENTS_TOTAL, &[status.as_label()], count as f64),
        );
        if let Some(amount) = amount {
            log_write(
                PAYMENT_AMOUNT_TOTAL,
                self.increment_counter(PAYMENT_AMOUNT_TOTAL, &[status.as_label()], amount),
            );
        }
    }

    pub fn increment_tokens_consumed(&self, provider: &str, model: &str, tokens: u64) {
        log_write(
            TOKENS_CONSUMED_TOTAL,
            self.increment_counter(TOKENS_CONSUMED_TOTAL, &[provider, model], tokens as f64),
        );
    }
}

fn log_write(metric: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!("Dropped write to {}: {}", metric, e);
    }
}

fn labels_match(metric: &Metric, names: &[&str], values: &[String]) -> bool {
    names.iter().zip(values).all(|(name, value)| {
        metric
            .get_label()
            .iter()
            .any(|pair| pair.get_name() == *name && pair.get_value() == value.as_str())
    })
}

fn check_labels(metric: &str, names: &[&str], values: &[&str]) -> Result<()> {
    if names.len() != values.len() {
        return Err(MonitorError::InvalidLabels {
            metric: metric.to_string(),
            expected: names.len(),
            got: values.len(),
        });
    }
    Ok(())
}

fn normalize_values(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| normalize_label_value(v)).collect()
}

fn as_refs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

/// Map a request method onto a fixed set; extension methods share `OTHER`
pub fn normalize_method(method: &str) -> &'static str {
    KNOWN_METHODS
        .iter()
        .find(|known| **known == method)
        .copied()
        .unwrap_or("OTHER")
}

/// Trim and cap a label value
pub fn normalize_label_value(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "unknown".to_string();
    }
    trimmed.chars().take(MAX_LABEL_VALUE_LEN).collect()
}

/// Collapse per-entity path segments so the route label stays bounded.
/// `/api/v1/users/42?x=1` becomes `/api/v1/users/:id`.
pub fn normalize_route(route: &str) -> String {
    let path = route.split(['?', '#']).next().unwrap_or_default();
    if path.is_empty() {
        return "/".to_string();
    }

    path.split('/')
        .map(|segment| if is_identifier(segment) { ":id" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_identifier(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    if segment.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    // UUIDs and long hex ids (object ids, hashes)
    let hex: String = segment.chars().filter(|c| *c != '-').collect();
    hex.len() >= 16 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_export_has_headers_on_fresh_registry() {
        let metrics = MetricsRegistry::new().unwrap();
        let text = metrics.export().unwrap();

        assert!(text.contains("# HELP"));
        assert!(text.contains("# TYPE"));
        assert!(text.contains("# TYPE penpal_active_users gauge"));
    }

    #[test]
    fn test_active_users_round_trip() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.set_active_users(150);

        let text = metrics.export().unwrap();
        assert!(text.lines().any(|line| line == "penpal_active_users 150"));
    }

    #[test]
    fn test_gauge_last_write_wins() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.set_users_by_language("en", 400);
        metrics.set_users_by_language("en", 450);

        assert_eq!(metrics.gauge_value(USERS_BY_LANGUAGE, &["en"]), Some(450.0));
        let text = metrics.export().unwrap();
        assert!(text.contains(r#"penpal_users_by_language{language="en"} 450"#));
    }

    #[test]
    fn test_counter_reflected_in_export() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.record_http_request("GET", "/health", 200, "monitoring", 0.01);
        metrics.record_http_request("GET", "/health", 200, "monitoring", 0.02);

        let text = metrics.export().unwrap();
        assert!(text.contains("# TYPE http_requests_total counter"));
        let line = text
            .lines()
            .find(|line| line.starts_with("http_requests_total{"))
            .unwrap();
        assert!(line.contains(r#"route="/health""#));
        assert!(line.contains(r#"status_code="200""#));
        assert!(line.ends_with(" 2"));
        assert!(text.contains("http_request_duration_seconds_count"));
    }

    #[test]
    fn test_service_health_gauges() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.set_service_health("auth-service", "http://auth:3002", true);
        metrics.set_service_health("db-service", "http://db:3001", false);
        metrics.set_service_response_time("db-service", 5000);

        assert_eq!(
            metrics.gauge_value(SERVICE_HEALTH_STATUS, &["auth-service", "http://auth:3002"]),
            Some(1.0)
        );
        assert_eq!(
            metrics.gauge_value(SERVICE_HEALTH_STATUS, &["db-service", "http://db:3001"]),
            Some(0.0)
        );
        assert_eq!(metrics.gauge_value(SERVICE_RESPONSE_TIME_MS, &["db-service"]), Some(5000.0));
    }

    #[test]
    fn test_unknown_metric_rejected() {
        let metrics = MetricsRegistry::new().unwrap();
        let err = metrics.increment_counter("no_such_metric", &[], 1.0).unwrap_err();
        assert!(matches!(err, MonitorError::UnknownMetric(_)));
    }

    #[test]
    fn test_wrong_label_count_rejected() {
        let metrics = MetricsRegistry::new().unwrap();

        let err = metrics
            .increment_counter(HTTP_REQUESTS_TOTAL, &["GET", "/health"], 1.0)
            .unwrap_err();
        assert!(matches!(
            err,
            MonitorError::InvalidLabels { expected: 4, got: 2, .. }
        ));

        assert!(metrics.set_gauge(ACTIVE_USERS, &["extra"], 1.0).is_err());
    }

    #[test]
    fn test_negative_counter_delta_rejected() {
        let metrics = MetricsRegistry::new().unwrap();

        assert!(metrics.increment_counter(PAYMENT_AMOUNT_TOTAL, &["success"], -5.0).is_err());
        assert!(metrics.increment_counter(PAYMENT_AMOUNT_TOTAL, &["success"], f64::NAN).is_err());

        metrics.increment_payments(PaymentStatus::Success, 1, Some(-1.0));
        assert_eq!(metrics.counter_value(PAYMENTS_TOTAL, &["success"]), Some(1.0));
        assert_eq!(metrics.counter_value(PAYMENT_AMOUNT_TOTAL, &["success"]), None);
        assert!(!metrics.export().unwrap().contains("penpal_payment_amount_total{"));
    }

    #[test]
    fn test_reads_do_not_create_series() {
        let metrics = MetricsRegistry::new().unwrap();

        assert_eq!(
            metrics.counter_value(TOKENS_CONSUMED_TOTAL, &["ghost", "never-written"]),
            None
        );
        assert_eq!(metrics.gauge_value(USERS_BY_LANGUAGE, &["xx"]), None);

        let text = metrics.export().unwrap();
        assert!(!text.contains("ghost"));
        assert!(!text.contains(r#"language="xx""#));
        assert_eq!(metrics.series_count(TOKENS_CONSUMED_TOTAL), 0);
    }

    #[test]
    fn test_extension_methods_share_one_label() {
        let metrics = MetricsRegistry::new().unwrap();
        for i in 0..200 {
            metrics.record_http_request(&format!("X{}", i), "/anything", 404, "monitoring", 0.001);
        }
        metrics.record_http_request("GET", "/anything", 404, "monitoring", 0.001);

        assert_eq!(metrics.series_count(HTTP_REQUESTS_TOTAL), 2);
        assert_eq!(metrics.series_count(HTTP_REQUEST_DURATION_SECONDS), 2);
        assert_eq!(
            metrics.counter_value(HTTP_REQUESTS_TOTAL, &["OTHER", "/anything", "404", "monitoring"]),
            Some(200.0)
        );

        let text = metrics.export().unwrap();
        let series = text
            .lines()
            .filter(|line| line.starts_with("http_requests_total{"))
            .count();
        assert_eq!(series, 2);
    }

    #[test]
    fn test_normalize_method() {
        assert_eq!(normalize_method("GET"), "GET");
        assert_eq!(normalize_method("OPTIONS"), "OPTIONS");
        assert_eq!(normalize_method("PROPFIND"), "OTHER");
        assert_eq!(normalize_method("get"), "OTHER");
    }

    #[test]
    fn test_partner_labels_fold_into_overflow_series() {
        let metrics = MetricsRegistry::with_series_limit(10).unwrap();

        for i in 0..500 {
            let model = format!("model-{}", i);
            metrics.increment_tokens_consumed("openai", &model, 10);
            metrics.set_users_by_language(&format!("lang-{}", i), 1);
        }

        // limit plus the overflow series
        assert_eq!(metrics.series_count(TOKENS_CONSUMED_TOTAL), 11);
        assert_eq!(metrics.series_count(USERS_BY_LANGUAGE), 11);

        assert_eq!(
            metrics.counter_value(TOKENS_CONSUMED_TOTAL, &["openai", "model-0"]),
            Some(10.0)
        );
        assert_eq!(
            metrics.counter_value(TOKENS_CONSUMED_TOTAL, &["openai", "model-499"]),
            None
        );
        assert_eq!(
            metrics.counter_value(TOKENS_CONSUMED_TOTAL, &[OVERFLOW_LABEL_VALUE, OVERFLOW_LABEL_VALUE]),
            Some(4900.0)
        );

        // Known label sets keep updating in place
        metrics.increment_tokens_consumed("openai", "model-3", 5);
        assert_eq!(
            metrics.counter_value(TOKENS_CONSUMED_TOTAL, &["openai", "model-3"]),
            Some(15.0)
        );

        let text = metrics.export().unwrap();
        let series = text
            .lines()
            .filter(|line| line.starts_with("penpal_tokens_consumed_total{"))
            .count();
        assert_eq!(series, 11);
    }

    #[test]
    fn test_zero_series_limit_rejected() {
        let err = MetricsRegistry::with_series_limit(0).unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)));
    }

    #[test]
    fn test_business_counters() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.increment_conversations(ConversationStatus::Created, 2);
        metrics.increment_conversations(ConversationStatus::Completed, 1);
        metrics.increment_payments(PaymentStatus::Success, 1, Some(29.99));
        metrics.increment_tokens_consumed("openai", "gpt-4", 1200);
        metrics.increment_tokens_consumed("openai", "gpt-4", 300);

        assert_eq!(metrics.counter_value(CONVERSATIONS_TOTAL, &["created"]), Some(2.0));
        assert_eq!(metrics.counter_value(PAYMENT_AMOUNT_TOTAL, &["success"]), Some(29.99));
        assert_eq!(
            metrics.counter_value(TOKENS_CONSUMED_TOTAL, &["openai", "gpt-4"]),
            Some(1500.0)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let labels = ["GET", "/api/v1/health", "200", "monitoring"];

        let handles: Vec<_> = (0..1000)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                tokio::spawn(async move {
                    metrics
                        .increment_counter(HTTP_REQUESTS_TOTAL, &labels, 1.0)
                        .unwrap();
                })
            })
            .collect();

        // Export while writers are running
        let reader = {
            let metrics = Arc::clone(&metrics);
            tokio::spawn(async move {
                for _ in 0..20 {
                    assert!(metrics.export().unwrap().contains("# TYPE"));
                    tokio::task::yield_now().await;
                }
            })
        };

        for handle in handles {
            handle.await.unwrap();
        }
        reader.await.unwrap();

        assert_eq!(metrics.counter_value(HTTP_REQUESTS_TOTAL, &labels), Some(1000.0));
    }

    #[test]
    fn test_normalize_route() {
        assert_eq!(normalize_route("/api/v1/health"), "/api/v1/health");
        assert_eq!(normalize_route("/api/v1/users/42?verbose=1"), "/api/v1/users/:id");
        assert_eq!(
            normalize_route("/users/3f2b8c1e-9d4a-4b7e-8f00-123456789abc/sessions"),
            "/users/:id/sessions"
        );
        assert_eq!(normalize_route("/objects/65a1f0c2e4b0a1b2c3d4e5f6"), "/objects/:id");
        assert_eq!(normalize_route(""), "/");
    }

    #[test]
    fn test_label_values_are_capped() {
        let long = "x".repeat(200);
        assert_eq!(normalize_label_value(&long).len(), MAX_LABEL_VALUE_LEN);
        assert_eq!(normalize_label_value("  en "), "en");
        assert_eq!(normalize_label_value(""), "unknown");
    }
}
