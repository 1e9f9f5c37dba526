//! HTTP surface over the monitoring core

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use crate::collector::CollectorStatus;
use crate::models::{HealthReport, ServiceHealth, ServiceStatus, SystemStatus};
use crate::state::AppState;
use crate::status::{AlertReport, derive_alerts};

/// `service` label on the HTTP metrics recorded for this process
pub const SERVICE_LABEL: &str = "monitoring";

const UNMATCHED_ROUTE_LABEL: &str = "__unmatched__";

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics_endpoint)).service(
        web::scope("/api/v1")
            .route("", web::get().to(service_info))
            .route("/status", web::get().to(process_status))
            .route("/health", web::get().to(liveness))
            .route("/health/services", web::get().to(services_health))
            .route("/health/summary", web::get().to(health_summary))
            .route("/metrics/summary", web::get().to(metrics_summary))
            .route("/metrics/services", web::get().to(services_metrics))
            .route("/monitoring/overview", web::get().to(system_overview))
            .route("/monitoring/alerts", web::get().to(alerts))
            .route("/monitoring/performance", web::get().to(performance)),
    );
}

/// Count and time every request by its matched route pattern
pub async fn record_request(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let registry = req
        .app_data::<web::Data<AppState>>()
        .map(|state| Arc::clone(&state.registry));
    let method = req.method().to_string();
    let route = req
        .match_pattern()
        .unwrap_or_else(|| UNMATCHED_ROUTE_LABEL.to_string());
    let started = Instant::now();

    let result = next.call(req).await;

    let status = match &result {
        Ok(response) => response.status(),
        Err(e) => e.error_response().status(),
    };
    if let Some(registry) = registry {
        registry.record_http_request(
            &method,
            &route,
            status.as_u16(),
            SERVICE_LABEL,
            started.elapsed().as_secs_f64(),
        );
    }

    result
}

pub async fn metrics_endpoint(data: web::Data<AppState>) -> impl Responder {
    match data.registry.export() {
        Ok(body) => HttpResponse::Ok()
            .content_type(data.registry.content_type())
            .body(body),
        Err(e) => {
            error!("Failed to export metrics: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Serialize)]
struct Endpoints {
    health: &'static str,
    metrics: &'static str,
    overview: &'static str,
}

#[derive(Serialize)]
struct ServiceInfo {
    service: &'static str,
    version: &'static str,
    description: &'static str,
    endpoints: Endpoints,
    features: [&'static str; 4],
}

pub async fn service_info() -> impl Responder {
    web::Json(ServiceInfo {
        service: "Service Monitor",
        version: env!("CARGO_PKG_VERSION"),
        description: "Health monitoring and metrics for the platform services",
        endpoints: Endpoints {
            health: "/api/v1/health",
            metrics: "/metrics",
            overview: "/api/v1/monitoring/overview",
        },
        features: [
            "Periodic metrics collection",
            "Prometheus integration",
            "Service health monitoring",
            "Performance analytics",
        ],
    })
}

#[derive(Serialize)]
struct ProcessStatus {
    status: &'static str,
    timestamp: DateTime<Utc>,
    uptime: u64,
    version: &'static str,
}

pub async fn process_status(data: web::Data<AppState>) -> impl Responder {
    web::Json(ProcessStatus {
        status: "healthy",
        timestamp: Utc::now(),
        uptime: data.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LivenessResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    uptime_seconds: u64,
}

pub async fn liveness(data: web::Data<AppState>) -> impl Responder {
    web::Json(LivenessResponse {
        status: "ok",
        timestamp: Utc::now(),
        uptime_seconds: data.uptime_seconds(),
    })
}

pub async fn services_health(data: web::Data<AppState>) -> impl Responder {
    let services = data.aggregator.check_all().await;
    debug!("Returning health of {} services", services.len());
    HttpResponse::Ok().json(services)
}

pub async fn health_summary(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.aggregator.report().await)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricsSummary {
    timestamp: DateTime<Utc>,
    health: HealthReport,
    collection: CollectorStatus,
}

pub async fn metrics_summary(data: web::Data<AppState>) -> impl Responder {
    let (health, collection) = tokio::join!(data.aggregator.report(), data.collector.status());
    HttpResponse::Ok().json(MetricsSummary {
        timestamp: Utc::now(),
        health,
        collection,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceMetricsEntry {
    name: String,
    status: ServiceStatus,
    response_time: u64,
    last_checked: DateTime<Utc>,
    metrics_available: bool,
}

#[derive(Serialize)]
struct ServicesMetrics {
    timestamp: DateTime<Utc>,
    services: Vec<ServiceMetricsEntry>,
}

/// Per-service view; metrics are only scraped from healthy services
pub async fn services_metrics(data: web::Data<AppState>) -> impl Responder {
    let services = data.aggregator.check_all().await;
    HttpResponse::Ok().json(ServicesMetrics {
        timestamp: Utc::now(),
        services: services
            .into_iter()
            .map(|service| ServiceMetricsEntry {
                metrics_available: service.is_healthy(),
                name: service.name,
                status: service.status,
                response_time: service.response_time_ms,
                last_checked: service.last_checked,
            })
            .collect(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceCounts {
    total: usize,
    healthy: usize,
    unhealthy: usize,
    percentage: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SystemOverview {
    timestamp: DateTime<Utc>,
    status: SystemStatus,
    services: ServiceCounts,
    alerts: usize,
    uptime_seconds: u64,
}

pub async fn system_overview(data: web::Data<AppState>) -> impl Responder {
    let report = data.aggregator.report().await;
    let summary = &report.summary;

    HttpResponse::Ok().json(SystemOverview {
        timestamp: Utc::now(),
        status: summary.system_status,
        services: ServiceCounts {
            total: summary.total_services,
            healthy: summary.healthy_services,
            unhealthy: summary.unhealthy_services,
            percentage: summary.percentage,
        },
        alerts: derive_alerts(&report.services).len(),
        uptime_seconds: data.uptime_seconds(),
    })
}

pub async fn alerts(data: web::Data<AppState>) -> impl Responder {
    let services = data.aggregator.check_all().await;
    HttpResponse::Ok().json(AlertReport::from_services(&services))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServicePerformance {
    name: String,
    response_time: u64,
    status: ServiceStatus,
}

impl From<&ServiceHealth> for ServicePerformance {
    fn from(service: &ServiceHealth) -> Self {
        Self {
            name: service.name.clone(),
            response_time: service.response_time_ms,
            status: service.status,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PerformanceMetrics {
    timestamp: DateTime<Utc>,
    average_response_time: u64,
    health_percentage: u32,
    uptime_seconds: u64,
    services: Vec<ServicePerformance>,
}

pub async fn performance(data: web::Data<AppState>) -> impl Responder {
    let report = data.aggregator.report().await;

    HttpResponse::Ok().json(PerformanceMetrics {
        timestamp: Utc::now(),
        average_response_time: report.summary.average_response_time_ms,
        health_percentage: report.summary.percentage,
        uptime_seconds: data.uptime_seconds(),
        services: report.services.iter().map(ServicePerformance::from).collect(),
    })
}
