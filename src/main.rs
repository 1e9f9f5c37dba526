//! Service Monitor Binary

use actix_web::middleware::from_fn;
use actix_web::{App, HttpServer, web};
use clap::Parser;
use service_monitor::partners::PartnerClient;
use service_monitor::server::{configure, record_request};
use service_monitor::state::AppState;
use service_monitor::{
    Config, HealthAggregator, HttpProbe, MetricsCollector, MetricsRegistry, MonitorError, Result,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(version, about = "Polls downstream services and exposes health and metrics")]
struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    bind: String,

    /// Port for the HTTP server
    #[arg(long, env = "PORT", default_value_t = 3005)]
    port: u16,

    /// JSON file with the list of services to monitor
    #[arg(long, env = "SERVICES_CONFIG")]
    services_config: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<()> {
    // Initialize tracing
    initialize_tracing();

    let cli = Cli::parse();

    info!("Starting service monitor v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = Config::from_env();
    if let Some(path) = &cli.services_config {
        config = match config.with_services_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load services from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        };
    }

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    info!(
        "Monitoring {} services every {}s: {}",
        config.services.len(),
        config.collection_interval.as_secs(),
        config
            .services
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let registry = Arc::new(MetricsRegistry::with_series_limit(config.max_series_per_metric)?);
    let aggregator = Arc::new(HealthAggregator::new(
        config.services.clone(),
        Arc::new(HttpProbe::new()?),
    ));
    let partners = PartnerClient::new(config.partners.clone(), config.partner_timeout)?;
    let collector = Arc::new(MetricsCollector::new(
        Arc::clone(&aggregator),
        Arc::clone(&registry),
        partners,
        config.collection_interval,
    ));

    let collector_handle = Arc::clone(&collector).spawn();

    let state = web::Data::new(AppState::new(aggregator, registry, collector));

    info!("Listening on http://{}:{}", cli.bind, cli.port);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(from_fn(record_request))
            .configure(configure)
    })
    .bind((cli.bind.as_str(), cli.port))?
    .run();

    let served = server.await;

    info!("Shutting down service monitor");
    collector_handle.shutdown().await;

    served.map_err(MonitorError::Io)
}

/// Initialize structured logging
fn initialize_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .json();

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
