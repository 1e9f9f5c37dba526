//! Background metrics collection loop

use crate::aggregator::HealthAggregator;
use crate::metrics::{ConversationStatus, MetricsRegistry, PaymentStatus};
use crate::partners::PartnerClient;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, instrument, warn};

/// Outcome of one collection cycle
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub services_checked: usize,
    pub healthy_services: usize,
    pub partner_failures: usize,
}

/// Collector state as seen by the metrics summary view
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorStatus {
    pub running: bool,
    pub cycles: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_report: Option<CycleReport>,
    pub interval_seconds: u64,
}

#[derive(Debug, Default)]
struct CollectorState {
    running: bool,
    cycles: u64,
    last_run: Option<DateTime<Utc>>,
    last_report: Option<CycleReport>,
}

/// Periodically pushes health and business metrics into the registry
pub struct MetricsCollector {
    aggregator: Arc<HealthAggregator>,
    registry: Arc<MetricsRegistry>,
    partners: PartnerClient,
    interval: Duration,
    state: RwLock<CollectorState>,
}

/// Handle to a running collector task
pub struct CollectorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CollectorHandle {
    /// Stop the loop and wait for the in-flight cycle to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Collector task ended abnormally: {}", e);
        }
    }
}

impl MetricsCollector {
    pub fn new(
        aggregator: Arc<HealthAggregator>,
        registry: Arc<MetricsRegistry>,
        partners: PartnerClient,
        interval: Duration,
    ) -> Self {
        Self {
            aggregator,
            registry,
            partners,
            interval,
            state: RwLock::new(CollectorState::default()),
        }
    }

    /// Run the collection loop on its own task
    pub fn spawn(self: Arc<Self>) -> CollectorHandle {
        let (shutdown, receiver) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(receiver).await });
        CollectorHandle { shutdown, task }
    }

    /// Collect on every tick until the shutdown signal flips or its sender is dropped.
    /// The first cycle runs immediately.
    #[instrument(skip_all)]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting metrics collector, interval {}s",
            self.interval.as_secs()
        );
        self.state.write().await.running = true;

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.collect_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.state.write().await.running = false;
        info!("Metrics collector stopped");
    }

    /// One full cycle. Downstream failures are logged and counted, never returned.
    pub async fn collect_once(&self) -> CycleReport {
        let services = self.aggregator.check_all().await;
        for service in &services {
            self.registry
                .set_service_health(&service.name, &service.url, service.is_healthy());
            self.registry
                .set_service_response_time(&service.name, service.response_time_ms);
        }

        let (users, conversations, tokens, payments) = tokio::join!(
            self.collect_user_metrics(),
            self.collect_conversation_metrics(),
            self.collect_token_metrics(),
            self.collect_payment_metrics(),
        );
        let partner_failures = [users, conversations, tokens, payments]
            .iter()
            .filter(|ok| !**ok)
            .count();

        let report = CycleReport {
            services_checked: services.len(),
            healthy_services: services.iter().filter(|s| s.is_healthy()).count(),
            partner_failures,
        };

        debug!(
            "Collection cycle done - {}/{} services healthy, {} partner failures",
            report.healthy_services, report.services_checked, report.partner_failures
        );

        let mut state = self.state.write().await;
        state.cycles += 1;
        state.last_run = Some(Utc::now());
        state.last_report = Some(report.clone());

        report
    }

    async fn collect_user_metrics(&self) -> bool {
        match self.partners.user_metrics().await {
            Ok(metrics) => {
                self.registry.set_active_users(metrics.active_users);
                self.registry.set_total_users(metrics.total_users);
                for (language, count) in &metrics.users_by_language {
                    self.registry.set_users_by_language(language, *count);
                }
                for (language, level) in &metrics.average_user_level {
                    self.registry.set_average_user_level(language, *level);
                }
                true
            }
            Err(e) => {
                warn!("Failed to collect user metrics: {}", e);
                false
            }
        }
    }

    async fn collect_conversation_metrics(&self) -> bool {
        match self.partners.conversation_metrics().await {
            Ok(metrics) => {
                self.registry
                    .increment_conversations(ConversationStatus::Created, metrics.new_conversations);
                self.registry.increment_conversations(
                    ConversationStatus::Completed,
                    metrics.completed_conversations,
                );
                self.registry
                    .increment_conversations(ConversationStatus::Failed, metrics.failed_conversations);
                true
            }
            Err(e) => {
                warn!("Failed to collect conversation metrics: {}", e);
                false
            }
        }
    }

    async fn collect_token_metrics(&self) -> bool {
        match self.partners.token_metrics().await {
            Ok(metrics) => {
                for usage in &metrics.usage {
                    self.registry
                        .increment_tokens_consumed(&usage.provider, &usage.model, usage.tokens);
                }
                true
            }
            Err(e) => {
                warn!("Failed to collect token metrics: {}", e);
                false
            }
        }
    }

    async fn collect_payment_metrics(&self) -> bool {
        match self.partners.payment_metrics().await {
            Ok(metrics) => {
                self.registry.increment_payments(
                    PaymentStatus::Success,
                    metrics.successful_payments,
                    Some(metrics.total_amount),
                );
                self.registry
                    .increment_payments(PaymentStatus::Failed, metrics.failed_payments, None);
                self.registry
                    .increment_payments(PaymentStatus::Pending, metrics.pending_payments, None);
                true
            }
            Err(e) => {
                warn!("Failed to collect payment metrics: {}", e);
                false
            }
        }
    }

    pub async fn status(&self) -> CollectorStatus {
        let state = self.state.read().await;
        CollectorStatus {
            running: state.running,
            cycles: state.cycles,
            last_run: state.last_run,
            last_report: state.last_report.clone(),
            interval_seconds: self.interval.as_secs(),
        }
    }
}
