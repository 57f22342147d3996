//! Prometheus pull exporter.
//!
//! Unlike the push exporters this one never initiates delivery: `export`
//! folds metric points into a scrape registry and an HTTP listener serves
//! `/metrics` in text exposition format. Binding happens in `start` so a
//! port conflict aborts startup.

use super::Exporter;
use crate::error::{BindError, ExportError};
use crate::signal::{MetricValue, Signal, SignalBatch};
use async_trait::async_trait;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use indexmap::IndexMap;
use prom_pull_exporter::{MetricsRegistry, SeriesKind};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub struct PrometheusExporter {
    name: String,
    endpoint: SocketAddr,
    registry: Arc<MetricsRegistry>,
    server: Mutex<Option<JoinHandle<()>>>,
}

impl PrometheusExporter {
    pub fn new(
        name: &str,
        endpoint: SocketAddr,
        const_labels: IndexMap<String, String>,
        send_timestamps: bool,
        metric_expiration: Duration,
    ) -> Self {
        let registry = MetricsRegistry::builder()
            .const_labels(const_labels.into_iter().collect())
            .send_timestamps(send_timestamps)
            .metric_expiration(metric_expiration)
            .build();
        Self {
            name: name.to_string(),
            endpoint,
            registry: Arc::new(registry),
            server: Mutex::new(None),
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> Arc<MetricsRegistry> {
        self.registry.clone()
    }
}

async fn serve_metrics(State(registry): State<Arc<MetricsRegistry>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        registry.render(),
    )
}

/// Cumulative monotonic sums become counters; the exposition convention wants
/// a `_total` suffix on those.
fn counter_name(name: &str) -> String {
    if name.ends_with("_total") {
        name.to_string()
    } else {
        format!("{name}_total")
    }
}

#[async_trait]
impl Exporter for PrometheusExporter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), BindError> {
        let listener = std::net::TcpListener::bind(self.endpoint).map_err(|source| BindError {
            addr: self.endpoint,
            source,
        })?;
        listener.set_nonblocking(true).map_err(|source| BindError {
            addr: self.endpoint,
            source,
        })?;
        let listener = tokio::net::TcpListener::from_std(listener).map_err(|source| BindError {
            addr: self.endpoint,
            source,
        })?;
        info!(exporter = %self.name, addr = %self.endpoint, "serving /metrics");

        let router = Router::new()
            .route("/metrics", get(serve_metrics))
            .with_state(self.registry.clone());
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                tracing::error!(error = %err, "metrics listener failed");
            }
        });
        if let Ok(mut guard) = self.server.lock() {
            *guard = Some(handle);
        }
        Ok(())
    }

    async fn export(&self, batch: &SignalBatch) -> Result<(), ExportError> {
        for signal in &batch.signals {
            let Signal::Metric(point) = signal else {
                continue;
            };
            let labels: Vec<(String, String)> = point
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect();
            let timestamp_ms = (point.time_unix_nano != 0)
                .then(|| (point.time_unix_nano / 1_000_000) as i64);

            match point.value {
                MetricValue::Gauge(value) => {
                    self.registry
                        .set(SeriesKind::Gauge, &point.name, &labels, value, timestamp_ms);
                }
                MetricValue::Sum {
                    value,
                    monotonic: true,
                    cumulative: true,
                } => {
                    // Re-delivery of the same running total is idempotent.
                    self.registry.set(
                        SeriesKind::Counter,
                        &counter_name(&point.name),
                        &labels,
                        value,
                        timestamp_ms,
                    );
                }
                MetricValue::Sum {
                    value,
                    monotonic: true,
                    cumulative: false,
                } => {
                    self.registry
                        .add(&counter_name(&point.name), &labels, value, timestamp_ms);
                }
                MetricValue::Sum {
                    value,
                    monotonic: false,
                    ..
                } => {
                    // Non-monotonic sums can go down, expose them as gauges.
                    self.registry
                        .set(SeriesKind::Gauge, &point.name, &labels, value, timestamp_ms);
                }
            }
        }
        debug!(exporter = %self.name, series = self.registry.series_count(), "registry updated");
        Ok(())
    }

    async fn shutdown(&self) {
        if let Ok(mut guard) = self.server.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}
