//! Exporters and their delivery lifecycle.
//!
//! An [`Exporter`] knows how to deliver one batch to one downstream. The
//! [`ExporterHandle`] wraps it with everything delivery needs at runtime:
//! a lifecycle state machine, per-attempt timeouts, bounded retry with
//! backoff, and a small buffer of batches awaiting redelivery. One handle
//! exists per configured exporter and is shared by every pipeline that
//! references it.

mod otlp_grpc;
mod otlp_http;
mod prometheus;

pub use otlp_grpc::OtlpGrpcExporter;
pub use otlp_http::OtlpHttpExporter;
pub use prometheus::PrometheusExporter;

use crate::config::{ExporterConfig, RetryConfig};
use crate::error::{BindError, ExportError};
use crate::signal::SignalBatch;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Batches queued for redelivery beyond this count evict the oldest.
const RETRY_BUFFER_CAP: usize = 64;

#[async_trait]
pub trait Exporter: Send + Sync {
    fn name(&self) -> &str;

    /// One-time startup work. Pull exporters bind their listener here so a
    /// port conflict is a startup failure, not a runtime surprise.
    async fn start(&self) -> Result<(), BindError> {
        Ok(())
    }

    /// Delivers one batch. Implementations do a single attempt; retry policy
    /// lives in [`ExporterHandle`].
    async fn export(&self, batch: &SignalBatch) -> Result<(), ExportError>;

    /// Final cleanup after draining.
    async fn shutdown(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExporterState {
    Unstarted = 0,
    Running = 1,
    Draining = 2,
    Stopped = 3,
}

impl ExporterState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ExporterState::Unstarted,
            1 => ExporterState::Running,
            2 => ExporterState::Draining,
            _ => ExporterState::Stopped,
        }
    }
}

/// Runtime wrapper around a single exporter instance.
pub struct ExporterHandle {
    name: String,
    exporter: Arc<dyn Exporter>,
    state: AtomicU8,
    retry: RetryConfig,
    timeout: Duration,
    pending: Mutex<VecDeque<SignalBatch>>,
}

impl ExporterHandle {
    pub fn new(
        name: &str,
        exporter: Arc<dyn Exporter>,
        retry: RetryConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.to_string(),
            exporter,
            state: AtomicU8::new(ExporterState::Unstarted as u8),
            retry,
            timeout,
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ExporterState {
        ExporterState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub async fn start(&self) -> Result<(), BindError> {
        self.exporter.start().await?;
        self.state
            .store(ExporterState::Running as u8, Ordering::SeqCst);
        Ok(())
    }

    /// Delivers one batch with bounded retry. Returns `true` on success; on
    /// exhaustion the batch is parked for the next [`retry_pending`] round and
    /// `false` is returned.
    ///
    /// [`retry_pending`]: ExporterHandle::retry_pending
    pub async fn dispatch(&self, batch: SignalBatch) -> bool {
        if self.state() != ExporterState::Running {
            warn!(exporter = %self.name, "dropping batch: exporter is not running");
            return false;
        }
        match self.try_export(&batch).await {
            Ok(()) => true,
            Err(err) => {
                warn!(exporter = %self.name, error = %err, "export failed, queueing for retry");
                self.park(batch).await;
                false
            }
        }
    }

    async fn try_export(&self, batch: &SignalBatch) -> Result<(), ExportError> {
        let mut backoff = self.retry.initial_backoff;
        let mut last_err = ExportError::NotRunning;
        for attempt in 1..=self.retry.max_attempts {
            let result = tokio::time::timeout(self.timeout, self.exporter.export(batch)).await;
            match result {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(err)) => last_err = err,
                Err(_) => last_err = ExportError::Timeout,
            }
            if attempt < self.retry.max_attempts {
                debug!(
                    exporter = %self.name,
                    attempt,
                    error = %last_err,
                    "export attempt failed, backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff = backoff.mul_f64(self.retry.multiplier);
            }
        }
        Err(last_err)
    }

    async fn park(&self, batch: SignalBatch) {
        let mut pending = self.pending.lock().await;
        if pending.len() >= RETRY_BUFFER_CAP {
            warn!(exporter = %self.name, "retry buffer full, dropping oldest batch");
            pending.pop_front();
        }
        pending.push_back(batch);
    }

    /// Re-attempts parked batches once each, stopping at the first failure to
    /// avoid hammering a downstream that is still unavailable.
    pub async fn retry_pending(&self) {
        loop {
            let batch = {
                let mut pending = self.pending.lock().await;
                match pending.pop_front() {
                    Some(batch) => batch,
                    None => return,
                }
            };
            if let Err(err) = self.try_export(&batch).await {
                debug!(exporter = %self.name, error = %err, "redelivery failed, keeping batch");
                let mut pending = self.pending.lock().await;
                pending.push_front(batch);
                return;
            }
        }
    }

    /// Accepts a final batch during shutdown and attempts redelivery of the
    /// backlog, all under `deadline`. Whatever is undelivered when the
    /// deadline passes is discarded with a warning.
    pub async fn drain(&self, final_batch: Option<SignalBatch>, deadline: Duration) {
        self.state
            .store(ExporterState::Draining as u8, Ordering::SeqCst);

        let flush = async {
            if let Some(batch) = final_batch {
                if let Err(err) = self.try_export(&batch).await {
                    warn!(exporter = %self.name, error = %err, "failed to deliver final batch");
                }
            }
            self.retry_pending().await;
        };
        if tokio::time::timeout(deadline, flush).await.is_err() {
            let remaining = self.pending.lock().await.len();
            warn!(
                exporter = %self.name,
                remaining_batches = remaining,
                "drain deadline exceeded, discarding undelivered telemetry"
            );
        }

        self.exporter.shutdown().await;
        self.state
            .store(ExporterState::Stopped as u8, Ordering::SeqCst);
    }
}

/// Instantiates an exporter and its handle from validated config.
pub fn build_exporter(name: &str, config: &ExporterConfig) -> Arc<ExporterHandle> {
    let no_retry = RetryConfig {
        max_attempts: 1,
        ..RetryConfig::default()
    };
    let (exporter, retry, timeout): (Arc<dyn Exporter>, RetryConfig, Duration) = match config {
        ExporterConfig::OtlpGrpc {
            endpoint,
            insecure,
            timeout,
            retry,
        } => (
            Arc::new(OtlpGrpcExporter::new(name, endpoint, *insecure)),
            *retry,
            *timeout,
        ),
        ExporterConfig::OtlpHttp {
            endpoint,
            compression,
            headers,
            timeout,
            retry,
        } => (
            Arc::new(OtlpHttpExporter::new(
                name,
                endpoint,
                *compression,
                headers.clone(),
                *timeout,
            )),
            *retry,
            *timeout,
        ),
        ExporterConfig::Prometheus {
            endpoint,
            const_labels,
            send_timestamps,
            metric_expiration,
        } => (
            Arc::new(PrometheusExporter::new(
                name,
                *endpoint,
                const_labels.clone(),
                *send_timestamps,
                *metric_expiration,
            )),
            // Scrape-state updates are local and cannot fail transiently.
            no_retry,
            Duration::from_secs(5),
        ),
    };
    Arc::new(ExporterHandle::new(name, exporter, retry, timeout))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Captures exported batches; optionally fails the first N exports.
    pub struct MockExporter {
        pub exported: Arc<std::sync::Mutex<Vec<SignalBatch>>>,
        pub fail_first: std::sync::atomic::AtomicU32,
    }

    impl MockExporter {
        pub fn new() -> Self {
            Self {
                exported: Arc::new(std::sync::Mutex::new(Vec::new())),
                fail_first: std::sync::atomic::AtomicU32::new(0),
            }
        }

        pub fn failing(times: u32) -> Self {
            let mock = Self::new();
            mock.fail_first.store(times, Ordering::SeqCst);
            mock
        }
    }

    #[async_trait]
    impl Exporter for MockExporter {
        fn name(&self) -> &str {
            "mock"
        }

        async fn export(&self, batch: &SignalBatch) -> Result<(), ExportError> {
            let remaining = self.fail_first.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_first.store(remaining - 1, Ordering::SeqCst);
                return Err(ExportError::Transport("injected failure".to_string()));
            }
            self.exported.lock().unwrap().push(batch.clone());
            Ok(())
        }
    }
}
