//! Pipeline assembly and routing.
//!
//! A [`Pipeline`] chains an ordered processor list in front of a set of
//! exporter handles. The [`PipelineEngine`] owns every pipeline plus the
//! deduplicated exporter handles, routes inbound batches by signal kind, and
//! drives the periodic tick that releases time-based batches and retries
//! parked deliveries.

use crate::exporters::ExporterHandle;
use crate::processors::Processor;
use crate::signal::{SignalBatch, SignalKind};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

const TICK_INTERVAL: Duration = Duration::from_millis(100);

pub struct Pipeline {
    name: String,
    kind: SignalKind,
    processors: Vec<Arc<dyn Processor>>,
    exporters: Vec<Arc<ExporterHandle>>,
}

impl Pipeline {
    pub fn new(
        name: &str,
        kind: SignalKind,
        processors: Vec<Arc<dyn Processor>>,
        exporters: Vec<Arc<ExporterHandle>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            processors,
            exporters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    /// Runs a batch through processors starting at `from`, then fans out.
    async fn run_from(&self, from: usize, mut batch: SignalBatch) {
        for processor in &self.processors[from..] {
            match processor.process(batch).await {
                Some(next) => batch = next,
                // Absorbed (buffered); the ticker will pick it up later.
                None => return,
            }
        }
        self.fan_out(batch).await;
    }

    pub async fn submit(&self, batch: SignalBatch) {
        debug_assert_eq!(batch.kind, self.kind);
        self.run_from(0, batch).await;
    }

    /// Each exporter gets its own copy; one failing downstream never blocks
    /// delivery to its siblings.
    async fn fan_out(&self, batch: SignalBatch) {
        if batch.is_empty() {
            return;
        }
        let deliveries = self
            .exporters
            .iter()
            .map(|handle| handle.dispatch(batch.clone()));
        let results = join_all(deliveries).await;
        if !results.iter().any(|ok| *ok) {
            warn!(
                pipeline = %self.name,
                signals = batch.len(),
                "no exporter accepted the batch"
            );
        }
    }

    /// Releases time-due batches from buffering processors. A batch released
    /// by processor `i` still flows through processors `i+1..`.
    pub async fn tick(&self) {
        for i in 0..self.processors.len() {
            if let Some(batch) = self.processors[i].flush_due().await {
                self.run_from(i + 1, batch).await;
            }
        }
    }

    /// Drains every processor buffer at shutdown, preserving stage order.
    pub async fn flush_all(&self) {
        for i in 0..self.processors.len() {
            if let Some(batch) = self.processors[i].flush_all().await {
                self.run_from(i + 1, batch).await;
            }
        }
    }
}

pub struct PipelineEngine {
    pipelines: Vec<Arc<Pipeline>>,
    exporters: Vec<Arc<ExporterHandle>>,
}

impl PipelineEngine {
    pub fn new(pipelines: Vec<Arc<Pipeline>>, exporters: Vec<Arc<ExporterHandle>>) -> Self {
        Self {
            pipelines,
            exporters,
        }
    }

    pub fn pipelines(&self) -> &[Arc<Pipeline>] {
        &self.pipelines
    }

    pub fn exporters(&self) -> &[Arc<ExporterHandle>] {
        &self.exporters
    }

    /// Routes a decoded batch to every pipeline of its kind.
    pub async fn dispatch(&self, batch: SignalBatch) {
        let targets: Vec<&Arc<Pipeline>> = self
            .pipelines
            .iter()
            .filter(|p| p.kind() == batch.kind)
            .collect();
        if targets.is_empty() {
            debug!(kind = %batch.kind, "no pipeline configured for signal kind, dropping");
            return;
        }
        join_all(targets.iter().map(|p| p.submit(batch.clone()))).await;
    }

    /// Spawns the tick loop. It stops when `shutdown` flips to true.
    pub fn start_ticker(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        for pipeline in &engine.pipelines {
                            pipeline.tick().await;
                        }
                        for handle in &engine.exporters {
                            handle.retry_pending().await;
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                }
            }
        });
    }

    /// Orderly shutdown: flush every processor buffer while exporters still
    /// accept work, then drain each exporter. The flush and the drains share
    /// one deadline budget, so a stuck downstream cannot stretch shutdown
    /// beyond `deadline` via the flush phase's retry attempts.
    pub async fn shutdown(&self, deadline: Duration) {
        let started = tokio::time::Instant::now();
        let flush = async {
            for pipeline in &self.pipelines {
                pipeline.flush_all().await;
            }
        };
        if tokio::time::timeout(deadline, flush).await.is_err() {
            warn!("shutdown deadline exceeded while flushing pipeline buffers");
        }

        let remaining = deadline.saturating_sub(started.elapsed());
        join_all(
            self.exporters
                .iter()
                .map(|handle| handle.drain(None, remaining)),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::exporters::testing::MockExporter;
    use crate::exporters::{Exporter, ExporterState};
    use crate::processors::{AttributesProcessor, BatchProcessor};
    use crate::signal::{AttrValue, Attributes, LogRecord, Signal};

    fn log_batch(count: usize) -> SignalBatch {
        let signals = (0..count)
            .map(|i| {
                Signal::Log(LogRecord {
                    time_unix_nano: i as u64,
                    severity_number: 9,
                    severity_text: "INFO".into(),
                    body: None,
                    attributes: Attributes::new(),
                    trace_id: None,
                    span_id: None,
                    resource: Attributes::new(),
                })
            })
            .collect();
        SignalBatch::new(SignalKind::Logs, signals)
    }

    struct StuckExporter;

    #[async_trait::async_trait]
    impl Exporter for StuckExporter {
        fn name(&self) -> &str {
            "stuck"
        }
        async fn export(&self, _: &SignalBatch) -> Result<(), crate::error::ExportError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            initial_backoff: Duration::from_millis(1),
            multiplier: 2.0,
            max_attempts: 1,
        }
    }

    async fn started_handle(mock: Arc<MockExporter>) -> Arc<ExporterHandle> {
        let handle = Arc::new(ExporterHandle::new(
            "mock",
            mock,
            fast_retry(),
            Duration::from_secs(1),
        ));
        handle.start().await.unwrap();
        handle
    }

    #[tokio::test]
    async fn test_processors_run_in_declared_order() {
        use crate::config::{AttributeAction, AttributeActionKind};
        // upsert k=first, then upsert k=second: declared order means the
        // second value survives.
        let first = AttributesProcessor::new(
            "attributes/first",
            vec![AttributeAction {
                key: "k".into(),
                value: Some(AttrValue::String("first".into())),
                action: AttributeActionKind::Upsert,
            }],
        );
        let second = AttributesProcessor::new(
            "attributes/second",
            vec![AttributeAction {
                key: "k".into(),
                value: Some(AttrValue::String("second".into())),
                action: AttributeActionKind::Upsert,
            }],
        );
        let mock = Arc::new(MockExporter::new());
        let pipeline = Pipeline::new(
            "logs",
            SignalKind::Logs,
            vec![Arc::new(first), Arc::new(second)],
            vec![started_handle(mock.clone()).await],
        );

        pipeline.submit(log_batch(1)).await;
        let exported = mock.exported.lock().unwrap();
        let Signal::Log(record) = &exported[0].signals[0] else {
            panic!("expected a log");
        };
        assert_eq!(
            record.attributes["k"],
            AttrValue::String("second".into())
        );
    }

    #[tokio::test]
    async fn test_fan_out_isolates_failing_exporter() {
        let failing = Arc::new(MockExporter::failing(10));
        let healthy = Arc::new(MockExporter::new());
        let pipeline = Pipeline::new(
            "logs",
            SignalKind::Logs,
            vec![],
            vec![
                started_handle(failing.clone()).await,
                started_handle(healthy.clone()).await,
            ],
        );

        pipeline.submit(log_batch(2)).await;
        pipeline.submit(log_batch(3)).await;

        assert!(failing.exported.lock().unwrap().is_empty());
        let delivered = healthy.exported.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].len(), 2);
        assert_eq!(delivered[1].len(), 3);
    }

    #[tokio::test]
    async fn test_batch_released_by_tick_reaches_exporters() {
        let mock = Arc::new(MockExporter::new());
        let batcher = BatchProcessor::new("batch", Duration::from_millis(10), 1000);
        let pipeline = Pipeline::new(
            "logs",
            SignalKind::Logs,
            vec![Arc::new(batcher)],
            vec![started_handle(mock.clone()).await],
        );

        pipeline.submit(log_batch(2)).await;
        assert!(mock.exported.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;
        pipeline.tick().await;
        assert_eq!(mock.exported.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_engine_routes_by_kind() {
        let logs_mock = Arc::new(MockExporter::new());
        let metrics_mock = Arc::new(MockExporter::new());
        let logs_handle = started_handle(logs_mock.clone()).await;
        let metrics_handle = started_handle(metrics_mock.clone()).await;
        let engine = PipelineEngine::new(
            vec![
                Arc::new(Pipeline::new(
                    "logs",
                    SignalKind::Logs,
                    vec![],
                    vec![logs_handle.clone()],
                )),
                Arc::new(Pipeline::new(
                    "metrics",
                    SignalKind::Metrics,
                    vec![],
                    vec![metrics_handle.clone()],
                )),
            ],
            vec![logs_handle, metrics_handle],
        );

        engine.dispatch(log_batch(1)).await;
        assert_eq!(logs_mock.exported.lock().unwrap().len(), 1);
        assert!(metrics_mock.exported.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_flushes_buffers_and_stops_exporters() {
        let mock = Arc::new(MockExporter::new());
        let handle = started_handle(mock.clone()).await;
        let batcher = BatchProcessor::new("batch", Duration::from_secs(60), 1000);
        let engine = PipelineEngine::new(
            vec![Arc::new(Pipeline::new(
                "logs",
                SignalKind::Logs,
                vec![Arc::new(batcher)],
                vec![handle.clone()],
            ))],
            vec![handle.clone()],
        );

        engine.dispatch(log_batch(5)).await;
        assert!(mock.exported.lock().unwrap().is_empty());

        engine.shutdown(Duration::from_secs(1)).await;
        assert_eq!(mock.exported.lock().unwrap().len(), 1);
        assert_eq!(mock.exported.lock().unwrap()[0].len(), 5);
        assert_eq!(handle.state(), ExporterState::Stopped);
    }

    #[tokio::test]
    async fn test_drain_deadline_discards_stuck_backlog() {
        let handle = Arc::new(ExporterHandle::new(
            "stuck",
            Arc::new(StuckExporter),
            fast_retry(),
            Duration::from_millis(10),
        ));
        handle.start().await.unwrap();
        let engine = PipelineEngine::new(
            vec![Arc::new(Pipeline::new(
                "logs",
                SignalKind::Logs,
                vec![],
                vec![handle.clone()],
            ))],
            vec![handle.clone()],
        );

        // Every attempt times out, so this batch ends up parked.
        engine.dispatch(log_batch(1)).await;

        let started = std::time::Instant::now();
        engine.shutdown(Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(handle.state(), ExporterState::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_deadline_bounds_buffer_flush() {
        // A buffered batch must not let the flush phase burn the full
        // per-exporter retry budget against a hung downstream.
        let handle = Arc::new(ExporterHandle::new(
            "stuck",
            Arc::new(StuckExporter),
            RetryConfig {
                initial_backoff: Duration::from_millis(500),
                multiplier: 2.0,
                max_attempts: 3,
            },
            Duration::from_secs(1),
        ));
        handle.start().await.unwrap();
        let batcher = BatchProcessor::new("batch", Duration::from_secs(60), 1000);
        let engine = PipelineEngine::new(
            vec![Arc::new(Pipeline::new(
                "logs",
                SignalKind::Logs,
                vec![Arc::new(batcher)],
                vec![handle.clone()],
            ))],
            vec![handle.clone()],
        );

        engine.dispatch(log_batch(1)).await;

        let started = std::time::Instant::now();
        engine.shutdown(Duration::from_millis(100)).await;
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(handle.state(), ExporterState::Stopped);
    }
}
