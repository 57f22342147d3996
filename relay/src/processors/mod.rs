//! Pipeline processors.
//!
//! A processor receives a batch, transforms or withholds it, and hands the
//! result to the next stage. Processing is infallible: a processor never
//! rejects telemetry, it only reshapes or defers it.

mod attributes;
mod batch;

pub use attributes::AttributesProcessor;
pub use batch::BatchProcessor;

use crate::config::ProcessorConfig;
use crate::signal::SignalBatch;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    /// Processes one batch. Returning `None` means the batch was absorbed
    /// (e.g. buffered) and nothing flows downstream right now.
    async fn process(&self, batch: SignalBatch) -> Option<SignalBatch>;

    /// Called periodically by the pipeline ticker. Returns a batch whose
    /// time-based condition has come due, if any.
    async fn flush_due(&self) -> Option<SignalBatch> {
        None
    }

    /// Called at shutdown. Returns everything still buffered.
    async fn flush_all(&self) -> Option<SignalBatch> {
        None
    }
}

/// Instantiates a processor from its validated config. Each pipeline gets its
/// own instance so buffers are never shared across pipelines.
pub fn build_processor(name: &str, config: &ProcessorConfig) -> Arc<dyn Processor> {
    match config {
        ProcessorConfig::Batch {
            timeout,
            send_batch_size,
        } => Arc::new(BatchProcessor::new(name, *timeout, *send_batch_size)),
        ProcessorConfig::Attributes { actions } => {
            Arc::new(AttributesProcessor::new(name, actions.clone()))
        }
    }
}
