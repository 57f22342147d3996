//! Size- and time-bounded batching.

use super::Processor;
use crate::signal::{Signal, SignalBatch, SignalKind};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct Buffer {
    signals: Vec<Signal>,
    kind: Option<SignalKind>,
    last_flush: Instant,
}

/// Accumulates incoming signals and releases them either when the buffer
/// reaches `send_batch_size` or when `timeout` has elapsed since the last
/// flush. Preserves arrival order.
pub struct BatchProcessor {
    name: String,
    timeout: Duration,
    send_batch_size: usize,
    buffer: Mutex<Buffer>,
}

impl BatchProcessor {
    pub fn new(name: &str, timeout: Duration, send_batch_size: usize) -> Self {
        Self {
            name: name.to_string(),
            timeout,
            send_batch_size,
            buffer: Mutex::new(Buffer {
                signals: Vec::new(),
                kind: None,
                last_flush: Instant::now(),
            }),
        }
    }

    fn drain(buffer: &mut Buffer) -> Option<SignalBatch> {
        let kind = buffer.kind?;
        buffer.last_flush = Instant::now();
        if buffer.signals.is_empty() {
            return None;
        }
        Some(SignalBatch::new(kind, std::mem::take(&mut buffer.signals)))
    }
}

#[async_trait]
impl Processor for BatchProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, batch: SignalBatch) -> Option<SignalBatch> {
        let mut buffer = self.buffer.lock().await;
        buffer.kind = Some(batch.kind);
        buffer.signals.extend(batch.signals);
        if buffer.signals.len() >= self.send_batch_size {
            Self::drain(&mut buffer)
        } else {
            None
        }
    }

    async fn flush_due(&self) -> Option<SignalBatch> {
        let mut buffer = self.buffer.lock().await;
        if buffer.last_flush.elapsed() < self.timeout {
            return None;
        }
        Self::drain(&mut buffer)
    }

    async fn flush_all(&self) -> Option<SignalBatch> {
        let mut buffer = self.buffer.lock().await;
        Self::drain(&mut buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{Attributes, LogRecord};

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

    #[tokio::test]
    async fn test_buffers_until_size_reached() {
        let processor = BatchProcessor::new("batch", Duration::from_secs(60), 5);
        assert!(processor.process(log_batch(3)).await.is_none());
        let released = processor.process(log_batch(3)).await.unwrap();
        assert_eq!(released.len(), 6);
        assert_eq!(released.kind, SignalKind::Logs);
    }

    #[tokio::test]
    async fn test_flush_due_respects_timeout() {
        let processor = BatchProcessor::new("batch", Duration::from_millis(20), 100);
        assert!(processor.process(log_batch(2)).await.is_none());
        assert!(processor.flush_due().await.is_none());

        tokio::time::sleep(Duration::from_millis(30)).await;
        let released = processor.flush_due().await.unwrap();
        assert_eq!(released.len(), 2);
        // The buffer is empty now, another due flush yields nothing.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(processor.flush_due().await.is_none());
    }

    #[tokio::test]
    async fn test_flush_all_drains_remainder() {
        let processor = BatchProcessor::new("batch", Duration::from_secs(60), 100);
        processor.process(log_batch(4)).await;
        let released = processor.flush_all().await.unwrap();
        assert_eq!(released.len(), 4);
        assert!(processor.flush_all().await.is_none());
    }

    #[tokio::test]
    async fn test_preserves_order() {
        let processor = BatchProcessor::new("batch", Duration::from_secs(60), 4);
        processor.process(log_batch(2)).await;
        let released = processor.process(log_batch(2)).await.unwrap();
        let times: Vec<u64> = released.signals.iter().map(|s| s.time_unix_nano()).collect();
        assert_eq!(times, vec![0, 1, 0, 1]);
    }
}
