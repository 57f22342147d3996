//! OTLP/HTTP push exporter.

use super::Exporter;
use crate::config::Compression;
use crate::error::ExportError;
use crate::otlp;
use crate::signal::{SignalBatch, SignalKind};
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression as GzLevel;
use indexmap::IndexMap;
use prost::Message;
use std::io::Write;
use std::time::Duration;

/// Posts protobuf-encoded batches to `{endpoint}/v1/{signal}`.
pub struct OtlpHttpExporter {
    name: String,
    endpoint: String,
    compression: Option<Compression>,
    headers: IndexMap<String, String>,
    client: reqwest::Client,
}

impl OtlpHttpExporter {
    pub fn new(
        name: &str,
        endpoint: &str,
        compression: Option<Compression>,
        headers: IndexMap<String, String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            compression,
            headers,
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    fn encode(&self, batch: &SignalBatch) -> Result<(&'static str, Vec<u8>), ExportError> {
        let (path, payload) = match batch.kind {
            SignalKind::Traces => (
                "/v1/traces",
                otlp::encode_trace_request(batch).encode_to_vec(),
            ),
            SignalKind::Metrics => (
                "/v1/metrics",
                otlp::encode_metrics_request(batch).encode_to_vec(),
            ),
            SignalKind::Logs => ("/v1/logs", otlp::encode_logs_request(batch).encode_to_vec()),
        };
        let payload = match self.compression {
            Some(Compression::Gzip) => {
                let mut encoder = GzEncoder::new(Vec::new(), GzLevel::default());
                encoder
                    .write_all(&payload)
                    .and_then(|_| encoder.finish())
                    .map_err(|e| ExportError::Transport(format!("gzip encoding failed: {e}")))?
            }
            None => payload,
        };
        Ok((path, payload))
    }
}

#[async_trait]
impl Exporter for OtlpHttpExporter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn export(&self, batch: &SignalBatch) -> Result<(), ExportError> {
        let (path, payload) = self.encode(batch)?;
        let mut request = self
            .client
            .post(format!("{}{path}", self.endpoint))
            .header(reqwest::header::CONTENT_TYPE, "application/x-protobuf")
            .body(payload);
        if matches!(self.compression, Some(Compression::Gzip)) {
            request = request.header(reqwest::header::CONTENT_ENCODING, "gzip");
        }
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ExportError::Rejected(format!("HTTP {status}: {body}")))
        }
    }
}
