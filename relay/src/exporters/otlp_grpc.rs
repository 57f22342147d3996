//! OTLP/gRPC push exporter.

use super::Exporter;
use crate::error::ExportError;
use crate::otlp;
use crate::signal::{SignalBatch, SignalKind};
use async_trait::async_trait;
use opentelemetry_proto::tonic::collector::logs::v1::logs_service_client::LogsServiceClient;
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_client::MetricsServiceClient;
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_client::TraceServiceClient;
use tokio::sync::OnceCell;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::debug;

/// Forwards batches to a downstream OTLP/gRPC endpoint over a lazily
/// established, shared channel.
pub struct OtlpGrpcExporter {
    name: String,
    endpoint: String,
    insecure: bool,
    channel: OnceCell<Channel>,
}

impl OtlpGrpcExporter {
    pub fn new(name: &str, endpoint: &str, insecure: bool) -> Self {
        Self {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            insecure,
            channel: OnceCell::new(),
        }
    }

    async fn channel(&self) -> Result<Channel, ExportError> {
        let channel = self
            .channel
            .get_or_try_init(|| async {
                let scheme = if self.insecure { "http" } else { "https" };
                let uri = format!("{scheme}://{}", self.endpoint);
                let mut endpoint = Endpoint::from_shared(uri)?;
                if !self.insecure {
                    endpoint =
                        endpoint.tls_config(ClientTlsConfig::new().with_native_roots())?;
                }
                debug!(exporter = %self.name, endpoint = %self.endpoint, "opening grpc channel");
                Ok::<_, ExportError>(endpoint.connect_lazy())
            })
            .await?;
        Ok(channel.clone())
    }
}

#[async_trait]
impl Exporter for OtlpGrpcExporter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn export(&self, batch: &SignalBatch) -> Result<(), ExportError> {
        let channel = self.channel().await?;
        match batch.kind {
            SignalKind::Traces => {
                let request = otlp::encode_trace_request(batch);
                TraceServiceClient::new(channel).export(request).await?;
            }
            SignalKind::Metrics => {
                let request = otlp::encode_metrics_request(batch);
                MetricsServiceClient::new(channel).export(request).await?;
            }
            SignalKind::Logs => {
                let request = otlp::encode_logs_request(batch);
                LogsServiceClient::new(channel).export(request).await?;
            }
        }
        Ok(())
    }
}
