//! OTLP/gRPC receiver.

use crate::error::BindError;
use crate::otlp;
use crate::pipeline::PipelineEngine;
use opentelemetry_proto::tonic::collector::logs::v1::logs_service_server::{
    LogsService, LogsServiceServer,
};
use opentelemetry_proto::tonic::collector::logs::v1::{
    ExportLogsServiceRequest, ExportLogsServiceResponse,
};
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_server::{
    MetricsService, MetricsServiceServer,
};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_server::{
    TraceService, TraceServiceServer,
};
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

/// One service instance backs all three OTLP collector services.
#[derive(Clone)]
pub struct OtlpGrpcService {
    engine: Arc<PipelineEngine>,
}

impl OtlpGrpcService {
    pub fn new(engine: Arc<PipelineEngine>) -> Self {
        Self { engine }
    }
}

#[tonic::async_trait]
impl TraceService for OtlpGrpcService {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> Result<Response<ExportTraceServiceResponse>, Status> {
        let batch = otlp::decode_trace_request(request.into_inner());
        debug!(signals = batch.len(), "received trace export over grpc");
        self.engine.dispatch(batch).await;
        Ok(Response::new(ExportTraceServiceResponse::default()))
    }
}

#[tonic::async_trait]
impl MetricsService for OtlpGrpcService {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<Response<ExportMetricsServiceResponse>, Status> {
        let batch = otlp::decode_metrics_request(request.into_inner());
        debug!(signals = batch.len(), "received metrics export over grpc");
        self.engine.dispatch(batch).await;
        Ok(Response::new(ExportMetricsServiceResponse::default()))
    }
}

#[tonic::async_trait]
impl LogsService for OtlpGrpcService {
    async fn export(
        &self,
        request: Request<ExportLogsServiceRequest>,
    ) -> Result<Response<ExportLogsServiceResponse>, Status> {
        let batch = otlp::decode_logs_request(request.into_inner());
        debug!(signals = batch.len(), "received logs export over grpc");
        self.engine.dispatch(batch).await;
        Ok(Response::new(ExportLogsServiceResponse::default()))
    }
}

/// Binds the listener up front so address conflicts surface at startup.
pub async fn bind_grpc(addr: SocketAddr) -> Result<TcpListener, BindError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| BindError { addr, source })
}

/// Serves the three OTLP collector services until `shutdown` flips to true.
pub async fn serve_grpc(
    listener: TcpListener,
    engine: Arc<PipelineEngine>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), tonic::transport::Error> {
    let addr = listener.local_addr().ok();
    info!(addr = ?addr, "otlp/grpc receiver listening");
    let service = OtlpGrpcService::new(engine);
    tonic::transport::Server::builder()
        .add_service(TraceServiceServer::new(service.clone()))
        .add_service(MetricsServiceServer::new(service.clone()))
        .add_service(LogsServiceServer::new(service))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::exporters::testing::MockExporter;
    use crate::exporters::ExporterHandle;
    use crate::pipeline::Pipeline;
    use crate::signal::SignalKind;
    use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, KeyValue};
    use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span};
    use std::time::Duration;

    async fn engine_with_mock(kind: SignalKind) -> (Arc<PipelineEngine>, Arc<MockExporter>) {
        let mock = Arc::new(MockExporter::new());
        let handle = Arc::new(ExporterHandle::new(
            "mock",
            mock.clone(),
            RetryConfig::default(),
            Duration::from_secs(1),
        ));
        handle.start().await.unwrap();
        let pipeline = Arc::new(Pipeline::new(
            kind.as_str(),
            kind,
            vec![],
            vec![handle.clone()],
        ));
        (
            Arc::new(PipelineEngine::new(vec![pipeline], vec![handle])),
            mock,
        )
    }

    #[tokio::test]
    async fn test_trace_export_reaches_pipeline() {
        let (engine, mock) = engine_with_mock(SignalKind::Traces).await;
        let service = OtlpGrpcService::new(engine);

        let request = ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                resource: None,
                scope_spans: vec![ScopeSpans {
                    spans: vec![Span {
                        trace_id: vec![1; 16],
                        span_id: vec![2; 8],
                        name: "op".to_string(),
                        attributes: vec![KeyValue {
                            key: "k".to_string(),
                            value: Some(AnyValue {
                                value: Some(any_value::Value::StringValue("v".to_string())),
                            }),
                        }],
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };
        let response = TraceService::export(&service, Request::new(request))
            .await
            .unwrap();
        assert_eq!(response.into_inner(), ExportTraceServiceResponse::default());

        let exported = mock.exported.lock().unwrap();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].kind, SignalKind::Traces);
        assert_eq!(exported[0].len(), 1);
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown_signal() {
        let listener = bind_grpc("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let engine = Arc::new(PipelineEngine::new(vec![], vec![]));
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(serve_grpc(listener, engine, rx));

        tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("receiver did not stop after shutdown signal")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_export_without_matching_pipeline_is_acknowledged() {
        let (engine, mock) = engine_with_mock(SignalKind::Traces).await;
        let service = OtlpGrpcService::new(engine);

        // No logs pipeline exists; the export is still acknowledged.
        let response = LogsService::export(&service, Request::new(ExportLogsServiceRequest::default()))
            .await
            .unwrap();
        assert_eq!(response.into_inner(), ExportLogsServiceResponse::default());
        assert!(mock.exported.lock().unwrap().is_empty());
    }
}
