//! OTLP/HTTP receiver.
//!
//! Accepts POSTs on the standard `/v1/{traces,metrics,logs}` paths in either
//! binary protobuf or JSON encoding, optionally gzip-compressed. Decode
//! failures produce a 4xx for that request only.

use crate::error::{BindError, DecodeError};
use crate::otlp;
use crate::pipeline::PipelineEngine;
use crate::signal::SignalBatch;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use prost::Message;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";
const CONTENT_TYPE_JSON: &str = "application/json";

enum Encoding {
    Protobuf,
    Json,
}

fn request_encoding(headers: &HeaderMap) -> Result<Encoding, DecodeError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let bare = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match bare.as_str() {
        CONTENT_TYPE_PROTOBUF => Ok(Encoding::Protobuf),
        CONTENT_TYPE_JSON => Ok(Encoding::Json),
        _ => Err(DecodeError::UnsupportedContentType(content_type.to_string())),
    }
}

fn decompress(headers: &HeaderMap, body: Bytes) -> Result<Vec<u8>, DecodeError> {
    let gzipped = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));
    if !gzipped {
        return Ok(body.to_vec());
    }
    let mut decoded = Vec::new();
    flate2::read::GzDecoder::new(&body[..])
        .read_to_end(&mut decoded)
        .map_err(DecodeError::Decompress)?;
    Ok(decoded)
}

fn decode_request<T>(headers: &HeaderMap, body: Bytes) -> Result<(T, Encoding), DecodeError>
where
    T: Message + Default + serde::de::DeserializeOwned,
{
    let encoding = request_encoding(headers)?;
    let payload = decompress(headers, body)?;
    let request = match encoding {
        Encoding::Protobuf => T::decode(payload.as_slice())?,
        Encoding::Json => serde_json::from_slice(&payload)?,
    };
    Ok((request, encoding))
}

fn decode_failure(err: DecodeError) -> Response {
    let status = match err {
        DecodeError::UnsupportedContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        _ => StatusCode::BAD_REQUEST,
    };
    warn!(error = %err, "rejecting malformed export request");
    (status, err.to_string()).into_response()
}

/// The empty partial-success response in the encoding the client used.
fn acknowledge<T>(encoding: Encoding) -> Response
where
    T: Message + Default + serde::Serialize,
{
    match encoding {
        Encoding::Protobuf => (
            [(header::CONTENT_TYPE, CONTENT_TYPE_PROTOBUF)],
            T::default().encode_to_vec(),
        )
            .into_response(),
        Encoding::Json => (
            [(header::CONTENT_TYPE, CONTENT_TYPE_JSON)],
            serde_json::to_vec(&T::default()).unwrap_or_else(|_| b"{}".to_vec()),
        )
            .into_response(),
    }
}

async fn handle_export<T, R>(
    engine: Arc<PipelineEngine>,
    headers: HeaderMap,
    body: Bytes,
    convert: fn(T) -> SignalBatch,
) -> Response
where
    T: Message + Default + serde::de::DeserializeOwned,
    R: Message + Default + serde::Serialize,
{
    match decode_request::<T>(&headers, body) {
        Ok((request, encoding)) => {
            let batch = convert(request);
            debug!(kind = %batch.kind, signals = batch.len(), "received export over http");
            engine.dispatch(batch).await;
            acknowledge::<R>(encoding)
        }
        Err(err) => decode_failure(err),
    }
}

async fn export_traces(
    State(engine): State<Arc<PipelineEngine>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceResponse;
    handle_export::<ExportTraceServiceRequest, ExportTraceServiceResponse>(
        engine,
        headers,
        body,
        otlp::decode_trace_request,
    )
    .await
}

async fn export_metrics(
    State(engine): State<Arc<PipelineEngine>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceResponse;
    handle_export::<ExportMetricsServiceRequest, ExportMetricsServiceResponse>(
        engine,
        headers,
        body,
        otlp::decode_metrics_request,
    )
    .await
}

async fn export_logs(
    State(engine): State<Arc<PipelineEngine>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceResponse;
    handle_export::<ExportLogsServiceRequest, ExportLogsServiceResponse>(
        engine,
        headers,
        body,
        otlp::decode_logs_request,
    )
    .await
}

pub fn build_router(engine: Arc<PipelineEngine>) -> Router {
    Router::new()
        .route("/v1/traces", post(export_traces))
        .route("/v1/metrics", post(export_metrics))
        .route("/v1/logs", post(export_logs))
        .with_state(engine)
}

/// Binds the listener up front so address conflicts surface at startup.
pub async fn bind_http(addr: SocketAddr) -> Result<TcpListener, BindError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| BindError { addr, source })
}

pub async fn serve_http(
    listener: TcpListener,
    engine: Arc<PipelineEngine>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr().ok();
    info!(addr = ?addr, "otlp/http receiver listening");
    axum::serve(listener, build_router(engine))
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await
}
