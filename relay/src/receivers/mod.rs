//! Inbound OTLP receivers.
//!
//! Both transports decode into the internal signal model and hand batches to
//! the [`PipelineEngine`](crate::pipeline::PipelineEngine). A malformed
//! request is rejected to the client without disturbing the listener.

mod grpc;
mod http;

pub use grpc::{bind_grpc, serve_grpc, OtlpGrpcService};
pub use http::{bind_http, serve_http, build_router};
