//! Error taxonomy for the relay.
//!
//! Startup errors (`ConfigError`, `BindError`) abort the process. Runtime errors
//! are scoped to the smallest affected unit: a `DecodeError` rejects one inbound
//! request and the receiver keeps serving, an `ExportError` is logged and retried
//! for one exporter without touching its siblings. Drain timeouts during shutdown
//! are warnings only.

use std::net::SocketAddr;
use thiserror::Error;

/// Configuration loading or validation failure. Fatal, startup-only, and free of
/// side effects: nothing is bound or spawned before validation passes.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unknown {section} type {name:?}")]
    UnknownComponent {
        section: &'static str,
        name: String,
    },

    #[error("invalid {section} {name:?}: {source}")]
    Component {
        section: &'static str,
        name: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("pipeline {pipeline:?} references undefined {section} {name:?}")]
    UnresolvedReference {
        pipeline: String,
        section: &'static str,
        name: String,
    },

    #[error("invalid pipeline name {0:?}: expected traces, metrics or logs (optionally /suffixed)")]
    InvalidPipelineName(String),

    #[error("pipeline {0:?} must declare at least one receiver and one exporter")]
    EmptyPipeline(String),

    #[error("exporter {name:?} cannot be used in pipeline {pipeline:?}: {reason}")]
    IncompatibleComponent {
        pipeline: String,
        name: String,
        reason: String,
    },

    #[error("invalid value for {field} in {name:?}: {reason}")]
    InvalidValue {
        name: String,
        field: &'static str,
        reason: String,
    },
}

/// A listener could not be bound. Fatal at startup.
#[derive(Debug, Error)]
#[error("failed to bind {addr}: {source}")]
pub struct BindError {
    pub addr: SocketAddr,
    #[source]
    pub source: std::io::Error,
}

/// A malformed inbound request. Rejected with a client-visible error; the
/// receiver continues serving.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported content type {0:?}")]
    UnsupportedContentType(String),

    #[error("malformed protobuf payload: {0}")]
    Protobuf(#[from] prost::DecodeError),

    #[error("malformed json payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to decompress request body: {0}")]
    Decompress(#[source] std::io::Error),
}

/// A delivery failure for a single exporter. Logged, retried with bounded
/// backoff, and isolated from sibling exporters.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("downstream rejected export: {0}")]
    Rejected(String),

    #[error("export timed out")]
    Timeout,

    #[error("exporter is not running")]
    NotRunning,
}

impl From<tonic::Status> for ExportError {
    fn from(status: tonic::Status) -> Self {
        ExportError::Rejected(status.to_string())
    }
}

impl From<tonic::transport::Error> for ExportError {
    fn from(err: tonic::transport::Error) -> Self {
        ExportError::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for ExportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExportError::Timeout
        } else {
            ExportError::Transport(err.to_string())
        }
    }
}
