//! Configuration loading and validation.
//!
//! The config file is YAML with four top-level sections: `receivers`,
//! `processors` and `exporters` declare named component instances, and
//! `service.pipelines` wires them together. Component keys are `kind` or
//! `kind/suffix`, so `otlp/backup` is a second instance of the `otlp`
//! exporter. Validation is strict and side-effect free: every error below is
//! reported before anything binds a port or spawns a task.

use crate::cli::parse_duration_to_millis;
use crate::error::ConfigError;
use crate::signal::{AttrValue, SignalKind};
use indexmap::IndexMap;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_GRPC_ENDPOINT: &str = "0.0.0.0:4317";
pub const DEFAULT_HTTP_ENDPOINT: &str = "0.0.0.0:4318";

const DEFAULT_BATCH_TIMEOUT_MS: u64 = 200;
const DEFAULT_BATCH_SIZE: usize = 8192;
const DEFAULT_EXPORT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_METRIC_EXPIRATION_MS: u64 = 300_000;

// ---------------------------------------------------------------------------
// Validated configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub receivers: IndexMap<String, ReceiverConfig>,
    pub processors: IndexMap<String, ProcessorConfig>,
    pub exporters: IndexMap<String, ExporterConfig>,
    pub pipelines: IndexMap<String, PipelineConfig>,
    pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone)]
pub enum ReceiverConfig {
    Otlp {
        grpc: Option<SocketAddr>,
        http: Option<SocketAddr>,
    },
}

#[derive(Debug, Clone)]
pub enum ProcessorConfig {
    Batch {
        timeout: Duration,
        send_batch_size: usize,
    },
    Attributes {
        actions: Vec<AttributeAction>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttributeAction {
    pub key: String,
    #[serde(default)]
    pub value: Option<AttrValue>,
    pub action: AttributeActionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeActionKind {
    Insert,
    Update,
    Upsert,
    Delete,
}

#[derive(Debug, Clone)]
pub enum ExporterConfig {
    OtlpGrpc {
        /// `host:port` of the downstream OTLP/gRPC endpoint.
        endpoint: String,
        insecure: bool,
        timeout: Duration,
        retry: RetryConfig,
    },
    OtlpHttp {
        /// Base URL; signal paths (`/v1/traces` etc.) are appended per export.
        endpoint: String,
        compression: Option<Compression>,
        headers: IndexMap<String, String>,
        timeout: Duration,
        retry: RetryConfig,
    },
    Prometheus {
        endpoint: SocketAddr,
        const_labels: IndexMap<String, String>,
        send_timestamps: bool,
        metric_expiration: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Gzip,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(500),
            multiplier: 2.0,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub kind: SignalKind,
    pub receivers: Vec<String>,
    pub processors: Vec<String>,
    pub exporters: Vec<String>,
}

// ---------------------------------------------------------------------------
// Raw document shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    receivers: IndexMap<String, serde_yaml::Value>,
    #[serde(default)]
    processors: IndexMap<String, serde_yaml::Value>,
    #[serde(default)]
    exporters: IndexMap<String, serde_yaml::Value>,
    service: RawService,
}

#[derive(Debug, Deserialize)]
struct RawService {
    pipelines: IndexMap<String, RawPipeline>,
    #[serde(default)]
    shutdown_timeout: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawPipeline {
    #[serde(default)]
    receivers: Vec<String>,
    #[serde(default)]
    processors: Vec<String>,
    #[serde(default)]
    exporters: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawOtlpReceiver {
    #[serde(default)]
    protocols: RawProtocols,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawProtocols {
    grpc: Option<RawEndpoint>,
    http: Option<RawEndpoint>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawEndpoint {
    endpoint: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawBatchProcessor {
    timeout: Option<String>,
    send_batch_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAttributesProcessor {
    actions: Vec<AttributeAction>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOtlpGrpcExporter {
    endpoint: String,
    #[serde(default)]
    tls: RawTls,
    timeout: Option<String>,
    #[serde(default)]
    retry: RawRetry,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawTls {
    #[serde(default)]
    insecure: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOtlpHttpExporter {
    endpoint: String,
    compression: Option<Compression>,
    #[serde(default)]
    headers: IndexMap<String, String>,
    timeout: Option<String>,
    #[serde(default)]
    retry: RawRetry,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawRetry {
    initial_backoff: Option<String>,
    multiplier: Option<f64>,
    max_attempts: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPrometheusExporter {
    endpoint: String,
    #[serde(default)]
    const_labels: IndexMap<String, String>,
    #[serde(default)]
    send_timestamps: bool,
    metric_expiration: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// The `kind` part of a `kind/suffix` component key.
pub fn component_kind(name: &str) -> &str {
    name.split_once('/').map(|(kind, _)| kind).unwrap_or(name)
}

fn duration_field(
    name: &str,
    field: &'static str,
    raw: Option<&str>,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    match raw {
        Some(value) => parse_duration_to_millis(value)
            .map(Duration::from_millis)
            .map_err(|reason| ConfigError::InvalidValue {
                name: name.to_string(),
                field,
                reason,
            }),
        None => Ok(Duration::from_millis(default_ms)),
    }
}

fn socket_addr_field(
    name: &str,
    field: &'static str,
    value: &str,
) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        field,
        reason: format!("{value:?} is not a valid socket address"),
    })
}

fn typed_section<T: serde::de::DeserializeOwned>(
    section: &'static str,
    name: &str,
    value: serde_yaml::Value,
) -> Result<T, ConfigError> {
    // A bare `otlp:` key with no body arrives as Null; treat it as `{}`.
    let value = if value.is_null() {
        serde_yaml::Value::Mapping(Default::default())
    } else {
        value
    };
    serde_yaml::from_value(value).map_err(|source| ConfigError::Component {
        section,
        name: name.to_string(),
        source,
    })
}

impl RawRetry {
    fn finish(&self, name: &str) -> Result<RetryConfig, ConfigError> {
        let defaults = RetryConfig::default();
        let initial_backoff = duration_field(
            name,
            "retry.initial_backoff",
            self.initial_backoff.as_deref(),
            defaults.initial_backoff.as_millis() as u64,
        )?;
        let max_attempts = self.max_attempts.unwrap_or(defaults.max_attempts);
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                name: name.to_string(),
                field: "retry.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(RetryConfig {
            initial_backoff,
            multiplier: self.multiplier.unwrap_or(defaults.multiplier),
            max_attempts,
        })
    }
}

fn parse_receiver(name: &str, value: serde_yaml::Value) -> Result<ReceiverConfig, ConfigError> {
    match component_kind(name) {
        "otlp" => {
            let raw: RawOtlpReceiver = typed_section("receiver", name, value)?;
            let grpc = match raw.protocols.grpc {
                Some(ep) => Some(socket_addr_field(
                    name,
                    "protocols.grpc.endpoint",
                    ep.endpoint.as_deref().unwrap_or(DEFAULT_GRPC_ENDPOINT),
                )?),
                None => None,
            };
            let http = match raw.protocols.http {
                Some(ep) => Some(socket_addr_field(
                    name,
                    "protocols.http.endpoint",
                    ep.endpoint.as_deref().unwrap_or(DEFAULT_HTTP_ENDPOINT),
                )?),
                None => None,
            };
            if grpc.is_none() && http.is_none() {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    field: "protocols",
                    reason: "at least one of grpc or http must be enabled".to_string(),
                });
            }
            Ok(ReceiverConfig::Otlp { grpc, http })
        }
        _ => Err(ConfigError::UnknownComponent {
            section: "receiver",
            name: name.to_string(),
        }),
    }
}

fn parse_processor(name: &str, value: serde_yaml::Value) -> Result<ProcessorConfig, ConfigError> {
    match component_kind(name) {
        "batch" => {
            let raw: RawBatchProcessor = typed_section("processor", name, value)?;
            let send_batch_size = raw.send_batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
            if send_batch_size == 0 {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    field: "send_batch_size",
                    reason: "must be at least 1".to_string(),
                });
            }
            Ok(ProcessorConfig::Batch {
                timeout: duration_field(
                    name,
                    "timeout",
                    raw.timeout.as_deref(),
                    DEFAULT_BATCH_TIMEOUT_MS,
                )?,
                send_batch_size,
            })
        }
        "attributes" => {
            let raw: RawAttributesProcessor = typed_section("processor", name, value)?;
            for action in &raw.actions {
                let needs_value = !matches!(action.action, AttributeActionKind::Delete);
                if needs_value && action.value.is_none() {
                    return Err(ConfigError::InvalidValue {
                        name: name.to_string(),
                        field: "actions",
                        reason: format!("action on key {:?} requires a value", action.key),
                    });
                }
            }
            Ok(ProcessorConfig::Attributes {
                actions: raw.actions,
            })
        }
        _ => Err(ConfigError::UnknownComponent {
            section: "processor",
            name: name.to_string(),
        }),
    }
}

fn parse_exporter(name: &str, value: serde_yaml::Value) -> Result<ExporterConfig, ConfigError> {
    match component_kind(name) {
        "otlp" => {
            let raw: RawOtlpGrpcExporter = typed_section("exporter", name, value)?;
            if raw.endpoint.contains("://") {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    field: "endpoint",
                    reason: "expected host:port without a scheme".to_string(),
                });
            }
            Ok(ExporterConfig::OtlpGrpc {
                endpoint: raw.endpoint,
                insecure: raw.tls.insecure,
                timeout: duration_field(
                    name,
                    "timeout",
                    raw.timeout.as_deref(),
                    DEFAULT_EXPORT_TIMEOUT_MS,
                )?,
                retry: raw.retry.finish(name)?,
            })
        }
        "otlphttp" => {
            let raw: RawOtlpHttpExporter = typed_section("exporter", name, value)?;
            if !raw.endpoint.starts_with("http://") && !raw.endpoint.starts_with("https://") {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    field: "endpoint",
                    reason: "expected an http:// or https:// URL".to_string(),
                });
            }
            Ok(ExporterConfig::OtlpHttp {
                endpoint: raw.endpoint.trim_end_matches('/').to_string(),
                compression: raw.compression,
                headers: raw.headers,
                timeout: duration_field(
                    name,
                    "timeout",
                    raw.timeout.as_deref(),
                    DEFAULT_EXPORT_TIMEOUT_MS,
                )?,
                retry: raw.retry.finish(name)?,
            })
        }
        "prometheus" => {
            let raw: RawPrometheusExporter = typed_section("exporter", name, value)?;
            Ok(ExporterConfig::Prometheus {
                endpoint: socket_addr_field(name, "endpoint", &raw.endpoint)?,
                const_labels: raw.const_labels,
                send_timestamps: raw.send_timestamps,
                metric_expiration: duration_field(
                    name,
                    "metric_expiration",
                    raw.metric_expiration.as_deref(),
                    DEFAULT_METRIC_EXPIRATION_MS,
                )?,
            })
        }
        _ => Err(ConfigError::UnknownComponent {
            section: "exporter",
            name: name.to_string(),
        }),
    }
}

fn pipeline_kind(name: &str) -> Result<SignalKind, ConfigError> {
    match component_kind(name) {
        "traces" => Ok(SignalKind::Traces),
        "metrics" => Ok(SignalKind::Metrics),
        "logs" => Ok(SignalKind::Logs),
        _ => Err(ConfigError::InvalidPipelineName(name.to_string())),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_str(&contents)
    }

    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawDocument = serde_yaml::from_str(contents)?;

        let mut receivers = IndexMap::new();
        for (name, value) in raw.receivers {
            let parsed = parse_receiver(&name, value)?;
            receivers.insert(name, parsed);
        }

        let mut processors = IndexMap::new();
        for (name, value) in raw.processors {
            let parsed = parse_processor(&name, value)?;
            processors.insert(name, parsed);
        }

        let mut exporters = IndexMap::new();
        for (name, value) in raw.exporters {
            let parsed = parse_exporter(&name, value)?;
            exporters.insert(name, parsed);
        }

        let mut pipelines = IndexMap::new();
        for (name, pipeline) in raw.service.pipelines {
            let kind = pipeline_kind(&name)?;
            if pipeline.receivers.is_empty() || pipeline.exporters.is_empty() {
                return Err(ConfigError::EmptyPipeline(name));
            }
            pipelines.insert(
                name,
                PipelineConfig {
                    kind,
                    receivers: pipeline.receivers,
                    processors: pipeline.processors,
                    exporters: pipeline.exporters,
                },
            );
        }

        let shutdown_timeout = duration_field(
            "service",
            "shutdown_timeout",
            raw.service.shutdown_timeout.as_deref(),
            DEFAULT_SHUTDOWN_TIMEOUT_MS,
        )?;

        let config = Config {
            receivers,
            processors,
            exporters,
            pipelines,
            shutdown_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (pipeline_name, pipeline) in &self.pipelines {
            for name in &pipeline.receivers {
                if !self.receivers.contains_key(name) {
                    return Err(ConfigError::UnresolvedReference {
                        pipeline: pipeline_name.clone(),
                        section: "receiver",
                        name: name.clone(),
                    });
                }
            }
            for name in &pipeline.processors {
                if !self.processors.contains_key(name) {
                    return Err(ConfigError::UnresolvedReference {
                        pipeline: pipeline_name.clone(),
                        section: "processor",
                        name: name.clone(),
                    });
                }
            }
            for name in &pipeline.exporters {
                let exporter =
                    self.exporters
                        .get(name)
                        .ok_or_else(|| ConfigError::UnresolvedReference {
                            pipeline: pipeline_name.clone(),
                            section: "exporter",
                            name: name.clone(),
                        })?;
                if matches!(exporter, ExporterConfig::Prometheus { .. })
                    && pipeline.kind != SignalKind::Metrics
                {
                    return Err(ConfigError::IncompatibleComponent {
                        pipeline: pipeline_name.clone(),
                        name: name.clone(),
                        reason: "prometheus exporters only accept metrics".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL_CONFIG: &str = r#"
receivers:
  otlp:
    protocols:
      grpc:
        endpoint: 0.0.0.0:4317
      http:
        endpoint: 0.0.0.0:4318

processors:
  batch:
    timeout: 200ms
    send_batch_size: 1024
  attributes/env:
    actions:
      - key: deployment.environment
        value: production
        action: upsert
      - key: internal.debug
        action: delete

exporters:
  otlp:
    endpoint: backend.example.com:4317
    timeout: 5s
  otlphttp/archive:
    endpoint: https://archive.example.com
    compression: gzip
    headers:
      x-api-key: secret
  prometheus:
    endpoint: 0.0.0.0:9464
    const_labels:
      relay: edge
    metric_expiration: 3m

service:
  shutdown_timeout: 10s
  pipelines:
    traces:
      receivers: [otlp]
      processors: [batch, attributes/env]
      exporters: [otlp, otlphttp/archive]
    metrics:
      receivers: [otlp]
      processors: [batch]
      exporters: [prometheus]
    logs:
      receivers: [otlp]
      exporters: [otlphttp/archive]
"#;

    #[test]
    fn test_full_config_parses() {
        let config = Config::from_str(FULL_CONFIG).unwrap();
        assert_eq!(config.receivers.len(), 1);
        assert_eq!(config.processors.len(), 2);
        assert_eq!(config.exporters.len(), 3);
        assert_eq!(config.pipelines.len(), 3);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));

        let ReceiverConfig::Otlp { grpc, http } = &config.receivers["otlp"];
        assert_eq!(grpc.unwrap().port(), 4317);
        assert_eq!(http.unwrap().port(), 4318);

        match &config.processors["batch"] {
            ProcessorConfig::Batch {
                timeout,
                send_batch_size,
            } => {
                assert_eq!(*timeout, Duration::from_millis(200));
                assert_eq!(*send_batch_size, 1024);
            }
            other => panic!("unexpected processor: {other:?}"),
        }

        match &config.exporters["otlphttp/archive"] {
            ExporterConfig::OtlpHttp {
                endpoint,
                compression,
                headers,
                ..
            } => {
                assert_eq!(endpoint, "https://archive.example.com");
                assert_eq!(*compression, Some(Compression::Gzip));
                assert_eq!(headers["x-api-key"], "secret");
            }
            other => panic!("unexpected exporter: {other:?}"),
        }

        match &config.exporters["prometheus"] {
            ExporterConfig::Prometheus {
                metric_expiration, ..
            } => assert_eq!(*metric_expiration, Duration::from_secs(180)),
            other => panic!("unexpected exporter: {other:?}"),
        }

        assert_eq!(config.pipelines["traces"].kind, SignalKind::Traces);
        assert_eq!(
            config.pipelines["traces"].processors,
            vec!["batch", "attributes/env"]
        );
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_str(
            r#"
receivers:
  otlp:
    protocols:
      grpc: {}
processors:
  batch: {}
exporters:
  otlp:
    endpoint: localhost:4317
service:
  pipelines:
    traces:
      receivers: [otlp]
      processors: [batch]
      exporters: [otlp]
"#,
        )
        .unwrap();

        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
        let ReceiverConfig::Otlp { grpc, http } = &config.receivers["otlp"];
        assert_eq!(grpc.unwrap().port(), 4317);
        assert!(http.is_none());
        match &config.exporters["otlp"] {
            ExporterConfig::OtlpGrpc { timeout, retry, .. } => {
                assert_eq!(*timeout, Duration::from_secs(30));
                assert_eq!(*retry, RetryConfig::default());
            }
            other => panic!("unexpected exporter: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_component_kind() {
        let err = Config::from_str(
            r#"
receivers:
  kafka:
    brokers: [localhost:9092]
service:
  pipelines: {}
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownComponent {
                section: "receiver",
                ..
            }
        ));
    }

    #[test]
    fn test_unresolved_reference() {
        let err = Config::from_str(
            r#"
receivers:
  otlp:
    protocols:
      grpc: {}
exporters:
  otlp:
    endpoint: localhost:4317
service:
  pipelines:
    traces:
      receivers: [otlp]
      exporters: [otlp, otlphttp/missing]
"#,
        )
        .unwrap_err();
        match err {
            ConfigError::UnresolvedReference { section, name, .. } => {
                assert_eq!(section, "exporter");
                assert_eq!(name, "otlphttp/missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_prometheus_rejected_outside_metrics() {
        let err = Config::from_str(
            r#"
receivers:
  otlp:
    protocols:
      grpc: {}
exporters:
  prometheus:
    endpoint: 0.0.0.0:9464
service:
  pipelines:
    traces:
      receivers: [otlp]
      exporters: [prometheus]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::IncompatibleComponent { .. }));
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        let err = Config::from_str(
            r#"
receivers:
  otlp:
    protocols:
      grpc: {}
service:
  pipelines:
    traces:
      receivers: [otlp]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyPipeline(name) if name == "traces"));
    }

    #[test]
    fn test_invalid_pipeline_name() {
        let err = Config::from_str(
            r#"
receivers:
  otlp:
    protocols:
      grpc: {}
exporters:
  otlp:
    endpoint: localhost:4317
service:
  pipelines:
    spans:
      receivers: [otlp]
      exporters: [otlp]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPipelineName(name) if name == "spans"));
    }

    #[test]
    fn test_invalid_duration_reported() {
        let err = Config::from_str(
            r#"
processors:
  batch:
    timeout: soon
service:
  pipelines: {}
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "timeout",
                ..
            }
        ));
    }

    #[test]
    fn test_grpc_exporter_rejects_scheme() {
        let err = Config::from_str(
            r#"
exporters:
  otlp:
    endpoint: https://backend:4317
service:
  pipelines: {}
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "endpoint",
                ..
            }
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL_CONFIG.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.pipelines.len(), 3);

        let err = Config::load(Path::new("/nonexistent/relay.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
