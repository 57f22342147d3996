//! OTLP wire format conversion.
//!
//! Decoding flattens the `resource → scope → signal` nesting of an OTLP export
//! request into a [`SignalBatch`], copying the resource attributes onto every
//! signal. Encoding reverses that: signals are grouped by identical resource
//! attributes and re-wrapped for the push exporters. Trace and span ids travel
//! as lowercase hex strings internally.

use crate::signal::{
    AttrValue, Attributes, LogRecord, MetricPoint, MetricValue, Signal, SignalBatch, SignalKind,
    Span,
};
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, ArrayValue, KeyValue};
use opentelemetry_proto::tonic::logs::v1 as logs;
use opentelemetry_proto::tonic::metrics::v1 as metrics;
use opentelemetry_proto::tonic::metrics::v1::{metric, number_data_point, AggregationTemporality};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1 as trace;
use std::collections::BTreeMap;
use tracing::debug;

const TEMPORALITY_DELTA: i32 = AggregationTemporality::Delta as i32;

// ---------------------------------------------------------------------------
// Attribute conversion
// ---------------------------------------------------------------------------

fn any_value_to_attr(value: AnyValue) -> Option<AttrValue> {
    match value.value? {
        any_value::Value::StringValue(s) => Some(AttrValue::String(s)),
        any_value::Value::BoolValue(b) => Some(AttrValue::Bool(b)),
        any_value::Value::IntValue(i) => Some(AttrValue::Int(i)),
        any_value::Value::DoubleValue(d) => Some(AttrValue::Double(d)),
        any_value::Value::ArrayValue(array) => Some(AttrValue::Array(
            array
                .values
                .into_iter()
                .filter_map(any_value_to_attr)
                .collect(),
        )),
        // Kvlist and raw bytes have no counterpart in the internal model;
        // render them as strings rather than dropping the key.
        any_value::Value::KvlistValue(kvlist) => {
            Some(AttrValue::String(format!("{:?}", kvlist.values)))
        }
        any_value::Value::BytesValue(bytes) => Some(AttrValue::String(hex::encode(bytes))),
    }
}

fn attr_to_any_value(value: &AttrValue) -> AnyValue {
    let value = match value {
        AttrValue::String(s) => any_value::Value::StringValue(s.clone()),
        AttrValue::Bool(b) => any_value::Value::BoolValue(*b),
        AttrValue::Int(i) => any_value::Value::IntValue(*i),
        AttrValue::Double(d) => any_value::Value::DoubleValue(*d),
        AttrValue::Array(values) => any_value::Value::ArrayValue(ArrayValue {
            values: values.iter().map(attr_to_any_value).collect(),
        }),
    };
    AnyValue { value: Some(value) }
}

fn key_values_to_attributes(kvs: Vec<KeyValue>) -> Attributes {
    kvs.into_iter()
        .filter_map(|kv| {
            let value = kv.value.and_then(any_value_to_attr)?;
            Some((kv.key, value))
        })
        .collect()
}

fn attributes_to_key_values(attrs: &Attributes) -> Vec<KeyValue> {
    attrs
        .iter()
        .map(|(key, value)| KeyValue {
            key: key.clone(),
            value: Some(attr_to_any_value(value)),
        })
        .collect()
}

fn resource_attributes(resource: Option<Resource>) -> Attributes {
    resource
        .map(|r| key_values_to_attributes(r.attributes))
        .unwrap_or_default()
}

fn hex_id(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        None
    } else {
        Some(hex::encode(bytes))
    }
}

// ---------------------------------------------------------------------------
// Decode: OTLP requests into signal batches
// ---------------------------------------------------------------------------

pub fn decode_trace_request(request: ExportTraceServiceRequest) -> SignalBatch {
    let mut signals = Vec::new();
    for resource_spans in request.resource_spans {
        let resource = resource_attributes(resource_spans.resource);
        for scope_spans in resource_spans.scope_spans {
            for span in scope_spans.spans {
                let (status_code, status_message) = span
                    .status
                    .map(|s| (s.code, s.message))
                    .unwrap_or((0, String::new()));
                signals.push(Signal::Span(Span {
                    trace_id: hex::encode(&span.trace_id),
                    span_id: hex::encode(&span.span_id),
                    parent_span_id: hex_id(&span.parent_span_id),
                    name: span.name,
                    kind: span.kind,
                    start_time_unix_nano: span.start_time_unix_nano,
                    end_time_unix_nano: span.end_time_unix_nano,
                    attributes: key_values_to_attributes(span.attributes),
                    status_code,
                    status_message,
                    resource: resource.clone(),
                }));
            }
        }
    }
    SignalBatch::new(SignalKind::Traces, signals)
}

pub fn decode_metrics_request(request: ExportMetricsServiceRequest) -> SignalBatch {
    let mut signals = Vec::new();
    for resource_metrics in request.resource_metrics {
        let resource = resource_attributes(resource_metrics.resource);
        for scope_metrics in resource_metrics.scope_metrics {
            for metric in scope_metrics.metrics {
                decode_metric(metric, &resource, &mut signals);
            }
        }
    }
    SignalBatch::new(SignalKind::Metrics, signals)
}

fn decode_metric(metric: metrics::Metric, resource: &Attributes, out: &mut Vec<Signal>) {
    let data = match metric.data {
        Some(data) => data,
        None => return,
    };
    match data {
        metric::Data::Gauge(gauge) => {
            for point in gauge.data_points {
                if let Some(value) = number_point_value(&point) {
                    out.push(metric_signal(&metric.name, &metric.description, &metric.unit,
                        MetricValue::Gauge(value), point, resource));
                }
            }
        }
        metric::Data::Sum(sum) => {
            let cumulative = sum.aggregation_temporality != TEMPORALITY_DELTA;
            for point in sum.data_points {
                if let Some(value) = number_point_value(&point) {
                    out.push(metric_signal(&metric.name, &metric.description, &metric.unit,
                        MetricValue::Sum { value, monotonic: sum.is_monotonic, cumulative },
                        point, resource));
                }
            }
        }
        // Distribution aggregations are out of scope for the internal model.
        other => {
            debug!(metric = %metric.name, "skipping unsupported metric data kind: {:?}", kind_name(&other));
        }
    }
}

fn kind_name(data: &metric::Data) -> &'static str {
    match data {
        metric::Data::Gauge(_) => "gauge",
        metric::Data::Sum(_) => "sum",
        metric::Data::Histogram(_) => "histogram",
        metric::Data::ExponentialHistogram(_) => "exponential_histogram",
        metric::Data::Summary(_) => "summary",
    }
}

fn number_point_value(point: &metrics::NumberDataPoint) -> Option<f64> {
    match point.value.as_ref()? {
        number_data_point::Value::AsDouble(d) => Some(*d),
        number_data_point::Value::AsInt(i) => Some(*i as f64),
    }
}

fn metric_signal(
    name: &str,
    description: &str,
    unit: &str,
    value: MetricValue,
    point: metrics::NumberDataPoint,
    resource: &Attributes,
) -> Signal {
    Signal::Metric(MetricPoint {
        name: name.to_string(),
        description: description.to_string(),
        unit: unit.to_string(),
        value,
        attributes: key_values_to_attributes(point.attributes),
        time_unix_nano: point.time_unix_nano,
        resource: resource.clone(),
    })
}

pub fn decode_logs_request(request: ExportLogsServiceRequest) -> SignalBatch {
    let mut signals = Vec::new();
    for resource_logs in request.resource_logs {
        let resource = resource_attributes(resource_logs.resource);
        for scope_logs in resource_logs.scope_logs {
            for record in scope_logs.log_records {
                signals.push(Signal::Log(LogRecord {
                    time_unix_nano: if record.time_unix_nano != 0 {
                        record.time_unix_nano
                    } else {
                        record.observed_time_unix_nano
                    },
                    severity_number: record.severity_number,
                    severity_text: record.severity_text,
                    body: record.body.and_then(any_value_to_attr),
                    attributes: key_values_to_attributes(record.attributes),
                    trace_id: hex_id(&record.trace_id),
                    span_id: hex_id(&record.span_id),
                    resource: resource.clone(),
                }));
            }
        }
    }
    SignalBatch::new(SignalKind::Logs, signals)
}

// ---------------------------------------------------------------------------
// Encode: signal batches into OTLP requests
// ---------------------------------------------------------------------------

/// Groups signals by identical resource attributes, preserving first-seen
/// order within each group.
fn group_by_resource(signals: &[Signal]) -> Vec<(Attributes, Vec<&Signal>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, (Attributes, Vec<&Signal>)> = BTreeMap::new();
    for signal in signals {
        // BTreeMap serialization is deterministic, making it a usable group key.
        let key = serde_json::to_string(signal.resource()).unwrap_or_default();
        if !groups.contains_key(&key) {
            order.push(key.clone());
            groups.insert(key.clone(), (signal.resource().clone(), Vec::new()));
        }
        if let Some((_, members)) = groups.get_mut(&key) {
            members.push(signal);
        }
    }
    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .collect()
}

fn encode_resource(attrs: &Attributes) -> Option<Resource> {
    Some(Resource {
        attributes: attributes_to_key_values(attrs),
        ..Default::default()
    })
}

pub fn encode_trace_request(batch: &SignalBatch) -> ExportTraceServiceRequest {
    let resource_spans = group_by_resource(&batch.signals)
        .into_iter()
        .map(|(resource, members)| {
            let spans = members
                .into_iter()
                .filter_map(|signal| match signal {
                    Signal::Span(span) => Some(encode_span(span)),
                    _ => None,
                })
                .collect();
            trace::ResourceSpans {
                resource: encode_resource(&resource),
                scope_spans: vec![trace::ScopeSpans {
                    spans,
                    ..Default::default()
                }],
                ..Default::default()
            }
        })
        .collect();
    ExportTraceServiceRequest { resource_spans }
}

fn encode_span(span: &Span) -> trace::Span {
    trace::Span {
        trace_id: hex::decode(&span.trace_id).unwrap_or_default(),
        span_id: hex::decode(&span.span_id).unwrap_or_default(),
        parent_span_id: span
            .parent_span_id
            .as_deref()
            .and_then(|id| hex::decode(id).ok())
            .unwrap_or_default(),
        name: span.name.clone(),
        kind: span.kind,
        start_time_unix_nano: span.start_time_unix_nano,
        end_time_unix_nano: span.end_time_unix_nano,
        attributes: attributes_to_key_values(&span.attributes),
        status: Some(trace::Status {
            code: span.status_code,
            message: span.status_message.clone(),
        }),
        ..Default::default()
    }
}

pub fn encode_metrics_request(batch: &SignalBatch) -> ExportMetricsServiceRequest {
    let resource_metrics = group_by_resource(&batch.signals)
        .into_iter()
        .map(|(resource, members)| {
            let points = members
                .into_iter()
                .filter_map(|signal| match signal {
                    Signal::Metric(point) => Some(encode_metric(point)),
                    _ => None,
                })
                .collect();
            metrics::ResourceMetrics {
                resource: encode_resource(&resource),
                scope_metrics: vec![metrics::ScopeMetrics {
                    metrics: points,
                    ..Default::default()
                }],
                ..Default::default()
            }
        })
        .collect();
    ExportMetricsServiceRequest { resource_metrics }
}

fn encode_metric(point: &MetricPoint) -> metrics::Metric {
    let data_point = metrics::NumberDataPoint {
        attributes: attributes_to_key_values(&point.attributes),
        time_unix_nano: point.time_unix_nano,
        value: Some(number_data_point::Value::AsDouble(match point.value {
            MetricValue::Gauge(v) => v,
            MetricValue::Sum { value, .. } => value,
        })),
        ..Default::default()
    };
    let data = match point.value {
        MetricValue::Gauge(_) => metric::Data::Gauge(metrics::Gauge {
            data_points: vec![data_point],
        }),
        MetricValue::Sum {
            monotonic,
            cumulative,
            ..
        } => metric::Data::Sum(metrics::Sum {
            data_points: vec![data_point],
            aggregation_temporality: if cumulative {
                AggregationTemporality::Cumulative as i32
            } else {
                AggregationTemporality::Delta as i32
            },
            is_monotonic: monotonic,
        }),
    };
    metrics::Metric {
        name: point.name.clone(),
        description: point.description.clone(),
        unit: point.unit.clone(),
        data: Some(data),
        ..Default::default()
    }
}

pub fn encode_logs_request(batch: &SignalBatch) -> ExportLogsServiceRequest {
    let resource_logs = group_by_resource(&batch.signals)
        .into_iter()
        .map(|(resource, members)| {
            let records = members
                .into_iter()
                .filter_map(|signal| match signal {
                    Signal::Log(record) => Some(encode_log(record)),
                    _ => None,
                })
                .collect();
            logs::ResourceLogs {
                resource: encode_resource(&resource),
                scope_logs: vec![logs::ScopeLogs {
                    log_records: records,
                    ..Default::default()
                }],
                ..Default::default()
            }
        })
        .collect();
    ExportLogsServiceRequest { resource_logs }
}

fn encode_log(record: &LogRecord) -> logs::LogRecord {
    logs::LogRecord {
        time_unix_nano: record.time_unix_nano,
        observed_time_unix_nano: record.time_unix_nano,
        severity_number: record.severity_number,
        severity_text: record.severity_text.clone(),
        body: record.body.as_ref().map(attr_to_any_value),
        attributes: attributes_to_key_values(&record.attributes),
        trace_id: record
            .trace_id
            .as_deref()
            .and_then(|id| hex::decode(id).ok())
            .unwrap_or_default(),
        span_id: record
            .span_id
            .as_deref()
            .and_then(|id| hex::decode(id).ok())
            .unwrap_or_default(),
        ..Default::default()
    }
}
