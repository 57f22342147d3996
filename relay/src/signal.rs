//! Internal signal representation.
//!
//! Receivers decode OTLP payloads into these types, processors transform them,
//! and exporters translate them back into whatever their downstream expects.
//! A [`Signal`] is a tagged union of a span, a metric point, or a log record;
//! every variant carries its resource-attribute mapping and a timestamp. A
//! [`SignalBatch`] is an ordered sequence of signals of one kind.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The three signal kinds a pipeline can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Traces,
    Metrics,
    Logs,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Traces => "traces",
            SignalKind::Metrics => "metrics",
            SignalKind::Logs => "logs",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute value union, mirroring the OTLP `AnyValue` shapes the relay
/// preserves end to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Array(Vec<AttrValue>),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Double(d) => write!(f, "{}", d),
            AttrValue::String(s) => f.write_str(s),
            AttrValue::Array(values) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// String-keyed attribute mapping; insertion order is irrelevant.
pub type Attributes = BTreeMap<String, AttrValue>;

/// A finished trace span. Ids are lowercase hex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub name: String,
    pub kind: i32,
    pub start_time_unix_nano: u64,
    pub end_time_unix_nano: u64,
    pub attributes: Attributes,
    pub status_code: i32,
    pub status_message: String,
    pub resource: Attributes,
}

/// The numeric value of a metric point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    Gauge(f64),
    Sum {
        value: f64,
        monotonic: bool,
        /// Cumulative sums carry running totals; delta sums carry increments.
        cumulative: bool,
    },
}

/// One sample of one metric stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub value: MetricValue,
    pub attributes: Attributes,
    pub time_unix_nano: u64,
    pub resource: Attributes,
}

/// One structured log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub time_unix_nano: u64,
    pub severity_number: i32,
    pub severity_text: String,
    pub body: Option<AttrValue>,
    pub attributes: Attributes,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub resource: Attributes,
}

/// Tagged union over the three signal kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Signal {
    Span(Span),
    Metric(MetricPoint),
    Log(LogRecord),
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::Span(_) => SignalKind::Traces,
            Signal::Metric(_) => SignalKind::Metrics,
            Signal::Log(_) => SignalKind::Logs,
        }
    }

    pub fn resource(&self) -> &Attributes {
        match self {
            Signal::Span(s) => &s.resource,
            Signal::Metric(m) => &m.resource,
            Signal::Log(l) => &l.resource,
        }
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        match self {
            Signal::Span(s) => &mut s.attributes,
            Signal::Metric(m) => &mut m.attributes,
            Signal::Log(l) => &mut l.attributes,
        }
    }

    pub fn time_unix_nano(&self) -> u64 {
        match self {
            Signal::Span(s) => s.end_time_unix_nano,
            Signal::Metric(m) => m.time_unix_nano,
            Signal::Log(l) => l.time_unix_nano,
        }
    }
}

/// An ordered sequence of signals of one kind.
///
/// Constructors in the decode path guarantee the kind tag matches every signal;
/// processors preserve it.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBatch {
    pub kind: SignalKind,
    pub signals: Vec<Signal>,
}

impl SignalBatch {
    pub fn new(kind: SignalKind, signals: Vec<Signal>) -> Self {
        debug_assert!(signals.iter().all(|s| s.kind() == kind));
        Self { kind, signals }
    }

    pub fn empty(kind: SignalKind) -> Self {
        Self {
            kind,
            signals: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_kind_round_trip() {
        for kind in [SignalKind::Traces, SignalKind::Metrics, SignalKind::Logs] {
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }

    #[test]
    fn test_attr_value_display() {
        assert_eq!(AttrValue::String("ok".into()).to_string(), "ok");
        assert_eq!(AttrValue::Int(42).to_string(), "42");
        assert_eq!(AttrValue::Bool(true).to_string(), "true");
        assert_eq!(
            AttrValue::Array(vec![AttrValue::Int(1), AttrValue::Int(2)]).to_string(),
            "[1,2]"
        );
    }

    #[test]
    fn test_batch_kind_matches_signals() {
        let point = MetricPoint {
            name: "requests_total".into(),
            description: String::new(),
            unit: String::new(),
            value: MetricValue::Sum {
                value: 1.0,
                monotonic: true,
                cumulative: true,
            },
            attributes: Attributes::new(),
            time_unix_nano: 0,
            resource: Attributes::new(),
        };
        let batch = SignalBatch::new(SignalKind::Metrics, vec![Signal::Metric(point)]);
        assert_eq!(batch.kind, SignalKind::Metrics);
        assert_eq!(batch.len(), 1);
    }
}
