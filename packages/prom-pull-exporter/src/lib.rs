//! An accumulating metric registry rendered in the Prometheus text exposition format.
//!
//! This crate provides the storage half of a pull-based metrics exporter: callers
//! record the current value of counter and gauge series as telemetry flows through
//! a pipeline, and an HTTP scrape endpoint (owned by the caller) renders the
//! registry on demand. The registry is explicitly scoped: it is constructed once,
//! handed to the exporter that owns it, and shared behind an `Arc`; there is no
//! process-wide global state.
//!
//! # Features
//!
//! - Constant labels attached to every exposed series
//! - Optional millisecond timestamps in the exposition output
//! - A metric-expiration policy: series not updated within the configured window
//!   are dropped from future scrapes
//! - Metric and label names sanitized to the Prometheus charset, label values
//!   escaped per the text format rules
//!
//! # Example
//!
//! ```rust
//! use prom_pull_exporter::{MetricsRegistry, SeriesKind};
//! use std::time::Duration;
//!
//! let registry = MetricsRegistry::builder()
//!     .const_labels(vec![("source".to_string(), "relay".to_string())])
//!     .metric_expiration(Duration::from_secs(300))
//!     .build();
//!
//! registry.set(SeriesKind::Counter, "requests_total", &[], 1.0, None);
//! let body = registry.render();
//! assert!(body.contains("requests_total{source=\"relay\"} 1"));
//! ```

use bon::bon;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// The exposition type of a series, controlling its `# TYPE` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Counter,
    Gauge,
}

impl SeriesKind {
    fn as_str(&self) -> &'static str {
        match self {
            SeriesKind::Counter => "counter",
            SeriesKind::Gauge => "gauge",
        }
    }
}

/// Identity of a series: sanitized metric name plus sorted label pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeriesKey {
    name: String,
    labels: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct Series {
    kind: SeriesKind,
    value: f64,
    /// Sample timestamp in milliseconds since the Unix epoch, if the producer
    /// supplied one.
    timestamp_ms: Option<i64>,
    last_update: Instant,
}

/// A mutex-guarded map of metric series with Prometheus text rendering.
///
/// Updates use exclusive access (single mutator at a time); rendering takes the
/// same lock, so a scrape observes a consistent snapshot. Re-rendering without
/// intervening updates returns identical output.
#[derive(Debug)]
pub struct MetricsRegistry {
    inner: Mutex<HashMap<SeriesKey, Series>>,
    const_labels: Vec<(String, String)>,
    send_timestamps: bool,
    metric_expiration: Duration,
}

#[bon]
impl MetricsRegistry {
    /// Creates a registry.
    ///
    /// `metric_expiration` defaults to five minutes; a zero duration disables
    /// expiration entirely. `const_labels` are merged into every exposed series
    /// (series labels win on key collision).
    #[builder]
    pub fn new(
        const_labels: Option<Vec<(String, String)>>,
        send_timestamps: Option<bool>,
        metric_expiration: Option<Duration>,
    ) -> Self {
        let mut const_labels: Vec<(String, String)> = const_labels
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (sanitize_name(&k), v))
            .collect();
        const_labels.sort();

        Self {
            inner: Mutex::new(HashMap::new()),
            const_labels,
            send_timestamps: send_timestamps.unwrap_or(false),
            metric_expiration: metric_expiration.unwrap_or(Duration::from_secs(300)),
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MetricsRegistry {
    /// Sets a series to the given value, replacing any previous sample.
    ///
    /// This is the update path for gauges and for cumulative counters, whose
    /// samples already carry running totals; setting rather than adding keeps
    /// repeated scrapes free of double-counting.
    pub fn set(
        &self,
        kind: SeriesKind,
        name: &str,
        labels: &[(String, String)],
        value: f64,
        timestamp_ms: Option<i64>,
    ) {
        self.upsert(kind, name, labels, timestamp_ms, |_| value);
    }

    /// Adds a delta to a counter series, creating it at `delta` if absent.
    pub fn add(
        &self,
        name: &str,
        labels: &[(String, String)],
        delta: f64,
        timestamp_ms: Option<i64>,
    ) {
        self.upsert(SeriesKind::Counter, name, labels, timestamp_ms, |prev| {
            prev + delta
        });
    }

    fn upsert(
        &self,
        kind: SeriesKind,
        name: &str,
        labels: &[(String, String)],
        timestamp_ms: Option<i64>,
        f: impl FnOnce(f64) -> f64,
    ) {
        let key = SeriesKey {
            name: sanitize_name(name),
            labels: sorted_labels(labels),
        };
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        match inner.get_mut(&key) {
            Some(series) => {
                if series.kind != kind {
                    warn!(metric = %key.name, "series re-registered with a different type, overwriting");
                    series.kind = kind;
                    series.value = f(0.0);
                } else {
                    series.value = f(series.value);
                }
                series.timestamp_ms = timestamp_ms;
                series.last_update = now;
            }
            None => {
                inner.insert(
                    key,
                    Series {
                        kind,
                        value: f(0.0),
                        timestamp_ms,
                        last_update: now,
                    },
                );
            }
        }
    }

    /// Renders the current series in the text exposition format, dropping any
    /// series older than the expiration window.
    pub fn render(&self) -> String {
        self.render_at(Instant::now())
    }

    fn render_at(&self, now: Instant) -> String {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if !self.metric_expiration.is_zero() {
            let window = self.metric_expiration;
            inner.retain(|_, series| now.saturating_duration_since(series.last_update) <= window);
        }

        let mut entries: Vec<(&SeriesKey, &Series)> = inner.iter().collect();
        entries.sort_by(|a, b| a.0.name.cmp(&b.0.name).then_with(|| a.0.labels.cmp(&b.0.labels)));

        let mut out = String::new();
        let mut last_name: Option<&str> = None;
        for (key, series) in entries {
            if last_name != Some(key.name.as_str()) {
                let _ = writeln!(out, "# TYPE {} {}", key.name, series.kind.as_str());
                last_name = Some(key.name.as_str());
            }

            out.push_str(&key.name);
            self.write_labels(&mut out, &key.labels);
            let _ = write!(out, " {}", format_value(series.value));
            if self.send_timestamps {
                if let Some(ts) = series.timestamp_ms {
                    let _ = write!(out, " {}", ts);
                }
            }
            out.push('\n');
        }
        out
    }

    fn write_labels(&self, out: &mut String, labels: &[(String, String)]) {
        // Series labels win over const labels on key collision.
        let mut merged: Vec<(&str, &str)> = Vec::with_capacity(self.const_labels.len() + labels.len());
        for (k, v) in &self.const_labels {
            if !labels.iter().any(|(lk, _)| lk == k) {
                merged.push((k, v));
            }
        }
        for (k, v) in labels {
            merged.push((k, v));
        }
        merged.sort();

        if merged.is_empty() {
            return;
        }
        out.push('{');
        for (i, (k, v)) in merged.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{}=\"{}\"", k, escape_label_value(v));
        }
        out.push('}');
    }

    /// Number of live (non-expired) series, primarily for tests and logging.
    pub fn series_count(&self) -> usize {
        match self.inner.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

fn sorted_labels(labels: &[(String, String)]) -> Vec<(String, String)> {
    let mut labels: Vec<(String, String)> = labels
        .iter()
        .map(|(k, v)| (sanitize_name(k), v.clone()))
        .collect();
    labels.sort();
    labels
}

/// Maps a name onto the Prometheus charset `[a-zA-Z_:][a-zA-Z0-9_:]*`.
fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        let valid = c.is_ascii_alphabetic() || c == '_' || c == ':' || (i > 0 && c.is_ascii_digit());
        if valid {
            out.push(c);
        } else if i == 0 && c.is_ascii_digit() {
            out.push('_');
            out.push(c);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders whole floats without a trailing `.0`, matching the conventional
/// exposition output of counters.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
