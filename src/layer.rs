use crate::record::{LogRecord, Severity};
use crate::sink::LogSink;
use chrono::Local;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Event field carrying the caller's source file.
pub const FILE_FIELD: &str = "file";
/// Event field carrying the caller's function name.
pub const FUNC_FIELD: &str = "func";
/// Event field overriding the severity derived from the `tracing` level.
pub const SEVERITY_FIELD: &str = "severity";
/// Event field carrying the active error, if any.
pub const ERROR_FIELD: &str = "error";

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// writes them synchronously to a [`LogSink`].
///
/// Events below `min_level` are dropped. Since `tracing` has no critical
/// level, an event may carry `severity = "critical"` to be recorded as
/// [`Severity::Critical`].
pub struct RecordLayer {
    sink: Arc<dyn LogSink>,
    min_level: Severity,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Successfully written to the sink.
    pub written_events: Arc<AtomicU64>,
    /// Rejected by the sink (write or rollover failure).
    pub failed_events: Arc<AtomicU64>,
}

impl RecordLayer {
    pub fn new(sink: Arc<dyn LogSink>, min_level: Severity) -> Self {
        Self {
            sink,
            min_level,
            total_events: Arc::new(AtomicU64::new(0)),
            written_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<S> Layer<S> for RecordLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let meta = event.metadata();
        let level = visitor
            .severity
            .unwrap_or_else(|| Severity::from_level(meta.level()));
        if level < self.min_level {
            return;
        }

        let record = LogRecord {
            timestamp: Local::now(),
            level,
            target: meta.target().to_string(),
            file: visitor.file,
            func: visitor.func,
            message: visitor.message,
            error: visitor.error,
            fields: visitor.fields,
        };

        match self.sink.write(&record) {
            Ok(()) => {
                self.written_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                // No caller to hand the error back to from inside a layer.
                self.failed_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("failed to write log record: {}", e);
            }
        }
    }
}

/// Collects the well-known fields of an event and keeps everything else
/// in `fields`.
#[derive(Default)]
pub struct FieldVisitor {
    pub fields: BTreeMap<String, serde_json::Value>,
    pub message: Option<String>,
    pub file: Option<String>,
    pub func: Option<String>,
    pub severity: Option<Severity>,
    pub error: Vec<String>,
}

impl FieldVisitor {
    fn record_text(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            FILE_FIELD => self.file = Some(value),
            FUNC_FIELD => self.func = Some(value),
            SEVERITY_FIELD => match Severity::parse(&value) {
                Some(severity) => self.severity = Some(severity),
                None => {
                    self.fields
                        .insert(field.name().to_string(), serde_json::Value::String(value));
                }
            },
            ERROR_FIELD => self.error.push(value),
            name => {
                self.fields
                    .insert(name.to_string(), serde_json::Value::String(value));
            }
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_text(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_i128(&mut self, field: &Field, value: i128) {
        let json = i64::try_from(value)
            .map(serde_json::Value::from)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        self.fields.insert(field.name().to_string(), json);
    }

    fn record_u128(&mut self, field: &Field, value: u128) {
        let json = u64::try_from(value)
            .map(serde_json::Value::from)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        self.fields.insert(field.name().to_string(), json);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if field.name() != ERROR_FIELD {
            self.record_text(field, value.to_string());
            return;
        }

        let mut current: Option<&(dyn Error + 'static)> = Some(value);
        while let Some(err) = current {
            self.error.push(err.to_string());
            current = err.source();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_text(field, format!("{:?}", value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("connection refused")
        }
    }

    impl Error for Inner {}

    #[derive(Debug)]
    struct Outer(Inner);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("database unavailable")
        }
    }

    impl Error for Outer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    struct Captured {
        records: Vec<LogRecord>,
        total: u64,
        written: u64,
    }

    fn capture(min_level: Severity, f: impl FnOnce()) -> Captured {
        let sink = Arc::new(MemorySink::new());
        let layer = RecordLayer::new(sink.clone(), min_level);
        let total = Arc::clone(&layer.total_events);
        let written = Arc::clone(&layer.written_events);

        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, f);

        Captured {
            records: sink.records(),
            total: total.load(Ordering::Relaxed),
            written: written.load(Ordering::Relaxed),
        }
    }

    #[test]
    fn captures_caller_fields_and_message() {
        let records = capture(Severity::Info, || {
            tracing::info!(file = "orders.rs", func = "place_order", order_id = 7u64, "order placed");
        })
        .records;

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.level, Severity::Info);
        assert_eq!(record.file.as_deref(), Some("orders.rs"));
        assert_eq!(record.func.as_deref(), Some("place_order"));
        assert_eq!(record.message.as_deref(), Some("order placed"));
        assert_eq!(record.fields.get("order_id"), Some(&serde_json::json!(7)));
    }

    #[test]
    fn numeric_fields_stay_numbers() {
        let records = capture(Severity::Info, || {
            tracing::info!(latency = 12.5f64, small = 3u128, huge = u128::MAX, debt = -4i128, "timed");
        })
        .records;

        let fields = &records[0].fields;
        assert_eq!(fields.get("latency"), Some(&serde_json::json!(12.5)));
        assert_eq!(fields.get("small"), Some(&serde_json::json!(3)));
        assert_eq!(fields.get("debt"), Some(&serde_json::json!(-4)));
        assert_eq!(
            fields.get("huge"),
            Some(&serde_json::Value::String(u128::MAX.to_string()))
        );
    }

    #[test]
    fn drops_events_below_threshold() {
        let captured = capture(Severity::Info, || {
            tracing::debug!("noise");
            tracing::warn!("kept");
        });

        assert_eq!(captured.records.len(), 1);
        assert_eq!(captured.records[0].level, Severity::Warning);
        assert_eq!(captured.total, 2);
        assert_eq!(captured.written, 1);
    }

    #[test]
    fn severity_field_promotes_to_critical() {
        let records = capture(Severity::Info, || {
            tracing::error!(severity = "critical", "disk full");
        })
        .records;

        assert_eq!(records[0].level, Severity::Critical);
        assert!(!records[0].fields.contains_key(SEVERITY_FIELD));
    }

    #[test]
    fn error_field_records_source_chain() {
        let err = Outer(Inner);
        let err_ref: &(dyn Error + 'static) = &err;
        let records = capture(Severity::Info, || {
            tracing::error!(error = err_ref, "query failed");
        })
        .records;

        assert_eq!(
            records[0].error,
            vec!["database unavailable".to_string(), "connection refused".to_string()]
        );
    }
}
