use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp layout used in rendered log lines, e.g. `2024-01-15 10:30:45,123`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Importance of a log record.
///
/// Ordered from least to most severe so a threshold check is a plain
/// comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Map a `tracing` level onto a severity. `TRACE` folds into `Debug`;
    /// `Critical` is never produced here because `tracing` has no such level.
    pub fn from_level(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Severity::Error,
            tracing::Level::WARN => Severity::Warning,
            tracing::Level::INFO => Severity::Info,
            _ => Severity::Debug,
        }
    }

    /// Parse the value of a `severity` event field.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "debug" => Some(Severity::Debug),
            "info" => Some(Severity::Info),
            "warning" | "warn" => Some(Severity::Warning),
            "error" => Some(Severity::Error),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single normalized log entry as produced by the layer.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub level: Severity,
    pub target: String,
    /// Caller file supplied by the emitter, not derived from event metadata.
    pub file: Option<String>,
    /// Caller function supplied by the emitter.
    pub func: Option<String>,
    pub message: Option<String>,
    /// Rendered error chain, outermost first.
    pub error: Vec<String>,
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogRecord {
    /// Render the record as `timestamp - LEVEL - file - func - message`,
    /// followed by one `Caused by:` line per entry in the error chain.
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{} - {} - {} - {} - {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.level,
            self.file.as_deref().unwrap_or("-"),
            self.func.as_deref().unwrap_or("-"),
            self.message.as_deref().unwrap_or(""),
        );
        for cause in &self.error {
            line.push_str("\nCaused by: ");
            line.push_str(cause);
        }
        line
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> LogRecord {
        LogRecord {
            timestamp: Local.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap(),
            level: Severity::Warning,
            target: "app".to_string(),
            file: Some("orders.rs".to_string()),
            func: Some("place_order".to_string()),
            message: Some("stock is low".to_string()),
            error: Vec::new(),
            fields: BTreeMap::new(),
        }
    }

    #[test]
    fn renders_python_style_line() {
        assert_eq!(
            record().to_line(),
            "2024-01-15 10:30:45,000 - WARNING - orders.rs - place_order - stock is low"
        );
    }

    #[test]
    fn appends_error_chain() {
        let mut rec = record();
        rec.error = vec!["db down".to_string(), "connection refused".to_string()];
        let line = rec.to_line();
        assert!(line.ends_with("\nCaused by: db down\nCaused by: connection refused"));
    }

    #[test]
    fn missing_caller_renders_dash() {
        let mut rec = record();
        rec.file = None;
        rec.func = None;
        assert!(rec.to_line().contains(" - WARNING - - - - - stock is low"));
    }

    #[test]
    fn severity_ordering_and_parsing() {
        assert!(Severity::Critical > Severity::Error);
        assert!(Severity::Info < Severity::Warning);
        assert_eq!(Severity::parse("CRITICAL"), Some(Severity::Critical));
        assert_eq!(Severity::parse("warn"), Some(Severity::Warning));
        assert_eq!(Severity::parse("fatal"), None);
        assert_eq!(Severity::from_level(&tracing::Level::TRACE), Severity::Debug);
    }
}
