use std::error::Error;
use std::fmt;

use sentry_core::protocol::{Map, Value};

/// Boxed error type accepted at the record and provider seams.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Severity of a log record as reported by the host logging framework.
///
/// Level names that the route does not recognize are preserved in
/// [`RecordLevel::Other`] and treated as informational.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordLevel {
    /// Performance profiling output.
    Profile,
    /// Verbose tracing output.
    Trace,
    /// Informational messages.
    Info,
    /// Warnings.
    Warning,
    /// Errors.
    Error,
    /// A level name this crate does not recognize.
    Other(String),
}

impl RecordLevel {
    /// Returns the level name as the host framework spells it.
    pub fn name(&self) -> &str {
        match self {
            RecordLevel::Profile => "profile",
            RecordLevel::Trace => "trace",
            RecordLevel::Info => "info",
            RecordLevel::Warning => "warning",
            RecordLevel::Error => "error",
            RecordLevel::Other(name) => name,
        }
    }
}

impl From<&str> for RecordLevel {
    fn from(name: &str) -> RecordLevel {
        match name.to_ascii_lowercase().as_str() {
            "profile" => RecordLevel::Profile,
            "trace" => RecordLevel::Trace,
            "info" => RecordLevel::Info,
            "warning" => RecordLevel::Warning,
            "error" => RecordLevel::Error,
            _ => RecordLevel::Other(name.into()),
        }
    }
}

impl fmt::Display for RecordLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The payload of a single log record.
///
/// Host logging frameworks hand over either free-form message text, a
/// structured key/value mapping, or a captured error. The route branches on
/// this tag instead of re-inspecting values at dispatch time.
#[derive(Debug)]
pub enum LogPayload {
    /// Free-form message text, possibly with call-stack text inlined by the
    /// upstream logger.
    Text(String),
    /// Structured key/value data.
    ///
    /// The reserved keys `msg`, `message` and `tags` are split out during
    /// normalization; everything else becomes event extras.
    Structured {
        /// The key/value fields of the record.
        fields: Map<String, Value>,
        /// An error reported alongside the structured data, attached to the
        /// outgoing event as an exception chain.
        exception: Option<BoxError>,
    },
    /// A captured error reported as the record itself.
    Exception(BoxError),
}

impl LogPayload {
    /// Creates a structured payload without an attached error.
    pub fn structured(fields: Map<String, Value>) -> Self {
        LogPayload::Structured {
            fields,
            exception: None,
        }
    }

    /// Creates an error payload.
    pub fn exception<E: Error + Send + Sync + 'static>(error: E) -> Self {
        LogPayload::Exception(Box::new(error))
    }
}

impl From<&str> for LogPayload {
    fn from(text: &str) -> LogPayload {
        LogPayload::Text(text.into())
    }
}

impl From<String> for LogPayload {
    fn from(text: String) -> LogPayload {
        LogPayload::Text(text)
    }
}

impl From<Map<String, Value>> for LogPayload {
    fn from(fields: Map<String, Value>) -> LogPayload {
        LogPayload::structured(fields)
    }
}

/// A single raw log record as delivered by the host logging framework.
#[derive(Debug)]
pub struct LogRecord {
    /// The record payload.
    pub payload: LogPayload,
    /// The severity reported by the host framework.
    pub level: RecordLevel,
    /// The category label under which the record was logged.
    pub category: String,
    /// Seconds since the Unix epoch, possibly fractional.
    pub timestamp: f64,
}

impl LogRecord {
    /// Creates a record from its parts.
    pub fn new(
        payload: impl Into<LogPayload>,
        level: RecordLevel,
        category: impl Into<String>,
        timestamp: f64,
    ) -> LogRecord {
        LogRecord {
            payload: payload.into(),
            level,
            category: category.into(),
            timestamp,
        }
    }
}

#[test]
fn test_level_from_name() {
    for name in ["profile", "trace", "info", "warning", "error"] {
        assert_eq!(RecordLevel::from(name).name(), name);
    }
    assert_eq!(RecordLevel::from("WARNING"), RecordLevel::Warning);
    assert_eq!(
        RecordLevel::from("audit"),
        RecordLevel::Other("audit".into())
    );
    assert_eq!(RecordLevel::from("Audit").name(), "Audit");
}
