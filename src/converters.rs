//! Conversions between host-framework log data and sentry protocol types.

use std::error::Error;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sentry_core::protocol::{Exception, Level, Value, Values};

use crate::RecordLevel;

/// Converts a host-framework severity into a sentry [`Level`].
///
/// Profiling and trace output both map to debug, warnings and errors map to
/// their sentry counterparts, and everything else, including level names this
/// crate does not recognize, falls back to info.
pub fn convert_record_level(level: &RecordLevel) -> Level {
    match level {
        RecordLevel::Profile | RecordLevel::Trace => Level::Debug,
        RecordLevel::Warning => Level::Warning,
        RecordLevel::Error => Level::Error,
        RecordLevel::Info | RecordLevel::Other(_) => Level::Info,
    }
}

/// Converts a fractional Unix timestamp, rejecting negative and non-finite
/// values.
pub(crate) fn timestamp_to_system_time(timestamp: f64) -> Option<SystemTime> {
    Duration::try_from_secs_f64(timestamp)
        .ok()
        .map(|offset| UNIX_EPOCH + offset)
}

/// Renders a value the way it should appear in a message or tag slot.
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truthiness in the host framework's sense.
///
/// Null, false, numeric zero, the empty string, `"0"` and empty collections
/// all count as falsy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(value) => *value,
        Value::Number(number) => number.as_f64().map_or(false, |number| number != 0.0),
        Value::String(value) => !value.is_empty() && value != "0",
        Value::Array(values) => !values.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn error_typename<D: fmt::Debug>(error: D) -> String {
    format!("{error:?}")
        .split(&['(', '{'][..])
        .next()
        .unwrap()
        .trim()
        .into()
}

fn exception_from_error<E: Error + ?Sized>(error: &E) -> Exception {
    Exception {
        ty: error_typename(error),
        value: Some(error.to_string()),
        ..Default::default()
    }
}

/// Builds the exception chain for an error, innermost source first.
pub(crate) fn exceptions_from_error<E: Error + ?Sized>(error: &E) -> Values<Exception> {
    let mut exceptions = vec![exception_from_error(error)];
    let mut source = error.source();
    while let Some(error) = source {
        exceptions.push(exception_from_error(error));
        source = error.source();
    }
    exceptions.reverse();
    exceptions.into()
}
