use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::{TraceId, Value};
use crate::utils::ts_seconds_float;

/// The severity of a structured [`Log`].
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Very fine-grained diagnostics.
    Trace,
    /// Debug information.
    Debug,
    /// Informational messages.
    Info,
    /// Something looks off.
    Warn,
    /// An error occurred.
    Error,
    /// The application cannot continue.
    Fatal,
}

impl LogLevel {
    /// The OpenTelemetry severity number of the level.
    pub fn severity_number(self) -> u8 {
        match self {
            LogLevel::Trace => 1,
            LogLevel::Debug => 5,
            LogLevel::Info => 9,
            LogLevel::Warn => 13,
            LogLevel::Error => 17,
            LogLevel::Fatal => 21,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        })
    }
}

/// A single attribute value of a [`Log`] or [`Metric`](super::Metric).
///
/// On the wire every attribute is an object of its value and a type tag.
#[derive(Debug, Clone, PartialEq)]
pub struct LogAttribute(pub Value);

impl LogAttribute {
    fn type_name(&self) -> &'static str {
        match &self.0 {
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
            Value::Number(_) => "double",
            _ => "string",
        }
    }
}

macro_rules! impl_attribute_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for LogAttribute {
                fn from(value: $ty) -> Self {
                    LogAttribute(Value::from(value))
                }
            }
        )*
    };
}

impl_attribute_from!(&str, String, bool, i32, i64, u32, u64, f64);

impl From<Value> for LogAttribute {
    fn from(value: Value) -> Self {
        LogAttribute(value)
    }
}

impl Serialize for LogAttribute {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match &self.0 {
            value @ (Value::Bool(_) | Value::Number(_) | Value::String(_)) => {
                map.serialize_entry("value", value)?
            }
            other => map.serialize_entry("value", &other.to_string())?,
        }
        map.serialize_entry("type", self.type_name())?;
        map.end()
    }
}

/// A structured log line.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Log {
    /// When the log was recorded.
    #[serde(with = "ts_seconds_float")]
    pub timestamp: SystemTime,
    /// The trace the log belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<TraceId>,
    /// The severity of the log.
    pub level: LogLevel,
    /// The formatted message.
    pub body: String,
    /// Additional structured data.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, LogAttribute>,
}

impl Log {
    /// Creates a log at the given level, timestamped now.
    pub fn new(level: LogLevel, body: impl Into<String>) -> Self {
        Log {
            timestamp: SystemTime::now(),
            trace_id: None,
            level,
            body: body.into(),
            attributes: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    #[test]
    fn test_attributes_carry_type_tags() {
        let mut log = Log::new(LogLevel::Warn, "disk almost full");
        log.timestamp = SystemTime::UNIX_EPOCH + Duration::from_secs(2);
        log.attributes.insert("free".into(), 12.into());
        log.attributes.insert("ratio".into(), 0.5.into());
        log.attributes.insert("mount".into(), "/var".into());
        log.attributes.insert("readonly".into(), false.into());

        assert_eq!(
            serde_json::to_string(&log).unwrap(),
            concat!(
                r#"{"timestamp":2.0,"level":"warn","body":"disk almost full","attributes":{"#,
                r#""free":{"value":12,"type":"integer"},"#,
                r#""mount":{"value":"/var","type":"string"},"#,
                r#""ratio":{"value":0.5,"type":"double"},"#,
                r#""readonly":{"value":false,"type":"boolean"}}}"#
            )
        );
    }

    #[test]
    fn test_severity_numbers() {
        assert_eq!(LogLevel::Info.severity_number(), 9);
        assert!(LogLevel::Error > LogLevel::Warn);
    }
}
