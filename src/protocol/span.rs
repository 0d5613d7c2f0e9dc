use std::collections::BTreeMap;
use std::fmt;
use std::str;
use std::time::SystemTime;

use serde::{Serialize, Serializer};
use thiserror::Error;

use super::{Context, Map, Value};
use crate::utils::ts_seconds_float;

macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident, $len:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash)]
        pub struct $name([u8; $len]);

        impl Default for $name {
            fn default() -> Self {
                Self(rand::random())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
                write!(fmt, "{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
                write!(fmt, "{}({})", stringify!($name), self)
            }
        }

        impl str::FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(input: &str) -> Result<Self, Self::Err> {
                let mut buf = [0; $len];
                hex::decode_to_slice(input, &mut buf)?;
                Ok(Self(buf))
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(value: [u8; $len]) -> Self {
                Self(value)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }
    };
}

hex_id!(
    /// Holds the identifier for a Span
    SpanId,
    8
);
hex_id!(
    /// Holds the identifier for a Trace
    TraceId,
    16
);

/// An error used when parsing `SpanStatus`.
#[derive(Debug, Error)]
#[error("invalid status")]
pub struct ParseStatusError;

/// The status of a Span.
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SpanStatus {
    /// The operation completed successfully.
    Ok,
    /// Deadline expired before operation could complete.
    DeadlineExceeded,
    /// 401 Unauthorized (actually does mean unauthenticated according to RFC 7235)
    Unauthenticated,
    /// 403 Forbidden
    PermissionDenied,
    /// 404 Not Found. Some requested entity (file or directory) was not found.
    NotFound,
    /// 429 Too Many Requests
    ResourceExhausted,
    /// Client specified an invalid argument. 4xx.
    InvalidArgument,
    /// 501 Not Implemented
    Unimplemented,
    /// 503 Service Unavailable
    Unavailable,
    /// Other/generic 5xx.
    InternalError,
    /// Unknown. Any non-standard HTTP status code.
    UnknownError,
    /// The operation was cancelled (typically by the user).
    Cancelled,
    /// Already exists (409)
    AlreadyExists,
    /// The operation was aborted, typically due to a concurrency issue.
    Aborted,
}

impl SpanStatus {
    /// Maps an HTTP status code to a span status.
    pub fn from_http_status(code: u16) -> SpanStatus {
        match code {
            200..=299 => SpanStatus::Ok,
            401 => SpanStatus::Unauthenticated,
            403 => SpanStatus::PermissionDenied,
            404 => SpanStatus::NotFound,
            409 => SpanStatus::AlreadyExists,
            429 => SpanStatus::ResourceExhausted,
            400..=499 => SpanStatus::InvalidArgument,
            501 => SpanStatus::Unimplemented,
            503 => SpanStatus::Unavailable,
            500..=599 => SpanStatus::InternalError,
            _ => SpanStatus::UnknownError,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            SpanStatus::Ok => "ok",
            SpanStatus::DeadlineExceeded => "deadline_exceeded",
            SpanStatus::Unauthenticated => "unauthenticated",
            SpanStatus::PermissionDenied => "permission_denied",
            SpanStatus::NotFound => "not_found",
            SpanStatus::ResourceExhausted => "resource_exhausted",
            SpanStatus::InvalidArgument => "invalid_argument",
            SpanStatus::Unimplemented => "unimplemented",
            SpanStatus::Unavailable => "unavailable",
            SpanStatus::InternalError => "internal_error",
            SpanStatus::UnknownError => "unknown_error",
            SpanStatus::Cancelled => "cancelled",
            SpanStatus::AlreadyExists => "already_exists",
            SpanStatus::Aborted => "aborted",
        }
    }
}

impl str::FromStr for SpanStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<SpanStatus, Self::Err> {
        Ok(match s {
            "ok" => SpanStatus::Ok,
            "deadline_exceeded" => SpanStatus::DeadlineExceeded,
            "unauthenticated" => SpanStatus::Unauthenticated,
            "permission_denied" => SpanStatus::PermissionDenied,
            "not_found" => SpanStatus::NotFound,
            "resource_exhausted" => SpanStatus::ResourceExhausted,
            "invalid_argument" => SpanStatus::InvalidArgument,
            "unimplemented" => SpanStatus::Unimplemented,
            "unavailable" => SpanStatus::Unavailable,
            "internal_error" => SpanStatus::InternalError,
            "unknown_error" => SpanStatus::UnknownError,
            "cancelled" => SpanStatus::Cancelled,
            "already_exists" => SpanStatus::AlreadyExists,
            "aborted" => SpanStatus::Aborted,
            _ => return Err(ParseStatusError),
        })
    }
}

impl fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holds information about a tracing event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceContext {
    /// The ID of the trace event
    pub span_id: SpanId,
    /// Determines which trace the transaction belongs to.
    pub trace_id: TraceId,
    /// Determines the parent of this transaction if any.
    pub parent_span_id: Option<SpanId>,
    /// Short code identifying the type of operation the transaction is measuring.
    pub op: Option<String>,
    /// Human readable detail description.
    pub description: Option<String>,
    /// Describes the status of the span (e.g. `ok`, `cancelled`, etc.)
    pub status: Option<SpanStatus>,
    /// Arbitrary data attached to the span.
    pub data: Map<String, Value>,
}

impl From<TraceContext> for Context {
    fn from(trace: TraceContext) -> Context {
        let mut context = Context::new();
        context.insert("trace_id".into(), trace.trace_id.to_string().into());
        context.insert("span_id".into(), trace.span_id.to_string().into());
        if let Some(parent_span_id) = trace.parent_span_id {
            context.insert("parent_span_id".into(), parent_span_id.to_string().into());
        }
        if let Some(op) = trace.op {
            context.insert("op".into(), op.into());
        }
        if let Some(description) = trace.description {
            context.insert("description".into(), description.into());
        }
        if let Some(status) = trace.status {
            context.insert("status".into(), status.to_string().into());
        }
        if !trace.data.is_empty() {
            context.insert("data".into(), Value::Object(trace.data));
        }
        context
    }
}

/// A finished span as it is sent inside a transaction.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Span {
    /// The ID of the span
    pub span_id: SpanId,
    /// Determines which trace the span belongs to.
    pub trace_id: TraceId,
    /// Timestamp when the span was started.
    #[serde(with = "ts_seconds_float")]
    pub start_timestamp: SystemTime,
    /// Determines the parent of this span, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    /// Timestamp when the span was ended.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_end"
    )]
    pub timestamp: Option<SystemTime>,
    /// Describes the status of the span (e.g. `ok`, `cancelled`, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SpanStatus>,
    /// Longer description of the span's operation, which uniquely identifies the span
    /// but is consistent across instances of the span.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Short code identifying the type of operation the span is measuring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    /// Arbitrary additional data on a span, like `extra` on the top-level event.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
    /// Optional tags to be attached to the span.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

fn serialize_end<S: Serializer>(ts: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error> {
    match ts {
        Some(ts) => ts_seconds_float::serialize(ts, serializer),
        None => serializer.serialize_none(),
    }
}

impl Default for Span {
    fn default() -> Self {
        Span {
            span_id: Default::default(),
            trace_id: Default::default(),
            start_timestamp: SystemTime::now(),
            parent_span_id: None,
            timestamp: None,
            status: None,
            description: None,
            op: None,
            data: Map::new(),
            tags: BTreeMap::new(),
        }
    }
}

impl Span {
    /// Finalizes the span.
    pub fn finish(&mut self) {
        self.timestamp = Some(SystemTime::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_roundtrip_through_hex() {
        let trace_id: TraceId = "4c79f60c11214eb38604f4ae0781bfb2".parse().unwrap();
        assert_eq!(trace_id.to_string(), "4c79f60c11214eb38604f4ae0781bfb2");
        assert!("xyz".parse::<SpanId>().is_err());
        assert_ne!(SpanId::default(), SpanId::default());
    }

    #[test]
    fn test_trace_context_omits_empty_fields() {
        let trace = TraceContext {
            trace_id: [1; 16].into(),
            span_id: [2; 8].into(),
            op: Some("http.server".into()),
            ..Default::default()
        };
        let context: Context = trace.into();
        assert_eq!(
            Value::Object(context).to_string(),
            r#"{"trace_id":"01010101010101010101010101010101","span_id":"0202020202020202","op":"http.server"}"#
        );
    }

    #[test]
    fn test_status_from_http() {
        assert_eq!(SpanStatus::from_http_status(204), SpanStatus::Ok);
        assert_eq!(SpanStatus::from_http_status(418), SpanStatus::InvalidArgument);
        assert_eq!(SpanStatus::from_http_status(502), SpanStatus::InternalError);
        assert_eq!("not_found".parse::<SpanStatus>().unwrap(), SpanStatus::NotFound);
    }
}
