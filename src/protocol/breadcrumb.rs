use std::time::SystemTime;

use serde::Serialize;

use super::{Level, Map, Value};
use crate::utils::ts_seconds_float;

fn is_default_type(ty: &str) -> bool {
    ty == "default"
}

/// Represents a single breadcrumb.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Breadcrumb {
    /// The timestamp of the breadcrumb.  This is required.
    #[serde(with = "ts_seconds_float")]
    pub timestamp: SystemTime,
    /// The type of the breadcrumb.
    #[serde(rename = "type", skip_serializing_if = "is_default_type")]
    pub ty: String,
    /// The optional category of the breadcrumb.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// The non optional level of the breadcrumb.  It
    /// defaults to info.
    #[serde(skip_serializing_if = "Level::is_info")]
    pub level: Level,
    /// An optional human readbale message for the breadcrumb.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Arbitrary breadcrumb data that should be send along.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl Default for Breadcrumb {
    fn default() -> Breadcrumb {
        Breadcrumb {
            timestamp: SystemTime::now(),
            ty: "default".into(),
            category: None,
            level: Level::Info,
            message: None,
            data: Map::new(),
        }
    }
}

impl Breadcrumb {
    /// Creates a breadcrumb of the given type, category and message.
    pub fn new(ty: &str, category: &str, message: impl Into<String>) -> Breadcrumb {
        Breadcrumb {
            ty: ty.into(),
            category: Some(category.into()),
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_default_fields_are_omitted() {
        let crumb = Breadcrumb {
            timestamp: SystemTime::UNIX_EPOCH + Duration::from_millis(1500),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&crumb).unwrap(),
            r#"{"timestamp":1.5}"#
        );

        let crumb = Breadcrumb {
            timestamp: SystemTime::UNIX_EPOCH + Duration::from_secs(10),
            level: Level::Error,
            ..Breadcrumb::new("http", "request", "GET /")
        };
        assert_eq!(
            serde_json::to_string(&crumb).unwrap(),
            r#"{"timestamp":10.0,"type":"http","category":"request","level":"error","message":"GET /"}"#
        );
    }
}
