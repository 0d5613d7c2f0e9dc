use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::Serialize;

use super::{LogAttribute, TraceId};
use crate::utils::ts_seconds_float;

/// How a [`Metric`] value is aggregated server side.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// Values are summed up.
    Counter,
    /// The last value wins.
    Gauge,
    /// Every value is kept for percentiles.
    Distribution,
}

/// A single trace metric data point.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Metric {
    /// When the value was recorded.
    #[serde(with = "ts_seconds_float")]
    pub timestamp: SystemTime,
    /// The trace active while recording.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<TraceId>,
    /// The metric name.
    pub name: String,
    /// The aggregation type.
    #[serde(rename = "type")]
    pub ty: MetricType,
    /// The recorded value.
    pub value: f64,
    /// The unit of the value, e.g. `millisecond`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Additional dimensions.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, LogAttribute>,
}

impl Metric {
    /// Creates a data point timestamped now.
    pub fn new(name: impl Into<String>, ty: MetricType, value: f64) -> Self {
        Metric {
            timestamp: SystemTime::now(),
            trace_id: None,
            name: name.into(),
            ty,
            value,
            unit: None,
            attributes: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_metric_serialization() {
        let mut metric = Metric::new("queue.depth", MetricType::Gauge, 3.0);
        metric.timestamp = SystemTime::UNIX_EPOCH + Duration::from_millis(1_500);
        metric.unit = Some("none".into());
        assert_eq!(
            serde_json::to_string(&metric).unwrap(),
            r#"{"timestamp":1.5,"name":"queue.depth","type":"gauge","value":3.0,"unit":"none"}"#
        );
    }
}
