use uuid::Uuid;

use super::{EnvelopeError, Item};
use crate::protocol::{Event, EventType, Map, Value};

fn simple_id(id: &Uuid) -> Value {
    id.as_simple().to_string().into()
}

pub(super) fn to_item(event: &Event) -> Result<Item, EnvelopeError> {
    let check_in = event
        .check_in
        .as_ref()
        .ok_or(EnvelopeError::MissingPayload(EventType::CheckIn))?;

    let mut body = Map::new();
    body.insert("check_in_id".into(), simple_id(&check_in.check_in_id));
    body.insert("monitor_slug".into(), check_in.monitor_slug.as_str().into());
    body.insert("status".into(), check_in.status.to_string().into());
    if let Some(duration) = check_in.duration {
        body.insert("duration".into(), duration.into());
    }
    if let Some(release) = &check_in.release {
        body.insert("release".into(), release.as_str().into());
    }
    if let Some(environment) = &check_in.environment {
        body.insert("environment".into(), environment.as_str().into());
    }
    if let Some(config) = &check_in.monitor_config {
        body.insert("monitor_config".into(), serde_json::to_value(config)?);
    }

    let trace_id = event
        .contexts
        .get("trace")
        .and_then(|trace| trace.get("trace_id"));
    if let Some(trace_id) = trace_id {
        let mut trace = Map::new();
        trace.insert("trace_id".into(), trace_id.clone());
        let mut contexts = Map::new();
        contexts.insert("trace".into(), Value::Object(trace));
        body.insert("contexts".into(), Value::Object(contexts));
    }

    Ok(Item::new("check_in", Value::Object(body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        CheckIn, CheckInStatus, MonitorConfig, MonitorIntervalUnit, MonitorSchedule, TraceContext,
    };

    #[test]
    fn test_minimal_check_in() {
        let mut check_in = CheckIn::new("backup", CheckInStatus::InProgress);
        check_in.check_in_id = "fc9442f5aef34234bb22b9a615e30ccd".parse().unwrap();
        let item = to_item(&Event::check_in(check_in)).unwrap();
        assert_eq!(
            item.body.to_string(),
            r#"{"check_in_id":"fc9442f5aef34234bb22b9a615e30ccd","monitor_slug":"backup","status":"in_progress"}"#
        );
    }

    #[test]
    fn test_full_check_in() {
        let mut check_in = CheckIn::new("backup", CheckInStatus::Error);
        check_in.duration = Some(1.5);
        check_in.environment = Some("production".into());
        check_in.monitor_config = Some(MonitorConfig::new(MonitorSchedule::Interval {
            value: 1,
            unit: MonitorIntervalUnit::Hour,
        }));
        let mut event = Event::check_in(check_in);
        let trace = TraceContext {
            trace_id: [7; 16].into(),
            ..Default::default()
        };
        event.contexts.insert("trace".into(), trace.into());

        let item = to_item(&event).unwrap();
        assert_eq!(item.body["duration"], 1.5);
        assert_eq!(item.body["environment"], "production");
        assert_eq!(
            item.body["monitor_config"].to_string(),
            r#"{"schedule":{"type":"interval","value":1,"unit":"hour"}}"#
        );
        assert_eq!(
            item.body["contexts"].to_string(),
            r#"{"trace":{"trace_id":"07070707070707070707070707070707"}}"#
        );
    }

    #[test]
    fn test_missing_payload() {
        let event = Event {
            ty: EventType::CheckIn,
            ..Default::default()
        };
        assert!(matches!(
            to_item(&event),
            Err(EnvelopeError::MissingPayload(EventType::CheckIn))
        ));
    }
}
