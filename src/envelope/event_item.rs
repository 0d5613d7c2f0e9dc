use serde_json::to_value;

use super::{EnvelopeError, Item};
use crate::constants::{SDK_NAME, VERSION};
use crate::protocol::{Event, Map, Value};
use crate::utils::timestamp_value;

pub(super) fn to_item(event: &Event) -> Result<Item, EnvelopeError> {
    Ok(Item::new("event", Value::Object(body(event)?)))
}

fn values(list: Value) -> Value {
    let mut wrapper = Map::new();
    wrapper.insert("values".into(), list);
    Value::Object(wrapper)
}

fn sdk(event: &Event) -> Result<Value, serde_json::Error> {
    match &event.sdk {
        Some(info) => to_value(info),
        None => {
            let mut sdk = Map::new();
            sdk.insert("name".into(), SDK_NAME.into());
            sdk.insert("version".into(), VERSION.into());
            Ok(Value::Object(sdk))
        }
    }
}

fn message(event: &Event) -> Option<Value> {
    let message = event.message.as_deref()?;
    if event.message_params.is_empty() && event.message_formatted.is_none() {
        return Some(message.into());
    }

    let mut object = Map::new();
    object.insert("message".into(), message.into());
    object.insert(
        "params".into(),
        event.message_params.iter().map(String::as_str).collect(),
    );
    if let Some(formatted) = &event.message_formatted {
        object.insert("formatted".into(), formatted.as_str().into());
    }
    Some(Value::Object(object))
}

/// The fields shared by error and transaction payloads, in wire order.
pub(super) fn body(event: &Event) -> Result<Map<String, Value>, serde_json::Error> {
    let mut body = Map::new();
    body.insert("timestamp".into(), timestamp_value(&event.timestamp));
    body.insert("platform".into(), event.platform.as_str().into());
    body.insert("sdk".into(), sdk(event)?);

    if let Some(start) = &event.start_timestamp {
        body.insert("start_timestamp".into(), timestamp_value(start));
    }
    if let Some(level) = event.level {
        body.insert("level".into(), level.to_string().into());
    }
    if let Some(logger) = &event.logger {
        body.insert("logger".into(), logger.as_str().into());
    }
    if let Some(transaction) = &event.transaction {
        body.insert("transaction".into(), transaction.as_str().into());
    }
    if let Some(server_name) = &event.server_name {
        body.insert("server_name".into(), server_name.as_str().into());
    }
    if let Some(release) = &event.release {
        body.insert("release".into(), release.as_str().into());
    }
    if let Some(environment) = &event.environment {
        body.insert("environment".into(), environment.as_str().into());
    }
    if !event.fingerprint.is_empty() {
        body.insert("fingerprint".into(), to_value(&event.fingerprint)?);
    }
    if !event.modules.is_empty() {
        body.insert("modules".into(), to_value(&event.modules)?);
    }
    if !event.extra.is_empty() {
        body.insert("extra".into(), Value::Object(event.extra.clone()));
    }
    if !event.tags.is_empty() {
        body.insert("tags".into(), to_value(&event.tags)?);
    }
    if let Some(user) = event.user.as_ref().filter(|user| !user.is_empty()) {
        body.insert("user".into(), to_value(user)?);
    }
    if !event.contexts.is_empty() {
        body.insert("contexts".into(), to_value(&event.contexts)?);
    }
    if !event.breadcrumbs.is_empty() {
        body.insert("breadcrumbs".into(), values(to_value(&event.breadcrumbs)?));
    }
    if !event.request.is_empty() {
        body.insert("request".into(), Value::Object(event.request.clone()));
    }
    if let Some(message) = message(event) {
        body.insert("message".into(), message);
    }
    if !event.exception.is_empty() {
        body.insert("exception".into(), values(to_value(&event.exception)?));
    }
    if let Some(stacktrace) = &event.stacktrace {
        body.insert("stacktrace".into(), to_value(stacktrace)?);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::protocol::{Breadcrumb, Exception, Level, User};

    fn event_at(secs: u64) -> Event {
        Event {
            timestamp: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
            sdk: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_collections_are_omitted() {
        let mut event = event_at(10);
        event.user = Some(User::default());
        let body = body(&event).unwrap();
        let keys: Vec<_> = body.keys().map(String::as_str).collect();
        assert_eq!(keys, ["timestamp", "platform", "sdk"]);
    }

    #[test]
    fn test_fields_keep_wire_order() {
        let mut event = event_at(10);
        event.level = Some(Level::Error);
        event.release = Some("app@1.0".into());
        event.tags.insert("route".into(), "/".into());
        event.breadcrumbs.push(Breadcrumb::default());
        event.message = Some("boom".into());
        event.exception.push(Exception {
            ty: "Error".into(),
            ..Default::default()
        });

        let body = body(&event).unwrap();
        let keys: Vec<_> = body.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                "timestamp",
                "platform",
                "sdk",
                "level",
                "release",
                "tags",
                "breadcrumbs",
                "message",
                "exception"
            ]
        );
        assert_eq!(body["exception"]["values"][0]["type"], "Error");
        assert_eq!(body["message"], "boom");
    }

    #[test]
    fn test_message_with_params() {
        let mut event = event_at(10);
        event.message = Some("user %s failed".into());
        event.message_params = vec!["jane".into()];
        event.message_formatted = Some("user jane failed".into());
        assert_eq!(
            Value::Object(body(&event).unwrap())["message"].to_string(),
            r#"{"message":"user %s failed","params":["jane"],"formatted":"user jane failed"}"#
        );
    }
}
