use std::time::{Duration, SystemTime};

use sentry_pipeline::protocol::{Breadcrumb, Event, Level, Log, LogLevel};
use sentry_pipeline::{PayloadSerializer, Uuid, VERSION};

fn sent_at() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_597_790_835)
}

fn fixed_event() -> Event {
    Event {
        event_id: "fc9442f5aef34234bb22b9a615e30ccd".parse::<Uuid>().unwrap(),
        timestamp: SystemTime::UNIX_EPOCH + Duration::from_secs(1_597_790_835),
        ..Default::default()
    }
}

fn serialize(serializer: &PayloadSerializer, event: &Event) -> String {
    String::from_utf8(serializer.serialize_at(event, sent_at()).unwrap()).unwrap()
}

#[test]
fn test_minimal_event_envelope() {
    let serializer = PayloadSerializer::new(Some("https://public@example.com/1".parse().unwrap()));
    let sdk = format!(r#"{{"name":"sentry.rust","version":"{}"}}"#, VERSION);

    let expected = format!(
        "{{\"event_id\":\"fc9442f5aef34234bb22b9a615e30ccd\",\"sent_at\":\"2020-08-18T22:47:15Z\",\"dsn\":\"https://public@example.com/1\",\"sdk\":{sdk}}}\n\
         {{\"type\":\"event\",\"content_type\":\"application/json\"}}\n\
         {{\"timestamp\":1597790835,\"platform\":\"native\",\"sdk\":{sdk}}}"
    );
    assert_eq!(serialize(&serializer, &fixed_event()), expected);
}

#[test]
fn test_empty_tags_are_left_out() {
    let event = fixed_event();
    assert!(event.tags.is_empty());
    let envelope = serialize(&PayloadSerializer::default(), &event);
    assert!(!envelope.contains("\"tags\""));

    let mut event = fixed_event();
    event.tags.insert("worker".into(), "w1".into());
    let envelope = serialize(&PayloadSerializer::default(), &event);
    assert!(envelope.contains(r#""tags":{"worker":"w1"}"#));
}

#[test]
fn test_breadcrumbs_are_wrapped_in_values() {
    let mut event = fixed_event();
    event.level = Some(Level::Warning);
    event.breadcrumbs.push(Breadcrumb {
        timestamp: SystemTime::UNIX_EPOCH + Duration::from_secs(1_597_790_830),
        ty: "http".into(),
        category: Some("request".into()),
        message: Some("GET /".into()),
        ..Default::default()
    });

    let envelope = serialize(&PayloadSerializer::default(), &event);
    let body: serde_json::Value = serde_json::from_str(envelope.lines().nth(2).unwrap()).unwrap();
    assert_eq!(body["level"], "warning");
    assert_eq!(body["breadcrumbs"]["values"][0]["category"], "request");
    assert_eq!(body["breadcrumbs"]["values"][0]["message"], "GET /");
}

#[test]
fn test_log_batch_item() {
    let logs = vec![
        Log::new(LogLevel::Info, "first"),
        Log::new(LogLevel::Error, "second"),
    ];
    let envelope = serialize(&PayloadSerializer::default(), &Event::logs(logs));
    let lines: Vec<_> = envelope.lines().collect();
    assert_eq!(lines.len(), 3);

    let header: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(header["type"], "log");
    assert_eq!(header["item_count"], 2);

    let body: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
    assert_eq!(body["items"][1]["body"], "second");
}

#[test]
fn test_transaction_without_profile_has_one_item() {
    let mut event = Event::transaction();
    event.transaction = Some("GET /health".into());
    let envelope = serialize(&PayloadSerializer::default(), &event);
    let lines: Vec<_> = envelope.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[1],
        r#"{"type":"transaction","content_type":"application/json"}"#
    );

    let body: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
    assert_eq!(body["transaction"], "GET /health");
    assert_eq!(body["type"], "transaction");
}
