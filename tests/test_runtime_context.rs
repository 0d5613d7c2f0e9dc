#![cfg(feature = "test")]

use std::sync::Arc;
use std::time::Duration;

use sentry_pipeline::protocol::{EventType, Level, LogAttribute, LogLevel};
use sentry_pipeline::test::TestTransport;
use sentry_pipeline::{
    ClientOptions, Hub, RuntimeContextManager, Scope, ThreadKeyResolver,
};

fn base_hub() -> (Arc<Hub>, Arc<TestTransport>) {
    let transport = TestTransport::new();
    let options = ClientOptions {
        dsn: Some("https://public@sentry.invalid/1".parse().unwrap()),
        release: Some("worker@1.0".into()),
        transport: Some(Arc::new(transport.clone())),
        ..Default::default()
    };
    let hub = Hub::new(Some(Arc::new(options.into())), Arc::new(Scope::default()));
    (Arc::new(hub), transport)
}

#[test]
fn test_end_context_flushes_buffers() {
    let (base, transport) = base_hub();
    let manager = RuntimeContextManager::new(base);

    let context = manager.start_context();
    context.logs().add(
        context.hub(),
        LogLevel::Info,
        "job started",
        [("job.id".to_owned(), LogAttribute::from("42"))],
    );
    context.metrics().count(context.hub(), "jobs.started", 1.0, []);
    assert!(transport.fetch_and_clear_events().is_empty());

    assert!(manager.end_context(Some(Duration::from_secs(1))));
    let events = transport.fetch_and_clear_events();
    let types: Vec<_> = events.iter().map(|event| event.ty).collect();
    assert_eq!(types, [EventType::Log, EventType::Metric]);
    assert_eq!(events[0].logs[0].body, "job started");
    assert_eq!(events[1].metrics[0].name, "jobs.started");
}

#[test]
fn test_with_context_isolates_scope() {
    let (base, transport) = base_hub();
    let manager = RuntimeContextManager::new(base.clone());

    manager.with_context(None, || {
        sentry_pipeline::configure_scope(|scope| scope.set_tag("request", "first"));
        sentry_pipeline::capture_message("in request", Level::Info);
    });
    manager.with_context(None, || {
        sentry_pipeline::capture_message("next request", Level::Info);
    });
    base.capture_message("outside", Level::Info);

    let events = transport.fetch_and_clear_events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].tags.get("request").map(String::as_str), Some("first"));
    assert!(events[1].tags.get("request").is_none());
    assert!(events[2].tags.get("request").is_none());
    assert!(events
        .iter()
        .all(|event| event.release.as_deref() == Some("worker@1.0")));
}

#[test]
fn test_restart_ends_previous_context() {
    let (base, transport) = base_hub();
    let manager = RuntimeContextManager::new(base);

    let first = manager.start_context();
    first.metrics().gauge(first.hub(), "queue.depth", 3.0, []);
    let second = manager.start_context();

    assert!(!Arc::ptr_eq(first.hub(), second.hub()));
    assert!(Arc::ptr_eq(
        &manager.current_context().unwrap(),
        &second
    ));
    assert_eq!(transport.fetch_and_clear_events().len(), 1);
}

#[test]
fn test_thread_keys_are_independent() {
    let (base, _) = base_hub();
    let manager = Arc::new(RuntimeContextManager::with_resolver(
        base.clone(),
        ThreadKeyResolver,
    ));
    let main = manager.start_context();

    let other = manager.clone();
    std::thread::spawn(move || {
        assert!(other.current_context().is_none());
        assert!(Arc::ptr_eq(&other.current_hub(), &base));
        other.start_context();
        assert!(other.end_context(None));
    })
    .join()
    .unwrap();

    assert_eq!(manager.current_context().unwrap().key(), main.key());
    assert!(manager.end_context(None));
    assert!(manager.current_context().is_none());
}

#[test]
fn test_panics_still_end_the_context() {
    let _ = pretty_env_logger::try_init();
    let (base, _) = base_hub();
    let manager = RuntimeContextManager::new(base);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        manager.with_context(None, || panic!("job failed"));
    }));
    assert!(result.is_err());
    assert!(manager.current_context().is_none());
}
