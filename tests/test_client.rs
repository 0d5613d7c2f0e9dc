#![cfg(feature = "test")]

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sentry_pipeline::integrations::{EnvironmentIntegration, ModulesIntegration};
use sentry_pipeline::protocol::Level;
use sentry_pipeline::test::{with_captured_events, with_captured_events_options};
use sentry_pipeline::{apply_defaults, Client, ClientOptions, Hub};

#[derive(Debug)]
struct ConfigError {
    source: std::io::Error,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("could not load config")
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[test]
fn test_into_client() {
    let client: Client = "https://public@example.com/42".into();
    {
        let dsn = client.dsn().unwrap();
        assert_eq!(dsn.public_key(), "public");
        assert_eq!(dsn.host(), "example.com");
        assert_eq!(dsn.scheme(), sentry_pipeline::Scheme::Https);
        assert_eq!(dsn.project_id().value(), Some(42));
    }

    let client: Client = (
        "https://public@example.com/42",
        ClientOptions {
            release: Some("foo@1.0".into()),
            ..Default::default()
        },
    )
        .into();
    assert_eq!(client.options().release.as_deref(), Some("foo@1.0"));

    let client: Client = "not a dsn".into();
    assert!(!client.is_enabled());
}

#[test]
fn test_processor_veto_short_circuits() {
    static THIRD_CALLED: AtomicUsize = AtomicUsize::new(0);

    let events = with_captured_events(|| {
        sentry_pipeline::configure_scope(|scope| {
            scope.add_event_processor(|mut event, _| {
                event.tags.insert("first".into(), "yes".into());
                Some(event)
            });
            scope.add_event_processor(|event, _| {
                (event.message.as_deref() != Some("veto")).then_some(event)
            });
            scope.add_event_processor(|event, _| {
                THIRD_CALLED.fetch_add(1, Ordering::SeqCst);
                Some(event)
            });
        });
        assert!(sentry_pipeline::capture_message("veto", Level::Info).is_none());
        assert!(sentry_pipeline::capture_message("pass", Level::Info).is_some());
    });

    assert_eq!(THIRD_CALLED.load(Ordering::SeqCst), 1);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tags.get("first").map(String::as_str), Some("yes"));
}

#[test]
fn test_default_integrations_enrich_events() {
    let options = apply_defaults(ClientOptions {
        environment: Some("staging".into()),
        ..Default::default()
    });
    let events = with_captured_events_options(
        || {
            sentry_pipeline::capture_message("enriched", Level::Info);
            let client = Hub::current().client().unwrap();
            assert!(client.get_integration::<EnvironmentIntegration>().is_some());
            assert!(client.integration("modules").is_some());
            assert!(client.get_integration::<ModulesIntegration>().is_some());
        },
        options,
    );

    let event = &events[0];
    assert_eq!(event.environment.as_deref(), Some("staging"));
    assert!(event.contexts.contains_key("os"));
    assert!(event.contexts.contains_key("runtime"));
    assert!(event.modules.contains_key("sentry-pipeline"));
    let sdk = event.sdk.as_ref().unwrap();
    assert_eq!(sdk.integrations, ["environment", "modules"]);
}

#[test]
fn test_capture_error_chain() {
    let err = ConfigError {
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "config.toml missing"),
    };
    let events = with_captured_events(|| {
        sentry_pipeline::capture_error(&err);
    });

    let event = &events[0];
    assert_eq!(event.level, Some(Level::Error));
    let values: Vec<_> = event
        .exception
        .iter()
        .map(|exc| (exc.ty.as_str(), exc.value.as_deref()))
        .collect();
    assert_eq!(
        values,
        [
            ("Custom", Some("config.toml missing")),
            ("ConfigError", Some("could not load config")),
        ]
    );
}

#[test]
fn test_before_send_sees_final_event() {
    let mut options = ClientOptions {
        release: Some("app@2.0".into()),
        ..Default::default()
    };
    options.set_before_send(|mut event| {
        assert_eq!(event.release.as_deref(), Some("app@2.0"));
        event.server_name = Some("scrubbed".into());
        Some(event)
    });

    let events = with_captured_events_options(
        || {
            sentry_pipeline::capture_message("hello", Level::Info);
        },
        options,
    );
    assert_eq!(events[0].server_name.as_deref(), Some("scrubbed"));
}

#[test]
fn test_disabled_client_is_inert() {
    let client = Arc::new(Client::from(ClientOptions::default()));
    assert!(!client.is_enabled());
    let hub = Hub::new(Some(client.clone()), Default::default());
    assert!(hub.capture_message("nothing", Level::Error).is_none());
    assert!(client.flush(None));
}
