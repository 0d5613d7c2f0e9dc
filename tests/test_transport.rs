use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rstest::rstest;
use sentry_pipeline::protocol::Event;
use sentry_pipeline::transports::{
    HttpClient, HttpClientError, HttpTransport, Request, Response, ResultStatus,
};
use sentry_pipeline::{ClientOptions, Transport};

struct Fixed {
    status: u16,
    headers: Vec<(String, String)>,
    calls: AtomicUsize,
}

impl HttpClient for Fixed {
    fn send_request(&self, _request: &Request) -> Result<Response, HttpClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Response::new(self.status, self.headers.clone(), String::new()))
    }
}

fn transport(status: u16, headers: &[(&str, &str)]) -> (HttpTransport, Arc<Fixed>) {
    let client = Arc::new(Fixed {
        status,
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        calls: AtomicUsize::new(0),
    });
    let options = ClientOptions {
        dsn: Some("https://public@sentry.example.com/1".parse().unwrap()),
        ..Default::default()
    };
    (HttpTransport::new(&options, client.clone()), client)
}

#[rstest]
#[case(200, &[], ResultStatus::Success)]
#[case(401, &[], ResultStatus::Invalid)]
#[case(429, &[("Retry-After", "60")], ResultStatus::RateLimit)]
#[case(429, &[("Retry-After", "18446744073709551615")], ResultStatus::RateLimit)]
#[case(429, &[("X-Sentry-Rate-Limits", "18446744073709551615:error:org")], ResultStatus::RateLimit)]
#[case(500, &[], ResultStatus::Failed)]
fn test_status_mapping(
    #[case] status: u16,
    #[case] headers: &[(&str, &str)],
    #[case] expected: ResultStatus,
) {
    let (transport, _) = transport(status, headers);
    let event = Event::new();
    let id = event.event_id;

    let result = transport.send(event);
    assert_eq!(result.status(), expected);
    if expected == ResultStatus::Success {
        assert_eq!(result.event().map(|event| event.event_id), Some(id));
    } else {
        assert!(result.event().is_none());
    }
}

#[test]
fn test_retry_after_limits_everything() {
    let (transport, client) = transport(429, &[("Retry-After", "60")]);
    transport.send(Event::new());
    assert_eq!(
        transport.send(Event::transaction()).status(),
        ResultStatus::RateLimit
    );
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_category_limits_leave_other_types_alone() {
    let (transport, client) = transport(200, &[("X-Sentry-Rate-Limits", "60:transaction:org")]);
    assert!(transport.send(Event::new()).is_success());
    assert_eq!(
        transport.send(Event::transaction()).status(),
        ResultStatus::RateLimit
    );
    assert!(transport.send(Event::new()).is_success());
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
}
