//! The transport layer.
//!
//! A [`Transport`] receives finished events and delivers them.  The
//! [`HttpTransport`] turns them into envelopes and posts them through an
//! [`HttpClient`], consulting a [`RateLimiter`] before and after each request.
//! The `reqwest` feature provides the default [`HttpClient`] implementation.

use std::sync::Arc;
use std::time::Duration;

use crate::protocol::Event;
use crate::ClientOptions;

mod http;
mod http_client;
mod ratelimit;

#[cfg(feature = "reqwest")]
mod reqwest;

pub use self::http::HttpTransport;
pub use self::http_client::{HttpClient, HttpClientError, Request, Response};
pub use self::ratelimit::{RateLimiter, RateLimitingCategory};
#[cfg(feature = "reqwest")]
pub use self::reqwest::ReqwestHttpClient;

/// The outcome class of a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultStatus {
    /// The event was accepted.
    Success,
    /// The request failed on the network or the server side.
    Failed,
    /// The server rejected the payload.
    Invalid,
    /// The event was dropped because of rate limits.
    RateLimit,
    /// Nothing was attempted, e.g. because no DSN is configured.
    Skipped,
    /// The server answered with an unexpected status.
    Unknown,
}

impl ResultStatus {
    /// Classifies an HTTP response status code.
    pub fn from_http_status(status: u16) -> ResultStatus {
        match status {
            200..=299 => ResultStatus::Success,
            429 => ResultStatus::RateLimit,
            400..=499 => ResultStatus::Invalid,
            500..=599 => ResultStatus::Failed,
            _ => ResultStatus::Unknown,
        }
    }
}

/// What a [`Transport`] did with an event.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResult {
    status: ResultStatus,
    event: Option<Event>,
}

impl TransportResult {
    /// A result without an attached event.
    pub fn new(status: ResultStatus) -> Self {
        TransportResult {
            status,
            event: None,
        }
    }

    /// A result that hands the delivered event back to the caller.
    pub fn with_event(status: ResultStatus, event: Event) -> Self {
        TransportResult {
            status,
            event: Some(event),
        }
    }

    /// The outcome class.
    pub fn status(&self) -> ResultStatus {
        self.status
    }

    /// The event, if the transport handed it back.
    pub fn event(&self) -> Option<&Event> {
        self.event.as_ref()
    }

    /// Consumes the result, returning the attached event.
    pub fn into_event(self) -> Option<Event> {
        self.event
    }

    /// Shortcut for a [`ResultStatus::Success`] status.
    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}

/// The trait for transports.
///
/// A transport is responsible for sending events to Sentry.  Delivery
/// failures are reported through the returned [`TransportResult`] and never
/// raised to the caller.
pub trait Transport: Send + Sync + 'static {
    /// Delivers an event.
    fn send(&self, event: Event) -> TransportResult;

    /// Waits for pending work without shutting the transport down.
    ///
    /// Returns `false` if the queue could not be drained in time.  Transports
    /// that send synchronously have nothing to drain.
    fn flush(&self, timeout: Duration) -> bool {
        let _ = timeout;
        true
    }

    /// Drains pending work, waiting at most `timeout`.
    fn close(&self, timeout: Option<Duration>) -> TransportResult {
        let _ = timeout;
        TransportResult::new(ResultStatus::Success)
    }
}

/// A factory creating transport instances.
///
/// Because options are potentially reused between different clients the
/// options do not actually contain a transport but a factory object that
/// can create transports instead.
///
/// The factory has a single method that creates a new arced transport.
/// Because transports can be wrapped in `Arc`s and those are clonable
/// any `Arc<Transport>` is also a valid transport factory.  This for
/// instance lets you put a `Arc<TestTransport>` directly into the options.
///
/// This is automatically implemented for all closures optionally taking
/// options and returning a boxed factory.
pub trait TransportFactory: Send + Sync {
    /// Given some options creates a transport.
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn(&ClientOptions) -> Arc<dyn Transport> + Clone + Send + Sync + 'static,
{
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport> {
        (*self)(options)
    }
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, event: Event) -> TransportResult {
        (**self).send(event)
    }

    fn flush(&self, timeout: Duration) -> bool {
        (**self).flush(timeout)
    }

    fn close(&self, timeout: Option<Duration>) -> TransportResult {
        (**self).close(timeout)
    }
}

impl<T: Transport> TransportFactory for Arc<T> {
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport> {
        let _ = options;
        self.clone()
    }
}

/// A transport that drops everything.
///
/// Used when no DSN is configured or the HTTP client could not be built.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn send(&self, event: Event) -> TransportResult {
        sentry_debug!("[NullTransport] Dropping event {}", event.event_id);
        TransportResult::new(ResultStatus::Skipped)
    }
}

/// Creates the default HTTP transport.
///
/// This is the default value for `transport` on the client options.  It
/// creates an [`HttpTransport`] backed by [`ReqwestHttpClient`].  Without the
/// `reqwest` feature, or if the client cannot be built, events are dropped
/// through a [`NullTransport`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTransportFactory;

impl TransportFactory for DefaultTransportFactory {
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport> {
        #[cfg(feature = "reqwest")]
        {
            match ReqwestHttpClient::new(options) {
                Ok(client) => Arc::new(HttpTransport::new(options, Arc::new(client))),
                Err(err) => {
                    log::error!(target: "sentry", "Failed to create HTTP client: {}", err);
                    Arc::new(NullTransport)
                }
            }
        }
        #[cfg(not(feature = "reqwest"))]
        {
            let _ = options;
            log::warn!(target: "sentry", "compiled without an HTTP client, events will be dropped");
            Arc::new(NullTransport)
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(200, ResultStatus::Success)]
    #[case(204, ResultStatus::Success)]
    #[case(401, ResultStatus::Invalid)]
    #[case(413, ResultStatus::Invalid)]
    #[case(429, ResultStatus::RateLimit)]
    #[case(500, ResultStatus::Failed)]
    #[case(503, ResultStatus::Failed)]
    #[case(302, ResultStatus::Unknown)]
    fn test_status_from_http(#[case] code: u16, #[case] expected: ResultStatus) {
        assert_eq!(ResultStatus::from_http_status(code), expected);
    }

    #[test]
    fn test_null_transport_skips() {
        let result = NullTransport.send(Event::new());
        assert_eq!(result.status(), ResultStatus::Skipped);
        assert!(result.event().is_none());
        assert!(NullTransport.close(None).is_success());
    }
}
