use std::error::Error;

use uuid::Uuid;

use crate::protocol::{Event, Exception, Level};
use crate::utils::parse_type_from_debug;
use crate::Hub;

impl Hub {
    /// Capture any `std::error::Error`.
    ///
    /// Returns `None` without building an event when no client is bound.
    pub fn capture_error<E: Error + ?Sized>(&self, error: &E) -> Option<Uuid> {
        self.client()?;
        self.capture_event(event_from_error(error))
    }
}

/// Captures a `std::error::Error`.
///
/// Creates an event from the given error and sends it to the current hub.
/// A chain of errors will be resolved as well, and sorted oldest to newest, as
/// described on <https://develop.sentry.dev/sdk/event-payloads/exception/>.
///
/// # Examples
/// ```
/// assert!(sentry_pipeline::capture_error(&std::io::Error::last_os_error()).is_none());
/// ```
pub fn capture_error<E: Error + ?Sized>(error: &E) -> Option<Uuid> {
    Hub::with_active(|hub| hub.capture_error(error))
}

/// Create a sentry `Event` from a `std::error::Error`.
///
/// A chain of errors will be resolved as well, and sorted oldest to newest, as
/// described on <https://develop.sentry.dev/sdk/event-payloads/exception/>.
///
/// # Examples
///
/// ```
/// use thiserror::Error;
///
/// #[derive(Debug, Error)]
/// #[error("inner")]
/// struct InnerError;
///
/// #[derive(Debug, Error)]
/// #[error("outer")]
/// struct OuterError(#[from] InnerError);
///
/// let event = sentry_pipeline::event_from_error(&OuterError(InnerError));
/// assert_eq!(event.level, Some(sentry_pipeline::protocol::Level::Error));
/// assert_eq!(event.exception.len(), 2);
/// assert_eq!(&event.exception[0].ty, "InnerError");
/// assert_eq!(event.exception[0].value, Some("inner".into()));
/// assert_eq!(&event.exception[1].ty, "OuterError");
/// assert_eq!(event.exception[1].value, Some("outer".into()));
/// ```
pub fn event_from_error<E: Error + ?Sized>(err: &E) -> Event {
    let mut exceptions = vec![exception_from_error(err)];

    let mut source = err.source();
    while let Some(err) = source {
        exceptions.push(exception_from_error(err));
        source = err.source();
    }

    exceptions.reverse();
    Event {
        exception: exceptions,
        level: Some(Level::Error),
        ..Default::default()
    }
}

/// Create a single [`Exception`] from an error, ignoring its sources.
pub fn exception_from_error<E: Error + ?Sized>(err: &E) -> Exception {
    Exception {
        ty: parse_type_from_debug(err),
        value: Some(err.to_string()),
        ..Default::default()
    }
}
