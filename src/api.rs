use uuid::Uuid;

use crate::protocol::{CheckIn, Event, Level};
use crate::{Hub, IntoBreadcrumbs, Scope};

/// Captures an event on the currently active client if any.
///
/// The event must already be assembled.  Typically code would instead use
/// the utility methods like [`capture_error`](crate::capture_error).  The
/// return value is the event ID, or `None` if Sentry is disabled or the event
/// was dropped along the way.
///
/// # Example
///
/// ```
/// use sentry_pipeline::protocol::{Event, Level};
///
/// sentry_pipeline::capture_event(Event {
///     message: Some("Hello World!".into()),
///     level: Some(Level::Info),
///     ..Default::default()
/// });
/// ```
pub fn capture_event(event: Event) -> Option<Uuid> {
    Hub::with_active(|hub| hub.capture_event(event))
}

/// Captures an arbitrary message.
///
/// This creates an event from the given message and sends it to the current hub.
pub fn capture_message(msg: &str, level: Level) -> Option<Uuid> {
    Hub::with_active(|hub| hub.capture_message(msg, level))
}

/// Sends a monitor check-in through the current hub.
pub fn capture_check_in(check_in: CheckIn) -> Option<Uuid> {
    Hub::with_active(|hub| hub.capture_check_in(check_in))
}

/// Records a breadcrumb by calling a function.
///
/// The total number of breadcrumbs that can be recorded are limited by the
/// configuration on the client.  This function accepts any object that
/// implements `IntoBreadcrumbs` which is implemented for a varienty of
/// common types.  For efficiency reasons you can also pass a closure returning
/// a breadcrumb in which case the closure is only called if the client is
/// enabled.
///
/// The most common implementations that can be passed:
///
/// * `Breadcrumb`: to record a breadcrumb
/// * `Vec<Breadcrumb>`: to record more than one breadcrumb in one go.
/// * `Option<Breadcrumb>`: to record a breadcrumb or not
/// * additionally all of these can also be returned from an `FnOnce()`
///
/// # Example
///
/// ```
/// use sentry_pipeline::protocol::{Breadcrumb, Map};
///
/// sentry_pipeline::add_breadcrumb(|| Breadcrumb {
///     ty: "http".into(),
///     category: Some("request".into()),
///     data: {
///         let mut map = Map::new();
///         map.insert("method".into(), "GET".into());
///         map.insert("url".into(), "https://example.com/".into());
///         map
///     },
///     ..Default::default()
/// });
/// ```
pub fn add_breadcrumb<B: IntoBreadcrumbs>(breadcrumb: B) -> bool {
    Hub::with_active(|hub| hub.add_breadcrumb(breadcrumb))
}

/// Invokes a function that can modify the current scope.
///
/// The function is passed a mutable reference to the `Scope` so that modifications
/// can be performed.  Because there might currently not be a scope or client active
/// it's possible that the callback might not be called at all.  As a result of this
/// the return value of this closure must have a default that is returned in such
/// cases.
///
/// # Example
///
/// ```
/// sentry_pipeline::configure_scope(|scope| {
///     scope.set_user(Some(sentry_pipeline::protocol::User {
///         username: Some("john_doe".into()),
///         ..Default::default()
///     }));
/// });
/// ```
///
/// # Panics
///
/// While the scope is being configured accessing scope related functionality is
/// not permitted.  It's unsafe to call into `Hub::bind_client` or similar
/// functions from within the callback as a result of this.
pub fn configure_scope<F, R>(f: F) -> R
where
    R: Default,
    F: FnOnce(&mut Scope) -> R,
{
    Hub::with_active(|hub| hub.configure_scope(f))
}

/// Temporarily pushes a scope for a single call optionally reconfiguring it.
///
/// This function takes two arguments: the first is a callback that is passed
/// a scope and can reconfigure it.  The second is callback that then executes
/// in the context of that scope.
///
/// This is useful when extra data should be send with a single capture call
/// for instance a different level or tags:
///
/// ```
/// use sentry_pipeline::protocol::Level;
/// use sentry_pipeline::{capture_message, with_scope};
///
/// with_scope(
///     |scope| scope.set_level(Some(Level::Warning)),
///     || capture_message("some error", Level::Info),
/// );
/// ```
pub fn with_scope<C, F, R>(scope_config: C, callback: F) -> R
where
    C: FnOnce(&mut Scope),
    F: FnOnce() -> R,
{
    Hub::with(|hub| {
        if hub.is_active_and_usage_safe() {
            hub.with_scope(scope_config, callback)
        } else {
            callback()
        }
    })
}

/// Invokes a function that can modify the global scope.
///
/// Data on the global scope is applied to every event of the process, below
/// the isolation and the current scope.
///
/// ```
/// sentry_pipeline::configure_global_scope(|scope| scope.set_tag("service", "billing"));
/// ```
pub fn configure_global_scope<F, R>(f: F) -> R
where
    R: Default,
    F: FnOnce(&mut Scope) -> R,
{
    Hub::with_active(|hub| hub.configure_global_scope(f))
}

/// Invokes a function that can modify the isolation scope.
///
/// The isolation scope carries the data of the current unit of work, such as
/// a request, and is layered between the global and the current scope.
pub fn configure_isolation_scope<F, R>(f: F) -> R
where
    R: Default,
    F: FnOnce(&mut Scope) -> R,
{
    Hub::with_active(|hub| hub.configure_isolation_scope(f))
}

/// Runs `callback` with a forked isolation scope.
///
/// Like [`with_scope`], but `scope_config` modifies the isolation scope.  The
/// previous isolation scope is restored afterwards.
///
/// ```
/// use sentry_pipeline::protocol::Level;
///
/// sentry_pipeline::with_isolation_scope(
///     |scope| scope.set_tag("request_id", "42"),
///     || sentry_pipeline::capture_message("handling request", Level::Info),
/// );
/// ```
pub fn with_isolation_scope<C, F, R>(scope_config: C, callback: F) -> R
where
    C: FnOnce(&mut Scope),
    F: FnOnce() -> R,
{
    Hub::with(|hub| {
        if hub.is_active_and_usage_safe() {
            hub.with_isolation_scope(scope_config, callback)
        } else {
            callback()
        }
    })
}

/// Returns the last event ID captured.
///
/// This uses the current thread local hub.
pub fn last_event_id() -> Option<Uuid> {
    Hub::with(|hub| hub.last_event_id())
}
