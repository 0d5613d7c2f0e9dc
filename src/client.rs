use std::any::TypeId;
use std::fmt;
use std::panic::RefUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use rand::random;
use uuid::Uuid;

use crate::constants::SDK_INFO;
use crate::error::event_from_error;
use crate::eventprocessor::EventHint;
use crate::protocol::{ClientSdkInfo, Event, EventType, Level, Log, LogAttribute};
use crate::transports::Transport;
use crate::utils::random_uuid;
use crate::{ClientOptions, Dsn, Integration, OptionsError, Scope};

impl<T: Into<ClientOptions>> From<T> for Client {
    fn from(o: T) -> Client {
        Client::with_options(o.into())
    }
}

/// The Sentry Client.
///
/// The Client is responsible for event processing and sending events to the
/// sentry server via the configured [`Transport`]. It can be created from a
/// [`ClientOptions`].
///
/// See the [Unified API] document for more details.
///
/// # Examples
///
/// ```
/// sentry_pipeline::Client::from(sentry_pipeline::ClientOptions::default());
/// ```
///
/// [Unified API]: https://develop.sentry.dev/sdk/unified-api/
pub struct Client {
    options: ClientOptions,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    integrations: Vec<(TypeId, Arc<dyn Integration>)>,
    pub(crate) sdk_info: ClientSdkInfo,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("dsn", &self.dsn())
            .field("options", &self.options)
            .finish()
    }
}

impl Client {
    /// Creates a new sentry client for the given options.
    ///
    /// If the DSN on the options is set to `None` the client will be entirely
    /// disabled.  Options that fail [`ClientOptions::validate`] are logged and
    /// disable the client as well; use [`try_with_options`](Self::try_with_options)
    /// to get the error instead.
    pub fn with_options(mut options: ClientOptions) -> Client {
        if let Err(err) = options.validate() {
            log::error!(target: "sentry", "invalid client options, client disabled: {}", err);
            options.dsn = None;
        }
        Client::build(options)
    }

    /// Creates a new sentry client, rejecting invalid options.
    pub fn try_with_options(options: ClientOptions) -> Result<Client, OptionsError> {
        options.validate()?;
        Ok(Client::build(options))
    }

    fn build(mut options: ClientOptions) -> Client {
        sentry_debug!(
            "[Client] Creating new client with options: debug={}, dsn={:?}",
            options.debug,
            options.dsn.as_ref().map(|dsn| dsn.to_string())
        );

        let transport = match (&options.dsn, &options.transport) {
            (Some(_), Some(factory)) => Some(factory.create_transport(&options)),
            (Some(_), None) => {
                sentry_debug!("[Client] No transport factory configured (client will be disabled)");
                None
            }
            (None, _) => {
                sentry_debug!("[Client] No DSN configured (client will be disabled)");
                None
            }
        };

        let mut sdk_info = SDK_INFO.clone();

        // NOTE: We do not filter out duplicate integrations based on their
        // TypeId.
        let integrations: Vec<_> = options
            .integrations
            .iter()
            .map(|integration| (integration.as_ref().type_id(), integration.clone()))
            .collect();

        for (_, integration) in integrations.iter() {
            sentry_debug!("[Client] Setting up integration: {}", integration.name());
            integration.setup(&mut options);
            sdk_info.integrations.push(integration.name().to_string());
        }

        Client {
            options,
            transport: RwLock::new(transport),
            integrations,
            sdk_info,
        }
    }

    /// Looks up an attached integration by its type.
    pub fn get_integration<I>(&self) -> Option<&I>
    where
        I: Integration,
    {
        let id = TypeId::of::<I>();
        let integration = &self.integrations.iter().find(|(iid, _)| *iid == id)?.1;
        integration.as_ref().as_any().downcast_ref()
    }

    /// Looks up an attached integration by its [`name`](Integration::name).
    pub fn integration(&self, name: &str) -> Option<&dyn Integration> {
        self.integrations
            .iter()
            .map(|(_, integration)| integration.as_ref())
            .find(|integration| integration.name() == name)
    }

    /// Prepares an event for transmission to sentry.
    ///
    /// Error events and transactions run through the scope, the integrations
    /// and the `before_send` hooks, and error events are sampled.  Check-ins,
    /// logs and metrics only get the event id, SDK info and option defaults.
    pub fn prepare_event(
        &self,
        mut event: Event,
        hint: Option<&EventHint>,
        scope: Option<&Scope>,
    ) -> Option<Event> {
        // event_id and sdk_info are set before the processors run so that the
        // processors can poke around in that data.
        if event.event_id.is_nil() {
            event.event_id = random_uuid();
        }
        if event.sdk.is_none() {
            event.sdk = Some(self.sdk_info.clone());
        }

        if !matches!(event.ty, EventType::Event | EventType::Transaction) {
            self.apply_option_defaults(&mut event);
            return Some(event);
        }

        let empty_hint = EventHint::new();
        let hint = hint.unwrap_or(&empty_hint);
        apply_hint(&mut event, hint);

        if let Some(scope) = scope {
            event = scope.apply_to_event(event, hint)?;
        }

        for (_, integration) in self.integrations.iter() {
            let id = event.event_id;
            event = match integration.process_event(event, &self.options) {
                Some(event) => event,
                None => {
                    sentry_debug!("[Client] Integration '{}' dropped event {}", integration.name(), id);
                    return None;
                }
            }
        }

        self.apply_option_defaults(&mut event);

        let before_send = match event.ty {
            EventType::Transaction => &self.options.before_send_transaction,
            _ => &self.options.before_send,
        };
        if let Some(func) = before_send {
            let id = event.event_id;
            event = match func(event) {
                Some(event) => event,
                None => {
                    sentry_debug!("[Client] before_send callback dropped event {}", id);
                    return None;
                }
            }
        }

        // transactions are sampled when they are started
        if event.ty == EventType::Event && !self.sample_should_send(self.options.sample_rate) {
            sentry_debug!(
                "[Client] Event {} dropped due to sampling (rate: {})",
                event.event_id,
                self.options.sample_rate
            );
            return None;
        }
        Some(event)
    }

    fn apply_option_defaults(&self, event: &mut Event) {
        if event.release.is_none() {
            event.release = self.options.release.as_deref().map(str::to_owned);
        }
        if event.environment.is_none() {
            event.environment = self.options.environment.as_deref().map(str::to_owned);
        }
        if event.server_name.is_none() {
            event.server_name = self.options.server_name.as_deref().map(str::to_owned);
        }
    }

    /// Returns the options of this client.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Returns the DSN that constructed this client.
    pub fn dsn(&self) -> Option<&Dsn> {
        self.options.dsn.as_ref()
    }

    fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Quick check to see if the client is enabled.
    ///
    /// The Client is enabled if it has a valid DSN and Transport configured,
    /// and has not been closed yet.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// let client = sentry_pipeline::Client::from(sentry_pipeline::ClientOptions::default());
    /// assert!(!client.is_enabled());
    ///
    /// let dsn = "https://public@example.com/1";
    /// let transport = sentry_pipeline::transports::NullTransport;
    /// let client = sentry_pipeline::Client::from((
    ///     dsn,
    ///     sentry_pipeline::ClientOptions::new().with_transport(Arc::new(transport)),
    /// ));
    /// assert!(client.is_enabled());
    /// ```
    pub fn is_enabled(&self) -> bool {
        self.options.dsn.is_some() && self.transport().is_some()
    }

    /// Captures an event and sends it to sentry.
    ///
    /// Returns the event id if the transport accepted the event.
    pub fn capture_event(
        &self,
        event: Event,
        hint: Option<&EventHint>,
        scope: Option<&Scope>,
    ) -> Option<Uuid> {
        let Some(transport) = self.transport() else {
            sentry_debug!("[Client] No transport available, dropping event {}", event.event_id);
            return None;
        };
        let event = self.prepare_event(event, hint, scope)?;
        let event_id = event.event_id;

        let result = transport.send(event);
        sentry_debug!("[Client] Event {} sent: {:?}", event_id, result.status());
        result.into_event().map(|event| event.event_id)
    }

    /// Captures an arbitrary message.
    pub fn capture_message(&self, msg: &str, level: Level, scope: Option<&Scope>) -> Option<Uuid> {
        let event = Event {
            message: Some(msg.to_owned()),
            level: Some(level),
            ..Default::default()
        };
        self.capture_event(event, None, scope)
    }

    /// Captures a `std::error::Error` together with its chain of sources.
    pub fn capture_error<E: std::error::Error + ?Sized>(
        &self,
        error: &E,
        scope: Option<&Scope>,
    ) -> Option<Uuid> {
        self.capture_event(event_from_error(error), None, scope)
    }

    /// Drains all pending events without shutting down.
    pub fn flush(&self, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or(self.options.shutdown_timeout);
        match self.transport() {
            Some(transport) => transport.flush(timeout),
            None => true,
        }
    }

    /// Drains all pending events and shuts down the transport behind the
    /// client.  After shutting down the transport is removed.
    ///
    /// This returns `true` if the queue was successfully drained in the
    /// given time or `false` if not (for instance because of a timeout).
    /// If no timeout is provided the client will wait for as long a
    /// `shutdown_timeout` in the client options.
    pub fn close(&self, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or(self.options.shutdown_timeout);
        let transport = self
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match transport {
            Some(transport) => {
                sentry_debug!("[Client] Closing transport (timeout: {}ms)", timeout.as_millis());
                transport.close(Some(timeout)).is_success()
            }
            None => true,
        }
    }

    /// Returns a random boolean with a probability defined
    /// by rate
    pub fn sample_should_send(&self, rate: f32) -> bool {
        if rate >= 1.0 {
            true
        } else if rate <= 0.0 {
            false
        } else {
            random::<f32>() < rate
        }
    }

    /// Prepares a log to be sent, setting the `trace_id` and other default
    /// attributes, and processing it through `before_send_log`.
    ///
    /// Returns `None` when logs are disabled or the hook dropped the log.
    pub(crate) fn prepare_log(&self, mut log: Log, scope: &Scope) -> Option<Log> {
        if !self.options.enable_logs {
            sentry_debug!("[Client] Logs are disabled, ignoring log");
            return None;
        }
        scope.apply_to_log(&mut log, self.options.send_default_pii);
        self.set_log_default_attributes(&mut log);

        if let Some(ref func) = self.options.before_send_log {
            log = func(log)?;
        }
        Some(log)
    }

    fn set_log_default_attributes(&self, log: &mut Log) {
        let defaults = [
            ("sentry.environment", self.options.environment.as_deref()),
            ("sentry.release", self.options.release.as_deref()),
            ("sentry.sdk.name", Some(self.sdk_info.name.as_str())),
            ("sentry.sdk.version", Some(self.sdk_info.version.as_str())),
            ("server.address", self.options.server_name.as_deref()),
        ];
        for (key, value) in defaults {
            if let Some(value) = value {
                log.attributes
                    .entry(key.to_owned())
                    .or_insert_with(|| LogAttribute::from(value));
            }
        }
    }
}

fn apply_hint(event: &mut Event, hint: &EventHint) {
    for (key, value) in hint.extra.iter() {
        if !event.extra.contains_key(key) {
            event.extra.insert(key.clone(), value.clone());
        }
    }
    if event.exception.is_empty() && event.stacktrace.is_none() {
        event.stacktrace.clone_from(&hint.stacktrace);
    }
    if let Some(mechanism) = &hint.mechanism {
        if let Some(exception) = event.exception.last_mut() {
            exception.mechanism.get_or_insert_with(|| mechanism.clone());
        }
    }
}

// Make this unwind safe. It's not out of the box because of the
// `BeforeCallback`s inside `ClientOptions`, and the contained Integrations
impl RefUnwindSafe for Client {}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::protocol::{Exception, Frame, Mechanism, Stacktrace};
    use crate::transports::{ResultStatus, TransportResult};

    #[derive(Default)]
    struct Collect(Mutex<Vec<Event>>);

    impl Transport for Collect {
        fn send(&self, event: Event) -> TransportResult {
            self.0.lock().unwrap().push(event.clone());
            TransportResult::with_event(ResultStatus::Success, event)
        }
    }

    fn client_with(options: ClientOptions) -> (Client, Arc<Collect>) {
        let transport = Arc::new(Collect::default());
        let options = ClientOptions {
            dsn: "https://public@sentry.invalid/1".parse().ok(),
            transport: Some(Arc::new(transport.clone())),
            ..options
        };
        (Client::with_options(options), transport)
    }

    #[test]
    fn test_disabled_without_dsn() {
        let client = Client::with_options(ClientOptions::default());
        assert!(!client.is_enabled());
        assert_eq!(client.capture_message("hi", Level::Info, None), None);
        assert!(client.flush(None));
        assert!(client.close(None));
    }

    #[test]
    fn test_try_with_options_fails_fast() {
        let options = ClientOptions {
            sample_rate: 2.0,
            ..Default::default()
        };
        assert!(Client::try_with_options(options.clone()).is_err());
        assert!(!Client::with_options(options).is_enabled());
    }

    #[test]
    fn test_capture_applies_defaults_and_scope() {
        let (client, transport) = client_with(ClientOptions {
            release: Some("app@1.0".into()),
            ..Default::default()
        });
        let mut scope = Scope::default();
        scope.set_tag("worker", "a");

        let id = client.capture_message("hello", Level::Warning, Some(&scope));
        let events = transport.0.lock().unwrap();
        assert_eq!(id, Some(events[0].event_id));
        assert_eq!(events[0].release.as_deref(), Some("app@1.0"));
        assert_eq!(events[0].tags["worker"], "a");
        assert_eq!(events[0].sdk.as_ref().unwrap().name, "sentry.rust");
    }

    #[test]
    fn test_before_send_routes_by_type() {
        let mut options = ClientOptions::default();
        options.set_before_send(|_| None);
        options.set_before_send_transaction(|mut event| {
            event.transaction = Some("renamed".into());
            Some(event)
        });
        let (client, transport) = client_with(options);

        assert_eq!(client.capture_event(Event::new(), None, None), None);
        assert!(client.capture_event(Event::transaction(), None, None).is_some());

        let events = transport.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].transaction.as_deref(), Some("renamed"));
    }

    #[test]
    fn test_zero_sample_rate_drops_errors_only() {
        let (client, transport) = client_with(ClientOptions {
            sample_rate: 0.0,
            ..Default::default()
        });
        assert_eq!(client.capture_message("dropped", Level::Error, None), None);
        assert!(client.capture_event(Event::transaction(), None, None).is_some());
        assert_eq!(transport.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_hint_is_folded_into_event() {
        let (client, transport) = client_with(ClientOptions::default());

        let mut hint = EventHint::from_stacktrace(Stacktrace {
            frames: vec![Frame {
                function: Some("main".into()),
                ..Default::default()
            }],
        });
        hint.extra.insert("job".into(), "sync".into());
        client.capture_event(Event::new(), Some(&hint), None);

        hint.mechanism = Some(Mechanism {
            ty: "panic".into(),
            handled: Some(false),
            ..Default::default()
        });
        let event = Event {
            exception: vec![Exception {
                ty: "Boom".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        client.capture_event(event, Some(&hint), None);

        let events = transport.0.lock().unwrap();
        assert_eq!(events[0].extra["job"], "sync");
        assert!(events[0].stacktrace.is_some());
        assert!(events[1].stacktrace.is_none());
        let mechanism = events[1].exception[0].mechanism.as_ref().unwrap();
        assert_eq!(mechanism.ty, "panic");
    }

    #[test]
    fn test_check_ins_skip_the_scope() {
        let (client, transport) = client_with(ClientOptions {
            environment: Some("prod".into()),
            ..Default::default()
        });
        let mut scope = Scope::default();
        scope.add_event_processor(|_, _| None);

        let check_in = crate::protocol::CheckIn::new("nightly", crate::protocol::CheckInStatus::Ok);
        assert!(client.capture_event(Event::check_in(check_in), None, Some(&scope)).is_some());
        assert_eq!(
            transport.0.lock().unwrap()[0].environment.as_deref(),
            Some("prod")
        );
    }

    #[test]
    fn test_close_disables() {
        let (client, _transport) = client_with(ClientOptions::default());
        assert!(client.is_enabled());
        assert!(client.close(Some(Duration::from_millis(10))));
        assert!(!client.is_enabled());
    }

    #[test]
    fn test_log_defaults() {
        let (client, _) = client_with(ClientOptions {
            release: Some("app@2".into()),
            ..Default::default()
        });
        let log = client
            .prepare_log(Log::new(crate::protocol::LogLevel::Info, "hi"), &Scope::default())
            .unwrap();
        assert_eq!(log.attributes["sentry.release"], LogAttribute::from("app@2"));
        assert!(log.trace_id.is_some());

        let (client, _) = client_with(ClientOptions {
            enable_logs: false,
            ..Default::default()
        });
        assert!(client
            .prepare_log(Log::new(crate::protocol::LogLevel::Info, "hi"), &Scope::default())
            .is_none());
    }
}
