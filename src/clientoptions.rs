use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::USER_AGENT;
use crate::integrations::Integration;
use crate::protocol::{Breadcrumb, Event, Log};
use crate::transports::TransportFactory;
use crate::{Dsn, IntoDsn};

/// Type alias for before event/breadcrumb handlers.
pub type BeforeCallback<T> = Arc<dyn Fn(T) -> Option<T> + Send + Sync>;

/// The hard upper bound for `max_breadcrumbs`.
pub const MAX_BREADCRUMBS: usize = 100;

/// Rejected client configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptionsError {
    /// A sample rate is outside of `[0.0, 1.0]`.
    #[error("{name} must be between 0.0 and 1.0, got {value}")]
    InvalidSampleRate {
        /// The option that was rejected.
        name: &'static str,
        /// The configured value.
        value: f32,
    },
    /// More breadcrumbs were requested than a scope may hold.
    #[error("max_breadcrumbs must not exceed {MAX_BREADCRUMBS}, got {0}")]
    TooManyBreadcrumbs(usize),
}

/// Configuration settings for the client.
///
/// These options are explained in more detail in the general
/// [sentry documentation](https://docs.sentry.io/error-reporting/configuration/?platform=rust).
///
/// # Examples
///
/// ```
/// let _options = sentry_pipeline::ClientOptions {
///     debug: true,
///     ..Default::default()
/// };
/// ```
#[derive(Clone)]
pub struct ClientOptions {
    // Common options
    /// The DSN to use.  If not set the client is effectively disabled.
    pub dsn: Option<Dsn>,
    /// Enables debug mode.
    ///
    /// In debug mode the pipeline logs through the `log` facade even for
    /// events that are dropped silently otherwise.
    pub debug: bool,
    /// The release to be sent with events.
    pub release: Option<Cow<'static, str>>,
    /// The environment to be sent with events.
    pub environment: Option<Cow<'static, str>>,
    /// The server name to be reported.
    pub server_name: Option<Cow<'static, str>>,
    /// The sample rate for event submission. (0.0 - 1.0, defaults to 1.0)
    pub sample_rate: f32,
    /// The sample rate for tracing transactions. (0.0 - 1.0, defaults to 0.0)
    pub traces_sample_rate: f32,
    /// Maximum number of breadcrumbs. (defaults to 100)
    pub max_breadcrumbs: usize,
    /// If turned on, some information that can be considered PII is captured,
    /// such as the user attributes of logs.
    pub send_default_pii: bool,
    // Integration options
    /// A list of integrations to enable.
    pub integrations: Vec<Arc<dyn Integration>>,
    /// Whether to add default integrations.
    ///
    /// See [`apply_defaults`](crate::apply_defaults) for details how this
    /// works and interacts with configured integrations.
    pub default_integrations: bool,
    // Hooks
    /// Callback that is executed before error events are sent off.
    pub before_send: Option<BeforeCallback<Event>>,
    /// Callback that is executed before transactions are sent off.
    pub before_send_transaction: Option<BeforeCallback<Event>>,
    /// Callback that is executed for each Breadcrumb being added.
    pub before_breadcrumb: Option<BeforeCallback<Breadcrumb>>,
    /// Callback that is executed for each Log being added.
    pub before_send_log: Option<BeforeCallback<Log>>,
    /// Determines whether captured structured logs should be sent.
    pub enable_logs: bool,
    // Transport options
    /// The transport to use.
    ///
    /// This is typically either a boxed function taking the client options by
    /// reference and returning a `Transport`, or an `Arc<T: Transport>`.
    /// When unset, [`apply_defaults`](crate::apply_defaults) installs the
    /// [`DefaultTransportFactory`](crate::transports::DefaultTransportFactory).
    pub transport: Option<Arc<dyn TransportFactory>>,
    /// An optional HTTP proxy to use.
    ///
    /// This will default to the `http_proxy` environment variable.
    pub http_proxy: Option<Cow<'static, str>>,
    /// An optional HTTPS proxy to use.
    ///
    /// This will default to the `HTTPS_PROXY` environment variable
    /// or `http_proxy` if that one exists.
    pub https_proxy: Option<Cow<'static, str>>,
    /// The timeout of a single HTTP request. (defaults to 5 seconds)
    pub http_timeout: Duration,
    /// The timeout on client drop for draining events on shutdown.
    pub shutdown_timeout: Duration,
    // Other options not documented in Unified API
    /// The user agent that should be reported.
    pub user_agent: Cow<'static, str>,
}

impl ClientOptions {
    /// Creates new Options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a configured integration to the options.
    ///
    /// # Examples
    ///
    /// ```
    /// struct MyIntegration;
    ///
    /// impl sentry_pipeline::Integration for MyIntegration {}
    ///
    /// let options = sentry_pipeline::ClientOptions::new().add_integration(MyIntegration);
    /// assert_eq!(options.integrations.len(), 1);
    /// ```
    #[must_use]
    pub fn add_integration<I: Integration>(mut self, integration: I) -> Self {
        self.integrations.push(Arc::new(integration));
        self
    }

    /// Sets the transport factory.
    #[must_use]
    pub fn with_transport<F: TransportFactory + 'static>(mut self, transport: F) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Set a callback that is executed before error events are sent.
    pub fn set_before_send<F>(&mut self, before_send: F) -> &mut Self
    where
        F: Fn(Event) -> Option<Event> + Send + Sync + 'static,
    {
        self.before_send = Some(Arc::new(before_send));
        self
    }

    /// Set a callback that is executed before transactions are sent.
    pub fn set_before_send_transaction<F>(&mut self, before_send: F) -> &mut Self
    where
        F: Fn(Event) -> Option<Event> + Send + Sync + 'static,
    {
        self.before_send_transaction = Some(Arc::new(before_send));
        self
    }

    /// Set a callback that is executed for each Breadcrumb being added.
    pub fn set_before_breadcrumb<F>(&mut self, before_breadcrumb: F) -> &mut Self
    where
        F: Fn(Breadcrumb) -> Option<Breadcrumb> + Send + Sync + 'static,
    {
        self.before_breadcrumb = Some(Arc::new(before_breadcrumb));
        self
    }

    /// Set a callback that is executed for each Log being added.
    pub fn set_before_send_log<F>(&mut self, before_send_log: F) -> &mut Self
    where
        F: Fn(Log) -> Option<Log> + Send + Sync + 'static,
    {
        self.before_send_log = Some(Arc::new(before_send_log));
        self
    }

    /// Checks the options for values the pipeline cannot honor.
    pub fn validate(&self) -> Result<(), OptionsError> {
        for (name, value) in [
            ("sample_rate", self.sample_rate),
            ("traces_sample_rate", self.traces_sample_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(OptionsError::InvalidSampleRate { name, value });
            }
        }
        if self.max_breadcrumbs > MAX_BREADCRUMBS {
            return Err(OptionsError::TooManyBreadcrumbs(self.max_breadcrumbs));
        }
        Ok(())
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Debug)]
        struct BeforeSend;
        let before_send = self.before_send.as_ref().map(|_| BeforeSend);
        let before_send_transaction = self.before_send_transaction.as_ref().map(|_| BeforeSend);
        #[derive(Debug)]
        struct BeforeBreadcrumb;
        let before_breadcrumb = self.before_breadcrumb.as_ref().map(|_| BeforeBreadcrumb);
        #[derive(Debug)]
        struct BeforeSendLog;
        let before_send_log = self.before_send_log.as_ref().map(|_| BeforeSendLog);
        #[derive(Debug)]
        struct TransportFactory;
        let transport = self.transport.as_ref().map(|_| TransportFactory);

        let integrations: Vec<_> = self.integrations.iter().map(|i| i.name()).collect();

        f.debug_struct("ClientOptions")
            .field("dsn", &self.dsn)
            .field("debug", &self.debug)
            .field("release", &self.release)
            .field("environment", &self.environment)
            .field("server_name", &self.server_name)
            .field("sample_rate", &self.sample_rate)
            .field("traces_sample_rate", &self.traces_sample_rate)
            .field("max_breadcrumbs", &self.max_breadcrumbs)
            .field("send_default_pii", &self.send_default_pii)
            .field("integrations", &integrations)
            .field("default_integrations", &self.default_integrations)
            .field("before_send", &before_send)
            .field("before_send_transaction", &before_send_transaction)
            .field("before_breadcrumb", &before_breadcrumb)
            .field("before_send_log", &before_send_log)
            .field("enable_logs", &self.enable_logs)
            .field("transport", &transport)
            .field("http_proxy", &self.http_proxy)
            .field("https_proxy", &self.https_proxy)
            .field("http_timeout", &self.http_timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for ClientOptions {
    fn default() -> ClientOptions {
        ClientOptions {
            dsn: None,
            debug: false,
            release: None,
            environment: None,
            server_name: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
            max_breadcrumbs: MAX_BREADCRUMBS,
            send_default_pii: false,
            integrations: vec![],
            default_integrations: true,
            before_send: None,
            before_send_transaction: None,
            before_breadcrumb: None,
            before_send_log: None,
            enable_logs: true,
            transport: None,
            http_proxy: None,
            https_proxy: None,
            http_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(2),
            user_agent: Cow::Owned(USER_AGENT.clone()),
        }
    }
}

fn dsn_or_log<T: IntoDsn>(into_dsn: T) -> Option<Dsn> {
    into_dsn.into_dsn().unwrap_or_else(|err| {
        log::error!(target: "sentry", "invalid value for DSN, client disabled: {}", err);
        None
    })
}

impl<T: IntoDsn> From<(T, ClientOptions)> for ClientOptions {
    fn from((into_dsn, mut opts): (T, ClientOptions)) -> ClientOptions {
        opts.dsn = dsn_or_log(into_dsn);
        opts
    }
}

impl<T: IntoDsn> From<T> for ClientOptions {
    fn from(into_dsn: T) -> ClientOptions {
        ClientOptions {
            dsn: dsn_or_log(into_dsn),
            ..ClientOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_defaults() {
        let options = ClientOptions::default();
        assert!(options.dsn.is_none());
        assert_eq!(options.sample_rate, 1.0);
        assert_eq!(options.traces_sample_rate, 0.0);
        assert_eq!(options.max_breadcrumbs, 100);
        assert_eq!(options.http_timeout, Duration::from_secs(5));
        assert_eq!(options.shutdown_timeout, Duration::from_secs(2));
        assert!(options.enable_logs);
        assert!(options.user_agent.starts_with("sentry.rust/"));
        assert_eq!(options.validate(), Ok(()));
    }

    #[rstest]
    #[case::negative_sample_rate(-0.1, 0.0, 100, "sample_rate")]
    #[case::large_sample_rate(1.5, 0.0, 100, "sample_rate")]
    #[case::large_traces_rate(1.0, 2.0, 100, "traces_sample_rate")]
    #[case::too_many_breadcrumbs(1.0, 0.0, 101, "max_breadcrumbs")]
    fn test_validate_rejects(
        #[case] sample_rate: f32,
        #[case] traces_sample_rate: f32,
        #[case] max_breadcrumbs: usize,
        #[case] offending: &str,
    ) {
        let options = ClientOptions {
            sample_rate,
            traces_sample_rate,
            max_breadcrumbs,
            ..Default::default()
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().starts_with(offending), "{}", err);
    }

    #[test]
    fn test_from_dsn() {
        let options = ClientOptions::from("https://public@sentry.invalid/42");
        assert_eq!(options.dsn.unwrap().project_id().value(), Some(42));

        let options = ClientOptions::from((
            "https://public@sentry.invalid/1",
            ClientOptions {
                debug: true,
                ..Default::default()
            },
        ));
        assert!(options.debug);
        assert!(options.dsn.is_some());
    }

    #[test]
    fn test_invalid_dsn_disables() {
        let options = ClientOptions::from("not a dsn");
        assert!(options.dsn.is_none());
    }

    #[test]
    fn test_debug_hides_callbacks() {
        let mut options = ClientOptions::default();
        options.set_before_send(Some);
        let debug = format!("{:?}", options);
        assert!(debug.contains("before_send: Some(BeforeSend)"));
        assert!(debug.contains("before_breadcrumb: None"));
    }
}
