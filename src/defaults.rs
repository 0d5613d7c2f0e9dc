use std::borrow::Cow;
use std::env;
use std::sync::Arc;

use crate::integrations::{EnvironmentIntegration, ModulesIntegration};
use crate::transports::DefaultTransportFactory;
use crate::{ClientOptions, Dsn};

/// Apply default client options.
///
/// Extends the given `ClientOptions` with default options such as a default
/// transport, a set of default integrations if not requested otherwise, and
/// also sets the `dsn`, `release`, `environment`, and proxy settings based on
/// environment variables.
///
/// When the `default_integrations` option is set to `true` (by default), the
/// following integrations will be added *after* any manually configured ones:
///
/// 1. [`EnvironmentIntegration`]
/// 2. [`ModulesIntegration`]
///
/// [`init`](crate::init) calls this before creating the client.
///
/// # Examples
/// ```
/// std::env::set_var("SENTRY_RELEASE", "release-from-env");
///
/// let options = sentry_pipeline::ClientOptions::default();
/// assert_eq!(options.release, None);
/// assert!(options.transport.is_none());
///
/// let options = sentry_pipeline::apply_defaults(options);
/// assert_eq!(options.release, Some("release-from-env".into()));
/// assert!(options.transport.is_some());
/// ```
pub fn apply_defaults(mut opts: ClientOptions) -> ClientOptions {
    if opts.transport.is_none() {
        opts.transport = Some(Arc::new(DefaultTransportFactory));
    }
    if opts.default_integrations {
        opts.integrations.push(Arc::new(EnvironmentIntegration::new()));
        opts.integrations.push(Arc::new(ModulesIntegration::new()));
    }
    if opts.dsn.is_none() {
        opts.dsn = env::var("SENTRY_DSN")
            .ok()
            .and_then(|dsn| dsn.parse::<Dsn>().ok());
    }
    if opts.release.is_none() {
        opts.release = env::var("SENTRY_RELEASE").ok().map(Cow::Owned);
    }
    if opts.environment.is_none() {
        opts.environment = env::var("SENTRY_ENVIRONMENT")
            .ok()
            .map(Cow::Owned)
            .or_else(|| {
                Some(Cow::Borrowed(if cfg!(debug_assertions) {
                    "debug"
                } else {
                    "release"
                }))
            });
    }
    if opts.http_proxy.is_none() {
        opts.http_proxy = env::var("HTTP_PROXY")
            .ok()
            .map(Cow::Owned)
            .or_else(|| env::var("http_proxy").ok().map(Cow::Owned));
    }
    if opts.https_proxy.is_none() {
        opts.https_proxy = env::var("HTTPS_PROXY")
            .ok()
            .map(Cow::Owned)
            .or_else(|| env::var("https_proxy").ok().map(Cow::Owned))
            .or_else(|| opts.http_proxy.clone());
    }
    opts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_explicit_values() {
        let options = apply_defaults(ClientOptions {
            environment: Some("staging".into()),
            default_integrations: false,
            ..Default::default()
        });
        assert_eq!(options.environment.as_deref(), Some("staging"));
        assert!(options.integrations.is_empty());
        assert!(options.transport.is_some());
    }

    #[test]
    fn test_default_integrations_come_last() {
        struct Custom;
        impl crate::Integration for Custom {
            fn name(&self) -> &'static str {
                "custom"
            }
        }

        let options = apply_defaults(ClientOptions::new().add_integration(Custom));
        let names: Vec<_> = options.integrations.iter().map(|i| i.name()).collect();
        assert_eq!(names, ["custom", "environment", "modules"]);
    }
}
