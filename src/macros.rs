/// Returns the intended release for Sentry as an `Option<Cow<'static, str>>`.
///
/// This can be used with `ClientOptions` to set the release name.  It uses
/// the information supplied by cargo to calculate a release.
///
/// # Examples
///
/// ```
/// # #[macro_use] extern crate sentry_pipeline;
/// # fn main() {
/// let _sentry = sentry_pipeline::init(sentry_pipeline::ClientOptions {
///     release: sentry_pipeline::release_name!(),
///     ..Default::default()
/// });
/// # }
/// ```
#[macro_export]
macro_rules! release_name {
    () => {{
        use std::sync::OnceLock;
        static RELEASE: OnceLock<Option<String>> = OnceLock::new();
        RELEASE
            .get_or_init(|| {
                option_env!("CARGO_PKG_NAME").and_then(|name| {
                    option_env!("CARGO_PKG_VERSION").map(|version| format!("{}@{}", name, version))
                })
            })
            .as_deref()
            .map(::std::borrow::Cow::Borrowed)
    }};
}

/// Internal debug output of the pipeline.
///
/// Everything is routed through the `log` facade under the `sentry` target so
/// the host application decides whether and where it ends up.
#[macro_export]
#[doc(hidden)]
macro_rules! sentry_debug {
    ($($arg:tt)*) => {
        ::log::debug!(target: "sentry", $($arg)*)
    };
}

/// Panics in debug builds and logs through `sentry_debug!` in non-debug builds.
#[macro_export]
#[doc(hidden)]
macro_rules! debug_panic_or_log {
    ($($arg:tt)*) => {{
        #[cfg(debug_assertions)]
        panic!($($arg)*);

        #[cfg(not(debug_assertions))]
        $crate::sentry_debug!($($arg)*);
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn release_name_uses_cargo_metadata() {
        let release = crate::release_name!();
        assert_eq!(
            release.as_deref(),
            Some(concat!("sentry-pipeline@", env!("CARGO_PKG_VERSION")))
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "scope stack underflow")]
    fn debug_panic_or_log_panics_in_debug_builds() {
        crate::debug_panic_or_log!("scope stack underflow");
    }
}
