use std::env::consts;

use crate::protocol::{Context, Event, Value};
use crate::{ClientOptions, Integration};

include!(concat!(env!("OUT_DIR"), "/constants.gen.rs"));

/// Adds `os` and `runtime` contexts to events.
///
/// Contexts that are already present on the event are left alone.
///
/// # Examples
///
/// ```rust
/// let integration = sentry_pipeline::integrations::EnvironmentIntegration::new().add_os(false);
/// let options = sentry_pipeline::ClientOptions::new().add_integration(integration);
/// assert_eq!(options.integrations.len(), 1);
/// ```
#[derive(Debug)]
pub struct EnvironmentIntegration {
    add_os: bool,
    add_runtime: bool,
}

impl Default for EnvironmentIntegration {
    fn default() -> Self {
        Self {
            add_os: true,
            add_runtime: true,
        }
    }
}

impl EnvironmentIntegration {
    /// Create a new environment integration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `os` context, enabled by default.
    #[must_use]
    pub fn add_os(mut self, add_os: bool) -> Self {
        self.add_os = add_os;
        self
    }

    /// Add `runtime` context, enabled by default.
    #[must_use]
    pub fn add_runtime(mut self, add_runtime: bool) -> Self {
        self.add_runtime = add_runtime;
        self
    }
}

fn os_context() -> Context {
    let mut context = Context::new();
    context.insert("type".into(), "os".into());
    context.insert("name".into(), consts::OS.into());
    context.insert("family".into(), consts::FAMILY.into());
    context.insert("arch".into(), ARCH.into());
    context.insert("platform".into(), PLATFORM.into());
    context
}

fn runtime_context() -> Context {
    let mut context = Context::new();
    context.insert("type".into(), "runtime".into());
    context.insert("name".into(), "rustc".into());
    if let Some(version) = RUSTC_VERSION {
        context.insert("version".into(), Value::from(version));
    }
    context
}

impl Integration for EnvironmentIntegration {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn process_event(&self, mut event: Event, _options: &ClientOptions) -> Option<Event> {
        let mut contexts_added = Vec::new();

        if self.add_os && !event.contexts.contains_key("os") {
            event.contexts.insert("os".into(), os_context());
            contexts_added.push("os");
        }
        if self.add_runtime && !event.contexts.contains_key("runtime") {
            event.contexts.insert("runtime".into(), runtime_context());
            contexts_added.push("runtime");
        }

        if !contexts_added.is_empty() {
            sentry_debug!(
                "[EnvironmentIntegration] Added contexts to {}: {}",
                event.event_id,
                contexts_added.join(", ")
            );
        }
        Some(event)
    }
}
