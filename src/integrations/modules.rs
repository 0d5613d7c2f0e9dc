use std::collections::BTreeMap;

use crate::constants::SDK_INFO;
use crate::protocol::Event;
use crate::{ClientOptions, Integration};

/// Adds the compiled package versions as the `modules` of every event.
///
/// Events that already carry modules are left alone.
#[derive(Debug, Clone)]
pub struct ModulesIntegration {
    modules: BTreeMap<String, String>,
}

impl Default for ModulesIntegration {
    fn default() -> Self {
        let modules = SDK_INFO
            .packages
            .iter()
            .map(|package| {
                let name = package.name.strip_prefix("cargo:").unwrap_or(&package.name);
                (name.to_owned(), package.version.clone())
            })
            .collect();
        Self { modules }
    }
}

impl ModulesIntegration {
    /// Creates a new Modules Integration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an additional module with its version.
    #[must_use]
    pub fn add_module(mut self, name: &str, version: &str) -> Self {
        self.modules.insert(name.to_owned(), version.to_owned());
        self
    }
}

impl Integration for ModulesIntegration {
    fn name(&self) -> &'static str {
        "modules"
    }

    fn process_event(&self, mut event: Event, _options: &ClientOptions) -> Option<Event> {
        if event.modules.is_empty() {
            event.modules.clone_from(&self.modules);
        }
        Some(event)
    }
}
