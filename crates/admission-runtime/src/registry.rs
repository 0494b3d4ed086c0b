//! Plugin Registry & Initializer (spec §4.3, component C3).
//!
//! Holds an ordered mapping of plugin-name → plugin-factory and runs the
//! strict four-step initialization sequence: factory call, capability
//! injection, `validate-initialization`, cache registration. A failure at
//! any step aborts startup — there is no partial-registry fallback.

use std::sync::Arc;

use admission_core::cache::ReadinessGate;

use crate::plugin::{Plugin, PluginDependencies};

/// One registered, not-yet-constructed plugin slot.
struct Registration {
    name: String,
    make: Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>,
}

#[derive(Debug, snafu::Snafu)]
pub enum RegistryError {
    #[snafu(display("plugin \"{name}\" was registered more than once"))]
    DuplicateName { name: String },

    #[snafu(display("plugin \"{name}\" failed validate-initialization: {message}"))]
    Initialization { name: String, message: String },
}

/// Maintains plugin-name → plugin-factory and turns that into a live,
/// initialized set of plugins in registration order (spec §4.3).
#[derive(Default)]
pub struct PluginRegistry {
    registrations: Vec<Registration>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin factory under `name`. `name` must be unique;
    /// duplicates are rejected at `initialize` time rather than here, so
    /// registration order (and thus dispatch order) stays purely a function
    /// of call order.
    pub fn register(&mut self, name: impl Into<String>, make: impl Fn() -> Box<dyn Plugin> + Send + Sync + 'static) {
        self.registrations.push(Registration { name: name.into(), make: Box::new(make) });
    }

    /// Runs the full initialization sequence and returns the live plugin set
    /// in registration order, or the first error encountered. `readiness`
    /// accumulates every plugin's `synced()` predicate so the dispatcher can
    /// gate on one combined `ready()` call.
    pub fn initialize(self, deps: &PluginDependencies, readiness: &ReadinessGate) -> Result<Vec<Arc<dyn Plugin>>, RegistryError> {
        let mut seen = std::collections::BTreeSet::new();
        let mut plugins = Vec::with_capacity(self.registrations.len());

        for registration in self.registrations {
            if !seen.insert(registration.name.clone()) {
                return Err(RegistryError::DuplicateName { name: registration.name });
            }

            // Step 1: factory call.
            let mut plugin = (registration.make)();

            // Step 2: capability injection. Each setter is a no-op unless
            // the plugin overrode it, so it is always safe to call whenever
            // the initializer has the matching dependency on hand.
            if let Some(factory) = &deps.cache_factory {
                plugin.set_cache_factory(factory.clone());
            }
            if let Some(factory) = &deps.settings_cache_factory {
                plugin.set_settings_cache_factory(factory.clone());
            }
            if let Some(authorizer) = &deps.authorizer {
                plugin.set_authorizer(authorizer.clone());
            }
            if let Some(client) = &deps.generic_object_client {
                plugin.set_generic_object_client(client.clone());
            }
            if let Some(client) = &deps.schema_client {
                plugin.set_schema_client(client.clone());
            }

            // Step 3: validate-initialization.
            if let Err(message) = plugin.validate_initialization() {
                return Err(RegistryError::Initialization { name: registration.name, message });
            }

            let plugin: Arc<dyn Plugin> = Arc::from(plugin);

            // Step 4: cache registration.
            let synced_plugin = plugin.clone();
            readiness.register_predicate(Arc::new(move || synced_plugin.synced()));

            tracing::debug!(plugin.name = registration.name.as_str(), "initialized admission plugin");
            plugins.push(plugin);
        }

        Ok(plugins)
    }
}
