//! Wiring crate: turns `admission-core`'s validators/mutators, wrapped as
//! `admission-runtime` plugins, into a running admission webhook HTTP
//! server plus the `ValidatingWebhookConfiguration`/
//! `MutatingWebhookConfiguration` objects the API server needs to call it.
//!
//! This crate intentionally knows nothing about Cluster/Seed/Project
//! semantics itself — it only assembles plugins that `admission-runtime`
//! and `admission-core` already define, mirroring the teacher's split
//! between a domain crate and a thin webhook-wiring crate.

use std::sync::Arc;

use admission_core::cache::ReadinessGate;
use admission_runtime::{Dispatcher, PluginDependencies, PluginRegistry, RegistryError};

pub mod server;
pub mod webhooks;

/// Builds the default plugin registry: one entry per resource kind this
/// repository implements a plugin adapter for.
pub fn default_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register("project", || Box::new(admission_runtime::adapters::ProjectPlugin::new()));
    registry.register("extension-registration", || Box::new(admission_runtime::adapters::ExtensionRegistrationPlugin::new()));
    registry.register("cluster", || Box::new(admission_runtime::adapters::ClusterPlugin::new()));
    registry.register("seed", || Box::new(admission_runtime::adapters::SeedPlugin::new()));
    registry.register("backup-target", || Box::new(admission_runtime::adapters::BackupTargetPlugin::new()));
    registry.register("backup-entry", || Box::new(admission_runtime::adapters::BackupEntryPlugin::new()));
    registry.register("credentials-binding", || Box::new(admission_runtime::adapters::CredentialsBindingPlugin::new()));
    registry.register("blueprint", || Box::new(admission_runtime::adapters::BlueprintPlugin::new()));
    registry.register("seed-companion", || Box::new(admission_runtime::adapters::CompanionPlugin::new("Seed", "Gardenlet")));
    registry.register("gardenlet-companion", || Box::new(admission_runtime::adapters::CompanionPlugin::new("Gardenlet", "Seed")));
    registry
}

/// Runs the full plugin initialization sequence and returns a [`Dispatcher`]
/// ready to serve requests.
pub fn build_dispatcher(registry: PluginRegistry, deps: &PluginDependencies) -> Result<Dispatcher, RegistryError> {
    let readiness = ReadinessGate::new();
    let plugins = registry.initialize(deps, &readiness)?;
    Ok(Dispatcher::new(plugins, readiness))
}

/// Serves the admission webhook HTTP endpoint built from a ready
/// [`Dispatcher`].
pub struct AdmissionController {
    dispatcher: Arc<Dispatcher>,
}

impl AdmissionController {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher: Arc::new(dispatcher) }
    }

    pub async fn run(self, addr: std::net::SocketAddr) -> std::io::Result<()> {
        let router = server::router(self.dispatcher);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await
    }
}
