//! The type-erased plugin interface (spec §6 "Plugin interface"): every
//! admission plugin handles some subset of {operation × kind}, optionally
//! mutates the new object in place, and optionally validates it.
//!
//! `admission-core`'s validators/mutators are typed over a concrete model
//! (`Request<Cluster>`, `Request<Seed>`, …) because that's the natural shape
//! for the resource-specific logic they implement. The registry and
//! dispatcher, by contrast, need to hold a heterogeneous set of plugins that
//! each cover one or more kinds — so a plugin here receives a type-erased
//! `RawRequest` and is responsible for decoding its `new_object`/`old_object`
//! into the concrete type it knows how to handle.

use std::sync::Arc;

use admission_core::error::Forbid;
use admission_core::model::{Operation, UserInfo};
use admission_core::ports::{Authorizer, GenericObjectClient, SchemaClient};

/// A request with its object payloads left as untyped JSON, the wire shape a
/// transport hands to the dispatcher before any plugin has decoded it.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub operation: Operation,
    /// The Kubernetes kind of the request's target object, e.g. `"Cluster"`.
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub subresource: Option<String>,
    pub user_info: UserInfo,
    pub new_object: Option<serde_json::Value>,
    pub old_object: Option<serde_json::Value>,
    pub dry_run: bool,
}

/// A handle to a live, typed index, opaque to everyone but the plugin that
/// asked for it by kind. Plugins downcast the returned value back to the
/// concrete `Arc<dyn CacheIndex<K>>` they expect.
pub trait CacheFactory: Send + Sync {
    fn get_index(&self, kind: &str) -> Option<Arc<dyn std::any::Any + Send + Sync>>;
}

/// Everything the initializer has on hand to inject into a freshly
/// constructed plugin (spec §4.3 step 2, "capability injection").
#[derive(Clone, Default)]
pub struct PluginDependencies {
    pub cache_factory: Option<Arc<dyn CacheFactory>>,
    pub settings_cache_factory: Option<Arc<dyn CacheFactory>>,
    pub authorizer: Option<Arc<dyn Authorizer>>,
    pub generic_object_client: Option<Arc<dyn GenericObjectClient>>,
    pub schema_client: Option<Arc<dyn SchemaClient>>,
}

/// Implemented by every admission plugin. Capability setters are optional
/// trait methods with no-op defaults — the Rust realization of spec §6's
/// "optional capability setters": a plugin "wants" a capability simply by
/// overriding the matching setter, and the registry invokes every setter on
/// every plugin during initialization regardless of whether it was
/// overridden (see `PluginRegistry::initialize`).
pub trait Plugin: Send + Sync {
    /// Stable, unique plugin name, used for registration-order bookkeeping
    /// and in `validate-initialization` error messages.
    fn name(&self) -> &str;

    /// Handler mask: does this plugin act on this operation at all.
    fn handles(&self, operation: Operation) -> bool;

    /// Target-kind interest: the request's kind must appear here for the
    /// dispatcher to invoke this plugin at all.
    fn interested_kinds(&self) -> &[&'static str];

    fn set_cache_factory(&mut self, _factory: Arc<dyn CacheFactory>) {}
    fn set_settings_cache_factory(&mut self, _factory: Arc<dyn CacheFactory>) {}
    fn set_authorizer(&mut self, _authorizer: Arc<dyn Authorizer>) {}
    fn set_generic_object_client(&mut self, _client: Arc<dyn GenericObjectClient>) {}
    fn set_schema_client(&mut self, _client: Arc<dyn SchemaClient>) {}

    /// Reports missing wiring as a fatal startup error (spec §4.3 step 3).
    /// The default accepts any wiring, since most plugins need nothing more
    /// than what `handles`/`interested_kinds` already describe.
    fn validate_initialization(&self) -> Result<(), String> {
        Ok(())
    }

    /// Whether this plugin's cache dependencies (if any) have completed
    /// their initial fill. Plugins with no cache dependency are always
    /// ready; the registry folds every plugin's `synced` into the
    /// dispatcher's readiness gate (spec §4.3 step 4).
    fn synced(&self) -> bool {
        true
    }

    /// Mutator pass. May modify `request.new_object` in place; the mutation
    /// is visible to every plugin invoked afterwards in the same dispatch.
    fn admit(&self, _request: &mut RawRequest) -> Forbid {
        Forbid::new()
    }

    /// Validator pass. Runs only after every interested plugin's `admit`
    /// has succeeded (spec §4.4, "mutators run before validators").
    fn validate(&self, _request: &RawRequest) -> Forbid {
        Forbid::new()
    }
}
