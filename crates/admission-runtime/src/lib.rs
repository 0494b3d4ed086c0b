//! Plugin registry, capability injection and request dispatch: the wiring
//! that turns `admission-core`'s standalone validators and mutators into one
//! admission pipeline (spec §4.3–§4.4, components C3/C4).
//!
//! This crate depends on `admission-core` and never the reverse — it knows
//! nothing about Cluster/Seed/Project semantics, only about plugin
//! lifecycle and dispatch order.

pub mod adapters;
pub mod dispatcher;
pub mod plugin;
pub mod registry;

pub use dispatcher::Dispatcher;
pub use plugin::{CacheFactory, Plugin, PluginDependencies, RawRequest};
pub use registry::{PluginRegistry, RegistryError};
