//! Composite admission configuration (spec §6 "Configuration").
//!
//! The core itself holds no per-plugin runtime configuration; this struct is
//! the literal shape named in the spec so a transport can decode it from
//! wherever it likes (file, env, CLI flags) without this crate prescribing
//! any of those mechanisms.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Plugins enabled by name. A plugin not named here is never
    /// constructed by the registry.
    #[serde(default)]
    pub enabled_plugins: BTreeSet<String>,

    /// Whether dry-run requests are accepted at all. The core itself never
    /// writes as a side effect of a dry-run request regardless of this
    /// flag (§4.5 "Dry-run requests must not cause cache writes"); this
    /// only controls whether the transport forwards them.
    #[serde(default)]
    pub dry_run_allowed: bool,
}

impl AdmissionConfig {
    pub fn is_enabled(&self, plugin_name: &str) -> bool {
        self.enabled_plugins.contains(plugin_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_not_listed_is_disabled() {
        let config = AdmissionConfig::default();
        assert!(!config.is_enabled("ClusterValidator"));
    }

    #[test]
    fn plugin_listed_is_enabled() {
        let mut config = AdmissionConfig::default();
        config.enabled_plugins.insert("ClusterValidator".into());
        assert!(config.is_enabled("ClusterValidator"));
    }

    #[test]
    fn deserializes_from_the_documented_shape() {
        let plain = serde_json::json!({
            "enabled_plugins": ["ClusterValidator", "ExtensionValidator"],
            "dry_run_allowed": true
        });
        let config: AdmissionConfig = serde_json::from_value(plain).unwrap();
        assert!(config.is_enabled("ClusterValidator"));
        assert!(config.dry_run_allowed);
    }
}
