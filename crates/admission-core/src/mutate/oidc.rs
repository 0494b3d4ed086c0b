//! OIDC-preset attachment: on Cluster Create without an explicit OIDC
//! config, pick the highest-weight preset whose selectors match the
//! Cluster (and, if the preset declares one, the Cluster's Project) and
//! copy its config onto the Cluster spec (spec §4.9, testable property P9).

use crate::model::{Cluster, Operation, OidcPreset, OidcPresetSelector, Project};

fn selector_matches(selector: &OidcPresetSelector, labels: &std::collections::BTreeMap<String, String>) -> bool {
    selector
        .match_labels
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value))
}

/// Deterministic tie-break key: highest weight wins; ties broken by
/// lexicographically-greatest name (P9).
fn selection_key(preset: &OidcPreset) -> (i32, &str) {
    (preset.weight, preset.name.as_str())
}

fn matches(preset: &OidcPreset, cluster: &Cluster, project: Option<&Project>) -> bool {
    if !selector_matches(&preset.cluster_selector, &cluster.labels) {
        return false;
    }
    match &preset.project_selector {
        Some(selector) => project.is_some_and(|project| selector_matches(selector, &project.labels)),
        None => true,
    }
}

/// Picks the OIDC preset (if any) that applies to `cluster`, per the
/// selection rule above. Exposed standalone so callers can test selection
/// without going through the full mutator.
pub fn select_preset<'a>(cluster: &Cluster, project: Option<&Project>, presets: &'a [OidcPreset]) -> Option<&'a OidcPreset> {
    presets
        .iter()
        .filter(|preset| matches(preset, cluster, project))
        .max_by_key(|preset| selection_key(preset))
}

pub fn apply_oidc_preset(cluster: &mut Cluster, operation: Operation, project: Option<&Project>, presets: &[OidcPreset]) {
    if operation != Operation::Create || cluster.spec.oidc.is_some() {
        return;
    }

    if let Some(preset) = select_preset(cluster, project, presets) {
        cluster.spec.oidc = Some(preset.oidc_config.clone());
    }
}
