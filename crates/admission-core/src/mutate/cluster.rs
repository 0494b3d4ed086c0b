//! Cluster-targeted mutators: VPA default, created-by annotation, and
//! audit-policy configmap resource-version backfill (spec §4.9).

use crate::model::{Cluster, Operation, UserInfo, CREATED_BY_ANNOTATION};

/// On Create, if `kubernetes.verticalPodAutoscaler` is unset and the
/// Cluster is worker-full, default it on. Workerless Clusters are left
/// untouched. Never applied on Update.
pub fn apply_vpa_default(cluster: &mut Cluster, operation: Operation) {
    if operation != Operation::Create || cluster.spec.is_workerless() {
        return;
    }
    if cluster.spec.vertical_pod_autoscaler_enabled.is_none() {
        cluster.spec.vertical_pod_autoscaler_enabled = Some(true);
    }
}

/// On Create, stamp the `<created-by>` annotation from the request's
/// user-info.
pub fn apply_created_by_annotation(cluster: &mut Cluster, operation: Operation, user: &UserInfo) {
    if operation != Operation::Create {
        return;
    }
    cluster.annotations.insert(CREATED_BY_ANNOTATION.to_string(), user.name.clone());
}

/// Copies the resolved audit-policy configmap's resource-version onto the
/// Cluster spec post-resolution, so later reads can detect whether the
/// configmap has since changed.
pub fn backfill_audit_configmap_resource_version(cluster: &mut Cluster, resolved_resource_version: Option<String>) {
    if let Some(reference) = cluster.spec.audit_policy_config_map_ref.as_mut() {
        reference.resource_version = resolved_resource_version;
    }
}
