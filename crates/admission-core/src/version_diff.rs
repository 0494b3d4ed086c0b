//! For Blueprint updates, computes removed Kubernetes/machine-image
//! versions and proves non-use across live Clusters and child Blueprints;
//! also blocks adding a kind/version already owned by a child (spec §4.8).

use jiff::Timestamp;

use crate::error::{FieldPath, Forbid};
use crate::model::{Blueprint, Cluster, VersionEntry};

fn is_expired(entry: &VersionEntry, now: Timestamp) -> bool {
    entry.expiration_date.is_some_and(|expiry| expiry < now)
}

fn removed<'a>(old: &'a [VersionEntry], new: &[VersionEntry]) -> Vec<&'a VersionEntry> {
    old.iter().filter(|entry| !new.iter().any(|n| n.version == entry.version)).collect()
}

fn clusters_on<'a>(clusters: &'a [Cluster], blueprint_name: &str) -> impl Iterator<Item = &'a Cluster> {
    clusters
        .iter()
        .filter(move |cluster| cluster.spec.blueprint_ref == blueprint_name && !cluster.is_deleting())
}

/// The full context needed to diff one Blueprint update: the blueprint
/// itself, its direct children, and every live Cluster in the lineage.
pub struct VersionDiffContext<'a> {
    pub blueprint_name: &'a str,
    pub old: &'a Blueprint,
    pub new: &'a Blueprint,
    pub children: &'a [Blueprint],
    pub clusters: &'a [Cluster],
    pub now: Timestamp,
}

/// Computes all forbid-worthy violations of a top-level Blueprint update.
pub fn diff_blueprint_update(ctx: &VersionDiffContext<'_>) -> Forbid {
    let mut forbid = Forbid::new();

    check_kubernetes_version_removals(ctx, &mut forbid);
    check_machine_image_version_removals(ctx, &mut forbid);
    check_full_machine_image_removals(ctx, &mut forbid);
    check_machine_image_additions_owned_by_child(ctx, &mut forbid);
    check_limits_tightening(&ctx.new.limits, ctx.clusters, ctx.blueprint_name, &mut forbid);

    forbid
}

fn check_kubernetes_version_removals(ctx: &VersionDiffContext<'_>, forbid: &mut Forbid) {
    let field = FieldPath::new("spec.kubernetesVersions");

    for entry in removed(&ctx.old.kubernetes_versions, &ctx.new.kubernetes_versions) {
        for cluster in clusters_on(ctx.clusters, ctx.blueprint_name) {
            if cluster_uses_kubernetes_version(cluster, &entry.version) {
                forbid.push(
                    field.clone(),
                    format!(
                        "kubernetes version \"{}\" removed from blueprint \"{}\" but still used by cluster {}",
                        entry.version, ctx.blueprint_name, cluster.object_ref()
                    ),
                );
            }
        }

        for child in ctx.children.iter().filter(|c| c.parent.as_deref() == Some(ctx.blueprint_name)) {
            let child_still_carries = child.kubernetes_versions.iter().any(|v| v.version == entry.version);
            let graceful_extension = child_still_carries && is_expired(entry, ctx.now);
            if graceful_extension {
                continue;
            }

            for cluster in clusters_on(ctx.clusters, &child.name) {
                if cluster_uses_kubernetes_version(cluster, &entry.version) {
                    forbid.push(
                        field.clone(),
                        format!(
                            "kubernetes version \"{}\" removed from blueprint \"{}\" but still used by cluster {} via child blueprint \"{}\"",
                            entry.version, ctx.blueprint_name, cluster.object_ref(), child.name
                        ),
                    );
                }
            }
        }
    }
}

fn cluster_uses_kubernetes_version(cluster: &Cluster, version: &semver::Version) -> bool {
    cluster
        .spec
        .kubernetes
        .as_ref()
        .is_some_and(|kubernetes| &kubernetes.version == version)
}

fn check_machine_image_version_removals(ctx: &VersionDiffContext<'_>, forbid: &mut Forbid) {
    let field = FieldPath::new("spec.machineImages");

    for old_image in &ctx.old.machine_images {
        let Some(new_image) = ctx.new.machine_image(&old_image.name) else {
            continue; // handled by check_full_machine_image_removals
        };

        for entry in removed(&old_image.versions, &new_image.versions) {
            for cluster in clusters_on(ctx.clusters, ctx.blueprint_name) {
                for pool in cluster_pools_using_image(cluster, &old_image.name, &entry.version) {
                    forbid.push(
                        field.clone(),
                        format!(
                            "machine image \"{}\" version \"{}\" removed from blueprint \"{}\" but still used by cluster {} worker pool \"{}\"",
                            old_image.name, entry.version, ctx.blueprint_name, cluster.object_ref(), pool
                        ),
                    );
                }
            }

            for child in ctx.children.iter().filter(|c| c.parent.as_deref() == Some(ctx.blueprint_name)) {
                let child_still_carries = child
                    .machine_image(&old_image.name)
                    .is_some_and(|child_image| child_image.versions.iter().any(|v| v.version == entry.version));
                let graceful_extension = child_still_carries && is_expired(entry, ctx.now);
                if graceful_extension {
                    continue;
                }

                for cluster in clusters_on(ctx.clusters, &child.name) {
                    for pool in cluster_pools_using_image(cluster, &old_image.name, &entry.version) {
                        forbid.push(
                            field.clone(),
                            format!(
                                "machine image \"{}\" version \"{}\" removed from blueprint \"{}\" but still used by cluster {} worker pool \"{}\" via child blueprint \"{}\"",
                                old_image.name, entry.version, ctx.blueprint_name, cluster.object_ref(), pool, child.name
                            ),
                        );
                    }
                }
            }
        }
    }
}

fn cluster_pools_using_image<'a>(
    cluster: &'a Cluster,
    image_name: &str,
    version: &semver::Version,
) -> impl Iterator<Item = &'a str> {
    cluster.spec.worker_pools.iter().filter_map(move |pool| {
        pool.image
            .as_ref()
            .filter(|image| image.name == image_name && &image.version == version)
            .map(|_| pool.name.as_str())
    })
}

fn check_full_machine_image_removals(ctx: &VersionDiffContext<'_>, forbid: &mut Forbid) {
    let field = FieldPath::new("spec.machineImages");

    for old_image in &ctx.old.machine_images {
        if ctx.new.machine_image(&old_image.name).is_some() {
            continue;
        }

        let lineage_blueprints: Vec<&str> = std::iter::once(ctx.blueprint_name)
            .chain(
                ctx.children
                    .iter()
                    .filter(|c| c.parent.as_deref() == Some(ctx.blueprint_name))
                    .map(|c| c.name.as_str()),
            )
            .collect();

        for cluster in ctx
            .clusters
            .iter()
            .filter(|c| lineage_blueprints.contains(&c.spec.blueprint_ref.as_str()) && !c.is_deleting())
        {
            for pool in &cluster.spec.worker_pools {
                if pool.image.as_ref().is_some_and(|image| image.name == old_image.name) {
                    forbid.push(
                        field.clone(),
                        format!(
                            "machine image \"{}\" fully removed from blueprint \"{}\" but still used by cluster {} worker pool \"{}\"",
                            old_image.name, ctx.blueprint_name, cluster.object_ref(), pool.name
                        ),
                    );
                }
            }
        }
    }
}

fn check_machine_image_additions_owned_by_child(ctx: &VersionDiffContext<'_>, forbid: &mut Forbid) {
    let field = FieldPath::new("spec.machineImages");

    for new_image in &ctx.new.machine_images {
        if ctx.old.machine_image(&new_image.name).is_some() {
            continue; // not a new addition
        }
        if let Some(child) = ctx
            .children
            .iter()
            .find(|c| c.parent.as_deref() == Some(ctx.blueprint_name) && c.machine_image(&new_image.name).is_some())
        {
            forbid.push(
                field.clone(),
                format!(
                    "machine image \"{}\" is already declared by child blueprint \"{}\"",
                    new_image.name, child.name
                ),
            );
        }
    }
}

fn check_limits_tightening(
    new_limits: &crate::model::BlueprintLimits,
    clusters: &[Cluster],
    blueprint_name: &str,
    forbid: &mut Forbid,
) {
    let Some(new_max) = new_limits.max_nodes_total else {
        return;
    };

    let field = FieldPath::new("spec.limits.maxNodesTotal");

    for cluster in clusters_on(clusters, blueprint_name) {
        for pool in &cluster.spec.worker_pools {
            if pool.max > new_max {
                forbid.push(
                    field.clone(),
                    format!(
                        "cluster {} worker pool \"{}\" max ({}) exceeds tightened limit ({}) on blueprint \"{}\"",
                        cluster.object_ref(), pool.name, pool.max, new_max, blueprint_name
                    ),
                );
            }
        }

        let sum_of_min: u32 = cluster.spec.worker_pools.iter().map(|pool| pool.min).sum();
        if sum_of_min > new_max {
            forbid.push(
                field.clone(),
                format!(
                    "cluster {} sum of worker pool minimums ({}) exceeds tightened limit ({}) on blueprint \"{}\"",
                    cluster.object_ref(), sum_of_min, new_max, blueprint_name
                ),
            );
        }
    }
}

/// Diffs an update to a child Blueprint directly (as opposed to a parent
/// update cascading into it). Applies the same non-use proof, scoped to
/// Clusters that reference this child directly; graceful-extension
/// semantics let a child keep a version whose parent copy has already
/// expired, but removing that child-declared version while a Cluster still
/// depends on it remains forbidden.
pub fn diff_child_blueprint_update(
    parent: &Blueprint,
    child_name: &str,
    old_child: &Blueprint,
    new_child: &Blueprint,
    clusters: &[Cluster],
    now: Timestamp,
) -> Forbid {
    let mut forbid = Forbid::new();
    let field = FieldPath::new("spec.kubernetesVersions");

    for entry in removed(&old_child.kubernetes_versions, &new_child.kubernetes_versions) {
        let parent_copy_expired = parent
            .kubernetes_versions
            .iter()
            .find(|v| v.version == entry.version)
            .is_some_and(|parent_entry| is_expired(parent_entry, now));

        for cluster in clusters_on(clusters, child_name) {
            if cluster_uses_kubernetes_version(cluster, &entry.version) {
                let note = if parent_copy_expired {
                    " (graceful extension of an expired parent version)"
                } else {
                    ""
                };
                forbid.push(
                    field.clone(),
                    format!(
                        "kubernetes version \"{}\" removed from child blueprint \"{}\" but still used by cluster {}{}",
                        entry.version, child_name, cluster.object_ref(), note
                    ),
                );
            }
        }
    }

    check_limits_tightening(&new_child.limits, clusters, child_name, &mut forbid);

    forbid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlueprintLimits, ClusterSpec, KubernetesSpec, ProviderType, WorkerPool, WorkerPoolImage};
    use std::collections::BTreeMap;

    fn version(v: &str) -> semver::Version {
        semver::Version::parse(v).unwrap()
    }

    fn entry(v: &str, expiration: Option<Timestamp>) -> VersionEntry {
        VersionEntry {
            version: version(v),
            expiration_date: expiration,
            classification: None,
        }
    }

    fn cluster(name: &str, blueprint_ref: &str, k8s_version: &str, deleting: bool) -> Cluster {
        Cluster {
            name: name.into(),
            namespace: "garden-foo".into(),
            project: None,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            spec: ClusterSpec {
                blueprint_ref: blueprint_ref.into(),
                kubernetes: Some(KubernetesSpec { version: version(k8s_version) }),
                provider_type: ProviderType::Named("aws".into()),
                ..Default::default()
            },
            deletion_timestamp: deleting.then(|| "2020-01-01T00:00:00Z".parse().unwrap()),
        }
    }

    fn blueprint(name: &str, parent: Option<&str>) -> Blueprint {
        Blueprint {
            name: name.into(),
            kubernetes_versions: vec![],
            machine_images: vec![],
            limits: BlueprintLimits::default(),
            parent: parent.map(Into::into),
        }
    }

    #[test]
    fn s5_removal_used_by_live_cluster_is_forbidden() {
        let now: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        let mut old = blueprint("default", None);
        old.kubernetes_versions = vec![entry("1.24.1", None)];
        let new = blueprint("default", None);

        let clusters = vec![cluster("shoot-a", "default", "1.24.1", false)];
        let ctx = VersionDiffContext {
            blueprint_name: "default",
            old: &old,
            new: &new,
            children: &[],
            clusters: &clusters,
            now,
        };

        let forbid = diff_blueprint_update(&ctx);
        let message = forbid.to_string();
        assert!(message.contains("1.24.1"));
        assert!(message.contains("garden-foo/shoot-a"));
    }

    #[test]
    fn s6_removal_with_deleting_cluster_is_admitted() {
        let now: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        let mut old = blueprint("default", None);
        old.kubernetes_versions = vec![entry("1.24.1", None)];
        let new = blueprint("default", None);

        let clusters = vec![cluster("shoot-a", "default", "1.24.1", true)];
        let ctx = VersionDiffContext {
            blueprint_name: "default",
            old: &old,
            new: &new,
            children: &[],
            clusters: &clusters,
            now,
        };

        assert!(diff_blueprint_update(&ctx).is_empty());
    }

    #[test]
    fn graceful_extension_permits_parent_removal_when_child_still_carries_expired_version() {
        let now: Timestamp = "2024-06-01T00:00:00Z".parse().unwrap();
        let expired: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        let mut old = blueprint("default", None);
        old.kubernetes_versions = vec![entry("1.24.1", Some(expired))];
        let new = blueprint("default", None);

        let mut child = blueprint("default-child", Some("default"));
        child.kubernetes_versions = vec![entry("1.24.1", Some(expired))];

        let clusters = vec![cluster("shoot-a", "default-child", "1.24.1", false)];
        let ctx = VersionDiffContext {
            blueprint_name: "default",
            old: &old,
            new: &new,
            children: std::slice::from_ref(&child),
            clusters: &clusters,
            now,
        };

        assert!(diff_blueprint_update(&ctx).is_empty());
    }

    #[test]
    fn limits_tightening_reports_offending_cluster_and_pool() {
        let now: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        let mut old = blueprint("default", None);
        old.limits = BlueprintLimits { max_nodes_total: Some(100) };
        let mut new = blueprint("default", None);
        new.limits = BlueprintLimits { max_nodes_total: Some(5) };

        let mut c = cluster("shoot-a", "default", "1.24.1", false);
        c.spec.worker_pools.push(WorkerPool {
            name: "pool-a".into(),
            min: 1,
            max: 10,
            machine_type: "m5.large".into(),
            image: Some(WorkerPoolImage { name: "coreos".into(), version: version("1.0.0") }),
            container_runtimes: vec![],
            zones: Default::default(),
        });
        let clusters = vec![c];

        let ctx = VersionDiffContext {
            blueprint_name: "default",
            old: &old,
            new: &new,
            children: &[],
            clusters: &clusters,
            now,
        };

        let forbid = diff_blueprint_update(&ctx);
        let message = forbid.to_string();
        assert!(message.contains("pool-a"));
        assert!(message.contains("garden-foo/shoot-a"));
    }

    #[test]
    fn machine_image_addition_owned_by_child_is_forbidden() {
        let now: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        let old = blueprint("default", None);
        let mut new = blueprint("default", None);
        new.machine_images.push(crate::model::MachineImageVersions {
            name: "coreos".into(),
            versions: vec![entry("1.0.0", None)],
        });

        let mut child = blueprint("default-child", Some("default"));
        child.machine_images.push(crate::model::MachineImageVersions {
            name: "coreos".into(),
            versions: vec![entry("1.0.0", None)],
        });

        let clusters = vec![];
        let ctx = VersionDiffContext {
            blueprint_name: "default",
            old: &old,
            new: &new,
            children: std::slice::from_ref(&child),
            clusters: &clusters,
            now,
        };

        let forbid = diff_blueprint_update(&ctx);
        assert!(forbid.to_string().contains("already declared by child blueprint"));
    }
}
