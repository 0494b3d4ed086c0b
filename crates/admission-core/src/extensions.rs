//! Ensures each (kind, type) combination demanded by a cluster, seed, or
//! backup target is covered by a primary extension registration, and, for
//! workerless clusters, by a workerless-capable registration (spec §4.6).

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{FieldPath, Forbid};
use crate::model::{BackupEntry, BackupTarget, Cluster, ClusterType, ExtensionRegistration, Seed};

/// One requirement derived from a subject's spec: this (kind, type) pair
/// must be covered by a primary extension registration compatible with the
/// caller's cluster type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredExtension {
    pub kind: String,
    pub type_: String,
    pub field: FieldPath,
    pub workerless_required: bool,
}

impl RequiredExtension {
    fn new(kind: impl Into<String>, type_: impl Into<String>, field: FieldPath) -> Self {
        Self {
            kind: kind.into(),
            type_: type_.into(),
            field,
            workerless_required: false,
        }
    }

    fn workerless(mut self) -> Self {
        self.workerless_required = true;
        self
    }
}

/// The `spec.provider.type` field path shared by every required-extension
/// entry whose `type` is literally the subject's provider type (as opposed
/// to e.g. a machine-image name or a DNS provider type).
fn provider_type_field(root: &FieldPath) -> FieldPath {
    root.child("provider").child("type")
}

/// Mapping kind → list of {type, cluster-compatibility-set} computed over
/// all registrations where `primary != false`, plus the workerless-capable
/// set for kind=Extension.
pub struct PrimaryExtensionIndex {
    by_kind: BTreeMap<String, Vec<(String, BTreeSet<ClusterType>)>>,
    workerless_capable: BTreeSet<String>,
}

impl PrimaryExtensionIndex {
    pub fn build(registrations: &[ExtensionRegistration]) -> Self {
        let mut by_kind: BTreeMap<String, Vec<(String, BTreeSet<ClusterType>)>> = BTreeMap::new();
        let mut workerless_capable = BTreeSet::new();

        for registration in registrations {
            for resource in &registration.resources {
                if !resource.primary {
                    continue;
                }
                by_kind
                    .entry(resource.kind.clone())
                    .or_default()
                    .push((resource.type_.clone(), resource.cluster_compatibility.clone()));

                if resource.kind == "Extension" && resource.workerless_supported == Some(true) {
                    workerless_capable.insert(resource.type_.clone());
                }
            }
        }

        Self {
            by_kind,
            workerless_capable,
        }
    }

    fn covers(&self, kind: &str, type_: &str, cluster_type: ClusterType) -> bool {
        self.by_kind.get(kind).is_some_and(|entries| {
            entries
                .iter()
                .any(|(t, compat)| t == type_ && (compat.is_empty() || compat.contains(&cluster_type)))
        })
    }

    pub fn is_workerless_capable(&self, extension_type: &str) -> bool {
        self.workerless_capable.contains(extension_type)
    }
}

/// Required-entry construction for a worker-full or workerless Cluster,
/// per the rules in §4.6.
pub fn required_extensions_for_cluster(cluster: &Cluster) -> Vec<RequiredExtension> {
    let root = FieldPath::new("spec");
    let spec = &cluster.spec;
    let mut required = Vec::new();

    if let Some(provider) = spec.provider_type.as_str() {
        if spec.is_workerless() {
            // worker-dependent entries are omitted for workerless clusters
        } else {
            let field = provider_type_field(&root);
            required.push(RequiredExtension::new("ControlPlane", provider, field.clone()));
            required.push(RequiredExtension::new("Infrastructure", provider, field.clone()));
            required.push(RequiredExtension::new("Worker", provider, field));
        }
    }

    if !spec.is_workerless() {
        for (i, pool) in spec.worker_pools.iter().enumerate() {
            let pool_path = root.child("workerPools").index(i);
            if let Some(image) = &pool.image {
                required.push(RequiredExtension::new(
                    "OperatingSystemConfig",
                    &image.name,
                    pool_path.child("image").child("name"),
                ));
            }
            for (j, runtime) in pool.container_runtimes.iter().enumerate() {
                required.push(RequiredExtension::new(
                    "ContainerRuntime",
                    &runtime.type_,
                    pool_path.child("containerRuntimes").index(j),
                ));
            }
        }
    }

    for (i, dns) in spec.dns_providers.iter().enumerate() {
        if dns.primary {
            required.push(RequiredExtension::new(
                "DNSRecord",
                &dns.type_,
                root.child("dnsProviders").index(i),
            ));
        }
    }

    for (i, extension) in spec.extensions.iter().enumerate() {
        let field = root.child("extensions").index(i);
        let entry = RequiredExtension::new("Extension", &extension.type_, field);
        required.push(if spec.is_workerless() { entry.workerless() } else { entry });
    }

    required
}

pub fn required_extensions_for_seed(seed: &Seed) -> Vec<RequiredExtension> {
    let root = FieldPath::new("spec");
    let mut required = vec![RequiredExtension::new(
        "ControlPlane",
        &seed.provider_type,
        provider_type_field(&root),
    )];

    if let Some(backup) = &seed.backup {
        let backup_field = provider_type_field(&root.child("backup"));
        required.push(RequiredExtension::new("BackupBucket", &backup.provider_type, backup_field.clone()));
        required.push(RequiredExtension::new("BackupEntry", &backup.provider_type, backup_field));
    }

    if let Some(dns) = &seed.ingress_dns {
        required.push(RequiredExtension::new(
            "DNSRecord",
            &dns.type_,
            root.child("ingressDns").child("type"),
        ));
    }

    for (i, extension) in seed.extensions.iter().enumerate() {
        required.push(RequiredExtension::new(
            "Extension",
            &extension.type_,
            root.child("extensions").index(i),
        ));
    }

    required
}

pub fn required_extensions_for_backup_target(target: &BackupTarget) -> Vec<RequiredExtension> {
    let root = FieldPath::new("spec");
    let field = provider_type_field(&root);
    vec![
        RequiredExtension::new("BackupBucket", &target.provider_type, field.clone()),
        RequiredExtension::new("BackupEntry", &target.provider_type, field),
    ]
}

pub fn required_extensions_for_backup_entry(
    entry: &BackupEntry,
    bucket_provider_type: &str,
) -> Vec<RequiredExtension> {
    let root = FieldPath::new("spec");
    let _ = entry;
    vec![
        RequiredExtension::new("BackupBucket", bucket_provider_type, root.child("bucketRef")),
        RequiredExtension::new("BackupEntry", bucket_provider_type, root.child("bucketRef")),
    ]
}

/// Checks every required entry against the index, accumulating all
/// violations rather than stopping at the first.
pub fn validate_required_extensions(
    required: &[RequiredExtension],
    index: &PrimaryExtensionIndex,
    cluster_type: ClusterType,
) -> Forbid {
    let mut forbid = Forbid::new();

    for entry in required {
        if !index.covers(&entry.kind, &entry.type_, cluster_type) {
            forbid.push(
                entry.field.clone(),
                format!("non-registered provider type \"{}\" (kind {})", entry.type_, entry.kind),
            );
            continue;
        }
        if entry.workerless_required && entry.kind == "Extension" && !index.is_workerless_capable(&entry.type_) {
            forbid.push(
                entry.field.clone(),
                format!("extension type \"{}\" does not support workerless clusters", entry.type_),
            );
        }
    }

    forbid
}
