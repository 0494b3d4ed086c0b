//! Seed backup-credentials resolution and zone-removal checks (spec §4.7.2,
//! invariant I10).

use crate::error::{FieldPath, Forbid};
use crate::model::{Cluster, ObjectRef, Request, Seed, UserInfo, WorkloadIdentity};
use crate::resolver::{resolve_only_if_changed, ReferenceResolver, Resolution};

use super::decode_json;

pub struct SeedValidatorDeps<'a> {
    pub secrets: &'a ReferenceResolver<serde_json::Value>,
    pub workload_identities: &'a ReferenceResolver<WorkloadIdentity>,
    /// Every live Cluster currently scheduled on some Seed, used for the
    /// zone-removal check (I10).
    pub live_clusters: &'a [Cluster],
}

pub fn validate(request: &Request<Seed>, deps: &SeedValidatorDeps<'_>, user: &UserInfo) -> Forbid {
    let mut forbid = Forbid::new();
    let Some(new) = request.new_object.as_ref() else {
        return forbid;
    };
    let old = request.old_object.as_ref();
    let root = FieldPath::new("spec");

    // 1. Backup credentials-ref resolution. If it's a WorkloadIdentity, its
    // target-system type must equal the Seed's backup provider type (I4).
    if let Some(backup) = &new.backup {
        let old_credentials_ref = old.and_then(|o| o.backup.as_ref()).map(|b| &b.credentials_ref);
        let changed = resolve_only_if_changed(&backup.credentials_ref, old_credentials_ref);
        let field = root.child("backup").child("credentialsRef");

        if backup.credentials_ref.kind == "WorkloadIdentity" {
            let reference = ObjectRef::namespaced(
                &backup.credentials_ref.api_version,
                "WorkloadIdentity",
                &backup.credentials_ref.namespace,
                &backup.credentials_ref.name,
            );
            let resolution = if changed {
                deps.workload_identities.resolve(&reference, user, decode_json)
            } else {
                deps.workload_identities
                    .resolve_existence(&reference, decode_json)
                    .map(|v| v.map_or(Resolution::NotFound, Resolution::Found))
            };

            match resolution {
                Ok(Resolution::NotFound) => {
                    forbid.push(field, format!("workload identity \"{}\" not found", backup.credentials_ref));
                }
                Ok(Resolution::Forbidden) => {
                    forbid.push(field, "not authorized to read referenced workload identity");
                }
                Ok(Resolution::Found(identity)) => {
                    if identity.target_system_type != backup.provider_type {
                        forbid.push(
                            root.child("backup").child("providerType"),
                            format!(
                                "seed backup provider type \"{}\" does not match workload identity target system type \"{}\"",
                                backup.provider_type, identity.target_system_type
                            ),
                        );
                    }
                }
                Err(err) => forbid.extend(err),
            }
        } else {
            let reference = ObjectRef::namespaced(
                &backup.credentials_ref.api_version,
                "Secret",
                &backup.credentials_ref.namespace,
                &backup.credentials_ref.name,
            );
            let resolution = if changed {
                deps.secrets.resolve(&reference, user, decode_json)
            } else {
                deps.secrets
                    .resolve_existence(&reference, decode_json)
                    .map(|v| v.map_or(Resolution::NotFound, Resolution::Found))
            };

            match resolution {
                Ok(Resolution::NotFound) => {
                    forbid.push(field, format!("secret \"{}\" not found", backup.credentials_ref));
                }
                Ok(Resolution::Forbidden) => {
                    forbid.push(field, "not authorized to read referenced secret");
                }
                Ok(Resolution::Found(_)) => {}
                Err(err) => forbid.extend(err),
            }
        }
    }

    // 2. Zone removal (I10): every live Cluster's worker-pool zones must be a
    // subset of the new Seed zone list.
    if let Some(old) = old {
        let removed_zones: Vec<&String> = old.zones.difference(&new.zones).collect();
        if !removed_zones.is_empty() {
            for cluster in deps.live_clusters.iter().filter(|c| c.spec.seed_ref.as_deref() == Some(new.name.as_str())) {
                for pool in &cluster.spec.worker_pools {
                    for zone in &pool.zones {
                        if removed_zones.iter().any(|removed| *removed == zone) {
                            forbid.push(
                                root.child("zones"),
                                format!(
                                    "zone \"{zone}\" removed from seed \"{}\" but still used by cluster {} worker pool \"{}\"",
                                    new.name,
                                    cluster.object_ref(),
                                    pool.name
                                ),
                            );
                        }
                    }
                }
            }
        }
    }

    forbid
}
