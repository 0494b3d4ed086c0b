//! CredentialsBinding target resolution, provider-type agreement, and
//! quota-scope uniqueness (spec §4.7.5).

use std::collections::BTreeSet;

use crate::error::{FieldPath, Forbid};
use crate::model::{Cluster, CredentialsBinding, ObjectRef, Request, UserInfo, WorkloadIdentity};
use crate::resolver::{ReferenceResolver, Resolution};

use super::decode_json;

pub struct CredentialsBindingValidatorDeps<'a> {
    pub secrets: &'a ReferenceResolver<serde_json::Value>,
    pub workload_identities: &'a ReferenceResolver<WorkloadIdentity>,
    pub quotas: &'a ReferenceResolver<serde_json::Value>,
    /// Live Clusters, used for check 4 ("already referenced, provider type
    /// changing to disagree").
    pub live_clusters: &'a [Cluster],
}

pub fn validate(request: &Request<CredentialsBinding>, deps: &CredentialsBindingValidatorDeps<'_>, user: &UserInfo) -> Forbid {
    let mut forbid = Forbid::new();
    let Some(new) = request.new_object.as_ref() else {
        return forbid;
    };
    let root = FieldPath::new("spec");

    // 1./2. Credentials target resolved; WorkloadIdentity target-system type
    // must equal the binding's provider type.
    if new.credentials_ref.kind == "WorkloadIdentity" {
        let reference = ObjectRef::namespaced(&new.credentials_ref.api_version, "WorkloadIdentity", &new.namespace, &new.credentials_ref.name);
        match deps.workload_identities.resolve(&reference, user, decode_json) {
            Ok(Resolution::NotFound) => {
                forbid.push(root.child("credentialsRef"), format!("workload identity \"{}\" not found", new.credentials_ref.name));
            }
            Ok(Resolution::Forbidden) => {
                forbid.push(root.child("credentialsRef"), "not authorized to read referenced workload identity");
            }
            Ok(Resolution::Found(identity)) => {
                if new.provider_type.as_str() != Some(identity.target_system_type.as_str()) {
                    forbid.push(
                        root.child("providerType"),
                        format!(
                            "binding provider type \"{}\" does not match workload identity target system type \"{}\"",
                            new.provider_type, identity.target_system_type
                        ),
                    );
                }
            }
            Err(err) => forbid.extend(err),
        }
    } else {
        let reference = ObjectRef::namespaced("v1", "Secret", &new.namespace, &new.credentials_ref.name);
        match deps.secrets.resolve(&reference, user, decode_json) {
            Ok(Resolution::NotFound) => {
                forbid.push(root.child("credentialsRef"), format!("secret \"{}\" not found", new.credentials_ref.name));
            }
            Ok(Resolution::Forbidden) => {
                forbid.push(root.child("credentialsRef"), "not authorized to read referenced secret");
            }
            Ok(Resolution::Found(_)) => {}
            Err(err) => forbid.extend(err),
        }
    }

    // 3. Quota-refs resolve, and their (apiVersion, kind) scopes are pairwise distinct.
    let mut seen_scopes = BTreeSet::new();
    for (i, quota_ref) in new.quota_refs.iter().enumerate() {
        let field = root.child("quotaRefs").index(i);
        let scope = (quota_ref.api_version.clone(), quota_ref.kind.clone());
        if !seen_scopes.insert(scope) {
            forbid.push(field.clone(), format!("quota scope ({}, {}) is referenced more than once", quota_ref.api_version, quota_ref.kind));
        }

        let reference = ObjectRef::cluster_scoped(&quota_ref.api_version, &quota_ref.kind, &quota_ref.name);
        match deps.quotas.resolve(&reference, user, decode_json) {
            Ok(Resolution::NotFound) => forbid.push(field, format!("quota \"{}\" not found", quota_ref.name)),
            Ok(Resolution::Forbidden) => forbid.push(field, "not authorized to read referenced quota"),
            Ok(Resolution::Found(_)) => {}
            Err(err) => forbid.extend(err),
        }
    }

    // 4. If a Cluster already references this binding and the provider type
    // is changing to disagree with the Cluster's provider type, fail.
    if let Some(old) = request.old_object.as_ref() {
        if old.provider_type != new.provider_type {
            for cluster in deps
                .live_clusters
                .iter()
                .filter(|c| c.spec.credentials_binding_ref.as_deref() == Some(new.name.as_str()))
            {
                if cluster.spec.provider_type != new.provider_type {
                    forbid.push(
                        root.child("providerType"),
                        format!(
                            "changing provider type to \"{}\" disagrees with cluster {} provider type \"{}\"",
                            new.provider_type,
                            cluster.object_ref(),
                            cluster.spec.provider_type
                        ),
                    );
                }
            }
        }
    }

    forbid
}
