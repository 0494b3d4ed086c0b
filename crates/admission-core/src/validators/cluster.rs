//! Full admission path for Cluster: resolves every outbound reference,
//! enforces provider-type equality, and honours deletion-blocking
//! invariants (spec §4.7.1).

use crate::error::{FieldPath, Forbid};
use crate::model::{Cluster, CredentialsBinding, Operation, Project, Request, SecretRef, Seed, UserInfo};
use crate::model::Blueprint;
use crate::resolver::{resolve_only_if_changed, ReferenceResolver, Resolution};

use super::decode_json;

/// The set of resolvers a Cluster validation pass needs. Bundled so the
/// validator function stays a pure, testable transform over its deps
/// rather than reaching into a global registry.
pub struct ClusterValidatorDeps<'a> {
    pub blueprints: &'a ReferenceResolver<Blueprint>,
    pub seeds: &'a ReferenceResolver<Seed>,
    pub credentials_bindings: &'a ReferenceResolver<CredentialsBinding>,
    pub secrets: &'a ReferenceResolver<serde_json::Value>,
    /// The Cluster's Project, resolved by the caller, used only for the
    /// deletion-blocking check (I7). `None` for cluster-scoped deployments
    /// that don't model Projects at all.
    pub project: Option<&'a Project>,
}

pub fn validate(request: &Request<Cluster>, deps: &ClusterValidatorDeps<'_>, user: &UserInfo) -> Forbid {
    let mut forbid = Forbid::new();
    let Some(new) = request.new_object.as_ref() else {
        return forbid;
    };
    let old = request.old_object.as_ref();
    let root = FieldPath::new("spec");

    // I7: a Cluster is not created in a Project whose deletionTimestamp is set.
    if request.operation == Operation::Create {
        if let Some(project) = deps.project {
            if project.is_deleting() {
                forbid.push(root.child("project"), format!("project \"{}\" is marked for deletion", project.name));
                return forbid;
            }
        }
    }

    if old.is_some_and(|old| old.spec == new.spec) {
        return forbid; // P1: deep-equal spec short-circuits validation
    }

    // 1. Blueprint-ref, cache-only, fatal on not-found.
    let blueprint_ref = crate::model::ObjectRef::cluster_scoped("core/v1", "Blueprint", &new.spec.blueprint_ref);
    match deps.blueprints.resolve(&blueprint_ref, user, decode_json) {
        Ok(Resolution::NotFound) => {
            forbid.push(root.child("blueprintRef"), format!("blueprint \"{}\" not found", new.spec.blueprint_ref));
            return forbid; // fatal
        }
        Ok(Resolution::Forbidden) => {
            forbid.push(root.child("blueprintRef"), "not authorized to read referenced blueprint");
            return forbid;
        }
        Ok(Resolution::Found(_)) => {}
        Err(err) => {
            forbid.extend(err);
            return forbid;
        }
    }

    // 2. Seed-ref, not-found fatal.
    if let Some(seed_name) = &new.spec.seed_ref {
        let seed_ref = crate::model::ObjectRef::cluster_scoped("core/v1", "Seed", seed_name);
        match deps.seeds.resolve(&seed_ref, user, decode_json) {
            Ok(Resolution::NotFound) => {
                forbid.push(root.child("seedRef"), format!("seed \"{seed_name}\" not found"));
                return forbid; // fatal
            }
            Ok(Resolution::Forbidden) => {
                forbid.push(root.child("seedRef"), "not authorized to read referenced seed");
                return forbid;
            }
            Ok(Resolution::Found(_)) => {}
            Err(err) => {
                forbid.extend(err);
                return forbid;
            }
        }
    }

    // 3. Credentials-binding-ref, provider-type equality, read authorization.
    if let Some(binding_name) = &new.spec.credentials_binding_ref {
        let binding_ref = crate::model::ObjectRef::namespaced("core/v1", "CredentialsBinding", &new.namespace, binding_name);
        match deps.credentials_bindings.resolve(&binding_ref, user, decode_json) {
            Ok(Resolution::NotFound) => {
                forbid.push(root.child("credentialsBindingRef"), format!("credentials binding \"{binding_name}\" not found"));
            }
            Ok(Resolution::Forbidden) => {
                forbid.push(root.child("credentialsBindingRef"), "not authorized to read referenced credentials binding");
            }
            Ok(Resolution::Found(binding)) => {
                // 6. Provider-type of the binding and Cluster must agree.
                if binding.provider_type != new.spec.provider_type {
                    forbid.push(
                        root.child("providerType"),
                        format!(
                            "cluster provider type \"{}\" does not match credentials binding provider type \"{}\"",
                            new.spec.provider_type, binding.provider_type
                        ),
                    );
                }
            }
            Err(err) => forbid.extend(err),
        }
    }

    // 4./7. Named secondary resources: live-read enabled, auth skipped when unchanged.
    let secondary_refs: Vec<(FieldPath, Option<&SecretRef>, Option<&SecretRef>)> = std::iter::once((
        root.child("auditPolicyConfigMapRef"),
        new.spec.audit_policy_config_map_ref.as_ref(),
        old.and_then(|o| o.spec.audit_policy_config_map_ref.as_ref()),
    ))
    .chain(
        new.spec
            .authentication_secret_refs
            .iter()
            .enumerate()
            .map(|(i, secret_ref)| {
                let field = root.child("authenticationSecretRefs").index(i);
                let old_ref = old.and_then(|o| o.spec.authentication_secret_refs.get(i));
                (field, Some(secret_ref), old_ref)
            }),
    )
    .chain(new.spec.dns_provider_secret_refs.iter().enumerate().map(|(i, secret_ref)| {
        let field = root.child("dnsProviderSecretRefs").index(i);
        let old_ref = old.and_then(|o| o.spec.dns_provider_secret_refs.get(i));
        (field, Some(secret_ref), old_ref)
    }))
    .collect();

    for (field, new_ref, old_ref) in secondary_refs {
        let Some(secret_ref) = new_ref else { continue };
        let reference = crate::model::ObjectRef::namespaced("v1", "Secret", &secret_ref.namespace, &secret_ref.name);
        let changed = resolve_only_if_changed(secret_ref, old_ref);

        let resolution = if changed {
            deps.secrets.resolve(&reference, user, decode_json)
        } else {
            deps.secrets.resolve_existence(&reference, decode_json).map(|found| match found {
                Some(value) => Resolution::Found(value),
                None => Resolution::NotFound,
            })
        };

        match resolution {
            // 5. If the Cluster is being deleted, missing named resources do not fail.
            Ok(Resolution::NotFound) if new.is_deleting() => {}
            Ok(Resolution::NotFound) => {
                forbid.push(field, format!("secret \"{}/{}\" not found", secret_ref.namespace, secret_ref.name));
            }
            Ok(Resolution::Forbidden) => {
                forbid.push(field, "not authorized to read referenced secret");
            }
            Ok(Resolution::Found(_)) => {}
            Err(err) => forbid.extend(err),
        }
    }

    forbid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FakeIndex;
    use crate::model::{ClusterSpec, Operation, ProviderType};
    use crate::ports::{AuthDecision, Authorizer, Verb};
    use std::sync::Arc;

    struct AllowAll;
    impl Authorizer for AllowAll {
        fn authorize(&self, _user: &UserInfo, _verb: Verb, _reference: &crate::model::ObjectRef) -> AuthDecision {
            AuthDecision::Allow
        }
    }

    fn blueprint_cache() -> Arc<FakeIndex<Blueprint>> {
        let cache = Arc::new(FakeIndex::new());
        cache.insert(
            "",
            "default",
            Blueprint {
                name: "default".into(),
                kubernetes_versions: vec![],
                machine_images: vec![],
                limits: Default::default(),
                parent: None,
            },
        );
        cache.mark_synced();
        cache
    }

    #[test]
    fn missing_blueprint_is_fatal() {
        let blueprints = ReferenceResolver::new(Arc::new(FakeIndex::<Blueprint>::new()), Arc::new(AllowAll));
        let seeds = ReferenceResolver::new(Arc::new(FakeIndex::<Seed>::new()), Arc::new(AllowAll));
        let bindings = ReferenceResolver::new(Arc::new(FakeIndex::<CredentialsBinding>::new()), Arc::new(AllowAll));
        let secrets = ReferenceResolver::new(Arc::new(FakeIndex::<serde_json::Value>::new()), Arc::new(AllowAll));
        let deps = ClusterValidatorDeps {
            blueprints: &blueprints,
            seeds: &seeds,
            credentials_bindings: &bindings,
            secrets: &secrets,
            project: None,
        };

        let cluster = Cluster {
            name: "shoot-a".into(),
            namespace: "garden-foo".into(),
            project: None,
            labels: Default::default(),
            annotations: Default::default(),
            spec: ClusterSpec {
                blueprint_ref: "missing".into(),
                provider_type: ProviderType::Named("aws".into()),
                ..Default::default()
            },
            deletion_timestamp: None,
        };
        let request = Request {
            operation: Operation::Create,
            namespace: "garden-foo".into(),
            name: "shoot-a".into(),
            subresource: None,
            user_info: UserInfo::default(),
            new_object: Some(cluster),
            old_object: None,
            dry_run: false,
        };

        let forbid = validate(&request, &deps, &request.user_info);
        assert!(forbid.to_string().contains("not found"));
    }

    #[test]
    fn existing_blueprint_admits_when_no_other_refs_set() {
        let blueprints = ReferenceResolver::new(blueprint_cache(), Arc::new(AllowAll));
        let seeds = ReferenceResolver::new(Arc::new(FakeIndex::<Seed>::new()), Arc::new(AllowAll));
        let bindings = ReferenceResolver::new(Arc::new(FakeIndex::<CredentialsBinding>::new()), Arc::new(AllowAll));
        let secrets = ReferenceResolver::new(Arc::new(FakeIndex::<serde_json::Value>::new()), Arc::new(AllowAll));
        let deps = ClusterValidatorDeps {
            blueprints: &blueprints,
            seeds: &seeds,
            credentials_bindings: &bindings,
            secrets: &secrets,
            project: None,
        };

        let cluster = Cluster {
            name: "shoot-a".into(),
            namespace: "garden-foo".into(),
            project: None,
            labels: Default::default(),
            annotations: Default::default(),
            spec: ClusterSpec {
                blueprint_ref: "default".into(),
                provider_type: ProviderType::Named("aws".into()),
                ..Default::default()
            },
            deletion_timestamp: None,
        };
        let request = Request {
            operation: Operation::Create,
            namespace: "garden-foo".into(),
            name: "shoot-a".into(),
            subresource: None,
            user_info: UserInfo::default(),
            new_object: Some(cluster),
            old_object: None,
            dry_run: false,
        };

        assert!(validate(&request, &deps, &request.user_info).is_empty());
    }

    #[test]
    fn p8_create_in_deleting_project_is_forbidden() {
        let blueprints = ReferenceResolver::new(blueprint_cache(), Arc::new(AllowAll));
        let seeds = ReferenceResolver::new(Arc::new(FakeIndex::<Seed>::new()), Arc::new(AllowAll));
        let bindings = ReferenceResolver::new(Arc::new(FakeIndex::<CredentialsBinding>::new()), Arc::new(AllowAll));
        let secrets = ReferenceResolver::new(Arc::new(FakeIndex::<serde_json::Value>::new()), Arc::new(AllowAll));
        let project = crate::model::Project {
            name: "foo".into(),
            deletion_timestamp: Some("2020-01-01T00:00:00Z".parse().unwrap()),
            ..Default::default()
        };
        let deps = ClusterValidatorDeps {
            blueprints: &blueprints,
            seeds: &seeds,
            credentials_bindings: &bindings,
            secrets: &secrets,
            project: Some(&project),
        };

        let cluster = Cluster {
            name: "shoot-a".into(),
            namespace: "garden-foo".into(),
            project: Some("foo".into()),
            labels: Default::default(),
            annotations: Default::default(),
            spec: ClusterSpec {
                blueprint_ref: "default".into(),
                provider_type: ProviderType::Named("aws".into()),
                ..Default::default()
            },
            deletion_timestamp: None,
        };
        let request = Request {
            operation: Operation::Create,
            namespace: "garden-foo".into(),
            name: "shoot-a".into(),
            subresource: None,
            user_info: UserInfo::default(),
            new_object: Some(cluster),
            old_object: None,
            dry_run: false,
        };

        let forbid = validate(&request, &deps, &request.user_info);
        assert!(forbid.to_string().contains("marked for deletion"));
    }
}
