//! Adapters that lift `admission-core`'s typed validators/mutators into the
//! type-erased [`Plugin`] interface the registry and dispatcher operate on.
//!
//! Every resource kind follows the same shape: decode [`RawRequest`] into
//! `admission_core::model::Request<T>`, run the kind's mutator(s) then
//! validator, re-encode the (possibly mutated) object back into the raw
//! request. Cross-object validators additionally need one
//! [`admission_core::resolver::ReferenceResolver`] per referenced kind,
//! built from the cache factory's indexes at initialization time; none of
//! these adapters wire a live-read fallback, since `PluginDependencies`
//! only carries a [`CacheFactory`] and an `Authorizer` — live-reads are a
//! transport-level capability this workspace leaves to the caller that
//! assembles `PluginDependencies` (see `DESIGN.md`).

use std::sync::Arc;

use admission_core::cache::CacheIndex;
use admission_core::error::Forbid;
use admission_core::extensions::{self, PrimaryExtensionIndex};
use admission_core::model::{
    BackupEntry, BackupTarget, Blueprint, Cluster, ClusterType, CredentialsBinding, ExtensionRegistration, Operation, OidcPreset,
    Project, Request, Seed, UserInfo, WorkloadIdentity,
};
use admission_core::mutate;
use admission_core::ports::Authorizer;
use admission_core::resolver::ReferenceResolver;
use admission_core::validators::companion::{self, CompanionCheck};
use admission_core::validators::{
    backup_entry::{self, BackupEntryValidatorDeps},
    backup_target::{self, BackupTargetValidatorDeps},
    cluster::{self, ClusterValidatorDeps},
    credentials_binding::{self, CredentialsBindingValidatorDeps},
    project::{self, ProjectValidatorDeps},
    seed::{self, SeedValidatorDeps},
};
use admission_core::version_diff::{self, VersionDiffContext};

use crate::plugin::{CacheFactory, Plugin, RawRequest};

fn decode<T: serde::de::DeserializeOwned>(value: &serde_json::Value) -> Result<T, Forbid> {
    serde_json::from_value(value.clone()).map_err(|err| Forbid::bad_request("", err.to_string()))
}

fn decode_request<T: serde::de::DeserializeOwned>(raw: &RawRequest) -> Result<Request<T>, Forbid> {
    Ok(Request {
        operation: raw.operation,
        namespace: raw.namespace.clone(),
        name: raw.name.clone(),
        subresource: raw.subresource.clone(),
        user_info: raw.user_info.clone(),
        new_object: raw.new_object.as_ref().map(decode).transpose()?,
        old_object: raw.old_object.as_ref().map(decode).transpose()?,
        dry_run: raw.dry_run,
    })
}

fn encode_new_object<T: serde::Serialize>(raw: &mut RawRequest, value: &Option<T>) -> Forbid {
    let Some(value) = value else { return Forbid::new() };
    match serde_json::to_value(value) {
        Ok(value) => {
            raw.new_object = Some(value);
            Forbid::new()
        }
        Err(err) => Forbid::bad_request("", err.to_string()),
    }
}

/// Looks up the cache factory's index for `kind`, downcast back to its
/// concrete `Arc<dyn CacheIndex<K>>`. Each validator plugin wraps the index
/// it needs in a `ReferenceResolver` itself once it also has an authorizer,
/// or keeps the raw index when it only needs to list every live object of
/// that kind.
fn index_for<K: Clone + Send + Sync + 'static>(factory: &Arc<dyn CacheFactory>, kind: &str) -> Option<Arc<dyn CacheIndex<K>>> {
    let index = factory.get_index(kind)?;
    index.downcast::<Arc<dyn CacheIndex<K>>>().ok().map(|arc| (*arc).clone())
}

/// Pulls `metadata.resourceVersion` out of a cached object's untyped JSON
/// representation, for the resource-version-backfill mutator (spec §4.9).
fn resource_version_of(value: &serde_json::Value) -> Option<String> {
    value.get("metadata")?.get("resourceVersion")?.as_str().map(str::to_string)
}

/// Validates Project namespace uniqueness (I6) and applies the
/// created-by/owner/member mutator on Create.
#[derive(Default)]
pub struct ProjectPlugin {
    projects: Option<Arc<dyn CacheIndex<Project>>>,
}

impl ProjectPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for ProjectPlugin {
    fn name(&self) -> &str {
        "project"
    }

    fn handles(&self, operation: Operation) -> bool {
        matches!(operation, Operation::Create | Operation::Update)
    }

    fn interested_kinds(&self) -> &[&'static str] {
        &["Project"]
    }

    fn set_cache_factory(&mut self, factory: Arc<dyn CacheFactory>) {
        self.projects = index_for(&factory, "Project");
    }

    fn validate_initialization(&self) -> Result<(), String> {
        if self.projects.is_none() {
            return Err("project plugin requires a Project cache index".to_string());
        }
        Ok(())
    }

    fn synced(&self) -> bool {
        self.projects.as_ref().is_some_and(|index| index.synced())
    }

    fn admit(&self, raw: &mut RawRequest) -> Forbid {
        let mut request: Request<Project> = match decode_request(raw) {
            Ok(request) => request,
            Err(forbid) => return forbid,
        };

        if let Some(project) = request.new_object.as_mut() {
            mutate::project::apply_create_defaults(project, request.operation, &request.user_info);
        }

        encode_new_object(raw, &request.new_object)
    }

    fn validate(&self, raw: &RawRequest) -> Forbid {
        let request: Request<Project> = match decode_request(raw) {
            Ok(request) => request,
            Err(forbid) => return forbid,
        };

        let Some(index) = &self.projects else {
            return Forbid::internal("", "project cache index not wired");
        };

        let live_projects = index.list();
        let deps = ProjectValidatorDeps { live_projects: &live_projects };
        project::validate(&request, &deps)
    }
}

/// Resolves every outbound Cluster reference, applies the VPA-default and
/// created-by mutators, and attaches an OIDC preset on Create.
#[derive(Default)]
pub struct ClusterPlugin {
    authorizer: Option<Arc<dyn Authorizer>>,
    blueprints: Option<Arc<dyn CacheIndex<Blueprint>>>,
    seeds: Option<Arc<dyn CacheIndex<Seed>>>,
    credentials_bindings: Option<Arc<dyn CacheIndex<CredentialsBinding>>>,
    secrets: Option<Arc<dyn CacheIndex<serde_json::Value>>>,
    config_maps: Option<Arc<dyn CacheIndex<serde_json::Value>>>,
    projects: Option<Arc<dyn CacheIndex<Project>>>,
    oidc_presets: Option<Arc<dyn CacheIndex<OidcPreset>>>,
}

impl ClusterPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for ClusterPlugin {
    fn name(&self) -> &str {
        "cluster"
    }

    fn handles(&self, operation: Operation) -> bool {
        matches!(operation, Operation::Create | Operation::Update)
    }

    fn interested_kinds(&self) -> &[&'static str] {
        &["Cluster"]
    }

    fn set_authorizer(&mut self, authorizer: Arc<dyn Authorizer>) {
        self.authorizer = Some(authorizer);
    }

    fn set_cache_factory(&mut self, factory: Arc<dyn CacheFactory>) {
        self.blueprints = index_for(&factory, "Blueprint");
        self.seeds = index_for(&factory, "Seed");
        self.credentials_bindings = index_for(&factory, "CredentialsBinding");
        self.secrets = index_for(&factory, "Secret");
        self.config_maps = index_for(&factory, "ConfigMap");
        self.projects = index_for(&factory, "Project");
        self.oidc_presets = index_for(&factory, "OidcPreset");
    }

    fn validate_initialization(&self) -> Result<(), String> {
        if self.authorizer.is_none() {
            return Err("cluster plugin requires an authorizer".to_string());
        }
        if self.blueprints.is_none() || self.seeds.is_none() || self.credentials_bindings.is_none() || self.secrets.is_none() {
            return Err("cluster plugin requires Blueprint, Seed, CredentialsBinding and Secret cache indexes".to_string());
        }
        Ok(())
    }

    fn synced(&self) -> bool {
        self.blueprints.as_ref().is_some_and(|i| i.synced())
            && self.seeds.as_ref().is_some_and(|i| i.synced())
            && self.credentials_bindings.as_ref().is_some_and(|i| i.synced())
            && self.secrets.as_ref().is_some_and(|i| i.synced())
    }

    fn admit(&self, raw: &mut RawRequest) -> Forbid {
        let mut request: Request<Cluster> = match decode_request(raw) {
            Ok(request) => request,
            Err(forbid) => return forbid,
        };

        let project_name = request.new_object.as_ref().and_then(|cluster| cluster.project.clone());
        let project = project_name.and_then(|name| self.projects.as_ref().and_then(|index| index.list().into_iter().find(|p| p.name == name)));

        let Some(cluster) = request.new_object.as_mut() else {
            return Forbid::new();
        };

        mutate::cluster::apply_vpa_default(cluster, request.operation);
        mutate::cluster::apply_created_by_annotation(cluster, request.operation, &request.user_info);

        if let Some(config_maps) = &self.config_maps {
            if let Some(reference) = &cluster.spec.audit_policy_config_map_ref {
                let found = config_maps.get(&reference.namespace, &reference.name);
                let resource_version = found.as_ref().and_then(resource_version_of);
                mutate::cluster::backfill_audit_configmap_resource_version(cluster, resource_version);
            }
        }

        let presets = self.oidc_presets.as_ref().map(|index| index.list()).unwrap_or_default();
        mutate::oidc::apply_oidc_preset(cluster, request.operation, project.as_ref(), &presets);

        encode_new_object(raw, &request.new_object)
    }

    fn validate(&self, raw: &RawRequest) -> Forbid {
        let request: Request<Cluster> = match decode_request(raw) {
            Ok(request) => request,
            Err(forbid) => return forbid,
        };

        let (Some(authorizer), Some(blueprints), Some(seeds), Some(credentials_bindings), Some(secrets)) = (
            &self.authorizer,
            &self.blueprints,
            &self.seeds,
            &self.credentials_bindings,
            &self.secrets,
        ) else {
            return Forbid::internal("", "cluster plugin dependencies not fully wired");
        };

        let project_ref = request.new_object.as_ref().and_then(|cluster| cluster.project.clone());
        let project = project_ref.and_then(|name| self.projects.as_ref().and_then(|p| p.list().into_iter().find(|p| p.name == name)));

        let blueprints_resolver = ReferenceResolver::new(blueprints.clone(), authorizer.clone());
        let seeds_resolver = ReferenceResolver::new(seeds.clone(), authorizer.clone());
        let credentials_bindings_resolver = ReferenceResolver::new(credentials_bindings.clone(), authorizer.clone());
        let secrets_resolver = ReferenceResolver::new(secrets.clone(), authorizer.clone());

        let deps = ClusterValidatorDeps {
            blueprints: &blueprints_resolver,
            seeds: &seeds_resolver,
            credentials_bindings: &credentials_bindings_resolver,
            secrets: &secrets_resolver,
            project: project.as_ref(),
        };

        cluster::validate(&request, &deps, &request.user_info)
    }
}

/// Resolves a Seed's backup credentials and enforces the zone-removal
/// invariant against every live Cluster scheduled onto it.
#[derive(Default)]
pub struct SeedPlugin {
    authorizer: Option<Arc<dyn Authorizer>>,
    secrets: Option<Arc<dyn CacheIndex<serde_json::Value>>>,
    workload_identities: Option<Arc<dyn CacheIndex<WorkloadIdentity>>>,
    clusters: Option<Arc<dyn CacheIndex<Cluster>>>,
}

impl SeedPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for SeedPlugin {
    fn name(&self) -> &str {
        "seed"
    }

    fn handles(&self, operation: Operation) -> bool {
        matches!(operation, Operation::Create | Operation::Update)
    }

    fn interested_kinds(&self) -> &[&'static str] {
        &["Seed"]
    }

    fn set_authorizer(&mut self, authorizer: Arc<dyn Authorizer>) {
        self.authorizer = Some(authorizer);
    }

    fn set_cache_factory(&mut self, factory: Arc<dyn CacheFactory>) {
        self.secrets = index_for(&factory, "Secret");
        self.workload_identities = index_for(&factory, "WorkloadIdentity");
        self.clusters = index_for(&factory, "Cluster");
    }

    fn validate_initialization(&self) -> Result<(), String> {
        if self.authorizer.is_none() || self.secrets.is_none() || self.workload_identities.is_none() || self.clusters.is_none() {
            return Err("seed plugin requires an authorizer, Secret, WorkloadIdentity and Cluster cache indexes".to_string());
        }
        Ok(())
    }

    fn synced(&self) -> bool {
        self.secrets.as_ref().is_some_and(|i| i.synced())
            && self.workload_identities.as_ref().is_some_and(|i| i.synced())
            && self.clusters.as_ref().is_some_and(|i| i.synced())
    }

    fn validate(&self, raw: &RawRequest) -> Forbid {
        let request: Request<Seed> = match decode_request(raw) {
            Ok(request) => request,
            Err(forbid) => return forbid,
        };

        let (Some(authorizer), Some(secrets), Some(workload_identities), Some(clusters)) =
            (&self.authorizer, &self.secrets, &self.workload_identities, &self.clusters)
        else {
            return Forbid::internal("", "seed plugin dependencies not fully wired");
        };

        let secrets_resolver = ReferenceResolver::new(secrets.clone(), authorizer.clone());
        let workload_identities_resolver = ReferenceResolver::new(workload_identities.clone(), authorizer.clone());
        let live_clusters = clusters.list();

        let deps = SeedValidatorDeps {
            secrets: &secrets_resolver,
            workload_identities: &workload_identities_resolver,
            live_clusters: &live_clusters,
        };

        seed::validate(&request, &deps, &request.user_info)
    }
}

/// Resolves a BackupTarget's Seed reference and blocks deletion while still
/// referenced by a BackupEntry.
#[derive(Default)]
pub struct BackupTargetPlugin {
    authorizer: Option<Arc<dyn Authorizer>>,
    seeds: Option<Arc<dyn CacheIndex<Seed>>>,
    backup_entries: Option<Arc<dyn CacheIndex<BackupEntry>>>,
}

impl BackupTargetPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for BackupTargetPlugin {
    fn name(&self) -> &str {
        "backup-target"
    }

    fn handles(&self, operation: Operation) -> bool {
        matches!(operation, Operation::Create | Operation::Update | Operation::Delete)
    }

    fn interested_kinds(&self) -> &[&'static str] {
        &["BackupTarget"]
    }

    fn set_authorizer(&mut self, authorizer: Arc<dyn Authorizer>) {
        self.authorizer = Some(authorizer);
    }

    fn set_cache_factory(&mut self, factory: Arc<dyn CacheFactory>) {
        self.seeds = index_for(&factory, "Seed");
        self.backup_entries = index_for(&factory, "BackupEntry");
    }

    fn validate_initialization(&self) -> Result<(), String> {
        if self.authorizer.is_none() || self.seeds.is_none() || self.backup_entries.is_none() {
            return Err("backup target plugin requires an authorizer, Seed and BackupEntry cache indexes".to_string());
        }
        Ok(())
    }

    fn synced(&self) -> bool {
        self.seeds.as_ref().is_some_and(|i| i.synced()) && self.backup_entries.as_ref().is_some_and(|i| i.synced())
    }

    fn validate(&self, raw: &RawRequest) -> Forbid {
        let request: Request<BackupTarget> = match decode_request(raw) {
            Ok(request) => request,
            Err(forbid) => return forbid,
        };

        let (Some(authorizer), Some(seeds), Some(backup_entries)) = (&self.authorizer, &self.seeds, &self.backup_entries) else {
            return Forbid::internal("", "backup target plugin dependencies not fully wired");
        };

        let seeds_resolver = ReferenceResolver::new(seeds.clone(), authorizer.clone());
        let live_entries = backup_entries.list();

        let deps = BackupTargetValidatorDeps { seeds: &seeds_resolver, backup_entries: &live_entries };
        backup_target::validate(&request, &deps, &request.user_info)
    }
}

/// Resolves a BackupEntry's Seed and BackupTarget references.
#[derive(Default)]
pub struct BackupEntryPlugin {
    authorizer: Option<Arc<dyn Authorizer>>,
    seeds: Option<Arc<dyn CacheIndex<Seed>>>,
    backup_targets: Option<Arc<dyn CacheIndex<BackupTarget>>>,
}

impl BackupEntryPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for BackupEntryPlugin {
    fn name(&self) -> &str {
        "backup-entry"
    }

    fn handles(&self, operation: Operation) -> bool {
        matches!(operation, Operation::Create | Operation::Update)
    }

    fn interested_kinds(&self) -> &[&'static str] {
        &["BackupEntry"]
    }

    fn set_authorizer(&mut self, authorizer: Arc<dyn Authorizer>) {
        self.authorizer = Some(authorizer);
    }

    fn set_cache_factory(&mut self, factory: Arc<dyn CacheFactory>) {
        self.seeds = index_for(&factory, "Seed");
        self.backup_targets = index_for(&factory, "BackupTarget");
    }

    fn validate_initialization(&self) -> Result<(), String> {
        if self.authorizer.is_none() || self.seeds.is_none() || self.backup_targets.is_none() {
            return Err("backup entry plugin requires an authorizer, Seed and BackupTarget cache indexes".to_string());
        }
        Ok(())
    }

    fn synced(&self) -> bool {
        self.seeds.as_ref().is_some_and(|i| i.synced()) && self.backup_targets.as_ref().is_some_and(|i| i.synced())
    }

    fn validate(&self, raw: &RawRequest) -> Forbid {
        let request: Request<BackupEntry> = match decode_request(raw) {
            Ok(request) => request,
            Err(forbid) => return forbid,
        };

        let (Some(authorizer), Some(seeds), Some(backup_targets)) = (&self.authorizer, &self.seeds, &self.backup_targets) else {
            return Forbid::internal("", "backup entry plugin dependencies not fully wired");
        };

        let seeds_resolver = ReferenceResolver::new(seeds.clone(), authorizer.clone());
        let backup_targets_resolver = ReferenceResolver::new(backup_targets.clone(), authorizer.clone());

        let deps = BackupEntryValidatorDeps { seeds: &seeds_resolver, backup_targets: &backup_targets_resolver };
        backup_entry::validate(&request, &deps, &request.user_info)
    }
}

/// Resolves a CredentialsBinding's credentials and quota references and
/// enforces provider-type agreement with Clusters that already use it.
#[derive(Default)]
pub struct CredentialsBindingPlugin {
    authorizer: Option<Arc<dyn Authorizer>>,
    secrets: Option<Arc<dyn CacheIndex<serde_json::Value>>>,
    workload_identities: Option<Arc<dyn CacheIndex<WorkloadIdentity>>>,
    quotas: Option<Arc<dyn CacheIndex<serde_json::Value>>>,
    clusters: Option<Arc<dyn CacheIndex<Cluster>>>,
}

impl CredentialsBindingPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for CredentialsBindingPlugin {
    fn name(&self) -> &str {
        "credentials-binding"
    }

    fn handles(&self, operation: Operation) -> bool {
        matches!(operation, Operation::Create | Operation::Update)
    }

    fn interested_kinds(&self) -> &[&'static str] {
        &["CredentialsBinding"]
    }

    fn set_authorizer(&mut self, authorizer: Arc<dyn Authorizer>) {
        self.authorizer = Some(authorizer);
    }

    fn set_cache_factory(&mut self, factory: Arc<dyn CacheFactory>) {
        self.secrets = index_for(&factory, "Secret");
        self.workload_identities = index_for(&factory, "WorkloadIdentity");
        self.quotas = index_for(&factory, "Quota");
        self.clusters = index_for(&factory, "Cluster");
    }

    fn validate_initialization(&self) -> Result<(), String> {
        if self.authorizer.is_none()
            || self.secrets.is_none()
            || self.workload_identities.is_none()
            || self.quotas.is_none()
            || self.clusters.is_none()
        {
            return Err(
                "credentials binding plugin requires an authorizer, Secret, WorkloadIdentity, Quota and Cluster cache indexes"
                    .to_string(),
            );
        }
        Ok(())
    }

    fn synced(&self) -> bool {
        self.secrets.as_ref().is_some_and(|i| i.synced())
            && self.workload_identities.as_ref().is_some_and(|i| i.synced())
            && self.quotas.as_ref().is_some_and(|i| i.synced())
            && self.clusters.as_ref().is_some_and(|i| i.synced())
    }

    fn validate(&self, raw: &RawRequest) -> Forbid {
        let request: Request<CredentialsBinding> = match decode_request(raw) {
            Ok(request) => request,
            Err(forbid) => return forbid,
        };

        let (Some(authorizer), Some(secrets), Some(workload_identities), Some(quotas), Some(clusters)) = (
            &self.authorizer,
            &self.secrets,
            &self.workload_identities,
            &self.quotas,
            &self.clusters,
        ) else {
            return Forbid::internal("", "credentials binding plugin dependencies not fully wired");
        };

        let secrets_resolver = ReferenceResolver::new(secrets.clone(), authorizer.clone());
        let workload_identities_resolver = ReferenceResolver::new(workload_identities.clone(), authorizer.clone());
        let quotas_resolver = ReferenceResolver::new(quotas.clone(), authorizer.clone());
        let live_clusters = clusters.list();

        let deps = CredentialsBindingValidatorDeps {
            secrets: &secrets_resolver,
            workload_identities: &workload_identities_resolver,
            quotas: &quotas_resolver,
            live_clusters: &live_clusters,
        };

        credentials_binding::validate(&request, &deps, &request.user_info)
    }
}

/// Proves every (kind, type) pair a Cluster, Seed or BackupTarget spec
/// demands is covered by a primary `ExtensionRegistration` (spec §4.6,
/// component C6). Runs on Create and Update; on Update, skips subjects
/// whose relevant spec fields are unchanged from the prior version so
/// already-admitted objects aren't re-forbidden by a later deregistration.
#[derive(Default)]
pub struct ExtensionRegistrationPlugin {
    registrations: Option<Arc<dyn CacheIndex<ExtensionRegistration>>>,
}

impl ExtensionRegistrationPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for ExtensionRegistrationPlugin {
    fn name(&self) -> &str {
        "extension-registration"
    }

    fn handles(&self, operation: Operation) -> bool {
        matches!(operation, Operation::Create | Operation::Update)
    }

    fn interested_kinds(&self) -> &[&'static str] {
        &["Cluster", "Seed", "BackupTarget"]
    }

    fn set_cache_factory(&mut self, factory: Arc<dyn CacheFactory>) {
        self.registrations = index_for(&factory, "ExtensionRegistration");
    }

    fn validate_initialization(&self) -> Result<(), String> {
        if self.registrations.is_none() {
            return Err("extension registration plugin requires an ExtensionRegistration cache index".to_string());
        }
        Ok(())
    }

    fn synced(&self) -> bool {
        self.registrations.as_ref().is_some_and(|i| i.synced())
    }

    fn validate(&self, raw: &RawRequest) -> Forbid {
        let Some(registrations) = &self.registrations else {
            return Forbid::internal("", "extension registration plugin dependency not fully wired");
        };
        let index = PrimaryExtensionIndex::build(&registrations.list());

        match raw.kind.as_str() {
            "Cluster" => {
                let request: Request<Cluster> = match decode_request(raw) {
                    Ok(request) => request,
                    Err(forbid) => return forbid,
                };
                let Some(cluster) = &request.new_object else { return Forbid::new() };
                if request.old_object.as_ref().is_some_and(|old| old.spec == cluster.spec) {
                    return Forbid::new();
                }
                let required = extensions::required_extensions_for_cluster(cluster);
                extensions::validate_required_extensions(&required, &index, ClusterType::Cluster)
            }
            "Seed" => {
                let request: Request<Seed> = match decode_request(raw) {
                    Ok(request) => request,
                    Err(forbid) => return forbid,
                };
                let Some(seed) = &request.new_object else { return Forbid::new() };
                if request.old_object.as_ref() == Some(seed) {
                    return Forbid::new();
                }
                let required = extensions::required_extensions_for_seed(seed);
                extensions::validate_required_extensions(&required, &index, ClusterType::Seed)
            }
            "BackupTarget" => {
                let request: Request<BackupTarget> = match decode_request(raw) {
                    Ok(request) => request,
                    Err(forbid) => return forbid,
                };
                let Some(target) = &request.new_object else { return Forbid::new() };
                if request.old_object.as_ref() == Some(target) {
                    return Forbid::new();
                }
                let required = extensions::required_extensions_for_backup_target(target);
                extensions::validate_required_extensions(&required, &index, ClusterType::Seed)
            }
            _ => Forbid::new(),
        }
    }
}

/// Diffs a Blueprint (or child Blueprint) update against the live Clusters
/// in its lineage and blocks removals/tightenings still in use (spec §4.8,
/// component C8). `interested_kinds` covers both the top-level and
/// namespaced-child variants; `raw.kind` tells `validate` which diff to run.
#[derive(Default)]
pub struct BlueprintPlugin {
    blueprints: Option<Arc<dyn CacheIndex<Blueprint>>>,
    clusters: Option<Arc<dyn CacheIndex<Cluster>>>,
}

impl BlueprintPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for BlueprintPlugin {
    fn name(&self) -> &str {
        "blueprint"
    }

    fn handles(&self, operation: Operation) -> bool {
        operation == Operation::Update
    }

    fn interested_kinds(&self) -> &[&'static str] {
        &["Blueprint", "ChildBlueprint"]
    }

    fn set_cache_factory(&mut self, factory: Arc<dyn CacheFactory>) {
        self.blueprints = index_for(&factory, "Blueprint");
        self.clusters = index_for(&factory, "Cluster");
    }

    fn validate_initialization(&self) -> Result<(), String> {
        if self.blueprints.is_none() || self.clusters.is_none() {
            return Err("blueprint plugin requires Blueprint and Cluster cache indexes".to_string());
        }
        Ok(())
    }

    fn synced(&self) -> bool {
        self.blueprints.as_ref().is_some_and(|i| i.synced()) && self.clusters.as_ref().is_some_and(|i| i.synced())
    }

    fn validate(&self, raw: &RawRequest) -> Forbid {
        let request: Request<Blueprint> = match decode_request(raw) {
            Ok(request) => request,
            Err(forbid) => return forbid,
        };
        let (Some(new), Some(old)) = (&request.new_object, &request.old_object) else {
            return Forbid::new();
        };
        let (Some(blueprints), Some(clusters)) = (&self.blueprints, &self.clusters) else {
            return Forbid::internal("", "blueprint plugin dependencies not fully wired");
        };

        let all_blueprints = blueprints.list();
        let live_clusters = clusters.list();
        let now = jiff::Timestamp::now();

        if raw.kind == "ChildBlueprint" {
            let Some(parent_name) = &new.parent else {
                return Forbid::bad_request("spec.parent", "child blueprint update requires a parent reference");
            };
            let Some(parent) = all_blueprints.iter().find(|bp| &bp.name == parent_name) else {
                return Forbid::not_found("spec.parent", format!("parent blueprint \"{parent_name}\" not found"));
            };
            version_diff::diff_child_blueprint_update(parent, &request.name, old, new, &live_clusters, now)
        } else {
            let children: Vec<Blueprint> = all_blueprints.iter().filter(|bp| bp.parent.as_deref() == Some(new.name.as_str())).cloned().collect();
            let ctx = VersionDiffContext {
                blueprint_name: &new.name,
                old,
                new,
                children: &children,
                clusters: &live_clusters,
                now,
            };
            version_diff::diff_blueprint_update(&ctx)
        }
    }
}

/// Enforces the companion-singleton invariant (spec §4.7.7) for a
/// one-to-one resource pair, e.g. a Seed and its managing companion object.
/// `companion_kind` is the kind this plugin checks *for* when `kind` is
/// being created; the registry holds one instance per direction of the
/// pair.
pub struct CompanionPlugin {
    kind: &'static str,
    companion_kind: &'static str,
    companions: Option<Arc<dyn CacheIndex<serde_json::Value>>>,
}

impl CompanionPlugin {
    pub fn new(kind: &'static str, companion_kind: &'static str) -> Self {
        Self { kind, companion_kind, companions: None }
    }
}

impl Plugin for CompanionPlugin {
    fn name(&self) -> &str {
        self.kind
    }

    fn handles(&self, operation: Operation) -> bool {
        operation == Operation::Create
    }

    fn interested_kinds(&self) -> &[&'static str] {
        std::slice::from_ref(&self.kind)
    }

    fn set_cache_factory(&mut self, factory: Arc<dyn CacheFactory>) {
        self.companions = index_for(&factory, self.companion_kind);
    }

    fn validate_initialization(&self) -> Result<(), String> {
        if self.companions.is_none() {
            return Err(format!("companion plugin for {} requires a {} cache index", self.kind, self.companion_kind));
        }
        Ok(())
    }

    fn synced(&self) -> bool {
        self.companions.as_ref().is_some_and(|i| i.synced())
    }

    fn validate(&self, raw: &RawRequest) -> Forbid {
        let Some(companions) = &self.companions else {
            return Forbid::internal("", "companion plugin dependency not fully wired");
        };

        let companion_exists = companions.get(&raw.namespace, &raw.name).is_some();
        let check = CompanionCheck {
            operation: raw.operation,
            name: &raw.name,
            companion_kind: self.companion_kind,
            companion_exists,
        };
        companion::validate(&check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admission_core::cache::FakeIndex;

    fn project_json(name: &str, namespace: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "namespace": namespace,
            "created_by": null,
            "owner": null,
            "members": [],
            "labels": {},
            "deletion_timestamp": null,
        })
    }

    struct FixedFactory(Arc<FakeIndex<Project>>);

    impl CacheFactory for FixedFactory {
        fn get_index(&self, kind: &str) -> Option<Arc<dyn std::any::Any + Send + Sync>> {
            if kind == "Project" {
                let index: Arc<dyn CacheIndex<Project>> = self.0.clone();
                Some(Arc::new(index))
            } else {
                None
            }
        }
    }

    #[test]
    fn validate_initialization_fails_without_cache_factory() {
        let plugin = ProjectPlugin::new();
        assert!(plugin.validate_initialization().is_err());
    }

    #[test]
    fn wired_plugin_rejects_duplicate_namespace_and_stamps_creator() {
        let index = Arc::new(FakeIndex::<Project>::new());
        index.insert(
            "",
            "foo",
            Project { name: "foo".into(), namespace: Some("garden-foo".into()), ..Default::default() },
        );
        index.mark_synced();

        let mut plugin = ProjectPlugin::new();
        plugin.set_cache_factory(Arc::new(FixedFactory(index)));
        assert!(plugin.validate_initialization().is_ok());
        assert!(plugin.synced());

        let mut raw = RawRequest {
            operation: Operation::Create,
            kind: "Project".into(),
            namespace: String::new(),
            name: "bar".into(),
            subresource: None,
            user_info: UserInfo { name: "alice".into(), groups: vec![] },
            new_object: Some(project_json("bar", "garden-foo")),
            old_object: None,
            dry_run: false,
        };

        assert!(plugin.admit(&mut raw).is_empty());
        let mutated: Project = serde_json::from_value(raw.new_object.clone().unwrap()).unwrap();
        assert_eq!(mutated.created_by.as_deref(), Some("alice"));

        let forbid = plugin.validate(&raw);
        assert!(forbid.to_string().contains("already used by another project"));
    }

    struct MultiFactory(std::collections::HashMap<&'static str, Arc<dyn std::any::Any + Send + Sync>>);

    impl MultiFactory {
        fn new() -> Self {
            Self(std::collections::HashMap::new())
        }

        fn with<K: Send + Sync + 'static>(mut self, kind: &'static str, index: Arc<dyn CacheIndex<K>>) -> Self {
            self.0.insert(kind, Arc::new(index));
            self
        }
    }

    impl CacheFactory for MultiFactory {
        fn get_index(&self, kind: &str) -> Option<Arc<dyn std::any::Any + Send + Sync>> {
            self.0.get(kind).cloned()
        }
    }

    struct AllowAll;

    impl Authorizer for AllowAll {
        fn authorize(&self, _user: &UserInfo, _verb: admission_core::ports::Verb, _reference: &admission_core::model::ObjectRef) -> admission_core::ports::AuthDecision {
            admission_core::ports::AuthDecision::Allow
        }
    }

    fn backup_entry_request(new: &BackupEntry) -> RawRequest {
        RawRequest {
            operation: Operation::Create,
            kind: "BackupEntry".into(),
            namespace: String::new(),
            name: new.name.clone(),
            subresource: None,
            user_info: UserInfo::default(),
            new_object: Some(serde_json::to_value(new).unwrap()),
            old_object: None,
            dry_run: false,
        }
    }

    #[test]
    fn backup_entry_plugin_rejects_missing_seed() {
        let seeds = Arc::new(FakeIndex::<Seed>::new());
        seeds.mark_synced();
        let targets = Arc::new(FakeIndex::<BackupTarget>::new());
        targets.mark_synced();
        let factory = MultiFactory::new().with::<Seed>("Seed", seeds).with::<BackupTarget>("BackupTarget", targets);

        let mut plugin = BackupEntryPlugin::new();
        plugin.set_authorizer(Arc::new(AllowAll));
        plugin.set_cache_factory(Arc::new(factory));
        assert!(plugin.validate_initialization().is_ok());
        assert!(plugin.synced());

        let entry = BackupEntry { name: "entry-a".into(), seed_ref: "missing-seed".into(), bucket_ref: "target-a".into() };
        let forbid = plugin.validate(&backup_entry_request(&entry));
        assert!(forbid.to_string().contains("seed"));
    }

    fn companion_request(name: &str) -> RawRequest {
        RawRequest {
            operation: Operation::Create,
            kind: "Seed".into(),
            namespace: String::new(),
            name: name.into(),
            subresource: None,
            user_info: UserInfo::default(),
            new_object: Some(serde_json::json!({})),
            old_object: None,
            dry_run: false,
        }
    }

    #[test]
    fn companion_plugin_blocks_when_companion_already_exists() {
        let gardenlets = Arc::new(FakeIndex::<serde_json::Value>::new());
        gardenlets.insert("", "seed-a", serde_json::json!({}));
        gardenlets.mark_synced();
        let factory = MultiFactory::new().with::<serde_json::Value>("Gardenlet", gardenlets);

        let mut plugin = CompanionPlugin::new("Seed", "Gardenlet");
        plugin.set_cache_factory(Arc::new(factory));
        assert!(plugin.validate_initialization().is_ok());

        let forbid = plugin.validate(&companion_request("seed-a"));
        assert!(forbid.to_string().contains("already exists"));
    }

    #[test]
    fn companion_plugin_admits_when_companion_absent() {
        let gardenlets = Arc::new(FakeIndex::<serde_json::Value>::new());
        gardenlets.mark_synced();
        let factory = MultiFactory::new().with::<serde_json::Value>("Gardenlet", gardenlets);

        let mut plugin = CompanionPlugin::new("Seed", "Gardenlet");
        plugin.set_cache_factory(Arc::new(factory));

        assert!(plugin.validate(&companion_request("seed-a")).is_empty());
    }

    fn cluster_request(cluster: &Cluster) -> RawRequest {
        RawRequest {
            operation: Operation::Create,
            kind: "Cluster".into(),
            namespace: cluster.namespace.clone(),
            name: cluster.name.clone(),
            subresource: None,
            user_info: UserInfo::default(),
            new_object: Some(serde_json::to_value(cluster).unwrap()),
            old_object: None,
            dry_run: false,
        }
    }

    #[test]
    fn cluster_plugin_backfills_audit_configmap_resource_version() {
        let config_maps = Arc::new(FakeIndex::<serde_json::Value>::new());
        config_maps.insert(
            "garden-foo",
            "audit-policy",
            serde_json::json!({ "metadata": { "resourceVersion": "42" } }),
        );
        config_maps.mark_synced();
        let factory = MultiFactory::new().with::<serde_json::Value>("ConfigMap", config_maps);

        let mut plugin = ClusterPlugin::new();
        plugin.set_cache_factory(Arc::new(factory));

        let cluster = Cluster {
            name: "shoot-a".into(),
            namespace: "garden-foo".into(),
            project: None,
            labels: Default::default(),
            annotations: Default::default(),
            spec: admission_core::model::ClusterSpec {
                audit_policy_config_map_ref: Some(admission_core::model::SecretRef {
                    name: "audit-policy".into(),
                    namespace: "garden-foo".into(),
                    resource_version: None,
                }),
                ..Default::default()
            },
            deletion_timestamp: None,
        };

        let mut raw = cluster_request(&cluster);
        assert!(plugin.admit(&mut raw).is_empty());

        let mutated: Cluster = serde_json::from_value(raw.new_object.clone().unwrap()).unwrap();
        assert_eq!(
            mutated.spec.audit_policy_config_map_ref.unwrap().resource_version.as_deref(),
            Some("42")
        );
    }

    fn cluster_with_provider(provider: &str) -> Cluster {
        Cluster {
            name: "shoot-a".into(),
            namespace: "garden-foo".into(),
            project: None,
            labels: Default::default(),
            annotations: Default::default(),
            spec: admission_core::model::ClusterSpec {
                provider_type: admission_core::model::ProviderType::Named(provider.into()),
                worker_pools: vec![admission_core::model::WorkerPool {
                    name: "pool-a".into(),
                    min: 1,
                    max: 1,
                    machine_type: "m5.large".into(),
                    image: None,
                    container_runtimes: vec![],
                    zones: Default::default(),
                }],
                ..Default::default()
            },
            deletion_timestamp: None,
        }
    }

    fn extension_registration_factory(registrations: Vec<ExtensionRegistration>) -> MultiFactory {
        let index = Arc::new(FakeIndex::<ExtensionRegistration>::new());
        for (i, registration) in registrations.into_iter().enumerate() {
            index.insert("", &i.to_string(), registration);
        }
        index.mark_synced();
        MultiFactory::new().with::<ExtensionRegistration>("ExtensionRegistration", index)
    }

    #[test]
    fn extension_registration_plugin_admits_registered_cluster_provider() {
        let registrations = ["ControlPlane", "Infrastructure", "Worker"]
            .into_iter()
            .map(|kind| ExtensionRegistration {
                name: format!("aws-{kind}"),
                resources: vec![admission_core::model::ExtensionResource {
                    kind: kind.into(),
                    type_: "aws".into(),
                    primary: true,
                    workerless_supported: None,
                    cluster_compatibility: Default::default(),
                }],
            })
            .collect();
        let mut plugin = ExtensionRegistrationPlugin::new();
        plugin.set_cache_factory(Arc::new(extension_registration_factory(registrations)));
        assert!(plugin.validate_initialization().is_ok());

        let cluster = cluster_with_provider("aws");
        let forbid = plugin.validate(&cluster_request(&cluster));
        assert!(forbid.is_empty(), "{forbid}");
    }

    #[test]
    fn extension_registration_plugin_forbids_non_registered_provider_type() {
        let mut plugin = ExtensionRegistrationPlugin::new();
        plugin.set_cache_factory(Arc::new(extension_registration_factory(vec![])));
        assert!(plugin.validate_initialization().is_ok());

        let cluster = cluster_with_provider("unregistered-provider");
        let forbid = plugin.validate(&cluster_request(&cluster));
        assert!(forbid.to_string().contains("non-registered provider type"));
    }

    #[test]
    fn extension_registration_plugin_skips_unchanged_spec_on_update() {
        let mut plugin = ExtensionRegistrationPlugin::new();
        plugin.set_cache_factory(Arc::new(extension_registration_factory(vec![])));

        let cluster = cluster_with_provider("unregistered-provider");
        let mut raw = cluster_request(&cluster);
        raw.operation = Operation::Update;
        raw.old_object = raw.new_object.clone();

        assert!(plugin.validate(&raw).is_empty());
    }

    fn blueprint_request(old: &Blueprint, new: &Blueprint) -> RawRequest {
        RawRequest {
            operation: Operation::Update,
            kind: "Blueprint".into(),
            namespace: String::new(),
            name: new.name.clone(),
            subresource: None,
            user_info: UserInfo::default(),
            new_object: Some(serde_json::to_value(new).unwrap()),
            old_object: Some(serde_json::to_value(old).unwrap()),
            dry_run: false,
        }
    }

    #[test]
    fn blueprint_plugin_forbids_removing_a_kubernetes_version_still_in_use() {
        let version = semver::Version::parse("1.30.0").unwrap();
        let old_blueprint = Blueprint {
            name: "bp-a".into(),
            kubernetes_versions: vec![admission_core::model::VersionEntry {
                version: version.clone(),
                expiration_date: None,
                classification: None,
            }],
            machine_images: vec![],
            limits: Default::default(),
            parent: None,
        };
        let new_blueprint = Blueprint { kubernetes_versions: vec![], ..old_blueprint.clone() };

        let cluster = Cluster {
            name: "shoot-a".into(),
            namespace: "garden-foo".into(),
            project: None,
            labels: Default::default(),
            annotations: Default::default(),
            spec: admission_core::model::ClusterSpec {
                blueprint_ref: "bp-a".into(),
                kubernetes: Some(admission_core::model::KubernetesSpec { version: version.clone() }),
                ..Default::default()
            },
            deletion_timestamp: None,
        };

        let blueprints = Arc::new(FakeIndex::<Blueprint>::new());
        blueprints.insert("", "bp-a", old_blueprint.clone());
        blueprints.mark_synced();
        let clusters = Arc::new(FakeIndex::<Cluster>::new());
        clusters.insert("garden-foo", "shoot-a", cluster);
        clusters.mark_synced();
        let factory = MultiFactory::new()
            .with::<Blueprint>("Blueprint", blueprints)
            .with::<Cluster>("Cluster", clusters);

        let mut plugin = BlueprintPlugin::new();
        plugin.set_cache_factory(Arc::new(factory));
        assert!(plugin.validate_initialization().is_ok());

        let forbid = plugin.validate(&blueprint_request(&old_blueprint, &new_blueprint));
        assert!(forbid.to_string().contains("still used by cluster"));
    }

    #[test]
    fn blueprint_plugin_admits_removing_an_unused_kubernetes_version() {
        let version = semver::Version::parse("1.30.0").unwrap();
        let old_blueprint = Blueprint {
            name: "bp-a".into(),
            kubernetes_versions: vec![admission_core::model::VersionEntry {
                version,
                expiration_date: None,
                classification: None,
            }],
            machine_images: vec![],
            limits: Default::default(),
            parent: None,
        };
        let new_blueprint = Blueprint { kubernetes_versions: vec![], ..old_blueprint.clone() };

        let blueprints = Arc::new(FakeIndex::<Blueprint>::new());
        blueprints.insert("", "bp-a", old_blueprint.clone());
        blueprints.mark_synced();
        let clusters = Arc::new(FakeIndex::<Cluster>::new());
        clusters.mark_synced();
        let factory = MultiFactory::new()
            .with::<Blueprint>("Blueprint", blueprints)
            .with::<Cluster>("Cluster", clusters);

        let mut plugin = BlueprintPlugin::new();
        plugin.set_cache_factory(Arc::new(factory));

        let forbid = plugin.validate(&blueprint_request(&old_blueprint, &new_blueprint));
        assert!(forbid.is_empty(), "{forbid}");
    }

    #[test]
    fn gardenlet_companion_plugin_blocks_creating_gardenlet_when_seed_exists() {
        let seeds = Arc::new(FakeIndex::<serde_json::Value>::new());
        seeds.insert("", "seed-a", serde_json::json!({}));
        seeds.mark_synced();
        let factory = MultiFactory::new().with::<serde_json::Value>("Seed", seeds);

        let mut plugin = CompanionPlugin::new("Gardenlet", "Seed");
        plugin.set_cache_factory(Arc::new(factory));
        assert!(plugin.validate_initialization().is_ok());

        let mut raw = companion_request("seed-a");
        raw.kind = "Gardenlet".into();
        let forbid = plugin.validate(&raw);
        assert!(forbid.to_string().contains("already exists"));
    }
}
