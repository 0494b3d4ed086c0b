//! The admission-time view of the platform's first-class resources.
//!
//! These types intentionally do not derive `kube::CustomResourceExt` or
//! carry OpenAPI schema annotations: minting the platform's actual custom
//! resource definitions is out of scope for this crate (see the crate-level
//! Non-goals). They exist purely so the core has something concrete to read
//! references out of and diff between old/new during an admission pass.

use std::{collections::BTreeSet, fmt};

use jiff::Timestamp;
use semver::Version;
use serde::{Deserialize, Serialize};

/// The operation a [`Request`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "PascalCase")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

/// The subject performing a request, as handed down by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// A reference to a platform object: the only vocabulary the resolver,
/// extension validator and cross-object validators use to talk about "some
/// other object".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub api_version: String,
    pub kind: String,
    /// Empty for cluster-scoped kinds.
    #[serde(default)]
    pub namespace: String,
    pub name: String,
}

impl ObjectRef {
    pub fn namespaced(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn cluster_scoped(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            namespace: String::new(),
            name: name.into(),
        }
    }

    pub fn is_namespaced(&self) -> bool {
        !self.namespace.is_empty()
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// A provider type tag, e.g. on a Cluster, CredentialsBinding or BackupTarget.
///
/// `Unmanaged` (and the absence of a value, which deserializes to it) marks
/// "no reference" per spec §4.5: such a reference is skipped by the
/// resolver rather than treated as a dangling one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum ProviderType {
    #[default]
    Unmanaged,
    Named(String),
}

impl ProviderType {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ProviderType::Unmanaged => None,
            ProviderType::Named(s) => Some(s.as_str()),
        }
    }

    pub fn is_managed(&self) -> bool {
        matches!(self, ProviderType::Named(_))
    }
}

impl From<Option<String>> for ProviderType {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(s) if !s.is_empty() => ProviderType::Named(s),
            _ => ProviderType::Unmanaged,
        }
    }
}

impl From<ProviderType> for Option<String> {
    fn from(value: ProviderType) -> Self {
        match value {
            ProviderType::Unmanaged => None,
            ProviderType::Named(s) => Some(s),
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderType::Unmanaged => write!(f, "<unmanaged>"),
            ProviderType::Named(s) => write!(f, "{s}"),
        }
    }
}

/// A cluster type, used to filter extension-registration cluster-compatibility sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum ClusterType {
    Seed,
    Cluster,
}

/// One resource capability declared by an [`ExtensionRegistration`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionResource {
    pub kind: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default = "default_true")]
    pub primary: bool,
    pub workerless_supported: Option<bool>,
    /// Empty set means "both" (see spec §4.6 "Cluster-compatibility").
    #[serde(default)]
    pub cluster_compatibility: BTreeSet<ClusterType>,
}

fn default_true() -> bool {
    true
}

impl ExtensionResource {
    pub fn compatible_with(&self, cluster_type: ClusterType) -> bool {
        self.cluster_compatibility.is_empty() || self.cluster_compatibility.contains(&cluster_type)
    }
}

/// An extension registration, as declared by an extension controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRegistration {
    pub name: String,
    pub resources: Vec<ExtensionResource>,
}

/// One version entry in a Blueprint's kubernetes-versions or machine-images lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: Version,
    pub expiration_date: Option<Timestamp>,
    pub classification: Option<String>,
}

/// One entry in a Blueprint's machine-images map: the versions available for
/// a single named machine image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineImageVersions {
    pub name: String,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlueprintLimits {
    pub max_nodes_total: Option<u32>,
}

/// The cluster-wide Blueprint (a.k.a. cloud profile).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub name: String,
    pub kubernetes_versions: Vec<VersionEntry>,
    pub machine_images: Vec<MachineImageVersions>,
    #[serde(default)]
    pub limits: BlueprintLimits,
    /// Set for a child (namespaced) Blueprint; `None` for the top-level one.
    pub parent: Option<String>,
}

impl Blueprint {
    pub fn machine_image(&self, name: &str) -> Option<&MachineImageVersions> {
        self.machine_images.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRuntimeRequest {
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPoolImage {
    pub name: String,
    pub version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkerPool {
    pub name: String,
    pub min: u32,
    pub max: u32,
    pub machine_type: String,
    pub image: Option<WorkerPoolImage>,
    #[serde(default)]
    pub container_runtimes: Vec<ContainerRuntimeRequest>,
    #[serde(default)]
    pub zones: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesSpec {
    pub version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DnsProvider {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRequest {
    #[serde(rename = "type")]
    pub type_: String,
}

/// A named reference to a Secret or ConfigMap used for a secondary purpose
/// (audit policy, authentication, DNS provider credentials, …).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub resource_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub blueprint_ref: String,
    pub seed_ref: Option<String>,
    pub credentials_binding_ref: Option<String>,
    pub provider_type: ProviderType,
    #[serde(default)]
    pub worker_pools: Vec<WorkerPool>,
    pub kubernetes: Option<KubernetesSpec>,
    #[serde(default)]
    pub dns_providers: Vec<DnsProvider>,
    #[serde(default)]
    pub extensions: Vec<ExtensionRequest>,
    pub audit_policy_config_map_ref: Option<SecretRef>,
    #[serde(default)]
    pub authentication_secret_refs: Vec<SecretRef>,
    #[serde(default)]
    pub dns_provider_secret_refs: Vec<SecretRef>,
    pub oidc: Option<OidcConfig>,
    pub vertical_pod_autoscaler_enabled: Option<bool>,
}

impl ClusterSpec {
    pub fn is_workerless(&self) -> bool {
        self.worker_pools.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub namespace: String,
    pub project: Option<String>,
    #[serde(default)]
    pub labels: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: std::collections::BTreeMap<String, String>,
    pub spec: ClusterSpec,
    pub deletion_timestamp: Option<Timestamp>,
}

/// The annotation key the created-by mutator stamps onto a Cluster at
/// Create time (§4.9 "Created-by annotation").
pub const CREATED_BY_ANNOTATION: &str = "core.example.com/created-by";

impl Cluster {
    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::namespaced("core/v1", "Cluster", &self.namespace, &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SeedBackup {
    pub provider_type: String,
    /// Either a `Secret` or a `WorkloadIdentity`; for the latter, the
    /// target-system type must equal `provider_type` (invariant I4).
    pub credentials_ref: ObjectRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SeedIngressDns {
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    pub name: String,
    pub provider_type: String,
    pub backup: Option<SeedBackup>,
    pub ingress_dns: Option<SeedIngressDns>,
    #[serde(default)]
    pub extensions: Vec<ExtensionRequest>,
    #[serde(default)]
    pub zones: BTreeSet<String>,
    pub deletion_timestamp: Option<Timestamp>,
}

impl Seed {
    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupTarget {
    pub name: String,
    pub seed_ref: String,
    pub credentials_ref: String,
    pub provider_type: String,
    pub deletion_timestamp: Option<Timestamp>,
}

impl BackupTarget {
    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupEntry {
    pub name: String,
    pub seed_ref: String,
    pub bucket_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialsBinding {
    pub name: String,
    pub namespace: String,
    pub credentials_ref: ObjectRef,
    pub provider_type: ProviderType,
    #[serde(default)]
    pub quota_refs: Vec<QuotaRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadIdentity {
    pub name: String,
    pub namespace: String,
    pub target_system_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub namespace: Option<String>,
    pub created_by: Option<String>,
    pub owner: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
    /// Consulted by the OIDC-preset mutator's `project_selector` match
    /// (§4.9 "OIDC preset attachment").
    #[serde(default)]
    pub labels: std::collections::BTreeMap<String, String>,
    pub deletion_timestamp: Option<Timestamp>,
}

impl Project {
    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcConfig {
    pub issuer_url: String,
    pub client_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcPresetSelector {
    #[serde(default)]
    pub match_labels: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcPreset {
    pub name: String,
    pub weight: i32,
    pub cluster_selector: OidcPresetSelector,
    pub project_selector: Option<OidcPresetSelector>,
    pub oidc_config: OidcConfig,
}

/// A generic admission request, carrying the typed object the interested
/// plugin expects. The transport is responsible for decoding its own wire
/// format into this shape before handing it to the dispatcher.
#[derive(Debug, Clone)]
pub struct Request<T> {
    pub operation: Operation,
    pub namespace: String,
    pub name: String,
    pub subresource: Option<String>,
    pub user_info: UserInfo,
    pub new_object: Option<T>,
    pub old_object: Option<T>,
    pub dry_run: bool,
}

impl<T> Request<T> {
    pub fn object_for_read(&self) -> Option<&T> {
        self.new_object.as_ref().or(self.old_object.as_ref())
    }
}
