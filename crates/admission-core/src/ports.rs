//! Trait boundaries towards the transport: everything the core needs from
//! the outside world, and nothing more (spec §6 "External Interfaces").

use crate::error::PortError;
use crate::model::{ObjectRef, UserInfo};

/// The verb an [`Authorizer`] is asked to check. The core only ever asks
/// "can this subject read this object" — write authorization is the
/// transport's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Verb {
    Get,
}

/// The outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum AuthDecision {
    Allow,
    Deny,
    NoOpinion,
}

impl AuthDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, AuthDecision::Allow | AuthDecision::NoOpinion)
    }
}

/// Narrow "can subject read resource X" query. Modelled as a trait so tests
/// can supply an in-memory fake; the real implementation talks to the
/// platform's authorization subsystem and lives outside this crate.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, user: &UserInfo, verb: Verb, reference: &ObjectRef) -> AuthDecision;
}

/// A direct (non-cached) read of a single object, used by the resolver as
/// the live-read fallback described in §4.2. Kinds not flagged
/// "live-readable" never reach this trait.
pub trait LiveReadClient: Send + Sync {
    fn read(&self, reference: &ObjectRef) -> Result<Option<serde_json::Value>, PortError>;
}

/// A generic, untyped object read used by plugins that need to inspect a
/// referenced object's shape (e.g. a ConfigMap's resource-version) without
/// the core defining a concrete Rust type for every auxiliary kind.
pub trait GenericObjectClient: Send + Sync {
    fn get(&self, reference: &ObjectRef) -> Result<Option<serde_json::Value>, PortError>;
}

/// Schema discovery, used by plugins that need to enumerate known kinds for
/// a group rather than resolve one object (e.g. validating that a requested
/// extension type is a kind the API server actually serves).
pub trait SchemaClient: Send + Sync {
    fn kinds_for_group(&self, group: &str) -> Result<Vec<String>, PortError>;
}
