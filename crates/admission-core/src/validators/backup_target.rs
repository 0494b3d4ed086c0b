//! BackupTarget reference resolution and delete-blocking (spec §4.7.3, I8).

use crate::error::{FieldPath, Forbid};
use crate::model::{BackupEntry, BackupTarget, ObjectRef, Operation, Request, Seed, UserInfo};
use crate::resolver::{ReferenceResolver, Resolution};

use super::decode_json;

pub struct BackupTargetValidatorDeps<'a> {
    pub seeds: &'a ReferenceResolver<Seed>,
    /// Every live BackupEntry, used for the delete-blocking check (I8).
    pub backup_entries: &'a [BackupEntry],
}

pub fn validate(request: &Request<BackupTarget>, deps: &BackupTargetValidatorDeps<'_>, user: &UserInfo) -> Forbid {
    let mut forbid = Forbid::new();
    let root = FieldPath::new("spec");

    if request.operation == Operation::Delete {
        let target_name = request.old_object.as_ref().map(|t| t.name.as_str()).unwrap_or(&request.name);
        if deps.backup_entries.iter().any(|entry| entry.bucket_ref == target_name) {
            forbid.push(root.clone(), format!("backup target \"{target_name}\" is still referenced by a backup entry"));
        }
        return forbid; // fatal: no further checks apply on delete
    }

    let Some(new) = request.new_object.as_ref() else {
        return forbid;
    };

    // 1. Seed-ref resolved, not-found fatal.
    let seed_ref = ObjectRef::cluster_scoped("core/v1", "Seed", &new.seed_ref);
    match deps.seeds.resolve(&seed_ref, user, decode_json) {
        Ok(Resolution::NotFound) => {
            forbid.push(root.child("seedRef"), format!("seed \"{}\" not found", new.seed_ref));
            return forbid;
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

    // 2. Credentials-ref required; unknown kinds are fatal. Kind checking
    // itself happens at the transport's decode boundary (BadRequest); here
    // we only require the field be non-empty.
    if new.credentials_ref.trim().is_empty() {
        forbid.push(root.child("credentialsRef"), "credentials reference is required");
    }

    forbid
}
