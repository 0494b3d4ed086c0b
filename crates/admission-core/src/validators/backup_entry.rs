//! BackupEntry reference resolution (spec §4.7.4).

use crate::error::{FieldPath, Forbid};
use crate::model::{BackupEntry, BackupTarget, ObjectRef, Request, Seed, UserInfo};
use crate::resolver::{ReferenceResolver, Resolution};

use super::decode_json;

pub struct BackupEntryValidatorDeps<'a> {
    pub seeds: &'a ReferenceResolver<Seed>,
    pub backup_targets: &'a ReferenceResolver<BackupTarget>,
}

pub fn validate(request: &Request<BackupEntry>, deps: &BackupEntryValidatorDeps<'_>, user: &UserInfo) -> Forbid {
    let mut forbid = Forbid::new();
    let Some(new) = request.new_object.as_ref() else {
        return forbid;
    };
    let root = FieldPath::new("spec");

    // 1. Seed-ref resolved; not-found fatal.
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

    // 2. Bucket-ref resolved; not-found fatal.
    let bucket_ref = ObjectRef::cluster_scoped("core/v1", "BackupTarget", &new.bucket_ref);
    match deps.backup_targets.resolve(&bucket_ref, user, decode_json) {
        Ok(Resolution::NotFound) => {
            forbid.push(root.child("bucketRef"), format!("backup target \"{}\" not found", new.bucket_ref));
        }
        Ok(Resolution::Forbidden) => {
            forbid.push(root.child("bucketRef"), "not authorized to read referenced backup target");
        }
        Ok(Resolution::Found(_)) => {}
        Err(err) => forbid.extend(err),
    }

    forbid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FakeIndex;
    use crate::model::Operation;
    use crate::ports::{AuthDecision, Authorizer, Verb};
    use std::sync::Arc;

    struct AllowAll;
    impl Authorizer for AllowAll {
        fn authorize(&self, _user: &UserInfo, _verb: Verb, _reference: &ObjectRef) -> AuthDecision {
            AuthDecision::Allow
        }
    }

    #[test]
    fn missing_seed_is_fatal() {
        let seeds = ReferenceResolver::new(Arc::new(FakeIndex::<Seed>::new()), Arc::new(AllowAll));
        let targets = ReferenceResolver::new(Arc::new(FakeIndex::<BackupTarget>::new()), Arc::new(AllowAll));
        let deps = BackupEntryValidatorDeps {
            seeds: &seeds,
            backup_targets: &targets,
        };

        let entry = BackupEntry {
            name: "entry-a".into(),
            seed_ref: "missing-seed".into(),
            bucket_ref: "target-a".into(),
        };
        let request = Request {
            operation: Operation::Create,
            namespace: String::new(),
            name: "entry-a".into(),
            subresource: None,
            user_info: UserInfo::default(),
            new_object: Some(entry),
            old_object: None,
            dry_run: false,
        };

        let forbid = validate(&request, &deps, &request.user_info);
        assert!(forbid.to_string().contains("seed"));
    }
}
