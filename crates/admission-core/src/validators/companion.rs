//! Companion singleton check: creating either half of a one-to-one binding
//! (e.g. a Seed-managing controller and its companion) is forbidden while a
//! same-named object of the other kind already exists (spec §4.7.7).

use crate::error::{FieldPath, Forbid};
use crate::model::Operation;

/// One side of the companion relationship: what kind is being created, and
/// whether a same-named object of the companion kind already exists.
pub struct CompanionCheck<'a> {
    pub operation: Operation,
    pub name: &'a str,
    pub companion_kind: &'a str,
    pub companion_exists: bool,
}

pub fn validate(check: &CompanionCheck<'_>) -> Forbid {
    let mut forbid = Forbid::new();
    if check.operation == Operation::Create && check.companion_exists {
        forbid.push(
            FieldPath::new("metadata.name"),
            format!("a \"{}\" named \"{}\" already exists; only one companion pair is allowed", check.companion_kind, check.name),
        );
    }
    forbid
}
