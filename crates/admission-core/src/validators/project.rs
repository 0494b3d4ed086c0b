//! Project namespace uniqueness (spec §4.7.6, invariant I6).

use crate::error::{FieldPath, Forbid};
use crate::model::{Project, Request};

pub struct ProjectValidatorDeps<'a> {
    /// Every live Project, used to prove namespace uniqueness (I6).
    pub live_projects: &'a [Project],
}

pub fn validate(request: &Request<Project>, deps: &ProjectValidatorDeps<'_>) -> Forbid {
    let mut forbid = Forbid::new();
    let Some(new) = request.new_object.as_ref() else {
        return forbid;
    };

    let Some(namespace) = &new.namespace else {
        return forbid;
    };

    let conflicting = deps
        .live_projects
        .iter()
        .any(|project| project.name != new.name && project.namespace.as_deref() == Some(namespace.as_str()));

    if conflicting {
        forbid.push(
            FieldPath::new("spec.namespace"),
            format!("namespace \"{namespace}\" is already used by another project"),
        );
    }

    forbid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Operation;

    #[test]
    fn s7_second_project_with_same_namespace_is_forbidden() {
        let existing = Project {
            name: "foo".into(),
            namespace: Some("garden-foo".into()),
            created_by: None,
            owner: None,
            members: vec![],
            labels: Default::default(),
            deletion_timestamp: None,
        };
        let deps = ProjectValidatorDeps { live_projects: std::slice::from_ref(&existing) };

        let incoming = Project {
            name: "bar".into(),
            namespace: Some("garden-foo".into()),
            created_by: None,
            owner: None,
            members: vec![],
            labels: Default::default(),
            deletion_timestamp: None,
        };
        let request = Request {
            operation: Operation::Create,
            namespace: String::new(),
            name: "bar".into(),
            subresource: None,
            user_info: crate::model::UserInfo::default(),
            new_object: Some(incoming),
            old_object: None,
            dry_run: false,
        };

        let forbid = validate(&request, &deps);
        assert!(forbid.to_string().contains("garden-foo"));
        assert!(forbid.to_string().contains("already used by another project"));
    }

    #[test]
    fn unique_namespace_is_admitted() {
        let deps = ProjectValidatorDeps { live_projects: &[] };
        let incoming = Project {
            name: "bar".into(),
            namespace: Some("garden-bar".into()),
            created_by: None,
            owner: None,
            members: vec![],
            labels: Default::default(),
            deletion_timestamp: None,
        };
        let request = Request {
            operation: Operation::Create,
            namespace: String::new(),
            name: "bar".into(),
            subresource: None,
            user_info: crate::model::UserInfo::default(),
            new_object: Some(incoming),
            old_object: None,
            dry_run: false,
        };

        assert!(validate(&request, &deps).is_empty());
    }
}
