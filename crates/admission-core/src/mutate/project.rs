//! On Project Create, stamp `spec.createdBy`/`spec.owner` from the
//! request's user-info and add the user as an admin member (spec §4.9).

use crate::model::{Operation, Project, UserInfo};

pub fn apply_create_defaults(project: &mut Project, operation: Operation, user: &UserInfo) {
    if operation != Operation::Create {
        return;
    }

    if project.created_by.is_none() {
        project.created_by = Some(user.name.clone());
    }
    if project.owner.is_none() {
        project.owner = Some(user.name.clone());
    }
    if !project.members.iter().any(|member| member == &user.name) {
        project.members.push(user.name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> UserInfo {
        UserInfo { name: name.into(), groups: vec![] }
    }

    #[test]
    fn create_stamps_created_by_owner_and_member() {
        let mut project = Project { name: "foo".into(), ..Default::default() };
        apply_create_defaults(&mut project, Operation::Create, &user("alice"));
        assert_eq!(project.created_by.as_deref(), Some("alice"));
        assert_eq!(project.owner.as_deref(), Some("alice"));
        assert_eq!(project.members, vec!["alice".to_string()]);
    }

    #[test]
    fn create_does_not_duplicate_existing_member() {
        let mut project = Project {
            name: "foo".into(),
            members: vec!["alice".into()],
            ..Default::default()
        };
        apply_create_defaults(&mut project, Operation::Create, &user("alice"));
        assert_eq!(project.members, vec!["alice".to_string()]);
    }

    #[test]
    fn update_is_untouched() {
        let mut project = Project { name: "foo".into(), ..Default::default() };
        apply_create_defaults(&mut project, Operation::Update, &user("alice"));
        assert!(project.created_by.is_none());
    }
}
