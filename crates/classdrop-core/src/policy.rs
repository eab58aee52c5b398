//! Role to policy resolution.
//!
//! Policies are fixed tables; nothing is fetched remotely. An unrecognised role
//! fails closed with [`UploadError::UnknownRole`].

use std::collections::BTreeSet;

use crate::constants::MB;
use crate::error::UploadError;
use crate::models::{Policy, Role};

const STUDENT_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".txt", ".jpg", ".jpeg", ".png", ".mp3", ".mp4",
];

const PARENT_EXTENSIONS: &[&str] = &[".pdf", ".doc", ".docx", ".jpg", ".jpeg", ".png"];

const EDUCATOR_EXTRA_EXTENSIONS: &[&str] = &[
    ".ppt", ".pptx", ".xls", ".xlsx", ".csv", ".mov", ".webm", ".wav", ".m4a",
];

const ADMINISTRATOR_EXTRA_EXTENSIONS: &[&str] = &[".zip", ".gif"];

fn extension_set(groups: &[&[&str]]) -> BTreeSet<String> {
    groups
        .iter()
        .flat_map(|group| group.iter())
        .map(|ext| ext.to_lowercase())
        .collect()
}

/// Policy for a known role.
pub fn policy_for(role: Role) -> Policy {
    match role {
        Role::Student => Policy {
            max_file_size_bytes: 50 * MB,
            allowed_extensions: extension_set(&[STUDENT_EXTENSIONS]),
            max_files_per_session: 10,
        },
        Role::Parent => Policy {
            max_file_size_bytes: 25 * MB,
            allowed_extensions: extension_set(&[PARENT_EXTENSIONS]),
            max_files_per_session: 5,
        },
        Role::Educator => Policy {
            max_file_size_bytes: 200 * MB,
            allowed_extensions: extension_set(&[STUDENT_EXTENSIONS, EDUCATOR_EXTRA_EXTENSIONS]),
            max_files_per_session: 25,
        },
        Role::Administrator => Policy {
            max_file_size_bytes: 500 * MB,
            allowed_extensions: extension_set(&[
                STUDENT_EXTENSIONS,
                EDUCATOR_EXTRA_EXTENSIONS,
                ADMINISTRATOR_EXTRA_EXTENSIONS,
            ]),
            max_files_per_session: 50,
        },
    }
}

/// Resolve the policy for a role name as received from the caller.
pub fn resolve(role: &str) -> Result<Policy, UploadError> {
    let role: Role = role.parse()?;
    Ok(policy_for(role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn student_policy() {
        let policy = resolve("student").unwrap();
        assert_eq!(policy.max_file_size_bytes, 50 * 1024 * 1024);
        assert_eq!(policy.max_files_per_session, 10);
        assert!(policy.allows_extension(".pdf"));
        assert!(policy.allows_extension(".MP4"));
        assert!(!policy.allows_extension(".exe"));
    }

    #[test]
    fn role_names_are_case_insensitive_with_aliases() {
        assert_eq!(resolve(" Educator ").unwrap(), policy_for(Role::Educator));
        assert_eq!(resolve("teacher").unwrap(), policy_for(Role::Educator));
        assert_eq!(resolve("ADMIN").unwrap(), policy_for(Role::Administrator));
    }

    #[test]
    fn unknown_role_fails_closed() {
        let err = resolve("superuser").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownRole);
        assert!(resolve("").is_err());
    }

    #[test]
    fn broader_roles_extend_narrower_ones() {
        let student = policy_for(Role::Student);
        let educator = policy_for(Role::Educator);
        let admin = policy_for(Role::Administrator);
        assert!(student.allowed_extensions.is_subset(&educator.allowed_extensions));
        assert!(educator.allowed_extensions.is_subset(&admin.allowed_extensions));
        assert!(policy_for(Role::Parent).max_file_size_bytes < student.max_file_size_bytes);
    }

    #[test]
    fn all_extensions_are_dotted_and_lowercase() {
        for role in [Role::Student, Role::Parent, Role::Educator, Role::Administrator] {
            for ext in policy_for(role).allowed_extensions {
                assert!(ext.starts_with('.'), "{ext}");
                assert_eq!(ext, ext.to_lowercase());
            }
        }
    }
}
