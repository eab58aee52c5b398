use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::UploadError;

/// Caller roles with their own upload limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Parent,
    Educator,
    Administrator,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Role::Student => write!(f, "student"),
            Role::Parent => write!(f, "parent"),
            Role::Educator => write!(f, "educator"),
            Role::Administrator => write!(f, "administrator"),
        }
    }
}

impl FromStr for Role {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "parent" => Ok(Role::Parent),
            "educator" | "teacher" => Ok(Role::Educator),
            "administrator" | "admin" => Ok(Role::Administrator),
            _ => Err(UploadError::UnknownRole(s.to_string())),
        }
    }
}

/// Size, type and count limits applied to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub max_file_size_bytes: u64,
    /// Lowercased, including the leading dot
    pub allowed_extensions: BTreeSet<String>,
    pub max_files_per_session: usize,
}

impl Policy {
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.allowed_extensions.contains(&extension.to_lowercase())
    }
}
