//! Error types for reconciliation runs.
//!
//! Failures are split by blast radius:
//! - [`BranchGuardError`] stops the whole run.
//! - [`RemoteError`] stops one repository; the run continues.
//! - [`RuleApplyError`] records one failed operation; the repository continues.

use bitbucket_client::RestrictionKind;
use config_manager::ConfigurationError;
use std::fmt;
use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors that abort a run before or between repositories.
#[derive(Error, Debug)]
pub enum BranchGuardError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Failed to list repositories in workspace '{workspace}': {source}")]
    RepositoryListing {
        workspace: String,
        #[source]
        source: bitbucket_client::Error,
    },

    #[error("Unknown group(s) in ALLOW_GROUPS for workspace '{workspace}': {}", .groups.join(", "))]
    UnknownGroups {
        workspace: String,
        groups: Vec<String>,
    },

    #[error("Failed to confirm deletion of existing rules: {0}")]
    Confirmation(String),
}

/// A repository could not be processed at all.
#[derive(Error, Debug)]
#[error("Failed to read branch restrictions of repository '{repository}': {source}")]
pub struct RemoteError {
    pub repository: String,
    #[source]
    pub source: bitbucket_client::Error,
}

/// One remote mutation that the reconciler attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateRule {
        kind: RestrictionKind,
        pattern: String,
    },
    UpdateRule {
        id: u64,
        kind: RestrictionKind,
        pattern: String,
    },
    DeleteRule {
        id: u64,
        kind: RestrictionKind,
    },
    ListGroupPermissions,
    GrantGroupAccess {
        group: String,
    },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateRule { kind, pattern } => {
                write!(f, "create {} rule for '{}'", kind, pattern)
            }
            Operation::UpdateRule { id, kind, pattern } => {
                write!(f, "update {} rule #{} for '{}'", kind, id, pattern)
            }
            Operation::DeleteRule { id, kind } => write!(f, "delete {} rule #{}", kind, id),
            Operation::ListGroupPermissions => f.write_str("list group permissions"),
            Operation::GrantGroupAccess { group } => {
                write!(f, "grant write access to group '{}'", group)
            }
        }
    }
}

/// A single failed operation within a repository.
#[derive(Error, Debug)]
#[error("{operation} in '{repository}' failed: {source}")]
pub struct RuleApplyError {
    pub repository: String,
    pub operation: Operation,
    #[source]
    pub source: bitbucket_client::Error,
}
