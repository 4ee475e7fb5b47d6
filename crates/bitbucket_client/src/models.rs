//! # Models
//!
//! Data models exchanged with the Bitbucket Cloud 2.0 REST API.
//!
//! Only the fields this tool reads or writes are modelled; everything else in
//! the Bitbucket payloads is ignored during deserialization.

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;

/// Branch match kind used for every restriction this tool creates.
pub const GLOB_MATCH_KIND: &str = "glob";

/// A single page of a paginated Bitbucket listing.
///
/// Bitbucket returns the items in `values` and, when more pages exist, the
/// absolute URL of the following page in `next`.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

/// A repository in a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Repository {
    /// URL-safe repository identifier used in API paths
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// A workspace group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Group {
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Reference to a group inside another payload (restrictions, permissions).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GroupRef {
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl GroupRef {
    /// Creates a reference that only carries the slug, as Bitbucket expects on writes.
    pub fn from_slug(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: None,
        }
    }
}

/// Reference to a user inside a restriction payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Explicit group permission on a repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GroupPermission {
    /// One of `read`, `write`, `admin`
    pub permission: String,
    pub group: GroupRef,
}

/// Kind of a branch restriction as named by the Bitbucket API.
///
/// Kinds this tool never manages are preserved in [`RestrictionKind::Other`]
/// so that existing rules can still be listed and deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum RestrictionKind {
    /// Only the listed principals may push (`push`)
    Push,
    /// Only the listed principals may merge (`restrict_merges`)
    RestrictMerges,
    /// The branch cannot be deleted (`delete`)
    Delete,
    /// History rewrites are rejected (`force`)
    Force,
    /// Merge checks must pass before merging (`enforce_merge_checks`)
    EnforceMergeChecks,
    /// Minimum approvals before merging (`require_approvals_to_merge`)
    RequireApprovalsToMerge,
    /// Approvals reset when the source branch changes (`reset_pullrequest_approvals_on_change`)
    ResetApprovalsOnChange,
    /// "Changes requested" resets when the source branch changes
    /// (`reset_pullrequest_changes_requested_on_change`)
    ResetChangesRequestedOnChange,
    /// Any kind not listed above, kept verbatim
    Other(String),
}

impl RestrictionKind {
    /// Returns the API name of the kind.
    pub fn as_str(&self) -> &str {
        match self {
            RestrictionKind::Push => "push",
            RestrictionKind::RestrictMerges => "restrict_merges",
            RestrictionKind::Delete => "delete",
            RestrictionKind::Force => "force",
            RestrictionKind::EnforceMergeChecks => "enforce_merge_checks",
            RestrictionKind::RequireApprovalsToMerge => "require_approvals_to_merge",
            RestrictionKind::ResetApprovalsOnChange => "reset_pullrequest_approvals_on_change",
            RestrictionKind::ResetChangesRequestedOnChange => {
                "reset_pullrequest_changes_requested_on_change"
            }
            RestrictionKind::Other(kind) => kind,
        }
    }

    /// Whether restrictions of this kind carry a list of allowed users and groups.
    pub fn takes_principals(&self) -> bool {
        matches!(self, RestrictionKind::Push | RestrictionKind::RestrictMerges)
    }
}

impl From<String> for RestrictionKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "push" => RestrictionKind::Push,
            "restrict_merges" => RestrictionKind::RestrictMerges,
            "delete" => RestrictionKind::Delete,
            "force" => RestrictionKind::Force,
            "enforce_merge_checks" => RestrictionKind::EnforceMergeChecks,
            "require_approvals_to_merge" => RestrictionKind::RequireApprovalsToMerge,
            "reset_pullrequest_approvals_on_change" => RestrictionKind::ResetApprovalsOnChange,
            "reset_pullrequest_changes_requested_on_change" => {
                RestrictionKind::ResetChangesRequestedOnChange
            }
            _ => RestrictionKind::Other(value),
        }
    }
}

impl From<RestrictionKind> for String {
    fn from(value: RestrictionKind) -> Self {
        match value {
            RestrictionKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for RestrictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A branch restriction as stored by Bitbucket.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BranchRestriction {
    /// Server-assigned identifier
    pub id: u64,
    pub kind: RestrictionKind,
    /// `glob` or `branching_model`
    #[serde(default)]
    pub branch_match_kind: Option<String>,
    /// Glob pattern, set when `branch_match_kind` is `glob`
    #[serde(default)]
    pub pattern: Option<String>,
    /// Branching model type, set when `branch_match_kind` is `branching_model`
    #[serde(default)]
    pub branch_type: Option<String>,
    #[serde(default)]
    pub groups: Vec<GroupRef>,
    #[serde(default)]
    pub users: Vec<UserRef>,
    #[serde(default)]
    pub value: Option<u32>,
}

impl BranchRestriction {
    /// Returns the glob pattern if this restriction targets one.
    pub fn glob_pattern(&self) -> Option<&str> {
        match self.branch_match_kind.as_deref() {
            Some(GLOB_MATCH_KIND) | None => self.pattern.as_deref().filter(|p| !p.is_empty()),
            Some(_) => None,
        }
    }

    /// Group slugs allowed by this restriction.
    pub fn group_slugs(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.slug.as_str()).collect()
    }
}

/// Payload for creating a branch restriction.
///
/// # Examples
///
/// ```rust
/// use bitbucket_client::models::{NewBranchRestriction, RestrictionKind};
///
/// let rule = NewBranchRestriction::glob(RestrictionKind::Push, "main")
///     .with_groups(vec!["release-managers".to_string()]);
/// assert_eq!(rule.pattern, "main");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewBranchRestriction {
    pub kind: RestrictionKind,
    pub branch_match_kind: String,
    pub pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<GroupRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u32>,
}

impl NewBranchRestriction {
    /// Creates a glob-matched restriction.
    ///
    /// Principal-bearing kinds start with empty user and group lists; other
    /// kinds omit both fields.
    pub fn glob(kind: RestrictionKind, pattern: impl Into<String>) -> Self {
        let principals = kind.takes_principals();
        Self {
            kind,
            branch_match_kind: GLOB_MATCH_KIND.to_string(),
            pattern: pattern.into(),
            users: principals.then(Vec::new),
            groups: principals.then(Vec::new),
            value: None,
        }
    }

    /// Sets the allowed groups. Ignored for kinds that carry no principals.
    pub fn with_groups(mut self, slugs: Vec<String>) -> Self {
        if self.kind.takes_principals() {
            self.groups = Some(slugs.into_iter().map(GroupRef::from_slug).collect());
        }
        self
    }

    /// Sets the numeric value (e.g. the approval count).
    pub fn with_value(mut self, value: u32) -> Self {
        self.value = Some(value);
        self
    }
}
