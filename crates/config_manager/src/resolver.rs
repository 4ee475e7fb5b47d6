//! Configuration resolution.
//!
//! [`resolve`] gathers every value from a [`ConfigSource`], applies defaults
//! and validates the combination, producing an immutable [`ResolvedConfig`].

use secrecy::SecretString;
use std::fmt;
use tracing::debug;

use crate::branch_types::{parse_branch_types, BranchSelection};
use crate::keys;
use crate::source::{ConfigKey, ConfigSource};
use crate::{ConfigurationError, ConfigurationResult};

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;

/// Who may push to, or merge into, a protected branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Everyone with access to the repository
    #[default]
    Everyone,
    /// Only the groups listed in ALLOW_GROUPS
    Groups,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Everyone => "everyone",
            AccessMode::Groups => "groups",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atlassian account credentials used for basic auth.
#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub api_token: SecretString,
}

/// Validated snapshot of all inputs for one run.
#[derive(Debug)]
pub struct ResolvedConfig {
    pub workspace: String,
    pub credentials: Credentials,

    /// Repository slugs to process; empty means every repository in the workspace
    pub repositories: Vec<String>,

    pub branches: BranchSelection,
    pub allow_branch_delete: bool,
    pub enforce_merge_checks: bool,

    /// `None` when not configured
    pub reset_approvals_on_change: Option<bool>,

    /// `None` means the runner asks once per run
    pub confirm_delete_existing_rules: Option<bool>,

    pub write_access: AccessMode,
    pub merge_access: AccessMode,
    pub allow_groups: Vec<String>,

    pub prevent_force_push: bool,

    /// Minimum approvals before merging; `None` or `Some(0)` adds no rule
    pub required_approvals: Option<u32>,

    pub reset_changes_requested_on_change: bool,

    pub api_url: Option<String>,
    pub legacy_api_url: Option<String>,
}

impl ResolvedConfig {
    /// Groups allowed under `mode`: ALLOW_GROUPS for `Groups`, nobody in particular for `Everyone`.
    pub fn principals_for(&self, mode: AccessMode) -> &[String] {
        match mode {
            AccessMode::Everyone => &[],
            AccessMode::Groups => &self.allow_groups,
        }
    }

    pub fn uses_groups(&self) -> bool {
        self.write_access == AccessMode::Groups || self.merge_access == AccessMode::Groups
    }
}

/// Raw values as read from the source, before validation.
#[derive(Debug, Default)]
struct RawValues {
    workspace: Option<String>,
    email: Option<String>,
    api_token: Option<String>,
    branches: Option<String>,
    branch_types: Option<String>,
    repositories: Option<String>,
    allow_branch_delete: Option<String>,
    enforce_merge_checks: Option<String>,
    reset_approvals_on_change: Option<String>,
    confirm_delete_existing_rules: Option<String>,
    write_access_mode: Option<String>,
    merge_access_mode: Option<String>,
    allow_groups: Option<String>,
    prevent_force_push: Option<String>,
    required_approvals: Option<String>,
    reset_changes_requested_on_change: Option<String>,
    api_url: Option<String>,
    legacy_api_url: Option<String>,
}

/// Resolves the configuration for one run.
///
/// Values are read from `source` in a fixed order; interactive prompts are
/// only issued for values that are still needed (for example ALLOW_GROUPS is
/// only asked for when an access mode is `groups`). Validation runs once all
/// values are gathered.
///
/// # Errors
///
/// Returns a `ConfigurationError` when a required value is missing, when
/// BRANCHES and BRANCH_TYPES are both or neither set, when a value is outside
/// its vocabulary, or when group access is requested without ALLOW_GROUPS.
///
/// # Example
///
/// ```rust
/// use config_manager::{resolve, MapSource};
///
/// let source = MapSource::from_pairs(&[
///     ("WORKSPACE", "acme"),
///     ("ATLASSIAN_EMAIL", "jane@example.com"),
///     ("ATLASSIAN_API_TOKEN", "secret"),
///     ("BRANCHES", "main"),
/// ]);
/// let config = resolve(&source).unwrap();
/// assert_eq!(config.workspace, "acme");
/// assert!(!config.allow_branch_delete);
/// ```
pub fn resolve(source: &dyn ConfigSource) -> ConfigurationResult<ResolvedConfig> {
    let raw = gather(source)?;
    let config = validate(raw)?;

    debug!(
        workspace = %config.workspace,
        email = %config.credentials.email,
        repositories = ?config.repositories,
        branches = ?config.branches,
        write_access = %config.write_access,
        merge_access = %config.merge_access,
        allow_groups = ?config.allow_groups,
        "Resolved configuration"
    );
    Ok(config)
}

fn lookup(source: &dyn ConfigSource, key: &ConfigKey) -> ConfigurationResult<Option<String>> {
    Ok(source
        .get(key)?
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

fn gather(source: &dyn ConfigSource) -> ConfigurationResult<RawValues> {
    let mut raw = RawValues {
        workspace: lookup(source, &keys::WORKSPACE)?,
        email: lookup(source, &keys::ATLASSIAN_EMAIL)?,
        api_token: lookup(source, &keys::ATLASSIAN_API_TOKEN)?,
        ..RawValues::default()
    };

    // Look both up silently first so that supplying one never prompts for the other.
    raw.branches = lookup(source, &keys::BRANCHES.without_prompt())?;
    raw.branch_types = lookup(source, &keys::BRANCH_TYPES.without_prompt())?;
    if raw.branches.is_none() && raw.branch_types.is_none() {
        raw.branches = lookup(source, &keys::BRANCHES)?;
        if raw.branches.is_none() {
            raw.branch_types = lookup(source, &keys::BRANCH_TYPES)?;
        }
    }

    raw.repositories = lookup(source, &keys::REPOSITORIES)?;
    raw.enforce_merge_checks = lookup(source, &keys::ENFORCE_MERGE_CHECKS)?;
    raw.allow_branch_delete = lookup(source, &keys::ALLOW_BRANCH_DELETE)?;
    raw.reset_approvals_on_change = lookup(source, &keys::RESET_APPROVALS_ON_CHANGE)?;
    raw.write_access_mode = lookup(source, &keys::WRITE_ACCESS_MODE)?;
    raw.merge_access_mode = lookup(source, &keys::MERGE_ACCESS_MODE)?;

    let groups_needed = [&raw.write_access_mode, &raw.merge_access_mode]
        .iter()
        .any(|mode| {
            mode.as_deref()
                .is_some_and(|m| m.eq_ignore_ascii_case(AccessMode::Groups.as_str()))
        });
    raw.allow_groups = if groups_needed {
        lookup(source, &keys::ALLOW_GROUPS)?
    } else {
        lookup(source, &keys::ALLOW_GROUPS.without_prompt())?
    };

    raw.confirm_delete_existing_rules = lookup(source, &keys::CONFIRM_DELETE_EXISTING_RULES)?;
    raw.prevent_force_push = lookup(source, &keys::PREVENT_FORCE_PUSH)?;
    raw.required_approvals = lookup(source, &keys::REQUIRED_APPROVALS)?;
    raw.reset_changes_requested_on_change =
        lookup(source, &keys::RESET_CHANGES_REQUESTED_ON_CHANGE)?;
    raw.api_url = lookup(source, &keys::BITBUCKET_API_URL)?;
    raw.legacy_api_url = lookup(source, &keys::BITBUCKET_LEGACY_API_URL)?;

    Ok(raw)
}

fn validate(raw: RawValues) -> ConfigurationResult<ResolvedConfig> {
    if raw.branches.is_some() && raw.branch_types.is_some() {
        return Err(ConfigurationError::MutuallyExclusive {
            first: keys::BRANCHES.name.to_string(),
            second: keys::BRANCH_TYPES.name.to_string(),
        });
    }

    let missing: Vec<String> = [
        (&keys::WORKSPACE, &raw.workspace),
        (&keys::ATLASSIAN_EMAIL, &raw.email),
        (&keys::ATLASSIAN_API_TOKEN, &raw.api_token),
    ]
    .into_iter()
    .filter(|(_, value)| value.is_none())
    .map(|(key, _)| key.name.to_string())
    .collect();
    if !missing.is_empty() {
        return Err(ConfigurationError::MissingValues { names: missing });
    }

    let branches = match (&raw.branches, &raw.branch_types) {
        (Some(branches), None) => BranchSelection::Patterns(split_list(branches)),
        (None, Some(types)) => BranchSelection::Types(parse_branch_types(&split_list(types))?),
        _ => {
            return Err(ConfigurationError::MissingOneOf {
                names: vec![
                    keys::BRANCHES.name.to_string(),
                    keys::BRANCH_TYPES.name.to_string(),
                ],
            })
        }
    };
    let branches_empty = match &branches {
        BranchSelection::Patterns(p) => p.is_empty(),
        BranchSelection::Types(t) => t.is_empty(),
    };
    if branches_empty {
        // Only separators were given, e.g. BRANCHES=",".
        return Err(ConfigurationError::MissingOneOf {
            names: vec![
                keys::BRANCHES.name.to_string(),
                keys::BRANCH_TYPES.name.to_string(),
            ],
        });
    }

    let allow_branch_delete =
        parse_yes_no(&keys::ALLOW_BRANCH_DELETE, raw.allow_branch_delete.as_deref())?
            .unwrap_or(false);
    let enforce_merge_checks =
        parse_yes_no(&keys::ENFORCE_MERGE_CHECKS, raw.enforce_merge_checks.as_deref())?
            .unwrap_or(false);
    let reset_approvals_on_change = parse_yes_no(
        &keys::RESET_APPROVALS_ON_CHANGE,
        raw.reset_approvals_on_change.as_deref(),
    )?;
    let confirm_delete_existing_rules = parse_yes_no(
        &keys::CONFIRM_DELETE_EXISTING_RULES,
        raw.confirm_delete_existing_rules.as_deref(),
    )?;
    let prevent_force_push =
        parse_yes_no(&keys::PREVENT_FORCE_PUSH, raw.prevent_force_push.as_deref())?
            .unwrap_or(false);
    let reset_changes_requested_on_change = parse_yes_no(
        &keys::RESET_CHANGES_REQUESTED_ON_CHANGE,
        raw.reset_changes_requested_on_change.as_deref(),
    )?
    .unwrap_or(false);

    let write_access = parse_access_mode(&keys::WRITE_ACCESS_MODE, raw.write_access_mode.as_deref())?;
    let merge_access = parse_access_mode(&keys::MERGE_ACCESS_MODE, raw.merge_access_mode.as_deref())?;

    let allow_groups = raw.allow_groups.as_deref().map(split_list).unwrap_or_default();
    for (key, mode) in [
        (&keys::WRITE_ACCESS_MODE, write_access),
        (&keys::MERGE_ACCESS_MODE, merge_access),
    ] {
        if mode == AccessMode::Groups && allow_groups.is_empty() {
            return Err(ConfigurationError::GroupsRequired {
                mode_name: key.name.to_string(),
            });
        }
    }

    let required_approvals = raw
        .required_approvals
        .as_deref()
        .map(|value| {
            value
                .parse::<u32>()
                .map_err(|_| ConfigurationError::InvalidNumber {
                    name: keys::REQUIRED_APPROVALS.name.to_string(),
                    value: value.to_string(),
                })
        })
        .transpose()?;

    // Presence was checked above.
    let (Some(workspace), Some(email), Some(api_token)) = (raw.workspace, raw.email, raw.api_token)
    else {
        return Err(ConfigurationError::MissingValues {
            names: vec![keys::WORKSPACE.name.to_string()],
        });
    };

    Ok(ResolvedConfig {
        workspace,
        credentials: Credentials {
            email,
            api_token: SecretString::from(api_token),
        },
        repositories: raw.repositories.as_deref().map(split_list).unwrap_or_default(),
        branches,
        allow_branch_delete,
        enforce_merge_checks,
        reset_approvals_on_change,
        confirm_delete_existing_rules,
        write_access,
        merge_access,
        allow_groups,
        prevent_force_push,
        required_approvals,
        reset_changes_requested_on_change,
        api_url: raw.api_url,
        legacy_api_url: raw.legacy_api_url,
    })
}

/// Splits a comma-separated list, trimming entries and dropping empty ones.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses a case-insensitive `yes`/`no` value; `None` stays unset.
pub fn parse_yes_no(key: &ConfigKey, value: Option<&str>) -> ConfigurationResult<Option<bool>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("yes") => Ok(Some(true)),
        Some(v) if v.eq_ignore_ascii_case("no") => Ok(Some(false)),
        Some(v) => Err(ConfigurationError::InvalidBoolean {
            name: key.name.to_string(),
            value: v.to_string(),
        }),
    }
}

fn parse_access_mode(key: &ConfigKey, value: Option<&str>) -> ConfigurationResult<AccessMode> {
    match value.map(str::trim) {
        None | Some("") => Ok(AccessMode::default()),
        Some(v) if v.eq_ignore_ascii_case("everyone") => Ok(AccessMode::Everyone),
        Some(v) if v.eq_ignore_ascii_case("groups") => Ok(AccessMode::Groups),
        Some(v) => Err(ConfigurationError::InvalidAccessMode {
            name: key.name.to_string(),
            value: v.to_string(),
        }),
    }
}
