//! Names of every configuration value, with their interactive prompts.

use crate::source::ConfigKey;

pub const WORKSPACE: ConfigKey =
    ConfigKey::new("WORKSPACE").with_prompt("Enter Bitbucket workspace slug: ");

pub const ATLASSIAN_EMAIL: ConfigKey =
    ConfigKey::new("ATLASSIAN_EMAIL").with_prompt("Enter Atlassian email: ");

pub const ATLASSIAN_API_TOKEN: ConfigKey = ConfigKey::new("ATLASSIAN_API_TOKEN")
    .with_prompt("Enter Atlassian API token: ")
    .secret();

pub const BRANCHES: ConfigKey = ConfigKey::new("BRANCHES")
    .with_prompt("Enter comma-separated branches to protect (leave blank to use branch types): ");

pub const BRANCH_TYPES: ConfigKey = ConfigKey::new("BRANCH_TYPES").with_prompt(
    "Enter comma-separated branch types to protect (production, development, feature, release, hotfix): ",
);

pub const REPOSITORIES: ConfigKey = ConfigKey::new("REPOSITORIES")
    .with_prompt("Enter comma-separated repository slugs to process (leave blank for all): ");

pub const ALLOW_BRANCH_DELETE: ConfigKey = ConfigKey::new("ALLOW_BRANCH_DELETE")
    .with_prompt("Allow protected branch deletion? [yes/no] (default no): ");

pub const ENFORCE_MERGE_CHECKS: ConfigKey = ConfigKey::new("ENFORCE_MERGE_CHECKS")
    .with_prompt("Enforce merge checks? [yes/no] (default no): ");

pub const RESET_APPROVALS_ON_CHANGE: ConfigKey = ConfigKey::new("RESET_APPROVALS_ON_CHANGE")
    .with_prompt("Reset approvals when the source branch is modified? [yes/no] (leave blank to skip): ");

pub const WRITE_ACCESS_MODE: ConfigKey = ConfigKey::new("WRITE_ACCESS_MODE")
    .with_prompt("Who should have write access? [everyone/groups] (default everyone): ");

pub const MERGE_ACCESS_MODE: ConfigKey = ConfigKey::new("MERGE_ACCESS_MODE")
    .with_prompt("Who should have merge access? [everyone/groups] (default everyone): ");

pub const ALLOW_GROUPS: ConfigKey = ConfigKey::new("ALLOW_GROUPS")
    .with_prompt("Enter comma-separated group slugs for access: ");

// Answered once per run by the runner, never through the resolver's prompts.
pub const CONFIRM_DELETE_EXISTING_RULES: ConfigKey =
    ConfigKey::new("CONFIRM_DELETE_EXISTING_RULES");

pub const PREVENT_FORCE_PUSH: ConfigKey = ConfigKey::new("PREVENT_FORCE_PUSH");

pub const REQUIRED_APPROVALS: ConfigKey = ConfigKey::new("REQUIRED_APPROVALS");

pub const RESET_CHANGES_REQUESTED_ON_CHANGE: ConfigKey =
    ConfigKey::new("RESET_CHANGES_REQUESTED_ON_CHANGE");

pub const BITBUCKET_API_URL: ConfigKey = ConfigKey::new("BITBUCKET_API_URL");

pub const BITBUCKET_LEGACY_API_URL: ConfigKey = ConfigKey::new("BITBUCKET_LEGACY_API_URL");
