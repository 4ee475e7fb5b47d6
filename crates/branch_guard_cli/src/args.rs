//! Command-line arguments.
//!
//! Every flag mirrors an environment variable and takes precedence over it.

use clap::Parser;
use config_manager::{keys, MapSource};

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;

/// branch-guard: apply one branch protection policy to every repository of a Bitbucket workspace
#[derive(Parser, Debug, Default)]
#[command(name = "branch-guard", version)]
#[command(
    about = "Apply branch restrictions across the repositories of a Bitbucket workspace",
    long_about = "Apply branch restrictions across the repositories of a Bitbucket workspace.\n\n\
        Values not given as flags are read from environment variables and, when running in a \
        terminal, asked for interactively. Set BRANCH_GUARD_LOG to control log verbosity."
)]
pub struct Cli {
    /// Workspace slug [env: WORKSPACE]
    #[arg(long, value_name = "SLUG")]
    pub workspace: Option<String>,

    /// Comma-separated branch names or glob patterns [env: BRANCHES]
    #[arg(long, value_name = "PATTERNS", conflicts_with = "branch_types")]
    pub branches: Option<String>,

    /// Comma-separated branch types: production, development, feature, release, hotfix [env: BRANCH_TYPES]
    #[arg(long, value_name = "TYPES")]
    pub branch_types: Option<String>,

    /// Comma-separated group slugs used by the 'groups' access modes [env: ALLOW_GROUPS]
    #[arg(long, value_name = "SLUGS")]
    pub groups: Option<String>,

    /// Comma-separated repository slugs; all repositories when empty [env: REPOSITORIES]
    #[arg(long, value_name = "SLUGS")]
    pub repositories: Option<String>,

    /// Base URL of the Bitbucket REST API [env: BITBUCKET_API_URL]
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,
}

impl Cli {
    /// Configuration source holding the values given on the command line.
    pub fn to_source(&self) -> MapSource {
        let mut source = MapSource::new();
        let flags = [
            (keys::WORKSPACE.name, &self.workspace),
            (keys::BRANCHES.name, &self.branches),
            (keys::BRANCH_TYPES.name, &self.branch_types),
            (keys::ALLOW_GROUPS.name, &self.groups),
            (keys::REPOSITORIES.name, &self.repositories),
            (keys::BITBUCKET_API_URL.name, &self.api_url),
        ];
        for (name, value) in flags {
            if let Some(value) = value {
                source.insert(name, value.as_str());
            }
        }
        source
    }
}
