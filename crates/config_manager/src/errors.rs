//! Configuration error types.
//!
//! Every error names the offending variable and, where it helps, the expected
//! format, so the message can be shown to the user as-is.

use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors raised while gathering and validating configuration.
///
/// A `ConfigurationError` is always fatal: it is raised before any call to
/// the remote API is made.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Required configuration missing: {}", .names.join(", "))]
    MissingValues { names: Vec<String> },

    #[error("{first} and {second} are mutually exclusive; set only one of them")]
    MutuallyExclusive { first: String, second: String },

    #[error("At least one of {} is required", .names.join(" or "))]
    MissingOneOf { names: Vec<String> },

    #[error("Invalid value '{value}' for {name}: expected 'yes' or 'no'")]
    InvalidBoolean { name: String, value: String },

    #[error("Invalid value '{value}' for {name}: expected 'everyone' or 'groups'")]
    InvalidAccessMode { name: String, value: String },

    #[error("Invalid value '{value}' for {name}: expected a non-negative integer")]
    InvalidNumber { name: String, value: String },

    #[error("Unknown branch type '{value}' in {name}: expected one of production, development, feature, release, hotfix")]
    UnknownBranchType { name: String, value: String },

    #[error("ALLOW_GROUPS is required when {mode_name} is 'groups'")]
    GroupsRequired { mode_name: String },

    #[error("Failed to read {name} interactively: {reason}")]
    PromptFailed { name: String, reason: String },
}

/// Result type alias for configuration operations.
pub type ConfigurationResult<T> = Result<T, ConfigurationError>;
