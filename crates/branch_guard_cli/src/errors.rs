use branch_guard_core::BranchGuardError;
use config_manager::ConfigurationError;
use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Exit status when no repository failed totally.
pub const EXIT_OK: i32 = 0;

/// Exit status when at least one repository could not be processed.
pub const EXIT_REPOSITORY_FAILED: i32 = 1;

/// Exit status for invalid or incomplete configuration.
pub const EXIT_CONFIGURATION: i32 = 2;

/// Exit status after Ctrl-C.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Errors that can occur in the branch-guard CLI application.
///
/// Each variant maps to a process exit status through [`Error::exit_code`].
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration could not be resolved.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigurationError),

    /// The Bitbucket client could not be built from the configuration.
    ///
    /// Usually an unparsable BITBUCKET_API_URL or BITBUCKET_LEGACY_API_URL.
    #[error("Failed to create Bitbucket client: {0}")]
    Client(#[source] bitbucket_client::Error),

    /// The run stopped before or between repositories.
    #[error(transparent)]
    Run(#[from] BranchGuardError),

    /// The run task ended without producing a result.
    #[error("Run aborted: {0}")]
    Aborted(String),

    /// The user pressed Ctrl-C.
    #[error("Interrupted")]
    Interrupted,
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::Client(_) => EXIT_CONFIGURATION,
            Error::Run(BranchGuardError::Configuration(_))
            | Error::Run(BranchGuardError::UnknownGroups { .. })
            | Error::Run(BranchGuardError::Confirmation(_)) => EXIT_CONFIGURATION,
            Error::Run(BranchGuardError::RepositoryListing { .. }) | Error::Aborted(_) => {
                EXIT_REPOSITORY_FAILED
            }
            Error::Interrupted => EXIT_INTERRUPTED,
        }
    }
}
