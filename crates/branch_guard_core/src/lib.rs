//! Core reconciliation logic for branch-guard.
//!
//! Given a [`config_manager::ResolvedConfig`] and a
//! [`bitbucket_client::RestrictionClient`], this crate computes the branch
//! restrictions every repository should have and applies them:
//!
//! - [`build_desired_rules`] turns configuration into [`DesiredRule`]s.
//! - [`Reconciler`] applies them to one repository.
//! - [`Runner`] drives a whole workspace and returns a [`RunSummary`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use bitbucket_client::{BitbucketClient, ClientSettings};
//! use branch_guard_core::Runner;
//! use config_manager::{resolve, EnvSource};
//! use secrecy::{ExposeSecret, SecretString};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = resolve(&EnvSource)?;
//! let client = BitbucketClient::new(
//!     config.credentials.email.clone(),
//!     SecretString::from(config.credentials.api_token.expose_secret().to_owned()),
//!     ClientSettings::default(),
//! )?;
//!
//! let summary = Runner::new(&client, &config).run(|_| Ok(false)).await?;
//! println!("{} repositories failed", summary.failed());
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod reconciler;
pub mod rules;
pub mod runner;

#[cfg(test)]
mod fake_client;

pub use errors::{BranchGuardError, Operation, RemoteError, RuleApplyError};
pub use reconciler::{ExistingRulePolicy, Reconciler, RepositoryReport};
pub use rules::{build_desired_rules, describe_policy, DesiredRule};
pub use runner::{RepositoryOutcome, RunSummary, Runner};
