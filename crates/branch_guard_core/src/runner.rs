//! Workspace-wide run orchestration.
//!
//! The [`Runner`] expands the configured branches, validates groups, picks
//! the repositories to process and reconciles them one after another,
//! collecting a [`RunSummary`].

use bitbucket_client::RestrictionClient;
use config_manager::{expand_branch_patterns, ResolvedConfig};
use std::collections::HashSet;
use tracing::{info, instrument, warn};

use crate::errors::{BranchGuardError, RemoteError};
use crate::reconciler::{ExistingRulePolicy, Reconciler, RepositoryReport};
use crate::rules::{build_desired_rules, describe_policy};

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;

/// Final state of one repository.
#[derive(Debug)]
pub enum RepositoryOutcome {
    /// Every operation succeeded.
    Success(RepositoryReport),
    /// Some operations failed; the report lists them.
    Partial(RepositoryReport),
    /// The repository could not be processed at all.
    Failed(RemoteError),
}

impl RepositoryOutcome {
    fn from_result(result: Result<RepositoryReport, RemoteError>) -> Self {
        match result {
            Ok(report) if report.is_success() => RepositoryOutcome::Success(report),
            Ok(report) => RepositoryOutcome::Partial(report),
            Err(e) => RepositoryOutcome::Failed(e),
        }
    }

    pub fn repository(&self) -> &str {
        match self {
            RepositoryOutcome::Success(report) | RepositoryOutcome::Partial(report) => {
                &report.repository
            }
            RepositoryOutcome::Failed(e) => &e.repository,
        }
    }
}

/// Outcome of every repository processed in one run, in processing order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<RepositoryOutcome>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, RepositoryOutcome::Success(_)))
    }

    pub fn partial(&self) -> usize {
        self.count(|o| matches!(o, RepositoryOutcome::Partial(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RepositoryOutcome::Failed(_)))
    }

    /// Returns true unless some repository could not be processed at all.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, predicate: impl Fn(&RepositoryOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(o)).count()
    }
}

/// Applies one resolved configuration to a workspace.
pub struct Runner<'a> {
    client: &'a dyn RestrictionClient,
    config: &'a ResolvedConfig,
}

impl<'a> Runner<'a> {
    pub fn new(client: &'a dyn RestrictionClient, config: &'a ResolvedConfig) -> Self {
        Self { client, config }
    }

    /// Runs the reconciliation over every selected repository.
    ///
    /// `confirm_delete` is called at most once, with the number of
    /// repositories about to be processed, when the configuration leaves the
    /// treatment of existing rules open.
    ///
    /// # Errors
    ///
    /// Fails before touching any repository when ALLOW_GROUPS names a group
    /// the workspace does not have, when the repository listing fails, or
    /// when `confirm_delete` fails. Per-repository failures are reported in
    /// the returned [`RunSummary`] instead.
    #[instrument(skip(self, confirm_delete), fields(workspace = %self.config.workspace))]
    pub async fn run<F>(&self, confirm_delete: F) -> Result<RunSummary, BranchGuardError>
    where
        F: FnOnce(usize) -> Result<bool, BranchGuardError>,
    {
        let config = self.config;
        let patterns = expand_branch_patterns(&config.branches);
        for line in describe_policy(config, &patterns) {
            info!("{}", line);
        }

        if !config.allow_groups.is_empty() {
            self.validate_groups().await?;
        }

        let repositories = self.select_repositories().await?;
        if repositories.is_empty() {
            warn!("No repositories to process");
            return Ok(RunSummary::default());
        }

        let delete_existing = match config.confirm_delete_existing_rules {
            Some(answer) => answer,
            None => confirm_delete(repositories.len())?,
        };
        let policy = ExistingRulePolicy::from_confirmation(delete_existing);
        let desired = build_desired_rules(config, &patterns);
        info!(
            repositories = repositories.len(),
            rules_per_repository = desired.len(),
            policy = ?policy,
            "Starting reconciliation"
        );

        let reconciler = Reconciler::new(self.client, &config.workspace);
        let mut summary = RunSummary::default();
        for repository in &repositories {
            let result = reconciler
                .reconcile(repository, &desired, policy, &config.allow_groups)
                .await;
            if let Err(e) = &result {
                warn!(repository = %repository, error = %e, "Repository failed");
            }
            summary.outcomes.push(RepositoryOutcome::from_result(result));
        }

        info!(
            succeeded = summary.succeeded(),
            partial = summary.partial(),
            failed = summary.failed(),
            "Run complete"
        );
        Ok(summary)
    }

    async fn validate_groups(&self) -> Result<(), BranchGuardError> {
        let workspace = &self.config.workspace;
        let known = match self.client.list_groups(workspace).await {
            Ok(groups) => groups,
            Err(e) => {
                warn!(error = %e, "Could not list workspace groups, continuing without validation");
                return Ok(());
            }
        };

        let known: HashSet<&str> = known.iter().map(|g| g.slug.as_str()).collect();
        let unknown: Vec<String> = self
            .config
            .allow_groups
            .iter()
            .filter(|g| !known.contains(g.as_str()))
            .cloned()
            .collect();

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(BranchGuardError::UnknownGroups {
                workspace: workspace.clone(),
                groups: unknown,
            })
        }
    }

    async fn select_repositories(&self) -> Result<Vec<String>, BranchGuardError> {
        if !self.config.repositories.is_empty() {
            return Ok(self.config.repositories.clone());
        }

        let workspace = &self.config.workspace;
        let repositories = self
            .client
            .list_repositories(workspace)
            .await
            .map_err(|source| BranchGuardError::RepositoryListing {
                workspace: workspace.clone(),
                source,
            })?;
        info!(count = repositories.len(), "Listed workspace repositories");
        Ok(repositories.into_iter().map(|r| r.slug).collect())
    }
}
