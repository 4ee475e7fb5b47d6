//! Per-repository reconciliation of branch restrictions.
//!
//! This module provides the [`Reconciler`] component, which brings one
//! repository's branch restrictions in line with a list of [`DesiredRule`]s.

use bitbucket_client::{BranchRestriction, RestrictionClient};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use crate::errors::{Operation, RemoteError, RuleApplyError};
use crate::rules::DesiredRule;

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;

/// Permission granted to ALLOW_GROUPS members on every processed repository.
const GROUP_PERMISSION: &str = "write";

/// What to do with restrictions that already exist in a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingRulePolicy {
    /// Delete every existing restriction, then create all desired rules.
    Replace,
    /// Keep existing restrictions; bring those matching a desired rule's
    /// kind and pattern in line with it and create the missing ones.
    Keep,
}

impl ExistingRulePolicy {
    pub fn from_confirmation(delete_existing: bool) -> Self {
        if delete_existing {
            ExistingRulePolicy::Replace
        } else {
            ExistingRulePolicy::Keep
        }
    }
}

/// Result of reconciling one repository.
#[derive(Debug)]
pub struct RepositoryReport {
    pub repository: String,

    /// Number of existing restrictions deleted
    pub deleted: usize,

    /// Number of restrictions created
    pub created: usize,

    /// Existing restrictions rewritten to match a desired rule
    pub updated: usize,

    /// Desired rules already present and left untouched
    pub skipped: usize,

    /// Groups that received repository access
    pub granted: usize,

    /// Operations that failed; the others were still attempted
    pub failures: Vec<RuleApplyError>,
}

impl RepositoryReport {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            deleted: 0,
            created: 0,
            updated: 0,
            skipped: 0,
            granted: 0,
            failures: Vec::new(),
        }
    }

    /// Returns true if every attempted operation succeeded.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn record_failure(&mut self, operation: Operation, source: bitbucket_client::Error) {
        warn!(
            repository = %self.repository,
            operation = %operation,
            error = %source,
            "Operation failed"
        );
        self.failures.push(RuleApplyError {
            repository: self.repository.clone(),
            operation,
            source,
        });
    }
}

/// Applies desired rules to repositories of one workspace.
///
/// # Behavior
///
/// 1. Reads the repository's existing restrictions. Failure here aborts
///    the repository with a [`RemoteError`]; nothing was changed.
/// 2. Makes sure every allowed group holds repository access.
/// 3. With [`ExistingRulePolicy::Replace`], deletes every existing
///    restriction. With [`ExistingRulePolicy::Keep`], skips desired rules an
///    existing restriction already enforces exactly, and updates in place a
///    restriction of the same kind and pattern whose groups or value differ.
/// 4. Creates the remaining desired rules in order.
///
/// Individual failures in steps 2 to 4 are recorded in the report and the
/// remaining operations are still attempted.
pub struct Reconciler<'a> {
    client: &'a dyn RestrictionClient,
    workspace: &'a str,
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a dyn RestrictionClient, workspace: &'a str) -> Self {
        Self { client, workspace }
    }

    #[instrument(skip(self, desired, allow_groups), fields(workspace = %self.workspace))]
    pub async fn reconcile(
        &self,
        repository: &str,
        desired: &[DesiredRule],
        policy: ExistingRulePolicy,
        allow_groups: &[String],
    ) -> Result<RepositoryReport, RemoteError> {
        info!(
            rule_count = desired.len(),
            policy = ?policy,
            "Reconciling branch restrictions"
        );

        let existing = self
            .client
            .list_branch_restrictions(self.workspace, repository)
            .await
            .map_err(|source| RemoteError {
                repository: repository.to_string(),
                source,
            })?;
        debug!(count = existing.len(), "Retrieved existing restrictions");

        let mut report = RepositoryReport::new(repository);

        if !allow_groups.is_empty() {
            self.ensure_group_access(&mut report, allow_groups).await;
        }

        let kept: &[BranchRestriction] = match policy {
            ExistingRulePolicy::Replace => {
                self.delete_all(&mut report, &existing).await;
                &[][..]
            }
            ExistingRulePolicy::Keep => existing.as_slice(),
        };

        for rule in desired {
            match plan(rule, kept) {
                Step::Skip => {
                    debug!(rule = %rule, "Rule already present, skipping");
                    report.skipped += 1;
                }
                Step::Update(id) => self.update(&mut report, id, rule).await,
                Step::Create => self.create(&mut report, rule).await,
            }
        }

        info!(
            deleted = report.deleted,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failures.len(),
            "Repository reconciled"
        );
        Ok(report)
    }

    async fn create(&self, report: &mut RepositoryReport, rule: &DesiredRule) {
        let repository = report.repository.clone();
        match self
            .client
            .create_branch_restriction(self.workspace, &repository, &rule.to_payload())
            .await
        {
            Ok(created) => {
                debug!(rule = %rule, id = created.id, "Restriction created");
                report.created += 1;
            }
            Err(e) => report.record_failure(
                Operation::CreateRule {
                    kind: rule.kind.clone(),
                    pattern: rule.pattern.clone(),
                },
                e,
            ),
        }
    }

    async fn update(&self, report: &mut RepositoryReport, id: u64, rule: &DesiredRule) {
        let repository = report.repository.clone();
        match self
            .client
            .update_branch_restriction(self.workspace, &repository, id, &rule.to_payload())
            .await
        {
            Ok(_) => {
                info!(rule = %rule, id = id, "Existing restriction differed, updated");
                report.updated += 1;
            }
            Err(e) => report.record_failure(
                Operation::UpdateRule {
                    id,
                    kind: rule.kind.clone(),
                    pattern: rule.pattern.clone(),
                },
                e,
            ),
        }
    }

    async fn delete_all(&self, report: &mut RepositoryReport, existing: &[BranchRestriction]) {
        let repository = report.repository.clone();
        for rule in existing {
            match self
                .client
                .delete_branch_restriction(self.workspace, &repository, rule.id)
                .await
            {
                Ok(()) => {
                    debug!(id = rule.id, kind = %rule.kind, "Restriction deleted");
                    report.deleted += 1;
                }
                Err(e) => report.record_failure(
                    Operation::DeleteRule {
                        id: rule.id,
                        kind: rule.kind.clone(),
                    },
                    e,
                ),
            }
        }
    }

    async fn ensure_group_access(&self, report: &mut RepositoryReport, groups: &[String]) {
        let repository = report.repository.clone();
        let permissions = match self
            .client
            .list_repository_group_permissions(self.workspace, &repository)
            .await
        {
            Ok(permissions) => permissions,
            Err(e) => {
                report.record_failure(Operation::ListGroupPermissions, e);
                return;
            }
        };

        let holders: HashSet<&str> = permissions.iter().map(|p| p.group.slug.as_str()).collect();
        for group in groups {
            if holders.contains(group.as_str()) {
                continue;
            }
            match self
                .client
                .grant_repository_group_permission(
                    self.workspace,
                    &repository,
                    group,
                    GROUP_PERMISSION,
                )
                .await
            {
                Ok(()) => {
                    info!(group = %group, "Granted repository access to group");
                    report.granted += 1;
                }
                Err(e) => report.record_failure(
                    Operation::GrantGroupAccess {
                        group: group.clone(),
                    },
                    e,
                ),
            }
        }
    }
}

/// What to do for one desired rule.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Skip,
    Update(u64),
    Create,
}

fn plan(rule: &DesiredRule, existing: &[BranchRestriction]) -> Step {
    if existing.iter().any(|r| rule.is_satisfied_by(r)) {
        return Step::Skip;
    }
    match existing.iter().find(|r| rule.targets_same_branches(r)) {
        Some(stale) => Step::Update(stale.id),
        None => Step::Create,
    }
}
