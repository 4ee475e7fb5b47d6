//! Desired branch rules.
//!
//! Turns a [`ResolvedConfig`] and a list of branch patterns into the exact set
//! of restrictions every processed repository should end up with.

use bitbucket_client::{BranchRestriction, NewBranchRestriction, RestrictionKind};
use config_manager::{AccessMode, ResolvedConfig};
use std::fmt;

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;

/// One restriction the reconciler should ensure exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredRule {
    pub pattern: String,
    pub kind: RestrictionKind,

    /// Allowed group slugs; empty means no group is singled out
    pub principals: Vec<String>,

    /// Numeric parameter, only used by approval-count rules
    pub value: Option<u32>,
}

impl DesiredRule {
    fn new(kind: RestrictionKind, pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            kind,
            principals: Vec::new(),
            value: None,
        }
    }

    fn with_principals(mut self, principals: &[String]) -> Self {
        self.principals = principals.to_vec();
        self
    }

    /// Whether `existing` targets the same kind and glob pattern as this rule.
    pub fn targets_same_branches(&self, existing: &BranchRestriction) -> bool {
        existing.kind == self.kind && existing.glob_pattern() == Some(self.pattern.as_str())
    }

    /// Whether `existing` already enforces exactly this rule.
    ///
    /// Principal-bearing kinds must allow the same groups and no individual users.
    pub fn is_satisfied_by(&self, existing: &BranchRestriction) -> bool {
        if !self.targets_same_branches(existing) || existing.value != self.value {
            return false;
        }
        if !self.kind.takes_principals() {
            return true;
        }

        let mut present = existing.group_slugs();
        present.sort_unstable();
        let mut wanted: Vec<&str> = self.principals.iter().map(String::as_str).collect();
        wanted.sort_unstable();
        existing.users.is_empty() && present == wanted
    }

    /// Creation payload for this rule.
    pub fn to_payload(&self) -> NewBranchRestriction {
        let payload = NewBranchRestriction::glob(self.kind.clone(), self.pattern.clone())
            .with_groups(self.principals.clone());
        match self.value {
            Some(value) => payload.with_value(value),
            None => payload,
        }
    }
}

impl fmt::Display for DesiredRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on '{}'", self.kind, self.pattern)?;
        if !self.principals.is_empty() {
            write!(f, " (groups: {})", self.principals.join(", "))?;
        }
        if let Some(value) = self.value {
            write!(f, " (value: {})", value)?;
        }
        Ok(())
    }
}

/// Builds the desired rules for every pattern, in pattern order.
///
/// Per pattern the rules are, in order:
/// 1. `push`, allowed for the write-access principals
/// 2. `restrict_merges`, allowed for the merge-access principals
/// 3. `delete`, unless branch deletion is allowed
/// 4. `enforce_merge_checks`, when enabled
/// 5. `reset_pullrequest_approvals_on_change`, when explicitly enabled
/// 6. `force`, when force pushes are prevented
/// 7. `require_approvals_to_merge`, when a non-zero count is configured
/// 8. `reset_pullrequest_changes_requested_on_change`, when enabled
pub fn build_desired_rules(config: &ResolvedConfig, patterns: &[String]) -> Vec<DesiredRule> {
    let write_principals = config.principals_for(config.write_access);
    let merge_principals = config.principals_for(config.merge_access);

    let mut rules = Vec::new();
    for pattern in patterns {
        rules.push(DesiredRule::new(RestrictionKind::Push, pattern).with_principals(write_principals));
        rules.push(
            DesiredRule::new(RestrictionKind::RestrictMerges, pattern)
                .with_principals(merge_principals),
        );

        if !config.allow_branch_delete {
            rules.push(DesiredRule::new(RestrictionKind::Delete, pattern));
        }
        if config.enforce_merge_checks {
            rules.push(DesiredRule::new(RestrictionKind::EnforceMergeChecks, pattern));
        }
        if config.reset_approvals_on_change == Some(true) {
            rules.push(DesiredRule::new(RestrictionKind::ResetApprovalsOnChange, pattern));
        }
        if config.prevent_force_push {
            rules.push(DesiredRule::new(RestrictionKind::Force, pattern));
        }
        if let Some(count) = config.required_approvals.filter(|n| *n > 0) {
            let mut rule = DesiredRule::new(RestrictionKind::RequireApprovalsToMerge, pattern);
            rule.value = Some(count);
            rules.push(rule);
        }
        if config.reset_changes_requested_on_change {
            rules.push(DesiredRule::new(
                RestrictionKind::ResetChangesRequestedOnChange,
                pattern,
            ));
        }
    }
    rules
}

/// Human-readable description of the policy about to be applied.
///
/// One line per aspect, logged before any repository is touched.
pub fn describe_policy(config: &ResolvedConfig, patterns: &[String]) -> Vec<String> {
    fn yes_no(flag: bool) -> &'static str {
        if flag {
            "yes"
        } else {
            "no"
        }
    }

    let access = |mode: AccessMode| match mode {
        AccessMode::Everyone => "everyone".to_string(),
        AccessMode::Groups => {
            format!("groups ({})", config.allow_groups.join(", "))
        }
    };

    let mut lines = vec![
        format!("Workspace: {}", config.workspace),
        format!("Branch patterns: {}", patterns.join(", ")),
        if config.repositories.is_empty() {
            "Repositories: all in workspace".to_string()
        } else {
            format!("Repositories: {}", config.repositories.join(", "))
        },
        format!("Write access: {}", access(config.write_access)),
        format!("Merge access: {}", access(config.merge_access)),
        format!("Allow branch deletion: {}", yes_no(config.allow_branch_delete)),
        format!("Enforce merge checks: {}", yes_no(config.enforce_merge_checks)),
        format!(
            "Reset approvals on change: {}",
            match config.reset_approvals_on_change {
                Some(flag) => yes_no(flag),
                None => "not configured",
            }
        ),
    ];

    if config.prevent_force_push {
        lines.push("Prevent force pushes: yes".to_string());
    }
    if let Some(count) = config.required_approvals.filter(|n| *n > 0) {
        lines.push(format!("Required approvals: {}", count));
    }
    if config.reset_changes_requested_on_change {
        lines.push("Reset changes requested on change: yes".to_string());
    }

    lines.push(format!(
        "Existing rules: {}",
        match config.confirm_delete_existing_rules {
            Some(true) => "delete before applying",
            Some(false) => "keep, updating those that differ",
            None => "ask before applying",
        }
    ));
    lines
}
