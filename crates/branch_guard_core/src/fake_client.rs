//! In-memory `RestrictionClient` used by the reconciler and runner tests.

use async_trait::async_trait;
use bitbucket_client::{
    BranchRestriction, Error, Group, GroupPermission, GroupRef, NewBranchRestriction, Repository,
    RestrictionClient, RestrictionKind,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Comparable view of a stored rule: (kind, pattern, group slugs, value).
pub type RuleShape = (String, String, Vec<String>, Option<u32>);

#[derive(Default)]
struct State {
    repositories: Vec<String>,
    groups: Vec<String>,
    rules: HashMap<String, Vec<BranchRestriction>>,
    permissions: HashMap<String, Vec<String>>,
    next_id: u64,
    unreachable: HashSet<String>,
    rejected_kinds: HashSet<String>,
    undeletable: HashSet<u64>,
    fail_repository_listing: bool,
    fail_group_listing: bool,
    fail_grants: bool,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct FakeClient {
    state: Mutex<State>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_repository(&self, slug: &str) {
        let mut state = self.state.lock().unwrap();
        state.repositories.push(slug.to_string());
        state.rules.entry(slug.to_string()).or_default();
    }

    pub fn add_group(&self, slug: &str) {
        self.state.lock().unwrap().groups.push(slug.to_string());
    }

    /// Stores a pre-existing rule and returns its id.
    pub fn add_rule(&self, repo: &str, kind: RestrictionKind, pattern: &str) -> u64 {
        self.add_rule_with_groups(repo, kind, pattern, &[])
    }

    pub fn add_rule_with_groups(
        &self,
        repo: &str,
        kind: RestrictionKind,
        pattern: &str,
        groups: &[&str],
    ) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.rules.entry(repo.to_string()).or_default().push(BranchRestriction {
            id,
            kind,
            branch_match_kind: Some("glob".to_string()),
            pattern: Some(pattern.to_string()),
            branch_type: None,
            groups: groups.iter().map(|g| GroupRef::from_slug(*g)).collect(),
            users: Vec::new(),
            value: None,
        });
        id
    }

    pub fn grant(&self, repo: &str, group: &str) {
        self.state
            .lock()
            .unwrap()
            .permissions
            .entry(repo.to_string())
            .or_default()
            .push(group.to_string());
    }

    /// Every call touching `repo` fails with a transport error.
    pub fn make_unreachable(&self, repo: &str) {
        self.state.lock().unwrap().unreachable.insert(repo.to_string());
    }

    /// Creating rules of `kind` is rejected with 403.
    pub fn reject_kind(&self, kind: RestrictionKind) {
        self.state
            .lock()
            .unwrap()
            .rejected_kinds
            .insert(kind.as_str().to_string());
    }

    pub fn make_undeletable(&self, id: u64) {
        self.state.lock().unwrap().undeletable.insert(id);
    }

    pub fn fail_repository_listing(&self) {
        self.state.lock().unwrap().fail_repository_listing = true;
    }

    pub fn fail_group_listing(&self) {
        self.state.lock().unwrap().fail_group_listing = true;
    }

    pub fn fail_grants(&self) {
        self.state.lock().unwrap().fail_grants = true;
    }

    pub fn rules(&self, repo: &str) -> Vec<BranchRestriction> {
        self.state
            .lock()
            .unwrap()
            .rules
            .get(repo)
            .cloned()
            .unwrap_or_default()
    }

    /// Stored rules without ids, sorted, for comparing rule sets.
    pub fn rule_shapes(&self, repo: &str) -> Vec<RuleShape> {
        let mut shapes: Vec<RuleShape> = self
            .rules(repo)
            .iter()
            .map(|r| {
                (
                    r.kind.as_str().to_string(),
                    r.pattern.clone().unwrap_or_default(),
                    r.group_slugs().iter().map(|s| s.to_string()).collect(),
                    r.value,
                )
            })
            .collect();
        shapes.sort();
        shapes
    }

    pub fn permissions(&self, repo: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .permissions
            .get(repo)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn check_reachable(&self, repo: &str) -> Result<(), Error> {
        if self.state.lock().unwrap().unreachable.contains(repo) {
            return Err(Error::Transport(format!("connection to {} refused", repo)));
        }
        Ok(())
    }
}

#[async_trait]
impl RestrictionClient for FakeClient {
    async fn list_repositories(&self, workspace: &str) -> Result<Vec<Repository>, Error> {
        self.record(format!("list_repositories {}", workspace));
        let state = self.state.lock().unwrap();
        if state.fail_repository_listing {
            return Err(Error::AuthError("bad credentials".to_string()));
        }
        Ok(state
            .repositories
            .iter()
            .map(|slug| Repository {
                slug: slug.clone(),
                name: Some(slug.clone()),
                full_name: Some(format!("{}/{}", workspace, slug)),
            })
            .collect())
    }

    async fn list_groups(&self, workspace: &str) -> Result<Vec<Group>, Error> {
        self.record(format!("list_groups {}", workspace));
        let state = self.state.lock().unwrap();
        if state.fail_group_listing {
            return Err(Error::ApiError {
                status: 500,
                message: "groups unavailable".to_string(),
            });
        }
        Ok(state
            .groups
            .iter()
            .map(|slug| Group {
                slug: slug.clone(),
                name: None,
            })
            .collect())
    }

    async fn list_branch_restrictions(
        &self,
        _workspace: &str,
        repo: &str,
    ) -> Result<Vec<BranchRestriction>, Error> {
        self.record(format!("list_branch_restrictions {}", repo));
        self.check_reachable(repo)?;
        self.state
            .lock()
            .unwrap()
            .rules
            .get(repo)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("repository {}", repo)))
    }

    async fn create_branch_restriction(
        &self,
        _workspace: &str,
        repo: &str,
        rule: &NewBranchRestriction,
    ) -> Result<BranchRestriction, Error> {
        self.record(format!("create {} {} {}", repo, rule.kind, rule.pattern));
        self.check_reachable(repo)?;
        let mut state = self.state.lock().unwrap();
        if state.rejected_kinds.contains(rule.kind.as_str()) {
            return Err(Error::Forbidden(format!("{} requires Premium", rule.kind)));
        }
        state.next_id += 1;
        let created = BranchRestriction {
            id: state.next_id,
            kind: rule.kind.clone(),
            branch_match_kind: Some(rule.branch_match_kind.clone()),
            pattern: Some(rule.pattern.clone()),
            branch_type: None,
            groups: rule.groups.clone().unwrap_or_default(),
            users: rule.users.clone().unwrap_or_default(),
            value: rule.value,
        };
        state
            .rules
            .entry(repo.to_string())
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn update_branch_restriction(
        &self,
        _workspace: &str,
        repo: &str,
        restriction_id: u64,
        rule: &NewBranchRestriction,
    ) -> Result<BranchRestriction, Error> {
        self.record(format!("update {} {}", repo, restriction_id));
        self.check_reachable(repo)?;
        let mut state = self.state.lock().unwrap();
        if state.rejected_kinds.contains(rule.kind.as_str()) {
            return Err(Error::Forbidden(format!("{} requires Premium", rule.kind)));
        }
        let stored = state
            .rules
            .entry(repo.to_string())
            .or_default()
            .iter_mut()
            .find(|r| r.id == restriction_id)
            .ok_or_else(|| Error::NotFound(format!("restriction {}", restriction_id)))?;
        stored.kind = rule.kind.clone();
        stored.branch_match_kind = Some(rule.branch_match_kind.clone());
        stored.pattern = Some(rule.pattern.clone());
        stored.groups = rule.groups.clone().unwrap_or_default();
        stored.users = rule.users.clone().unwrap_or_default();
        stored.value = rule.value;
        Ok(stored.clone())
    }

    async fn delete_branch_restriction(
        &self,
        _workspace: &str,
        repo: &str,
        restriction_id: u64,
    ) -> Result<(), Error> {
        self.record(format!("delete {} {}", repo, restriction_id));
        self.check_reachable(repo)?;
        let mut state = self.state.lock().unwrap();
        if state.undeletable.contains(&restriction_id) {
            return Err(Error::ApiError {
                status: 500,
                message: "delete failed".to_string(),
            });
        }
        let rules = state.rules.entry(repo.to_string()).or_default();
        let before = rules.len();
        rules.retain(|r| r.id != restriction_id);
        if rules.len() == before {
            return Err(Error::NotFound(format!("restriction {}", restriction_id)));
        }
        Ok(())
    }

    async fn list_repository_group_permissions(
        &self,
        _workspace: &str,
        repo: &str,
    ) -> Result<Vec<GroupPermission>, Error> {
        self.record(format!("list_permissions {}", repo));
        self.check_reachable(repo)?;
        Ok(self
            .permissions(repo)
            .into_iter()
            .map(|slug| GroupPermission {
                permission: "write".to_string(),
                group: GroupRef::from_slug(slug),
            })
            .collect())
    }

    async fn grant_repository_group_permission(
        &self,
        _workspace: &str,
        repo: &str,
        group_slug: &str,
        permission: &str,
    ) -> Result<(), Error> {
        self.record(format!("grant {} {} {}", repo, group_slug, permission));
        self.check_reachable(repo)?;
        if self.state.lock().unwrap().fail_grants {
            return Err(Error::Forbidden("admin permission required".to_string()));
        }
        self.grant(repo, group_slug);
        Ok(())
    }
}
