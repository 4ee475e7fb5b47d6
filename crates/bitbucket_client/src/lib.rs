//! Crate for interacting with the Bitbucket Cloud REST API.
//!
//! This crate provides an authenticated client for the parts of the Bitbucket
//! API needed to manage branch restrictions across a workspace: listing
//! repositories and groups, listing, creating, updating and deleting branch
//! restrictions, and granting groups access to repositories.
//!
//! Business logic depends on the [`RestrictionClient`] trait; [`BitbucketClient`]
//! is the HTTP implementation.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub mod errors;
pub use errors::Error;

pub mod models;
pub use models::{
    BranchRestriction, Group, GroupPermission, GroupRef, NewBranchRestriction, Repository,
    RestrictionKind,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Default base URL of the Bitbucket Cloud 2.0 API.
pub const DEFAULT_API_BASE: &str = "https://api.bitbucket.org/2.0";

/// Default base URL of the legacy 1.0 API, which still serves workspace groups.
pub const DEFAULT_LEGACY_API_BASE: &str = "https://api.bitbucket.org/1.0";

/// Page size requested for every paginated listing.
pub const PAGE_LENGTH: u32 = 100;

/// Maximum number of response body characters kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 400;

/// Tunables for the HTTP client.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Base URL of the 2.0 API
    pub api_base: String,

    /// Base URL of the 1.0 API (group listing)
    pub legacy_api_base: String,

    /// Total attempts for a request answered with HTTP 429
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on every further retry
    pub initial_backoff: Duration,

    /// Upper bound for a server-provided `Retry-After` delay
    pub max_retry_after: Duration,

    /// Delay after every mutating request
    pub pacing: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            legacy_api_base: DEFAULT_LEGACY_API_BASE.to_string(),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_retry_after: Duration::from_secs(60),
            pacing: Duration::from_millis(120),
        }
    }
}

/// A client for the Bitbucket Cloud API, authenticated with an Atlassian
/// account email and API token (HTTP basic auth).
pub struct BitbucketClient {
    http: reqwest::Client,
    api_base: Url,
    legacy_api_base: Url,
    email: String,
    token: SecretString,
    settings: ClientSettings,
}

impl std::fmt::Debug for BitbucketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitbucketClient")
            .field("api_base", &self.api_base.as_str())
            .field("legacy_api_base", &self.legacy_api_base.as_str())
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl BitbucketClient {
    /// Creates a new client.
    ///
    /// # Arguments
    ///
    /// * `email` - The Atlassian account email used as the basic auth user name.
    /// * `token` - The Atlassian API token used as the basic auth password.
    /// * `settings` - Base URLs, retry and pacing configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if a base URL cannot be parsed and
    /// `Error::Transport` if the HTTP client cannot be built.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use bitbucket_client::{BitbucketClient, ClientSettings};
    /// use secrecy::SecretString;
    ///
    /// let client = BitbucketClient::new(
    ///     "jane@example.com",
    ///     SecretString::from("api-token".to_string()),
    ///     ClientSettings::default(),
    /// )
    /// .unwrap();
    /// ```
    pub fn new(
        email: impl Into<String>,
        token: SecretString,
        settings: ClientSettings,
    ) -> Result<Self, Error> {
        let api_base = parse_base(&settings.api_base)?;
        let legacy_api_base = parse_base(&settings.legacy_api_base)?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("branch-guard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_base,
            legacy_api_base,
            email: email.into(),
            token,
            settings,
        })
    }

    /// Builds an endpoint URL below `base` from raw path segments.
    ///
    /// Segments are percent-encoded, so slugs can be passed through as-is.
    fn endpoint(&self, base: &Url, segments: &[&str]) -> Result<Url, Error> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(format!("{} cannot be a base URL", base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn paged_endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.endpoint(&self.api_base, segments)?;
        url.query_pairs_mut()
            .append_pair("pagelen", &PAGE_LENGTH.to_string());
        Ok(url)
    }

    /// Sends a request, retrying while Bitbucket answers HTTP 429.
    ///
    /// `build` is called once per attempt because a `RequestBuilder` cannot be reused.
    async fn send<F>(&self, label: &str, build: F) -> Result<Response, Error>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let response = build()
                .basic_auth(&self.email, Some(self.token.expose_secret()))
                .header(ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| Error::Transport(e.to_string()))?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                debug!(
                    operation = label,
                    status = response.status().as_u16(),
                    "Received response"
                );
                return Ok(response);
            }

            if attempt >= self.settings.max_attempts {
                warn!(
                    operation = label,
                    attempts = attempt,
                    "Rate limit still exceeded after all attempts"
                );
                return Err(Error::RateLimitExceeded);
            }

            let delay = retry_after(&response, self.settings.max_retry_after)
                .unwrap_or_else(|| {
                    self.settings
                        .initial_backoff
                        .saturating_mul(2u32.saturating_pow(attempt - 1))
                });
            warn!(
                operation = label,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                "Rate limited by Bitbucket, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn pace(&self) {
        if !self.settings.pacing.is_zero() {
            tokio::time::sleep(self.settings.pacing).await;
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response, label: &str) -> Result<T, Error> {
        let response = check_status(response, label).await?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Collects every item of a paginated listing by following `next` links.
    async fn get_all_pages<T: DeserializeOwned>(&self, first: Url, label: &str) -> Result<Vec<T>, Error> {
        let mut items = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next.take() {
            let response = self.send(label, || self.http.get(url.clone())).await?;
            let page: models::Page<T> = self.read_json(response, label).await?;
            items.extend(page.values);

            next = match page.next {
                Some(link) => Some(
                    Url::parse(&link)
                        .map_err(|e| Error::InvalidUrl(format!("{}: {}", link, e)))?,
                ),
                None => None,
            };
        }

        Ok(items)
    }
}

#[async_trait]
impl RestrictionClient for BitbucketClient {
    #[instrument(skip(self))]
    async fn list_repositories(&self, workspace: &str) -> Result<Vec<Repository>, Error> {
        let url = self.paged_endpoint(&["repositories", workspace])?;
        let repositories: Vec<Repository> = self.get_all_pages(url, "list repositories").await?;

        info!(
            workspace = workspace,
            count = repositories.len(),
            "Retrieved repositories"
        );
        Ok(repositories)
    }

    #[instrument(skip(self))]
    async fn list_groups(&self, workspace: &str) -> Result<Vec<Group>, Error> {
        let url = self.endpoint(&self.legacy_api_base, &["groups", workspace])?;
        let response = self
            .send("list groups", || self.http.get(url.clone()))
            .await?;
        let groups: Vec<Group> = self.read_json(response, "list groups").await?;

        info!(
            workspace = workspace,
            count = groups.len(),
            "Retrieved workspace groups"
        );
        Ok(groups)
    }

    #[instrument(skip(self))]
    async fn list_branch_restrictions(
        &self,
        workspace: &str,
        repo: &str,
    ) -> Result<Vec<BranchRestriction>, Error> {
        let url = self.paged_endpoint(&["repositories", workspace, repo, "branch-restrictions"])?;
        let restrictions: Vec<BranchRestriction> =
            self.get_all_pages(url, "list branch restrictions").await?;

        debug!(
            repo = repo,
            count = restrictions.len(),
            "Retrieved branch restrictions"
        );
        Ok(restrictions)
    }

    #[instrument(skip(self, rule), fields(kind = %rule.kind, pattern = %rule.pattern))]
    async fn create_branch_restriction(
        &self,
        workspace: &str,
        repo: &str,
        rule: &NewBranchRestriction,
    ) -> Result<BranchRestriction, Error> {
        let url = self.endpoint(
            &self.api_base,
            &["repositories", workspace, repo, "branch-restrictions"],
        )?;
        let response = self
            .send("create branch restriction", || {
                self.http.post(url.clone()).json(rule)
            })
            .await;
        self.pace().await;

        let created: BranchRestriction = self
            .read_json(response?, "create branch restriction")
            .await?;
        info!(
            repo = repo,
            id = created.id,
            kind = %created.kind,
            "Created branch restriction"
        );
        Ok(created)
    }

    #[instrument(skip(self, rule), fields(kind = %rule.kind, pattern = %rule.pattern))]
    async fn update_branch_restriction(
        &self,
        workspace: &str,
        repo: &str,
        restriction_id: u64,
        rule: &NewBranchRestriction,
    ) -> Result<BranchRestriction, Error> {
        let id = restriction_id.to_string();
        let url = self.endpoint(
            &self.api_base,
            &["repositories", workspace, repo, "branch-restrictions", &id],
        )?;
        let response = self
            .send("update branch restriction", || {
                self.http.put(url.clone()).json(rule)
            })
            .await;
        self.pace().await;

        let updated: BranchRestriction = self
            .read_json(response?, "update branch restriction")
            .await?;
        info!(
            repo = repo,
            id = updated.id,
            kind = %updated.kind,
            "Updated branch restriction"
        );
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete_branch_restriction(
        &self,
        workspace: &str,
        repo: &str,
        restriction_id: u64,
    ) -> Result<(), Error> {
        let id = restriction_id.to_string();
        let url = self.endpoint(
            &self.api_base,
            &["repositories", workspace, repo, "branch-restrictions", &id],
        )?;
        let response = self
            .send("delete branch restriction", || self.http.delete(url.clone()))
            .await;
        self.pace().await;

        check_status(response?, "delete branch restriction").await?;
        info!(repo = repo, id = restriction_id, "Deleted branch restriction");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_repository_group_permissions(
        &self,
        workspace: &str,
        repo: &str,
    ) -> Result<Vec<GroupPermission>, Error> {
        let url =
            self.paged_endpoint(&["repositories", workspace, repo, "permissions-config", "groups"])?;
        self.get_all_pages(url, "list repository group permissions")
            .await
    }

    #[instrument(skip(self))]
    async fn grant_repository_group_permission(
        &self,
        workspace: &str,
        repo: &str,
        group_slug: &str,
        permission: &str,
    ) -> Result<(), Error> {
        let url = self.endpoint(
            &self.api_base,
            &[
                "repositories",
                workspace,
                repo,
                "permissions-config",
                "groups",
                group_slug,
            ],
        )?;
        let body = serde_json::json!({ "permission": permission });
        let response = self
            .send("grant repository group permission", || {
                self.http.put(url.clone()).json(&body)
            })
            .await;
        self.pace().await;

        let response = response?;
        if response.status() == StatusCode::CONFLICT {
            info!(
                repo = repo,
                group = group_slug,
                "Group already has a permission on the repository"
            );
            return Ok(());
        }

        check_status(response, "grant repository group permission").await?;
        info!(
            repo = repo,
            group = group_slug,
            permission = permission,
            "Granted group permission on repository"
        );
        Ok(())
    }
}

/// Operations on workspace repositories and their branch restrictions.
///
/// All methods take the workspace slug and, where relevant, the repository
/// slug exactly as they appear in Bitbucket URLs.
#[async_trait]
pub trait RestrictionClient: Send + Sync {
    /// Lists every repository in the workspace.
    async fn list_repositories(&self, workspace: &str) -> Result<Vec<Repository>, Error>;

    /// Lists the groups defined in the workspace.
    async fn list_groups(&self, workspace: &str) -> Result<Vec<Group>, Error>;

    /// Lists all branch restrictions of a repository.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the workspace or repository does not exist.
    async fn list_branch_restrictions(
        &self,
        workspace: &str,
        repo: &str,
    ) -> Result<Vec<BranchRestriction>, Error>;

    /// Creates a branch restriction and returns it as stored by the server.
    async fn create_branch_restriction(
        &self,
        workspace: &str,
        repo: &str,
        rule: &NewBranchRestriction,
    ) -> Result<BranchRestriction, Error>;

    /// Replaces the contents of an existing branch restriction.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the restriction no longer exists.
    async fn update_branch_restriction(
        &self,
        workspace: &str,
        repo: &str,
        restriction_id: u64,
        rule: &NewBranchRestriction,
    ) -> Result<BranchRestriction, Error>;

    /// Deletes a branch restriction by its server-assigned identifier.
    async fn delete_branch_restriction(
        &self,
        workspace: &str,
        repo: &str,
        restriction_id: u64,
    ) -> Result<(), Error>;

    /// Lists the explicit group permissions of a repository.
    async fn list_repository_group_permissions(
        &self,
        workspace: &str,
        repo: &str,
    ) -> Result<Vec<GroupPermission>, Error>;

    /// Grants a workspace group a permission (`read`, `write`, `admin`) on a repository.
    ///
    /// A group that already holds a permission is not an error.
    async fn grant_repository_group_permission(
        &self,
        workspace: &str,
        repo: &str,
        group_slug: &str,
        permission: &str,
    ) -> Result<(), Error>;
}

fn parse_base(raw: &str) -> Result<Url, Error> {
    let url = Url::parse(raw.trim()).map_err(|e| Error::InvalidUrl(format!("{}: {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(Error::InvalidUrl(format!("{} cannot be a base URL", raw)));
    }
    Ok(url)
}

/// Delay requested by a `Retry-After` header in seconds, capped at `max`.
fn retry_after(response: &Response, max: Duration) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(|seconds| Duration::from_secs(seconds).min(max))
}

/// Maps non-success statuses to errors, passing successful responses through.
async fn check_status(response: Response, label: &str) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = truncate_body(&body);
    warn!(
        operation = label,
        status = status.as_u16(),
        body = %message,
        "Bitbucket request failed"
    );

    Err(match status {
        StatusCode::UNAUTHORIZED => Error::AuthError(format!("{}: {}", label, message)),
        StatusCode::FORBIDDEN => Error::Forbidden(format!("{}: {}", label, message)),
        StatusCode::NOT_FOUND => Error::NotFound(label.to_string()),
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimitExceeded,
        _ => Error::ApiError {
            status: status.as_u16(),
            message,
        },
    })
}

fn truncate_body(body: &str) -> String {
    body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect()
}
