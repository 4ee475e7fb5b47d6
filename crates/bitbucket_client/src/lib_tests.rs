//! Unit tests for the bitbucket_client crate.

use super::*;
use serde_json::json;
use wiremock::matchers::{basic_auth, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// --- Test Constants ---
const TEST_EMAIL: &str = "jane@example.com";
const TEST_TOKEN: &str = "test-token";
const WORKSPACE: &str = "acme";

fn create_test_client(mock_server: &MockServer) -> BitbucketClient {
    let settings = ClientSettings {
        api_base: mock_server.uri(),
        legacy_api_base: format!("{}/1.0", mock_server.uri()),
        max_attempts: 3,
        initial_backoff: Duration::ZERO,
        max_retry_after: Duration::from_millis(20),
        pacing: Duration::ZERO,
    };
    BitbucketClient::new(
        TEST_EMAIL,
        SecretString::from(TEST_TOKEN.to_string()),
        settings,
    )
    .expect("Failed to create client")
}

#[tokio::test]
async fn test_list_repositories_follows_next_links() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/repositories/{WORKSPACE}")))
        .and(query_param("pagelen", "100"))
        .and(basic_auth(TEST_EMAIL, TEST_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [{"slug": "repo-a", "name": "Repo A"}],
            "next": format!("{}/repositories/{WORKSPACE}?pagelen=100&page=2", mock_server.uri())
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/repositories/{WORKSPACE}")))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [{"slug": "repo-b"}]
        })))
        .with_priority(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let repositories = client
        .list_repositories(WORKSPACE)
        .await
        .expect("Failed to list repositories");

    let slugs: Vec<&str> = repositories.iter().map(|r| r.slug.as_str()).collect();
    assert_eq!(slugs, vec!["repo-a", "repo-b"]);
}

#[tokio::test]
async fn test_list_repositories_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/repositories/{WORKSPACE}")))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid credentials"))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client.list_repositories(WORKSPACE).await;

    match result {
        Err(Error::AuthError(msg)) => assert!(msg.contains("Invalid credentials")),
        other => panic!("Expected AuthError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_list_groups_uses_legacy_api() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/1.0/groups/{WORKSPACE}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"slug": "developers", "name": "Developers"},
            {"slug": "release-managers", "name": "Release managers"}
        ])))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let groups = client.list_groups(WORKSPACE).await.expect("list groups");

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[1].slug, "release-managers");
}

#[tokio::test]
async fn test_list_branch_restrictions_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/repositories/{WORKSPACE}/missing/branch-restrictions")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "type": "error",
            "error": {"message": "Repository acme/missing not found"}
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client.list_branch_restrictions(WORKSPACE, "missing").await;

    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_list_branch_restrictions_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/repositories/{WORKSPACE}/api/branch-restrictions")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pagelen": 100,
            "values": [
                {"id": 1, "kind": "push", "branch_match_kind": "glob", "pattern": "main", "users": [], "groups": []},
                {"id": 2, "kind": "require_passing_builds_to_merge", "branch_match_kind": "glob", "pattern": "main", "value": 1}
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let restrictions = client
        .list_branch_restrictions(WORKSPACE, "api")
        .await
        .expect("list restrictions");

    assert_eq!(restrictions.len(), 2);
    assert_eq!(restrictions[0].kind, RestrictionKind::Push);
    assert_eq!(
        restrictions[1].kind,
        RestrictionKind::Other("require_passing_builds_to_merge".to_string())
    );
}

#[tokio::test]
async fn test_create_branch_restriction_sends_payload() {
    let mock_server = MockServer::start().await;
    let rule = NewBranchRestriction::glob(RestrictionKind::Push, "release/*")
        .with_groups(vec!["release-managers".to_string()]);

    Mock::given(method("POST"))
        .and(path(format!("/repositories/{WORKSPACE}/api/branch-restrictions")))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "kind": "push",
            "branch_match_kind": "glob",
            "pattern": "release/*",
            "users": [],
            "groups": [{"slug": "release-managers"}]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 42,
            "kind": "push",
            "branch_match_kind": "glob",
            "pattern": "release/*",
            "users": [],
            "groups": [{"slug": "release-managers", "name": "Release managers"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let created = client
        .create_branch_restriction(WORKSPACE, "api", &rule)
        .await
        .expect("create restriction");

    assert_eq!(created.id, 42);
    assert_eq!(created.group_slugs(), vec!["release-managers"]);
}

#[tokio::test]
async fn test_create_branch_restriction_forbidden_keeps_body() {
    let mock_server = MockServer::start().await;
    let rule = NewBranchRestriction::glob(RestrictionKind::EnforceMergeChecks, "main");

    Mock::given(method("POST"))
        .and(path(format!("/repositories/{WORKSPACE}/api/branch-restrictions")))
        .respond_with(
            ResponseTemplate::new(403).set_body_string("Merge checks require a Premium plan"),
        )
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client.create_branch_restriction(WORKSPACE, "api", &rule).await;

    match result {
        Err(Error::Forbidden(msg)) => assert!(msg.contains("Premium plan")),
        other => panic!("Expected Forbidden, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_branch_restriction_retries_after_rate_limit() {
    let mock_server = MockServer::start().await;
    let rule = NewBranchRestriction::glob(RestrictionKind::Delete, "main");

    Mock::given(method("POST"))
        .and(path(format!("/repositories/{WORKSPACE}/api/branch-restrictions")))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/repositories/{WORKSPACE}/api/branch-restrictions")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 7,
            "kind": "delete",
            "branch_match_kind": "glob",
            "pattern": "main"
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let created = client
        .create_branch_restriction(WORKSPACE, "api", &rule)
        .await
        .expect("create after retry");

    assert_eq!(created.id, 7);
}

#[tokio::test]
async fn test_rate_limit_exhausts_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/repositories/{WORKSPACE}")))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client.list_repositories(WORKSPACE).await;

    assert!(matches!(result, Err(Error::RateLimitExceeded)));
}

#[tokio::test]
async fn test_retry_after_header_is_capped() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/repositories/{WORKSPACE}")))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3600"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        client.list_repositories(WORKSPACE),
    )
    .await
    .expect("retry delay should be capped");

    assert!(matches!(result, Err(Error::RateLimitExceeded)));
}

#[tokio::test]
async fn test_update_branch_restriction_puts_payload() {
    let mock_server = MockServer::start().await;
    let rule = NewBranchRestriction::glob(RestrictionKind::Push, "main")
        .with_groups(vec!["release-managers".to_string()]);

    Mock::given(method("PUT"))
        .and(path(format!("/repositories/{WORKSPACE}/api/branch-restrictions/42")))
        .and(body_json(json!({
            "kind": "push",
            "branch_match_kind": "glob",
            "pattern": "main",
            "users": [],
            "groups": [{"slug": "release-managers"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "kind": "push",
            "branch_match_kind": "glob",
            "pattern": "main",
            "groups": [{"slug": "release-managers"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let updated = client
        .update_branch_restriction(WORKSPACE, "api", 42, &rule)
        .await
        .expect("update restriction");

    assert_eq!(updated.id, 42);
    assert_eq!(updated.group_slugs(), vec!["release-managers"]);
}

#[tokio::test]
async fn test_update_branch_restriction_not_found() {
    let mock_server = MockServer::start().await;
    let rule = NewBranchRestriction::glob(RestrictionKind::Delete, "main");

    Mock::given(method("PUT"))
        .and(path(format!("/repositories/{WORKSPACE}/api/branch-restrictions/9")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client.update_branch_restriction(WORKSPACE, "api", 9, &rule).await;

    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_delete_branch_restriction_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(format!("/repositories/{WORKSPACE}/api/branch-restrictions/42")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client.delete_branch_restriction(WORKSPACE, "api", 42).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_delete_branch_restriction_server_error_is_truncated() {
    let mock_server = MockServer::start().await;
    let long_body = "x".repeat(1000);

    Mock::given(method("DELETE"))
        .and(path(format!("/repositories/{WORKSPACE}/api/branch-restrictions/42")))
        .respond_with(ResponseTemplate::new(500).set_body_string(long_body))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client.delete_branch_restriction(WORKSPACE, "api", 42).await;

    match result {
        Err(Error::ApiError { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message.len(), 400);
        }
        other => panic!("Expected ApiError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_list_repository_group_permissions() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!(
            "/repositories/{WORKSPACE}/api/permissions-config/groups"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [
                {"permission": "write", "group": {"slug": "developers", "name": "Developers"}}
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let permissions = client
        .list_repository_group_permissions(WORKSPACE, "api")
        .await
        .expect("list permissions");

    assert_eq!(permissions.len(), 1);
    assert_eq!(permissions[0].permission, "write");
    assert_eq!(permissions[0].group.slug, "developers");
}

#[tokio::test]
async fn test_grant_repository_group_permission_conflict_is_ok() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(format!(
            "/repositories/{WORKSPACE}/api/permissions-config/groups/developers"
        )))
        .and(body_json(json!({"permission": "write"})))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client
        .grant_repository_group_permission(WORKSPACE, "api", "developers", "write")
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_transport_failure() {
    let settings = ClientSettings {
        // Port 9 (discard) on localhost is not expected to accept HTTP connections.
        api_base: "http://127.0.0.1:9".to_string(),
        pacing: Duration::ZERO,
        initial_backoff: Duration::ZERO,
        ..ClientSettings::default()
    };
    let client = BitbucketClient::new(
        TEST_EMAIL,
        SecretString::from(TEST_TOKEN.to_string()),
        settings,
    )
    .unwrap();

    let result = client.list_repositories(WORKSPACE).await;

    assert!(matches!(result, Err(Error::Transport(_))));
}

#[test]
fn test_new_rejects_invalid_base_url() {
    let settings = ClientSettings {
        api_base: "not a url".to_string(),
        ..ClientSettings::default()
    };

    let result = BitbucketClient::new(
        TEST_EMAIL,
        SecretString::from(TEST_TOKEN.to_string()),
        settings,
    );

    assert!(matches!(result, Err(Error::InvalidUrl(_))));
}

#[test]
fn test_debug_output_does_not_contain_token() {
    let client = BitbucketClient::new(
        TEST_EMAIL,
        SecretString::from(TEST_TOKEN.to_string()),
        ClientSettings::default(),
    )
    .unwrap();

    let debug = format!("{client:?}");
    assert!(debug.contains(TEST_EMAIL));
    assert!(!debug.contains(TEST_TOKEN));
}

#[test]
fn test_endpoint_encodes_segments() {
    let client = BitbucketClient::new(
        TEST_EMAIL,
        SecretString::from(TEST_TOKEN.to_string()),
        ClientSettings::default(),
    )
    .unwrap();

    let url = client
        .endpoint(&client.api_base, &["repositories", "acme", "my repo"])
        .unwrap();

    assert_eq!(
        url.as_str(),
        "https://api.bitbucket.org/2.0/repositories/acme/my%20repo"
    );
}
