//! Error types for Bitbucket client operations.
//!
//! This module defines the error types that can occur when interacting with the
//! Bitbucket Cloud REST API through the bitbucket_client crate.

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors that can occur during Bitbucket client operations.
///
/// Each variant carries enough context to be reported to the user at the end
/// of a run without consulting the logs.
///
/// ## Examples
///
/// ```rust,ignore
/// use bitbucket_client::Error;
///
/// match client.list_branch_restrictions("acme", "api").await {
///     Ok(rules) => println!("{} rules", rules.len()),
///     Err(Error::AuthError(msg)) => eprintln!("Authentication failed: {}", msg),
///     Err(Error::RateLimitExceeded) => eprintln!("Rate limit exceeded, retry later"),
///     Err(err) => eprintln!("Other error: {}", err),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The API request failed with a status the client has no specific mapping for.
    ///
    /// The message holds the (truncated) response body returned by Bitbucket.
    #[error("API request failed with status {status}: {message}")]
    ApiError { status: u16, message: String },

    /// Bitbucket rejected the credentials (HTTP 401).
    ///
    /// Usually means the Atlassian email or API token is wrong or expired.
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Error deserializing the response from Bitbucket.
    #[error("Failed to deserialize Bitbucket response: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The credentials are valid but lack the permission for the operation (HTTP 403).
    ///
    /// Premium-only restriction kinds are also reported this way by Bitbucket.
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// A configured API base URL, or a pagination link, could not be used.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The requested resource was not found (HTTP 404).
    ///
    /// For repository operations this means the workspace or repository does
    /// not exist or is not visible to the authenticated account.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bitbucket kept answering HTTP 429 after all retry attempts.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// The request never produced an HTTP response (DNS, TLS, connection reset, timeout).
    #[error("HTTP transport failure: {0}")]
    Transport(String),
}
