//! GitHub transport error types.

use thiserror::Error;

/// Errors that can occur while talking to the GitHub GraphQL API.
#[derive(Debug, Error)]
pub enum GithubError {
    /// The API rejected our credentials outright. Never retried.
    #[error("unauthorized: set the GITHUB_TOKEN environment variable to a valid token")]
    Unauthorized,

    /// HTTP transport error from the underlying client.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A retryable status (403/502) kept failing until the attempt budget ran out.
    #[error("gave up after {attempts} attempts, last status {status}")]
    RetriesExhausted {
        /// Last HTTP status observed.
        status: u16,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The API returned a non-success status we do not retry.
    #[error("API error ({status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if readable.
        message: String,
    },

    /// An upstream error the user can fix themselves (e.g. token scopes).
    #[error("{hint} {message}")]
    TokenScope {
        /// What the user should do about it.
        hint: &'static str,
        /// The upstream error message.
        message: String,
    },

    /// Any other error reported in the response's `errors` list.
    #[error("GraphQL error: {0}")]
    Query(String),

    /// The response carried a `data` key whose value was null.
    #[error("GraphQL query returned null")]
    NullData,

    /// No `pageInfo`-bearing object anywhere in the response. Usually means
    /// the token lacks permission to see the queried data at all.
    #[error("query returned no paginated data, you may need more permissions in your token: {synopsis}")]
    NoPagination {
        /// One-line synopsis of the offending query.
        synopsis: String,
    },

    /// A query document referenced a fragment that does not exist.
    #[error("unknown GraphQL document: {0}")]
    Compose(String),

    /// The response body was not valid JSON.
    #[error("bad response body: {0}")]
    BadBody(#[from] serde_json::Error),
}
