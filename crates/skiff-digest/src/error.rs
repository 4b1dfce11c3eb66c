//! Digest-level error types.

use thiserror::Error;

/// Errors raised while building a digest.
#[derive(Debug, Error)]
pub enum DigestError {
    /// A configured source was not a recognizable URL or search spec.
    #[error("can't understand source {0:?}")]
    UnrecognizedSource(String),

    /// A cutoff string was not a duration, date, or the `forever` sentinel.
    #[error("can't understand cutoff {0:?}")]
    BadCutoff(String),

    /// Transport or upstream API failure.
    #[error(transparent)]
    Github(#[from] skiff_github::GithubError),

    /// The API returned data we could not map onto the expected shape.
    #[error("unexpected response shape for {context}: {message}")]
    Shape {
        /// What we were deserializing.
        context: &'static str,
        /// The underlying serde error.
        message: String,
    },
}

impl DigestError {
    pub(crate) fn shape(context: &'static str, err: &serde_json::Error) -> Self {
        Self::Shape {
            context,
            message: err.to_string(),
        }
    }
}
