//! Errors raised by user sources.

/// Errors that can occur while talking to the identity provider.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The request could not be sent or the response could not be read.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("HTTP error: status {status}: {body}")]
    Http {
        /// Response status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The provider answered with something we could not interpret.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The configured base URL cannot carry path segments.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// The operation needs a user id and the record has none.
    #[error("User record has no id")]
    MissingUserId,

    /// A user source other than the HTTP client failed.
    #[error("Upstream error: {message}")]
    Upstream {
        /// Description of the failure.
        message: String,
    },
}

impl IdentityError {
    /// Whether the provider reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Http { status: 404, .. })
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }
}

/// Result alias for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;
