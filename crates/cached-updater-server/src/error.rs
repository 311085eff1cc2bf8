//! HTTP-facing errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cached_updater_core::CacheError;
use cached_updater_identity::IdentityError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The report cache had nothing to serve.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The identity provider call failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// No usable bearer token on the request.
    #[error("Authentication required: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Config(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Cache(CacheError::Empty) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Cache(CacheError::Producer(_)) => StatusCode::BAD_GATEWAY,
            Self::Identity(IdentityError::Http { status, .. }) => match *status {
                401 => StatusCode::UNAUTHORIZED,
                403 => StatusCode::FORBIDDEN,
                404 => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Identity(IdentityError::MissingUserId) => StatusCode::BAD_REQUEST,
            Self::Identity(_) => StatusCode::BAD_GATEWAY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::Io(_) => "internal",
            Self::Cache(_) => "report-unavailable",
            Self::Identity(_) => "identity-provider",
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad-request",
            Self::NotFound(_) => "not-found",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}
