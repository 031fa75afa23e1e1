//! Error types for AuthHub
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Authentication failures deliberately collapse "unknown user" and
/// "wrong password" into the same variant.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Missing, malformed, expired or revoked session (401)
    #[error("unauthenticated")]
    Unauthorized,

    /// Unknown email or wrong password (401)
    #[error("Invalid Credentials")]
    InvalidCredentials,

    /// Account exists but has no password set (401)
    #[error("Use OAuth login")]
    PasswordNotSet,

    /// OAuth callback state missing or not matching the state cookie (401)
    #[error("Invalid state token")]
    InvalidOAuthState,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unique constraint collision (409)
    #[error("{0}")]
    Conflict(String),

    /// Authorization code could not be exchanged with the provider (400)
    #[error("Failed to exchange token: {0}")]
    TokenExchange(String),

    /// Provider profile could not be fetched or decoded (500)
    #[error("Failed to get user info: {0}")]
    ProviderProfile(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized
            | AppError::InvalidCredentials
            | AppError::PasswordNotSet
            | AppError::InvalidOAuthState => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) | AppError::TokenExchange(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ProviderProfile(_)
            | AppError::Database(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::PasswordNotSet => "password_not_set",
            AppError::InvalidOAuthState => "invalid_oauth_state",
            AppError::Validation(_) => "validation",
            AppError::Conflict(_) => "conflict",
            AppError::TokenExchange(_) => "token_exchange",
            AppError::ProviderProfile(_) => "provider_profile",
            AppError::Database(_) => "database",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    /// Message shown to the client
    ///
    /// Upstream and storage details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::Conflict(msg) => msg.clone(),
            AppError::TokenExchange(_) => "Failed to exchange token".to_string(),
            AppError::ProviderProfile(_) => "Failed to get user info".to_string(),
            AppError::Database(_) => "Database error".to_string(),
            AppError::Config(_) | AppError::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status_code();
        let error_type = self.error_type();

        if status.is_server_error() {
            tracing::error!(error = %self, error_type, "Request failed");
        } else {
            tracing::debug!(error = %self, error_type, "Request rejected");
        }

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_type])
            .inc();

        let body = Json(serde_json::json!({
            "error": self.public_message(),
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
