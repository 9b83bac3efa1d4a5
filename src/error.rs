use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

/// AppError
///
/// The single failure taxonomy for every action exposed by the API. Each variant maps to one
/// HTTP status and a stable machine-readable code; store and token failures are translated
/// here so that no SQL or key material ever reaches a response body.
#[derive(Debug, Error)]
pub enum AppError {
    /// Target row absent, or not in the state the action expects (e.g. already approved).
    #[error("{0}")]
    NotFound(String),

    /// Authenticated, but not allowed to act on this target.
    #[error("{0}")]
    Forbidden(String),

    /// Missing, malformed or expired credential.
    #[error("Authentication required")]
    Unauthenticated,

    /// Login with an unknown email or a wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Uniqueness violation (duplicate membership, duplicate email, ...).
    #[error("{0}")]
    Conflict(String),

    /// Malformed input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Store or transaction failure. The detail is logged, never rendered.
    #[error("Internal server error")]
    Internal(String),
}

/// ErrorResponse
///
/// JSON body rendered for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthenticated | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            tracing::error!(detail = %detail, "request failed with internal error");
        }

        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        });

        (self.status(), body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                tracing::warn!(constraint = ?db.constraint(), "unique constraint violated");
                Self::Conflict("Resource already exists".to_string())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                tracing::warn!(constraint = ?db.constraint(), "foreign key violated");
                Self::NotFound("Referenced resource not found".to_string())
            }
            _ => {
                tracing::error!("database error: {:?}", e);
                Self::Internal(e.to_string())
            }
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        tracing::debug!("token rejected: {:?}", e.kind());
        Self::Unauthenticated
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::Validation(e.to_string())
    }
}

/// Result type for every fallible action.
pub type AppResult<T> = Result<T, AppError>;
