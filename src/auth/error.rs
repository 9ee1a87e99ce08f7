use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Failures surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User already exists")]
    UserExists,

    #[error("{0}")]
    Validation(&'static str),

    #[error("{}", .0.body_text())]
    BadBody(#[from] JsonRejection),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("User not found")]
    UserNotFound,

    #[error("User not found with this email")]
    EmailNotFound,

    #[error("Invalid or expired token")]
    InvalidResetToken,

    #[error("Email could not be sent")]
    EmailDelivery,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::UserExists
            | AuthError::Validation(_)
            | AuthError::BadBody(_)
            | AuthError::InvalidResetToken => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials | AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::UserNotFound | AuthError::EmailNotFound => StatusCode::NOT_FOUND,
            AuthError::EmailDelivery | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(e) = &self {
            error!(error = ?e, "request failed");
        }
        let body = ErrorBody {
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
