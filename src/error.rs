#[cfg(feature = "web")]
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors surfaced by the asset store, the approval workflow and the user directory.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("password hashing failed: {0}")]
    Auth(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn forbidden(why: impl Into<String>) -> Self {
        AppError::Forbidden(why.into())
    }

    pub fn invalid_input(why: impl Into<String>) -> Self {
        AppError::InvalidInput(why.into())
    }

    pub fn invalid_state(why: impl Into<String>) -> Self {
        AppError::InvalidState(why.into())
    }

    /// HTTP status used when this error crosses the web boundary.
    #[cfg(feature = "web")]
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidState(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Storage(_) | AppError::Serialization(_) | AppError::Auth(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(feature = "web")]
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("request failed: {}", self);
        }
        let body = Json(serde_json::json!({
            "status": "error",
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
