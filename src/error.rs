// src/error.rs
use crate::store::StoreError;
use warp::http::StatusCode;
use warp::reject::Reject;

/// Every failure a request handler can surface to a client.
///
/// Each variant maps to a fixed status and message; `Internal` carries detail
/// for the log only.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("No token, authorization denied")]
    MissingToken,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Database connection failed")]
    DatabaseUnavailable,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::DuplicateEmail | ApiError::InvalidCredentials => StatusCode::BAD_REQUEST,
            ApiError::MissingToken | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::DatabaseUnavailable | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to put in a response body.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) => "Server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(_) => ApiError::DatabaseUnavailable,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl Reject for ApiError {}
