//! Error types for bmq-server
//!
//! Handlers return [`ApiResult`]; every error renders as `{"error": message}`
//! with a status code matching its cause.

use crate::game::EngineError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),

    /// bmq-common error
    #[error(transparent)]
    Common(#[from] bmq_common::Error),

    /// Round engine error
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Common(err) => match err {
                bmq_common::Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
                bmq_common::Error::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Engine(err) => match err {
                EngineError::EmptyCatalog => StatusCode::NOT_FOUND,
                EngineError::GameInProgress => StatusCode::CONFLICT,
                EngineError::InvalidSettings(_) | EngineError::InvalidScore(_) => {
                    StatusCode::BAD_REQUEST
                }
                EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
