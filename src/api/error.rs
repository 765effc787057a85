//! HTTP error responses
//!
//! Every failure is rendered as a JSON object with an `error` message:
//! input problems are `400 Bad Request`, startup and client failures are
//! `500 Internal Server Error`.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::bootstrap::BootstrapError;
use crate::error::EnvelopeError;

/// Error returned by API handlers
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or malformed request input; the client is never called
    #[error("{0}")]
    BadRequest(String),

    /// The budget client could not be started
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    /// The budget client rejected the operation
    #[error(transparent)]
    Client(#[from] EnvelopeError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Error for a required field that was not supplied
    pub fn missing(field: &str) -> Self {
        Self::BadRequest(format!("{} is required", field))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Bootstrap(_) | Self::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::BadRequest(message) => warn!(%message, "Rejected request"),
            Self::Bootstrap(e) => error!(error = %e, "Budget client unavailable"),
            Self::Client(e) => error!(error = %e, "Budget client operation failed"),
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
