use crate::error::TransferError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;
use tracing::error;

/// JSON body of every error reply.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub timestamp: String,
    pub status: u16,
    pub error: String,
    pub message: String,
}

/// An error on its way out of an HTTP handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Reason phrase of the status, as carried in the `error` field of the body.
    pub fn reason(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("Unknown")
    }
}

pub fn status_for(err: &TransferError) -> StatusCode {
    match err {
        TransferError::InvalidRequest(_) | TransferError::BatchTooLarge { .. } => {
            StatusCode::BAD_REQUEST
        }
        TransferError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<TransferError> for ApiError {
    fn from(err: TransferError) -> Self {
        let status = status_for(&err);
        let message = if err.is_client_error() {
            err.to_string()
        } else {
            error!(error = %err, "unhandled error");
            "Internal server error".to_string()
        };
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            timestamp: Utc::now().to_rfc3339(),
            status: self.status.as_u16(),
            error: self.reason().to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
