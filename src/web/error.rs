use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::app::SubscribeError;
use crate::feed::FetchError;
use crate::insight::InsightError;
use crate::storage::StorageError;

/// Machine-readable error codes returned in API error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    Conflict,
    ContentUnavailable,
    InsufficientContent,
    ModelError,
    FeedUnavailable,
    InternalError,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::ContentUnavailable => StatusCode::BAD_GATEWAY,
            ErrorCode::InsufficientContent => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::ModelError => StatusCode::BAD_GATEWAY,
            ErrorCode::FeedUnavailable => StatusCode::BAD_GATEWAY,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
}

/// Error type returned by every handler.
#[derive(Debug)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<InsightError> for ApiError {
    fn from(err: InsightError) -> Self {
        match &err {
            InsightError::InvalidInput(_) => ApiError::bad_request(err.to_string()),
            InsightError::ContentUnavailable(_) => {
                ApiError::new(ErrorCode::ContentUnavailable, err.to_string())
            }
            InsightError::InsufficientContent { .. } => {
                ApiError::new(ErrorCode::InsufficientContent, err.to_string())
            }
            InsightError::Model(source) => {
                tracing::error!(error = %source, "Model call failed");
                ApiError::new(ErrorCode::ModelError, err.to_string())
            }
            // The client went away or the server is shutting down
            InsightError::Cancelled => ApiError::internal("Request cancelled"),
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidUrl(msg) => ApiError::bad_request(msg),
            FetchError::Cancelled => ApiError::internal("Request cancelled"),
            other => {
                tracing::warn!(error = %other, "Feed lookup failed");
                ApiError::new(
                    ErrorCode::FeedUnavailable,
                    format!("Failed to fetch or parse feed: {}", other),
                )
            }
        }
    }
}

impl From<SubscribeError> for ApiError {
    fn from(err: SubscribeError) -> Self {
        match err {
            SubscribeError::InvalidUrl(msg) => ApiError::bad_request(msg),
            SubscribeError::Duplicate(url) => {
                ApiError::conflict(format!("Already subscribed to {}", url))
            }
            SubscribeError::Feed(e) => e.into(),
            SubscribeError::Storage(e) => e.into(),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "Storage error");
        ApiError::internal("Storage error")
    }
}
