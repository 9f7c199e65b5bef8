//! Error taxonomy of the meal-logging pipeline and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: u32,
    pub message: String,
}

/// Failures surfaced by the estimator, the meal store and the orchestrator.
///
/// A clarification request is not an error; see `LogOutcome`.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Malformed or missing request fields. Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The completion provider was unreachable, timed out or rejected the call.
    #[error("estimation unavailable: {0}")]
    EstimationUnavailable(String),

    /// Storage read or write failed. Nothing was partially persisted.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A stored row could not be decoded.
    #[error("corrupt record {id}: {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn corrupt(id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::CorruptRecord {
            id: id.into(),
            reason: reason.to_string(),
        }
    }

    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidInput(_) => 1001,
            Self::NotFound(_) => 2001,
            Self::Persistence(_) => 3001,
            Self::CorruptRecord { .. } => 3002,
            Self::EstimationUnavailable(_) => 4001,
        }
    }

    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::EstimationUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Persistence(_) | Self::CorruptRecord { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(e: sqlx::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        (status, axum::Json(body)).into_response()
    }
}
