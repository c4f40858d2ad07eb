use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

use relay_coordinator::CoordinatorError;
use relay_protocol::{ErrorBody, ErrorCode};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("engine error: {0}")]
    Engine(#[from] relay_engine::EngineError),

    #[error("hash oracle error: {0}")]
    Oracle(#[from] relay_engine::OracleError),

    #[error("coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("server has already been stopped")]
    Stopped,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Error answered to an HTTP client.
#[derive(Clone, Debug, PartialEq, Eq)]
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

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedRequest, message)
    }

    pub fn timeout(limit: Duration) -> Self {
        Self::new(
            ErrorCode::RequestTimeout,
            format!("request did not complete within {} ms", limit.as_millis()),
        )
    }

    pub fn internal() -> Self {
        Self::new(ErrorCode::Internal, "internal server error")
    }
}

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        let code = match &err {
            CoordinatorError::InvalidRange { .. } => ErrorCode::InvalidRange,
            CoordinatorError::NotPrepared => ErrorCode::NotPrepared,
            CoordinatorError::OutOfRange { .. } => ErrorCode::OutOfRange,
            CoordinatorError::ShuttingDown => ErrorCode::ShuttingDown,
            CoordinatorError::Abandoned => ErrorCode::RequestTimeout,
            // Engine details stay in the relay's logs.
            CoordinatorError::EngineFailure(_) => {
                return Self::new(
                    ErrorCode::EngineFailure,
                    "the replay engine has failed; the relay must be restarted",
                )
            }
            // Answered as an absent ledger by the handler; only reached if a
            // caller forwards it unchanged.
            CoordinatorError::NotYetAvailable { .. } => ErrorCode::Internal,
        };
        Self::new(code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody::new(self.code, self.message))).into_response()
    }
}
