use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown error code: {0}")]
    UnknownErrorCode(String),

    #[error("invalid body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Stable machine-readable error codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MalformedRequest,
    InvalidRange,
    NotPrepared,
    OutOfRange,
    EngineFailure,
    ShuttingDown,
    RequestTimeout,
    Internal,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 8] = [
        Self::MalformedRequest,
        Self::InvalidRange,
        Self::NotPrepared,
        Self::OutOfRange,
        Self::EngineFailure,
        Self::ShuttingDown,
        Self::RequestTimeout,
        Self::Internal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedRequest => "malformed_request",
            Self::InvalidRange => "invalid_range",
            Self::NotPrepared => "not_prepared",
            Self::OutOfRange => "out_of_range",
            Self::EngineFailure => "engine_failure",
            Self::ShuttingDown => "shutting_down",
            Self::RequestTimeout => "request_timeout",
            Self::Internal => "internal",
        }
    }

    /// HTTP status code the relay answers with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MalformedRequest | Self::InvalidRange => 400,
            Self::NotPrepared => 409,
            Self::OutOfRange => 416,
            Self::EngineFailure | Self::Internal => 500,
            Self::ShuttingDown => 503,
            Self::RequestTimeout => 504,
        }
    }

    /// Whether the same request may succeed later against the same relay.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RequestTimeout)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownErrorCode(s.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
}

/// Error envelope: `{ "error": { "code": .., "message": .. } }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code,
                message: message.into(),
            },
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.error.code
    }

    pub fn from_json(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
