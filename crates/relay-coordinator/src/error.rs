use relay_types::LedgerRange;

/// Errors returned by coordinator operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
    #[error("invalid ledger range: {reason}")]
    InvalidRange { reason: String },

    #[error("no ledger range has been prepared")]
    NotPrepared,

    #[error("prepared range {range} is exhausted; next ledger would be {next}")]
    OutOfRange { range: LedgerRange, next: u32 },

    #[error("ledger {seq} has not closed yet")]
    NotYetAvailable { seq: u32 },

    #[error("replay engine failed: {0}")]
    EngineFailure(String),

    #[error("the relay is shutting down")]
    ShuttingDown,

    #[error("the request was abandoned before the engine was reached")]
    Abandoned,
}

/// Classification of a [`CoordinatorError`], stable across releases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRange,
    NotPrepared,
    OutOfRange,
    NotYetAvailable,
    EngineFailure,
    ShuttingDown,
    Abandoned,
}

impl ErrorKind {
    /// Caused by the request rather than the relay.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRange | Self::NotPrepared | Self::OutOfRange)
    }

    /// The relay instance will never serve mutating requests again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::EngineFailure | Self::ShuttingDown)
    }
}

impl CoordinatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRange { .. } => ErrorKind::InvalidRange,
            Self::NotPrepared => ErrorKind::NotPrepared,
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::NotYetAvailable { .. } => ErrorKind::NotYetAvailable,
            Self::EngineFailure(_) => ErrorKind::EngineFailure,
            Self::ShuttingDown => ErrorKind::ShuttingDown,
            Self::Abandoned => ErrorKind::Abandoned,
        }
    }
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
