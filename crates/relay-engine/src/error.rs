use relay_types::{LedgerHash, LedgerRange};

/// Errors produced by a replay engine.
///
/// Only [`EngineError::RangeUnavailable`] and
/// [`EngineError::NotYetAvailable`] leave the engine usable; every other
/// variant means the engine's internal state can no longer be trusted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("ledger range {range} is not available: {reason}")]
    RangeUnavailable { range: LedgerRange, reason: String },

    #[error("ledger {seq} has not closed yet")]
    NotYetAvailable { seq: u32 },

    #[error("ledger {seq} is outside the prepared range")]
    SequenceOutsideRange { seq: u32 },

    #[error("ledger {requested} requested after ledger {last}; the engine cannot rewind")]
    OutOfOrder { requested: u32, last: u32 },

    #[error("hash mismatch at ledger {seq}: trusted {expected}, replayed {actual}")]
    HashMismatch {
        seq: u32,
        expected: LedgerHash,
        actual: LedgerHash,
    },

    #[error("malformed ledger {seq}: {reason}")]
    Malformed { seq: u32, reason: String },

    #[error("hash oracle unavailable: {0}")]
    OracleUnavailable(#[from] OracleError),

    #[error("engine crashed: {0}")]
    Crashed(String),

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("engine is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(String),
}

impl EngineError {
    /// Returns `true` if the engine must not be used again after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::RangeUnavailable { .. } | Self::NotYetAvailable { .. }
        )
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors produced by a ledger hash oracle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("hash store unreachable: {0}")]
    Unavailable(String),

    #[error("corrupt hash record for ledger {seq}: {reason}")]
    Corrupt { seq: u32, reason: String },

    #[error("hash store is closed")]
    Closed,
}

impl From<rusqlite::Error> for OracleError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

pub type OracleResult<T> = Result<T, OracleError>;
