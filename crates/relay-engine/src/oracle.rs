use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use relay_types::{HashRecord, LedgerHash};

use crate::error::{OracleError, OracleResult};
use crate::traits::LedgerHashOracle;

/// What a verifying engine does when the hash oracle cannot be reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OraclePolicy {
    /// Log the failure and serve the ledger unverified.
    #[default]
    BestEffort,
    /// Fail the ledger request; the engine becomes unusable.
    Required,
}

impl fmt::Display for OraclePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BestEffort => write!(f, "best-effort"),
            Self::Required => write!(f, "required"),
        }
    }
}

impl FromStr for OraclePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best-effort" => Ok(Self::BestEffort),
            "required" => Ok(Self::Required),
            other => Err(format!(
                "unknown oracle policy `{other}` (expected `best-effort` or `required`)"
            )),
        }
    }
}

/// Oracle used when no hash store is configured. Knows no hashes.
pub struct NoopOracle;

impl LedgerHashOracle for NoopOracle {
    fn get_ledger_hash(&self, _seq: u32) -> OracleResult<Option<LedgerHash>> {
        Ok(None)
    }
}

/// In-memory oracle for tests and embedding.
#[derive(Default)]
pub struct InMemoryOracle {
    records: HashMap<u32, LedgerHash>,
    unavailable: bool,
    closed: bool,
}

impl InMemoryOracle {
    pub fn new(records: impl IntoIterator<Item = HashRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.sequence, r.hash)).collect(),
            ..Self::default()
        }
    }

    /// An oracle whose every lookup fails as unreachable.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn insert(&mut self, record: HashRecord) {
        self.records.insert(record.sequence, record.hash);
    }
}

impl LedgerHashOracle for InMemoryOracle {
    fn get_ledger_hash(&self, seq: u32) -> OracleResult<Option<LedgerHash>> {
        if self.closed {
            return Err(OracleError::Closed);
        }
        if self.unavailable {
            return Err(OracleError::Unavailable("hash store offline".into()));
        }
        Ok(self.records.get(&seq).copied())
    }

    fn close(&mut self) -> OracleResult<()> {
        self.closed = true;
        Ok(())
    }
}
